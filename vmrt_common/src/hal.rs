//! Hardware abstraction layer contract.
//!
//! This module contains the driver trait, kernel descriptors and the host
//! array representation exchanged between the runtime and its drivers.

pub mod driver;
pub mod types;
