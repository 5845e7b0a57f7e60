//! # VMRT HAL Library
//!
//! Hardware Abstraction Layer with pluggable driver architecture.
//!
//! This crate turns a driver priority list into a ready `Device` and keeps
//! one device per distinct list for the lifetime of the process.
//! Drivers implement the `HalDriver` trait defined in `vmrt_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`buffer`] - Device-resident buffer views
//! - [`device`] - `Device`, the owner of one initialized driver
//! - [`device_cache`] - Process-wide driver list → device cache
//! - [`driver_registry`] - Driver factory registration
//! - [`driver_spec`] - Driver list parsing
//! - [`drivers`] - Built-in driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        vmrt_hal                                  │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │ DriverSpec  │───►│ DeviceCache  │◄──►│  Driver Registry    │  │
//! │  │ "a,b,c"     │    │ (per list)   │    │                     │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │                                     │
//! │                            ▼                                     │
//! │                   ┌────────────────┐      ┌──────────────┐       │
//! │                   │  Device        │─────►│  HalDriver   │       │
//! │                   │  (Arc-shared)  │      │  (trait obj) │       │
//! │                   └────────────────┘      └──────────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod buffer;
pub mod device;
pub mod device_cache;
pub mod driver_registry;
pub mod driver_spec;
pub mod drivers;

// Re-export key types for convenience
pub use crate::buffer::BufferView;
pub use crate::device::Device;
pub use crate::device_cache::DeviceCache;
pub use crate::driver_registry::DriverRegistry;
pub use crate::driver_spec::DriverSpec;
