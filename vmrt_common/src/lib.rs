//! VMRT Common Library
//!
//! This crate provides shared constants, configuration loading utilities and
//! the HAL driver contract for all VMRT workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Workspace-wide names, file extensions and defaults
//! - [`hal`] - Driver trait, kernel descriptors and host array types
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use vmrt_common::prelude::*;
//!
//! let array = HostArray::from_slice(&[1.0f32, 2.0, 3.0]);
//! assert_eq!(array.element_type(), ElementType::F32);
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
