//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use vmrt_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use vmrt_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, RuntimeConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_DRIVERS, HAL_MODULE_NAME, TRACE_PATH_ENV_KEY};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::driver::{DriverFactory, HalDriver, HalError};
pub use crate::hal::types::{
    ArrayData, BinaryOp, Element, ElementType, HostArray, Scalar, TensorType, UnaryOp,
};
