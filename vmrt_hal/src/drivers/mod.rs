//! HAL driver implementations.
//!
//! This module contains all built-in HAL drivers:
//!
//! - [`local`] - CPU drivers executing kernels in-process (`local-sync`, `local-task`)
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `HalDriver` trait from `vmrt_common::hal::driver`
//! 3. Register the driver in `register_builtin_drivers()`

pub mod local;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers into `registry`.
pub fn register_builtin_drivers(registry: &mut DriverRegistry) {
    registry.register(local::SYNC_DRIVER_NAME, local::create_sync_driver);
    registry.register(local::TASK_DRIVER_NAME, local::create_task_driver);
}
