//! Local CPU driver module.
//!
//! Both drivers share one kernel library; they differ only in where the
//! work runs. `local-sync` runs inline on the calling thread, `local-task`
//! runs on a dedicated rayon pool.

mod driver;
mod kernels;

pub use driver::{ExecutionMode, LocalDriver};

use vmrt_common::hal::driver::HalDriver;

/// Registered name of the inline driver.
pub const SYNC_DRIVER_NAME: &str = "local-sync";

/// Registered name of the thread-pool driver.
pub const TASK_DRIVER_NAME: &str = "local-task";

/// Factory function to create a `local-sync` driver instance.
pub fn create_sync_driver() -> Box<dyn HalDriver> {
    Box::new(LocalDriver::new(ExecutionMode::Inline))
}

/// Factory function to create a `local-task` driver instance.
pub fn create_task_driver() -> Box<dyn HalDriver> {
    Box::new(LocalDriver::new(ExecutionMode::TaskPool))
}
