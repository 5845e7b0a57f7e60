//! Local CPU driver implementation.
//!
//! The `LocalDriver` implements the `HalDriver` trait on top of the shared
//! elementwise kernels, either inline or on a private rayon pool.

use super::kernels;
use super::{SYNC_DRIVER_NAME, TASK_DRIVER_NAME};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use vmrt_common::hal::driver::{DriverDiagnostics, HalDriver, HalError};
use vmrt_common::hal::types::{ArrayData, BinaryOp, UnaryOp};

/// Where kernels execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// On the calling thread.
    Inline,
    /// On a dedicated thread pool owned by the driver.
    TaskPool,
}

/// Local CPU driver implementing the HalDriver trait.
pub struct LocalDriver {
    /// Execution mode
    mode: ExecutionMode,
    /// Worker pool (TaskPool mode only, created on init)
    pool: Option<rayon::ThreadPool>,
    /// Number of kernels dispatched
    dispatch_count: AtomicU64,
    /// Number of elements processed
    elements_processed: AtomicU64,
    /// Number of failed dispatches
    failed_dispatches: AtomicU64,
}

impl LocalDriver {
    /// Create a new, uninitialized local driver.
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            pool: None,
            dispatch_count: AtomicU64::new(0),
            elements_processed: AtomicU64::new(0),
            failed_dispatches: AtomicU64::new(0),
        }
    }

    /// Execution mode of this driver.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    fn run<R: Send>(&self, work: impl FnOnce(bool) -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(|| work(true)),
            None => work(false),
        }
    }

    fn account<T>(&self, elements: usize, result: &Result<T, HalError>) {
        self.dispatch_count.fetch_add(1, Ordering::Relaxed);
        self.elements_processed
            .fetch_add(elements as u64, Ordering::Relaxed);
        if result.is_err() {
            self.failed_dispatches.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl HalDriver for LocalDriver {
    fn name(&self) -> &'static str {
        match self.mode {
            ExecutionMode::Inline => SYNC_DRIVER_NAME,
            ExecutionMode::TaskPool => TASK_DRIVER_NAME,
        }
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self) -> Result<(), HalError> {
        if self.mode == ExecutionMode::TaskPool && self.pool.is_none() {
            let pool = rayon::ThreadPoolBuilder::new()
                .thread_name(|idx| format!("vmrt-task-{idx}"))
                .build()
                .map_err(|e| HalError::InitFailed(format!("Failed to build task pool: {e}")))?;
            info!("{} driver started {} workers", self.name(), pool.current_num_threads());
            self.pool = Some(pool);
        }
        debug!("{} driver initialized", self.name());
        Ok(())
    }

    fn dispatch_binary(
        &self,
        op: BinaryOp,
        lhs: &ArrayData,
        rhs: &ArrayData,
    ) -> Result<ArrayData, HalError> {
        let result = self.run(|parallel| kernels::binary(op, lhs, rhs, parallel));
        self.account(lhs.len(), &result);
        result
    }

    fn dispatch_unary(&self, op: UnaryOp, src: &ArrayData) -> Result<ArrayData, HalError> {
        let result = Ok(self.run(|parallel| kernels::unary(op, src, parallel)));
        self.account(src.len(), &result);
        result
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        // Dropping the pool joins its workers.
        self.pool = None;
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(DriverDiagnostics {
            dispatch_count: self.dispatch_count.load(Ordering::Relaxed),
            elements_processed: self.elements_processed.load(Ordering::Relaxed),
            failed_dispatches: self.failed_dispatches.load(Ordering::Relaxed),
        })
    }
}
