//! HAL driver trait and error types.
//!
//! This module defines:
//! - `HalDriver` trait - Interface for pluggable execution backends
//! - `HalError` enum - Error types for HAL operations
//! - `DriverFactory` type alias - Factory function type
//! - `DriverDiagnostics` struct - Optional driver diagnostics

use crate::hal::types::{ArrayData, BinaryOp, UnaryOp};
use thiserror::Error;

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// None of the candidate drivers produced a device
    #[error("No device found from list \"{drivers}\"")]
    NoDeviceFound {
        /// Verbatim driver list as supplied by the caller
        drivers: String,
    },

    /// Array shape does not match its data or its peer operand
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Kernel execution failed
    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    /// Buffer belongs to another device
    #[error("Buffer belongs to device {buffer_device}, not device {device}")]
    ForeignBuffer {
        /// Device owning the buffer
        buffer_device: u64,
        /// Device the buffer was handed to
        device: u64,
    },
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn HalDriver>;

/// Optional driver diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DriverDiagnostics {
    /// Number of kernels dispatched
    pub dispatch_count: u64,
    /// Number of elements processed across all dispatches
    pub elements_processed: u64,
    /// Number of dispatches that failed
    pub failed_dispatches: u64,
}

/// Trait defining the interface for HAL drivers.
///
/// A `Device` owns exactly one initialized driver and routes every kernel
/// dispatch through it, enabling pluggable backends (inline, thread pool,
/// accelerators, ...).
///
/// # Lifecycle
///
/// 1. `init()` - Called once when a device is being created; failure marks
///    the driver unavailable
/// 2. `dispatch_*()` - Called for every kernel, possibly from several threads
/// 3. `shutdown()` - Called when the owning device is dropped
pub trait HalDriver: Send + Sync {
    /// Returns the driver's unique identifier (e.g., "local-sync").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Probe and initialize the backend.
    ///
    /// # Errors
    /// Return `HalError::InitFailed` if the backend cannot be used in this process.
    fn init(&mut self) -> Result<(), HalError>;

    /// Execute an elementwise binary kernel.
    ///
    /// Operands have been checked for identical element type and length by
    /// the caller.
    fn dispatch_binary(
        &self,
        op: BinaryOp,
        lhs: &ArrayData,
        rhs: &ArrayData,
    ) -> Result<ArrayData, HalError>;

    /// Execute an elementwise unary kernel.
    fn dispatch_unary(&self, op: UnaryOp, src: &ArrayData) -> Result<ArrayData, HalError>;

    /// Release backend resources.
    fn shutdown(&mut self) -> Result<(), HalError> {
        Ok(())
    }

    /// Get driver-specific diagnostics.
    /// Default: None
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_error_display() {
        let err = HalError::InitFailed("test error".to_string());
        assert!(err.to_string().contains("test error"));

        let err = HalError::DriverNotFound("local-sync".to_string());
        assert!(err.to_string().contains("local-sync"));
    }

    #[test]
    fn test_no_device_found_names_full_list() {
        let err = HalError::NoDeviceFound {
            drivers: "nothere1,nothere2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("No device found from list"));
        assert!(msg.contains("nothere1,nothere2"));
    }

    #[test]
    fn test_driver_diagnostics_default() {
        let diag = DriverDiagnostics::default();
        assert_eq!(diag.dispatch_count, 0);
        assert_eq!(diag.elements_processed, 0);
        assert_eq!(diag.failed_dispatches, 0);
    }
}
