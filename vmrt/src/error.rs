//! Error types for the runtime crate.

use crate::interp::VmError;
use thiserror::Error;
use vmrt_common::config::ConfigError;
use vmrt_common::hal::driver::HalError;

/// Runtime errors surfaced to callers.
///
/// Messages carry the offending driver list or module name verbatim so
/// callers can match on them.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No candidate driver produced a device.
    #[error("No device found from list \"{drivers}\"")]
    DriverResolution {
        /// Verbatim driver list
        drivers: String,
    },

    /// A module with this name is already registered.
    #[error("Module '{name}' is already registered in this context")]
    ModuleNameCollision {
        /// Colliding module name
        name: String,
    },

    /// Operation not allowed in the current context state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Wrong number of call arguments.
    #[error("{function} expects {expected} arguments, got {actual}")]
    Arity {
        /// Qualified function name
        function: String,
        /// Declared arity
        expected: usize,
        /// Supplied arguments
        actual: usize,
    },

    /// A call argument does not match its declared kind or type.
    #[error("{function} argument {index}: {reason}")]
    TypeMismatch {
        /// Qualified function name
        function: String,
        /// Argument position
        index: usize,
        /// What did not match
        reason: String,
    },

    /// Execution failed on the device or in the interpreter.
    #[error("{function} failed: {source}")]
    Invocation {
        /// Qualified function name
        function: String,
        /// Underlying failure
        #[source]
        source: VmError,
    },

    /// Module binary could not be loaded.
    #[error("Module load failed: {0}")]
    ModuleLoad(String),

    /// Trace output could not be written.
    #[error("Trace error: {0}")]
    Trace(String),

    /// HAL failure outside of an invocation.
    #[error(transparent)]
    Hal(HalError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<HalError> for RuntimeError {
    fn from(err: HalError) -> Self {
        match err {
            HalError::NoDeviceFound { drivers } => RuntimeError::DriverResolution { drivers },
            other => RuntimeError::Hal(other),
        }
    }
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
