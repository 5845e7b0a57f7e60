//! # VMRT Runtime
//!
//! Host-side runtime for precompiled tensor-program modules.
//!
//! A [`Config`] resolves a driver priority list to a shared `Device`. An
//! [`ExecutionContext`] owns the built-in `hal` module plus the modules
//! registered into it, and exposes their exported functions as callable
//! [`Function`] handles. An optional [`Tracer`] snapshots every registered
//! module and logs every successful call.
//!
//! # Module Structure
//!
//! - [`config`] - Device resolution and tracer attachment
//! - [`context`] - Execution contexts (dynamic / static)
//! - [`module`] - Module binary format, loading and building
//! - [`module_map`] - Ordered module and function lookup
//! - [`function`] - Invocation and argument marshalling
//! - [`value`] - Host-visible call values
//! - [`tracer`] - Module snapshots and call log
//! - [`signature`] - Calling convention strings
//! - [`interp`] - Register-machine interpreter
//! - [`input`] - Text form of call values
//!
//! # Usage
//!
//! ```rust,no_run
//! use vmrt::{Config, ExecutionContext, HostValue, VmModule};
//! use vmrt_common::hal::types::HostArray;
//!
//! # fn main() -> vmrt::Result<()> {
//! let module = VmModule::load_file(std::path::Path::new("arithmetic.vmbc"))?;
//! let mut context = ExecutionContext::dynamic(Config::new("local-task")?)?;
//! context.add_module(&module)?;
//!
//! let arg = HostValue::from(HostArray::from_slice(&[1.0f32, 2.0, 3.0, 4.0]));
//! let out = context.modules()["arithmetic"]["simple_mul"].call(&[arg.clone(), arg])?;
//! println!("{:?}", out[0].to_vec::<f32>()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod function;
pub mod hal_module;
pub mod input;
pub mod interp;
pub mod module;
pub mod module_map;
pub mod signature;
pub mod tracer;
pub mod value;

pub use crate::config::Config;
pub use crate::context::{ContextMode, ExecutionContext, load_vm_module};
pub use crate::error::{Result, RuntimeError};
pub use crate::function::Function;
pub use crate::module::{FunctionDef, ModuleBuilder, Op, VmModule};
pub use crate::module_map::{BoundModule, ModuleMap};
pub use crate::signature::{Signature, ValueKind};
pub use crate::tracer::{CallLogEntry, TraceValue, Tracer};
pub use crate::value::{DeviceArray, HostValue};
