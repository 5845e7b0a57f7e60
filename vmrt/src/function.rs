//! Callable handles to exported functions.
//!
//! Invocation runs in three steps. Every argument is checked against the
//! declared kind and tensor type before any device work. Arguments are then
//! marshalled: host arrays are uploaded, device arrays from the same device
//! are passed through, and scalars are converted. Finally the interpreter runs
//! and results come back as `HostValue`s in declared order.

use crate::error::{Result, RuntimeError};
use crate::interp::{self, Value};
use crate::module::{LoadedFunction, VmModule};
use crate::signature::{Signature, ValueKind};
use crate::tracer::{CallRecord, Tracer};
use crate::value::{DeviceArray, HostValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vmrt_common::hal::types::{HostArray, Scalar, TensorType};
use vmrt_hal::Device;

struct FunctionInner {
    module: VmModule,
    index: usize,
    qualified_name: String,
    device: Arc<Device>,
    tracer: Option<Arc<Tracer>>,
    context: u64,
}

/// An exported function bound to a device.
///
/// Cloning is cheap. Calls take `&self` and may run concurrently from
/// several threads.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

/// Argument after validation, before any device work.
enum Prepared<'a> {
    Upload(&'a HostArray),
    Pass(&'a DeviceArray),
    Value(Value),
}

impl Function {
    pub(crate) fn bind(
        module: &VmModule,
        index: usize,
        device: Arc<Device>,
        tracer: Option<Arc<Tracer>>,
        context: u64,
    ) -> Self {
        let name = &module.loaded_functions()[index].def.name;
        Self {
            inner: Arc::new(FunctionInner {
                qualified_name: format!("{}.{}", module.name(), name),
                module: module.clone(),
                index,
                device,
                tracer,
                context,
            }),
        }
    }

    fn loaded(&self) -> &LoadedFunction {
        &self.inner.module.loaded_functions()[self.inner.index]
    }

    /// Export name.
    pub fn name(&self) -> &str {
        &self.loaded().def.name
    }

    /// Name of the owning module.
    pub fn module_name(&self) -> &str {
        self.inner.module.name()
    }

    /// `module.function`
    pub fn qualified_name(&self) -> &str {
        &self.inner.qualified_name
    }

    /// Parsed calling convention.
    pub fn signature(&self) -> &Signature {
        &self.loaded().signature
    }

    /// Reflection metadata.
    pub fn reflection(&self) -> &BTreeMap<String, String> {
        &self.loaded().def.reflection
    }

    /// Declared tensor types per argument. Empty when the module declares none.
    pub fn arg_types(&self) -> &[Option<TensorType>] {
        &self.loaded().def.arg_types
    }

    /// Device this function runs on.
    pub fn device(&self) -> &Arc<Device> {
        &self.inner.device
    }

    /// Invoke the function.
    ///
    /// # Errors
    /// - `Arity` / `TypeMismatch` before any device work
    /// - `Invocation` if execution fails; no results are returned
    /// - `Trace` if the call succeeded but could not be recorded
    pub fn call(&self, args: &[HostValue]) -> Result<Vec<HostValue>> {
        let signature = self.signature();
        if args.len() != signature.arity() {
            return Err(RuntimeError::Arity {
                function: self.qualified_name().to_string(),
                expected: signature.arity(),
                actual: args.len(),
            });
        }

        let prepared = args
            .iter()
            .zip(signature.args())
            .enumerate()
            .map(|(index, (arg, kind))| self.prepare(index, arg, *kind))
            .collect::<Result<Vec<_>>>()?;

        let device = &self.inner.device;
        let mut values = Vec::with_capacity(prepared.len());
        for arg in prepared {
            values.push(match arg {
                Prepared::Upload(array) => Value::Ref(device.upload(array)),
                Prepared::Pass(array) => Value::Ref(device.import(array.device(), array.view())?),
                Prepared::Value(value) => value,
            });
        }

        debug!("Invoking {} ({} args)", self.qualified_name(), values.len());
        let results = interp::execute(device, self.loaded(), values).map_err(|source| {
            RuntimeError::Invocation {
                function: self.qualified_name().to_string(),
                source,
            }
        })?;
        let results: Vec<HostValue> = results
            .into_iter()
            .map(|value| match value {
                Value::Ref(view) => HostValue::Device(DeviceArray::new(Arc::clone(device), view)),
                Value::I32(v) => HostValue::Scalar(Scalar::I32(v)),
                Value::I64(v) => HostValue::Scalar(Scalar::I64(v)),
                Value::F32(v) => HostValue::Scalar(Scalar::F32(v)),
                Value::F64(v) => HostValue::Scalar(Scalar::F64(v)),
            })
            .collect();

        if let Some(tracer) = &self.inner.tracer {
            tracer.record_call(CallRecord {
                context: self.inner.context,
                module: self.module_name(),
                function: self.name(),
                calling_convention: signature.to_string(),
                inputs: args,
                outputs: &results,
            })?;
        }
        Ok(results)
    }

    fn prepare<'a>(&self, index: usize, arg: &'a HostValue, kind: ValueKind) -> Result<Prepared<'a>> {
        let mismatch = |reason: String| RuntimeError::TypeMismatch {
            function: self.qualified_name().to_string(),
            index,
            reason,
        };

        let Some(element_type) = kind.scalar_type() else {
            let (actual, prepared) = match arg {
                HostValue::Array(array) => (array.tensor_type(), Prepared::Upload(array)),
                HostValue::Device(array) => (array.view().tensor_type(), Prepared::Pass(array)),
                HostValue::Scalar(_) => {
                    return Err(mismatch(format!("expected buffer, got {}", arg.describe())));
                }
            };
            if let Some(Some(declared)) = self.arg_types().get(index) {
                if *declared != actual {
                    return Err(mismatch(format!("expected {declared}, got {actual}")));
                }
            }
            return Ok(prepared);
        };

        let HostValue::Scalar(scalar) = arg else {
            return Err(mismatch(format!(
                "expected {element_type} scalar, got {}",
                arg.describe()
            )));
        };
        convert_scalar(*scalar, kind)
            .map(Prepared::Value)
            .ok_or_else(|| {
                mismatch(format!(
                    "{} scalar {scalar} is not a valid {element_type}",
                    scalar.element_type()
                ))
            })
    }
}

/// Integer scalars convert between widths when the value fits; floats
/// convert between widths freely. Integer and float never mix.
fn convert_scalar(scalar: Scalar, kind: ValueKind) -> Option<Value> {
    match kind {
        ValueKind::I32 => scalar.as_i64().and_then(|v| i32::try_from(v).ok()).map(Value::I32),
        ValueKind::I64 => scalar.as_i64().map(Value::I64),
        ValueKind::F32 => scalar.as_f64().map(|v| Value::F32(v as f32)),
        ValueKind::F64 => scalar.as_f64().map(Value::F64),
        ValueKind::Ref => None,
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<VmFunction {}({}), reflection = {:?}>",
            self.name(),
            self.signature(),
            self.reflection()
        )
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
