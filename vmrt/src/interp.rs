//! Register-machine interpreter.
//!
//! Arguments occupy registers `0..arity`; the remaining registers start
//! empty. Each call gets its own register file, so concurrent calls of the
//! same function share nothing mutable.

use crate::module::{LoadedFunction, Op, Reg};
use crate::signature::ValueKind;
use thiserror::Error;
use tracing::trace;
use vmrt_common::hal::driver::HalError;
use vmrt_hal::{BufferView, Device};

/// Interpreter value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Device buffer reference
    Ref(BufferView),
    /// 32-bit integer
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
}

impl Value {
    /// Kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Ref(_) => ValueKind::Ref,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
        }
    }
}

/// Interpreter failure.
#[derive(Debug, Error)]
pub enum VmError {
    /// Register read before being written
    #[error("register {0} read before assignment")]
    EmptyRegister(Reg),

    /// Register holds the wrong kind of value
    #[error("register {reg} holds {found:?}, expected {expected}")]
    WrongKind {
        /// Register
        reg: Reg,
        /// Actual kind
        found: ValueKind,
        /// Expected kind description
        expected: &'static str,
    },

    /// Dimension index outside the buffer's rank
    #[error("axis {axis} out of range for rank {rank}")]
    AxisOutOfRange {
        /// Requested axis
        axis: i64,
        /// Buffer rank
        rank: usize,
    },

    /// Returned value does not match the declared result kind
    #[error("result {index} is {found:?}, declared {declared:?}")]
    ResultKind {
        /// Result position
        index: usize,
        /// Actual kind
        found: ValueKind,
        /// Declared kind
        declared: ValueKind,
    },

    /// Number of returned values differs from the signature
    #[error("returned {found} values, declared {declared}")]
    ResultCount {
        /// Values returned
        found: usize,
        /// Values declared
        declared: usize,
    },

    /// Kernel dispatch failed
    #[error(transparent)]
    Hal(#[from] HalError),
}

struct Frame {
    regs: Vec<Option<Value>>,
}

impl Frame {
    fn get(&self, reg: Reg) -> Result<&Value, VmError> {
        self.regs[usize::from(reg)]
            .as_ref()
            .ok_or(VmError::EmptyRegister(reg))
    }

    fn buffer(&self, reg: Reg) -> Result<&BufferView, VmError> {
        match self.get(reg)? {
            Value::Ref(view) => Ok(view),
            other => Err(VmError::WrongKind {
                reg,
                found: other.kind(),
                expected: "buffer",
            }),
        }
    }

    fn integer(&self, reg: Reg) -> Result<i64, VmError> {
        match *self.get(reg)? {
            Value::I32(v) => Ok(i64::from(v)),
            Value::I64(v) => Ok(v),
            ref other => Err(VmError::WrongKind {
                reg,
                found: other.kind(),
                expected: "integer",
            }),
        }
    }

    fn set(&mut self, reg: Reg, value: Value) {
        self.regs[usize::from(reg)] = Some(value);
    }
}

/// Execute `function` on `device` with already-marshalled arguments.
///
/// The function was validated at load time: register indices are in range,
/// the argument count matches its signature, and the body ends in a return.
pub(crate) fn execute(
    device: &Device,
    function: &LoadedFunction,
    args: Vec<Value>,
) -> Result<Vec<Value>, VmError> {
    let def = &function.def;
    let mut frame = Frame {
        regs: vec![None; usize::from(def.register_count)],
    };
    for (idx, arg) in args.into_iter().enumerate() {
        frame.regs[idx] = Some(arg);
    }

    for op in &def.body {
        trace!("{}: {:?}", def.name, op);
        match op {
            Op::Binary { op, lhs, rhs, dst } => {
                let out = device.dispatch_binary(*op, frame.buffer(*lhs)?, frame.buffer(*rhs)?)?;
                frame.set(*dst, Value::Ref(out));
            }
            Op::Unary { op, src, dst } => {
                let out = device.dispatch_unary(*op, frame.buffer(*src)?)?;
                frame.set(*dst, Value::Ref(out));
            }
            Op::Rank { src, dst } => {
                let rank = frame.buffer(*src)?.rank();
                frame.set(*dst, Value::I32(rank as i32));
            }
            Op::Dim { src, axis, dst } => {
                let view = frame.buffer(*src)?;
                let axis = frame.integer(*axis)?;
                let dim = usize::try_from(axis)
                    .ok()
                    .and_then(|a| view.shape().get(a).copied())
                    .ok_or(VmError::AxisOutOfRange {
                        axis,
                        rank: view.rank(),
                    })?;
                frame.set(*dst, Value::I64(dim as i64));
            }
            Op::ElementCount { src, dst } => {
                let count = frame.buffer(*src)?.element_count();
                frame.set(*dst, Value::I64(count as i64));
            }
            Op::Return { results } => {
                let values = results
                    .iter()
                    .map(|reg| frame.get(*reg).cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                check_results(function, &values)?;
                return Ok(values);
            }
        }
    }
    unreachable!("validated function '{}' has no return", def.name)
}

fn check_results(function: &LoadedFunction, values: &[Value]) -> Result<(), VmError> {
    let declared = function.signature.results().len();
    if values.len() != declared {
        return Err(VmError::ResultCount {
            found: values.len(),
            declared,
        });
    }
    for (index, (value, declared)) in values.iter().zip(function.signature.results()).enumerate() {
        if value.kind() != *declared {
            return Err(VmError::ResultKind {
                index,
                found: value.kind(),
                declared: *declared,
            });
        }
    }
    Ok(())
}
