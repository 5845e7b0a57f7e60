//! Elementwise CPU kernels shared by the local drivers.

use rayon::prelude::*;
use vmrt_common::hal::driver::HalError;
use vmrt_common::hal::types::{ArrayData, BinaryOp, UnaryOp};

/// Arrays shorter than this run sequentially even when parallelism is allowed.
pub(crate) const PARALLEL_THRESHOLD: usize = 4096;

/// Per-element arithmetic for every supported element type.
trait Arith: Copy + Send + Sync {
    fn binary(op: BinaryOp, a: Self, b: Self) -> Result<Self, HalError>;
    fn unary(op: UnaryOp, a: Self) -> Self;
}

macro_rules! impl_float_arith {
    ($($ty:ty),*) => {$(
        impl Arith for $ty {
            fn binary(op: BinaryOp, a: Self, b: Self) -> Result<Self, HalError> {
                Ok(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Max => a.max(b),
                    BinaryOp::Min => a.min(b),
                })
            }

            fn unary(op: UnaryOp, a: Self) -> Self {
                match op {
                    UnaryOp::Neg => -a,
                    UnaryOp::Abs => a.abs(),
                }
            }
        }
    )*};
}

macro_rules! impl_int_arith {
    ($($ty:ty),*) => {$(
        impl Arith for $ty {
            fn binary(op: BinaryOp, a: Self, b: Self) -> Result<Self, HalError> {
                match op {
                    BinaryOp::Add => Ok(a.wrapping_add(b)),
                    BinaryOp::Sub => Ok(a.wrapping_sub(b)),
                    BinaryOp::Mul => Ok(a.wrapping_mul(b)),
                    BinaryOp::Div => a.checked_div(b).ok_or_else(|| {
                        HalError::DispatchFailed(format!(
                            "integer division {a} / {b} is undefined"
                        ))
                    }),
                    BinaryOp::Max => Ok(a.max(b)),
                    BinaryOp::Min => Ok(a.min(b)),
                }
            }

            fn unary(op: UnaryOp, a: Self) -> Self {
                match op {
                    UnaryOp::Neg => a.wrapping_neg(),
                    UnaryOp::Abs => a.wrapping_abs(),
                }
            }
        }
    )*};
}

impl_float_arith!(f32, f64);
impl_int_arith!(i32, i64);

fn zip_with<T: Arith>(op: BinaryOp, a: &[T], b: &[T], parallel: bool) -> Result<Vec<T>, HalError> {
    if parallel && a.len() >= PARALLEL_THRESHOLD {
        a.par_iter()
            .zip(b.par_iter())
            .map(|(&x, &y)| T::binary(op, x, y))
            .collect()
    } else {
        a.iter().zip(b).map(|(&x, &y)| T::binary(op, x, y)).collect()
    }
}

fn map_with<T: Arith>(op: UnaryOp, a: &[T], parallel: bool) -> Vec<T> {
    if parallel && a.len() >= PARALLEL_THRESHOLD {
        a.par_iter().map(|&x| T::unary(op, x)).collect()
    } else {
        a.iter().map(|&x| T::unary(op, x)).collect()
    }
}

/// Apply `op` elementwise to two equally typed, equally sized operands.
pub(crate) fn binary(
    op: BinaryOp,
    lhs: &ArrayData,
    rhs: &ArrayData,
    parallel: bool,
) -> Result<ArrayData, HalError> {
    if lhs.len() != rhs.len() {
        return Err(HalError::ShapeMismatch(format!(
            "operands hold {} and {} elements",
            lhs.len(),
            rhs.len()
        )));
    }
    match (lhs, rhs) {
        (ArrayData::F32(a), ArrayData::F32(b)) => Ok(ArrayData::F32(zip_with(op, a, b, parallel)?)),
        (ArrayData::F64(a), ArrayData::F64(b)) => Ok(ArrayData::F64(zip_with(op, a, b, parallel)?)),
        (ArrayData::I32(a), ArrayData::I32(b)) => Ok(ArrayData::I32(zip_with(op, a, b, parallel)?)),
        (ArrayData::I64(a), ArrayData::I64(b)) => Ok(ArrayData::I64(zip_with(op, a, b, parallel)?)),
        _ => Err(HalError::DispatchFailed(format!(
            "{:?} operands differ in element type ({} vs {})",
            op,
            lhs.element_type(),
            rhs.element_type()
        ))),
    }
}

/// Apply `op` elementwise to one operand.
pub(crate) fn unary(op: UnaryOp, src: &ArrayData, parallel: bool) -> ArrayData {
    match src {
        ArrayData::F32(a) => ArrayData::F32(map_with(op, a, parallel)),
        ArrayData::F64(a) => ArrayData::F64(map_with(op, a, parallel)),
        ArrayData::I32(a) => ArrayData::I32(map_with(op, a, parallel)),
        ArrayData::I64(a) => ArrayData::I64(map_with(op, a, parallel)),
    }
}
