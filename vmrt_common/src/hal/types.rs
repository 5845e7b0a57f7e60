//! Host-side value types and kernel descriptors.
//!
//! `HostArray` is the representation every driver uploads from and
//! downloads to. Data is stored as a typed vector rather than raw bytes so
//! kernels can operate on it without reinterpretation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hal::driver::HalError;

/// Element type of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// 32-bit IEEE float
    F32,
    /// 64-bit IEEE float
    F64,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
}

impl ElementType {
    /// Short textual name (`f32`, `i64`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
        }
    }

    /// Parse a short textual name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "f32" => Some(ElementType::F32),
            "f64" => Some(ElementType::F64),
            "i32" => Some(ElementType::I32),
            "i64" => Some(ElementType::I64),
            _ => None,
        }
    }

    /// Whether the type is a floating point type.
    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed element storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArrayData {
    /// f32 elements
    F32(Vec<f32>),
    /// f64 elements
    F64(Vec<f64>),
    /// i32 elements
    I32(Vec<i32>),
    /// i64 elements
    I64(Vec<i64>),
}

impl ArrayData {
    /// Element type of the storage.
    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::F32(_) => ElementType::F32,
            ArrayData::F64(_) => ElementType::F64,
            ArrayData::I32(_) => ElementType::I32,
            ArrayData::I64(_) => ElementType::I64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
        }
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rust primitive usable as an array element.
pub trait Element: Copy + Send + Sync + 'static {
    /// Matching element type tag.
    const TYPE: ElementType;

    /// Wrap a vector into typed storage.
    fn wrap(data: Vec<Self>) -> ArrayData;

    /// Borrow typed storage if the element type matches.
    fn view(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const TYPE: ElementType = ElementType::$variant;

            fn wrap(data: Vec<Self>) -> ArrayData {
                ArrayData::$variant(data)
            }

            fn view(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, F32);
impl_element!(f64, F64);
impl_element!(i32, I32);
impl_element!(i64, I64);

/// Declared tensor type: shape plus element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorType {
    /// Dimensions, outermost first
    pub shape: Vec<usize>,
    /// Element type
    pub element_type: ElementType,
}

impl TensorType {
    /// Create a tensor type.
    pub fn new(shape: impl Into<Vec<usize>>, element_type: ElementType) -> Self {
        Self {
            shape: shape.into(),
            element_type,
        }
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dim in &self.shape {
            write!(f, "{dim}x")?;
        }
        write!(f, "{}", self.element_type)
    }
}

/// Host-resident dense array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostArray {
    shape: Vec<usize>,
    element_type: ElementType,
    data: ArrayData,
}

impl HostArray {
    /// Create an array from typed data and a shape.
    ///
    /// # Errors
    /// Returns `HalError::ShapeMismatch` if the element count does not match the shape.
    pub fn new<T: Element>(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self, HalError> {
        Self::from_data(shape, T::wrap(data))
    }

    /// Create an array from already-typed storage.
    ///
    /// # Errors
    /// Returns `HalError::ShapeMismatch` if the element count does not match the shape.
    pub fn from_data(shape: impl Into<Vec<usize>>, data: ArrayData) -> Result<Self, HalError> {
        let shape = shape.into();
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| {
                HalError::ShapeMismatch(format!("shape {:?} overflows the element count", shape))
            })?;
        if expected != data.len() {
            return Err(HalError::ShapeMismatch(format!(
                "shape {:?} holds {} elements but {} were given",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            shape,
            element_type: data.element_type(),
            data,
        })
    }

    /// Create a rank-1 array from a slice.
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        Self {
            shape: vec![values.len()],
            element_type: T::TYPE,
            data: T::wrap(values.to_vec()),
        }
    }

    /// Dimensions of the array.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element type of the array.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Declared tensor type of this array.
    pub fn tensor_type(&self) -> TensorType {
        TensorType::new(self.shape.clone(), self.element_type)
    }

    /// Underlying storage.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Consume the array and return its storage.
    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow elements as `T`, or `None` if the element type differs.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(&self.data)
    }

    /// Copy elements out as `T`, or `None` if the element type differs.
    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        self.as_slice::<T>().map(<[T]>::to_vec)
    }
}

/// Host-side scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
}

impl Scalar {
    /// Element type of the scalar.
    pub fn element_type(&self) -> ElementType {
        match self {
            Scalar::I32(_) => ElementType::I32,
            Scalar::I64(_) => ElementType::I64,
            Scalar::F32(_) => ElementType::F32,
            Scalar::F64(_) => ElementType::F64,
        }
    }

    /// Integer value, if this is an integer scalar.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::I32(v) => Some(i64::from(v)),
            Scalar::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Float value, if this is a float scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::F32(v) => Some(f64::from(v)),
            Scalar::F64(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::I32(v) => write!(f, "{v}"),
            Scalar::I64(v) => write!(f, "{v}"),
            Scalar::F32(v) => write!(f, "{v}"),
            Scalar::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Elementwise binary kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `max(a, b)`
    Max,
    /// `min(a, b)`
    Min,
}

/// Elementwise unary kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnaryOp {
    /// `-a`
    Neg,
    /// `|a|`
    Abs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_array_rejects_bad_shape() {
        let result = HostArray::new([2, 3], vec![1.0f32; 5]);
        assert!(matches!(result, Err(HalError::ShapeMismatch(_))));
    }

    #[test]
    fn host_array_rejects_overflowing_shape() {
        let result = HostArray::new([1usize << 63, 2], Vec::<f32>::new());
        let err = result.unwrap_err();
        assert!(matches!(err, HalError::ShapeMismatch(_)));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn host_array_typed_access() {
        let array = HostArray::new([2, 2], vec![1i32, 2, 3, 4]).unwrap();
        assert_eq!(array.element_type(), ElementType::I32);
        assert_eq!(array.as_slice::<i32>(), Some(&[1, 2, 3, 4][..]));
        assert!(array.as_slice::<f32>().is_none());
        assert_eq!(array.tensor_type().to_string(), "2x2xi32");
    }

    #[test]
    fn element_type_names() {
        for ty in [ElementType::F32, ElementType::F64, ElementType::I32, ElementType::I64] {
            assert_eq!(ElementType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ElementType::parse("bf16"), None);
        assert!(ElementType::F64.is_float());
        assert!(!ElementType::I64.is_float());
    }

    #[test]
    fn scalar_widening_accessors() {
        assert_eq!(Scalar::I32(-3).as_i64(), Some(-3));
        assert_eq!(Scalar::F32(0.5).as_f64(), Some(0.5));
        assert_eq!(Scalar::F64(1.0).as_i64(), None);
    }
}
