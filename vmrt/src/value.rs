//! Host-visible call values.
//!
//! `HostValue` is the closed set of things a caller can pass to or receive
//! from a function. Device-resident results come back as `DeviceArray`,
//! which can be fed straight into the next call without a host round trip.

use crate::error::{Result, RuntimeError};
use std::fmt;
use std::sync::{Arc, OnceLock};
use vmrt_common::hal::types::{Element, ElementType, HostArray, Scalar};
use vmrt_hal::{BufferView, Device};

/// Array living on a device.
///
/// The host copy is downloaded on first request and cached.
#[derive(Clone)]
pub struct DeviceArray {
    device: Arc<Device>,
    view: BufferView,
    host: Arc<OnceLock<HostArray>>,
}

impl DeviceArray {
    pub(crate) fn new(device: Arc<Device>, view: BufferView) -> Self {
        Self {
            device,
            view,
            host: Arc::new(OnceLock::new()),
        }
    }

    /// Device holding the buffer.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Underlying buffer view.
    pub fn view(&self) -> &BufferView {
        &self.view
    }

    /// Dimensions.
    pub fn shape(&self) -> &[usize] {
        self.view.shape()
    }

    /// Element type.
    pub fn element_type(&self) -> ElementType {
        self.view.element_type()
    }

    /// Host copy of the buffer, downloaded once.
    pub fn to_host(&self) -> Result<&HostArray> {
        if let Some(host) = self.host.get() {
            return Ok(host);
        }
        let host = self.device.download(&self.view)?;
        Ok(self.host.get_or_init(|| host))
    }

    /// Copy elements out as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let host = self.to_host()?;
        host.to_vec::<T>().ok_or_else(|| {
            RuntimeError::InvalidState(format!(
                "array holds {}, not {}",
                host.element_type(),
                T::TYPE
            ))
        })
    }
}

impl fmt::Debug for DeviceArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceArray({:?})", self.view)
    }
}

/// Argument or result of a function call.
#[derive(Debug, Clone)]
pub enum HostValue {
    /// Host-resident array, uploaded on call
    Array(HostArray),
    /// Device-resident array, passed through on call
    Device(DeviceArray),
    /// Scalar
    Scalar(Scalar),
}

impl HostValue {
    /// Short description of the variant, for error messages.
    pub fn describe(&self) -> String {
        match self {
            HostValue::Array(a) => format!("host array {}", a.tensor_type()),
            HostValue::Device(d) => format!("device array {}", d.view().tensor_type()),
            HostValue::Scalar(s) => format!("{} scalar", s.element_type()),
        }
    }

    /// Host array form of an array value.
    ///
    /// # Errors
    /// Scalars have no array form and yield `RuntimeError::InvalidState`.
    pub fn to_array(&self) -> Result<HostArray> {
        match self {
            HostValue::Array(a) => Ok(a.clone()),
            HostValue::Device(d) => Ok(d.to_host()?.clone()),
            HostValue::Scalar(s) => Err(RuntimeError::InvalidState(format!(
                "{} scalar has no array form",
                s.element_type()
            ))),
        }
    }

    /// Copy array elements out as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let array = self.to_array()?;
        array.to_vec::<T>().ok_or_else(|| {
            RuntimeError::InvalidState(format!(
                "array holds {}, not {}",
                array.element_type(),
                T::TYPE
            ))
        })
    }

    /// The scalar, if this is one.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            HostValue::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// The device array, if this is one.
    pub fn as_device(&self) -> Option<&DeviceArray> {
        match self {
            HostValue::Device(d) => Some(d),
            _ => None,
        }
    }
}

impl From<HostArray> for HostValue {
    fn from(array: HostArray) -> Self {
        HostValue::Array(array)
    }
}

impl From<DeviceArray> for HostValue {
    fn from(array: DeviceArray) -> Self {
        HostValue::Device(array)
    }
}

impl From<&DeviceArray> for HostValue {
    fn from(array: &DeviceArray) -> Self {
        HostValue::Device(array.clone())
    }
}

impl From<Scalar> for HostValue {
    fn from(scalar: Scalar) -> Self {
        HostValue::Scalar(scalar)
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),*) => {$(
        impl From<$ty> for HostValue {
            fn from(v: $ty) -> Self {
                HostValue::Scalar(Scalar::$variant(v))
            }
        }
    )*};
}

impl_from_primitive!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);
