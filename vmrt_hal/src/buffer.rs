//! Device-resident buffer views.
//!
//! A `BufferView` describes an immutable buffer owned by one device. Views
//! are reference counted: cloning one, or passing it back into another
//! call, never copies the underlying storage.

use std::fmt;
use std::sync::Arc;
use vmrt_common::hal::types::{ArrayData, ElementType, TensorType};

/// Shaped, typed view over device storage.
#[derive(Clone)]
pub struct BufferView {
    device_id: u64,
    shape: Arc<[usize]>,
    element_type: ElementType,
    storage: Arc<ArrayData>,
}

impl BufferView {
    /// Wrap storage already validated against `shape`.
    pub(crate) fn new(device_id: u64, shape: Vec<usize>, storage: ArrayData) -> Self {
        Self {
            device_id,
            shape: shape.into(),
            element_type: storage.element_type(),
            storage: Arc::new(storage),
        }
    }

    /// Id of the device owning the storage.
    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    /// Dimensions of the view.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn element_count(&self) -> usize {
        self.storage.len()
    }

    /// Element type of the view.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Declared tensor type of the view.
    pub fn tensor_type(&self) -> TensorType {
        TensorType::new(self.shape.to_vec(), self.element_type)
    }

    /// Whether both views alias the same storage.
    pub fn shares_storage_with(&self, other: &BufferView) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    pub(crate) fn storage(&self) -> &ArrayData {
        &self.storage
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BufferView({} on device {})",
            self.tensor_type(),
            self.device_id
        )
    }
}
