//! Device: one initialized driver plus buffer management.
//!
//! A `Device` is the resolved, ready-to-use execution target handed out by
//! the `DeviceCache`. It is shared (`Arc`) by every context built on the
//! same driver list and is safe to use from several threads.

use crate::buffer::BufferView;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use vmrt_common::hal::driver::{DriverDiagnostics, HalDriver, HalError};
use vmrt_common::hal::types::{BinaryOp, HostArray, UnaryOp};

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Execution target backed by one driver instance.
pub struct Device {
    /// Process-unique id
    id: u64,
    /// Initialized driver
    driver: Box<dyn HalDriver>,
}

impl Device {
    /// Initialize `driver` and wrap it into a device.
    ///
    /// # Errors
    /// Returns the driver's `init()` error when the backend is unavailable.
    pub fn new(mut driver: Box<dyn HalDriver>) -> Result<Self, HalError> {
        driver.init()?;
        let id = NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            "Created device #{} on driver {} v{}",
            id,
            driver.name(),
            driver.version()
        );
        Ok(Self { id, driver })
    }

    /// Process-unique device id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the driver backing this device.
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// Driver diagnostics, if the driver keeps any.
    pub fn diagnostics(&self) -> Option<DriverDiagnostics> {
        self.driver.diagnostics()
    }

    /// Copy a host array into a new device buffer.
    pub fn upload(&self, array: &HostArray) -> BufferView {
        self.upload_owned(array.clone())
    }

    /// Move a host array into a new device buffer.
    pub fn upload_owned(&self, array: HostArray) -> BufferView {
        let shape = array.shape().to_vec();
        debug!("Device #{} upload {}", self.id, array.tensor_type());
        BufferView::new(self.id, shape, array.into_data())
    }

    /// Copy a device buffer back to the host.
    ///
    /// # Errors
    /// Returns `HalError::ForeignBuffer` if the view belongs to another device.
    pub fn download(&self, view: &BufferView) -> Result<HostArray, HalError> {
        self.check_owned(view)?;
        HostArray::from_data(view.shape().to_vec(), view.storage().clone())
    }

    /// Import a buffer owned by another device through host memory.
    ///
    /// Views already owned by this device are returned unchanged.
    pub fn import(&self, source: &Device, view: &BufferView) -> Result<BufferView, HalError> {
        if view.device_id() == self.id {
            return Ok(view.clone());
        }
        debug!(
            "Transferring {} from device #{} to device #{}",
            view.tensor_type(),
            source.id(),
            self.id
        );
        Ok(self.upload_owned(source.download(view)?))
    }

    /// Run an elementwise binary kernel.
    ///
    /// # Errors
    /// Fails on foreign buffers, mismatched shapes or element types, and
    /// driver dispatch failures.
    pub fn dispatch_binary(
        &self,
        op: BinaryOp,
        lhs: &BufferView,
        rhs: &BufferView,
    ) -> Result<BufferView, HalError> {
        self.check_owned(lhs)?;
        self.check_owned(rhs)?;
        if lhs.shape() != rhs.shape() || lhs.element_type() != rhs.element_type() {
            return Err(HalError::ShapeMismatch(format!(
                "{:?} operands {} and {} are incompatible",
                op,
                lhs.tensor_type(),
                rhs.tensor_type()
            )));
        }
        let data = self
            .driver
            .dispatch_binary(op, lhs.storage(), rhs.storage())?;
        Ok(BufferView::new(self.id, lhs.shape().to_vec(), data))
    }

    /// Run an elementwise unary kernel.
    pub fn dispatch_unary(&self, op: UnaryOp, src: &BufferView) -> Result<BufferView, HalError> {
        self.check_owned(src)?;
        let data = self.driver.dispatch_unary(op, src.storage())?;
        Ok(BufferView::new(self.id, src.shape().to_vec(), data))
    }

    fn check_owned(&self, view: &BufferView) -> Result<(), HalError> {
        if view.device_id() != self.id {
            return Err(HalError::ForeignBuffer {
                buffer_device: view.device_id(),
                device: self.id,
            });
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        debug!("Releasing device #{} ({})", self.id, self.driver.name());
        if let Err(e) = self.driver.shutdown() {
            warn!("Driver {} shutdown failed: {}", self.driver.name(), e);
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("driver", &self.driver.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::local::{create_sync_driver, create_task_driver};

    #[test]
    fn upload_download_preserves_array() {
        let device = Device::new(create_sync_driver()).unwrap();
        let host = HostArray::new([2, 2], vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let view = device.upload(&host);
        assert_eq!(view.rank(), 2);
        assert_eq!(view.element_count(), 4);
        assert_eq!(device.download(&view).unwrap(), host);
    }

    #[test]
    fn devices_get_distinct_ids() {
        let a = Device::new(create_sync_driver()).unwrap();
        let b = Device::new(create_task_driver()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(b.driver_name(), "local-task");
    }

    #[test]
    fn foreign_buffers_are_rejected_but_importable() {
        let a = Device::new(create_sync_driver()).unwrap();
        let b = Device::new(create_sync_driver()).unwrap();
        let view = a.upload(&HostArray::from_slice(&[1i32, 2]));

        assert!(matches!(
            b.dispatch_unary(UnaryOp::Neg, &view),
            Err(HalError::ForeignBuffer { .. })
        ));

        let imported = b.import(&a, &view).unwrap();
        assert_eq!(imported.device_id(), b.id());
        let negated = b.dispatch_unary(UnaryOp::Neg, &imported).unwrap();
        assert_eq!(
            b.download(&negated).unwrap().as_slice::<i32>(),
            Some(&[-1, -2][..])
        );
    }

    #[test]
    fn import_on_owner_reuses_storage() {
        let device = Device::new(create_sync_driver()).unwrap();
        let view = device.upload(&HostArray::from_slice(&[1.0f32]));
        let same = device.import(&device, &view).unwrap();
        assert!(same.shares_storage_with(&view));
    }

    #[test]
    fn binary_rejects_shape_mismatch() {
        let device = Device::new(create_sync_driver()).unwrap();
        let a = device.upload(&HostArray::new([2, 2], vec![1.0f32; 4]).unwrap());
        let b = device.upload(&HostArray::new([4], vec![1.0f32; 4]).unwrap());
        assert!(matches!(
            device.dispatch_binary(BinaryOp::Add, &a, &b),
            Err(HalError::ShapeMismatch(_))
        ));
    }
}
