//! Process-wide device cache.
//!
//! Resolves a driver list to one `Device` and memoizes the result by the
//! verbatim list string, so every caller passing the same string shares one
//! device instance. Entries are never evicted except by `clear()`.
//!
//! Each key owns a slot guarded by its own mutex. The first resolver of a
//! key holds the slot lock while the device is created, so concurrent
//! resolvers of the same key wait and then observe the winner's device.
//! Resolution of different keys proceeds in parallel.

use crate::device::Device;
use crate::driver_registry::DriverRegistry;
use crate::driver_spec::DriverSpec;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use vmrt_common::hal::driver::HalError;

type DeviceSlot = Arc<Mutex<Option<Arc<Device>>>>;

static GLOBAL_CACHE: LazyLock<DeviceCache> =
    LazyLock::new(|| DeviceCache::with_registry(DriverRegistry::with_builtin_drivers()));

/// Driver list → device cache.
pub struct DeviceCache {
    registry: DriverRegistry,
    slots: Mutex<HashMap<String, DeviceSlot>>,
}

impl DeviceCache {
    /// The process-wide cache over the built-in drivers.
    pub fn global() -> &'static DeviceCache {
        &GLOBAL_CACHE
    }

    /// Create an independent cache over `registry`.
    pub fn with_registry(registry: DriverRegistry) -> Self {
        Self {
            registry,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Registry consulted for driver names.
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Resolve `drivers` to a shared device, creating it on first use.
    ///
    /// # Errors
    /// Returns `HalError::NoDeviceFound` naming the verbatim list when no
    /// candidate yields a device. Failures are not cached.
    pub fn resolve(&self, drivers: &str) -> Result<Arc<Device>, HalError> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(drivers.to_string()).or_default())
        };

        let mut entry = slot.lock();
        if let Some(device) = entry.as_ref() {
            debug!("Device cache hit for \"{}\" (device #{})", drivers, device.id());
            return Ok(Arc::clone(device));
        }

        let device = Arc::new(self.create_device(&DriverSpec::parse(drivers))?);
        *entry = Some(Arc::clone(&device));
        Ok(device)
    }

    /// Create a fresh, uncached device from the first available candidate.
    ///
    /// # Errors
    /// Returns `HalError::NoDeviceFound` when every candidate is unknown or
    /// fails to initialize.
    pub fn create_device(&self, spec: &DriverSpec) -> Result<Device, HalError> {
        for name in spec.candidates() {
            let driver = match self.registry.create_driver(name) {
                Ok(driver) => driver,
                Err(e) => {
                    debug!("Skipping driver '{}': {}", name, e);
                    continue;
                }
            };
            match Device::new(driver) {
                Ok(device) => {
                    info!("Resolved \"{}\" to driver '{}'", spec, name);
                    return Ok(device);
                }
                Err(e) => debug!("Driver '{}' unavailable: {}", name, e),
            }
        }
        Err(HalError::NoDeviceFound {
            drivers: spec.source().to_string(),
        })
    }

    /// Number of driver lists with a resolved device.
    pub fn len(&self) -> usize {
        let slots: Vec<DeviceSlot> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    /// Whether no device has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry. Devices stay alive while still referenced.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}
