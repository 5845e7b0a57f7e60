//! Execution configuration: a resolved device plus an optional tracer.

use crate::error::Result;
use crate::tracer::Tracer;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use vmrt_common::config::RuntimeConfig;
use vmrt_common::consts::DEFAULT_DRIVERS;
use vmrt_hal::{Device, DeviceCache};

/// Device and tracer shared by every context built from it.
///
/// Configs built from the same driver list string share one `Device`
/// instance through the process-wide `DeviceCache`.
#[derive(Clone)]
pub struct Config {
    device: Arc<Device>,
    drivers: Option<String>,
    tracer: Option<Arc<Tracer>>,
}

impl Config {
    /// Resolve `drivers` (comma-separated, in priority order).
    ///
    /// Tracing is enabled from `VMRT_TRACE_PATH` when set.
    ///
    /// # Errors
    /// `RuntimeError::DriverResolution` when no candidate driver is available.
    pub fn new(drivers: &str) -> Result<Self> {
        Self::with_tracer(drivers, None)
    }

    /// Resolve `drivers` and attach `tracer`. With `None`, the trace
    /// environment variable is consulted.
    pub fn with_tracer(drivers: &str, tracer: Option<Arc<Tracer>>) -> Result<Self> {
        Self::with_cache(DeviceCache::global(), drivers, tracer)
    }

    /// Like [`Config::with_tracer`], resolving through `cache` instead of the
    /// global cache.
    pub fn with_cache(
        cache: &DeviceCache,
        drivers: &str,
        tracer: Option<Arc<Tracer>>,
    ) -> Result<Self> {
        let device = cache.resolve(drivers)?;
        debug!(
            "Config for \"{}\" uses device #{} ({})",
            drivers,
            device.id(),
            device.driver_name()
        );
        Ok(Self {
            device,
            drivers: Some(drivers.to_string()),
            tracer: resolve_tracer(tracer)?,
        })
    }

    /// Wrap an existing device.
    pub fn from_device(device: Arc<Device>, tracer: Option<Arc<Tracer>>) -> Result<Self> {
        Ok(Self {
            device,
            drivers: None,
            tracer: resolve_tracer(tracer)?,
        })
    }

    /// Config on the default driver list.
    pub fn default_config() -> Result<Self> {
        Self::new(DEFAULT_DRIVERS)
    }

    /// Build from a loaded runtime configuration file. A configured trace
    /// directory uses the shared tracer for that directory.
    pub fn from_runtime_config(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let tracer = config.trace_dir.as_ref().map(Tracer::shared).transpose()?;
        Self::with_tracer(&config.drivers, tracer)
    }

    /// Resolved device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Driver list this config was resolved from, if any.
    pub fn drivers(&self) -> Option<&str> {
        self.drivers.as_deref()
    }

    /// Attached tracer.
    pub fn tracer(&self) -> Option<&Arc<Tracer>> {
        self.tracer.as_ref()
    }
}

fn resolve_tracer(explicit: Option<Arc<Tracer>>) -> Result<Option<Arc<Tracer>>> {
    match explicit {
        Some(tracer) => Ok(Some(tracer)),
        None => Tracer::from_env(),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("drivers", &self.drivers)
            .field("device", &self.device.id())
            .field("tracer", &self.tracer.as_ref().map(|t| t.dir().to_path_buf()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use tempfile::TempDir;
    use vmrt_hal::DriverRegistry;

    #[test]
    fn same_string_shares_device() {
        let cache = DeviceCache::with_registry(DriverRegistry::with_builtin_drivers());
        let a = Config::with_cache(&cache, "local-sync", None).unwrap();
        let b = Config::with_cache(&cache, "local-sync", None).unwrap();
        assert!(Arc::ptr_eq(a.device(), b.device()));
        assert_eq!(a.drivers(), Some("local-sync"));
    }

    #[test]
    fn unavailable_list_fails_with_verbatim_text() {
        let cache = DeviceCache::with_registry(DriverRegistry::with_builtin_drivers());
        let err = Config::with_cache(&cache, "nothere1,nothere2", None).unwrap_err();
        assert!(matches!(err, RuntimeError::DriverResolution { .. }));
        assert!(err.to_string().contains("nothere1,nothere2"));
    }

    #[test]
    fn explicit_tracer_is_kept() {
        let dir = TempDir::new().unwrap();
        let tracer = Arc::new(Tracer::new(dir.path()).unwrap());
        let cache = DeviceCache::with_registry(DriverRegistry::with_builtin_drivers());
        let config = Config::with_cache(&cache, "local-sync", Some(Arc::clone(&tracer))).unwrap();
        assert!(Arc::ptr_eq(config.tracer().unwrap(), &tracer));
    }

    #[test]
    fn runtime_config_creates_tracer() {
        let dir = TempDir::new().unwrap();
        let trace_dir = dir.path().join("trace");
        let runtime = RuntimeConfig {
            drivers: "local-sync".to_string(),
            trace_dir: Some(trace_dir.clone()),
            ..RuntimeConfig::default()
        };
        let config = Config::from_runtime_config(&runtime).unwrap();
        assert_eq!(config.tracer().unwrap().dir(), trace_dir);
        assert!(trace_dir.is_dir());

        let again = Config::from_runtime_config(&runtime).unwrap();
        assert!(Arc::ptr_eq(config.tracer().unwrap(), again.tracer().unwrap()));
    }
}
