//! Name → driver factory lookup used during device resolution.

use std::collections::HashMap;
use vmrt_common::hal::driver::{DriverFactory, HalDriver, HalError};

use crate::drivers::register_builtin_drivers;

/// Driver factories by name.
///
/// A registry holds no global state. Each `DeviceCache` owns one and
/// consults it for every candidate name of a driver list; the process-wide
/// cache owns a registry built by [`DriverRegistry::with_builtin_drivers`].
/// Drivers returned by [`DriverRegistry::create_driver`] are fresh and not
/// yet initialized, so the registry never holds a live device.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        register_builtin_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create an uninitialized driver instance by name.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn HalDriver>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmrt_common::hal::types::{ArrayData, BinaryOp, UnaryOp};

    struct TestDriver;

    impl HalDriver for TestDriver {
        fn name(&self) -> &'static str {
            "test"
        }

        fn version(&self) -> &'static str {
            "0.1.0"
        }

        fn init(&mut self) -> Result<(), HalError> {
            Ok(())
        }

        fn dispatch_binary(
            &self,
            _op: BinaryOp,
            lhs: &ArrayData,
            _rhs: &ArrayData,
        ) -> Result<ArrayData, HalError> {
            Ok(lhs.clone())
        }

        fn dispatch_unary(&self, _op: UnaryOp, src: &ArrayData) -> Result<ArrayData, HalError> {
            Ok(src.clone())
        }
    }

    fn create_test_driver() -> Box<dyn HalDriver> {
        Box::new(TestDriver)
    }

    #[test]
    fn registry_register_and_create() {
        let mut reg = DriverRegistry::new();
        reg.register("test_driver", create_test_driver);

        let driver = reg.create_driver("test_driver").expect("should create");
        assert_eq!(driver.name(), "test");
    }

    #[test]
    fn registry_driver_not_found() {
        let reg = DriverRegistry::new();
        let result = reg.create_driver("nonexistent");
        assert!(matches!(result, Err(HalError::DriverNotFound(_))));
    }

    #[test]
    fn registry_builtin_drivers() {
        let reg = DriverRegistry::with_builtin_drivers();
        let mut names = reg.list_drivers();
        names.sort();
        assert_eq!(names, vec!["local-sync", "local-task"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut reg = DriverRegistry::new();
        reg.register("dup", create_test_driver);
        reg.register("dup", create_test_driver);
    }
}
