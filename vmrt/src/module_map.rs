//! Insertion-ordered module and function lookup.
//!
//! `context.modules()["arithmetic"]["simple_mul"]` resolves through two
//! ordered maps: `ModuleMap` (module name → `BoundModule`) and
//! `BoundModule` (function name → `Function`). Indexing panics on unknown
//! names like `HashMap` does; use `get` for fallible lookup.

use crate::function::Function;
use crate::module::VmModule;
use crate::tracer::Tracer;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use vmrt_hal::Device;

/// A module registered in a context, with its functions bound to the
/// context's device.
#[derive(Clone)]
pub struct BoundModule {
    module: VmModule,
    functions: Vec<Function>,
}

impl BoundModule {
    pub(crate) fn bind(
        module: &VmModule,
        device: &Arc<Device>,
        tracer: Option<&Arc<Tracer>>,
        context: u64,
    ) -> Self {
        let functions = (0..module.loaded_functions().len())
            .map(|index| Function::bind(module, index, Arc::clone(device), tracer.cloned(), context))
            .collect();
        Self {
            module: module.clone(),
            functions,
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// The loaded module behind this binding.
    pub fn vm_module(&self) -> &VmModule {
        &self.module
    }

    /// Look up a function by name.
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Function names in declaration order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(Function::name)
    }

    /// Number of functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True if the module exports nothing.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Index<&str> for BoundModule {
    type Output = Function;

    fn index(&self, name: &str) -> &Function {
        match self.get(name) {
            Some(function) => function,
            None => panic!("module '{}' has no function '{}'", self.name(), name),
        }
    }
}

impl fmt::Display for BoundModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<VmModule {} : [{}]>",
            self.name(),
            self.function_names().collect::<Vec<_>>().join(", ")
        )
    }
}

impl fmt::Debug for BoundModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Modules of a context, ordered by registration.
#[derive(Debug, Clone, Default)]
pub struct ModuleMap {
    modules: Vec<BoundModule>,
}

impl ModuleMap {
    /// Look up a module by name.
    pub fn get(&self, name: &str) -> Option<&BoundModule> {
        self.modules.iter().find(|m| m.name() == name)
    }

    /// True if a module with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Module names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(BoundModule::name)
    }

    /// Modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BoundModule> {
        self.modules.iter()
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True if no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Append a module. The caller has checked the name is free.
    pub(crate) fn insert(&mut self, module: BoundModule) -> &BoundModule {
        self.modules.push(module);
        &self.modules[self.modules.len() - 1]
    }
}

impl Index<&str> for ModuleMap {
    type Output = BoundModule;

    fn index(&self, name: &str) -> &BoundModule {
        match self.get(name) {
            Some(module) => module,
            None => panic!("no module named '{name}'"),
        }
    }
}

impl<'a> IntoIterator for &'a ModuleMap {
    type Item = &'a BoundModule;
    type IntoIter = std::slice::Iter<'a, BoundModule>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.iter()
    }
}
