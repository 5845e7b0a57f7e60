//! Execution contexts: one device, the built-in `hal` module, and the
//! modules registered on top of it.
//!
//! # Lifecycle
//!
//! ```text
//! Dynamic:  new(config, None)          ─► [hal] ─► add_module* ─► ...
//! Static:   new(config, Some(modules)) ─► [hal, modules...] (closed)
//! ```
//!
//! A static context rejects every `add_module` call. Module names are unique
//! within a context; a colliding registration changes nothing.

use crate::config::Config;
use crate::error::{Result, RuntimeError};
use crate::hal_module::hal_module;
use crate::module::VmModule;
use crate::module_map::{BoundModule, ModuleMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use vmrt_hal::Device;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Whether a context accepts modules after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Modules can be added at any time
    Dynamic,
    /// Module set fixed at construction
    Static,
}

/// Module registry bound to one device.
#[derive(Debug)]
pub struct ExecutionContext {
    id: u64,
    config: Config,
    mode: ContextMode,
    modules: ModuleMap,
}

impl ExecutionContext {
    /// Create a context.
    ///
    /// `None` gives a dynamic context holding only `hal`. `Some(modules)`
    /// gives a static context holding `hal` followed by `modules`, closed to
    /// further registration.
    ///
    /// # Errors
    /// `ModuleNameCollision` if two supplied modules share a name (or one is
    /// named `hal`), and `Trace` if a module snapshot cannot be written.
    pub fn new(config: Config, vm_modules: Option<Vec<VmModule>>) -> Result<Self> {
        let mut context = Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            config,
            mode: ContextMode::Dynamic,
            modules: ModuleMap::default(),
        };
        let hal = hal_module()?;
        context.bind(&hal);

        match vm_modules {
            None => {
                info!("Created dynamic context #{}", context.id);
            }
            Some(modules) => {
                for module in &modules {
                    context.register(module)?;
                }
                context.mode = ContextMode::Static;
                info!(
                    "Created static context #{} with {} modules",
                    context.id,
                    context.modules.len()
                );
            }
        }
        Ok(context)
    }

    /// Dynamic context on `config`.
    pub fn dynamic(config: Config) -> Result<Self> {
        Self::new(config, None)
    }

    /// Static context holding exactly `modules` (plus `hal`).
    pub fn with_modules(config: Config, modules: impl IntoIterator<Item = VmModule>) -> Result<Self> {
        Self::new(config, Some(modules.into_iter().collect()))
    }

    /// Dynamic context on the default driver list.
    pub fn new_default() -> Result<Self> {
        Self::dynamic(Config::default_config()?)
    }

    /// Process-unique context id, as written to the call log.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Lifecycle mode.
    pub fn mode(&self) -> ContextMode {
        self.mode
    }

    /// True if modules can still be added.
    pub fn is_dynamic(&self) -> bool {
        self.mode == ContextMode::Dynamic
    }

    /// Config this context was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Device every function of this context runs on.
    pub fn device(&self) -> &Arc<Device> {
        self.config.device()
    }

    /// Registered modules, `hal` first.
    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    /// Register a module in a dynamic context.
    ///
    /// # Errors
    /// - `InvalidState` on a static context
    /// - `ModuleNameCollision` if the name is taken; the context is unchanged
    /// - `Trace` if the module snapshot cannot be written
    pub fn add_module(&mut self, module: &VmModule) -> Result<&BoundModule> {
        if self.mode == ContextMode::Static {
            return Err(RuntimeError::InvalidState(format!(
                "context #{} is static; cannot add module '{}'",
                self.id,
                module.name()
            )));
        }
        self.register(module)
    }

    fn register(&mut self, module: &VmModule) -> Result<&BoundModule> {
        if self.modules.contains(module.name()) {
            return Err(RuntimeError::ModuleNameCollision {
                name: module.name().to_string(),
            });
        }
        if let Some(tracer) = self.config.tracer() {
            tracer.persist_module(module)?;
        }
        info!(
            "Registered module '{}' in context #{}",
            module.name(),
            self.id
        );
        Ok(self.bind(module))
    }

    fn bind(&mut self, module: &VmModule) -> &BoundModule {
        debug!(
            "Binding {} functions of '{}' to device #{}",
            module.loaded_functions().len(),
            module.name(),
            self.config.device().id()
        );
        let bound = BoundModule::bind(module, self.config.device(), self.config.tracer(), self.id);
        self.modules.insert(bound)
    }
}

/// Load `module` into a fresh dynamic context and return its functions.
///
/// Uses `config`, or the default config when `None`. The returned module
/// keeps the device and tracer alive on its own.
pub fn load_vm_module(module: &VmModule, config: Option<Config>) -> Result<BoundModule> {
    let config = match config {
        Some(config) => config,
        None => Config::default_config()?,
    };
    let mut context = ExecutionContext::dynamic(config)?;
    context.add_module(module).cloned()
}
