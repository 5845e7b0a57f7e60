//! Module binaries: format, loading and building.
//!
//! A module binary is the 4-byte magic `VMBC`, a little-endian `u32`
//! format version, and a bincode-encoded module definition. Loading
//! validates everything the interpreter relies on, so a loaded `VmModule`
//! never fails on malformed bytecode at call time.

use crate::error::RuntimeError;
use crate::signature::{Signature, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use vmrt_common::consts::{MODULE_FORMAT_VERSION, MODULE_MAGIC};
use vmrt_common::hal::types::{BinaryOp, TensorType, UnaryOp};

const HEADER_LEN: usize = MODULE_MAGIC.len() + 4;

/// Register index.
pub type Reg = u16;

/// One interpreter instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// `dst = lhs <op> rhs` elementwise over buffers
    Binary {
        /// Kernel
        op: BinaryOp,
        /// Left operand
        lhs: Reg,
        /// Right operand
        rhs: Reg,
        /// Destination
        dst: Reg,
    },
    /// `dst = <op> src` elementwise over a buffer
    Unary {
        /// Kernel
        op: UnaryOp,
        /// Operand
        src: Reg,
        /// Destination
        dst: Reg,
    },
    /// `dst = rank(src)` as i32
    Rank {
        /// Buffer
        src: Reg,
        /// Destination
        dst: Reg,
    },
    /// `dst = shape(src)[axis]` as i64, `axis` read from an integer register
    Dim {
        /// Buffer
        src: Reg,
        /// Register holding the axis
        axis: Reg,
        /// Destination
        dst: Reg,
    },
    /// `dst = element_count(src)` as i64
    ElementCount {
        /// Buffer
        src: Reg,
        /// Destination
        dst: Reg,
    },
    /// Return the listed registers in order
    Return {
        /// Result registers
        results: Vec<Reg>,
    },
}

impl Op {
    fn registers(&self) -> Vec<Reg> {
        match self {
            Op::Binary { lhs, rhs, dst, .. } => vec![*lhs, *rhs, *dst],
            Op::Unary { src, dst, .. } | Op::Rank { src, dst } | Op::ElementCount { src, dst } => {
                vec![*src, *dst]
            }
            Op::Dim { src, axis, dst } => vec![*src, *axis, *dst],
            Op::Return { results } => results.clone(),
        }
    }
}

/// Definition of one exported function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Export name
    pub name: String,
    /// Calling convention, e.g. `0rr_r`
    pub calling_convention: String,
    /// Free-form reflection metadata
    pub reflection: BTreeMap<String, String>,
    /// Declared tensor type per argument (empty, or one entry per argument)
    pub arg_types: Vec<Option<TensorType>>,
    /// Register file size
    pub register_count: u16,
    /// Instructions
    pub body: Vec<Op>,
}

impl FunctionDef {
    /// Start a function definition.
    pub fn new(name: impl Into<String>, calling_convention: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calling_convention: calling_convention.into(),
            reflection: BTreeMap::new(),
            arg_types: Vec::new(),
            register_count: 0,
            body: Vec::new(),
        }
    }

    /// Add a reflection entry.
    pub fn reflection(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.reflection.insert(key.into(), value.into());
        self
    }

    /// Declare the tensor type of the next argument.
    pub fn arg_type(mut self, ty: Option<TensorType>) -> Self {
        self.arg_types.push(ty);
        self
    }

    /// Set the register file size.
    pub fn registers(mut self, count: u16) -> Self {
        self.register_count = count;
        self
    }

    /// Append an instruction.
    pub fn op(mut self, op: Op) -> Self {
        self.body.push(op);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModuleDef {
    name: String,
    functions: Vec<FunctionDef>,
}

/// Function as seen after load: definition plus parsed signature.
#[derive(Debug)]
pub(crate) struct LoadedFunction {
    pub(crate) def: FunctionDef,
    pub(crate) signature: Signature,
}

#[derive(Debug)]
struct LoadedModule {
    name: String,
    functions: Vec<LoadedFunction>,
    bytes: Vec<u8>,
}

/// A loaded, validated, immutable module.
///
/// Cloning is cheap and shares the loaded definition.
#[derive(Debug, Clone)]
pub struct VmModule {
    inner: Arc<LoadedModule>,
}

impl VmModule {
    /// Load a module from its binary representation.
    ///
    /// # Errors
    /// Returns `RuntimeError::ModuleLoad` for a bad header, an undecodable
    /// payload, or a definition that fails validation.
    pub fn load(bytes: impl Into<Vec<u8>>) -> Result<Self, RuntimeError> {
        let bytes = bytes.into();
        if bytes.len() < HEADER_LEN || bytes[..MODULE_MAGIC.len()] != MODULE_MAGIC {
            return Err(RuntimeError::ModuleLoad(
                "not a module binary (bad magic)".to_string(),
            ));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[MODULE_MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != MODULE_FORMAT_VERSION {
            return Err(RuntimeError::ModuleLoad(format!(
                "unsupported module format version {version} (expected {MODULE_FORMAT_VERSION})"
            )));
        }

        let def: ModuleDef = bincode::deserialize(&bytes[HEADER_LEN..])
            .map_err(|e| RuntimeError::ModuleLoad(format!("corrupt module payload: {e}")))?;
        let functions = validate_module(&def)?;
        debug!(
            "Loaded module '{}' with {} functions ({} bytes)",
            def.name,
            functions.len(),
            bytes.len()
        );

        Ok(Self {
            inner: Arc::new(LoadedModule {
                name: def.name,
                functions,
                bytes,
            }),
        })
    }

    /// Load a module binary from a file.
    pub fn load_file(path: &Path) -> Result<Self, RuntimeError> {
        let bytes = std::fs::read(path).map_err(|e| {
            RuntimeError::ModuleLoad(format!("Failed to read module {}: {}", path.display(), e))
        })?;
        Self::load(bytes)
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Exact bytes this module was loaded from.
    pub fn bytes(&self) -> &[u8] {
        &self.inner.bytes
    }

    /// Exported function names in declaration order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.inner.functions.iter().map(|f| f.def.name.as_str())
    }

    /// Signature of an exported function.
    pub fn signature(&self, function: &str) -> Option<&Signature> {
        self.inner
            .functions
            .iter()
            .find(|f| f.def.name == function)
            .map(|f| &f.signature)
    }

    pub(crate) fn loaded_functions(&self) -> &[LoadedFunction] {
        &self.inner.functions
    }
}

fn validate_module(def: &ModuleDef) -> Result<Vec<LoadedFunction>, RuntimeError> {
    if def.name.is_empty() {
        return Err(RuntimeError::ModuleLoad("module name is empty".to_string()));
    }
    let mut seen = HashSet::new();
    def.functions
        .iter()
        .map(|f| {
            if !seen.insert(f.name.as_str()) {
                return Err(RuntimeError::ModuleLoad(format!(
                    "module '{}' exports '{}' twice",
                    def.name, f.name
                )));
            }
            validate_function(f)
                .map(|signature| LoadedFunction {
                    def: f.clone(),
                    signature,
                })
                .map_err(|reason| {
                    RuntimeError::ModuleLoad(format!("{}.{}: {}", def.name, f.name, reason))
                })
        })
        .collect()
}

fn validate_function(f: &FunctionDef) -> Result<Signature, String> {
    if f.name.is_empty() {
        return Err("function name is empty".to_string());
    }
    let signature = Signature::parse(&f.calling_convention)?;
    if signature.arity() > usize::from(f.register_count) {
        return Err(format!(
            "{} arguments do not fit {} registers",
            signature.arity(),
            f.register_count
        ));
    }
    if !f.arg_types.is_empty() {
        if f.arg_types.len() != signature.arity() {
            return Err(format!(
                "{} argument types declared for {} arguments",
                f.arg_types.len(),
                signature.arity()
            ));
        }
        let typed_scalar = f
            .arg_types
            .iter()
            .zip(signature.args())
            .position(|(ty, kind)| ty.is_some() && *kind != ValueKind::Ref);
        if let Some(index) = typed_scalar {
            return Err(format!("argument {index} is a scalar but declares a tensor type"));
        }
    }
    for op in &f.body {
        if let Some(reg) = op.registers().into_iter().find(|r| *r >= f.register_count) {
            return Err(format!("register {reg} out of range in {op:?}"));
        }
    }
    for (index, op) in f.body.iter().enumerate() {
        let Op::Return { results } = op else {
            continue;
        };
        if results.len() != signature.results().len() {
            return Err(format!(
                "return at op {} yields {} values but the signature declares {}",
                index,
                results.len(),
                signature.results().len()
            ));
        }
    }
    if !matches!(f.body.last(), Some(Op::Return { .. })) {
        return Err("body does not end with a return".to_string());
    }
    Ok(signature)
}

/// Assembles module binaries.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    def: ModuleDef,
}

impl ModuleBuilder {
    /// Start a module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            def: ModuleDef {
                name: name.into(),
                functions: Vec::new(),
            },
        }
    }

    /// Add an exported function.
    pub fn function(mut self, function: FunctionDef) -> Self {
        self.def.functions.push(function);
        self
    }

    /// Encode the module binary.
    ///
    /// # Errors
    /// Returns `RuntimeError::ModuleLoad` if the definition is invalid.
    pub fn build(&self) -> Result<Vec<u8>, RuntimeError> {
        validate_module(&self.def)?;
        let payload = bincode::serialize(&self.def)
            .map_err(|e| RuntimeError::ModuleLoad(format!("Failed to encode module: {e}")))?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&MODULE_MAGIC);
        bytes.extend_from_slice(&MODULE_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Encode and immediately load the module.
    pub fn build_module(&self) -> Result<VmModule, RuntimeError> {
        VmModule::load(self.build()?)
    }
}
