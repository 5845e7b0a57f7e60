//! Call tracing.
//!
//! A `Tracer` writes into one directory:
//! - `<module>.vmbc`: the exact bytes of every module registered while
//!   tracing, written once per module name
//! - `calls.yaml`: a multi-document YAML stream with one document per
//!   successful call, appended and flushed as each call completes
//!
//! The call log is never rewritten; document order is completion order.
//!
//! Every config tracing into one directory shares the tracer returned by
//! [`Tracer::shared`], so sequence numbers and snapshot dedup hold per
//! directory rather than per config.

use crate::error::{Result, RuntimeError};
use crate::module::VmModule;
use crate::value::HostValue;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use vmrt_common::consts::{CALL_LOG_FILE_NAME, MODULE_FILE_EXTENSION, TRACE_PATH_ENV_KEY};
use vmrt_common::hal::types::{ArrayData, ElementType, HostArray, Scalar};

/// Recorded argument or result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceValue {
    /// Array contents
    Array {
        /// Dimensions
        shape: Vec<usize>,
        /// Element type
        element_type: ElementType,
        /// Elements, row-major
        data: TraceData,
    },
    /// Scalar
    Scalar {
        /// Element type
        element_type: ElementType,
        /// Value
        value: TraceNumber,
    },
}

/// Scalar value as written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceNumber {
    /// Integer scalar
    Int(i64),
    /// Float scalar
    Float(f64),
}

/// Array elements as written to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceData {
    /// Integer elements
    Int(Vec<i64>),
    /// Float elements
    Float(Vec<f64>),
}

impl TraceValue {
    /// Snapshot a call value. Device arrays are downloaded.
    pub fn capture(value: &HostValue) -> Result<Self> {
        match value {
            HostValue::Scalar(s) => Ok(TraceValue::Scalar {
                element_type: s.element_type(),
                value: match *s {
                    Scalar::I32(v) => TraceNumber::Int(i64::from(v)),
                    Scalar::I64(v) => TraceNumber::Int(v),
                    Scalar::F32(v) => TraceNumber::Float(f64::from(v)),
                    Scalar::F64(v) => TraceNumber::Float(v),
                },
            }),
            other => {
                let array = other.to_array()?;
                let data = match array.data() {
                    ArrayData::F32(v) => TraceData::Float(v.iter().map(|&x| f64::from(x)).collect()),
                    ArrayData::F64(v) => TraceData::Float(v.clone()),
                    ArrayData::I32(v) => TraceData::Int(v.iter().map(|&x| i64::from(x)).collect()),
                    ArrayData::I64(v) => TraceData::Int(v.clone()),
                };
                Ok(TraceValue::Array {
                    shape: array.shape().to_vec(),
                    element_type: array.element_type(),
                    data,
                })
            }
        }
    }

    /// Rebuild the host value this snapshot was taken from.
    pub fn to_host_value(&self) -> Result<HostValue> {
        match self {
            TraceValue::Scalar {
                element_type,
                value,
            } => {
                let scalar = match (element_type, *value) {
                    (ElementType::I32, TraceNumber::Int(v)) => i32::try_from(v).ok().map(Scalar::I32),
                    (ElementType::I64, TraceNumber::Int(v)) => Some(Scalar::I64(v)),
                    (ElementType::F32, TraceNumber::Float(v)) => Some(Scalar::F32(v as f32)),
                    (ElementType::F64, TraceNumber::Float(v)) => Some(Scalar::F64(v)),
                    (ElementType::F32, TraceNumber::Int(v)) => Some(Scalar::F32(v as f32)),
                    (ElementType::F64, TraceNumber::Int(v)) => Some(Scalar::F64(v as f64)),
                    _ => None,
                };
                scalar.map(HostValue::Scalar).ok_or_else(|| {
                    RuntimeError::Trace(format!("{value:?} is not a valid {element_type} scalar"))
                })
            }
            TraceValue::Array {
                shape,
                element_type,
                data,
            } => {
                let data = match (element_type, data) {
                    (ElementType::F32, TraceData::Float(v)) => {
                        ArrayData::F32(v.iter().map(|&x| x as f32).collect())
                    }
                    (ElementType::F64, TraceData::Float(v)) => ArrayData::F64(v.clone()),
                    (ElementType::I32, TraceData::Int(v)) => ArrayData::I32(
                        v.iter()
                            .map(|&x| i32::try_from(x))
                            .collect::<std::result::Result<_, _>>()
                            .map_err(|e| RuntimeError::Trace(format!("i32 element out of range: {e}")))?,
                    ),
                    (ElementType::I64, TraceData::Int(v)) => ArrayData::I64(v.clone()),
                    // Whole-valued floats may be written without a fraction.
                    (ElementType::F32, TraceData::Int(v)) => {
                        ArrayData::F32(v.iter().map(|&x| x as f32).collect())
                    }
                    (ElementType::F64, TraceData::Int(v)) => {
                        ArrayData::F64(v.iter().map(|&x| x as f64).collect())
                    }
                    (ty, TraceData::Float(_)) => {
                        return Err(RuntimeError::Trace(format!(
                            "{ty} array recorded with float elements"
                        )));
                    }
                };
                Ok(HostValue::Array(HostArray::from_data(shape.clone(), data)?))
            }
        }
    }
}

/// One document of the call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLogEntry {
    /// Position in the log, starting at 0
    pub seq: u64,
    /// Id of the context that made the call
    pub context: u64,
    /// Module name
    pub module: String,
    /// Function name
    pub function: String,
    /// Calling convention of the function
    pub calling_convention: String,
    /// Arguments, in order
    pub inputs: Vec<TraceValue>,
    /// Results, in order
    pub outputs: Vec<TraceValue>,
}

impl CallLogEntry {
    /// Arguments as host values, ready to be passed to the function again.
    pub fn input_values(&self) -> Result<Vec<HostValue>> {
        self.inputs.iter().map(TraceValue::to_host_value).collect()
    }
}

/// Successful call as handed to the tracer.
pub(crate) struct CallRecord<'a> {
    pub(crate) context: u64,
    pub(crate) module: &'a str,
    pub(crate) function: &'a str,
    pub(crate) calling_convention: String,
    pub(crate) inputs: &'a [HostValue],
    pub(crate) outputs: &'a [HostValue],
}

struct CallLog {
    file: Option<File>,
    next_seq: u64,
}

/// Tracers handed out by [`Tracer::shared`], keyed by canonical directory.
static SHARED_TRACERS: LazyLock<Mutex<HashMap<PathBuf, Arc<Tracer>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Records module snapshots and successful calls to a directory.
pub struct Tracer {
    dir: PathBuf,
    persisted: Mutex<HashSet<String>>,
    calls: Mutex<CallLog>,
}

impl Tracer {
    /// Create a standalone tracer writing into `dir`, creating it if needed.
    ///
    /// Sequence numbers continue after the last entry of an existing call
    /// log. The instance is not shared: two standalone tracers on one
    /// directory keep separate sequences. Use [`Tracer::shared`] when
    /// several configs trace into the same place.
    ///
    /// # Errors
    /// Returns `RuntimeError::Trace` if the directory cannot be created or
    /// an existing call log cannot be read.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            RuntimeError::Trace(format!("Failed to create trace directory {}: {}", dir.display(), e))
        })?;
        let log_path = dir.join(CALL_LOG_FILE_NAME);
        let next_seq = if log_path.exists() {
            Self::read_call_log(&log_path)?
                .last()
                .map_or(0, |entry| entry.seq + 1)
        } else {
            0
        };
        info!("Tracing calls to {} (next seq {})", dir.display(), next_seq);
        Ok(Self {
            dir,
            persisted: Mutex::new(HashSet::new()),
            calls: Mutex::new(CallLog {
                file: None,
                next_seq,
            }),
        })
    }

    /// The process-wide tracer for `dir`, created on first use.
    ///
    /// Paths naming the same directory return the same instance.
    ///
    /// # Errors
    /// Returns `RuntimeError::Trace` if the directory cannot be created,
    /// resolved, or its existing call log read.
    pub fn shared(dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            RuntimeError::Trace(format!("Failed to create trace directory {}: {}", dir.display(), e))
        })?;
        let key = fs::canonicalize(&dir).map_err(|e| {
            RuntimeError::Trace(format!("Failed to resolve {}: {}", dir.display(), e))
        })?;

        let mut tracers = SHARED_TRACERS.lock();
        if let Some(tracer) = tracers.get(&key) {
            debug!("Reusing tracer for {}", key.display());
            return Ok(Arc::clone(tracer));
        }
        let tracer = Arc::new(Self::new(dir)?);
        tracers.insert(key, Arc::clone(&tracer));
        Ok(tracer)
    }

    /// Shared tracer from the trace environment variable, if it is set to a
    /// non-empty path.
    pub fn from_env() -> Result<Option<Arc<Self>>> {
        match std::env::var_os(TRACE_PATH_ENV_KEY) {
            Some(dir) if !dir.is_empty() => {
                debug!("{} set, enabling tracing", TRACE_PATH_ENV_KEY);
                Self::shared(dir).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Destination directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path for a module name.
    pub fn module_path(&self, module_name: &str) -> PathBuf {
        self.dir
            .join(format!("{module_name}.{MODULE_FILE_EXTENSION}"))
    }

    /// Path of the call log.
    pub fn call_log_path(&self) -> PathBuf {
        self.dir.join(CALL_LOG_FILE_NAME)
    }

    /// Write the module's bytes unless a module of that name was already
    /// written by this tracer. Returns whether a file was written.
    pub fn persist_module(&self, module: &VmModule) -> Result<bool> {
        let mut persisted = self.persisted.lock();
        if persisted.contains(module.name()) {
            debug!("Module '{}' already persisted", module.name());
            return Ok(false);
        }
        let path = self.module_path(module.name());
        fs::write(&path, module.bytes()).map_err(|e| {
            RuntimeError::Trace(format!("Failed to write {}: {}", path.display(), e))
        })?;
        persisted.insert(module.name().to_string());
        info!("Persisted module '{}' to {}", module.name(), path.display());
        Ok(true)
    }

    /// Append one call to the log and flush it.
    pub(crate) fn record_call(&self, record: CallRecord<'_>) -> Result<()> {
        let inputs = record
            .inputs
            .iter()
            .map(TraceValue::capture)
            .collect::<Result<Vec<_>>>()?;
        let outputs = record
            .outputs
            .iter()
            .map(TraceValue::capture)
            .collect::<Result<Vec<_>>>()?;

        let mut log = self.calls.lock();
        let entry = CallLogEntry {
            seq: log.next_seq,
            context: record.context,
            module: record.module.to_string(),
            function: record.function.to_string(),
            calling_convention: record.calling_convention,
            inputs,
            outputs,
        };
        let mut document = String::from("---\n");
        document.push_str(
            &serde_yaml::to_string(&entry)
                .map_err(|e| RuntimeError::Trace(format!("Failed to encode call: {e}")))?,
        );

        let path = self.call_log_path();
        let mut file = match log.file.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    RuntimeError::Trace(format!("Failed to open {}: {}", path.display(), e))
                })?,
        };
        // Separator and document go out in a single write.
        file.write_all(document.as_bytes())
            .map_err(|e| RuntimeError::Trace(format!("Failed to append to {}: {}", path.display(), e)))?;
        log.file = Some(file);

        debug!(
            "Traced call #{} {}.{}",
            entry.seq, entry.module, entry.function
        );
        log.next_seq += 1;
        Ok(())
    }

    /// Read every entry of a call log, in order.
    pub fn read_call_log(path: &Path) -> Result<Vec<CallLogEntry>> {
        let text = fs::read_to_string(path).map_err(|e| {
            RuntimeError::Trace(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_yaml::Deserializer::from_str(&text)
            .map(CallLogEntry::deserialize)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RuntimeError::Trace(format!("Malformed call log {}: {}", path.display(), e)))
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer").field("dir", &self.dir).finish()
    }
}
