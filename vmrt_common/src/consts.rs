//! System-wide constants for the VMRT workspace.
//!
//! Single source of truth for well-known names, file layout and defaults.
//! Imported by all crates.

/// Driver list used when no explicit configuration is given.
pub const DEFAULT_DRIVERS: &str = "local-task";

/// Delimiter between candidate driver names in a driver list.
pub const DRIVER_LIST_DELIMITER: char = ',';

/// Environment variable supplying a default trace output directory.
pub const TRACE_PATH_ENV_KEY: &str = "VMRT_TRACE_PATH";

/// Name of the built-in control module present in every context.
pub const HAL_MODULE_NAME: &str = "hal";

/// File extension of module binaries (and of trace module snapshots).
pub const MODULE_FILE_EXTENSION: &str = "vmbc";

/// File name of the append-only call log inside a trace directory.
pub const CALL_LOG_FILE_NAME: &str = "calls.yaml";

/// Magic bytes opening every module binary.
pub const MODULE_MAGIC: [u8; 4] = *b"VMBC";

/// Current module binary format version.
pub const MODULE_FORMAT_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(!DEFAULT_DRIVERS.is_empty());
        assert!(!DEFAULT_DRIVERS.contains(DRIVER_LIST_DELIMITER));
        assert!(CALL_LOG_FILE_NAME.starts_with("calls."));
        assert!(MODULE_FORMAT_VERSION > 0);
    }

    #[test]
    fn magic_is_ascii() {
        assert!(MODULE_MAGIC.iter().all(u8::is_ascii_uppercase));
    }
}
