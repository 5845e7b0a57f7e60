//! Driver list parsing.

use std::fmt;
use vmrt_common::consts::DRIVER_LIST_DELIMITER;

/// Ordered driver candidates parsed from a delimited string.
///
/// The verbatim source string is kept alongside the candidates; it is the
/// device cache key and appears unchanged in resolution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSpec {
    source: String,
    candidates: Vec<String>,
}

impl DriverSpec {
    /// Parse `source` on commas. Names are trimmed and empty entries dropped.
    pub fn parse(source: &str) -> Self {
        let candidates = source
            .split(DRIVER_LIST_DELIMITER)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            source: source.to_string(),
            candidates,
        }
    }

    /// The string this spec was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Candidate driver names in priority order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Whether no candidate was named.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl fmt::Display for DriverSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
