//! Calling convention strings.
//!
//! A function's calling convention is a compact string such as `0rr_r`:
//! a version digit, the argument kinds, `_`, then the result kinds. An
//! empty kind list is written `v`.

use std::fmt;
use vmrt_common::hal::types::ElementType;

/// Kind tag of one argument or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Buffer reference (`r`)
    Ref,
    /// 32-bit integer (`i`)
    I32,
    /// 64-bit integer (`I`)
    I64,
    /// 32-bit float (`f`)
    F32,
    /// 64-bit float (`F`)
    F64,
}

impl ValueKind {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(ValueKind::Ref),
            'i' => Some(ValueKind::I32),
            'I' => Some(ValueKind::I64),
            'f' => Some(ValueKind::F32),
            'F' => Some(ValueKind::F64),
            _ => None,
        }
    }

    /// Single-character tag.
    pub fn as_char(self) -> char {
        match self {
            ValueKind::Ref => 'r',
            ValueKind::I32 => 'i',
            ValueKind::I64 => 'I',
            ValueKind::F32 => 'f',
            ValueKind::F64 => 'F',
        }
    }

    /// Scalar element type, `None` for refs.
    pub fn scalar_type(self) -> Option<ElementType> {
        match self {
            ValueKind::Ref => None,
            ValueKind::I32 => Some(ElementType::I32),
            ValueKind::I64 => Some(ElementType::I64),
            ValueKind::F32 => Some(ElementType::F32),
            ValueKind::F64 => Some(ElementType::F64),
        }
    }
}

/// Parsed calling convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    args: Vec<ValueKind>,
    results: Vec<ValueKind>,
}

/// Only calling convention version understood by this runtime.
const CCONV_VERSION: char = '0';

impl Signature {
    /// Build a signature from kind lists.
    pub fn new(args: Vec<ValueKind>, results: Vec<ValueKind>) -> Self {
        Self { args, results }
    }

    /// Parse a calling convention string.
    ///
    /// # Errors
    /// Returns a description of the first malformed part.
    pub fn parse(cconv: &str) -> Result<Self, String> {
        let body = cconv
            .strip_prefix(CCONV_VERSION)
            .ok_or_else(|| format!("calling convention '{cconv}' must start with '{CCONV_VERSION}'"))?;
        let (args, results) = body
            .split_once('_')
            .ok_or_else(|| format!("calling convention '{cconv}' lacks '_' separator"))?;
        Ok(Self {
            args: parse_kinds(cconv, args)?,
            results: parse_kinds(cconv, results)?,
        })
    }

    /// Argument kinds in order.
    pub fn args(&self) -> &[ValueKind] {
        &self.args
    }

    /// Result kinds in order.
    pub fn results(&self) -> &[ValueKind] {
        &self.results
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

fn parse_kinds(cconv: &str, part: &str) -> Result<Vec<ValueKind>, String> {
    if part == "v" {
        return Ok(Vec::new());
    }
    if part.is_empty() {
        return Err(format!("calling convention '{cconv}' has an empty kind list (use 'v')"));
    }
    part.chars()
        .map(|c| {
            ValueKind::from_char(c)
                .ok_or_else(|| format!("calling convention '{cconv}' has unknown kind '{c}'"))
        })
        .collect()
}

fn write_kinds(f: &mut fmt::Formatter<'_>, kinds: &[ValueKind]) -> fmt::Result {
    if kinds.is_empty() {
        return f.write_str("v");
    }
    kinds.iter().try_for_each(|k| write!(f, "{}", k.as_char()))
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CCONV_VERSION}")?;
        write_kinds(f, &self.args)?;
        f.write_str("_")?;
        write_kinds(f, &self.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_mul() {
        let sig = Signature::parse("0rr_r").unwrap();
        assert_eq!(sig.args(), [ValueKind::Ref, ValueKind::Ref]);
        assert_eq!(sig.results(), [ValueKind::Ref]);
        assert_eq!(sig.arity(), 2);
        assert_eq!(sig.to_string(), "0rr_r");
    }

    #[test]
    fn parse_scalars_and_void() {
        let sig = Signature::parse("0riIfF_v").unwrap();
        assert_eq!(sig.arity(), 5);
        assert!(sig.results().is_empty());
        assert_eq!(sig.to_string(), "0riIfF_v");
        assert_eq!(Signature::parse("0v_i").unwrap().arity(), 0);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Signature::parse("1r_r").is_err());
        assert!(Signature::parse("0rr").is_err());
        assert!(Signature::parse("0rx_r").is_err());
        assert!(Signature::parse("0_r").is_err());
    }
}
