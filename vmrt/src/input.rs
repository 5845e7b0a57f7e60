//! Text form of call values, as used on the command line.
//!
//! ```text
//! 4xf32=1,2,3,4      1-D array
//! 2x2xi32=1,2,3,4    2-D array
//! i64=5              scalar
//! ```

use crate::error::Result;
use crate::value::HostValue;
use std::str::FromStr;
use vmrt_common::hal::types::{ArrayData, ElementType, HostArray, Scalar};

/// Parse one value in `<shape>x<type>=<elements>` or `<type>=<scalar>` form.
pub fn parse_value(text: &str) -> std::result::Result<HostValue, String> {
    let (ty, body) = text
        .split_once('=')
        .ok_or_else(|| format!("'{text}': expected <type>=<value>"))?;
    let mut parts: Vec<&str> = ty.split('x').collect();
    let type_name = parts.pop().unwrap_or_default();
    let element_type = ElementType::parse(type_name)
        .ok_or_else(|| format!("'{text}': unknown element type '{type_name}'"))?;

    if parts.is_empty() {
        return parse_scalar(element_type, body.trim())
            .map(HostValue::Scalar)
            .ok_or_else(|| format!("'{text}': '{body}' is not a valid {element_type}"));
    }

    let shape = parts
        .iter()
        .map(|d| d.parse::<usize>().map_err(|_| format!("'{text}': bad dimension '{d}'")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let elements: Vec<&str> = if body.trim().is_empty() {
        Vec::new()
    } else {
        body.split(',').map(str::trim).collect()
    };
    let data = match element_type {
        ElementType::F32 => ArrayData::F32(parse_all(text, &elements)?),
        ElementType::F64 => ArrayData::F64(parse_all(text, &elements)?),
        ElementType::I32 => ArrayData::I32(parse_all(text, &elements)?),
        ElementType::I64 => ArrayData::I64(parse_all(text, &elements)?),
    };
    HostArray::from_data(shape, data)
        .map(HostValue::Array)
        .map_err(|e| format!("'{text}': {e}"))
}

fn parse_all<T: FromStr>(text: &str, elements: &[&str]) -> std::result::Result<Vec<T>, String> {
    elements
        .iter()
        .map(|e| e.parse().map_err(|_| format!("'{text}': bad element '{e}'")))
        .collect()
}

fn parse_scalar(element_type: ElementType, body: &str) -> Option<Scalar> {
    match element_type {
        ElementType::I32 => body.parse().ok().map(Scalar::I32),
        ElementType::I64 => body.parse().ok().map(Scalar::I64),
        ElementType::F32 => body.parse().ok().map(Scalar::F32),
        ElementType::F64 => body.parse().ok().map(Scalar::F64),
    }
}

/// Render a value in the same form `parse_value` accepts.
pub fn format_value(value: &HostValue) -> Result<String> {
    if let HostValue::Scalar(scalar) = value {
        return Ok(format!("{}={}", scalar.element_type(), scalar));
    }
    let array = value.to_array()?;
    let elements = match array.data() {
        ArrayData::F32(v) => join(v),
        ArrayData::F64(v) => join(v),
        ArrayData::I32(v) => join(v),
        ArrayData::I64(v) => join(v),
    };
    Ok(format!("{}={}", array.tensor_type(), elements))
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(T::to_string).collect::<Vec<_>>().join(",")
}
