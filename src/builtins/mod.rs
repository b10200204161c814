//! Built-in node types
//!
//! A small but real catalog so a host can assemble useful graphs without
//! registering anything dynamic. Each built-in is an ordinary descriptor
//! paired with a native Rust body, registered through the same validation
//! path as dynamic types.

pub mod data;
pub mod geometry;
pub mod material;
pub mod math;
pub mod output;
pub mod vector;

use indexmap::IndexMap;

use crate::error::{DescriptorError, RuntimeError};
use crate::registry::NodeRegistry;
use crate::value::Value;

/// Register the full built-in catalog.
pub fn register_all(registry: &NodeRegistry) -> Result<(), DescriptorError> {
    math::register(registry)?;
    vector::register(registry)?;
    data::register(registry)?;
    geometry::register(registry)?;
    material::register(registry)?;
    output::register(registry)?;
    Ok(())
}

// Native bodies receive fully-resolved argument maps; a missing key means
// the descriptor and body disagree, which is a bug in the builtin itself.
pub(crate) fn arg<'a>(
    map: &'a IndexMap<String, Value>,
    key: &str,
) -> Result<&'a Value, RuntimeError> {
    map.get(key)
        .ok_or_else(|| RuntimeError::Other(format!("missing argument '{}'", key)))
}

pub(crate) fn number(map: &IndexMap<String, Value>, key: &str) -> Result<f64, RuntimeError> {
    let value = arg(map, key)?;
    value.as_number().ok_or(RuntimeError::InvalidOperand {
        op: "builtin",
        operand: value.type_name(),
    })
}

pub(crate) fn vector3(
    map: &IndexMap<String, Value>,
    key: &str,
) -> Result<glam::Vec3, RuntimeError> {
    match arg(map, key)? {
        Value::Vector3(v) => Ok(*v),
        other => Err(RuntimeError::InvalidOperand {
            op: "builtin",
            operand: other.type_name(),
        }),
    }
}
