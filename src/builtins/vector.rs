//! Vector composition and decomposition

use glam::Vec3;
use indexmap::IndexMap;

use crate::body::BodyArgs;
use crate::descriptor::{NodeTypeDescriptor, PortSpec};
use crate::error::{DescriptorError, RuntimeError};
use crate::registry::NodeRegistry;
use crate::value::{Value, ValueType};

use super::{number, vector3};

pub fn register(registry: &NodeRegistry) -> Result<(), DescriptorError> {
    registry.register_native(
        NodeTypeDescriptor::new("VectorCompose", "Vector")
            .with_inputs(vec![
                PortSpec::new("x", ValueType::Number).with_default(Value::Number(0.0)),
                PortSpec::new("y", ValueType::Number).with_default(Value::Number(0.0)),
                PortSpec::new("z", ValueType::Number).with_default(Value::Number(0.0)),
            ])
            .with_outputs(vec![PortSpec::new("vector", ValueType::Vector3)]),
        compose_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("VectorDecompose", "Vector")
            .with_inputs(vec![PortSpec::new("vector", ValueType::Vector3)
                .with_default(Value::Vector3(Vec3::ZERO))])
            .with_outputs(vec![
                PortSpec::new("x", ValueType::Number),
                PortSpec::new("y", ValueType::Number),
                PortSpec::new("z", ValueType::Number),
            ]),
        decompose_body,
    )?;

    Ok(())
}

fn compose_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let v = Vec3::new(
        number(args.inputs, "x")? as f32,
        number(args.inputs, "y")? as f32,
        number(args.inputs, "z")? as f32,
    );
    Ok([("vector".to_string(), Value::Vector3(v))].into_iter().collect())
}

fn decompose_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let v = vector3(args.inputs, "vector")?;
    Ok([
        ("x".to_string(), Value::Number(v.x as f64)),
        ("y".to_string(), Value::Number(v.y as f64)),
        ("z".to_string(), Value::Number(v.z as f64)),
    ]
    .into_iter()
    .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_then_decompose() {
        let inputs: IndexMap<String, Value> = [
            ("x".to_string(), Value::Number(1.0)),
            ("y".to_string(), Value::Number(2.0)),
            ("z".to_string(), Value::Number(3.0)),
        ]
        .into_iter()
        .collect();
        let params = IndexMap::new();
        let out = compose_body(&BodyArgs { inputs: &inputs, params: &params }).unwrap();
        assert_eq!(out["vector"], Value::Vector3(Vec3::new(1.0, 2.0, 3.0)));

        let inputs: IndexMap<String, Value> =
            [("vector".to_string(), out["vector"].clone())].into_iter().collect();
        let out = decompose_body(&BodyArgs { inputs: &inputs, params: &params }).unwrap();
        assert_eq!(out["y"], Value::Number(2.0));
    }
}
