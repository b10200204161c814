//! Material constant node

use indexmap::IndexMap;

use crate::body::BodyArgs;
use crate::descriptor::{NodeTypeDescriptor, PortSpec};
use crate::error::{DescriptorError, RuntimeError};
use crate::registry::NodeRegistry;
use crate::value::{MaterialData, Value, ValueType};

use super::{arg, number};

pub fn register(registry: &NodeRegistry) -> Result<(), DescriptorError> {
    registry.register_native(
        NodeTypeDescriptor::new("Material", "Shading")
            .with_inputs(vec![PortSpec::new("baseColor", ValueType::Color)
                .with_default(Value::Color([0.8, 0.8, 0.8, 1.0]))])
            .with_parameters(vec![
                PortSpec::new("id", ValueType::Text).with_default(Value::Text(String::new())),
                PortSpec::new("metallic", ValueType::Number)
                    .with_default(Value::Number(0.0))
                    .with_range(0.0, 1.0, 0.01),
                PortSpec::new("roughness", ValueType::Number)
                    .with_default(Value::Number(0.5))
                    .with_range(0.0, 1.0, 0.01),
            ])
            .with_outputs(vec![PortSpec::new("material", ValueType::Material)]),
        material_body,
    )
}

fn material_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let base_color = match arg(args.inputs, "baseColor")? {
        Value::Color(c) => *c,
        other => {
            return Err(RuntimeError::InvalidOperand {
                op: "Material",
                operand: other.type_name(),
            })
        }
    };
    let id = match arg(args.params, "id")? {
        Value::Text(s) => s.clone(),
        other => {
            return Err(RuntimeError::InvalidOperand {
                op: "Material",
                operand: other.type_name(),
            })
        }
    };
    let material = MaterialData {
        id,
        base_color,
        metallic: number(args.params, "metallic")? as f32,
        roughness: number(args.params, "roughness")? as f32,
        emissive: [0.0, 0.0, 0.0],
    };
    Ok([("material".to_string(), Value::Material(material))]
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_from_inputs() {
        let inputs: IndexMap<String, Value> =
            [("baseColor".to_string(), Value::Color([1.0, 0.0, 0.0, 1.0]))]
                .into_iter()
                .collect();
        let params: IndexMap<String, Value> = [
            ("id".to_string(), Value::Text("red".into())),
            ("metallic".to_string(), Value::Number(1.0)),
            ("roughness".to_string(), Value::Number(0.2)),
        ]
        .into_iter()
        .collect();
        let out = material_body(&BodyArgs { inputs: &inputs, params: &params }).unwrap();
        let Value::Material(m) = &out["material"] else {
            panic!("expected material");
        };
        assert_eq!(m.id, "red");
        assert_eq!(m.metallic, 1.0);
    }
}
