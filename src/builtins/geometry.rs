//! Parametric mesh generators and point transforms

use glam::{EulerRot, Mat4, Quat, Vec3};
use indexmap::IndexMap;

use crate::body::BodyArgs;
use crate::descriptor::{NodeTypeDescriptor, PortSpec};
use crate::error::{DescriptorError, RuntimeError};
use crate::registry::NodeRegistry;
use crate::value::{GeometryData, Value, ValueType};

use super::{arg, vector3};

pub fn register(registry: &NodeRegistry) -> Result<(), DescriptorError> {
    registry.register_native(
        NodeTypeDescriptor::new("Box", "Geometry")
            .with_parameters(vec![PortSpec::new("size", ValueType::Vector3)
                .with_default(Value::Vector3(Vec3::ONE))])
            .with_outputs(vec![PortSpec::new("geometry", ValueType::Geometry)]),
        box_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("Plane", "Geometry")
            .with_parameters(vec![
                PortSpec::new("width", ValueType::Number).with_default(Value::Number(1.0)),
                PortSpec::new("depth", ValueType::Number).with_default(Value::Number(1.0)),
            ])
            .with_outputs(vec![PortSpec::new("geometry", ValueType::Geometry)]),
        plane_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("TransformPoints", "Geometry")
            .with_inputs(vec![PortSpec::new("geometry", ValueType::Geometry).required()])
            .with_parameters(vec![
                PortSpec::new("translation", ValueType::Vector3)
                    .with_default(Value::Vector3(Vec3::ZERO)),
                PortSpec::new("rotation", ValueType::Vector3)
                    .with_default(Value::Vector3(Vec3::ZERO))
                    .with_description("Euler angles in degrees, XYZ order"),
                PortSpec::new("scale", ValueType::Vector3)
                    .with_default(Value::Vector3(Vec3::ONE)),
            ])
            .with_outputs(vec![PortSpec::new("geometry", ValueType::Geometry)]),
        transform_body,
    )?;

    Ok(())
}

/// Axis-aligned box centered at the origin, 24 vertices so every face has
/// flat normals.
fn box_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let size = vector3(args.params, "size")?;
    let h = size * 0.5;

    // (normal, four corners counter-clockwise seen from outside)
    let faces: [(Vec3, [Vec3; 4]); 6] = [
        (Vec3::X, [
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
        ]),
        (Vec3::NEG_X, [
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, -h.z),
        ]),
        (Vec3::Y, [
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(h.x, h.y, -h.z),
        ]),
        (Vec3::NEG_Y, [
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, h.z),
        ]),
        (Vec3::Z, [
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ]),
        (Vec3::NEG_Z, [
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
        ]),
    ];

    let mut geometry = GeometryData::default();
    for (normal, corners) in faces {
        let base = geometry.vertices.len() as u32;
        for corner in corners {
            geometry.vertices.push(corner.to_array());
            geometry.normals.push(normal.to_array());
        }
        geometry.uvs.extend([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        geometry
            .indices
            .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Ok([("geometry".to_string(), Value::Geometry(geometry))]
        .into_iter()
        .collect())
}

/// Flat quad in the XZ plane, normal up.
fn plane_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let w = super::number(args.params, "width")? as f32 * 0.5;
    let d = super::number(args.params, "depth")? as f32 * 0.5;

    let geometry = GeometryData {
        vertices: vec![[-w, 0.0, -d], [w, 0.0, -d], [w, 0.0, d], [-w, 0.0, d]],
        indices: vec![0, 2, 1, 0, 3, 2],
        normals: vec![[0.0, 1.0, 0.0]; 4],
        uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        material_id: None,
    };
    Ok([("geometry".to_string(), Value::Geometry(geometry))]
        .into_iter()
        .collect())
}

fn transform_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let mut geometry = match arg(args.inputs, "geometry")? {
        Value::Geometry(g) => g.clone(),
        other => {
            return Err(RuntimeError::InvalidOperand {
                op: "TransformPoints",
                operand: other.type_name(),
            })
        }
    };
    let translation = vector3(args.params, "translation")?;
    let rotation = vector3(args.params, "rotation")?;
    let scale = vector3(args.params, "scale")?;

    let quat = Quat::from_euler(
        EulerRot::XYZ,
        rotation.x.to_radians(),
        rotation.y.to_radians(),
        rotation.z.to_radians(),
    );
    let matrix = Mat4::from_scale_rotation_translation(scale, quat, translation);

    for v in &mut geometry.vertices {
        *v = matrix.transform_point3(Vec3::from_array(*v)).to_array();
    }
    // Normals only rotate; non-uniform scale is not corrected for here.
    for n in &mut geometry.normals {
        *n = (quat * Vec3::from_array(*n)).to_array();
    }

    Ok([("geometry".to_string(), Value::Geometry(geometry))]
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_mesh_shape() {
        let params: IndexMap<String, Value> =
            [("size".to_string(), Value::Vector3(Vec3::new(2.0, 2.0, 2.0)))]
                .into_iter()
                .collect();
        let inputs = IndexMap::new();
        let out = box_body(&BodyArgs { inputs: &inputs, params: &params }).unwrap();
        let Value::Geometry(g) = &out["geometry"] else {
            panic!("expected geometry");
        };
        assert_eq!(g.vertices.len(), 24);
        assert_eq!(g.triangle_count(), 12);
        assert!(g.vertices.iter().all(|v| v.iter().all(|c| c.abs() == 1.0)));
    }

    #[test]
    fn test_transform_translates_vertices() {
        let params: IndexMap<String, Value> = [
            ("width".to_string(), Value::Number(2.0)),
            ("depth".to_string(), Value::Number(2.0)),
        ]
        .into_iter()
        .collect();
        let inputs = IndexMap::new();
        let plane = plane_body(&BodyArgs { inputs: &inputs, params: &params }).unwrap();

        let inputs: IndexMap<String, Value> =
            [("geometry".to_string(), plane["geometry"].clone())].into_iter().collect();
        let params: IndexMap<String, Value> = [
            ("translation".to_string(), Value::Vector3(Vec3::new(0.0, 5.0, 0.0))),
            ("rotation".to_string(), Value::Vector3(Vec3::ZERO)),
            ("scale".to_string(), Value::Vector3(Vec3::ONE)),
        ]
        .into_iter()
        .collect();
        let out = transform_body(&BodyArgs { inputs: &inputs, params: &params }).unwrap();
        let Value::Geometry(g) = &out["geometry"] else {
            panic!("expected geometry");
        };
        assert!(g.vertices.iter().all(|v| v[1] == 5.0));
    }
}
