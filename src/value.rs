//! Port value model: the closed set of value types that flow along edges
//!
//! Every edge carries exactly one [`Value`]. Coercion between types is a
//! small fixed table (never open-ended reflection), and every value exposes
//! an exact fingerprint suitable for cache keys. Fingerprints use bit-level
//! equality for floats on purpose: the scheduler, not this layer, decides
//! when "close enough" changes should still trigger a recompute.

use std::hash::{Hash, Hasher};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::TypeMismatch;

/// The type of a port, including per-variant metadata where it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    /// 64-bit floating point number
    Number,
    /// 64-bit signed integer
    Integer,
    /// Boolean value
    Boolean,
    /// Text string
    Text,
    /// One of a fixed set of named options
    Enum(Vec<String>),
    /// 3D vector (x, y, z)
    Vector3,
    /// RGBA color, components in 0..=1
    Color,
    /// 4x4 transform matrix
    Transform,
    /// Mesh geometry (vertices, indices, normals, uvs)
    Geometry,
    /// Unstructured point cloud
    PointSet,
    /// Material and shading data
    Material,
    /// Wildcard for generic ports; accepts any value unchanged
    Any,
}

impl ValueType {
    /// Human-readable name for this type
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Number => "Number",
            ValueType::Integer => "Integer",
            ValueType::Boolean => "Boolean",
            ValueType::Text => "Text",
            ValueType::Enum(_) => "Enum",
            ValueType::Vector3 => "Vector3",
            ValueType::Color => "Color",
            ValueType::Transform => "Transform",
            ValueType::Geometry => "Geometry",
            ValueType::PointSet => "PointSet",
            ValueType::Material => "Material",
            ValueType::Any => "Any",
        }
    }

    /// The value a port of this type carries when nothing is connected and
    /// no explicit default is declared.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Number => Value::Number(0.0),
            ValueType::Integer => Value::Integer(0),
            ValueType::Boolean => Value::Boolean(false),
            ValueType::Text => Value::Text(String::new()),
            ValueType::Enum(options) => {
                Value::Enum(options.first().cloned().unwrap_or_default())
            }
            ValueType::Vector3 => Value::Vector3(Vec3::ZERO),
            ValueType::Color => Value::Color([0.0, 0.0, 0.0, 1.0]),
            ValueType::Transform => Value::Transform(Mat4::IDENTITY),
            ValueType::Geometry => Value::Geometry(GeometryData::default()),
            ValueType::PointSet => Value::PointSet(PointSetData::default()),
            ValueType::Material => Value::Material(MaterialData::default()),
            ValueType::Any => Value::Number(0.0),
        }
    }
}

/// Mesh geometry flowing between nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryData {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// Id of the material slot this mesh binds, if any
    pub material_id: Option<String>,
}

impl GeometryData {
    /// Number of triangles described by the index buffer
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Unstructured point cloud
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSetData {
    pub points: Vec<[f32; 3]>,
}

/// Material and shading data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub id: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            id: String::new(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            emissive: [0.0, 0.0, 0.0],
        }
    }
}

/// A value flowing along an edge or stored as a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Enum(String),
    Vector3(Vec3),
    Color([f32; 4]),
    Transform(Mat4),
    Geometry(GeometryData),
    PointSet(PointSetData),
    Material(MaterialData),
}

impl Value {
    /// Human-readable name of this value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::Text(_) => "Text",
            Value::Enum(_) => "Enum",
            Value::Vector3(_) => "Vector3",
            Value::Color(_) => "Color",
            Value::Transform(_) => "Transform",
            Value::Geometry(_) => "Geometry",
            Value::PointSet(_) => "PointSet",
            Value::Material(_) => "Material",
        }
    }

    /// Extract as f64 where the value is numeric
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Extract as bool
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Feed this value's exact identity into a hasher.
    ///
    /// Floats hash their raw bits; two values fingerprint equal iff they are
    /// bit-identical. A discriminant tag is mixed in first so values of
    /// different types never collide structurally.
    pub fn fingerprint<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Number(n) => n.to_bits().hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::Text(s) | Value::Enum(s) => s.hash(state),
            Value::Vector3(v) => {
                for c in v.to_array() {
                    c.to_bits().hash(state);
                }
            }
            Value::Color(c) => {
                for ch in c {
                    ch.to_bits().hash(state);
                }
            }
            Value::Transform(m) => {
                for c in m.to_cols_array() {
                    c.to_bits().hash(state);
                }
            }
            Value::Geometry(g) => {
                for v in &g.vertices {
                    for c in v {
                        c.to_bits().hash(state);
                    }
                }
                g.indices.hash(state);
                for n in &g.normals {
                    for c in n {
                        c.to_bits().hash(state);
                    }
                }
                for uv in &g.uvs {
                    for c in uv {
                        c.to_bits().hash(state);
                    }
                }
                g.material_id.hash(state);
            }
            Value::PointSet(p) => {
                for pt in &p.points {
                    for c in pt {
                        c.to_bits().hash(state);
                    }
                }
            }
            Value::Material(m) => {
                m.id.hash(state);
                for ch in m.base_color {
                    ch.to_bits().hash(state);
                }
                m.metallic.to_bits().hash(state);
                m.roughness.to_bits().hash(state);
                for ch in m.emissive {
                    ch.to_bits().hash(state);
                }
            }
        }
    }
}

/// Convert `value` to `target`, or report why it cannot be done.
///
/// The table is total and side-effect free. Lossy conversions are rejected:
/// a `Number` becomes an `Integer` only when it is exactly integral, so the
/// table round-trips (`Integer` then `Number` equals direct `Number`).
pub fn coerce(value: Value, target: &ValueType) -> Result<Value, TypeMismatch> {
    let mismatch = |v: &Value| TypeMismatch {
        from: v.type_name(),
        to: target.name(),
    };

    match (value, target) {
        // Wildcard ports take anything unchanged
        (v, ValueType::Any) => Ok(v),

        // Identity, modulo enum option membership
        (Value::Number(n), ValueType::Number) => Ok(Value::Number(n)),
        (Value::Integer(i), ValueType::Integer) => Ok(Value::Integer(i)),
        (Value::Boolean(b), ValueType::Boolean) => Ok(Value::Boolean(b)),
        (Value::Text(s), ValueType::Text) => Ok(Value::Text(s)),
        (Value::Vector3(v), ValueType::Vector3) => Ok(Value::Vector3(v)),
        (Value::Color(c), ValueType::Color) => Ok(Value::Color(c)),
        (Value::Transform(m), ValueType::Transform) => Ok(Value::Transform(m)),
        (Value::Geometry(g), ValueType::Geometry) => Ok(Value::Geometry(g)),
        (Value::PointSet(p), ValueType::PointSet) => Ok(Value::PointSet(p)),
        (Value::Material(m), ValueType::Material) => Ok(Value::Material(m)),
        (Value::Enum(s), ValueType::Enum(options)) => {
            if options.contains(&s) {
                Ok(Value::Enum(s))
            } else {
                Err(TypeMismatch { from: "Enum", to: "Enum" })
            }
        }

        // Numeric widening / exact narrowing
        (Value::Integer(i), ValueType::Number) => Ok(Value::Number(i as f64)),
        (Value::Number(n), ValueType::Integer) => {
            if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
                Ok(Value::Integer(n as i64))
            } else {
                Err(mismatch(&Value::Number(n)))
            }
        }

        // Booleans read as 0/1 where a number is expected
        (Value::Boolean(b), ValueType::Number) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
        (Value::Boolean(b), ValueType::Integer) => Ok(Value::Integer(i64::from(b))),

        // Enum <-> Text
        (Value::Enum(s), ValueType::Text) => Ok(Value::Text(s)),
        (Value::Text(s), ValueType::Enum(options)) => {
            if options.contains(&s) {
                Ok(Value::Enum(s))
            } else {
                Err(TypeMismatch { from: "Text", to: "Enum" })
            }
        }

        // Color <-> Vector3
        (Value::Color(c), ValueType::Vector3) => {
            Ok(Value::Vector3(Vec3::new(c[0], c[1], c[2])))
        }
        (Value::Vector3(v), ValueType::Color) => Ok(Value::Color([v.x, v.y, v.z, 1.0])),

        (v, _) => Err(mismatch(&v)),
    }
}
