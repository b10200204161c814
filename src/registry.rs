//! Node type registry
//!
//! Holds every registered node type behind a copy-on-write snapshot so that
//! an evaluation pass sees one consistent set of types even while another
//! thread registers new ones. Registration validates the descriptor and
//! compiles its body before anything becomes visible; a bad descriptor
//! leaves the registry untouched.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::body::{self, CompiledBody, NativeBody};
use crate::descriptor::NodeTypeDescriptor;
use crate::error::DescriptorError;

/// A registered node type: validated descriptor plus its compiled body.
#[derive(Debug)]
pub struct NodeType {
    pub descriptor: NodeTypeDescriptor,
    pub body: CompiledBody,
    /// Bumped when the same type name is re-registered. Part of every
    /// cache key, so stale results for an older body can never be served.
    pub version: u64,
}

type TypeMap = HashMap<String, Arc<NodeType>>;

/// Thread-safe collection of node types.
#[derive(Default)]
pub struct NodeRegistry {
    types: RwLock<Arc<TypeMap>>,
    next_version: RwLock<u64>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dynamic node type from its descriptor. Replaces any
    /// existing type with the same name; live instances pick up the new
    /// body on their next evaluation.
    pub fn register(&self, descriptor: NodeTypeDescriptor) -> Result<(), DescriptorError> {
        descriptor.validate()?;
        let body = match &descriptor.body {
            Some(spec) => body::compile(spec, &descriptor)?,
            None => return Err(DescriptorError::MissingBody),
        };
        self.insert(descriptor, body);
        Ok(())
    }

    /// Register a built-in node type backed by a native function. The
    /// descriptor is validated the same way as a dynamic one.
    pub fn register_native(
        &self,
        descriptor: NodeTypeDescriptor,
        body: NativeBody,
    ) -> Result<(), DescriptorError> {
        descriptor.validate()?;
        self.insert(descriptor, CompiledBody::Native(body));
        Ok(())
    }

    fn insert(&self, descriptor: NodeTypeDescriptor, body: CompiledBody) {
        let version = {
            let mut counter = self.next_version.write();
            *counter += 1;
            *counter
        };
        let name = descriptor.type_name.clone();
        let node_type = Arc::new(NodeType {
            descriptor,
            body,
            version,
        });

        let mut guard = self.types.write();
        let mut map: TypeMap = (**guard).clone();
        let replaced = map.insert(name.clone(), node_type).is_some();
        *guard = Arc::new(map);

        if replaced {
            info!("Re-registered node type '{}' (v{})", name, version);
        } else {
            debug!("Registered node type '{}'", name);
        }
    }

    /// Remove a type. Instances referencing it report an error on their
    /// next evaluation rather than being deleted.
    pub fn unregister(&self, type_name: &str) -> bool {
        let mut guard = self.types.write();
        if !guard.contains_key(type_name) {
            return false;
        }
        let mut map: TypeMap = (**guard).clone();
        map.remove(type_name);
        *guard = Arc::new(map);
        info!("Unregistered node type '{}'", type_name);
        true
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<NodeType>> {
        self.types.read().get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.read().contains_key(type_name)
    }

    /// An immutable snapshot of the current type set, for use across a
    /// whole evaluation pass.
    pub fn snapshot(&self) -> Arc<TypeMap> {
        self.types.read().clone()
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{BodySpec, PortSpec};
    use crate::value::{Value, ValueType};

    fn doubler() -> NodeTypeDescriptor {
        NodeTypeDescriptor::new("Doubler", "Math")
            .with_inputs(vec![PortSpec::new("value", ValueType::Number)
                .with_default(Value::Number(0.0))])
            .with_outputs(vec![PortSpec::new("result", ValueType::Number)])
            .with_body(BodySpec::Expressions {
                expressions: [("result".to_string(), "value * 2".to_string())]
                    .into_iter()
                    .collect(),
            })
    }

    #[test]
    fn test_register_and_get() {
        let registry = NodeRegistry::new();
        registry.register(doubler()).unwrap();
        let node_type = registry.get("Doubler").unwrap();
        assert_eq!(node_type.descriptor.type_name, "Doubler");
        assert_eq!(node_type.version, 1);
    }

    #[test]
    fn test_reregister_bumps_version() {
        let registry = NodeRegistry::new();
        registry.register(doubler()).unwrap();
        registry.register(doubler()).unwrap();
        assert_eq!(registry.get("Doubler").unwrap().version, 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_bad_body_leaves_registry_untouched() {
        let registry = NodeRegistry::new();
        let mut desc = doubler();
        desc.body = Some(BodySpec::Expressions {
            expressions: [("result".to_string(), "value * missing".to_string())]
                .into_iter()
                .collect(),
        });
        assert!(registry.register(desc).is_err());
        assert!(registry.get("Doubler").is_none());
    }

    #[test]
    fn test_snapshot_is_stable_across_unregister() {
        let registry = NodeRegistry::new();
        registry.register(doubler()).unwrap();
        let snapshot = registry.snapshot();
        assert!(registry.unregister("Doubler"));
        assert!(snapshot.contains_key("Doubler"));
        assert!(registry.get("Doubler").is_none());
    }
}
