//! Graph model: node instances, edges, and validated structural edits
//!
//! The graph is pure data. Structural rules that can be checked without
//! evaluating anything are enforced at edit time (unknown ports, occupied
//! inputs, self-edges); anything requiring the full topology, like cycle
//! detection, is left to the evaluator so a graph can pass through invalid
//! intermediate states while being edited.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::registry::NodeRegistry;
use crate::value::{coerce, Value};

/// Caller-chosen identifier for a node instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One placed node: a type reference plus parameter overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Only parameters explicitly set; everything else falls back to the
    /// descriptor default.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Value>,
}

/// A directed connection from one node's output to another node's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(rename = "sourceId")]
    pub source: NodeId,
    pub source_output: String,
    #[serde(rename = "targetId")]
    pub target: NodeId,
    pub target_input: String,
}

/// A single structural edit, the unit the scheduler debounces.
#[derive(Debug, Clone)]
pub enum GraphEdit {
    AddNode {
        id: NodeId,
        type_name: String,
    },
    RemoveNode {
        id: NodeId,
    },
    AddEdge(Edge),
    RemoveEdge(Edge),
    SetParameter {
        id: NodeId,
        parameter: String,
        value: Value,
    },
}

/// Serialized form of a whole graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<NodeInstance>,
    pub edges: Vec<Edge>,
}

/// A live graph of node instances.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, NodeInstance>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from serialized data, validating every node and edge
    /// against the registry.
    pub fn from_data(data: GraphData, registry: &NodeRegistry) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in data.nodes {
            let parameters = node.parameters.clone();
            graph.add_node(node.id.clone(), node.type_name, registry)?;
            for (param, value) in parameters {
                graph.set_parameter(&node.id, &param, value, registry)?;
            }
        }
        for edge in data.edges {
            graph.add_edge(edge, registry)?;
        }
        Ok(graph)
    }

    pub fn to_data(&self) -> GraphData {
        GraphData {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.clone(),
        }
    }

    /// Apply one edit, validating it first. A rejected edit leaves the
    /// graph exactly as it was.
    pub fn apply_edit(&mut self, edit: GraphEdit, registry: &NodeRegistry) -> Result<(), GraphError> {
        match edit {
            GraphEdit::AddNode { id, type_name } => self.add_node(id, type_name, registry),
            GraphEdit::RemoveNode { id } => self.remove_node(&id),
            GraphEdit::AddEdge(edge) => self.add_edge(edge, registry),
            GraphEdit::RemoveEdge(edge) => self.remove_edge(&edge),
            GraphEdit::SetParameter { id, parameter, value } => {
                self.set_parameter(&id, &parameter, value, registry)
            }
        }
    }

    pub fn add_node(
        &mut self,
        id: NodeId,
        type_name: String,
        registry: &NodeRegistry,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateInstance(id));
        }
        if !registry.contains(&type_name) {
            return Err(GraphError::UnknownType(type_name));
        }
        self.nodes.insert(
            id.clone(),
            NodeInstance {
                id,
                type_name,
                parameters: IndexMap::new(),
            },
        );
        Ok(())
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<(), GraphError> {
        if self.nodes.shift_remove(id).is_none() {
            return Err(GraphError::UnknownInstance(id.clone()));
        }
        self.edges.retain(|e| e.source != *id && e.target != *id);
        Ok(())
    }

    pub fn add_edge(&mut self, edge: Edge, registry: &NodeRegistry) -> Result<(), GraphError> {
        if edge.source == edge.target {
            return Err(GraphError::SelfEdge(edge.source));
        }

        let source = self
            .nodes
            .get(&edge.source)
            .ok_or_else(|| GraphError::UnknownInstance(edge.source.clone()))?;
        let target = self
            .nodes
            .get(&edge.target)
            .ok_or_else(|| GraphError::UnknownInstance(edge.target.clone()))?;

        // Port existence is checked against the current registry; a node
        // whose type has been unregistered can no longer gain edges.
        let source_type = registry
            .get(&source.type_name)
            .ok_or_else(|| GraphError::UnknownType(source.type_name.clone()))?;
        if source_type.descriptor.output(&edge.source_output).is_none() {
            return Err(GraphError::UnknownPort {
                instance: edge.source,
                port: edge.source_output,
            });
        }
        let target_type = registry
            .get(&target.type_name)
            .ok_or_else(|| GraphError::UnknownType(target.type_name.clone()))?;
        if target_type.descriptor.input(&edge.target_input).is_none() {
            return Err(GraphError::UnknownPort {
                instance: edge.target,
                port: edge.target_input,
            });
        }

        // Fan-in of one per input.
        if self
            .edges
            .iter()
            .any(|e| e.target == edge.target && e.target_input == edge.target_input)
        {
            return Err(GraphError::InputOccupied {
                instance: edge.target,
                port: edge.target_input,
            });
        }

        self.edges.push(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, edge: &Edge) -> Result<(), GraphError> {
        let before = self.edges.len();
        self.edges.retain(|e| e != edge);
        if self.edges.len() == before {
            return Err(GraphError::EdgeNotFound);
        }
        Ok(())
    }

    /// Set a parameter override, coercing the value to the declared type.
    pub fn set_parameter(
        &mut self,
        id: &NodeId,
        parameter: &str,
        value: Value,
        registry: &NodeRegistry,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownInstance(id.clone()))?;
        let node_type = registry
            .get(&node.type_name)
            .ok_or_else(|| GraphError::UnknownType(node.type_name.clone()))?;
        let spec = node_type
            .descriptor
            .parameter(parameter)
            .ok_or_else(|| GraphError::UnknownParameter {
                instance: id.clone(),
                param: parameter.to_string(),
            })?;
        let value = coerce(value, &spec.value_type).map_err(|source| GraphError::ParameterType {
            instance: id.clone(),
            param: parameter.to_string(),
            source,
        })?;

        // Re-borrow mutably only after all validation has passed.
        if let Some(node) = self.nodes.get_mut(id) {
            node.parameters.insert(parameter.to_string(), value);
        }
        Ok(())
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeInstance> {
        self.nodes.get(id)
    }

    /// Instances in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The edge feeding one input, if any.
    pub fn incoming(&self, target: &NodeId, input: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target == *target && e.target_input == input)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;

    fn registry() -> NodeRegistry {
        let registry = NodeRegistry::new();
        builtins::register_all(&registry).unwrap();
        registry
    }

    fn float_math_graph(registry: &NodeRegistry) -> Graph {
        let mut graph = Graph::new();
        graph
            .add_node(NodeId::new("f1"), "Float".to_string(), registry)
            .unwrap();
        graph
            .add_node(NodeId::new("m1"), "Math".to_string(), registry)
            .unwrap();
        graph
    }

    fn edge(source: &str, output: &str, target: &str, input: &str) -> Edge {
        Edge {
            source: NodeId::new(source),
            source_output: output.to_string(),
            target: NodeId::new(target),
            target_input: input.to_string(),
        }
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        assert!(matches!(
            graph.add_node(NodeId::new("f1"), "Float".to_string(), &registry),
            Err(GraphError::DuplicateInstance(_))
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let registry = registry();
        let mut graph = Graph::new();
        assert!(matches!(
            graph.add_node(NodeId::new("x"), "Nope".to_string(), &registry),
            Err(GraphError::UnknownType(_))
        ));
    }

    #[test]
    fn test_input_fan_in_of_one() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        graph
            .add_node(NodeId::new("f2"), "Float".to_string(), &registry)
            .unwrap();
        graph
            .add_edge(edge("f1", "value", "m1", "a"), &registry)
            .unwrap();
        assert!(matches!(
            graph.add_edge(edge("f2", "value", "m1", "a"), &registry),
            Err(GraphError::InputOccupied { .. })
        ));
    }

    #[test]
    fn test_self_edge_rejected() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        assert!(matches!(
            graph.add_edge(edge("m1", "result", "m1", "a"), &registry),
            Err(GraphError::SelfEdge(_))
        ));
    }

    #[test]
    fn test_unknown_port_rejected() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        assert!(matches!(
            graph.add_edge(edge("f1", "nope", "m1", "a"), &registry),
            Err(GraphError::UnknownPort { .. })
        ));
    }

    #[test]
    fn test_remove_node_drops_its_edges() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        graph
            .add_edge(edge("f1", "value", "m1", "a"), &registry)
            .unwrap();
        graph.remove_node(&NodeId::new("f1")).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_set_parameter_coerces() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        graph
            .set_parameter(&NodeId::new("f1"), "value", Value::Integer(5), &registry)
            .unwrap();
        assert_eq!(
            graph.node(&NodeId::new("f1")).unwrap().parameters["value"],
            Value::Number(5.0)
        );
    }

    #[test]
    fn test_set_parameter_rejects_bad_type() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        assert!(matches!(
            graph.set_parameter(
                &NodeId::new("f1"),
                "value",
                Value::Text("five".into()),
                &registry
            ),
            Err(GraphError::ParameterType { .. })
        ));
    }

    #[test]
    fn test_round_trip_through_data() {
        let registry = registry();
        let mut graph = float_math_graph(&registry);
        graph
            .set_parameter(&NodeId::new("f1"), "value", Value::Number(3.0), &registry)
            .unwrap();
        graph
            .add_edge(edge("f1", "value", "m1", "a"), &registry)
            .unwrap();

        let data = graph.to_data();
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"sourceId\":\"f1\""));
        assert!(json.contains("\"targetId\":\"m1\""));
        let parsed: GraphData = serde_json::from_str(&json).unwrap();
        let rebuilt = Graph::from_data(parsed, &registry).unwrap();
        assert_eq!(rebuilt.node_count(), 2);
        assert_eq!(rebuilt.edge_count(), 1);
        assert_eq!(
            rebuilt.node(&NodeId::new("f1")).unwrap().parameters["value"],
            Value::Number(3.0)
        );
    }
}
