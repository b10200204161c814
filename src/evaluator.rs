//! Graph evaluator
//!
//! Pull-based evaluation from the graph's sink nodes. Each pass walks the
//! dependency tree depth-first with three-color cycle detection, resolves
//! every input through the coercion rules, consults the result cache, and
//! invokes bodies only on fingerprint misses. A failing node never aborts
//! the pass: it lands in the error map and taints its transitive consumers
//! while independent branches evaluate normally.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::cache::{Fingerprint, ResultCache};
use crate::error::EvalError;
use crate::graph::{Graph, NodeId};
use crate::registry::{NodeRegistry, NodeType};
use crate::value::{coerce, Value};

/// Everything one evaluation pass produced.
#[derive(Debug, Default)]
pub struct EvaluationResult {
    /// Outputs of every node that evaluated successfully this pass.
    pub outputs: HashMap<NodeId, IndexMap<String, Value>>,
    /// One error per failing instance, including tainted consumers.
    pub errors: HashMap<NodeId, EvalError>,
    /// Outputs of the sink nodes only, the values a host usually wants.
    pub sinks: HashMap<NodeId, IndexMap<String, Value>>,
}

impl EvaluationResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

pub struct Evaluator<'a> {
    graph: &'a Graph,
    types: Arc<HashMap<String, Arc<NodeType>>>,
    cache: &'a mut ResultCache,
    /// Current animation time, injected into time-driven nodes.
    time: f64,
    marks: HashMap<NodeId, Mark>,
    /// Current DFS path, for naming cycle participants precisely.
    path: Vec<NodeId>,
    result: EvaluationResult,
}

/// Node types whose outputs depend on the session clock. Their `time`
/// parameter is overridden with the tick value, so downstream invalidation
/// follows from the fingerprint like any other change.
pub const TIME_TYPE: &str = "Time";

/// True when any instance in the graph consumes the session clock.
pub fn has_time_consumer(graph: &Graph) -> bool {
    graph.nodes().any(|n| n.type_name == TIME_TYPE)
}

/// True when a node type is a sink: it terminates the pull in a pass.
fn is_sink(node_type: &NodeType) -> bool {
    node_type.descriptor.outputs.is_empty() || node_type.descriptor.type_name == "OutputSink"
}

impl<'a> Evaluator<'a> {
    pub fn new(
        graph: &'a Graph,
        registry: &NodeRegistry,
        cache: &'a mut ResultCache,
        time: f64,
    ) -> Self {
        Self {
            graph,
            types: registry.snapshot(),
            cache,
            time,
            marks: HashMap::new(),
            path: Vec::new(),
            result: EvaluationResult::default(),
        }
    }

    /// Evaluate every sink (and its dependency tree). Nodes nothing pulls
    /// from are not evaluated at all.
    pub fn run(mut self) -> EvaluationResult {
        let sink_ids: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|n| match self.types.get(&n.type_name) {
                Some(t) => is_sink(t),
                // Unregistered types surface as per-instance errors below.
                None => true,
            })
            .map(|n| n.id.clone())
            .collect();

        debug!("evaluating {} sink(s)", sink_ids.len());
        for id in &sink_ids {
            self.visit(id);
        }
        for id in sink_ids {
            if let Some(outputs) = self.result.outputs.get(&id) {
                self.result.sinks.insert(id, outputs.clone());
            }
        }
        self.result
    }

    /// Visit one node, evaluating its dependencies first. Returns true if
    /// the node now has outputs in the result.
    fn visit(&mut self, id: &NodeId) -> bool {
        match self.marks.get(id) {
            Some(Mark::Done) => return self.result.outputs.contains_key(id),
            Some(Mark::InProgress) => {
                // Grey node reached again: a cycle. The participants are
                // exactly the path suffix starting at this node; dependents
                // outside the cycle inherit the error during unwinding.
                let start = self.path.iter().position(|n| n == id).unwrap_or(0);
                let mut participants: Vec<NodeId> = self.path[start..].to_vec();
                participants.sort();
                warn!(
                    "cycle detected through {} instance(s)",
                    participants.len()
                );
                for node in &participants {
                    self.result.errors.insert(
                        node.clone(),
                        EvalError::Cycle {
                            participants: participants.clone(),
                        },
                    );
                    self.marks.insert(node.clone(), Mark::Done);
                }
                return false;
            }
            None => {}
        }

        self.marks.insert(id.clone(), Mark::InProgress);
        self.path.push(id.clone());
        let outcome = self.evaluate_node(id);
        self.path.pop();
        // A cycle may have already finalized this node while we recursed.
        if self.marks.get(id) == Some(&Mark::InProgress) {
            self.marks.insert(id.clone(), Mark::Done);
            match outcome {
                Ok(outputs) => {
                    self.result.outputs.insert(id.clone(), outputs);
                    return true;
                }
                Err(err) => {
                    self.result.errors.insert(id.clone(), err);
                    return false;
                }
            }
        }
        self.result.outputs.contains_key(id)
    }

    fn evaluate_node(&mut self, id: &NodeId) -> Result<IndexMap<String, Value>, EvalError> {
        let instance = match self.graph.node(id) {
            Some(n) => n.clone(),
            None => return Err(EvalError::UnknownNodeType(id.to_string())),
        };
        let node_type = self
            .types
            .get(&instance.type_name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownNodeType(instance.type_name.clone()))?;

        // Resolve inputs in declared port order: edge value, else default.
        let mut inputs = IndexMap::with_capacity(node_type.descriptor.inputs.len());
        for port in &node_type.descriptor.inputs {
            let value = match self.graph.incoming(id, &port.id) {
                Some(edge) => {
                    let source = edge.source.clone();
                    if !self.visit(&source) {
                        // If the cycle path already failed this node, keep
                        // the cycle error rather than overwriting it.
                        if let Some(err) = self.result.errors.get(id) {
                            return Err(err.clone());
                        }
                        // Cycles abort every dependent with the participant
                        // list; other failures taint as UpstreamFailure.
                        if let Some(EvalError::Cycle { participants }) =
                            self.result.errors.get(&source)
                        {
                            return Err(EvalError::Cycle {
                                participants: participants.clone(),
                            });
                        }
                        return Err(EvalError::UpstreamFailure(source));
                    }
                    let upstream = &self.result.outputs[&source];
                    let raw = upstream.get(&edge.source_output).cloned().ok_or_else(|| {
                        EvalError::Runtime(crate::error::RuntimeError::MissingOutput(
                            edge.source_output.clone(),
                        ))
                    })?;
                    coerce(raw, &port.value_type).map_err(|source| {
                        EvalError::Runtime(crate::error::RuntimeError::InputType {
                            port: port.id.clone(),
                            source,
                        })
                    })?
                }
                None => {
                    if port.required && port.default.is_none() {
                        return Err(EvalError::MissingRequiredInput(port.id.clone()));
                    }
                    port.default_value()
                }
            };
            inputs.insert(port.id.clone(), value);
        }

        // Parameters in declared order: override, else default. The Time
        // node's clock parameter tracks the session time.
        let mut params = IndexMap::with_capacity(node_type.descriptor.parameters.len());
        for spec in &node_type.descriptor.parameters {
            let value = if instance.type_name == TIME_TYPE && spec.id == "time" {
                Value::Number(self.time)
            } else {
                instance
                    .parameters
                    .get(&spec.id)
                    .cloned()
                    .unwrap_or_else(|| spec.default_value())
            };
            params.insert(spec.id.clone(), value);
        }

        let fingerprint =
            Fingerprint::compute(&instance.type_name, node_type.version, &inputs, &params);
        if let Some(outputs) = self.cache.get(id, fingerprint) {
            return Ok(outputs);
        }

        let args = crate::body::BodyArgs {
            inputs: &inputs,
            params: &params,
        };
        let outputs = node_type.body.invoke(&node_type.descriptor, &args)?;
        self.cache.insert(id.clone(), fingerprint, outputs.clone());
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::graph::Edge;

    fn setup() -> (NodeRegistry, Graph, ResultCache) {
        let registry = NodeRegistry::new();
        builtins::register_all(&registry).unwrap();
        (registry, Graph::new(), ResultCache::new())
    }

    fn add(graph: &mut Graph, registry: &NodeRegistry, id: &str, type_name: &str) {
        graph
            .add_node(NodeId::new(id), type_name.to_string(), registry)
            .unwrap();
    }

    fn connect(graph: &mut Graph, registry: &NodeRegistry, s: &str, so: &str, t: &str, ti: &str) {
        graph
            .add_edge(
                Edge {
                    source: NodeId::new(s),
                    source_output: so.to_string(),
                    target: NodeId::new(t),
                    target_input: ti.to_string(),
                },
                registry,
            )
            .unwrap();
    }

    #[test]
    fn test_float_math_sink_pipeline() {
        let (registry, mut graph, mut cache) = setup();
        add(&mut graph, &registry, "f", "Float");
        add(&mut graph, &registry, "two", "Float");
        add(&mut graph, &registry, "m", "Math");
        add(&mut graph, &registry, "out", "OutputSink");
        graph
            .set_parameter(&NodeId::new("f"), "value", Value::Number(5.0), &registry)
            .unwrap();
        graph
            .set_parameter(&NodeId::new("two"), "value", Value::Number(2.0), &registry)
            .unwrap();
        graph
            .set_parameter(&NodeId::new("m"), "op", Value::Enum("multiply".into()), &registry)
            .unwrap();
        connect(&mut graph, &registry, "f", "value", "m", "a");
        connect(&mut graph, &registry, "two", "value", "m", "b");
        connect(&mut graph, &registry, "m", "result", "out", "value");

        let result = Evaluator::new(&graph, &registry, &mut cache, 0.0).run();
        assert!(result.is_clean());
        assert_eq!(
            result.sinks[&NodeId::new("out")]["value"],
            Value::Number(10.0)
        );
    }

    #[test]
    fn test_cycle_names_every_participant() {
        let (registry, mut graph, mut cache) = setup();
        add(&mut graph, &registry, "m1", "Math");
        add(&mut graph, &registry, "m2", "Math");
        add(&mut graph, &registry, "out", "OutputSink");
        connect(&mut graph, &registry, "m1", "result", "m2", "a");
        connect(&mut graph, &registry, "m2", "result", "m1", "a");
        connect(&mut graph, &registry, "m2", "result", "out", "value");

        let result = Evaluator::new(&graph, &registry, &mut cache, 0.0).run();
        let err = &result.errors[&NodeId::new("m1")];
        match err {
            EvalError::Cycle { participants } => {
                assert!(participants.contains(&NodeId::new("m1")));
                assert!(participants.contains(&NodeId::new("m2")));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
        assert!(result.errors.contains_key(&NodeId::new("m2")));
        // The sink pulls into the cycle and aborts with the same
        // participant list, which never names the sink itself.
        match &result.errors[&NodeId::new("out")] {
            EvalError::Cycle { participants } => {
                assert_eq!(participants.len(), 2);
                assert!(!participants.contains(&NodeId::new("out")));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_taints_consumers_only() {
        let (registry, mut graph, mut cache) = setup();
        // Branch 1: division by zero
        add(&mut graph, &registry, "zero", "Float");
        add(&mut graph, &registry, "one", "Float");
        add(&mut graph, &registry, "div", "Math");
        add(&mut graph, &registry, "bad_sink", "OutputSink");
        graph
            .set_parameter(&NodeId::new("one"), "value", Value::Number(1.0), &registry)
            .unwrap();
        graph
            .set_parameter(&NodeId::new("div"), "op", Value::Enum("divide".into()), &registry)
            .unwrap();
        connect(&mut graph, &registry, "one", "value", "div", "a");
        connect(&mut graph, &registry, "zero", "value", "div", "b");
        connect(&mut graph, &registry, "div", "result", "bad_sink", "value");
        // Branch 2: healthy
        add(&mut graph, &registry, "f", "Float");
        add(&mut graph, &registry, "good_sink", "OutputSink");
        graph
            .set_parameter(&NodeId::new("f"), "value", Value::Number(3.0), &registry)
            .unwrap();
        connect(&mut graph, &registry, "f", "value", "good_sink", "value");

        let result = Evaluator::new(&graph, &registry, &mut cache, 0.0).run();
        assert!(matches!(
            result.errors[&NodeId::new("div")],
            EvalError::Runtime(_)
        ));
        assert!(matches!(
            result.errors[&NodeId::new("bad_sink")],
            EvalError::UpstreamFailure(_)
        ));
        assert_eq!(
            result.sinks[&NodeId::new("good_sink")]["value"],
            Value::Number(3.0)
        );
    }

    #[test]
    fn test_unpulled_nodes_are_not_evaluated() {
        let (registry, mut graph, mut cache) = setup();
        add(&mut graph, &registry, "orphan", "Float");
        add(&mut graph, &registry, "f", "Float");
        add(&mut graph, &registry, "out", "OutputSink");
        connect(&mut graph, &registry, "f", "value", "out", "value");

        let result = Evaluator::new(&graph, &registry, &mut cache, 0.0).run();
        assert!(!result.outputs.contains_key(&NodeId::new("orphan")));
    }

    #[test]
    fn test_second_pass_hits_cache() {
        let (registry, mut graph, mut cache) = setup();
        add(&mut graph, &registry, "f", "Float");
        add(&mut graph, &registry, "out", "OutputSink");
        connect(&mut graph, &registry, "f", "value", "out", "value");

        let r1 = Evaluator::new(&graph, &registry, &mut cache, 0.0).run();
        let misses_after_first = cache.statistics().misses;
        let r2 = Evaluator::new(&graph, &registry, &mut cache, 0.0).run();
        assert_eq!(
            r1.sinks[&NodeId::new("out")],
            r2.sinks[&NodeId::new("out")]
        );
        assert_eq!(cache.statistics().misses, misses_after_first);
        assert!(cache.statistics().hits >= 2);
    }

    #[test]
    fn test_time_injection_changes_fingerprint() {
        let (registry, mut graph, mut cache) = setup();
        add(&mut graph, &registry, "t", "Time");
        add(&mut graph, &registry, "out", "OutputSink");
        connect(&mut graph, &registry, "t", "time", "out", "value");

        let r1 = Evaluator::new(&graph, &registry, &mut cache, 1.0).run();
        assert_eq!(r1.sinks[&NodeId::new("out")]["value"], Value::Number(1.0));
        let r2 = Evaluator::new(&graph, &registry, &mut cache, 2.5).run();
        assert_eq!(r2.sinks[&NodeId::new("out")]["value"], Value::Number(2.5));
    }
}
