//! Embeddable node-graph engine for procedural geometry and materials
//!
//! Hosts register node types (built-in or described in JSON with a small
//! expression/script body), load graphs of typed instances, and pull
//! results from sink nodes. Evaluation is incremental: every node
//! invocation is fingerprinted and cached, and bursts of edits or time
//! ticks collapse into single debounced passes.

pub mod body;
pub mod builtins;
pub mod cache;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod registry;
pub mod scheduler;
pub mod value;

// Re-export the embedding surface
pub use descriptor::{BodySpec, NodeTypeDescriptor, ParamSpec, PortSpec};
pub use engine::{Engine, GraphHandle};
pub use error::{CompileError, DescriptorError, EvalError, GraphError, RuntimeError};
pub use evaluator::EvaluationResult;
pub use graph::{Edge, GraphData, GraphEdit, NodeId};
pub use scheduler::SchedulerConfig;
pub use value::{GeometryData, MaterialData, PointSetData, Value, ValueType};
