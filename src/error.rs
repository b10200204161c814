//! Error taxonomy for the engine
//!
//! Registration- and edit-time errors are rejected synchronously and leave
//! prior state untouched. Evaluation-time errors are scoped to a single node
//! instance and propagated to its dependents as tainted results; nothing in
//! this crate is fatal to the process.

use thiserror::Error;

use crate::graph::NodeId;

/// A value could not be converted to the requested port type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot coerce {from} to {to}")]
pub struct TypeMismatch {
    /// Name of the value's actual type
    pub from: &'static str,
    /// Name of the requested type
    pub to: &'static str,
}

/// A node type descriptor was rejected at registration time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error("node type name must not be empty")]
    EmptyTypeName,

    #[error("duplicate input port id '{0}'")]
    DuplicateInputId(String),

    #[error("duplicate output port id '{0}'")]
    DuplicateOutputId(String),

    #[error("duplicate parameter id '{0}'")]
    DuplicateParameterId(String),

    #[error("enum port '{0}' declares no options")]
    EnumWithoutOptions(String),

    #[error("default value for port '{port}' does not match its type: {source}")]
    BadDefault {
        port: String,
        source: TypeMismatch,
    },

    #[error("dynamic node type declares no body")]
    MissingBody,

    #[error("malformed descriptor: {0}")]
    Malformed(String),

    #[error("body failed to compile: {0}")]
    Compile(#[from] CompileError),
}

/// A dynamic node body was rejected by the body compiler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("expression declared for '{0}', which is not an output of this node type")]
    UnknownOutput(String),

    #[error("output '{0}' is not assigned on every path through the body")]
    OutputNotAssigned(String),

    #[error("'{0}' shadows a declared input or parameter")]
    ShadowedBinding(String),

    #[error("assignment target '{0}' is neither an output nor a local binding")]
    InvalidAssignTarget(String),
}

/// A structural edit (or graph load) was rejected before being applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("instance '{0}' already exists in the graph")]
    DuplicateInstance(NodeId),

    #[error("instance '{0}' does not exist")]
    UnknownInstance(NodeId),

    #[error("node type '{0}' is not registered")]
    UnknownType(String),

    #[error("instance '{instance}' has no port '{port}'")]
    UnknownPort { instance: NodeId, port: String },

    #[error("input {instance}.{port} already has an incoming edge")]
    InputOccupied { instance: NodeId, port: String },

    #[error("edge would connect instance '{0}' to itself")]
    SelfEdge(NodeId),

    #[error("no such edge")]
    EdgeNotFound,

    #[error("instance '{instance}' has no parameter '{param}'")]
    UnknownParameter { instance: NodeId, param: String },

    #[error("parameter {instance}.{param} rejected value: {source}")]
    ParameterType {
        instance: NodeId,
        param: String,
        source: TypeMismatch,
    },

    #[error("unknown graph handle")]
    UnknownHandle,

    #[error("malformed graph data: {0}")]
    Malformed(String),
}

/// A failure while invoking one node's body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("operation '{0}' produced a non-finite number")]
    NonFinite(&'static str),

    #[error("operator '{op}' cannot be applied to {operand}")]
    InvalidOperand { op: &'static str, operand: &'static str },

    #[error("input '{port}' rejected upstream value: {source}")]
    InputType { port: String, source: TypeMismatch },

    #[error("output '{output}' produced a value of the wrong type: {source}")]
    OutputType { output: String, source: TypeMismatch },

    #[error("body produced no value for output '{0}'")]
    MissingOutput(String),

    #[error("{0}")]
    Other(String),
}

/// Evaluation failure attached to a single node instance.
///
/// Never aborts the pass: the failing instance and its transitive consumers
/// carry one of these in the result's error map while unrelated branches
/// still produce values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cycle through instances: {}", .participants.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(" -> "))]
    Cycle { participants: Vec<NodeId> },

    #[error("required input '{0}' has no incoming edge and no default")]
    MissingRequiredInput(String),

    #[error("node type '{0}' is not registered")]
    UnknownNodeType(String),

    #[error("upstream instance '{0}' failed")]
    UpstreamFailure(NodeId),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
