//! Output sink node

use indexmap::IndexMap;

use crate::body::BodyArgs;
use crate::descriptor::{NodeTypeDescriptor, PortSpec};
use crate::error::{DescriptorError, RuntimeError};
use crate::registry::NodeRegistry;
use crate::value::{Value, ValueType};

use super::arg;

/// The sink every evaluation pass pulls from. It passes its input straight
/// through so hosts read final values off the result's sink map.
pub fn register(registry: &NodeRegistry) -> Result<(), DescriptorError> {
    registry.register_native(
        NodeTypeDescriptor::new("OutputSink", "Output")
            .with_inputs(vec![PortSpec::new("value", ValueType::Any).required()])
            .with_outputs(vec![PortSpec::new("value", ValueType::Any)]),
        sink_body,
    )
}

fn sink_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let value = arg(args.inputs, "value")?.clone();
    Ok([("value".to_string(), value)].into_iter().collect())
}
