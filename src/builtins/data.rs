//! Session clock, boolean select, and color source

use indexmap::IndexMap;

use crate::body::BodyArgs;
use crate::descriptor::{NodeTypeDescriptor, PortSpec};
use crate::error::{DescriptorError, RuntimeError};
use crate::registry::NodeRegistry;
use crate::value::{Value, ValueType};

use super::{arg, number};

pub fn register(registry: &NodeRegistry) -> Result<(), DescriptorError> {
    // `time` is written by the engine on every tick; a stored override is
    // never consulted.
    registry.register_native(
        NodeTypeDescriptor::new("Time", "Values")
            .with_parameters(vec![PortSpec::new("time", ValueType::Number)
                .with_default(Value::Number(0.0))])
            .with_outputs(vec![PortSpec::new("time", ValueType::Number)]),
        time_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("Switch", "Data")
            .with_inputs(vec![
                PortSpec::new("condition", ValueType::Boolean)
                    .with_default(Value::Boolean(false)),
                PortSpec::new("a", ValueType::Any),
                PortSpec::new("b", ValueType::Any),
            ])
            .with_outputs(vec![PortSpec::new("value", ValueType::Any)]),
        switch_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("ColorConstant", "Values")
            .with_parameters(vec![PortSpec::new("color", ValueType::Color)
                .with_default(Value::Color([1.0, 1.0, 1.0, 1.0]))])
            .with_outputs(vec![PortSpec::new("color", ValueType::Color)]),
        color_body,
    )?;

    Ok(())
}

fn time_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let time = number(args.params, "time")?;
    Ok([("time".to_string(), Value::Number(time))].into_iter().collect())
}

fn switch_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let condition = match arg(args.inputs, "condition")? {
        Value::Boolean(b) => *b,
        other => {
            return Err(RuntimeError::InvalidOperand {
                op: "Switch",
                operand: other.type_name(),
            })
        }
    };
    let selected = if condition { "a" } else { "b" };
    let value = arg(args.inputs, selected)?.clone();
    Ok([("value".to_string(), value)].into_iter().collect())
}

fn color_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let color = arg(args.params, "color")?.clone();
    Ok([("color".to_string(), color)].into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_selects_by_condition() {
        let params = IndexMap::new();
        let inputs: IndexMap<String, Value> = [
            ("condition".to_string(), Value::Boolean(true)),
            ("a".to_string(), Value::Text("left".into())),
            ("b".to_string(), Value::Text("right".into())),
        ]
        .into_iter()
        .collect();
        let out = switch_body(&BodyArgs { inputs: &inputs, params: &params }).unwrap();
        assert_eq!(out["value"], Value::Text("left".into()));
    }
}
