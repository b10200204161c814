//! Scalar value sources and arithmetic

use indexmap::IndexMap;

use crate::body::BodyArgs;
use crate::descriptor::{NodeTypeDescriptor, PortSpec};
use crate::error::{DescriptorError, RuntimeError};
use crate::registry::NodeRegistry;
use crate::value::{Value, ValueType};

use super::{arg, number};

const MATH_OPS: &[&str] = &[
    "add", "subtract", "multiply", "divide", "power", "min", "max",
];

pub fn register(registry: &NodeRegistry) -> Result<(), DescriptorError> {
    registry.register_native(
        NodeTypeDescriptor::new("Float", "Values")
            .with_parameters(vec![PortSpec::new("value", ValueType::Number)
                .with_default(Value::Number(0.0))
                .with_range(-10_000.0, 10_000.0, 0.01)])
            .with_outputs(vec![PortSpec::new("value", ValueType::Number)]),
        float_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("Integer", "Values")
            .with_parameters(vec![PortSpec::new("value", ValueType::Integer)
                .with_default(Value::Integer(0))
                .with_range(-10_000.0, 10_000.0, 1.0)])
            .with_outputs(vec![PortSpec::new("value", ValueType::Integer)]),
        integer_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("Math", "Math")
            .with_inputs(vec![
                PortSpec::new("a", ValueType::Number).with_default(Value::Number(0.0)),
                PortSpec::new("b", ValueType::Number).with_default(Value::Number(0.0)),
            ])
            .with_parameters(vec![PortSpec::new(
                "op",
                ValueType::Enum(MATH_OPS.iter().map(|s| s.to_string()).collect()),
            )
            .with_default(Value::Enum("add".to_string()))])
            .with_outputs(vec![PortSpec::new("result", ValueType::Number)]),
        math_body,
    )?;

    registry.register_native(
        NodeTypeDescriptor::new("Clamp", "Math")
            .with_inputs(vec![
                PortSpec::new("value", ValueType::Number).with_default(Value::Number(0.0))
            ])
            .with_parameters(vec![
                PortSpec::new("min", ValueType::Number).with_default(Value::Number(0.0)),
                PortSpec::new("max", ValueType::Number).with_default(Value::Number(1.0)),
            ])
            .with_outputs(vec![PortSpec::new("result", ValueType::Number)]),
        clamp_body,
    )?;

    Ok(())
}

fn float_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let value = number(args.params, "value")?;
    Ok([("value".to_string(), Value::Number(value))].into_iter().collect())
}

fn integer_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let value = arg(args.params, "value")?.clone();
    Ok([("value".to_string(), value)].into_iter().collect())
}

fn math_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let a = number(args.inputs, "a")?;
    let b = number(args.inputs, "b")?;
    let op = match arg(args.params, "op")? {
        Value::Enum(op) => op.clone(),
        other => {
            return Err(RuntimeError::InvalidOperand {
                op: "Math",
                operand: other.type_name(),
            })
        }
    };

    let result = match op.as_str() {
        "add" => a + b,
        "subtract" => a - b,
        "multiply" => a * b,
        "divide" => a / b,
        "power" => a.powf(b),
        "min" => a.min(b),
        "max" => a.max(b),
        other => return Err(RuntimeError::Other(format!("unknown math op '{}'", other))),
    };
    if !result.is_finite() {
        return Err(RuntimeError::NonFinite("Math"));
    }
    Ok([("result".to_string(), Value::Number(result))].into_iter().collect())
}

fn clamp_body(args: &BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError> {
    let value = number(args.inputs, "value")?;
    let min = number(args.params, "min")?;
    let max = number(args.params, "max")?;
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    Ok([("result".to_string(), Value::Number(value.clamp(lo, hi)))]
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;

    fn invoke(type_name: &str, inputs: &[(&str, Value)], params: &[(&str, Value)]) -> Result<IndexMap<String, Value>, RuntimeError> {
        let registry = NodeRegistry::new();
        builtins::register_all(&registry).unwrap();
        let node_type = registry.get(type_name).unwrap();

        let mut resolved_inputs: IndexMap<String, Value> = node_type
            .descriptor
            .inputs
            .iter()
            .map(|p| (p.id.clone(), p.default_value()))
            .collect();
        for (k, v) in inputs {
            resolved_inputs.insert(k.to_string(), v.clone());
        }
        let mut resolved_params: IndexMap<String, Value> = node_type
            .descriptor
            .parameters
            .iter()
            .map(|p| (p.id.clone(), p.default_value()))
            .collect();
        for (k, v) in params {
            resolved_params.insert(k.to_string(), v.clone());
        }

        node_type.body.invoke(
            &node_type.descriptor,
            &BodyArgs {
                inputs: &resolved_inputs,
                params: &resolved_params,
            },
        )
    }

    #[test]
    fn test_math_ops() {
        for (op, expected) in [
            ("add", 9.0),
            ("subtract", 3.0),
            ("multiply", 18.0),
            ("divide", 2.0),
            ("power", 216.0),
            ("min", 3.0),
            ("max", 6.0),
        ] {
            let out = invoke(
                "Math",
                &[("a", Value::Number(6.0)), ("b", Value::Number(3.0))],
                &[("op", Value::Enum(op.to_string()))],
            )
            .unwrap();
            assert_eq!(out["result"], Value::Number(expected), "op {}", op);
        }
    }

    #[test]
    fn test_math_divide_by_zero() {
        let err = invoke(
            "Math",
            &[("a", Value::Number(1.0)), ("b", Value::Number(0.0))],
            &[("op", Value::Enum("divide".to_string()))],
        )
        .unwrap_err();
        assert_eq!(err, RuntimeError::NonFinite("Math"));
    }

    #[test]
    fn test_clamp_swapped_bounds() {
        let out = invoke(
            "Clamp",
            &[("value", Value::Number(5.0))],
            &[("min", Value::Number(2.0)), ("max", Value::Number(0.0))],
        )
        .unwrap();
        assert_eq!(out["result"], Value::Number(2.0));
    }

    #[test]
    fn test_float_and_integer_sources() {
        let out = invoke("Float", &[], &[("value", Value::Number(2.5))]).unwrap();
        assert_eq!(out["value"], Value::Number(2.5));
        let out = invoke("Integer", &[], &[("value", Value::Integer(7))]).unwrap();
        assert_eq!(out["value"], Value::Integer(7));
    }
}
