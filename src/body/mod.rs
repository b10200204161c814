//! Dynamic node bodies: compilation and invocation
//!
//! A body comes in as either an expression map (one expression per output)
//! or a script (statements ending in output assignments). `compile` turns
//! it into a [`CompiledBody`] exactly once, running all static checks so
//! that invocation can never fail on a name or arity problem. Built-in node
//! types plug in native Rust functions through the same type.

pub mod eval;
pub mod lexer;
pub mod parser;

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::descriptor::{BodySpec, NodeTypeDescriptor};
use crate::error::{CompileError, RuntimeError};
use crate::value::{coerce, Value};

use eval::{check_expr, check_script, eval_expr, exec_block, Env};
use parser::{parse_expression, parse_script, Block, Expr};

/// Resolved inputs and parameters handed to a body invocation.
pub struct BodyArgs<'a> {
    pub inputs: &'a IndexMap<String, Value>,
    pub params: &'a IndexMap<String, Value>,
}

/// A native (Rust) body implementation, used by the built-in node types.
pub type NativeBody = fn(&BodyArgs) -> Result<IndexMap<String, Value>, RuntimeError>;

/// A body ready to invoke. Static checking is complete by construction.
pub enum CompiledBody {
    /// One expression per output, in declared output order.
    Expressions(Vec<(String, Expr)>),
    /// A script executed top to bottom; outputs read from the final env.
    Script(Block),
    Native(NativeBody),
}

impl std::fmt::Debug for CompiledBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompiledBody::Expressions(exprs) => f
                .debug_tuple("Expressions")
                .field(&exprs.iter().map(|(k, _)| k).collect::<Vec<_>>())
                .finish(),
            CompiledBody::Script(_) => f.debug_tuple("Script").finish(),
            CompiledBody::Native(_) => f.debug_tuple("Native").finish(),
        }
    }
}

/// Compile a descriptor's body against its declared ports.
pub fn compile(body: &BodySpec, descriptor: &NodeTypeDescriptor) -> Result<CompiledBody, CompileError> {
    let declared: HashSet<&str> = descriptor
        .inputs
        .iter()
        .chain(descriptor.parameters.iter())
        .map(|p| p.id.as_str())
        .collect();
    let outputs: HashSet<&str> = descriptor.outputs.iter().map(|p| p.id.as_str()).collect();

    match body {
        BodySpec::Expressions { expressions } => {
            let mut compiled = Vec::with_capacity(descriptor.outputs.len());
            for (output, source) in expressions {
                if !outputs.contains(output.as_str()) {
                    return Err(CompileError::UnknownOutput(output.clone()));
                }
                let expr = parse_expression(source)?;
                check_expr(&expr, &declared)?;
                compiled.push((output.clone(), expr));
            }
            for port in &descriptor.outputs {
                if !compiled.iter().any(|(name, _)| *name == port.id) {
                    return Err(CompileError::OutputNotAssigned(port.id.clone()));
                }
            }
            // Declared output order, not map order.
            compiled.sort_by_key(|(name, _)| {
                descriptor.outputs.iter().position(|p| p.id == *name)
            });
            Ok(CompiledBody::Expressions(compiled))
        }
        BodySpec::Script { script } => {
            let block = parse_script(script)?;
            let assigned = check_script(&block, &declared, &outputs)?;
            for port in &descriptor.outputs {
                if !assigned.contains(port.id.as_str()) {
                    return Err(CompileError::OutputNotAssigned(port.id.clone()));
                }
            }
            Ok(CompiledBody::Script(block))
        }
    }
}

impl CompiledBody {
    /// Run the body. Outputs are coerced to their declared types; a value
    /// that does not fit its output type is a runtime error attributed to
    /// that output.
    pub fn invoke(
        &self,
        descriptor: &NodeTypeDescriptor,
        args: &BodyArgs,
    ) -> Result<IndexMap<String, Value>, RuntimeError> {
        let raw = match self {
            CompiledBody::Native(f) => f(args)?,
            CompiledBody::Expressions(exprs) => {
                let env = build_env(args);
                let mut out = IndexMap::with_capacity(exprs.len());
                for (name, expr) in exprs {
                    out.insert(name.clone(), eval_expr(expr, &env)?);
                }
                out
            }
            CompiledBody::Script(block) => {
                let mut env = build_env(args);
                exec_block(block, &mut env)?;
                let mut out = IndexMap::with_capacity(descriptor.outputs.len());
                for port in &descriptor.outputs {
                    let value = env
                        .remove(&port.id)
                        .ok_or_else(|| RuntimeError::Other(format!(
                            "output '{}' not produced",
                            port.id
                        )))?;
                    out.insert(port.id.clone(), value);
                }
                out
            }
        };

        let mut coerced = IndexMap::with_capacity(descriptor.outputs.len());
        for port in &descriptor.outputs {
            let value = raw
                .get(&port.id)
                .cloned()
                .ok_or(RuntimeError::MissingOutput(port.id.clone()))?;
            let value = coerce(value, &port.value_type).map_err(|source| {
                RuntimeError::OutputType {
                    output: port.id.clone(),
                    source,
                }
            })?;
            coerced.insert(port.id.clone(), value);
        }
        Ok(coerced)
    }
}

fn build_env(args: &BodyArgs) -> Env {
    let mut env = Env::with_capacity(args.inputs.len() + args.params.len());
    for (k, v) in args.inputs {
        env.insert(k.clone(), v.clone());
    }
    for (k, v) in args.params {
        env.insert(k.clone(), v.clone());
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PortSpec;
    use crate::value::ValueType;

    fn adder() -> NodeTypeDescriptor {
        NodeTypeDescriptor::new("TestAdd", "Math")
            .with_inputs(vec![
                PortSpec::new("a", ValueType::Number),
                PortSpec::new("b", ValueType::Number),
            ])
            .with_outputs(vec![PortSpec::new("sum", ValueType::Number)])
    }

    fn args_env(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_expression_body() {
        let desc = adder();
        let body = BodySpec::Expressions {
            expressions: [("sum".to_string(), "a + b".to_string())].into_iter().collect(),
        };
        let compiled = compile(&body, &desc).unwrap();

        let inputs = args_env(&[("a", Value::Number(2.0)), ("b", Value::Number(3.0))]);
        let params = IndexMap::new();
        let out = compiled
            .invoke(&desc, &BodyArgs { inputs: &inputs, params: &params })
            .unwrap();
        assert_eq!(out["sum"], Value::Number(5.0));
    }

    #[test]
    fn test_expression_body_missing_output() {
        let desc = adder();
        let body = BodySpec::Expressions { expressions: IndexMap::new() };
        assert_eq!(
            compile(&body, &desc).unwrap_err(),
            CompileError::OutputNotAssigned("sum".into())
        );
    }

    #[test]
    fn test_expression_body_unknown_output() {
        let desc = adder();
        let body = BodySpec::Expressions {
            expressions: [("total".to_string(), "a + b".to_string())].into_iter().collect(),
        };
        assert_eq!(
            compile(&body, &desc).unwrap_err(),
            CompileError::UnknownOutput("total".into())
        );
    }

    #[test]
    fn test_script_body() {
        let desc = adder();
        let body = BodySpec::Script {
            script: "let total = a + b; if total < 0 { sum = 0; } else { sum = total; }"
                .to_string(),
        };
        let compiled = compile(&body, &desc).unwrap();

        let inputs = args_env(&[("a", Value::Number(-4.0)), ("b", Value::Number(1.0))]);
        let params = IndexMap::new();
        let out = compiled
            .invoke(&desc, &BodyArgs { inputs: &inputs, params: &params })
            .unwrap();
        assert_eq!(out["sum"], Value::Number(0.0));
    }

    #[test]
    fn test_script_partial_assignment_rejected() {
        let desc = adder();
        let body = BodySpec::Script {
            script: "if a > 0 { sum = a; }".to_string(),
        };
        assert_eq!(
            compile(&body, &desc).unwrap_err(),
            CompileError::OutputNotAssigned("sum".into())
        );
    }

    #[test]
    fn test_output_coercion() {
        // Body yields an Integer, output declared Number
        let desc = NodeTypeDescriptor::new("TestCount", "Data")
            .with_inputs(vec![PortSpec::new("n", ValueType::Integer)])
            .with_outputs(vec![PortSpec::new("value", ValueType::Number)]);
        let body = BodySpec::Expressions {
            expressions: [("value".to_string(), "n * 2".to_string())].into_iter().collect(),
        };
        let compiled = compile(&body, &desc).unwrap();
        let inputs = args_env(&[("n", Value::Integer(3))]);
        let params = IndexMap::new();
        let out = compiled
            .invoke(&desc, &BodyArgs { inputs: &inputs, params: &params })
            .unwrap();
        assert_eq!(out["value"], Value::Number(6.0));
    }
}
