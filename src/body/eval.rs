//! Static checks and the runtime interpreter for compiled bodies
//!
//! Static checking happens once at registration time: every free identifier
//! must resolve to a declared input/parameter, a local binding, or an
//! allowlisted primitive, and every declared output must be assigned on
//! every syntactic path. The interpreter is pure: it sees only the per-call
//! environment and the primitive table, and retains nothing between calls.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use once_cell::sync::Lazy;

use crate::error::{CompileError, RuntimeError};
use crate::value::Value;

use super::parser::{BinaryOp, Block, Expr, Stmt, UnaryOp};

/// An allowlisted pure function available to body expressions.
pub struct Primitive {
    pub name: &'static str,
    pub arity: usize,
    pub apply: fn(&[Value]) -> Result<Value, RuntimeError>,
}

fn num(args: &[Value], i: usize, op: &'static str) -> Result<f64, RuntimeError> {
    args[i].as_number().ok_or(RuntimeError::InvalidOperand {
        op,
        operand: args[i].type_name(),
    })
}

fn vec(args: &[Value], i: usize, op: &'static str) -> Result<Vec3, RuntimeError> {
    match &args[i] {
        Value::Vector3(v) => Ok(*v),
        other => Err(RuntimeError::InvalidOperand {
            op,
            operand: other.type_name(),
        }),
    }
}

fn finite(op: &'static str, n: f64) -> Result<Value, RuntimeError> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(RuntimeError::NonFinite(op))
    }
}

macro_rules! unary_math {
    ($name:literal, $f:expr) => {
        Primitive {
            name: $name,
            arity: 1,
            apply: |args| finite($name, $f(num(args, 0, $name)?)),
        }
    };
}

macro_rules! binary_math {
    ($name:literal, $f:expr) => {
        Primitive {
            name: $name,
            arity: 2,
            apply: |args| finite($name, $f(num(args, 0, $name)?, num(args, 1, $name)?)),
        }
    };
}

/// The fixed, audited primitive allowlist. Nothing outside this table is
/// callable from a body.
pub static PRIMITIVES: Lazy<HashMap<&'static str, Primitive>> = Lazy::new(|| {
    let list = [
        unary_math!("abs", f64::abs),
        unary_math!("floor", f64::floor),
        unary_math!("ceil", f64::ceil),
        unary_math!("round", f64::round),
        unary_math!("sqrt", f64::sqrt),
        unary_math!("exp", f64::exp),
        unary_math!("log", f64::ln),
        unary_math!("sin", f64::sin),
        unary_math!("cos", f64::cos),
        unary_math!("tan", f64::tan),
        unary_math!("asin", f64::asin),
        unary_math!("acos", f64::acos),
        unary_math!("atan", f64::atan),
        unary_math!("sign", f64::signum),
        binary_math!("pow", f64::powf),
        binary_math!("atan2", f64::atan2),
        binary_math!("mod", f64::rem_euclid),
        Primitive {
            name: "min",
            arity: 2,
            apply: |args| finite("min", num(args, 0, "min")?.min(num(args, 1, "min")?)),
        },
        Primitive {
            name: "max",
            arity: 2,
            apply: |args| finite("max", num(args, 0, "max")?.max(num(args, 1, "max")?)),
        },
        Primitive {
            name: "clamp",
            arity: 3,
            apply: |args| {
                let x = num(args, 0, "clamp")?;
                let lo = num(args, 1, "clamp")?;
                let hi = num(args, 2, "clamp")?;
                finite("clamp", x.clamp(lo.min(hi), lo.max(hi)))
            },
        },
        Primitive {
            name: "mix",
            arity: 3,
            apply: |args| {
                let t = num(args, 2, "mix")?;
                match (&args[0], &args[1]) {
                    (Value::Vector3(a), Value::Vector3(b)) => {
                        Ok(Value::Vector3(a.lerp(*b, t as f32)))
                    }
                    _ => {
                        let a = num(args, 0, "mix")?;
                        let b = num(args, 1, "mix")?;
                        finite("mix", a + (b - a) * t)
                    }
                }
            },
        },
        Primitive {
            name: "vec3",
            arity: 3,
            apply: |args| {
                Ok(Value::Vector3(Vec3::new(
                    num(args, 0, "vec3")? as f32,
                    num(args, 1, "vec3")? as f32,
                    num(args, 2, "vec3")? as f32,
                )))
            },
        },
        Primitive {
            name: "length",
            arity: 1,
            apply: |args| finite("length", vec(args, 0, "length")?.length() as f64),
        },
        Primitive {
            name: "normalize",
            arity: 1,
            apply: |args| {
                let v = vec(args, 0, "normalize")?;
                let n = v.normalize_or_zero();
                Ok(Value::Vector3(n))
            },
        },
        Primitive {
            name: "dot",
            arity: 2,
            apply: |args| {
                finite(
                    "dot",
                    vec(args, 0, "dot")?.dot(vec(args, 1, "dot")?) as f64,
                )
            },
        },
        Primitive {
            name: "cross",
            arity: 2,
            apply: |args| {
                Ok(Value::Vector3(
                    vec(args, 0, "cross")?.cross(vec(args, 1, "cross")?),
                ))
            },
        },
    ];
    list.into_iter().map(|p| (p.name, p)).collect()
});

/// Named constants visible to every body.
pub static CONSTANTS: Lazy<HashMap<&'static str, Value>> = Lazy::new(|| {
    HashMap::from([
        ("PI", Value::Number(std::f64::consts::PI)),
        ("TAU", Value::Number(std::f64::consts::TAU)),
        ("E", Value::Number(std::f64::consts::E)),
    ])
});

// ---- static checks ------------------------------------------------------

/// Check one expression against the set of readable identifiers.
pub fn check_expr(expr: &Expr, readable: &HashSet<&str>) -> Result<(), CompileError> {
    match expr {
        Expr::Number(_) | Expr::Boolean(_) | Expr::Text(_) => Ok(()),
        Expr::Var(name) => {
            if readable.contains(name.as_str()) || CONSTANTS.contains_key(name.as_str()) {
                Ok(())
            } else {
                Err(CompileError::UnknownIdentifier(name.clone()))
            }
        }
        Expr::Unary { operand, .. } => check_expr(operand, readable),
        Expr::Binary { lhs, rhs, .. } => {
            check_expr(lhs, readable)?;
            check_expr(rhs, readable)
        }
        Expr::Ternary { cond, then, otherwise } => {
            check_expr(cond, readable)?;
            check_expr(then, readable)?;
            check_expr(otherwise, readable)
        }
        Expr::Call { name, args } => {
            let prim = PRIMITIVES
                .get(name.as_str())
                .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
            if args.len() != prim.arity {
                return Err(CompileError::Arity {
                    name: prim.name,
                    expected: prim.arity,
                    got: args.len(),
                });
            }
            for arg in args {
                check_expr(arg, readable)?;
            }
            Ok(())
        }
    }
}

/// Check a script block. Returns the set of outputs definitely assigned on
/// every path through the block.
///
/// `declared` is the input/parameter namespace, `outputs` the output ids.
/// Assigned outputs and `let` locals become readable as the walk proceeds;
/// a branch's bindings do not escape it, and an output only counts as
/// assigned past an `if` when both arms assign it.
pub fn check_script<'a>(
    block: &'a Block,
    declared: &HashSet<&'a str>,
    outputs: &HashSet<&'a str>,
) -> Result<HashSet<&'a str>, CompileError> {
    let mut readable: HashSet<&str> = declared.clone();
    let mut assigned: HashSet<&str> = HashSet::new();
    check_block(block, declared, outputs, &mut readable, &mut assigned)?;
    Ok(assigned)
}

fn check_block<'a>(
    block: &'a Block,
    declared: &HashSet<&str>,
    outputs: &HashSet<&str>,
    readable: &mut HashSet<&'a str>,
    assigned: &mut HashSet<&'a str>,
) -> Result<(), CompileError> {
    for stmt in block {
        match stmt {
            Stmt::Let { name, expr } => {
                if declared.contains(name.as_str()) || outputs.contains(name.as_str()) {
                    return Err(CompileError::ShadowedBinding(name.clone()));
                }
                check_expr(expr, readable)?;
                readable.insert(name.as_str());
            }
            Stmt::Assign { name, expr } => {
                check_expr(expr, readable)?;
                if outputs.contains(name.as_str()) {
                    assigned.insert(name.as_str());
                    readable.insert(name.as_str());
                } else if !readable.contains(name.as_str()) || declared.contains(name.as_str()) {
                    // Reassigning a local is fine; writing an input/parameter
                    // or an undeclared name is not.
                    return Err(CompileError::InvalidAssignTarget(name.clone()));
                }
            }
            Stmt::If { cond, then, otherwise } => {
                check_expr(cond, readable)?;

                let mut then_readable = readable.clone();
                let mut then_assigned = assigned.clone();
                check_block(then, declared, outputs, &mut then_readable, &mut then_assigned)?;

                if let Some(else_block) = otherwise {
                    let mut else_readable = readable.clone();
                    let mut else_assigned = assigned.clone();
                    check_block(
                        else_block,
                        declared,
                        outputs,
                        &mut else_readable,
                        &mut else_assigned,
                    )?;
                    // Definite assignment: intersection of the two arms.
                    for name in then_assigned.intersection(&else_assigned) {
                        assigned.insert(*name);
                        readable.insert(*name);
                    }
                }
                // No else: nothing is definitely assigned by this statement.
            }
        }
    }
    Ok(())
}

// ---- interpreter --------------------------------------------------------

/// Per-invocation variable environment.
pub type Env = HashMap<String, Value>;

pub fn eval_expr(expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Var(name) => env
            .get(name)
            .cloned()
            .or_else(|| CONSTANTS.get(name.as_str()).cloned())
            // Statically checked; a miss here means an unassigned-on-this-path
            // local, which the checker has already ruled out.
            .ok_or_else(|| RuntimeError::Other(format!("unbound variable '{}'", name))),
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, env)?;
            apply_unary(*op, value)
        }
        Expr::Binary { op, lhs, rhs } => match op {
            // Short-circuiting forms evaluate the right side lazily.
            BinaryOp::And | BinaryOp::Or => {
                let l = expect_bool(op.symbol(), eval_expr(lhs, env)?)?;
                if (*op == BinaryOp::And && !l) || (*op == BinaryOp::Or && l) {
                    return Ok(Value::Boolean(l));
                }
                let r = expect_bool(op.symbol(), eval_expr(rhs, env)?)?;
                Ok(Value::Boolean(r))
            }
            _ => {
                let l = eval_expr(lhs, env)?;
                let r = eval_expr(rhs, env)?;
                apply_binary(*op, l, r)
            }
        },
        Expr::Ternary { cond, then, otherwise } => {
            if expect_bool("?:", eval_expr(cond, env)?)? {
                eval_expr(then, env)
            } else {
                eval_expr(otherwise, env)
            }
        }
        Expr::Call { name, args } => {
            let prim = PRIMITIVES
                .get(name.as_str())
                .ok_or_else(|| RuntimeError::Other(format!("unknown function '{}'", name)))?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, env)?);
            }
            (prim.apply)(&values)
        }
    }
}

pub fn exec_block(block: &Block, env: &mut Env) -> Result<(), RuntimeError> {
    for stmt in block {
        match stmt {
            Stmt::Let { name, expr } | Stmt::Assign { name, expr } => {
                let value = eval_expr(expr, env)?;
                env.insert(name.clone(), value);
            }
            Stmt::If { cond, then, otherwise } => {
                if expect_bool("if", eval_expr(cond, env)?)? {
                    exec_block(then, env)?;
                } else if let Some(else_block) = otherwise {
                    exec_block(else_block, env)?;
                }
            }
        }
    }
    Ok(())
}

fn expect_bool(op: &'static str, value: Value) -> Result<bool, RuntimeError> {
    value.as_boolean().ok_or(RuntimeError::InvalidOperand {
        op,
        operand: value.type_name(),
    })
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Neg, Value::Integer(i)) => Ok(Value::Integer(-i)),
        (UnaryOp::Neg, Value::Vector3(v)) => Ok(Value::Vector3(-v)),
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Neg, other) => Err(RuntimeError::InvalidOperand {
            op: "-",
            operand: other.type_name(),
        }),
        (UnaryOp::Not, other) => Err(RuntimeError::InvalidOperand {
            op: "!",
            operand: other.type_name(),
        }),
    }
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    use BinaryOp::*;
    let sym = op.symbol();

    match op {
        Add | Sub | Mul | Div | Rem | Pow => arithmetic(op, lhs, rhs),
        Lt | LtEq | Gt | GtEq => {
            let (a, b) = both_numbers(sym, &lhs, &rhs)?;
            Ok(Value::Boolean(match op {
                Lt => a < b,
                LtEq => a <= b,
                Gt => a > b,
                GtEq => a >= b,
                _ => unreachable!(),
            }))
        }
        Eq | NotEq => {
            let equal = values_equal(&lhs, &rhs);
            Ok(Value::Boolean(if op == Eq { equal } else { !equal }))
        }
        // Short-circuit ops are handled before evaluation of the right side.
        And | Or => unreachable!("short-circuit ops handled in eval_expr"),
    }
}

fn both_numbers(
    op: &'static str,
    lhs: &Value,
    rhs: &Value,
) -> Result<(f64, f64), RuntimeError> {
    let a = lhs.as_number().ok_or(RuntimeError::InvalidOperand {
        op,
        operand: lhs.type_name(),
    })?;
    let b = rhs.as_number().ok_or(RuntimeError::InvalidOperand {
        op,
        operand: rhs.type_name(),
    })?;
    Ok((a, b))
}

/// Equality across the comparable subset of value types. Numeric values
/// compare by value (2 == 2.0), everything else by exact payload.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => match (lhs, rhs) {
            (Value::Text(a), Value::Text(b))
            | (Value::Enum(a), Value::Enum(b))
            | (Value::Text(a), Value::Enum(b))
            | (Value::Enum(a), Value::Text(b)) => a == b,
            _ => lhs == rhs,
        },
    }
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    use BinaryOp::*;
    let sym = op.symbol();

    // Integer-preserving cases first.
    if let (Value::Integer(a), Value::Integer(b)) = (&lhs, &rhs) {
        match op {
            Add => return Ok(Value::Integer(a.wrapping_add(*b))),
            Sub => return Ok(Value::Integer(a.wrapping_sub(*b))),
            Mul => return Ok(Value::Integer(a.wrapping_mul(*b))),
            Rem => {
                return if *b == 0 {
                    Err(RuntimeError::NonFinite("%"))
                } else {
                    Ok(Value::Integer(a.rem_euclid(*b)))
                };
            }
            _ => {}
        }
    }

    // Vector cases.
    match (&lhs, &rhs) {
        (Value::Vector3(a), Value::Vector3(b)) => {
            let v = match op {
                Add => *a + *b,
                Sub => *a - *b,
                Mul => *a * *b,
                Div => {
                    let v = *a / *b;
                    if !v.is_finite() {
                        return Err(RuntimeError::NonFinite("/"));
                    }
                    v
                }
                _ => {
                    return Err(RuntimeError::InvalidOperand {
                        op: sym,
                        operand: "Vector3",
                    });
                }
            };
            return Ok(Value::Vector3(v));
        }
        (Value::Vector3(v), other) | (other, Value::Vector3(v)) => {
            let s = other.as_number().ok_or(RuntimeError::InvalidOperand {
                op: sym,
                operand: other.type_name(),
            })? as f32;
            let scaled = match op {
                Mul => *v * s,
                Div if matches!(lhs, Value::Vector3(_)) => {
                    let r = *v / s;
                    if !r.is_finite() {
                        return Err(RuntimeError::NonFinite("/"));
                    }
                    r
                }
                _ => {
                    return Err(RuntimeError::InvalidOperand {
                        op: sym,
                        operand: "Vector3",
                    });
                }
            };
            return Ok(Value::Vector3(scaled));
        }
        _ => {}
    }

    let (a, b) = both_numbers(sym, &lhs, &rhs)?;
    let result = match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => a / b,
        Rem => a.rem_euclid(b),
        Pow => a.powf(b),
        _ => unreachable!(),
    };
    if result.is_finite() {
        Ok(Value::Number(result))
    } else {
        Err(RuntimeError::NonFinite(sym))
    }
}
