use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::functions::FunctionRegistry;
use crate::script::{Fragment, Globals, ScriptOptions, ScriptRun, ScriptVariable};
use crate::types::Type;
use crate::value::Value;

/// Failure while executing a fragment chain.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("arithmetic overflow in '{0}'")]
    Overflow(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown identifier {0}")]
    UnknownIdentifier(String),

    #[error("unknown function {0}")]
    UnknownFunction(String),

    #[error("unknown member {member} on {value}")]
    UnknownMember { value: String, member: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("invalid argument: {0}")]
    Argument(String),
}

type EvalResult<T> = Result<T, RuntimeError>;

/// Execute a fragment chain against `globals`, oldest fragment first.
///
/// Declarations bind in order; the produced variable list preserves that
/// order. A chain whose last statement is a bare expression also yields that
/// expression's value as the run's return value.
pub fn run_chain<G: Globals>(
    fragment: &Fragment,
    globals: &G,
    functions: &FunctionRegistry,
    options: ScriptOptions,
) -> EvalResult<ScriptRun> {
    let member = |name: &str| globals.member(name);
    let mut interp = Interp {
        member: &member,
        functions,
        options,
        variables: Vec::new(),
        index: HashMap::new(),
    };

    let mut return_value = None;
    for link in fragment.links() {
        let Some(program) = link.program() else {
            return Err(RuntimeError::Type(format!(
                "fragment failed to parse: {}",
                link.source()
            )));
        };
        for stmt in &program.stmts {
            match stmt {
                Stmt::Decl {
                    data_type,
                    name,
                    expr,
                } => {
                    let value = interp.eval(expr)?;
                    let value = convert_declared(value, data_type)?;
                    if interp.index.contains_key(name) {
                        return Err(RuntimeError::Type(format!(
                            "duplicate declaration of {name}"
                        )));
                    }
                    interp.index.insert(name.clone(), interp.variables.len());
                    interp.variables.push(ScriptVariable {
                        name: name.clone(),
                        data_type: data_type.clone(),
                        is_read_only: true,
                        value,
                    });
                    return_value = None;
                }
                Stmt::Expr(expr) => {
                    return_value = Some(interp.eval(expr)?);
                }
            }
        }
    }

    Ok(ScriptRun {
        variables: interp.variables,
        return_value,
    })
}

/// Materialize the declaration-site conversion (`int` widening to `decimal`).
fn convert_declared(value: Value, data_type: &Type) -> EvalResult<Value> {
    let found = value.data_type();
    if found == *data_type {
        return Ok(value);
    }
    match (data_type, &value) {
        (Type::Decimal, Value::Int(n)) => Ok(Value::Decimal(Decimal::from(*n))),
        _ => Err(RuntimeError::Type(format!(
            "cannot bind a {found} value to a {data_type} variable"
        ))),
    }
}

struct Interp<'a> {
    member: &'a dyn Fn(&str) -> Option<Value>,
    functions: &'a FunctionRegistry,
    options: ScriptOptions,
    variables: Vec<ScriptVariable>,
    index: HashMap<String, usize>,
}

impl Interp<'_> {
    fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Decimal(d) => Ok(Value::Decimal(*d)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Text(s) => Ok(Value::from(s.as_str())),
            Expr::Ident(name) => {
                // Declared variables shadow context members.
                if let Some(idx) = self.index.get(name) {
                    return Ok(self.variables[*idx].value.clone());
                }
                (self.member)(name).ok_or_else(|| RuntimeError::UnknownIdentifier(name.clone()))
            }
            Expr::Member { base, member } => {
                let base = self.eval(base)?;
                base.field(member).cloned().ok_or_else(|| {
                    RuntimeError::UnknownMember {
                        value: base.data_type().to_string(),
                        member: member.clone(),
                    }
                })
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                self.eval_unary(*op, value)
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
        }
    }

    fn eval_call(&self, callee: &Expr, args: &[Expr]) -> EvalResult<Value> {
        let name = match callee {
            Expr::Ident(name) => name,
            other => {
                let description = other
                    .path_text()
                    .unwrap_or_else(|| "expression".to_string());
                return Err(RuntimeError::UnknownFunction(description));
            }
        };

        // `if` short-circuits: only the selected branch is evaluated.
        if name == "if" && args.len() == 3 {
            let condition = self
                .eval(&args[0])?
                .as_bool()
                .ok_or_else(|| RuntimeError::Type("if expects a bool condition".into()))?;
            let branch = if condition { &args[1] } else { &args[2] };
            return self.eval(branch);
        }

        let function = self
            .functions
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.clone()))?;
        let args: Vec<Value> = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<EvalResult<_>>()?;
        function.invoke(&args)
    }

    fn eval_unary(&self, op: UnaryOp, value: Value) -> EvalResult<Value> {
        match (op, value) {
            (UnaryOp::Negate, Value::Int(n)) => {
                if self.options.checked_arithmetic {
                    n.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow("-"))
                } else {
                    Ok(Value::Int(n.wrapping_neg()))
                }
            }
            (UnaryOp::Negate, Value::Decimal(d)) => Ok(Value::Decimal(-d)),
            (UnaryOp::Negate, other) => {
                Err(RuntimeError::Type(format!("cannot negate {other}")))
            }
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Not, other) => Err(RuntimeError::Type(format!(
                "'!' expects a bool operand, got {other}"
            ))),
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> EvalResult<Value> {
        // Boolean operators short-circuit; everything else is strict.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let lhs = self.expect_bool(left)?;
            return match (op, lhs) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(self.expect_bool(right)?)),
            };
        }

        let lhs = self.eval(left)?;
        let rhs = self.eval(right)?;
        match op {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Remainder => self.eval_arithmetic(op, lhs, rhs),
            BinaryOp::Equals => Ok(Value::Bool(values_equal(&lhs, &rhs)?)),
            BinaryOp::NotEquals => Ok(Value::Bool(!values_equal(&lhs, &rhs)?)),
            BinaryOp::Less | BinaryOp::LessEquals | BinaryOp::Greater | BinaryOp::GreaterEquals => {
                let ordering = numeric_compare(&lhs, &rhs)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Less => ordering.is_lt(),
                    BinaryOp::LessEquals => ordering.is_le(),
                    BinaryOp::Greater => ordering.is_gt(),
                    BinaryOp::GreaterEquals => ordering.is_ge(),
                    _ => unreachable!(),
                }))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn expect_bool(&self, expr: &Expr) -> EvalResult<bool> {
        self.eval(expr)?
            .as_bool()
            .ok_or_else(|| RuntimeError::Type("boolean operator expects bool operands".into()))
    }

    fn eval_arithmetic(&self, op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
        match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => self.int_arithmetic(op, *a, *b),
            (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => {
                Ok(Value::from(format!("{a}{b}")))
            }
            _ => {
                let (a, b) = match (lhs.as_decimal(), rhs.as_decimal()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(RuntimeError::Type(format!(
                            "operator '{}' is not defined for {} and {}",
                            op.symbol(),
                            lhs.data_type(),
                            rhs.data_type()
                        )))
                    }
                };
                decimal_arithmetic(op, a, b)
            }
        }
    }

    fn int_arithmetic(&self, op: BinaryOp, a: i64, b: i64) -> EvalResult<Value> {
        if matches!(op, BinaryOp::Divide | BinaryOp::Remainder) && b == 0 {
            return Err(RuntimeError::DivisionByZero);
        }
        let symbol = op.symbol();
        if self.options.checked_arithmetic {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => a.checked_div(b),
                BinaryOp::Remainder => a.checked_rem(b),
                _ => unreachable!("not an arithmetic operator"),
            };
            result.map(Value::Int).ok_or(RuntimeError::Overflow(symbol))
        } else {
            let result = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Subtract => a.wrapping_sub(b),
                BinaryOp::Multiply => a.wrapping_mul(b),
                BinaryOp::Divide => a.wrapping_div(b),
                BinaryOp::Remainder => a.wrapping_rem(b),
                _ => unreachable!("not an arithmetic operator"),
            };
            Ok(Value::Int(result))
        }
    }
}

fn decimal_arithmetic(op: BinaryOp, a: Decimal, b: Decimal) -> EvalResult<Value> {
    if matches!(op, BinaryOp::Divide | BinaryOp::Remainder) && b.is_zero() {
        return Err(RuntimeError::DivisionByZero);
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Subtract => a.checked_sub(b),
        BinaryOp::Multiply => a.checked_mul(b),
        BinaryOp::Divide => a.checked_div(b),
        BinaryOp::Remainder => a.checked_rem(b),
        _ => unreachable!("not an arithmetic operator"),
    };
    result
        .map(Value::Decimal)
        .ok_or(RuntimeError::Overflow(op.symbol()))
}

fn values_equal(lhs: &Value, rhs: &Value) -> EvalResult<bool> {
    match (lhs, rhs) {
        (Value::Int(_), Value::Decimal(_)) | (Value::Decimal(_), Value::Int(_)) => {
            let (a, b) = (lhs.as_decimal(), rhs.as_decimal());
            Ok(a == b)
        }
        _ if lhs.data_type() == rhs.data_type() => Ok(lhs == rhs),
        _ => Err(RuntimeError::Type(format!(
            "cannot compare {} and {}",
            lhs.data_type(),
            rhs.data_type()
        ))),
    }
}

fn numeric_compare(lhs: &Value, rhs: &Value) -> EvalResult<std::cmp::Ordering> {
    match (lhs.as_decimal(), rhs.as_decimal()) {
        (Some(a), Some(b)) => Ok(a.cmp(&b)),
        _ => Err(RuntimeError::Type(format!(
            "ordering comparison expects numeric operands, got {} and {}",
            lhs.data_type(),
            rhs.data_type()
        ))),
    }
}
