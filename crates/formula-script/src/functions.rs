use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::eval::RuntimeError;
use crate::types::Type;
use crate::value::Value;

/// Midpoint-mode token accepted by the `round` builtin.
pub const MIDPOINT_TO_EVEN: &str = "to_even";
/// Midpoint-mode token accepted by the `round` builtin.
pub const MIDPOINT_AWAY_FROM_ZERO: &str = "away_from_zero";

type CheckFn = dyn Fn(&[Type]) -> Result<Type, String> + Send + Sync;
type InvokeFn = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// A function callable from script expressions.
///
/// `check` validates argument types and yields the return type during
/// compilation; `invoke` receives the evaluated arguments at run time.
#[derive(Clone)]
pub struct ScriptFunction {
    name: String,
    signature: String,
    check: Arc<CheckFn>,
    invoke: Arc<InvokeFn>,
}

impl ScriptFunction {
    pub fn new<C, I>(
        name: impl Into<String>,
        signature: impl Into<String>,
        check: C,
        invoke: I,
    ) -> Self
    where
        C: Fn(&[Type]) -> Result<Type, String> + Send + Sync + 'static,
        I: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: signature.into(),
            check: Arc::new(check),
            invoke: Arc::new(invoke),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable signature, used in diagnostics.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn check_call(&self, args: &[Type]) -> Result<Type, String> {
        (self.check)(args)
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.invoke)(args)
    }
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Named functions visible to the checker and the interpreter.
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    functions: HashMap<String, ScriptFunction>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// The standard builtins: `round`, `abs`, `min`, `max`, `len`, `if`,
    /// `int`, `decimal`.
    ///
    /// `if` is type-checked through the registry like any other function but
    /// evaluated lazily by the interpreter: only the selected branch runs.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(round_function());
        registry.register(abs_function());
        registry.register(minmax_function("min"));
        registry.register(minmax_function("max"));
        registry.register(len_function());
        registry.register(if_function());
        registry.register(int_function());
        registry.register(decimal_function());
        registry
    }

    /// Add a function, replacing any existing one with the same name.
    pub fn register(&mut self, function: ScriptFunction) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<&ScriptFunction> {
        self.functions.get(name)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn arity_error(name: &str, expected: &str, got: usize) -> String {
    format!("{name} expects {expected} argument(s), got {got}")
}

fn numeric_arg(name: &str, position: usize, ty: &Type) -> Result<(), String> {
    if ty.is_numeric() {
        Ok(())
    } else {
        Err(format!(
            "{name} expects a numeric argument at position {position}, got {ty}"
        ))
    }
}

fn decimal_value(value: &Value) -> Result<Decimal, RuntimeError> {
    value
        .as_decimal()
        .ok_or_else(|| RuntimeError::Type(format!("expected a numeric value, got {value}")))
}

fn round_function() -> ScriptFunction {
    ScriptFunction::new(
        "round",
        "round(value: decimal, digits: int [, mode: text]) -> decimal",
        |args| {
            if !(2..=3).contains(&args.len()) {
                return Err(arity_error("round", "2 or 3", args.len()));
            }
            numeric_arg("round", 1, &args[0])?;
            if args[1] != Type::Int {
                return Err(format!("round expects an int digit count, got {}", args[1]));
            }
            if let Some(mode) = args.get(2) {
                if *mode != Type::Text {
                    return Err(format!("round expects a text midpoint mode, got {mode}"));
                }
            }
            Ok(Type::Decimal)
        },
        |args| {
            let (value, digits) = match args {
                [value, digits] | [value, digits, _] => (value, digits),
                _ => {
                    return Err(RuntimeError::Argument(
                        "round expects 2 or 3 arguments".into(),
                    ))
                }
            };
            let value = decimal_value(value)?;
            let digits = digits
                .as_int()
                .ok_or_else(|| RuntimeError::Type("round expects an int digit count".into()))?;
            if !(0..=28).contains(&digits) {
                return Err(RuntimeError::Argument(format!(
                    "round digit count must be between 0 and 28, got {digits}"
                )));
            }
            let strategy = match args.get(2) {
                None => RoundingStrategy::MidpointNearestEven,
                Some(Value::Text(mode)) => match &**mode {
                    MIDPOINT_TO_EVEN => RoundingStrategy::MidpointNearestEven,
                    MIDPOINT_AWAY_FROM_ZERO => RoundingStrategy::MidpointAwayFromZero,
                    other => {
                        return Err(RuntimeError::Argument(format!(
                            "unknown midpoint mode {other:?}"
                        )))
                    }
                },
                Some(other) => {
                    return Err(RuntimeError::Type(format!(
                        "round expects a text midpoint mode, got {other}"
                    )))
                }
            };
            Ok(Value::Decimal(
                value.round_dp_with_strategy(digits as u32, strategy),
            ))
        },
    )
}

fn abs_function() -> ScriptFunction {
    ScriptFunction::new(
        "abs",
        "abs(value: int | decimal) -> int | decimal",
        |args| {
            if args.len() != 1 {
                return Err(arity_error("abs", "1", args.len()));
            }
            numeric_arg("abs", 1, &args[0])?;
            Ok(args[0].clone())
        },
        |args| match args {
            [Value::Int(n)] => n
                .checked_abs()
                .map(Value::Int)
                .ok_or(RuntimeError::Overflow("abs")),
            [Value::Decimal(d)] => Ok(Value::Decimal(d.abs())),
            _ => Err(RuntimeError::Argument(
                "abs expects one numeric argument".into(),
            )),
        },
    )
}

fn minmax_function(name: &'static str) -> ScriptFunction {
    ScriptFunction::new(
        name,
        format!("{name}(a: int | decimal, b: int | decimal) -> int | decimal"),
        move |args| {
            if args.len() != 2 {
                return Err(arity_error(name, "2", args.len()));
            }
            numeric_arg(name, 1, &args[0])?;
            numeric_arg(name, 2, &args[1])?;
            Type::unify_numeric(&args[0], &args[1])
                .ok_or_else(|| format!("{name} arguments must share a numeric type"))
        },
        move |args| {
            let [left, right] = args else {
                return Err(RuntimeError::Argument(format!(
                    "{name} expects two numeric arguments"
                )));
            };
            let take_left = match (left, right) {
                (Value::Int(a), Value::Int(b)) => (name == "min") == (a <= b),
                (a, b) => {
                    let a = decimal_value(a)?;
                    let b = decimal_value(b)?;
                    (name == "min") == (a <= b)
                }
            };
            let chosen = if take_left { left } else { right };
            // Mixed int/decimal arguments produce a decimal result.
            if left.data_type() == right.data_type() {
                Ok(chosen.clone())
            } else {
                Ok(Value::Decimal(decimal_value(chosen)?))
            }
        },
    )
}

fn len_function() -> ScriptFunction {
    ScriptFunction::new(
        "len",
        "len(value: text) -> int",
        |args| {
            if args.len() != 1 {
                return Err(arity_error("len", "1", args.len()));
            }
            if args[0] != Type::Text {
                return Err(format!("len expects a text argument, got {}", args[0]));
            }
            Ok(Type::Int)
        },
        |args| match args {
            [Value::Text(s)] => Ok(Value::Int(s.chars().count() as i64)),
            _ => Err(RuntimeError::Argument(
                "len expects one text argument".into(),
            )),
        },
    )
}

fn if_function() -> ScriptFunction {
    ScriptFunction::new(
        "if",
        "if(condition: bool, then: T, else: T) -> T",
        |args| {
            if args.len() != 3 {
                return Err(arity_error("if", "3", args.len()));
            }
            if args[0] != Type::Bool {
                return Err(format!("if expects a bool condition, got {}", args[0]));
            }
            if args[1] == args[2] {
                return Ok(args[1].clone());
            }
            Type::unify_numeric(&args[1], &args[2])
                .ok_or_else(|| format!("if branches differ: {} vs {}", args[1], args[2]))
        },
        |args| {
            // Reached only when `if` is invoked through a rebound registry
            // entry; the interpreter normally short-circuits the call.
            let [condition, then_value, else_value] = args else {
                return Err(RuntimeError::Argument("if expects three arguments".into()));
            };
            let condition = condition
                .as_bool()
                .ok_or_else(|| RuntimeError::Type("if expects a bool condition".into()))?;
            Ok(if condition {
                then_value.clone()
            } else {
                else_value.clone()
            })
        },
    )
}

fn int_function() -> ScriptFunction {
    ScriptFunction::new(
        "int",
        "int(value: int | decimal | text) -> int",
        |args| {
            if args.len() != 1 {
                return Err(arity_error("int", "1", args.len()));
            }
            match args[0] {
                Type::Int | Type::Decimal | Type::Text => Ok(Type::Int),
                ref other => Err(format!("int cannot convert from {other}")),
            }
        },
        |args| match args {
            [Value::Int(n)] => Ok(Value::Int(*n)),
            [Value::Decimal(d)] => {
                use rust_decimal::prelude::ToPrimitive;
                d.trunc().to_i64().map(Value::Int).ok_or_else(|| {
                    RuntimeError::Argument(format!("{d} is out of range for int"))
                })
            }
            [Value::Text(s)] => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| RuntimeError::Argument(format!("cannot parse {s:?} as int"))),
            _ => Err(RuntimeError::Argument(
                "int expects one convertible argument".into(),
            )),
        },
    )
}

fn decimal_function() -> ScriptFunction {
    ScriptFunction::new(
        "decimal",
        "decimal(value: int | decimal | text) -> decimal",
        |args| {
            if args.len() != 1 {
                return Err(arity_error("decimal", "1", args.len()));
            }
            match args[0] {
                Type::Int | Type::Decimal | Type::Text => Ok(Type::Decimal),
                ref other => Err(format!("decimal cannot convert from {other}")),
            }
        },
        |args| match args {
            [Value::Int(n)] => Ok(Value::Decimal(Decimal::from(*n))),
            [Value::Decimal(d)] => Ok(Value::Decimal(*d)),
            [Value::Text(s)] => s
                .trim()
                .parse::<Decimal>()
                .map(Value::Decimal)
                .map_err(|_| RuntimeError::Argument(format!("cannot parse {s:?} as decimal"))),
            _ => Err(RuntimeError::Argument(
                "decimal expects one convertible argument".into(),
            )),
        },
    )
}
