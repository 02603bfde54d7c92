use formula_script::{
    run_chain, Fragment, FunctionRegistry, Globals, RuntimeError, ScriptOptions, ScriptRun, Type,
    Value,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

struct Order {
    quantity: i64,
    price: Decimal,
    label: String,
}

impl Globals for Order {
    fn member_type(name: &str) -> Option<Type> {
        match name {
            "Quantity" => Some(Type::Int),
            "Price" => Some(Type::Decimal),
            "Label" => Some(Type::Text),
            "Customer" => Some(Type::Record(Default::default())),
            _ => None,
        }
    }

    fn member(&self, name: &str) -> Option<Value> {
        match name {
            "Quantity" => Some(Value::Int(self.quantity)),
            "Price" => Some(Value::Decimal(self.price)),
            "Label" => Some(Value::from(self.label.as_str())),
            "Customer" => {
                let mut fields = BTreeMap::new();
                fields.insert("name".to_string(), Value::from("Alice"));
                fields.insert("age".to_string(), Value::Int(41));
                Some(Value::from(fields))
            }
            _ => None,
        }
    }
}

fn order() -> Order {
    Order {
        quantity: 3,
        price: Decimal::from_str("19.90").unwrap(),
        label: "widget".to_string(),
    }
}

fn dec(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap()
}

fn run(source: &str) -> Result<ScriptRun, RuntimeError> {
    let fragment = Fragment::parse(source);
    run_chain(
        &fragment,
        &order(),
        &FunctionRegistry::standard(),
        ScriptOptions::default(),
    )
}

fn eval(source: &str) -> Value {
    run(source)
        .unwrap_or_else(|e| panic!("{source:?} failed: {e}"))
        .return_value
        .unwrap_or_else(|| panic!("{source:?} produced no value"))
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
    assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
    assert_eq!(eval("10 - 4 - 3"), Value::Int(3));
    assert_eq!(eval("7 / 2"), Value::Int(3));
    assert_eq!(eval("7 % 2"), Value::Int(1));
    assert_eq!(eval("-3 + 5"), Value::Int(2));
}

#[test]
fn mixed_numeric_operations_widen_to_decimal() {
    assert_eq!(eval("2 * 1.5"), Value::Decimal(dec("3.0")));
    assert_eq!(eval("1.0 / 4"), Value::Decimal(dec("0.25")));
    assert_eq!(eval("Quantity * Price"), Value::Decimal(dec("59.70")));
}

#[test]
fn text_concatenation_and_comparison() {
    assert_eq!(eval("\"foo\" + \"bar\""), Value::from("foobar"));
    assert_eq!(eval("Label == \"widget\""), Value::Bool(true));
    assert_eq!(eval("Label != \"gadget\""), Value::Bool(true));
}

#[test]
fn comparisons_mix_int_and_decimal() {
    assert_eq!(eval("1 < 1.5"), Value::Bool(true));
    assert_eq!(eval("2 == 2.0"), Value::Bool(true));
    assert_eq!(eval("3 >= 3"), Value::Bool(true));
}

#[test]
fn boolean_operators_short_circuit() {
    assert_eq!(eval("false && 1 / 0 == 0"), Value::Bool(false));
    assert_eq!(eval("true || 1 / 0 == 0"), Value::Bool(true));
    assert_eq!(eval("!false"), Value::Bool(true));
}

#[test]
fn if_evaluates_only_the_taken_branch() {
    assert_eq!(eval("if(true, 1, 1 / 0)"), Value::Int(1));
    assert_eq!(eval("if(Quantity == 0, 1 / 0, 42)"), Value::Int(42));
}

#[test]
fn division_by_zero_fails() {
    assert!(matches!(run("1 / 0"), Err(RuntimeError::DivisionByZero)));
    assert!(matches!(run("1.0 / 0.0"), Err(RuntimeError::DivisionByZero)));
    assert!(matches!(run("5 % 0"), Err(RuntimeError::DivisionByZero)));
}

#[test]
fn checked_arithmetic_reports_overflow() {
    assert!(matches!(
        run("9223372036854775807 + 1"),
        Err(RuntimeError::Overflow("+"))
    ));
    assert!(matches!(
        run("9223372036854775807 * 2"),
        Err(RuntimeError::Overflow("*"))
    ));
}

#[test]
fn unchecked_arithmetic_wraps() {
    let fragment = Fragment::parse("9223372036854775807 + 1");
    let outcome = run_chain(
        &fragment,
        &order(),
        &FunctionRegistry::standard(),
        ScriptOptions {
            checked_arithmetic: false,
        },
    )
    .unwrap();
    assert_eq!(outcome.return_value, Some(Value::Int(i64::MIN)));
}

#[test]
fn builtin_functions() {
    assert_eq!(eval("round(1.005, 2)"), Value::Decimal(dec("1.00")));
    assert_eq!(
        eval("round(1.005, 2, \"away_from_zero\")"),
        Value::Decimal(dec("1.01"))
    );
    assert_eq!(eval("abs(-4)"), Value::Int(4));
    assert_eq!(eval("abs(-4.5)"), Value::Decimal(dec("4.5")));
    assert_eq!(eval("min(3, 5)"), Value::Int(3));
    assert_eq!(eval("max(3, 5.5)"), Value::Decimal(dec("5.5")));
    assert_eq!(eval("len(\"hello\")"), Value::Int(5));
    assert_eq!(eval("int(7.9)"), Value::Int(7));
    assert_eq!(eval("int(\"42\")"), Value::Int(42));
    assert_eq!(eval("decimal(7)"), Value::Decimal(dec("7")));
    assert_eq!(eval("decimal(\"1.25\")"), Value::Decimal(dec("1.25")));
}

#[test]
fn unknown_midpoint_mode_is_an_argument_error() {
    assert!(matches!(
        run("round(1.0, 2, \"bankers\")"),
        Err(RuntimeError::Argument(_))
    ));
}

#[test]
fn record_member_access() {
    assert_eq!(eval("Customer.age + 1"), Value::Int(42));
    assert_eq!(eval("Customer.name"), Value::from("Alice"));
    assert!(matches!(
        run("Customer.height"),
        Err(RuntimeError::UnknownMember { .. })
    ));
}

#[test]
fn unknown_names_fail_at_runtime() {
    assert!(matches!(
        run("nonsense + 1"),
        Err(RuntimeError::UnknownIdentifier(_))
    ));
    assert!(matches!(
        run("nonsense(1)"),
        Err(RuntimeError::UnknownFunction(_))
    ));
}

#[test]
fn declarations_produce_ordered_read_only_variables() {
    let outcome = run("int base = Quantity * 2; decimal gross = base * Price;").unwrap();
    assert_eq!(outcome.return_value, None);
    assert_eq!(outcome.variables.len(), 2);

    assert_eq!(outcome.variables[0].name, "base");
    assert_eq!(outcome.variables[0].data_type, Type::Int);
    assert!(outcome.variables[0].is_read_only);
    assert_eq!(outcome.variables[0].value, Value::Int(6));

    assert_eq!(outcome.variables[1].name, "gross");
    assert_eq!(outcome.variables[1].data_type, Type::Decimal);
    assert_eq!(outcome.variables[1].value, Value::Decimal(dec("119.40")));
}

#[test]
fn declaration_materializes_widening() {
    let outcome = run("decimal d = 3;").unwrap();
    assert_eq!(outcome.variables[0].value, Value::Decimal(dec("3")));
    assert_eq!(outcome.variables[0].data_type, Type::Decimal);
}

#[test]
fn declared_variables_shadow_context_members() {
    let outcome = run("int Quantity = 100; int doubled = Quantity * 2;").unwrap();
    assert_eq!(outcome.variables[1].value, Value::Int(200));
}

#[test]
fn trailing_expression_is_the_return_value() {
    let outcome = run("int base = 2; base * 21").unwrap();
    assert_eq!(outcome.return_value, Some(Value::Int(42)));
    assert_eq!(outcome.variables.len(), 1);
}

#[test]
fn chained_fragments_share_scope() {
    let first = Fragment::parse("int a = 2;");
    let second = Fragment::parse_with_previous(Some(first), "int b = a * 10;");
    let third = Fragment::parse_with_previous(Some(second), "int c = a + b;");
    let outcome = run_chain(
        &third,
        &(),
        &FunctionRegistry::standard(),
        ScriptOptions::default(),
    )
    .unwrap();

    let values: Vec<(String, Value)> = outcome
        .variables
        .into_iter()
        .map(|v| (v.name, v.value))
        .collect();
    assert_eq!(
        values,
        vec![
            ("a".to_string(), Value::Int(2)),
            ("b".to_string(), Value::Int(20)),
            ("c".to_string(), Value::Int(22)),
        ]
    );
}
