use formula_eval::{
    DiagnosticSeverity, FormulaDefinition, FormulaError, FormulaFactory, Globals, Type, Value,
};
use pretty_assertions::assert_eq;

struct Metrics {
    x: i64,
}

impl Globals for Metrics {
    fn member_type(name: &str) -> Option<Type> {
        match name {
            "X" => Some(Type::Int),
            _ => None,
        }
    }

    fn member(&self, name: &str) -> Option<Value> {
        match name {
            "X" => Some(Value::Int(self.x)),
            _ => None,
        }
    }
}

fn def(identifier: &str, data_type: Type, expression: &str) -> FormulaDefinition {
    FormulaDefinition::new(identifier, data_type, expression)
}

#[test]
fn single_literal_formula_evaluates() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "2 + 3")])
        .unwrap();

    let state = evaluator.run(&(), "a").unwrap();
    assert_eq!(state.identifier(), "a");
    assert_eq!(state.return_value(), &Value::Int(5));
    assert_eq!(state.variables().len(), 1);
    assert_eq!(state.variables()[0].name, "a");
    assert_eq!(state.variables()[0].data_type, Type::Int);
    assert_eq!(state.variables()[0].value, Value::Int(5));
    assert!(state.diagnostics().iter().all(|d| !d.is_error()));
}

#[test]
fn return_value_matches_the_target_variable() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[
            def("a", Type::Int, "2"),
            def("b", Type::Int, "a * 10"),
        ])
        .unwrap();

    for target in ["a", "b"] {
        let state = evaluator.run(&(), target).unwrap();
        assert_eq!(
            state.return_value(),
            &state.variable(target).unwrap().value,
            "invariant broken for {target}"
        );
    }
}

#[test]
fn context_members_are_visible_to_formulas() {
    let factory = FormulaFactory::<Metrics>::new();
    let evaluator = factory
        .get_evaluator(&[def("y", Type::Int, "X * 2")])
        .unwrap();

    assert_eq!(
        evaluator.evaluate::<i64>(&Metrics { x: 7 }, "y").unwrap(),
        14
    );
    assert_eq!(
        evaluator.evaluate::<i64>(&Metrics { x: -3 }, "y").unwrap(),
        -6
    );
}

#[test]
fn unknown_target_is_reported() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "1")])
        .unwrap();

    match evaluator.run(&(), "missing") {
        Err(FormulaError::NoFormulaForIdentifier(name)) => assert_eq!(name, "missing"),
        other => panic!("expected NoFormulaForIdentifier, got {other:?}"),
    }
}

#[test]
fn empty_target_is_a_missing_argument() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "1")])
        .unwrap();

    assert!(matches!(
        evaluator.run(&(), ""),
        Err(FormulaError::ArgumentMissing("target"))
    ));
}

#[test]
fn unknown_reference_fails_compilation_with_error_diagnostics() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "no_such_name + 1")])
        .unwrap();

    match evaluator.run(&(), "a") {
        Err(FormulaError::Compilation { diagnostics, code }) => {
            assert!(diagnostics
                .iter()
                .any(|d| d.severity == DiagnosticSeverity::Error));
            assert!(code.unwrap().contains("no_such_name"));
        }
        other => panic!("expected Compilation, got {other:?}"),
    }
}

#[test]
fn failed_compilation_is_retried_from_scratch() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "no_such_name")])
        .unwrap();

    // The failed composite must not be cached as a success.
    for _ in 0..2 {
        assert!(matches!(
            evaluator.run(&(), "a"),
            Err(FormulaError::Compilation { .. })
        ));
    }
}

#[test]
fn duplicate_identifiers_are_rejected_at_construction() {
    let factory = FormulaFactory::<()>::new();
    let result = factory.get_evaluator(&[
        def("a", Type::Int, "1"),
        def("a", Type::Int, "2"),
    ]);
    match result {
        Err(FormulaError::DuplicateIdentifier(name)) => assert_eq!(name, "a"),
        other => panic!("expected DuplicateIdentifier, got {other:?}"),
    }
}

#[test]
fn empty_identifier_is_a_missing_argument() {
    let factory = FormulaFactory::<()>::new();
    assert!(matches!(
        factory.get_evaluator(&[def("", Type::Int, "1")]),
        Err(FormulaError::ArgumentMissing("identifier"))
    ));
}

#[test]
fn evaluate_rejects_mismatched_result_types() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "1")])
        .unwrap();

    assert_eq!(evaluator.evaluate::<i64>(&(), "a").unwrap(), 1);
    assert!(matches!(
        evaluator.evaluate::<bool>(&(), "a"),
        Err(FormulaError::Evaluation(_))
    ));
}

#[test]
fn runtime_failures_surface_as_evaluation_errors() {
    let factory = FormulaFactory::<Metrics>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "1 / X")])
        .unwrap();

    assert_eq!(evaluator.evaluate::<i64>(&Metrics { x: 1 }, "a").unwrap(), 1);
    match evaluator.run(&Metrics { x: 0 }, "a") {
        Err(FormulaError::Evaluation(message)) => {
            assert!(message.contains("division by zero"), "got {message:?}");
        }
        other => panic!("expected Evaluation, got {other:?}"),
    }
}

#[test]
fn warnings_are_retained_without_failing_the_run() {
    let factory = FormulaFactory::<()>::new();
    let evaluator = factory
        .get_evaluator(&[def("a", Type::Int, "if(1 == 1, 4, 4 / 0)")])
        .unwrap();

    let state = evaluator.run(&(), "a").unwrap();
    assert_eq!(state.return_value(), &Value::Int(4));
    assert!(state
        .diagnostics()
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Warning));
}

#[test]
fn variables_carry_the_originating_expression() {
    let factory = FormulaFactory::<Metrics>::new();
    let evaluator = factory
        .get_evaluator(&[
            def("base", Type::Int, "X * 2"),
            def("total", Type::Int, "base + 1"),
        ])
        .unwrap();

    let state = evaluator.run(&Metrics { x: 5 }, "total").unwrap();
    let base = state.variable("base").unwrap();
    assert_eq!(base.formula_expression.as_deref(), Some("X * 2"));
    assert!(base.is_read_only);
    assert!(!base.is_rounded);
    assert_eq!(
        state.variable("total").unwrap().formula_expression.as_deref(),
        Some("base + 1")
    );
}
