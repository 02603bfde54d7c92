use formula_eval::{
    FactoryOptions, FormulaDefinition, FormulaError, FormulaFactory, Type,
};
use pretty_assertions::assert_eq;

fn denying_factory(denied: &[&str]) -> FormulaFactory<()> {
    FormulaFactory::with_options(FactoryOptions {
        denied_names: denied.iter().map(|s| s.to_string()).collect(),
        ..FactoryOptions::default()
    })
}

fn denied_name(result: Result<i64, FormulaError>) -> String {
    match result {
        Err(FormulaError::NameAccessDenied(name)) => name,
        other => panic!("expected NameAccessDenied, got {other:?}"),
    }
}

#[test]
fn denied_member_paths_are_rejected() {
    let factory = denying_factory(&["System.IO"]);
    let evaluator = factory
        .get_evaluator(&[FormulaDefinition::new(
            "z",
            Type::Int,
            "System.IO.File.ReadAllText(\"x\").Length",
        )])
        .unwrap();

    assert_eq!(denied_name(evaluator.evaluate(&(), "z")), "System.IO");
}

#[test]
fn denial_happens_before_semantic_analysis() {
    // `System.IO` would never type-check against the empty context; the
    // denial must win regardless.
    let factory = denying_factory(&["System.IO"]);
    let evaluator = factory
        .get_evaluator(&[FormulaDefinition::new("z", Type::Int, "System.IO.Tricks")])
        .unwrap();

    assert!(matches!(
        evaluator.run(&(), "z"),
        Err(FormulaError::NameAccessDenied(_))
    ));
}

#[test]
fn matching_is_textual_and_exact() {
    // Denying `System` does not deny the longer spelling `System.Math`.
    let factory = denying_factory(&["System"]);
    let evaluator = factory
        .get_evaluator(&[FormulaDefinition::new("z", Type::Int, "System.Math.Pi")])
        .unwrap();

    // With no denial hit, the unknown name surfaces as a compilation error.
    assert!(matches!(
        evaluator.run(&(), "z"),
        Err(FormulaError::Compilation { .. })
    ));
}

#[test]
fn standalone_identifiers_can_be_denied() {
    let factory = denying_factory(&["secret"]);
    let evaluator = factory
        .get_evaluator(&[
            FormulaDefinition::new("secret", Type::Int, "42"),
            FormulaDefinition::new("leak", Type::Int, "secret + 0"),
        ])
        .unwrap();

    assert_eq!(denied_name(evaluator.evaluate(&(), "leak")), "secret");
}

#[test]
fn denial_applies_to_spellings_in_dependencies() {
    let factory = denying_factory(&["Env.Secret"]);
    let evaluator = factory
        .get_evaluator(&[
            FormulaDefinition::new("inner", Type::Int, "Env.Secret + 1"),
            FormulaDefinition::new("outer", Type::Int, "inner * 2"),
        ])
        .unwrap();

    assert_eq!(denied_name(evaluator.evaluate(&(), "outer")), "Env.Secret");
}

#[test]
fn unrelated_names_pass() {
    let factory = denying_factory(&["System.IO", "secret"]);
    let evaluator = factory
        .get_evaluator(&[FormulaDefinition::new("ok", Type::Int, "1 + 2")])
        .unwrap();

    assert_eq!(evaluator.evaluate::<i64>(&(), "ok").unwrap(), 3);
}

#[test]
fn validation_does_not_enforce_denied_names() {
    let factory = denying_factory(&["System.IO"]);
    let parser = factory.get_parser();

    // Parser-phase validation only: the denied spelling still parses.
    assert_eq!(parser.validate("System.IO.File"), vec![]);
    assert_eq!(parser.validate("1 +").len(), 1);
}
