use formula_eval::{
    DefinitionsKey, FactoryOptions, FormulaDefinition, FormulaFactory, Fragment, ScriptFunction,
    Type, Value,
};
use pretty_assertions::assert_eq;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn def(identifier: &str, expression: &str) -> FormulaDefinition {
    FormulaDefinition::new(identifier, Type::Int, expression)
}

#[test]
fn equal_definition_sets_share_one_evaluator() {
    let factory = FormulaFactory::<()>::new();
    let first = factory.get_evaluator(&[def("a", "1"), def("b", "2")]).unwrap();
    // Same composite key, different slice order.
    let second = factory.get_evaluator(&[def("b", "2"), def("a", "1")]).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn different_definition_sets_get_distinct_evaluators() {
    let factory = FormulaFactory::<()>::new();
    let first = factory.get_evaluator(&[def("a", "1")]).unwrap();
    let second = factory.get_evaluator(&[def("a", "2")]).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn flush_discards_cached_evaluators() {
    let factory = FormulaFactory::<()>::new();
    let definitions = [def("a", "1")];
    let first = factory.get_evaluator(&definitions).unwrap();
    factory.flush_evaluators_cache();
    let second = factory.get_evaluator(&definitions).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn custom_formula_ids_drive_the_cache_key() {
    let factory = FormulaFactory::<()>::new();

    // Same ids, different expressions: the sets collide by design, and the
    // first evaluator wins until the host flushes.
    let first = factory
        .get_evaluator(&[def("a", "1").with_formula_id("stable-a")])
        .unwrap();
    let second = factory
        .get_evaluator(&[def("a", "2").with_formula_id("stable-a")])
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.evaluate::<i64>(&(), "a").unwrap(), 1);

    factory.flush_evaluators_cache();
    let third = factory
        .get_evaluator(&[def("a", "2").with_formula_id("stable-a")])
        .unwrap();
    assert_eq!(third.evaluate::<i64>(&(), "a").unwrap(), 2);
}

#[test]
fn default_fingerprints_reflect_content() {
    let key_a = DefinitionsKey::for_definitions(&[def("a", "1")]);
    let key_b = DefinitionsKey::for_definitions(&[def("a", "2")]);
    let key_c = DefinitionsKey::for_definitions(&[def("a", "1")]);
    assert_ne!(key_a, key_b);
    assert_eq!(key_a, key_c);

    // Order-insensitive.
    let forward = DefinitionsKey::for_definitions(&[def("a", "1"), def("b", "2")]);
    let backward = DefinitionsKey::for_definitions(&[def("b", "2"), def("a", "1")]);
    assert_eq!(forward, backward);
}

#[test]
fn cache_capacity_evicts_least_recently_used_sets() {
    let factory = FormulaFactory::<()>::with_options(FactoryOptions {
        evaluator_cache_size: NonZeroUsize::new(1).unwrap(),
        ..FactoryOptions::default()
    });

    let first = factory.get_evaluator(&[def("a", "1")]).unwrap();
    let _other = factory.get_evaluator(&[def("b", "2")]).unwrap();
    let again = factory.get_evaluator(&[def("a", "1")]).unwrap();
    assert!(!Arc::ptr_eq(&first, &again));
}

#[test]
fn shared_parser_validates_without_executing() {
    let factory = FormulaFactory::<()>::new();
    let parser = factory.get_parser();

    assert_eq!(parser.validate("1 + 2 * 3"), vec![]);
    // Validation is parser-phase only: unknown names are not resolved.
    assert_eq!(parser.validate("unknown_name * 2"), vec![]);
    assert_eq!(parser.validate("1 +").len(), 1);

    // The parser instance is lazily created and shared.
    assert!(Arc::ptr_eq(&parser, &factory.get_parser()));
}

#[test]
fn validation_is_pure() {
    let factory = FormulaFactory::<()>::new();
    let parser = factory.get_parser();
    let first = parser.validate("1 / len(");
    let second = parser.validate("1 / len(");
    assert_eq!(first, second);
}

#[test]
fn host_functions_are_available_to_formulas() {
    let factory = FormulaFactory::<()>::with_options(FactoryOptions {
        functions: vec![ScriptFunction::new(
            "double",
            "double(value: int) -> int",
            |args| {
                if args.len() != 1 || args[0] != Type::Int {
                    return Err("double expects one int argument".to_string());
                }
                Ok(Type::Int)
            },
            |args| {
                let n = args[0].as_int().expect("checked by signature");
                Ok(Value::Int(n * 2))
            },
        )],
        ..FactoryOptions::default()
    });

    let evaluator = factory
        .get_evaluator(&[def("a", "double(21)")])
        .unwrap();
    assert_eq!(evaluator.evaluate::<i64>(&(), "a").unwrap(), 42);
}

#[test]
fn fragment_hook_sees_every_composite() {
    let seen = Arc::new(AtomicUsize::new(0));
    let mut factory = FormulaFactory::<()>::new();
    let counter = Arc::clone(&seen);
    factory.set_fragment_created_hook(move |fragment: Arc<Fragment>| {
        counter.fetch_add(1, Ordering::SeqCst);
        fragment
    });

    let evaluator = factory
        .get_evaluator(&[def("a", "1"), def("b", "a + 1")])
        .unwrap();
    assert_eq!(evaluator.evaluate::<i64>(&(), "b").unwrap(), 2);
    // One composite per identifier: `a` (as a dependency) and `b`.
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}
