#![forbid(unsafe_code)]

//! Evaluation of formula networks against a host context.
//!
//! A *formula* is a named, typed expression that may reference context
//! members and other formulas by name. Given a target identifier, the
//! evaluator discovers the formula's transitive dependencies by static name
//! analysis, linearises them into a single chained script whose final
//! declaration yields the target value, compiles the chain once per
//! identifier, and executes it against a caller-supplied context:
//!
//! ```
//! use formula_eval::{FormulaDefinition, FormulaFactory, Type};
//!
//! let definitions = vec![
//!     FormulaDefinition::new("a", Type::Int, "2"),
//!     FormulaDefinition::new("b", Type::Int, "a * 10"),
//!     FormulaDefinition::new("c", Type::Int, "a + b"),
//! ];
//! let factory = FormulaFactory::<()>::new();
//! let evaluator = factory.get_evaluator(&definitions).unwrap();
//! assert_eq!(evaluator.evaluate::<i64>(&(), "c").unwrap(), 22);
//! ```
//!
//! Decimal-typed formulas can be rounded centrally via [`RoundingOptions`],
//! name-level access control is enforced through a denied-name list, and
//! [`FormulaFactory`] caches evaluators keyed by a fingerprint of the
//! definition set.

mod definition;
mod diagnostics;
mod error;
mod evaluator;
mod factory;
mod parser;
mod state;

pub use crate::definition::{FormulaDefinition, MidpointRounding, RoundingOptions};
pub use crate::diagnostics::{DiagnosticSeverity, FormulaDiagnostic};
pub use crate::error::{FormulaError, FormulaResult};
pub use crate::evaluator::FormulaEvaluator;
pub use crate::factory::{DefinitionsKey, FactoryOptions, FormulaFactory};
pub use crate::parser::FormulaParser;
pub use crate::state::{ContainedIdentifier, EvaluationState, EvaluationVariable};

pub use formula_script::{
    CastError, Fragment, FunctionRegistry, Globals, RecordType, ScriptFunction, Type, Value,
};
