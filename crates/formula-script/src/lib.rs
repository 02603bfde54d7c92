#![forbid(unsafe_code)]

//! A small, typed expression language with chainable script fragments.
//!
//! Programs are sequences of single-assignment declarations
//! (`decimal price = base * 1.2;`) optionally followed by a bare expression.
//! A [`Fragment`] is a parsed program linked to the fragments that precede it,
//! so a larger script can be assembled piecewise and the chain compiled and
//! executed as one unit: declarations made by earlier fragments are in scope
//! for later ones.
//!
//! The language is deliberately narrow: literals, arithmetic with overflow
//! checking, comparisons, short-circuit boolean operators, member access on
//! record values, and calls into a [`FunctionRegistry`]. Values visible to
//! every fragment come from a host-supplied [`Globals`] implementation.

mod ast;
mod checker;
mod diagnostics;
mod eval;
mod functions;
mod parser;
mod script;
mod types;
mod value;

pub use crate::checker::check_chain;
pub use crate::diagnostics::{Diagnostic, Severity};
pub use crate::eval::{run_chain, RuntimeError};
pub use crate::functions::{
    FunctionRegistry, ScriptFunction, MIDPOINT_AWAY_FROM_ZERO, MIDPOINT_TO_EVEN,
};
pub use crate::script::{Fragment, Globals, ScriptOptions, ScriptRun, ScriptVariable};
pub use crate::types::{RecordType, Type};
pub use crate::value::{CastError, Value};
