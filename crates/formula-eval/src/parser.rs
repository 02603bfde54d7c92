use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::diagnostics::FormulaDiagnostic;
use crate::error::{FormulaError, FormulaResult};
use formula_script::{
    check_chain, run_chain, Fragment, FunctionRegistry, Globals, ScriptFunction, ScriptOptions,
    ScriptRun,
};

/// Fixed-policy facade over the script compiler for a context type `C`.
///
/// The policy is not configurable: arithmetic overflow checking is always
/// on, and the function surface is the standard registry plus whatever the
/// host registered at factory construction. Denied names are enforced on
/// composed fragments by exact textual match of name spellings.
#[derive(Debug)]
pub struct FormulaParser<C: Globals> {
    functions: FunctionRegistry,
    denied_names: HashSet<String>,
    options: ScriptOptions,
    _context: PhantomData<fn(&C)>,
}

impl<C: Globals> FormulaParser<C> {
    pub(crate) fn new(
        extra_functions: &[ScriptFunction],
        denied_names: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut functions = FunctionRegistry::standard();
        for function in extra_functions {
            functions.register(function.clone());
        }
        Self {
            functions,
            denied_names: denied_names.into_iter().collect(),
            options: ScriptOptions {
                checked_arithmetic: true,
            },
            _context: PhantomData,
        }
    }

    /// Parse `expression` in isolation and report parser-phase diagnostics.
    ///
    /// No name resolution, no denied-name check, and no execution; the same
    /// input always yields the same diagnostics.
    pub fn validate(&self, expression: &str) -> Vec<FormulaDiagnostic> {
        Fragment::parse(expression)
            .parse_diagnostics()
            .iter()
            .cloned()
            .map(Into::into)
            .collect()
    }

    pub(crate) fn create_fragment(&self, source: &str) -> Arc<Fragment> {
        Fragment::parse(source)
    }

    /// Append `source` to the chain ending at `target`.
    pub(crate) fn chain(&self, target: Option<Arc<Fragment>>, source: &str) -> Arc<Fragment> {
        Fragment::parse_with_previous(target, source)
    }

    pub(crate) fn identifier_references(&self, fragment: &Fragment) -> Vec<String> {
        fragment.identifier_references()
    }

    /// Full semantic analysis of the chain against `C`'s member shape.
    pub(crate) fn compile(&self, fragment: &Fragment) -> Vec<FormulaDiagnostic> {
        check_chain(fragment, C::member_type, &self.functions)
            .into_iter()
            .map(Into::into)
            .collect()
    }

    /// Reject the chain if any name spelling matches a denied entry.
    pub(crate) fn enforce_denied_names(&self, fragment: &Fragment) -> FormulaResult<()> {
        if self.denied_names.is_empty() {
            return Ok(());
        }
        for spelling in fragment.name_spellings() {
            if self.denied_names.contains(&spelling) {
                return Err(FormulaError::NameAccessDenied(spelling));
            }
        }
        Ok(())
    }

    pub(crate) fn run(&self, fragment: &Fragment, context: &C) -> FormulaResult<ScriptRun> {
        run_chain(fragment, context, &self.functions, self.options).map_err(FormulaError::from)
    }
}
