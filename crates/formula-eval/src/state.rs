use std::collections::HashMap;

use crate::definition::FormulaDefinition;
use crate::diagnostics::FormulaDiagnostic;
use crate::error::{FormulaError, FormulaResult};
use formula_script::{Type, Value};

/// One computed variable of an evaluation, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationVariable {
    pub name: String,
    pub data_type: Type,
    pub is_read_only: bool,
    pub value: Value,
    /// Source expression when the variable is a defined formula.
    pub formula_expression: Option<String>,
    /// Whether the central rounding rewrite was applied to this variable.
    pub is_rounded: bool,
}

/// Immutable record of one evaluation run.
#[derive(Clone, Debug)]
pub struct EvaluationState {
    identifier: String,
    variables: Vec<EvaluationVariable>,
    index: HashMap<String, usize>,
    diagnostics: Vec<FormulaDiagnostic>,
}

impl EvaluationState {
    pub(crate) fn new(
        identifier: String,
        variables: Vec<EvaluationVariable>,
        diagnostics: Vec<FormulaDiagnostic>,
    ) -> FormulaResult<Self> {
        let mut index = HashMap::with_capacity(variables.len());
        for (idx, variable) in variables.iter().enumerate() {
            if index.insert(variable.name.clone(), idx).is_some() {
                return Err(FormulaError::Evaluation(format!(
                    "evaluation produced duplicate variable {:?}",
                    variable.name
                )));
            }
        }
        if !index.contains_key(&identifier) {
            return Err(FormulaError::Evaluation(format!(
                "evaluation produced no variable for target {identifier:?}"
            )));
        }
        Ok(Self {
            identifier,
            variables,
            index,
            diagnostics,
        })
    }

    /// The target identifier this run evaluated.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// All computed variables, in dependency (declaration) order.
    pub fn variables(&self) -> &[EvaluationVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&EvaluationVariable> {
        self.index.get(name).map(|idx| &self.variables[*idx])
    }

    /// Value of the target variable.
    pub fn return_value(&self) -> &Value {
        &self.variables[self.index[&self.identifier]].value
    }

    /// Non-fatal diagnostics retained from compilation.
    pub fn diagnostics(&self) -> &[FormulaDiagnostic] {
        &self.diagnostics
    }
}

/// A name referenced somewhere in a target's composed script, with its
/// backing definition when the name is a formula of the evaluator's set.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainedIdentifier {
    pub name: String,
    pub definition: Option<FormulaDefinition>,
}
