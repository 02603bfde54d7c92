use crate::diagnostics::FormulaDiagnostic;
use formula_script::RuntimeError;

pub type FormulaResult<T> = Result<T, FormulaError>;

/// Failure surfaced by evaluators, parsers, and the factory.
#[derive(Debug, thiserror::Error)]
pub enum FormulaError {
    #[error("required argument {0:?} is missing or empty")]
    ArgumentMissing(&'static str),

    #[error("no formula is defined for identifier {0:?}")]
    NoFormulaForIdentifier(String),

    #[error("duplicate formula identifier {0:?}")]
    DuplicateIdentifier(String),

    /// The composed script produced at least one error-severity diagnostic.
    /// Lower-severity diagnostics of the same compilation are retained.
    #[error("formula compilation failed: {}", summarize(.diagnostics))]
    Compilation {
        diagnostics: Vec<FormulaDiagnostic>,
        /// Source of the composed script, when composition got that far.
        code: Option<String>,
    },

    #[error("access to name {0:?} is denied")]
    NameAccessDenied(String),

    #[error("formula evaluation failed: {0}")]
    Evaluation(String),
}

impl From<RuntimeError> for FormulaError {
    fn from(error: RuntimeError) -> Self {
        FormulaError::Evaluation(error.to_string())
    }
}

fn summarize(diagnostics: &[FormulaDiagnostic]) -> String {
    let errors: Vec<&str> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.message.as_str())
        .collect();
    if errors.is_empty() {
        "no error diagnostics".to_string()
    } else {
        errors.join("; ")
    }
}
