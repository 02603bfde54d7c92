use serde::{Deserialize, Serialize};
use std::fmt;

use formula_script::{Diagnostic, Severity};

/// Severity of a formula diagnostic, ordered from least to most severe.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Hidden,
    Info,
    Warning,
    Error,
}

/// A message produced while validating, compiling, or running a formula.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
}

impl FormulaDiagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for FormulaDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            DiagnosticSeverity::Hidden => "hidden",
            DiagnosticSeverity::Info => "info",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Error => "error",
        };
        write!(f, "{tag}: {}", self.message)
    }
}

impl From<Severity> for DiagnosticSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Hidden => DiagnosticSeverity::Hidden,
            Severity::Info => DiagnosticSeverity::Info,
            Severity::Warning => DiagnosticSeverity::Warning,
            Severity::Error => DiagnosticSeverity::Error,
        }
    }
}

impl From<Diagnostic> for FormulaDiagnostic {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            severity: diagnostic.severity.into(),
            message: diagnostic.message,
        }
    }
}
