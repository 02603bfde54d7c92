use std::sync::Arc;

use crate::ast::Program;
use crate::diagnostics::Diagnostic;
use crate::parser::parse_program;
use crate::types::Type;
use crate::value::Value;

/// The host object whose members are visible to every fragment as globals.
///
/// The member *shape* is a property of the type (so chains can be checked
/// without an instance); member *values* are read from an instance at run
/// time.
pub trait Globals {
    /// Type of the named context member, if the type exposes one.
    fn member_type(name: &str) -> Option<Type>
    where
        Self: Sized;

    /// Value of the named context member on this instance.
    fn member(&self, name: &str) -> Option<Value>;
}

/// The empty context.
impl Globals for () {
    fn member_type(_name: &str) -> Option<Type> {
        None
    }

    fn member(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Execution knobs fixed by the embedding layer.
#[derive(Clone, Copy, Debug)]
pub struct ScriptOptions {
    /// Fail on `i64` overflow instead of wrapping. Decimal arithmetic is
    /// always checked (there is no wrapping representation to fall back to).
    pub checked_arithmetic: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            checked_arithmetic: true,
        }
    }
}

/// A parsed program linked to the fragments that precede it.
///
/// Fragments form a singly linked chain through [`Fragment::previous`]; the
/// chain is compiled and executed oldest-first, and declarations made by
/// earlier links are in scope for later ones.
#[derive(Debug)]
pub struct Fragment {
    source: String,
    previous: Option<Arc<Fragment>>,
    program: Option<Program>,
    diagnostics: Vec<Diagnostic>,
}

impl Fragment {
    /// Parse `source` as a standalone fragment. Parse failures are recorded
    /// as diagnostics on the fragment rather than returned as errors.
    pub fn parse(source: impl Into<String>) -> Arc<Self> {
        Self::parse_with_previous(None, source)
    }

    /// Parse `source` as the continuation of `previous`.
    pub fn parse_with_previous(
        previous: Option<Arc<Fragment>>,
        source: impl Into<String>,
    ) -> Arc<Self> {
        let source = source.into();
        let (program, diagnostics) = match parse_program(&source) {
            Ok(program) => (Some(program), Vec::new()),
            Err(diagnostic) => (None, vec![diagnostic]),
        };
        Arc::new(Self {
            source,
            previous,
            program,
            diagnostics,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn previous(&self) -> Option<&Arc<Fragment>> {
        self.previous.as_ref()
    }

    pub(crate) fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Diagnostics produced while parsing this fragment (not its chain).
    pub fn parse_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Every fragment of the chain, oldest first.
    pub fn links(&self) -> Vec<&Fragment> {
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(fragment) = current {
            out.push(fragment);
            current = fragment.previous.as_deref();
        }
        out.reverse();
        out
    }

    /// Full source of the chain, oldest first, one fragment per line.
    pub fn code(&self) -> String {
        let links = self.links();
        let mut out = String::new();
        for (idx, link) in links.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            out.push_str(link.source());
        }
        out
    }

    /// Name declared by this fragment's first declaration, if any.
    pub fn declared_name(&self) -> Option<&str> {
        self.program.as_ref()?.declared_name()
    }

    /// Identifiers referenced anywhere in the chain, deduplicated in
    /// first-occurrence order (chain order, then pre-order within each
    /// fragment). Member names and declaration targets are not references.
    pub fn identifier_references(&self) -> Vec<String> {
        let mut out = Vec::new();
        for link in self.links() {
            if let Some(program) = link.program() {
                program.collect_identifier_references(&mut out);
            }
        }
        out
    }

    /// Access-control spellings for the chain: standalone identifiers and
    /// every pure member-path node (`a.b.c` contributes `a.b.c` and `a.b`).
    pub fn name_spellings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for link in self.links() {
            if let Some(program) = link.program() {
                program.collect_name_spellings(&mut out);
            }
        }
        out
    }
}

/// A declared script variable after execution.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptVariable {
    pub name: String,
    pub data_type: Type,
    pub is_read_only: bool,
    pub value: Value,
}

/// Outcome of executing a fragment chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptRun {
    /// Declared variables in declaration order.
    pub variables: Vec<ScriptVariable>,
    /// Value of the chain's trailing expression statement, if the last
    /// statement was an expression rather than a declaration.
    pub return_value: Option<Value>,
}
