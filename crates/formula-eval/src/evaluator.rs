use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::definition::{FormulaDefinition, RoundingOptions};
use crate::diagnostics::FormulaDiagnostic;
use crate::error::{FormulaError, FormulaResult};
use crate::parser::FormulaParser;
use crate::state::{ContainedIdentifier, EvaluationState, EvaluationVariable};
use formula_script::{Fragment, Globals, Value};

pub(crate) type FragmentHook = Arc<dyn Fn(Arc<Fragment>) -> Arc<Fragment> + Send + Sync>;

/// A target's composed script together with the diagnostics its compilation
/// produced (warnings and infos only; error diagnostics abort composition).
struct CompiledComposite {
    fragment: Arc<Fragment>,
    diagnostics: Vec<FormulaDiagnostic>,
}

/// Evaluates formulas of one definition set against a context of type `C`.
///
/// Composition and compilation happen once per target identifier and are
/// cached for the evaluator's lifetime. Instances are obtained from
/// [`FormulaFactory::get_evaluator`](crate::FormulaFactory::get_evaluator)
/// and safe to share across threads; composition is a pure function of the
/// immutable definition set, so racing threads may both compose a target but
/// the retained results are interchangeable.
pub struct FormulaEvaluator<C: Globals> {
    definitions: HashMap<String, FormulaDefinition>,
    parser: FormulaParser<C>,
    rounding: Option<RoundingOptions>,
    composites: DashMap<String, Arc<CompiledComposite>>,
    fragment_hook: Option<FragmentHook>,
}

impl<C: Globals> std::fmt::Debug for FormulaEvaluator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaEvaluator")
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("rounding", &self.rounding)
            .finish()
    }
}

impl<C: Globals> FormulaEvaluator<C> {
    pub(crate) fn new(
        definitions: Vec<FormulaDefinition>,
        parser: FormulaParser<C>,
        rounding: Option<RoundingOptions>,
        fragment_hook: Option<FragmentHook>,
    ) -> FormulaResult<Self> {
        let mut by_name = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            if definition.identifier().is_empty() {
                return Err(FormulaError::ArgumentMissing("identifier"));
            }
            let identifier = definition.identifier().to_string();
            if by_name.insert(identifier.clone(), definition).is_some() {
                return Err(FormulaError::DuplicateIdentifier(identifier));
            }
        }
        Ok(Self {
            definitions: by_name,
            parser,
            rounding,
            composites: DashMap::new(),
            fragment_hook,
        })
    }

    pub fn definition(&self, identifier: &str) -> Option<&FormulaDefinition> {
        self.definitions.get(identifier)
    }

    /// Compile (or reuse) the composite for `target`, execute it against
    /// `context`, and return the full evaluation record.
    pub fn run(&self, context: &C, target: &str) -> FormulaResult<EvaluationState> {
        if target.is_empty() {
            return Err(FormulaError::ArgumentMissing("target"));
        }
        let composite = self.composite(target)?;
        let outcome = self.parser.run(&composite.fragment, context)?;

        let variables = outcome
            .variables
            .into_iter()
            .map(|variable| {
                let definition = self.definitions.get(&variable.name);
                EvaluationVariable {
                    formula_expression: definition.map(|d| d.expression().to_string()),
                    is_rounded: definition.is_some_and(|d| self.rounding_applies(d)),
                    name: variable.name,
                    data_type: variable.data_type,
                    is_read_only: variable.is_read_only,
                    value: variable.value,
                }
            })
            .collect();

        EvaluationState::new(
            target.to_string(),
            variables,
            composite.diagnostics.clone(),
        )
    }

    /// Run `target` and convert its value to `T`.
    pub fn evaluate<T>(&self, context: &C, target: &str) -> FormulaResult<T>
    where
        T: TryFrom<Value>,
        T::Error: std::fmt::Display,
    {
        let state = self.run(context, target)?;
        T::try_from(state.return_value().clone())
            .map_err(|error| FormulaError::Evaluation(format!("cannot convert result: {error}")))
    }

    /// Every name referenced anywhere in `target`'s composed script, in
    /// ascending name order, with backing definitions where known.
    pub fn contained_identifiers(&self, target: &str) -> FormulaResult<Vec<ContainedIdentifier>> {
        if target.is_empty() {
            return Err(FormulaError::ArgumentMissing("target"));
        }
        let composite = self.composite(target)?;
        let mut names = self.parser.identifier_references(&composite.fragment);
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ContainedIdentifier {
                definition: self.definitions.get(&name).cloned(),
                name,
            })
            .collect())
    }

    fn rounding_applies(&self, definition: &FormulaDefinition) -> bool {
        self.rounding.is_some()
            && !definition.ignores_rounding()
            && definition.data_type().admits_decimal()
    }

    fn composite(&self, target: &str) -> FormulaResult<Arc<CompiledComposite>> {
        let mut path = Vec::new();
        self.resolve_composite(target, &mut path)
    }

    /// Fetch or build the compiled composite for `target`.
    ///
    /// `path` carries the identifiers currently being resolved on this
    /// recursion branch; a reference back into the path is a dependency
    /// cycle. The re-emission is skipped, so the subsequent compile fails on
    /// the undefined symbol and nothing is cached.
    fn resolve_composite(
        &self,
        target: &str,
        path: &mut Vec<String>,
    ) -> FormulaResult<Arc<CompiledComposite>> {
        if let Some(hit) = self.composites.get(target) {
            return Ok(Arc::clone(&hit));
        }

        let definition = self
            .definitions
            .get(target)
            .ok_or_else(|| FormulaError::NoFormulaForIdentifier(target.to_string()))?;

        path.push(target.to_string());
        let composed = self.compose(definition, path);
        path.pop();
        let mut fragment = composed?;

        if let Some(hook) = &self.fragment_hook {
            fragment = hook(fragment);
        }
        self.parser.enforce_denied_names(&fragment)?;

        let diagnostics = self.parser.compile(&fragment);
        if diagnostics.iter().any(FormulaDiagnostic::is_error) {
            return Err(FormulaError::Compilation {
                code: Some(fragment.code()),
                diagnostics,
            });
        }
        log::debug!(
            "compiled composite for {target:?} ({} fragment(s))",
            fragment.links().len()
        );

        let compiled = Arc::new(CompiledComposite {
            fragment,
            diagnostics,
        });
        // First insertion wins; a racing thread's equivalent result is
        // dropped (composition is pure, so the artefacts are interchangeable).
        let entry = self
            .composites
            .entry(target.to_string())
            .or_insert(compiled);
        Ok(Arc::clone(&entry))
    }

    /// Linearise `definition`'s transitive dependencies and its own
    /// declaration into one fragment chain.
    ///
    /// Dependencies are emitted in the order the syntax walker yields them
    /// (pre-order, left to right); each declared name is emitted at most
    /// once, first emission wins.
    fn compose(
        &self,
        definition: &FormulaDefinition,
        path: &mut Vec<String>,
    ) -> FormulaResult<Arc<Fragment>> {
        let pre_parse = self.parser.create_fragment(definition.expression());
        let references = self.parser.identifier_references(&pre_parse);

        let mut composite: Option<Arc<Fragment>> = None;
        let mut resolved: HashSet<String> = HashSet::new();
        resolved.insert(definition.identifier().to_string());

        for name in references {
            if resolved.contains(&name) {
                continue;
            }
            if !self.definitions.contains_key(&name) {
                // A context member or builtin; the compiler will resolve it.
                continue;
            }
            if path.iter().any(|pending| pending == &name) {
                log::warn!(
                    "cycle detected while composing formula {:?}: reference to {name:?} skipped",
                    definition.identifier()
                );
                continue;
            }

            let dependency = self.resolve_composite(&name, path)?;
            for link in dependency.fragment.links() {
                let Some(declared) = link.declared_name() else {
                    continue;
                };
                if !resolved.insert(declared.to_string()) {
                    continue;
                }
                composite = Some(self.parser.chain(composite.take(), link.source()));
            }
        }

        let declaration = format!(
            "{} {} = {};",
            definition.data_type(),
            definition.identifier(),
            self.final_expression(definition)
        );
        Ok(self.parser.chain(composite, &declaration))
    }

    /// The target's right-hand side: verbatim, or wrapped in `round` when
    /// rounding options apply to the definition.
    fn final_expression(&self, definition: &FormulaDefinition) -> String {
        match &self.rounding {
            Some(rounding) if self.rounding_applies(definition) => format!(
                "round({}, {}, \"{}\")",
                definition.expression(),
                rounding.decimals,
                rounding.midpoint.mode_token()
            ),
            _ => definition.expression().to_string(),
        }
    }
}
