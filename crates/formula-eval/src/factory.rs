use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use crate::definition::{FormulaDefinition, RoundingOptions};
use crate::error::FormulaResult;
use crate::evaluator::{FormulaEvaluator, FragmentHook};
use crate::parser::FormulaParser;
use formula_script::{Fragment, Globals, ScriptFunction};

/// Shared configuration for every evaluator a factory hands out.
#[derive(Clone, Debug)]
pub struct FactoryOptions {
    /// Host functions registered on top of the standard builtins.
    pub functions: Vec<ScriptFunction>,
    /// Name spellings formulas must not reference.
    pub denied_names: Vec<String>,
    /// Central rounding for decimal-typed formulas.
    pub rounding: Option<RoundingOptions>,
    /// Capacity of the most-recently-used evaluator cache.
    pub evaluator_cache_size: NonZeroUsize,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            functions: Vec::new(),
            denied_names: Vec::new(),
            rounding: None,
            evaluator_cache_size: NonZeroUsize::new(16).expect("cache size is non-zero"),
        }
    }
}

/// Cache key of a definition set: the sorted concatenation of every
/// definition's formula id.
///
/// Two sets with equal keys are treated as the same set; the factory then
/// returns the same evaluator instance. Hosts whose formula ids do not
/// reflect expression content must call
/// [`FormulaFactory::flush_evaluators_cache`] after edits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DefinitionsKey(String);

impl DefinitionsKey {
    pub fn for_definitions(definitions: &[FormulaDefinition]) -> Self {
        let mut ids: Vec<String> = definitions
            .iter()
            .map(|definition| definition.formula_id().into_owned())
            .collect();
        ids.sort();
        Self(ids.join("\u{1f}"))
    }
}

/// Creates and caches [`FormulaEvaluator`]s for a context type `C`.
pub struct FormulaFactory<C: Globals> {
    options: FactoryOptions,
    fragment_hook: Option<FragmentHook>,
    evaluators: Mutex<LruCache<DefinitionsKey, Arc<FormulaEvaluator<C>>>>,
    parser: OnceLock<Arc<FormulaParser<C>>>,
}

impl<C: Globals> FormulaFactory<C> {
    pub fn new() -> Self {
        Self::with_options(FactoryOptions::default())
    }

    pub fn with_options(options: FactoryOptions) -> Self {
        let capacity = options.evaluator_cache_size;
        Self {
            options,
            fragment_hook: None,
            evaluators: Mutex::new(LruCache::new(capacity)),
            parser: OnceLock::new(),
        }
    }

    /// Install a rewrite applied to every composed fragment before
    /// compilation (the default is the identity). Cached evaluators were
    /// built without the hook, so the cache is flushed.
    pub fn set_fragment_created_hook(
        &mut self,
        hook: impl Fn(Arc<Fragment>) -> Arc<Fragment> + Send + Sync + 'static,
    ) {
        self.fragment_hook = Some(Arc::new(hook));
        self.flush_evaluators_cache();
    }

    /// Evaluator for `definitions`, reused when a set with the same
    /// composite key was seen recently.
    pub fn get_evaluator(
        &self,
        definitions: &[FormulaDefinition],
    ) -> FormulaResult<Arc<FormulaEvaluator<C>>> {
        let key = DefinitionsKey::for_definitions(definitions);
        let mut cache = self
            .evaluators
            .lock()
            .expect("evaluator cache mutex poisoned");
        if let Some(hit) = cache.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let evaluator = Arc::new(FormulaEvaluator::new(
            definitions.to_vec(),
            self.new_parser(),
            self.options.rounding,
            self.fragment_hook.clone(),
        )?);
        cache.put(key, Arc::clone(&evaluator));
        Ok(evaluator)
    }

    /// Standalone parser for front-end validation of single expressions,
    /// built lazily and shared.
    pub fn get_parser(&self) -> Arc<FormulaParser<C>> {
        Arc::clone(
            self.parser
                .get_or_init(|| Arc::new(self.new_parser())),
        )
    }

    /// Drop every cached evaluator. Needed when a definition's expression
    /// changes without a corresponding formula-id change.
    pub fn flush_evaluators_cache(&self) {
        self.evaluators
            .lock()
            .expect("evaluator cache mutex poisoned")
            .clear();
        log::debug!("evaluator cache flushed");
    }

    fn new_parser(&self) -> FormulaParser<C> {
        FormulaParser::new(
            &self.options.functions,
            self.options.denied_names.iter().cloned(),
        )
    }
}

impl<C: Globals> Default for FormulaFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}
