use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use formula_script::{Type, MIDPOINT_AWAY_FROM_ZERO, MIDPOINT_TO_EVEN};

/// Read-only description of one named formula.
///
/// Identifiers must be unique within a definition set handed to an
/// evaluator. The expression is a single expression in the script language,
/// not a statement list.
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaDefinition {
    identifier: String,
    data_type: Type,
    expression: String,
    ignore_rounding: bool,
    formula_id: Option<String>,
}

impl FormulaDefinition {
    pub fn new(
        identifier: impl Into<String>,
        data_type: Type,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            data_type,
            expression: expression.into(),
            ignore_rounding: false,
            formula_id: None,
        }
    }

    /// Exempt this formula from factory-level rounding options.
    pub fn with_ignore_rounding(mut self, ignore: bool) -> Self {
        self.ignore_rounding = ignore;
        self
    }

    /// Override the fingerprint used for evaluator-cache keying.
    ///
    /// The id must reflect everything that should invalidate a cached
    /// evaluator; hosts that reuse ids across expression edits must flush
    /// the factory cache themselves.
    pub fn with_formula_id(mut self, formula_id: impl Into<String>) -> Self {
        self.formula_id = Some(formula_id.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn data_type(&self) -> &Type {
        &self.data_type
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn ignores_rounding(&self) -> bool {
        self.ignore_rounding
    }

    /// Stable key for cache fingerprinting: the host-supplied id, or a
    /// content-derived default covering every field.
    pub fn formula_id(&self) -> Cow<'_, str> {
        match &self.formula_id {
            Some(id) => Cow::Borrowed(id),
            None => Cow::Owned(format!(
                "{}\u{1}{}\u{1}{}\u{1}{}",
                self.identifier, self.data_type, self.expression, self.ignore_rounding
            )),
        }
    }
}

/// Midpoint behaviour for decimal rounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidpointRounding {
    ToEven,
    AwayFromZero,
}

impl MidpointRounding {
    pub fn strategy(self) -> RoundingStrategy {
        match self {
            MidpointRounding::ToEven => RoundingStrategy::MidpointNearestEven,
            MidpointRounding::AwayFromZero => RoundingStrategy::MidpointAwayFromZero,
        }
    }

    /// Mode token understood by the script-level `round` builtin.
    pub(crate) fn mode_token(self) -> &'static str {
        match self {
            MidpointRounding::ToEven => MIDPOINT_TO_EVEN,
            MidpointRounding::AwayFromZero => MIDPOINT_AWAY_FROM_ZERO,
        }
    }
}

/// Central rounding applied to decimal-typed formulas that do not opt out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingOptions {
    pub decimals: u32,
    pub midpoint: MidpointRounding,
}

impl RoundingOptions {
    pub fn new(decimals: u32, midpoint: MidpointRounding) -> Self {
        Self { decimals, midpoint }
    }

    /// Round `value` the same way the rewritten script would.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimals, self.midpoint.strategy())
    }
}
