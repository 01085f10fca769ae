use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Thresholds and signal weights for the three matching phases.
///
/// `Default` reproduces the stock behaviour. Every field can be overridden
/// from the `[matching]` table of the server config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Exact phase: amounts must differ by strictly less than this.
    pub amount_epsilon: Decimal,

    /// Rule phase: a pair is accepted when its score is strictly above this.
    pub rule_threshold: Decimal,
    pub rule_range_weight: Decimal,
    /// Scaled by the fraction of the rule's keywords found.
    pub rule_keyword_weight: Decimal,
    pub rule_date_weight: Decimal,

    /// Fuzzy phase: a pair is accepted when its score is strictly above this.
    pub fuzzy_threshold: Decimal,
    /// Maximum relative amount difference that still counts as similar.
    pub fuzzy_amount_tolerance: Decimal,
    pub fuzzy_amount_weight: Decimal,
    /// Word overlap must be strictly above this to contribute.
    pub fuzzy_description_floor: Decimal,
    pub fuzzy_description_weight: Decimal,
    pub fuzzy_date_window_days: u32,
    /// Scaled linearly down to zero at the edge of the window.
    pub fuzzy_date_weight: Decimal,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            amount_epsilon: Decimal::new(1, 2),
            rule_threshold: Decimal::new(6, 1),
            rule_range_weight: Decimal::new(3, 1),
            rule_keyword_weight: Decimal::new(4, 1),
            rule_date_weight: Decimal::new(3, 1),
            fuzzy_threshold: Decimal::new(5, 1),
            fuzzy_amount_tolerance: Decimal::new(5, 2),
            fuzzy_amount_weight: Decimal::new(4, 1),
            fuzzy_description_floor: Decimal::new(3, 1),
            fuzzy_description_weight: Decimal::new(3, 1),
            fuzzy_date_window_days: 7,
            fuzzy_date_weight: Decimal::new(3, 1),
        }
    }
}
