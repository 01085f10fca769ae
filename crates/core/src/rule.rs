use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::MatchError;

/// Inclusive amount window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl ValueRange {
    pub fn contains(&self, amount: Decimal) -> bool {
        let amount = amount.abs();
        amount >= self.min && amount <= self.max
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default)]
    pub value_range: Option<ValueRange>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub date_tolerance_days: Option<u32>,
}

/// Operator-configured heuristic consulted during the rule phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub conditions: RuleConditions,
    /// Lower runs first.
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl MatchingRule {
    pub fn validate(&self) -> Result<(), MatchError> {
        if let Some(range) = &self.conditions.value_range {
            if range.min > range.max {
                return Err(MatchError::InvalidRule {
                    id: self.id.clone(),
                    reason: format!("range minimum {} exceeds maximum {}", range.min, range.max),
                });
            }
        }
        Ok(())
    }
}
