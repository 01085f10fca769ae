use concilia_core::{
    days_between, BankTransaction, MatchError, MatchingRule, RuleConditions, SystemTransaction,
    ValueRange,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::config::MatchConfig;

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("Failed to parse rules TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] MatchError),
}

/// Score for one candidate pair together with the signals that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub confidence: Decimal,
    pub reasons: Vec<String>,
}

/// Active rules in the order the engine consults them.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<MatchingRule>,
}

impl RuleSet {
    /// Drops inactive rules and orders the rest by ascending priority.
    /// Rules sharing a priority keep their input order.
    pub fn new(rules: Vec<MatchingRule>) -> Self {
        let mut rules: Vec<MatchingRule> = rules.into_iter().filter(|r| r.active).collect();
        rules.sort_by_key(|r| r.priority);
        Self { rules }
    }

    /// Parses a `[[rules]]` array. Inverted amount ranges are rejected here
    /// rather than at match time.
    pub fn from_toml(toml_content: &str) -> Result<Self, RuleLoadError> {
        let file: RulesFile = toml::from_str(toml_content)?;
        let rules: Vec<MatchingRule> = file.rules.into_iter().map(MatchingRule::from).collect();
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self::new(rules))
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        self.rules.iter().try_for_each(MatchingRule::validate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchingRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

/// Flat on-disk shape; conditions are top-level keys.
#[derive(Deserialize)]
struct RuleEntry {
    id: String,
    name: String,
    priority: i32,
    #[serde(default = "default_active")]
    active: bool,
    min: Option<Decimal>,
    max: Option<Decimal>,
    keywords: Option<Vec<String>>,
    date_tolerance_days: Option<u32>,
}

fn default_active() -> bool {
    true
}

impl From<RuleEntry> for MatchingRule {
    fn from(entry: RuleEntry) -> Self {
        // A one-sided bound is open on the other side.
        let value_range = match (entry.min, entry.max) {
            (None, None) => None,
            (min, max) => Some(ValueRange {
                min: min.unwrap_or(Decimal::ZERO),
                max: max.unwrap_or(Decimal::MAX),
            }),
        };
        MatchingRule {
            id: entry.id,
            name: entry.name,
            conditions: RuleConditions {
                value_range,
                keywords: entry.keywords,
                date_tolerance_days: entry.date_tolerance_days,
            },
            priority: entry.priority,
            active: entry.active,
        }
    }
}

/// Scores a pair against one rule's condition set.
pub fn evaluate_rule(
    rule: &MatchingRule,
    bank: &BankTransaction,
    system: &SystemTransaction,
    config: &MatchConfig,
) -> Evaluation {
    let conditions = &rule.conditions;
    let mut confidence = Decimal::ZERO;
    let mut reasons = Vec::new();

    if let Some(range) = &conditions.value_range {
        if range.contains(bank.amount) && range.contains(system.amount) {
            confidence += config.rule_range_weight;
            reasons.push(format!("amount within range {} to {}", range.min, range.max));
        }
    }

    if let Some(keywords) = conditions.keywords.as_ref().filter(|k| !k.is_empty()) {
        let bank_desc = bank.description.to_lowercase();
        let system_desc = system.description.to_lowercase();
        let matched: Vec<&str> = keywords
            .iter()
            .filter(|k| {
                let k = k.to_lowercase();
                bank_desc.contains(&k) || system_desc.contains(&k)
            })
            .map(String::as_str)
            .collect();

        if !matched.is_empty() {
            let fraction = Decimal::from(matched.len()) / Decimal::from(keywords.len());
            confidence += config.rule_keyword_weight * fraction;
            reasons.push(format!("matched keywords: {}", matched.join(", ")));
        }
    }

    if let Some(tolerance) = conditions.date_tolerance_days {
        let days = days_between(bank.date, system.date);
        if days <= i64::from(tolerance) {
            confidence += config.rule_date_weight;
            reasons.push(format!("dates {days} day(s) apart, tolerance {tolerance}"));
        }
    }

    Evaluation {
        confidence: confidence.min(Decimal::ONE),
        reasons,
    }
}
