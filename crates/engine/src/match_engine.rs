use concilia_core::{
    days_between, BankTransaction, MatchError, MatchSuggestion, MatchingResult, MatchingRule,
    SystemTransaction,
};
use rust_decimal::Decimal;

use crate::config::MatchConfig;
use crate::rules::{evaluate_rule, Evaluation, RuleSet};
use crate::similarity::{relative_difference, word_overlap};

const EXACT_REASON: &str = "exact amount and date";

/// Pairs bank rows with ledger entries in three passes of decreasing
/// strictness: exact, rule-based, fuzzy.
///
/// Every pass is greedy. Bank rows are visited in pool order and take the
/// first ledger entry that qualifies; matched items leave the pools for the
/// rest of the run. No global assignment is attempted, so in ambiguous cases
/// the outcome depends on input order.
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    pub config: MatchConfig,
}

impl MatchEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        bank: &[BankTransaction],
        system: &[SystemTransaction],
        rules: &[MatchingRule],
    ) -> Result<MatchingResult, MatchError> {
        bank.iter().try_for_each(BankTransaction::validate)?;
        system.iter().try_for_each(SystemTransaction::validate)?;
        let rules = RuleSet::new(rules.to_vec());
        rules.validate()?;

        let mut system_pool = system.to_vec();
        let mut exact_matches = Vec::new();
        let mut suggested_matches = Vec::new();

        let bank_pool = sweep(bank.to_vec(), &mut system_pool, &mut exact_matches, |b, s| {
            self.is_exact(b, s).then(|| Evaluation {
                confidence: Decimal::ONE,
                reasons: vec![EXACT_REASON.to_string()],
            })
        });
        tracing::debug!(
            phase = "exact",
            matched = exact_matches.len(),
            remaining_bank = bank_pool.len(),
            remaining_system = system_pool.len(),
        );

        let mut bank_pool = bank_pool;
        for rule in rules.iter() {
            let before = suggested_matches.len();
            bank_pool = sweep(bank_pool, &mut system_pool, &mut suggested_matches, |b, s| {
                let eval = evaluate_rule(rule, b, s, &self.config);
                (eval.confidence > self.config.rule_threshold).then(|| labelled(rule, eval))
            });
            tracing::debug!(
                phase = "rule",
                rule = %rule.id,
                matched = suggested_matches.len() - before,
                remaining_bank = bank_pool.len(),
                remaining_system = system_pool.len(),
            );
        }

        let before = suggested_matches.len();
        let unmatched_bank = sweep(bank_pool, &mut system_pool, &mut suggested_matches, |b, s| {
            let eval = self.fuzzy_score(b, s);
            (eval.confidence > self.config.fuzzy_threshold).then_some(eval)
        });
        tracing::debug!(
            phase = "fuzzy",
            matched = suggested_matches.len() - before,
            remaining_bank = unmatched_bank.len(),
            remaining_system = system_pool.len(),
        );

        // Stable: equal confidences keep discovery order.
        suggested_matches.sort_by(|a, b| b.confidence.cmp(&a.confidence));

        let result = MatchingResult {
            exact_matches,
            suggested_matches,
            unmatched_bank,
            unmatched_system: system_pool,
        };
        let summary = result.summary();
        tracing::info!(
            exact = summary.exact,
            suggested = summary.suggested,
            unmatched_bank = summary.unmatched_bank,
            unmatched_system = summary.unmatched_system,
            "reconciliation run complete"
        );
        Ok(result)
    }

    fn is_exact(&self, bank: &BankTransaction, system: &SystemTransaction) -> bool {
        (bank.amount - system.amount).abs() < self.config.amount_epsilon
            && bank.date == system.date
            && bank.direction.is_compatible(system.category)
    }

    /// Amount, description and date signals for the last-resort pass.
    pub fn fuzzy_score(&self, bank: &BankTransaction, system: &SystemTransaction) -> Evaluation {
        let cfg = &self.config;
        let mut confidence = Decimal::ZERO;
        let mut reasons = Vec::new();

        let amount_diff = relative_difference(bank.amount, system.amount);
        if amount_diff <= cfg.fuzzy_amount_tolerance {
            confidence += cfg.fuzzy_amount_weight;
            reasons.push(format!(
                "amounts within {}%",
                (amount_diff * Decimal::ONE_HUNDRED).round_dp(2).normalize()
            ));
        }

        let overlap = word_overlap(&bank.description, &system.description);
        if overlap > cfg.fuzzy_description_floor {
            confidence += cfg.fuzzy_description_weight * overlap;
            reasons.push(format!(
                "description similarity {}%",
                (overlap * Decimal::ONE_HUNDRED).round_dp(0).normalize()
            ));
        }

        let days = days_between(bank.date, system.date);
        if let Some(proximity) = date_proximity(days, cfg.fuzzy_date_window_days) {
            let contribution = cfg.fuzzy_date_weight * proximity;
            if contribution > Decimal::ZERO {
                confidence += contribution;
                reasons.push(format!("dates {days} day(s) apart"));
            }
        }

        Evaluation {
            confidence: confidence.min(Decimal::ONE),
            reasons,
        }
    }
}

/// `1 - days / window`, or `None` outside the window.
fn date_proximity(days: i64, window: u32) -> Option<Decimal> {
    if days > i64::from(window) {
        return None;
    }
    if window == 0 {
        return Some(Decimal::ONE);
    }
    Some(Decimal::ONE - Decimal::from(days) / Decimal::from(window))
}

fn labelled(rule: &MatchingRule, eval: Evaluation) -> Evaluation {
    let mut reasons = Vec::with_capacity(eval.reasons.len() + 1);
    reasons.push(format!("rule: {}", rule.name));
    reasons.extend(eval.reasons);
    Evaluation {
        confidence: eval.confidence,
        reasons,
    }
}

/// One greedy pass. Each bank row takes the first ledger entry `score`
/// accepts; both leave their pools. Returns the bank rows left over.
fn sweep<F>(
    bank_pool: Vec<BankTransaction>,
    system_pool: &mut Vec<SystemTransaction>,
    matches: &mut Vec<MatchSuggestion>,
    score: F,
) -> Vec<BankTransaction>
where
    F: Fn(&BankTransaction, &SystemTransaction) -> Option<Evaluation>,
{
    let mut leftover = Vec::with_capacity(bank_pool.len());

    for bank in bank_pool {
        let hit = system_pool
            .iter()
            .enumerate()
            .find_map(|(idx, system)| score(&bank, system).map(|eval| (idx, eval)));

        match hit {
            Some((idx, eval)) => {
                let system = system_pool.remove(idx);
                matches.push(MatchSuggestion::new(bank, system, eval.confidence, eval.reasons));
            }
            None => leftover.push(bank),
        }
    }

    leftover
}
