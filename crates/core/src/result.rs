use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::PartitionError;
use super::transaction::{BankTransaction, SystemTransaction};

/// A proposed or confirmed pairing of one bank row with one ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub bank: BankTransaction,
    pub system: SystemTransaction,
    /// Always within `[0, 1]`.
    pub confidence: Decimal,
    pub reasons: Vec<String>,
}

impl MatchSuggestion {
    pub fn new(
        bank: BankTransaction,
        system: SystemTransaction,
        confidence: Decimal,
        reasons: Vec<String>,
    ) -> Self {
        Self {
            bank,
            system,
            confidence: confidence.clamp(Decimal::ZERO, Decimal::ONE),
            reasons,
        }
    }

    /// True when either side carries `key` as its identifier.
    pub fn involves(&self, key: &str) -> bool {
        self.bank.id == key || self.system.id == key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub exact_matches: Vec<MatchSuggestion>,
    /// Sorted by descending confidence.
    pub suggested_matches: Vec<MatchSuggestion>,
    pub unmatched_bank: Vec<BankTransaction>,
    pub unmatched_system: Vec<SystemTransaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub exact: usize,
    pub suggested: usize,
    pub unmatched_bank: usize,
    pub unmatched_system: usize,
}

impl MatchingResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            exact: self.exact_matches.len(),
            suggested: self.suggested_matches.len(),
            unmatched_bank: self.unmatched_bank.len(),
            unmatched_system: self.unmatched_system.len(),
        }
    }

    /// Checks that every input identifier lands in exactly one partition.
    pub fn check_partition(
        &self,
        bank_ids: &[&str],
        system_ids: &[&str],
    ) -> Result<(), PartitionError> {
        let pairs = self.exact_matches.iter().chain(&self.suggested_matches);

        let bank_seen = pairs
            .clone()
            .map(|m| m.bank.id.as_str())
            .chain(self.unmatched_bank.iter().map(|t| t.id.as_str()));
        check_side(bank_seen, bank_ids)?;

        let system_seen = pairs
            .map(|m| m.system.id.as_str())
            .chain(self.unmatched_system.iter().map(|t| t.id.as_str()));
        check_side(system_seen, system_ids)
    }
}

fn check_side<'a>(
    seen: impl Iterator<Item = &'a str>,
    expected: &[&str],
) -> Result<(), PartitionError> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in seen {
        *counts.entry(id).or_default() += 1;
    }

    for id in expected {
        match counts.remove(id) {
            None => return Err(PartitionError::Missing(id.to_string())),
            Some(n) if n > 1 => return Err(PartitionError::Duplicated(id.to_string())),
            Some(_) => {}
        }
    }

    match counts.into_keys().next() {
        Some(extra) => Err(PartitionError::Unexpected(extra.to_string())),
        None => Ok(()),
    }
}
