//! Operator review of suggested matches.
//!
//! Both transitions move a single suggestion out of `suggested_matches` in
//! one step, so the partition holds before and after each call.

use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::result::{MatchingResult, ResultSummary};

impl MatchingResult {
    /// Promotes the first suggestion involving `key` to an exact match with
    /// confidence 1.0. Returns `false` (and changes nothing) when no
    /// suggestion involves `key`.
    pub fn confirm(&mut self, key: &str) -> bool {
        let Some(idx) = self.suggested_matches.iter().position(|m| m.involves(key)) else {
            return false;
        };
        let mut confirmed = self.suggested_matches.remove(idx);
        confirmed.confidence = Decimal::ONE;
        self.exact_matches.push(confirmed);
        true
    }

    /// Dissolves the first suggestion involving `key`, returning both sides
    /// to their unmatched lists.
    pub fn reject(&mut self, key: &str) -> bool {
        let Some(idx) = self.suggested_matches.iter().position(|m| m.involves(key)) else {
            return false;
        };
        let rejected = self.suggested_matches.remove(idx);
        self.unmatched_bank.push(rejected.bank);
        self.unmatched_system.push(rejected.system);
        true
    }
}

/// A result shared across an operator session. Every transition takes the
/// lock, so concurrent confirm/reject calls are serialized.
#[derive(Debug, Clone, Default)]
pub struct ReviewSession {
    inner: Arc<Mutex<MatchingResult>>,
}

impl ReviewSession {
    pub fn new(result: MatchingResult) -> Self {
        Self {
            inner: Arc::new(Mutex::new(result)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MatchingResult> {
        // A panic mid-transition cannot leave a half-moved suggestion behind,
        // so a poisoned lock still guards a consistent result.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Confirms under the lock and reports the counts that transition left,
    /// before any other caller can move something.
    pub fn confirm(&self, key: &str) -> (bool, ResultSummary) {
        let mut result = self.lock();
        let changed = result.confirm(key);
        (changed, result.summary())
    }

    pub fn reject(&self, key: &str) -> (bool, ResultSummary) {
        let mut result = self.lock();
        let changed = result.reject(key);
        (changed, result.summary())
    }

    pub fn snapshot(&self) -> MatchingResult {
        self.lock().clone()
    }

    pub fn summary(&self) -> ResultSummary {
        self.lock().summary()
    }
}
