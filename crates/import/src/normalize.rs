use concilia_core::{BankTransaction, Category, Direction, SystemTransaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{parse_amount, parse_date};

const DEFAULT_STATUS: &str = "pending";

/// A bank row as delivered by an importer, before any parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBankRecord {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub description: String,
    pub amount: String,
    /// `credit` / `debit`; inferred from the sign when absent.
    #[serde(default)]
    pub kind: Option<String>,
}

/// A ledger row as read from the record store or an API payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLedgerRecord {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub description: String,
    pub amount: String,
    /// `revenue` / `expense`; inferred from the sign when absent.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Invalid transaction '{id}': {reason}")]
    InvalidTransaction { id: String, reason: String },
    #[error("Row {row}: {source}")]
    AtRow {
        row: usize,
        source: Box<NormalizeError>,
    },
}

fn invalid(id: &str, reason: impl Into<String>) -> NormalizeError {
    NormalizeError::InvalidTransaction {
        id: id.to_string(),
        reason: reason.into(),
    }
}

fn parse_common(
    id: &str,
    date: &str,
    amount: &str,
) -> Result<(String, chrono::NaiveDate, Decimal), NormalizeError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(invalid(id, "missing identifier"));
    }
    let date = parse_date(date, None).ok_or_else(|| invalid(id, format!("unparseable date '{date}'")))?;
    let amount =
        parse_amount(amount).ok_or_else(|| invalid(id, format!("non-numeric amount '{amount}'")))?;
    Ok((id.to_string(), date, amount))
}

pub fn normalize_bank(raw: &RawBankRecord) -> Result<BankTransaction, NormalizeError> {
    let (id, date, amount) = parse_common(&raw.id, &raw.date, &raw.amount)?;

    let direction = match raw.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(tag) => tag.parse::<Direction>().map_err(|e| invalid(&id, e))?,
        None if amount.is_sign_negative() => Direction::Debit,
        None => Direction::Credit,
    };

    Ok(BankTransaction {
        id,
        date,
        description: raw.description.trim().to_string(),
        amount: amount.abs(),
        direction,
    })
}

pub fn normalize_ledger(raw: &RawLedgerRecord) -> Result<SystemTransaction, NormalizeError> {
    let (id, date, amount) = parse_common(&raw.id, &raw.date, &raw.amount)?;

    let category = match raw.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(tag) => tag.parse::<Category>().map_err(|e| invalid(&id, e))?,
        None if amount.is_sign_negative() => Category::Expense,
        None => Category::Revenue,
    };

    let status = raw
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STATUS)
        .to_string();

    Ok(SystemTransaction {
        id,
        date,
        description: raw.description.trim().to_string(),
        amount: amount.abs(),
        category,
        status,
    })
}

fn at_row(row: usize) -> impl FnOnce(NormalizeError) -> NormalizeError {
    move |e| NormalizeError::AtRow {
        row,
        source: Box::new(e),
    }
}

/// All-or-nothing: the first bad row aborts the batch.
pub fn normalize_bank_batch(raw: &[RawBankRecord]) -> Result<Vec<BankTransaction>, NormalizeError> {
    raw.iter()
        .enumerate()
        .map(|(row, r)| normalize_bank(r).map_err(at_row(row)))
        .collect()
}

pub fn normalize_ledger_batch(
    raw: &[RawLedgerRecord],
) -> Result<Vec<SystemTransaction>, NormalizeError> {
    raw.iter()
        .enumerate()
        .map(|(row, r)| normalize_ledger(r).map_err(at_row(row)))
        .collect()
}
