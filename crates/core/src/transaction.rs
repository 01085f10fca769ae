use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::MatchError;

/// Direction of money movement as reported by the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    /// `credit` pairs with `revenue`, `debit` pairs with `expense`.
    pub fn is_compatible(self, category: Category) -> bool {
        matches!(
            (self, category),
            (Direction::Credit, Category::Revenue) | (Direction::Debit, Category::Expense)
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credit" | "c" => Ok(Direction::Credit),
            "debit" | "d" => Ok(Direction::Debit),
            other => Err(format!("Unknown direction: '{other}'")),
        }
    }
}

/// Ledger classification of a system entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Revenue,
    Expense,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Revenue => write!(f, "revenue"),
            Category::Expense => write!(f, "expense"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "revenue" | "income" => Ok(Category::Revenue),
            "expense" => Ok(Category::Expense),
            other => Err(format!("Unknown category: '{other}'")),
        }
    }
}

/// One row of an imported bank statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
}

/// One ledger entry recorded in the accounting system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub category: Category,
    pub status: String,
}

impl BankTransaction {
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.id.trim().is_empty() {
            return Err(MatchError::InvalidTransaction {
                id: self.id.clone(),
                reason: "bank transaction has an empty identifier".to_string(),
            });
        }
        Ok(())
    }
}

impl SystemTransaction {
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.id.trim().is_empty() {
            return Err(MatchError::InvalidTransaction {
                id: self.id.clone(),
                reason: "system transaction has an empty identifier".to_string(),
            });
        }
        Ok(())
    }
}

/// Absolute number of calendar days between two dates.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}
