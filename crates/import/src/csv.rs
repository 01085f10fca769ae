use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

use crate::normalize::RawBankRecord;
use crate::util::parse_amount;

/// Zero-based column positions in a bank statement export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementColumns {
    pub id: Option<usize>,
    pub date: usize,
    pub description: Option<usize>,
    /// Single signed amount column. Takes precedence over `debit`/`credit`.
    pub amount: Option<usize>,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    /// Column holding a `credit`/`debit` tag next to `amount`.
    pub kind: Option<usize>,
}

impl Default for StatementColumns {
    fn default() -> Self {
        Self {
            id: None,
            date: 0,
            description: Some(1),
            amount: Some(2),
            debit: None,
            credit: None,
            kind: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementProfile {
    pub name: String,
    pub columns: StatementColumns,
    pub has_header: bool,
    pub delimiter: String,
}

impl Default for StatementProfile {
    fn default() -> Self {
        Self {
            name: "Default statement".to_string(),
            columns: StatementColumns::default(),
            has_header: true,
            delimiter: ",".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Row {row}: missing column {column}")]
    MissingColumn { row: usize, column: String },
    #[error("Profile maps neither an amount column nor a debit/credit pair")]
    NoAmountColumn,
    #[error("Row {row}: both debit and credit carry a value")]
    AmbiguousAmount { row: usize },
    #[error("Row {row}: neither debit nor credit carries a value")]
    MissingAmount { row: usize },
    #[error("No data rows")]
    NoDataRows,
}

/// Reads statement rows into raw records. Values are not parsed here;
/// that happens during normalization.
///
/// Rows without an id column get a content-derived id, so importing the
/// same statement twice is idempotent while different statements for one
/// account never collide. Identical rows within one file are told apart by
/// their occurrence count.
pub fn read_bank_statement<R: Read>(
    data: R,
    profile: &StatementProfile,
) -> Result<Vec<RawBankRecord>, CsvError> {
    let cols = &profile.columns;
    if cols.amount.is_none() && (cols.debit.is_none() || cols.credit.is_none()) {
        return Err(CsvError::NoAmountColumn);
    }

    let delimiter = profile
        .delimiter
        .as_bytes()
        .first()
        .copied()
        .unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(profile.has_header)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let field = |col: usize, name: &str| {
            record
                .get(col)
                .map(str::trim)
                .ok_or_else(|| CsvError::MissingColumn {
                    row,
                    column: format!("{name} ({col})"),
                })
        };
        let optional = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let date = field(cols.date, "date")?.to_string();
        let description = optional(cols.description).unwrap_or_default().to_string();

        let (amount, kind) = match cols.amount {
            Some(col) => (
                field(col, "amount")?.to_string(),
                optional(cols.kind).map(str::to_string),
            ),
            None => {
                // Exports often fill the unused side with 0.00.
                let debit = optional(cols.debit).filter(|v| !is_zero(v));
                let credit = optional(cols.credit).filter(|v| !is_zero(v));
                match (debit, credit) {
                    (Some(d), None) => (d.to_string(), Some("debit".to_string())),
                    (None, Some(c)) => (c.to_string(), Some("credit".to_string())),
                    (Some(_), Some(_)) => return Err(CsvError::AmbiguousAmount { row }),
                    (None, None) => return Err(CsvError::MissingAmount { row }),
                }
            }
        };

        let id = match optional(cols.id) {
            Some(id) => id.to_string(),
            None => {
                let kind = kind.as_deref().unwrap_or("");
                let content = format!("{date}|{amount}|{kind}|{description}");
                let occurrence = seen.entry(content.clone()).or_insert(0);
                let id = synthetic_id(&content, *occurrence);
                *occurrence += 1;
                id
            }
        };

        records.push(RawBankRecord {
            id,
            date,
            description,
            amount,
            kind,
        });
    }

    if records.is_empty() {
        return Err(CsvError::NoDataRows);
    }

    Ok(records)
}

/// Unparseable cells are not zero; normalization reports them.
fn is_zero(value: &str) -> bool {
    parse_amount(value).is_some_and(|a| a.is_zero())
}

fn synthetic_id(content: &str, occurrence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update((occurrence as u64).to_le_bytes());
    let hash: [u8; 32] = hasher.finalize().into();
    let hex: String = hash[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("stmt-{hex}")
}
