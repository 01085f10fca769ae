pub mod csv;
pub mod normalize;
pub(crate) mod util;

pub use csv::{read_bank_statement, CsvError, StatementColumns, StatementProfile};
pub use normalize::{
    normalize_bank, normalize_bank_batch, normalize_ledger, normalize_ledger_batch,
    NormalizeError, RawBankRecord, RawLedgerRecord,
};

pub mod import {
    use concilia_core::BankTransaction;
    use thiserror::Error;

    use crate::*;

    #[derive(Debug, Error)]
    pub enum ImportError {
        #[error(transparent)]
        Csv(#[from] CsvError),
        #[error(transparent)]
        Normalize(#[from] NormalizeError),
    }

    /// Reads a CSV statement and normalizes every row.
    pub fn bank_statement<R: std::io::Read>(
        data: R,
        profile: &StatementProfile,
    ) -> Result<Vec<BankTransaction>, ImportError> {
        let raw = read_bank_statement(data, profile)?;
        Ok(normalize_bank_batch(&raw)?)
    }

}
