pub mod db;

pub use db::{
    create_db, insert_bank_transaction, insert_bank_transactions, insert_ledger_entries,
    insert_ledger_entry, list_bank_transactions, list_ledger_entries, list_rules, save_rule,
    DbPool, StorageError,
};
