use chrono::NaiveDate;
use concilia_core::{
    BankTransaction, Category, DateRange, Direction, MatchingRule, RuleConditions,
    SystemTransaction, ValueRange,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Corrupt {table} row '{id}': {reason}")]
    Corrupt {
        table: &'static str,
        id: String,
        reason: String,
    },
    #[error("Failed to encode keywords: {0}")]
    Encode(#[from] serde_json::Error),
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_transactions (
            id TEXT NOT NULL,
            account_id TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            direction TEXT NOT NULL,
            PRIMARY KEY (account_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT NOT NULL,
            company_id TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            category TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            PRIMARY KEY (company_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matching_rules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            priority INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            min_amount TEXT,
            max_amount TEXT,
            keywords TEXT,
            date_tolerance_days INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_bank_transaction<'e, E>(
    executor: E,
    account_id: &str,
    tx: &BankTransaction,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO bank_transactions (id, account_id, date, description, amount, direction) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&tx.id)
    .bind(account_id)
    .bind(tx.date.to_string())
    .bind(&tx.description)
    .bind(tx.amount.to_string())
    .bind(tx.direction.to_string())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn insert_ledger_entry<'e, E>(
    executor: E,
    company_id: &str,
    tx: &SystemTransaction,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO ledger_entries (id, company_id, date, description, amount, category, status) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&tx.id)
    .bind(company_id)
    .bind(tx.date.to_string())
    .bind(&tx.description)
    .bind(tx.amount.to_string())
    .bind(tx.category.to_string())
    .bind(&tx.status)
    .execute(executor)
    .await?;
    Ok(())
}

/// Writes a whole statement in one transaction; nothing is kept on failure.
pub async fn insert_bank_transactions(
    pool: &DbPool,
    account_id: &str,
    txs: &[BankTransaction],
) -> Result<usize, StorageError> {
    let mut db_tx = pool.begin().await?;
    for tx in txs {
        insert_bank_transaction(&mut *db_tx, account_id, tx).await?;
    }
    db_tx.commit().await?;
    Ok(txs.len())
}

pub async fn insert_ledger_entries(
    pool: &DbPool,
    company_id: &str,
    entries: &[SystemTransaction],
) -> Result<usize, StorageError> {
    let mut db_tx = pool.begin().await?;
    for entry in entries {
        insert_ledger_entry(&mut *db_tx, company_id, entry).await?;
    }
    db_tx.commit().await?;
    Ok(entries.len())
}

pub async fn save_rule(pool: &DbPool, rule: &MatchingRule) -> Result<(), StorageError> {
    let conditions = &rule.conditions;
    let keywords = conditions
        .keywords
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        "INSERT OR REPLACE INTO matching_rules (id, name, priority, active, min_amount, max_amount, keywords, date_tolerance_days) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&rule.id)
    .bind(&rule.name)
    .bind(rule.priority)
    .bind(rule.active)
    .bind(conditions.value_range.map(|r| r.min.to_string()))
    .bind(conditions.value_range.map(|r| r.max.to_string()))
    .bind(keywords)
    .bind(conditions.date_tolerance_days.map(i64::from))
    .execute(pool)
    .await?;
    Ok(())
}

/// Statement rows for one account, ordered by date then id.
pub async fn list_bank_transactions(
    pool: &DbPool,
    account_id: &str,
    range: DateRange,
) -> Result<Vec<BankTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, (String, String, String, String, String)>(
        "SELECT id, date, description, amount, direction FROM bank_transactions WHERE account_id = ? AND date BETWEEN ? AND ? ORDER BY date, id",
    )
    .bind(account_id)
    .bind(range.start.to_string())
    .bind(range.end.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, date, description, amount, direction)| -> Result<_, StorageError> {
            const TABLE: &str = "bank_transactions";
            Ok(BankTransaction {
                date: decode_date(TABLE, &id, &date)?,
                amount: decode_amount(TABLE, &id, &amount)?,
                direction: Direction::from_str(&direction).map_err(|e| corrupt(TABLE, &id, e))?,
                description,
                id,
            })
        })
        .collect()
}

/// Ledger entries for one company. An empty `statuses` slice means any status.
pub async fn list_ledger_entries(
    pool: &DbPool,
    company_id: &str,
    range: DateRange,
    statuses: &[String],
) -> Result<Vec<SystemTransaction>, StorageError> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, date, description, amount, category, status FROM ledger_entries WHERE company_id = ",
    );
    query
        .push_bind(company_id)
        .push(" AND date BETWEEN ")
        .push_bind(range.start.to_string())
        .push(" AND ")
        .push_bind(range.end.to_string());

    if !statuses.is_empty() {
        query.push(" AND status IN (");
        let mut separated = query.separated(", ");
        for status in statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    query.push(" ORDER BY date, id");

    let rows = query
        .build_query_as::<(String, String, String, String, String, String)>()
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|(id, date, description, amount, category, status)| -> Result<_, StorageError> {
            const TABLE: &str = "ledger_entries";
            Ok(SystemTransaction {
                date: decode_date(TABLE, &id, &date)?,
                amount: decode_amount(TABLE, &id, &amount)?,
                category: Category::from_str(&category).map_err(|e| corrupt(TABLE, &id, e))?,
                description,
                status,
                id,
            })
        })
        .collect()
}

type RuleRow = (
    String,
    String,
    i32,
    bool,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
);

/// Rules ordered by priority then id.
pub async fn list_rules(pool: &DbPool, active_only: bool) -> Result<Vec<MatchingRule>, StorageError> {
    let sql = if active_only {
        "SELECT id, name, priority, active, min_amount, max_amount, keywords, date_tolerance_days FROM matching_rules WHERE active = 1 ORDER BY priority, id"
    } else {
        "SELECT id, name, priority, active, min_amount, max_amount, keywords, date_tolerance_days FROM matching_rules ORDER BY priority, id"
    };
    let rows = sqlx::query_as::<_, RuleRow>(sql).fetch_all(pool).await?;
    rows.into_iter().map(decode_rule).collect()
}

fn decode_rule(row: RuleRow) -> Result<MatchingRule, StorageError> {
    const TABLE: &str = "matching_rules";
    let (id, name, priority, active, min, max, keywords, tolerance) = row;

    let value_range = match (min, max) {
        (None, None) => None,
        (min, max) => Some(ValueRange {
            min: min
                .map(|m| decode_amount(TABLE, &id, &m))
                .transpose()?
                .unwrap_or(Decimal::ZERO),
            max: max
                .map(|m| decode_amount(TABLE, &id, &m))
                .transpose()?
                .unwrap_or(Decimal::MAX),
        }),
    };
    let keywords = keywords
        .map(|k| serde_json::from_str::<Vec<String>>(&k))
        .transpose()
        .map_err(|e| corrupt(TABLE, &id, e.to_string()))?;
    let date_tolerance_days = tolerance
        .map(u32::try_from)
        .transpose()
        .map_err(|e| corrupt(TABLE, &id, e.to_string()))?;

    Ok(MatchingRule {
        id,
        name,
        conditions: RuleConditions {
            value_range,
            keywords,
            date_tolerance_days,
        },
        priority,
        active,
    })
}

fn corrupt(table: &'static str, id: &str, reason: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        table,
        id: id.to_string(),
        reason: reason.into(),
    }
}

fn decode_date(table: &'static str, id: &str, s: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| corrupt(table, id, e.to_string()))
}

fn decode_amount(table: &'static str, id: &str, s: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(s).map_err(|e| corrupt(table, id, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn test_db() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("test.db")).await.unwrap();
        (dir, pool)
    }

    fn bank(id: &str, d: NaiveDate) -> BankTransaction {
        BankTransaction {
            id: id.to_string(),
            date: d,
            description: "PIX RECEBIDO".to_string(),
            amount: Decimal::new(10050, 2),
            direction: Direction::Credit,
        }
    }

    fn ledger(id: &str, d: NaiveDate, status: &str) -> SystemTransaction {
        SystemTransaction {
            id: id.to_string(),
            date: d,
            description: "Invoice".to_string(),
            amount: Decimal::new(100005, 3),
            category: Category::Revenue,
            status: status.to_string(),
        }
    }

    fn january() -> DateRange {
        DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap()
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let (dir, pool) = test_db().await;
        drop(pool);
        let pool = create_db(&dir.path().join("test.db")).await.unwrap();
        assert!(list_rules(&pool, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bank_transactions_filtered_by_account_and_range() {
        let (_dir, pool) = test_db().await;
        insert_bank_transaction(&pool, "acct-1", &bank("b2", date(2024, 1, 20))).await.unwrap();
        insert_bank_transaction(&pool, "acct-1", &bank("b1", date(2024, 1, 5))).await.unwrap();
        insert_bank_transaction(&pool, "acct-1", &bank("b3", date(2024, 2, 1))).await.unwrap();
        insert_bank_transaction(&pool, "acct-2", &bank("b4", date(2024, 1, 6))).await.unwrap();

        let rows = list_bank_transactions(&pool, "acct-1", january()).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b1", "b2"]);
        assert_eq!(rows[0], bank("b1", date(2024, 1, 5)));
    }

    #[tokio::test]
    async fn ledger_entries_filtered_by_status() {
        let (_dir, pool) = test_db().await;
        insert_ledger_entry(&pool, "co", &ledger("s1", date(2024, 1, 3), "pending")).await.unwrap();
        insert_ledger_entry(&pool, "co", &ledger("s2", date(2024, 1, 4), "settled")).await.unwrap();
        insert_ledger_entry(&pool, "co", &ledger("s3", date(2024, 1, 5), "void")).await.unwrap();

        let all = list_ledger_entries(&pool, "co", january(), &[]).await.unwrap();
        assert_eq!(all.len(), 3);
        // Sub-cent precision survives the text column.
        assert_eq!(all[0].amount, Decimal::new(100005, 3));

        let statuses = vec!["pending".to_string(), "settled".to_string()];
        let some = list_ledger_entries(&pool, "co", january(), &statuses).await.unwrap();
        let ids: Vec<&str> = some.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
    }

    #[tokio::test]
    async fn rules_round_trip_and_filter_active() {
        let (_dir, pool) = test_db().await;
        let pix = MatchingRule {
            id: "pix".to_string(),
            name: "PIX".to_string(),
            conditions: RuleConditions {
                value_range: Some(ValueRange { min: Decimal::from(10), max: Decimal::from(900) }),
                keywords: Some(vec!["PIX".to_string(), "TED".to_string()]),
                date_tolerance_days: Some(2),
            },
            priority: 2,
            active: true,
        };
        let off = MatchingRule {
            id: "off".to_string(),
            name: "Disabled".to_string(),
            conditions: RuleConditions::default(),
            priority: 1,
            active: false,
        };
        save_rule(&pool, &pix).await.unwrap();
        save_rule(&pool, &off).await.unwrap();

        let all = list_rules(&pool, false).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "off");
        assert_eq!(all[1], pix);

        let active = list_rules(&pool, true).await.unwrap();
        assert_eq!(active, vec![pix]);
    }

    #[tokio::test]
    async fn failed_batch_leaves_nothing_behind() {
        let (_dir, pool) = test_db().await;
        sqlx::query(
            "CREATE TRIGGER refuse_broken BEFORE INSERT ON ledger_entries WHEN NEW.id = 'broken' BEGIN SELECT RAISE(ABORT, 'refused'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let entries = vec![
            ledger("s1", date(2024, 1, 3), "pending"),
            ledger("broken", date(2024, 1, 4), "pending"),
        ];
        let err = insert_ledger_entries(&pool, "co", &entries).await.unwrap_err();
        assert!(matches!(err, StorageError::Db(_)));
        assert!(list_ledger_entries(&pool, "co", january(), &[]).await.unwrap().is_empty());

        let count = insert_ledger_entries(&pool, "co", &entries[..1]).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(list_ledger_entries(&pool, "co", january(), &[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bank_batch_is_committed() {
        let (_dir, pool) = test_db().await;
        let txs = vec![bank("b1", date(2024, 1, 5)), bank("b2", date(2024, 1, 6))];
        assert_eq!(insert_bank_transactions(&pool, "acct-1", &txs).await.unwrap(), 2);
        assert_eq!(list_bank_transactions(&pool, "acct-1", january()).await.unwrap(), txs);
    }

    #[tokio::test]
    async fn empty_keyword_list_round_trips() {
        let (_dir, pool) = test_db().await;
        let rule = MatchingRule {
            id: "r".to_string(),
            name: "No keywords".to_string(),
            conditions: RuleConditions {
                keywords: Some(vec![]),
                ..RuleConditions::default()
            },
            priority: 1,
            active: true,
        };
        save_rule(&pool, &rule).await.unwrap();
        assert_eq!(list_rules(&pool, false).await.unwrap(), vec![rule]);
    }

    #[tokio::test]
    async fn corrupt_amount_is_reported() {
        let (_dir, pool) = test_db().await;
        sqlx::query(
            "INSERT INTO bank_transactions (id, account_id, date, description, amount, direction) VALUES ('bad', 'a', '2024-01-10', 'x', 'ten', 'credit')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = list_bank_transactions(&pool, "a", january()).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { table: "bank_transactions", .. }));
    }
}
