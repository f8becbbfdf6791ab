use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::domain::{Account, AccountId, Cents, Currency, Entry, Transfer, TransferId};

use super::{MIGRATION_001_INITIAL, UnitOfWork};

pub(super) const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
pub(super) const ENTRY_COLUMNS: &str = "id, account_id, transfer_id, amount, created_at";
pub(super) const TRANSFER_COLUMNS: &str =
    "id, sender_id, receiver_id, amount, idempotency_key, created_at";

/// Whole-ledger figures for integrity verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTotals {
    pub account_count: i64,
    pub transfer_count: i64,
    pub entry_count: i64,
    /// Sum of every entry; zero when no money was created or destroyed
    pub entry_sum: Cents,
    /// Transfers that do not have exactly two entries summing to zero
    pub unbalanced_transfers: i64,
    pub negative_accounts: i64,
}

/// Repository for accounts, ledger entries and transfers.
/// Plain reads go straight to the pool; everything a transfer writes goes through a
/// [`UnitOfWork`] opened with [`Repository::begin`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool against the configured database file.
    /// WAL lets plain reads proceed while a transfer holds the write lock.
    pub async fn connect(config: &StoreConfig, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.database))
            .with_context(|| format!("Invalid database path: {}", config.database))?
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout())
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let repo = Self::connect(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open an atomic unit of work. It rolls back unless explicitly committed.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        Ok(UnitOfWork::new(tx))
    }

    // ========================
    // Account operations
    // ========================

    pub async fn save_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner, balance, currency, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.owner)
        .bind(account.balance)
        .bind(account.currency.as_str())
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Non-locking read. The result may be stale by the time a transfer locks the row.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    // ========================
    // Audit trail reads
    // ========================

    pub async fn get_transfer(&self, id: TransferId) -> Result<Option<Transfer>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transfer")?;

        row.as_ref().map(row_to_transfer).transpose()
    }

    /// Entries for one account in the order they were written.
    pub async fn entries_for_account(&self, account_id: AccountId) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = ? ORDER BY rowid"
        ))
        .bind(account_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list entries for account")?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Both legs of a transfer, debit first.
    pub async fn entries_for_transfer(&self, transfer_id: TransferId) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE transfer_id = ? ORDER BY amount"
        ))
        .bind(transfer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list entries for transfer")?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Aggregate figures over the whole ledger, used by integrity checks.
    pub async fn ledger_totals(&self) -> Result<LedgerTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts) AS account_count,
                (SELECT COUNT(*) FROM transfers) AS transfer_count,
                (SELECT COUNT(*) FROM entries) AS entry_count,
                (SELECT COALESCE(SUM(amount), 0) FROM entries) AS entry_sum,
                (SELECT COUNT(*) FROM transfers t
                    WHERE (SELECT COUNT(*) FROM entries e WHERE e.transfer_id = t.id) <> 2
                       OR (SELECT SUM(amount) FROM entries e WHERE e.transfer_id = t.id) <> 0
                ) AS unbalanced_transfers,
                (SELECT COUNT(*) FROM accounts WHERE balance < 0) AS negative_accounts
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute ledger totals")?;

        Ok(LedgerTotals {
            account_count: column(&row, "account_count")?,
            transfer_count: column(&row, "transfer_count")?,
            entry_count: column(&row, "entry_count")?,
            entry_sum: column(&row, "entry_sum")?,
            unbalanced_transfers: column(&row, "unbalanced_transfers")?,
            negative_accounts: column(&row, "negative_accounts")?,
        })
    }
}

// ========================
// Row mapping
// ========================

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {} timestamp", field))?
        .with_timezone(&Utc))
}

fn parse_id(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid {}", field))
}

/// Read one column, turning a type mismatch into an error instead of a panic.
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .with_context(|| format!("Invalid value in column {}", name))
}

pub(super) fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let id_str: String = column(row, "id")?;
    let currency_str: String = column(row, "currency")?;
    let created_at_str: String = column(row, "created_at")?;

    Ok(Account {
        id: parse_id(&id_str, "account ID")?,
        owner: column(row, "owner")?,
        balance: column(row, "balance")?,
        currency: Currency::from_code(&currency_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid currency: {}", currency_str))?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
    })
}

pub(super) fn row_to_entry(row: &SqliteRow) -> Result<Entry> {
    let id_str: String = column(row, "id")?;
    let account_id_str: String = column(row, "account_id")?;
    let transfer_id_str: String = column(row, "transfer_id")?;
    let created_at_str: String = column(row, "created_at")?;

    Ok(Entry {
        id: parse_id(&id_str, "entry ID")?,
        account_id: parse_id(&account_id_str, "entry account ID")?,
        transfer_id: parse_id(&transfer_id_str, "entry transfer ID")?,
        amount: column(row, "amount")?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
    })
}

pub(super) fn row_to_transfer(row: &SqliteRow) -> Result<Transfer> {
    let id_str: String = column(row, "id")?;
    let sender_str: String = column(row, "sender_id")?;
    let receiver_str: String = column(row, "receiver_id")?;
    let created_at_str: String = column(row, "created_at")?;

    Ok(Transfer {
        id: parse_id(&id_str, "transfer ID")?,
        sender_id: parse_id(&sender_str, "sender ID")?,
        receiver_id: parse_id(&receiver_str, "receiver ID")?,
        amount: column(row, "amount")?,
        idempotency_key: column(row, "idempotency_key")?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
    })
}
