use anyhow::{Context, Result};
use sqlx::{Sqlite, Transaction};

use crate::domain::{Account, AccountId, Cents, Entry, Transfer};

use super::repository::{
    ACCOUNT_COLUMNS, ENTRY_COLUMNS, TRANSFER_COLUMNS, row_to_account, row_to_entry,
    row_to_transfer,
};

/// One atomic unit against the store.
///
/// Wraps a single database transaction. Dropping a unit without calling
/// [`UnitOfWork::commit`] rolls it back, so an early return or a cancelled task
/// never leaves writes behind.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(super) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    /// Locking read (`get-for-update`).
    ///
    /// SQLite has no `SELECT ... FOR UPDATE`; a no-op write on the row takes the
    /// write lock instead and holds it until commit or rollback. A competing unit
    /// blocks here until then (up to the configured busy timeout) and afterwards
    /// reads the committed balance. Returns `None` if the account does not exist.
    pub async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "UPDATE accounts SET balance = balance WHERE id = ? RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to lock account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn find_transfer_by_key(&mut self, key: &str) -> Result<Option<Transfer>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE idempotency_key = ?"
        ))
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to look up idempotency key")?;

        row.as_ref().map(row_to_transfer).transpose()
    }

    pub async fn insert_transfer(&mut self, transfer: &Transfer) -> Result<Transfer> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO transfers (id, sender_id, receiver_id, amount, idempotency_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {TRANSFER_COLUMNS}
            "#
        ))
        .bind(transfer.id.to_string())
        .bind(transfer.sender_id.to_string())
        .bind(transfer.receiver_id.to_string())
        .bind(transfer.amount)
        .bind(&transfer.idempotency_key)
        .bind(transfer.created_at.to_rfc3339())
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to insert transfer")?;

        row_to_transfer(&row)
    }

    pub async fn insert_entry(&mut self, entry: &Entry) -> Result<Entry> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO entries (id, account_id, transfer_id, amount, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.id.to_string())
        .bind(entry.account_id.to_string())
        .bind(entry.transfer_id.to_string())
        .bind(entry.amount)
        .bind(entry.created_at.to_rfc3339())
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to insert entry")?;

        row_to_entry(&row)
    }

    /// Add `delta` to a locked account's balance and return the updated row.
    pub async fn apply_delta(&mut self, id: AccountId, delta: Cents) -> Result<Account> {
        let row = sqlx::query(&format!(
            "UPDATE accounts SET balance = balance + ? WHERE id = ? RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(delta)
        .bind(id.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to update balance")?;

        row_to_account(&row)
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back transaction")
    }
}
