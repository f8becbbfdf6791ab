use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Account, AccountId, Cents, Currency, Entry};

pub type TransferId = Uuid;

/// A committed movement of `amount` from the sender account to the receiver account.
/// Transfers are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    /// Magnitude moved, always positive
    pub amount: Cents,
    /// Client-supplied key that makes a retried request safe to resubmit
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(sender_id: AccountId, receiver_id: AccountId, amount: Cents) -> Self {
        assert!(amount > 0, "Transfer amount must be positive");
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            amount,
            idempotency_key: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// The two ledger legs of this transfer: sender debit first, receiver credit second.
    pub fn legs(&self) -> (Entry, Entry) {
        (
            Entry::debit(self.sender_id, self.id, self.amount),
            Entry::credit(self.receiver_id, self.id, self.amount),
        )
    }
}

/// What a caller asks for when moving money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Cents,
    pub currency: Currency,
    /// Authenticated username on whose behalf the transfer runs, if known
    pub initiated_by: Option<String>,
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Cents,
        currency: Currency,
    ) -> Self {
        Self {
            sender_id,
            receiver_id,
            amount,
            currency,
            initiated_by: None,
            idempotency_key: None,
        }
    }

    pub fn initiated_by(mut self, owner: impl Into<String>) -> Self {
        self.initiated_by = Some(owner.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Everything a successful transfer wrote, as observed at commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer: Transfer,
    pub sender: Account,
    pub receiver: Account,
    pub sender_entry: Entry,
    pub receiver_entry: Entry,
}
