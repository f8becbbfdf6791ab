use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents, TransferId};

pub type EntryId = Uuid;

/// One leg of a transfer as seen by a single account: a signed balance delta.
/// Entries are append-only; a committed transfer always has exactly two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    /// The transfer this leg belongs to
    pub transfer_id: TransferId,
    /// Negative for a debit, positive for a credit
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn debit(account_id: AccountId, transfer_id: TransferId, amount: Cents) -> Self {
        Self::new(account_id, transfer_id, -amount)
    }

    pub fn credit(account_id: AccountId, transfer_id: TransferId, amount: Cents) -> Self {
        Self::new(account_id, transfer_id, amount)
    }

    fn new(account_id: AccountId, transfer_id: TransferId, amount: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            transfer_id,
            amount,
            created_at: Utc::now(),
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}
