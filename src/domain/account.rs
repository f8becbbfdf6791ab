use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, Currency};

pub type AccountId = Uuid;

/// A balance-holding account owned by one user and denominated in one currency.
/// The currency is fixed at creation; the balance only changes through transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Username of the controlling user
    pub owner: String,
    /// Current balance in minor units, never negative
    pub balance: Cents,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(owner: impl Into<String>, currency: Currency) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            balance: 0,
            currency,
            created_at: Utc::now(),
        }
    }

    pub fn with_opening_balance(mut self, balance: Cents) -> Self {
        assert!(balance >= 0, "Opening balance cannot be negative");
        self.balance = balance;
        self
    }

    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}
