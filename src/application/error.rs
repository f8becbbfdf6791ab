use thiserror::Error;

use crate::domain::{AccountId, Cents, Currency, RuleViolation, TransferId};

// SQLite primary result codes; extended codes keep them in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Currency mismatch: requested {requested}, sender holds {sender}, receiver holds {receiver}")]
    CurrencyMismatch {
        requested: Currency,
        sender: Currency,
        receiver: Currency,
    },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    #[error("Sender and receiver are the same account: {0}")]
    SameAccount(AccountId),

    #[error("User {user} is not the owner of account {account_id}")]
    Unauthorized { user: String, account_id: AccountId },

    #[error("Duplicate transfer request, already committed as {existing}")]
    DuplicateTransfer { existing: TransferId },

    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(anyhow::Error),
}

impl AppError {
    /// Infrastructure failures a caller may retry; business failures never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::TransactionConflict(_) | AppError::StoreUnavailable(_)
        )
    }
}

impl From<RuleViolation> for AppError {
    fn from(violation: RuleViolation) -> Self {
        match violation {
            RuleViolation::NonPositiveAmount(amount) => {
                AppError::InvalidAmount(format!("amount must be positive, got {}", amount))
            }
            RuleViolation::SameAccount(id) => AppError::SameAccount(id),
            RuleViolation::CurrencyMismatch {
                requested,
                sender,
                receiver,
            } => AppError::CurrencyMismatch {
                requested,
                sender,
                receiver,
            },
            RuleViolation::InsufficientFunds {
                account_id,
                balance,
                required,
            } => AppError::InsufficientFunds {
                account_id,
                balance,
                required,
            },
            RuleViolation::BalanceOverflow {
                account_id,
                balance,
                amount,
            } => AppError::InvalidAmount(format!(
                "crediting {} to account {} would overflow its balance of {}",
                amount, account_id, balance
            )),
        }
    }
}

/// Storage errors arrive as `anyhow::Error` with context attached; sort them by
/// the `sqlx::Error` underneath.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() else {
            return AppError::Database(err);
        };

        match sqlx_err {
            sqlx::Error::Database(db_err) => {
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => {
                        AppError::TransactionConflict(format!("{:#}", err))
                    }
                    _ => AppError::Database(err),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::StoreUnavailable(format!("{:#}", err))
            }
            _ => AppError::Database(err),
        }
    }
}
