use crate::domain::{Account, AccountId, TransferRequest, check_currencies, check_funds};
use crate::storage::Repository;

use super::AppError;

/// Sender and receiver as they looked when the request was validated.
#[derive(Debug, Clone)]
pub struct ValidatedTransfer {
    pub sender: Account,
    pub receiver: Account,
}

/// Fail-fast checks run before any lock is taken.
///
/// Reads are plain and may be stale by the time the executor locks the rows; the
/// executor re-checks funds under the lock. Abandoning a request at this stage
/// has no side effects.
pub struct TransferValidator<'a> {
    repo: &'a Repository,
}

impl<'a> TransferValidator<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    pub async fn validate(&self, request: &TransferRequest) -> Result<ValidatedTransfer, AppError> {
        let sender = self.load(request.sender_id).await?;
        let receiver = self.load(request.receiver_id).await?;

        check_currencies(&sender, &receiver, request.currency)?;
        check_funds(&sender, request.amount)?;

        Ok(ValidatedTransfer { sender, receiver })
    }

    async fn load(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }
}
