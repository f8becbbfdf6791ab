use tracing::{debug, info, warn};

use crate::domain::{
    Account, AccountId, Transfer, TransferReceipt, TransferRequest, check_credit, check_currencies,
    check_funds, check_request_shape, lock_order,
};
use crate::storage::{Repository, UnitOfWork};

use super::AppError;

/// Where a transfer is in its atomic section. Any phase before `Committed` can
/// exit to `RolledBack`.
///
/// Funds are re-checked at `LockedBoth` rather than between the two locks;
/// nothing is written before both are held, so the outcome is the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Opened,
    LockedFirst,
    LockedBoth,
    EntriesWritten,
    BalancesUpdated,
    Committed,
    RolledBack,
}

/// Moves money between two accounts as one atomic unit.
///
/// Per call: exactly one transfer row, two entries and two balance updates on
/// success, nothing on failure. Infrastructure errors are surfaced as-is; retry
/// policy belongs to the caller.
pub struct TransferExecutor<'a> {
    repo: &'a Repository,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    #[tracing::instrument(
        name = "transfer",
        skip_all,
        fields(
            sender = %request.sender_id,
            receiver = %request.receiver_id,
            amount = request.amount,
            currency = %request.currency
        )
    )]
    pub async fn execute(&self, request: &TransferRequest) -> Result<TransferReceipt, AppError> {
        // Contract violations never reach the store.
        check_request_shape(request)?;

        let mut uow = self.repo.begin().await?;
        debug!(phase = ?TransferPhase::Opened);

        let outcome = Self::apply(&mut uow, request).await;
        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    // The connection discards the open transaction when returned to the pool.
                    warn!(error = %format!("{:#}", rollback_err), "rollback failed");
                }
                warn!(phase = ?TransferPhase::RolledBack, error = %err, "transfer aborted");
                return Err(err);
            }
        };

        if let Err(err) = uow.commit().await {
            warn!(
                phase = ?TransferPhase::RolledBack,
                error = %format!("{:#}", err),
                "commit failed"
            );
            return Err(err.into());
        }

        info!(
            phase = ?TransferPhase::Committed,
            transfer_id = %receipt.transfer.id,
            sender_balance = receipt.sender.balance,
            receiver_balance = receipt.receiver.balance,
            "transfer committed"
        );
        Ok(receipt)
    }

    async fn apply(
        uow: &mut UnitOfWork,
        request: &TransferRequest,
    ) -> Result<TransferReceipt, AppError> {
        let [first, second] = lock_order(request.sender_id, request.receiver_id);

        let first_locked = Self::lock(uow, first).await?;
        debug!(phase = ?TransferPhase::LockedFirst, account = %first);
        let second_locked = Self::lock(uow, second).await?;
        debug!(phase = ?TransferPhase::LockedBoth, account = %second);

        let (sender, receiver) = if first == request.sender_id {
            (first_locked, second_locked)
        } else {
            (second_locked, first_locked)
        };

        // Balances seen here are current: no other unit can change them until we finish.
        check_currencies(&sender, &receiver, request.currency)?;
        check_funds(&sender, request.amount)?;
        check_credit(&receiver, request.amount)?;

        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = uow.find_transfer_by_key(key).await? {
                return Err(AppError::DuplicateTransfer {
                    existing: existing.id,
                });
            }
        }

        let transfer = Transfer::new(sender.id, receiver.id, request.amount)
            .with_idempotency_key(request.idempotency_key.clone());
        let transfer = uow.insert_transfer(&transfer).await?;

        let (debit, credit) = transfer.legs();
        let sender_entry = uow.insert_entry(&debit).await?;
        let receiver_entry = uow.insert_entry(&credit).await?;
        debug!(phase = ?TransferPhase::EntriesWritten);

        let sender = uow.apply_delta(sender.id, sender_entry.amount).await?;
        let receiver = uow.apply_delta(receiver.id, receiver_entry.amount).await?;
        debug!(phase = ?TransferPhase::BalancesUpdated);

        Ok(TransferReceipt {
            transfer,
            sender,
            receiver,
            sender_entry,
            receiver_entry,
        })
    }

    async fn lock(uow: &mut UnitOfWork, id: AccountId) -> Result<Account, AppError> {
        uow.lock_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }
}
