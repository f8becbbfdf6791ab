//! Pure transfer rules shared by the pre-lock validator and the atomic executor.

use std::fmt;

use super::{Account, AccountId, Cents, Currency, TransferRequest};

/// The order in which a transfer locks its two accounts.
/// Ascending by id regardless of which side sends, so two transfers over the same
/// pair in opposite directions always queue on the same first lock.
pub fn lock_order(a: AccountId, b: AccountId) -> [AccountId; 2] {
    if a <= b { [a, b] } else { [b, a] }
}

/// Checks that need no stored state: positive amount, distinct accounts.
pub fn check_request_shape(request: &TransferRequest) -> Result<(), RuleViolation> {
    if request.amount <= 0 {
        return Err(RuleViolation::NonPositiveAmount(request.amount));
    }
    if request.sender_id == request.receiver_id {
        return Err(RuleViolation::SameAccount(request.sender_id));
    }
    Ok(())
}

/// Both accounts must hold the requested currency.
pub fn check_currencies(
    sender: &Account,
    receiver: &Account,
    requested: Currency,
) -> Result<(), RuleViolation> {
    if sender.currency != requested || receiver.currency != requested {
        return Err(RuleViolation::CurrencyMismatch {
            requested,
            sender: sender.currency,
            receiver: receiver.currency,
        });
    }
    Ok(())
}

pub fn check_funds(sender: &Account, amount: Cents) -> Result<(), RuleViolation> {
    if !sender.can_cover(amount) {
        return Err(RuleViolation::InsufficientFunds {
            account_id: sender.id,
            balance: sender.balance,
            required: amount,
        });
    }
    Ok(())
}

/// The receiver's balance must stay representable after the credit.
pub fn check_credit(receiver: &Account, amount: Cents) -> Result<(), RuleViolation> {
    if receiver.balance.checked_add(amount).is_none() {
        return Err(RuleViolation::BalanceOverflow {
            account_id: receiver.id,
            balance: receiver.balance,
            amount,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    NonPositiveAmount(Cents),
    SameAccount(AccountId),
    CurrencyMismatch {
        requested: Currency,
        sender: Currency,
        receiver: Currency,
    },
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },
    BalanceOverflow {
        account_id: AccountId,
        balance: Cents,
        amount: Cents,
    },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::NonPositiveAmount(amount) => {
                write!(f, "transfer amount must be positive, got {}", amount)
            }
            RuleViolation::SameAccount(id) => {
                write!(f, "account {} cannot transfer to itself", id)
            }
            RuleViolation::CurrencyMismatch {
                requested,
                sender,
                receiver,
            } => write!(
                f,
                "requested {} but sender holds {} and receiver holds {}",
                requested, sender, receiver
            ),
            RuleViolation::InsufficientFunds {
                account_id,
                balance,
                required,
            } => write!(
                f,
                "account {} has {} cents, {} required",
                account_id, balance, required
            ),
            RuleViolation::BalanceOverflow {
                account_id,
                balance,
                amount,
            } => write!(
                f,
                "crediting {} cents to account {} (balance {}) overflows",
                amount, account_id, balance
            ),
        }
    }
}

impl std::error::Error for RuleViolation {}
