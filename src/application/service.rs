use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::domain::{
    Account, AccountId, Cents, Currency, Entry, Transfer, TransferId, TransferReceipt,
    TransferRequest, check_request_shape,
};
use crate::storage::{LedgerTotals, Repository};

use super::{AppError, TransferExecutor, TransferValidator};

/// Application service providing the banking operations.
/// This is the primary interface for any client (CLI, API, tests).
///
/// Holds no account state of its own; it is cheap to clone and safe to share
/// between concurrently running transfers.
#[derive(Clone)]
pub struct BankService {
    repo: Repository,
}

/// A committed transfer together with its two ledger legs.
pub struct TransferDetails {
    pub transfer: Transfer,
    pub entries: Vec<Entry>,
}

/// Result of checking the ledger's bookkeeping invariants.
pub struct IntegrityReport {
    pub totals: LedgerTotals,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        let totals = &self.totals;
        totals.entry_sum == 0
            && totals.entry_count == totals.transfer_count * 2
            && totals.unbalanced_transfers == 0
            && totals.negative_accounts == 0
    }
}

impl BankService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create (if needed) and migrate the database, then connect.
    pub async fn init(config: &StoreConfig) -> Result<Self, AppError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(config, false).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new account. Balances start at `opening_balance` and afterwards
    /// change only through transfers.
    pub async fn open_account(
        &self,
        owner: &str,
        currency_code: &str,
        opening_balance: Cents,
    ) -> Result<Account, AppError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(AppError::InvalidOwner("owner must not be empty".to_string()));
        }
        let currency = Currency::from_code(currency_code)
            .ok_or_else(|| AppError::UnsupportedCurrency(currency_code.to_string()))?;
        if opening_balance < 0 {
            return Err(AppError::InvalidAmount(
                "Opening balance cannot be negative".to_string(),
            ));
        }

        let account = Account::new(owner, currency).with_opening_balance(opening_balance);
        self.repo.save_account(&account).await?;

        info!(account_id = %account.id, owner, currency = %currency, "account opened");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }

    /// The account's audit trail in the order entries were written.
    pub async fn account_entries(&self, id: AccountId) -> Result<Vec<Entry>, AppError> {
        let account = self.get_account(id).await?;
        Ok(self.repo.entries_for_account(account.id).await?)
    }

    // ========================
    // Transfer operations
    // ========================

    /// Move money between two accounts.
    ///
    /// Runs the pre-lock validation first so obviously bad requests fail without
    /// touching any lock, then hands off to the [`TransferExecutor`], which
    /// re-checks funds under lock and writes everything atomically.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, AppError> {
        check_request_shape(&request)?;

        let validated = TransferValidator::new(&self.repo).validate(&request).await?;
        debug!(
            sender_balance = validated.sender.balance,
            receiver_balance = validated.receiver.balance,
            "pre-lock validation passed"
        );

        if let Some(user) = &request.initiated_by {
            if *user != validated.sender.owner {
                return Err(AppError::Unauthorized {
                    user: user.clone(),
                    account_id: validated.sender.id,
                });
            }
        }

        TransferExecutor::new(&self.repo).execute(&request).await
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<TransferDetails, AppError> {
        let transfer = self
            .repo
            .get_transfer(id)
            .await?
            .ok_or(AppError::TransferNotFound(id))?;
        let entries = self.repo.entries_for_transfer(id).await?;
        Ok(TransferDetails { transfer, entries })
    }

    // ========================
    // Integrity operations
    // ========================

    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let totals = self.repo.ledger_totals().await?;
        Ok(IntegrityReport { totals })
    }
}
