// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use bankledger::application::BankService;
use bankledger::config::StoreConfig;
use bankledger::domain::{Account, Cents};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StoreConfig::new(db_path.to_str().unwrap()).with_max_connections(8);
    let service = BankService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Helper to create a test service whose units give up quickly on a held lock
pub async fn test_service_with_busy_timeout(timeout: Duration) -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StoreConfig::new(db_path.to_str().unwrap())
        .with_max_connections(8)
        .with_busy_timeout(timeout);
    let service = BankService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Open a USD account for `owner` with the given opening balance
pub async fn usd_account(service: &BankService, owner: &str, balance: Cents) -> Result<Account> {
    Ok(service.open_account(owner, "USD", balance).await?)
}

/// Test fixture: the canonical pair, A with 1000 and B with 500, both USD
pub async fn standard_pair(service: &BankService) -> Result<(Account, Account)> {
    let a = usd_account(service, "alice", 1000).await?;
    let b = usd_account(service, "bob", 500).await?;
    Ok((a, b))
}

/// Current balance of an account as stored
pub async fn balance_of(service: &BankService, account: &Account) -> Result<Cents> {
    Ok(service.get_account(account.id).await?.balance)
}

/// Assert the whole-ledger bookkeeping invariants hold
pub async fn assert_ledger_healthy(service: &BankService) -> Result<()> {
    let report = service.check_integrity().await?;
    assert!(
        report.is_healthy(),
        "ledger invariants violated: {:?}",
        report.totals
    );
    Ok(())
}
