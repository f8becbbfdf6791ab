mod common;

use anyhow::Result;
use bankledger::application::{AppError, TransferExecutor};
use bankledger::domain::{Currency, TransferRequest};
use common::{assert_ledger_healthy, balance_of, standard_pair, test_service, usd_account};
use uuid::Uuid;

#[tokio::test]
async fn test_transfer_moves_money_and_writes_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    let receipt = service
        .transfer(TransferRequest::new(a.id, b.id, 300, Currency::Usd))
        .await?;

    assert_eq!(receipt.sender.id, a.id);
    assert_eq!(receipt.receiver.id, b.id);
    assert_eq!(receipt.sender.balance, 700);
    assert_eq!(receipt.receiver.balance, 800);
    assert_eq!(receipt.transfer.amount, 300);
    assert_eq!(receipt.transfer.sender_id, a.id);
    assert_eq!(receipt.transfer.receiver_id, b.id);

    // Entry symmetry
    assert_eq!(receipt.sender_entry.account_id, a.id);
    assert_eq!(receipt.receiver_entry.account_id, b.id);
    assert_eq!(receipt.sender_entry.amount, -300);
    assert_eq!(receipt.receiver_entry.amount, 300);
    assert_eq!(receipt.sender_entry.transfer_id, receipt.transfer.id);
    assert_eq!(receipt.receiver_entry.transfer_id, receipt.transfer.id);

    // Receipt matches what was persisted
    assert_eq!(balance_of(&service, &a).await?, 700);
    assert_eq!(balance_of(&service, &b).await?, 800);

    let details = service.get_transfer(receipt.transfer.id).await?;
    assert_eq!(details.transfer, receipt.transfer);
    assert_eq!(details.entries.len(), 2);
    assert_eq!(details.entries[0], receipt.sender_entry);
    assert_eq!(details.entries[1], receipt.receiver_entry);

    assert_ledger_healthy(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_conservation_across_a_sequence_of_transfers() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    for (from, to, amount) in [(&a, &b, 300), (&b, &a, 50), (&a, &b, 1), (&b, &a, 799)] {
        let before = balance_of(&service, from).await? + balance_of(&service, to).await?;
        let receipt = service
            .transfer(TransferRequest::new(from.id, to.id, amount, Currency::Usd))
            .await?;
        assert_eq!(receipt.sender.balance + receipt.receiver.balance, before);
        assert_eq!(receipt.sender_entry.amount, -receipt.receiver_entry.amount);
        assert_eq!(receipt.sender_entry.amount, -amount);
    }

    assert_eq!(balance_of(&service, &a).await?, 1000 - 300 + 50 - 1 + 799);
    assert_eq!(balance_of(&service, &b).await?, 500 + 300 - 50 + 1 - 799);
    assert_eq!(service.account_entries(a.id).await?.len(), 4);
    assert_eq!(service.account_entries(b.id).await?.len(), 4);

    assert_ledger_healthy(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_second_transfer_fails_once_balance_is_spent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    service
        .transfer(TransferRequest::new(a.id, b.id, 300, Currency::Usd))
        .await?;

    // Would fit the original balance of 1000, not the current 700
    let result = service
        .transfer(TransferRequest::new(a.id, b.id, 800, Currency::Usd))
        .await;

    match result {
        Err(AppError::InsufficientFunds {
            account_id,
            balance,
            required,
        }) => {
            assert_eq!(account_id, a.id);
            assert_eq!(balance, 700);
            assert_eq!(required, 800);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other.map(|r| r.transfer)),
    }

    assert_eq!(balance_of(&service, &a).await?, 700);
    assert_eq!(balance_of(&service, &b).await?, 800);
    assert_eq!(service.account_entries(a.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_exact_balance_can_be_transferred() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    let receipt = service
        .transfer(TransferRequest::new(a.id, b.id, 1000, Currency::Usd))
        .await?;

    assert_eq!(receipt.sender.balance, 0);
    assert_eq!(receipt.receiver.balance, 1500);
    Ok(())
}

#[tokio::test]
async fn test_executor_rechecks_funds_under_lock() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    // Bypasses the pre-lock validator, as if its snapshot had gone stale
    let executor = TransferExecutor::new(service.repository());
    let result = executor
        .execute(&TransferRequest::new(a.id, b.id, 1001, Currency::Usd))
        .await;

    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));
    assert_eq!(balance_of(&service, &a).await?, 1000);
    assert_eq!(balance_of(&service, &b).await?, 500);

    let totals = service.check_integrity().await?.totals;
    assert_eq!(totals.transfer_count, 0);
    assert_eq!(totals.entry_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_currency_guard() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;
    let euro = service.open_account("carol", "EUR", 1000).await?;

    // Requested currency differs from both accounts
    let result = service
        .transfer(TransferRequest::new(a.id, b.id, 100, Currency::Eur))
        .await;
    assert!(matches!(
        result,
        Err(AppError::CurrencyMismatch {
            requested: Currency::Eur,
            sender: Currency::Usd,
            receiver: Currency::Usd,
        })
    ));

    // Accounts hold different currencies from each other
    let result = service
        .transfer(TransferRequest::new(a.id, euro.id, 100, Currency::Usd))
        .await;
    assert!(matches!(result, Err(AppError::CurrencyMismatch { .. })));

    let result = service
        .transfer(TransferRequest::new(euro.id, a.id, 100, Currency::Eur))
        .await;
    assert!(matches!(result, Err(AppError::CurrencyMismatch { .. })));

    assert_eq!(balance_of(&service, &a).await?, 1000);
    assert_eq!(balance_of(&service, &euro).await?, 1000);
    let totals = service.check_integrity().await?.totals;
    assert_eq!(totals.transfer_count, 0);
    assert_eq!(totals.entry_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_accounts_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a = usd_account(&service, "alice", 1000).await?;
    let ghost = Uuid::new_v4();

    let result = service
        .transfer(TransferRequest::new(a.id, ghost, 100, Currency::Usd))
        .await;
    assert!(matches!(result, Err(AppError::AccountNotFound(id)) if id == ghost));

    let result = service
        .transfer(TransferRequest::new(ghost, a.id, 100, Currency::Usd))
        .await;
    assert!(matches!(result, Err(AppError::AccountNotFound(id)) if id == ghost));

    // The executor reports the same when the row is missing at lock time
    let executor = TransferExecutor::new(service.repository());
    let result = executor
        .execute(&TransferRequest::new(a.id, ghost, 100, Currency::Usd))
        .await;
    assert!(matches!(result, Err(AppError::AccountNotFound(id)) if id == ghost));

    assert_eq!(balance_of(&service, &a).await?, 1000);
    Ok(())
}

#[tokio::test]
async fn test_boundary_rejections_touch_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    for amount in [0, -300] {
        let result = service
            .transfer(TransferRequest::new(a.id, b.id, amount, Currency::Usd))
            .await;
        assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    }

    let result = service
        .transfer(TransferRequest::new(a.id, a.id, 100, Currency::Usd))
        .await;
    assert!(matches!(result, Err(AppError::SameAccount(id)) if id == a.id));

    let executor = TransferExecutor::new(service.repository());
    let result = executor
        .execute(&TransferRequest::new(a.id, a.id, 100, Currency::Usd))
        .await;
    assert!(matches!(result, Err(AppError::SameAccount(_))));

    assert_eq!(balance_of(&service, &a).await?, 1000);
    assert_eq!(service.check_integrity().await?.totals.entry_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_only_the_owner_may_send() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    let result = service
        .transfer(TransferRequest::new(a.id, b.id, 100, Currency::Usd).initiated_by("bob"))
        .await;
    assert!(matches!(
        result,
        Err(AppError::Unauthorized { ref user, account_id }) if user == "bob" && account_id == a.id
    ));
    assert_eq!(balance_of(&service, &a).await?, 1000);

    let receipt = service
        .transfer(TransferRequest::new(a.id, b.id, 100, Currency::Usd).initiated_by("alice"))
        .await?;
    assert_eq!(receipt.sender.balance, 900);
    Ok(())
}

#[tokio::test]
async fn test_idempotency_key_prevents_double_spend() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    let request =
        TransferRequest::new(a.id, b.id, 300, Currency::Usd).with_idempotency_key("order-42");

    let first = service.transfer(request.clone()).await?;
    assert_eq!(first.transfer.idempotency_key.as_deref(), Some("order-42"));

    let retry = service.transfer(request).await;
    match retry {
        Err(AppError::DuplicateTransfer { existing }) => assert_eq!(existing, first.transfer.id),
        other => panic!("expected DuplicateTransfer, got {:?}", other.map(|r| r.transfer)),
    }

    assert_eq!(balance_of(&service, &a).await?, 700);
    assert_eq!(balance_of(&service, &b).await?, 800);

    // A different key is a different request
    let request =
        TransferRequest::new(a.id, b.id, 300, Currency::Usd).with_idempotency_key("order-43");
    service.transfer(request).await?;
    assert_eq!(balance_of(&service, &a).await?, 400);

    assert_ledger_healthy(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_store_failure_mid_transfer_leaves_no_trace() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (a, b) = standard_pair(&service).await?;

    // Fail the first real balance change: after the transfer row and both
    // entries are written, before any balance moves. The no-op lock write keeps
    // the balance equal and passes through.
    sqlx::query(
        r#"
        CREATE TRIGGER fail_balance_update
        BEFORE UPDATE OF balance ON accounts
        WHEN NEW.balance <> OLD.balance
        BEGIN
            SELECT RAISE(ABORT, 'injected store failure');
        END
        "#,
    )
    .execute(service.repository().pool())
    .await?;

    let result = service
        .transfer(TransferRequest::new(a.id, b.id, 300, Currency::Usd))
        .await;
    let err = result.expect_err("transfer should fail");
    assert!(matches!(err, AppError::Database(_)), "unexpected error: {err}");
    assert!(!err.is_retryable());

    let totals = service.check_integrity().await?.totals;
    assert_eq!(totals.transfer_count, 0);
    assert_eq!(totals.entry_count, 0);
    assert!(service.account_entries(a.id).await?.is_empty());
    assert!(service.account_entries(b.id).await?.is_empty());
    assert_eq!(balance_of(&service, &a).await?, 1000);
    assert_eq!(balance_of(&service, &b).await?, 500);

    // Once the fault is gone the same transfer goes through
    sqlx::query("DROP TRIGGER fail_balance_update")
        .execute(service.repository().pool())
        .await?;
    let receipt = service
        .transfer(TransferRequest::new(a.id, b.id, 300, Currency::Usd))
        .await?;
    assert_eq!(receipt.sender.balance, 700);
    assert_ledger_healthy(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_get_transfer_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let missing = Uuid::new_v4();

    let result = service.get_transfer(missing).await;
    assert!(matches!(result, Err(AppError::TransferNotFound(id)) if id == missing));
    Ok(())
}

#[tokio::test]
async fn test_credit_overflowing_receiver_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let rich = usd_account(&service, "rich", i64::MAX - 10).await?;
    let poor = usd_account(&service, "poor", 100).await?;

    let result = service
        .transfer(TransferRequest::new(poor.id, rich.id, 100, Currency::Usd))
        .await;
    assert!(matches!(result, Err(AppError::InvalidAmount(_))));

    assert_eq!(balance_of(&service, &rich).await?, i64::MAX - 10);
    assert_eq!(balance_of(&service, &poor).await?, 100);
    let totals = service.check_integrity().await?.totals;
    assert_eq!(totals.transfer_count, 0);
    assert_eq!(totals.entry_count, 0);

    // Up to the limit is fine
    let receipt = service
        .transfer(TransferRequest::new(poor.id, rich.id, 10, Currency::Usd))
        .await?;
    assert_eq!(receipt.receiver.balance, i64::MAX);
    Ok(())
}

#[tokio::test]
async fn test_store_rejects_non_integer_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let rich = usd_account(&service, "rich", i64::MAX - 10).await?;

    // SQLite widens an overflowing sum to REAL; the schema refuses to store it
    let result = sqlx::query("UPDATE accounts SET balance = balance + 100 WHERE id = ?")
        .bind(rich.id.to_string())
        .execute(service.repository().pool())
        .await;
    assert!(result.is_err());

    let stored = service.get_account(rich.id).await?;
    assert_eq!(stored.balance, i64::MAX - 10);
    Ok(())
}
