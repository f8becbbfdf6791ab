use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{BankService, TransferDetails};
use crate::config::StoreConfig;
use crate::domain::{
    Account, Currency, Entry, TransferReceipt, TransferRequest, format_cents, parse_cents,
};

/// Bankledger - accounts and atomic funds transfers
#[derive(Parser)]
#[command(name = "bankledger")]
#[command(about = "A banking ledger with a double-entry audit trail")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreConfig,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money from one account to another
    Transfer {
        /// Amount to transfer (e.g., "300.00" or "300")
        amount: String,

        /// Sender account ID
        #[arg(long)]
        from: String,

        /// Receiver account ID
        #[arg(long)]
        to: String,

        /// Currency code both accounts must hold (USD, EUR, IDR)
        #[arg(short, long)]
        currency: String,

        /// Run the transfer on behalf of this owner; rejected unless they own the sender
        #[arg(long = "as")]
        initiated_by: Option<String>,

        /// Idempotency key; resubmitting the same key never moves money twice
        #[arg(short, long)]
        key: Option<String>,

        /// Print the full receipt as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a committed transfer and its ledger entries
    #[command(name = "show")]
    ShowTransfer {
        /// Transfer ID
        id: String,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Owner username
        owner: String,

        /// Currency code (USD, EUR, IDR)
        #[arg(short, long)]
        currency: String,

        /// Opening balance (defaults to 0)
        #[arg(short, long)]
        balance: Option<String>,
    },

    /// Show account details
    Show {
        /// Account ID
        id: String,
    },

    /// List the account's ledger entries
    Entries {
        /// Account ID
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                BankService::init(&self.store).await?;
                println!("Database initialized: {}", self.store.database);
            }

            Commands::Account(account_cmd) => {
                let service = BankService::connect(&self.store).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                currency,
                initiated_by,
                key,
                json,
            } => {
                let service = BankService::connect(&self.store).await?;
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '300.00' or '300'")?;
                let currency = Currency::from_code(&currency)
                    .with_context(|| format!("Unsupported currency '{}'", currency))?;

                let mut request =
                    TransferRequest::new(parse_id(&from)?, parse_id(&to)?, amount, currency);
                if let Some(owner) = initiated_by {
                    request = request.initiated_by(owner);
                }
                if let Some(key) = key {
                    request = request.with_idempotency_key(key);
                }

                let receipt = service.transfer(request).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&receipt)?);
                } else {
                    print_receipt(&receipt);
                }
            }

            Commands::ShowTransfer { id } => {
                let service = BankService::connect(&self.store).await?;
                let details = service.get_transfer(parse_id(&id)?).await?;
                print_transfer_details(&details);
            }

            Commands::Check => {
                let service = BankService::connect(&self.store).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim())
        .with_context(|| format!("Invalid ID '{}' (expected UUID)", input))
}

async fn run_account_command(service: &BankService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open {
            owner,
            currency,
            balance,
        } => {
            let opening_balance = balance
                .map(|b| parse_cents(&b))
                .transpose()
                .context("Invalid opening balance format")?
                .unwrap_or(0);

            let account = service
                .open_account(&owner, &currency, opening_balance)
                .await?;
            println!("Opened account: {} ({})", account.id, account.currency);
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(parse_id(&id)?).await?;
            print_account(&account);
        }

        AccountCommands::Entries { id } => {
            let entries = service.account_entries(parse_id(&id)?).await?;
            if entries.is_empty() {
                println!("No entries found.");
            } else {
                println!("{:<20} {:>14}  {:<36}", "DATE", "AMOUNT", "TRANSFER");
                println!("{}", "-".repeat(72));
                for entry in entries {
                    print_entry_row(&entry);
                }
            }
        }
    }
    Ok(())
}

fn print_account(account: &Account) {
    println!("Account: {}", account.id);
    println!("  Owner:    {}", account.owner);
    println!("  Currency: {}", account.currency);
    println!(
        "  Balance:  {} {}",
        format_cents(account.balance),
        account.currency
    );
    println!(
        "  Created:  {}",
        account.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_entry_row(entry: &Entry) {
    println!(
        "{:<20} {:>14}  {:<36}",
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        format_cents(entry.amount),
        entry.transfer_id
    );
}

fn print_receipt(receipt: &TransferReceipt) {
    let currency = receipt.sender.currency;
    println!(
        "Transferred {} {}: {} -> {} ({})",
        format_cents(receipt.transfer.amount),
        currency,
        receipt.sender.id,
        receipt.receiver.id,
        receipt.transfer.id
    );
    println!(
        "  Sender balance:   {:>14}  (entry {})",
        format_cents(receipt.sender.balance),
        format_cents(receipt.sender_entry.amount)
    );
    println!(
        "  Receiver balance: {:>14}  (entry {})",
        format_cents(receipt.receiver.balance),
        format_cents(receipt.receiver_entry.amount)
    );
}

fn print_transfer_details(details: &TransferDetails) {
    let transfer = &details.transfer;
    println!("Transfer: {}", transfer.id);
    println!("  From:     {}", transfer.sender_id);
    println!("  To:       {}", transfer.receiver_id);
    println!("  Amount:   {}", format_cents(transfer.amount));
    if let Some(key) = &transfer.idempotency_key {
        println!("  Key:      {}", key);
    }
    println!(
        "  Recorded: {}",
        transfer.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!();
    println!("  Entries:");
    for entry in &details.entries {
        println!(
            "    {:<36} {:>14}",
            entry.account_id,
            format_cents(entry.amount)
        );
    }
}

async fn run_check_command(service: &BankService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;
    let totals = &report.totals;

    println!("Accounts:  {}", totals.account_count);
    println!("Transfers: {}", totals.transfer_count);
    println!("Entries:   {}", totals.entry_count);
    println!(
        "Entry sum: {:>12}  {}",
        format_cents(totals.entry_sum),
        if totals.entry_sum == 0 { "OK" } else { "UNBALANCED!" }
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        if totals.entry_count != totals.transfer_count * 2 {
            println!(
                "  - expected {} entries for {} transfers, found {}",
                totals.transfer_count * 2,
                totals.transfer_count,
                totals.entry_count
            );
        }
        if totals.unbalanced_transfers > 0 {
            println!(
                "  - {} transfer(s) without a matching debit/credit pair",
                totals.unbalanced_transfers
            );
        }
        if totals.negative_accounts > 0 {
            println!(
                "  - {} account(s) with a negative balance",
                totals.negative_accounts
            );
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}
