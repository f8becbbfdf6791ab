use std::time::Duration;

use clap::Args;

/// Connection settings for the ledger store.
/// Every field can come from a flag or from the matching environment variable.
#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// Database file path
    #[arg(
        short,
        long,
        global = true,
        env = "BANKLEDGER_DATABASE",
        default_value = "bankledger.db"
    )]
    pub database: String,

    /// Maximum number of pooled connections
    #[arg(
        long,
        global = true,
        env = "BANKLEDGER_MAX_CONNECTIONS",
        default_value_t = 5
    )]
    pub max_connections: u32,

    /// How long a transfer waits for a competing transfer's locks before giving up
    #[arg(
        long = "busy-timeout-ms",
        global = true,
        env = "BANKLEDGER_BUSY_TIMEOUT_MS",
        default_value_t = 5000
    )]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "bankledger.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}
