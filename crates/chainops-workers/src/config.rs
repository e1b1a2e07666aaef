//! Environment-driven configuration shared by every worker binary (§6, ADDED
//! Configuration in SPEC_FULL §2).

use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
pub struct Config {
    #[arg(long, env = "DATASTORE_URL")]
    pub datastore_url: String,

    /// Carried through for deployments that front Postgres with a
    /// connection-pooling proxy requiring a bearer key; the direct
    /// `sqlx::PgPool` path this crate uses does not consume it itself.
    #[arg(long, env = "DATASTORE_KEY", default_value = "")]
    pub datastore_key: String,

    #[arg(long, env = "SIGNER_BASE_URL")]
    pub signer_base_url: String,

    #[arg(long, env = "SIGNER_API_KEY")]
    pub signer_api_key: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Detector batch size in blocks (§4.4 default 100).
    #[arg(long, env = "BATCH_BLOCK_SIZE", default_value_t = 100)]
    pub batch_block_size: u64,

    #[arg(long, env = "SCAN_INTERVAL_MS", default_value_t = 5_000)]
    pub scan_interval_ms: u64,

    /// EVM fee cap (§4.10); irrelevant to Tron binaries.
    #[arg(long, env = "GAS_PRICE_CAP_GWEI", default_value_t = 10)]
    pub gas_price_cap_gwei: u64,

    /// The `Chain.name` row this instance operates on. Required by the
    /// per-chain binaries (detector, execution workers); ignored by the
    /// multi-chain ones (deposit-confirmation, balance-sync, rule-planner,
    /// consolidation/withdrawal confirmation).
    #[arg(long, env = "CHAIN_NAME")]
    pub chain_name: Option<String>,

    #[arg(long, env = "DATASTORE_MAX_CONNECTIONS", default_value_t = 5)]
    pub datastore_max_connections: u32,
}

impl Config {
    pub fn init_logging(&self) {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.clone()),
        )
        .init();
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn required_chain_name(&self) -> anyhow::Result<&str> {
        self.chain_name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("CHAIN_NAME is required for this worker"))
    }
}
