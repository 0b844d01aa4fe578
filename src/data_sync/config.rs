use crate::logic::types::MarketCondition;
use crate::utils::constants::RAYDIUM_AMM_PROGRAM_ID;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Configuration for the monitor pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// WebSocket RPC URL for the log subscription
    pub rpc_wss_url: String,
    /// HTTP RPC URL for account-state reads
    pub rpc_http_url: String,
    /// Program id whose logs the subscription mentions
    pub amm_program_id: String,
    /// Commitment level requested in the subscription
    pub commitment: String,
    /// JSON-RPC id used for the subscription request
    pub subscription_id: u64,
    /// Local rate limit: maximum requests per window
    pub max_requests_per_second: usize,
    /// Local rate limit window in seconds
    pub rate_window_secs: u64,
    /// Minimum seconds between reserve refreshes per pool
    pub reserve_refresh_secs: u64,
    /// Seconds a reserve snapshot stays usable
    pub reserve_freshness_secs: u64,
    /// Initial reconnect delay in seconds
    pub reconnect_initial_delay_secs: u64,
    /// Reconnect delay cap in seconds
    pub reconnect_max_delay_secs: u64,
    /// Consecutive failures before logging a persistent-failure error
    pub max_reconnect_attempts: u32,
    /// WebSocket connection timeout in seconds
    pub ws_connection_timeout_secs: u64,
    /// Buffer size for the notification channel
    pub channel_buffer_size: usize,
    /// Seconds between periodic stats log lines
    pub stats_interval_secs: u64,
    /// Minimum net profit (base units) worth acting on
    pub min_profit_threshold: u64,
    /// Victim trades below this size are never executed live
    pub min_live_trade_size: u64,
    /// Victim slippage tolerance assumed when unknown, in basis points
    pub default_slippage_bps: u64,
    /// Gas market condition supplied by the operator ("normal", "congested",
    /// "high")
    pub gas_market: String,
    /// Simulate opportunities without submitting transactions
    pub dry_run: bool,
    /// Skip rather than assume the primary pair when a payload carries no
    /// pool id
    pub strict_pool_resolution: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc_wss_url: "wss://api.devnet.solana.com".to_string(),
            rpc_http_url: "https://api.devnet.solana.com".to_string(),
            amm_program_id: RAYDIUM_AMM_PROGRAM_ID.to_string(),
            commitment: "confirmed".to_string(),
            subscription_id: 1,
            max_requests_per_second: 15,
            rate_window_secs: 1,
            reserve_refresh_secs: 60,
            reserve_freshness_secs: 300,
            reconnect_initial_delay_secs: 5,
            reconnect_max_delay_secs: 60,
            max_reconnect_attempts: 5,
            ws_connection_timeout_secs: 30,
            channel_buffer_size: 100,
            stats_interval_secs: 60,
            min_profit_threshold: 10_000_000,
            min_live_trade_size: 1_000_000_000,
            default_slippage_bps: 100,
            gas_market: "normal".to_string(),
            dry_run: true,
            strict_pool_resolution: false,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Ok(rpc_wss_url) = std::env::var("RPC_WSS_URL") {
            let _url = Url::parse(&rpc_wss_url)
                .map_err(|e| eyre::eyre!("Invalid RPC_WSS_URL: {}", e))?;
            config.rpc_wss_url = rpc_wss_url;
        }

        if let Ok(rpc_http_url) = std::env::var("RPC_HTTP_URL") {
            let _url = Url::parse(&rpc_http_url)
                .map_err(|e| eyre::eyre!("Invalid RPC_HTTP_URL: {}", e))?;
            config.rpc_http_url = rpc_http_url;
        }

        if let Ok(program_id) = std::env::var("AMM_PROGRAM_ID") {
            config.amm_program_id = program_id;
        }

        if let Ok(max_requests_str) = std::env::var("MAX_REQUESTS_PER_SECOND") {
            config.max_requests_per_second = max_requests_str
                .parse()
                .map_err(|e| eyre::eyre!("Invalid MAX_REQUESTS_PER_SECOND: {}", e))?;
        }

        if let Ok(threshold_str) = std::env::var("MIN_PROFIT_THRESHOLD") {
            config.min_profit_threshold = threshold_str
                .parse()
                .map_err(|e| eyre::eyre!("Invalid MIN_PROFIT_THRESHOLD: {}", e))?;
        }

        if let Ok(trade_size_str) = std::env::var("MIN_LIVE_TRADE_SIZE") {
            config.min_live_trade_size = trade_size_str
                .parse()
                .map_err(|e| eyre::eyre!("Invalid MIN_LIVE_TRADE_SIZE: {}", e))?;
        }

        if let Ok(dry_run_str) = std::env::var("DRY_RUN") {
            config.dry_run = dry_run_str
                .parse()
                .map_err(|e| eyre::eyre!("Invalid DRY_RUN: {}", e))?;
        }

        if let Ok(strict_str) = std::env::var("STRICT_POOL_RESOLUTION") {
            config.strict_pool_resolution = strict_str
                .parse()
                .map_err(|e| eyre::eyre!("Invalid STRICT_POOL_RESOLUTION: {}", e))?;
        }

        if let Ok(gas_market) = std::env::var("GAS_MARKET") {
            MarketCondition::from_str(&gas_market)
                .map_err(|_| eyre::eyre!("Invalid GAS_MARKET: {}", gas_market))?;
            config.gas_market = gas_market;
        }

        Ok(config)
    }

    /// Gas market condition, falling back to normal for unknown values.
    pub fn gas_market_condition(&self) -> MarketCondition {
        MarketCondition::from_str(&self.gas_market).unwrap_or_default()
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn reserve_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.reserve_refresh_secs)
    }

    pub fn reserve_freshness_window(&self) -> Duration {
        Duration::from_secs(self.reserve_freshness_secs)
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_initial_delay_secs)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_delay_secs)
    }

    pub fn ws_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_connection_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.max_requests_per_second, 15);
        assert_eq!(config.reserve_refresh_secs, 60);
        assert_eq!(config.reserve_freshness_secs, 300);
        assert_eq!(config.reconnect_initial_delay_secs, 5);
        assert_eq!(config.reconnect_max_delay_secs, 60);
        assert!(config.dry_run);
        assert!(!config.strict_pool_resolution);
    }

    #[test]
    fn test_durations() {
        let config = MonitorConfig::default();
        assert_eq!(config.rate_window(), Duration::from_secs(1));
        assert_eq!(config.reconnect_initial_delay(), Duration::from_secs(5));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(60));
    }

    #[test]
    fn unknown_gas_market_falls_back_to_normal() {
        let mut config = MonitorConfig::default();
        config.gas_market = "weird".to_string();
        assert_eq!(config.gas_market_condition(), MarketCondition::Normal);

        config.gas_market = "congested".to_string();
        assert_eq!(config.gas_market_condition(), MarketCondition::Congested);
    }

    #[test]
    fn config_parses_from_toml() {
        let toml = r#"
            rpc_wss_url = "wss://example.org"
            dry_run = false
            max_requests_per_second = 5
        "#;
        let config: MonitorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rpc_wss_url, "wss://example.org");
        assert!(!config.dry_run);
        assert_eq!(config.max_requests_per_second, 5);
        // Unspecified fields keep their defaults.
        assert_eq!(config.reserve_refresh_secs, 60);
    }
}
