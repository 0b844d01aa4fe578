use crate::errors::RegistryError;
use crate::logic::types::PoolKey;
use crate::utils::constants::{
    RAYDIUM_AMM_PROGRAM_ID, SOL_DECIMALS, SOL_USDC_TOKEN_A_ACCOUNT, TokenMint, USDC_DECIMALS,
    USDT_DECIMALS,
};
use ahash::AHashMap;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Byte offsets of the two reserve balances inside the pool account payload.
/// These match the on-chain account layout the reserves are read from;
/// changing them breaks compatibility with live pool accounts.
const RESERVE_A_OFFSET: usize = 64;
const RESERVE_B_OFFSET: usize = 72;
const RESERVE_DATA_MIN_LEN: usize = RESERVE_B_OFFSET + 8;

/// External account-state reader used to refresh pool reserves.
#[async_trait]
pub trait AccountReader: Send + Sync {
    async fn get_account_data(&self, address: &str) -> Result<Vec<u8>, RegistryError>;
}

/// Static per-pair trading parameters. Read-only after registry construction.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pair: PoolKey,
    pub token_a_decimals: u32,
    pub token_b_decimals: u32,
    /// Pool fee as a fraction (0.003 = 0.3%).
    pub fee_rate: f64,
    /// Swaps below this input size are never evaluated.
    pub min_amount_threshold: u64,
    /// Minimum price impact (percent) worth sandwiching.
    pub min_price_impact: f64,
    /// Maximum slippage (percent) tolerated when sizing our own trades.
    pub max_slippage: f64,
}

impl PoolConfig {
    /// Fee rate expressed in basis points, for integer constant-product math.
    pub fn fee_bps(&self) -> u64 {
        (self.fee_rate * 10_000.0).round() as u64
    }

    pub fn max_slippage_bps(&self) -> u64 {
        (self.max_slippage * 100.0).round() as u64
    }
}

/// On-chain accounts backing a pool, used for reserve reads and trade
/// parameter construction.
#[derive(Debug, Clone)]
pub struct PoolAccounts {
    /// Account whose data carries the reserve balances.
    pub amm_account: String,
    pub token_a_account: String,
    pub token_b_account: String,
}

/// Cached reserve balances for one pool.
#[derive(Debug, Clone)]
pub struct PoolReserveSnapshot {
    pub reserve_a: u64,
    pub reserve_b: u64,
    pub last_update: Instant,
}

/// Table of supported pools plus their reserve cache.
///
/// Configs and accounts are fixed at construction; the reserve cache is the
/// only mutable state and lives in a `DashMap` so evaluator reads can
/// proceed while a background refresh writes. Unsupported pairs are simply
/// absent — there are no null entries.
pub struct PoolRegistry {
    configs: AHashMap<PoolKey, PoolConfig>,
    accounts: AHashMap<PoolKey, PoolAccounts>,
    pool_ids: AHashMap<u64, PoolKey>,
    reserves: DashMap<PoolKey, PoolReserveSnapshot>,
    last_refresh: DashMap<PoolKey, Instant>,
    refresh_interval: Duration,
    freshness_window: Duration,
}

impl PoolRegistry {
    pub fn new(refresh_interval: Duration, freshness_window: Duration) -> Self {
        Self {
            configs: AHashMap::new(),
            accounts: AHashMap::new(),
            pool_ids: AHashMap::new(),
            reserves: DashMap::new(),
            last_refresh: DashMap::new(),
            refresh_interval,
            freshness_window,
        }
    }

    /// Registry preloaded with the supported mainline pairs and their
    /// default thresholds: 1 SOL minimum trade, 1% minimum impact, 2% max
    /// slippage, 0.3% pool fee.
    pub fn with_default_pairs() -> Self {
        let mut registry = Self::new(Duration::from_secs(60), Duration::from_secs(300));

        registry.add_pool(
            PoolConfig {
                pair: PoolKey::SolUsdc,
                token_a_decimals: SOL_DECIMALS,
                token_b_decimals: USDC_DECIMALS,
                fee_rate: 0.003,
                min_amount_threshold: 1_000_000_000,
                min_price_impact: 1.0,
                max_slippage: 2.0,
            },
            PoolAccounts {
                amm_account: RAYDIUM_AMM_PROGRAM_ID.to_string(),
                token_a_account: SOL_USDC_TOKEN_A_ACCOUNT.to_string(),
                token_b_account: TokenMint::USDC.to_string(),
            },
        );
        registry.add_pool(
            PoolConfig {
                pair: PoolKey::SolUsdt,
                token_a_decimals: SOL_DECIMALS,
                token_b_decimals: USDT_DECIMALS,
                fee_rate: 0.003,
                min_amount_threshold: 1_000_000_000,
                min_price_impact: 1.0,
                max_slippage: 2.0,
            },
            PoolAccounts {
                amm_account: RAYDIUM_AMM_PROGRAM_ID.to_string(),
                token_a_account: SOL_USDC_TOKEN_A_ACCOUNT.to_string(),
                token_b_account: TokenMint::USDT.to_string(),
            },
        );

        registry.map_pool_id(1, PoolKey::SolUsdc);
        registry.map_pool_id(2, PoolKey::SolUsdt);
        registry
    }

    /// Override the refresh throttle and freshness window, e.g. from
    /// monitor configuration.
    pub fn with_windows(mut self, refresh_interval: Duration, freshness_window: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self.freshness_window = freshness_window;
        self
    }

    pub fn add_pool(&mut self, config: PoolConfig, accounts: PoolAccounts) {
        let pair = config.pair;
        self.configs.insert(pair, config);
        self.accounts.insert(pair, accounts);
    }

    /// Associate an on-chain pool id with a supported pair.
    pub fn map_pool_id(&mut self, pool_id: u64, pair: PoolKey) {
        self.pool_ids.insert(pool_id, pair);
    }

    /// First configured pair, used as the fallback when a decoded payload
    /// carries no pool id and strict resolution is disabled.
    pub fn primary_pair(&self) -> PoolKey {
        PoolKey::SolUsdc
    }

    pub fn config_for(&self, pair: PoolKey) -> Option<&PoolConfig> {
        self.configs.get(&pair)
    }

    pub fn accounts_for(&self, pair: PoolKey) -> Option<&PoolAccounts> {
        self.accounts.get(&pair)
    }

    /// Resolve an on-chain pool id to a supported pair. An unknown id stays
    /// unresolved; callers must skip it rather than guess.
    pub fn identify_pool(&self, pool_id: u64) -> Option<PoolKey> {
        self.pool_ids.get(&pool_id).copied()
    }

    /// Cached reserves for a pair, only while inside the freshness window.
    /// A stale entry returns `None`, which callers must treat as
    /// "unevaluable until the next refresh".
    pub fn reserves_for(&self, pair: PoolKey) -> Option<PoolReserveSnapshot> {
        let snapshot = self.reserves.get(&pair)?;
        if snapshot.last_update.elapsed() < self.freshness_window {
            Some(snapshot.clone())
        } else {
            debug!(pair = %pair, "reserve snapshot is stale, skipping");
            None
        }
    }

    /// Refresh the reserve cache for a pair from on-chain account data.
    ///
    /// Throttled internally: at most one external read per refresh interval
    /// per pool. A throttled call is an Ok no-op, so this is safe to invoke
    /// on every observed swap.
    pub async fn refresh_reserves(
        &self,
        pair: PoolKey,
        reader: &dyn AccountReader,
    ) -> Result<(), RegistryError> {
        if !self.configs.contains_key(&pair) {
            return Err(RegistryError::UnsupportedPool(pair.to_string()));
        }
        if let Some(last) = self.last_refresh.get(&pair) {
            if last.elapsed() < self.refresh_interval {
                return Ok(());
            }
        }

        let accounts = self
            .accounts
            .get(&pair)
            .ok_or_else(|| RegistryError::MissingAccount(pair.to_string()))?;
        let data = reader.get_account_data(&accounts.amm_account).await?;
        let snapshot = parse_reserves(&data)?;

        info!(
            pair = %pair,
            reserve_a = snapshot.reserve_a,
            reserve_b = snapshot.reserve_b,
            "updated pool reserves"
        );
        self.reserves.insert(pair, snapshot);
        self.last_refresh.insert(pair, Instant::now());
        Ok(())
    }

    #[cfg(test)]
    fn store_snapshot(&self, pair: PoolKey, snapshot: PoolReserveSnapshot) {
        self.reserves.insert(pair, snapshot);
    }
}

fn parse_reserves(data: &[u8]) -> Result<PoolReserveSnapshot, RegistryError> {
    if data.len() < RESERVE_DATA_MIN_LEN {
        return Err(RegistryError::AccountTooShort(data.len()));
    }
    let reserve_a = u64::from_le_bytes(
        data[RESERVE_A_OFFSET..RESERVE_A_OFFSET + 8]
            .try_into()
            .unwrap(),
    );
    let reserve_b = u64::from_le_bytes(
        data[RESERVE_B_OFFSET..RESERVE_B_OFFSET + 8]
            .try_into()
            .unwrap(),
    );
    Ok(PoolReserveSnapshot {
        reserve_a,
        reserve_b,
        last_update: Instant::now(),
    })
}
