use crate::data_sync::config::MonitorConfig;
use crate::data_sync::rate_limiter::RateLimiter;
use crate::data_sync::websocket::{InboundMessage, LogNotification, parse_inbound};
use crate::execution::executor::{SandwichExecutor, build_sandwich_params};
use crate::logic::decoder::RayLogDecoder;
use crate::logic::evaluator::OpportunityEvaluator;
use crate::logic::registry::{AccountReader, PoolRegistry};
use crate::logic::types::{PoolKey, SimulationResult, SwapRecord};
use crate::utils::constants::RAY_LOG_PREFIX;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Pause applied to a message that arrives while over the local rate limit.
/// The message is dropped, not queued.
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

/// Counters kept by the monitor over its lifetime.
///
/// `confirmed_profit` moves only after a confirmed execution — simulations
/// and dry runs never touch it.
#[derive(Debug, Default, Clone)]
pub struct MonitorStats {
    pub total_requests: u64,
    pub rate_limit_hits: u64,
    pub decoded_swaps: u64,
    pub total_opportunities: u64,
    pub profitable_opportunities: u64,
    pub executed_sandwiches: u64,
    pub confirmed_profit: i64,
}

/// Sequences the pipeline: rate-gate → envelope unwrap → decode → reserve
/// lookup → evaluation → conditional dispatch.
///
/// Processes one message at a time; the reserve cache inside the registry is
/// the only state it shares with anyone else.
pub struct MonitorService {
    config: MonitorConfig,
    registry: Arc<PoolRegistry>,
    decoder: RayLogDecoder,
    evaluator: OpportunityEvaluator,
    account_reader: Arc<dyn AccountReader>,
    executor: Arc<SandwichExecutor>,
    rate_limiter: RateLimiter,
    stats: MonitorStats,
    started_at: Instant,
    last_stats_log: Instant,
}

impl MonitorService {
    pub fn new(
        config: MonitorConfig,
        registry: Arc<PoolRegistry>,
        account_reader: Arc<dyn AccountReader>,
        executor: Arc<SandwichExecutor>,
    ) -> Self {
        let decoder = RayLogDecoder::new(Arc::clone(&registry), config.strict_pool_resolution);
        let evaluator =
            OpportunityEvaluator::new(config.min_profit_threshold, config.default_slippage_bps);
        let rate_limiter = RateLimiter::new(config.max_requests_per_second, config.rate_window());
        let now = Instant::now();

        Self {
            config,
            registry,
            decoder,
            evaluator,
            account_reader,
            executor,
            rate_limiter,
            stats: MonitorStats::default(),
            started_at: now,
            last_stats_log: now,
        }
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// Consume notifications until the stream channel closes.
    pub async fn run(&mut self, mut notifications: mpsc::Receiver<LogNotification>) {
        info!(
            max_rps = self.config.max_requests_per_second,
            dry_run = self.config.dry_run,
            "monitor loop started"
        );
        while let Some(notification) = notifications.recv().await {
            self.handle_notification(&notification).await;
            self.maybe_log_stats();
        }
        info!("log stream ended, monitor loop exiting");
    }

    /// Feed one raw stream message through the pipeline. Tolerates the
    /// leading subscription confirmation and anything malformed.
    pub async fn process_raw_message(&mut self, text: &str) -> Option<SimulationResult> {
        match parse_inbound(text) {
            Ok(InboundMessage::SubscriptionConfirmed(id)) => {
                info!(subscription_id = id, "subscription established");
                None
            }
            Ok(InboundMessage::Logs(notification)) => self.handle_notification(&notification).await,
            Ok(InboundMessage::Other) => None,
            Err(e) => {
                warn!(error = %e, "failed to parse stream message");
                None
            }
        }
    }

    /// Process one unwrapped notification, returning the evaluation result
    /// when the message contained an evaluable swap.
    pub async fn handle_notification(
        &mut self,
        notification: &LogNotification,
    ) -> Option<SimulationResult> {
        if !self.rate_limiter.try_acquire() {
            self.stats.rate_limit_hits += 1;
            warn!("rate limit reached, dropping log message");
            sleep(RATE_LIMIT_PAUSE).await;
            return None;
        }
        self.stats.total_requests += 1;

        let record = self.decode_swap(notification)?;
        self.stats.decoded_swaps += 1;

        let Some(pool) = record.pool else {
            warn!(
                signature = %notification.signature,
                pool_id = ?record.pool_id,
                "unresolved pool, skipping swap"
            );
            return None;
        };
        let Some(config) = self.registry.config_for(pool) else {
            warn!(pool = %pool, "pool not in registry, skipping swap");
            return None;
        };
        let config = config.clone();

        // Internally throttled; a failed read leaves the cached snapshot in
        // charge of the freshness decision.
        if let Err(e) = self
            .registry
            .refresh_reserves(pool, self.account_reader.as_ref())
            .await
        {
            warn!(pool = %pool, error = %e, "reserve refresh failed");
        }
        let Some(reserves) = self.registry.reserves_for(pool) else {
            debug!(pool = %pool, "no fresh reserves, skipping evaluation");
            return None;
        };

        let result = self.evaluator.evaluate_with(
            &record,
            &reserves,
            &config,
            self.config.gas_market_condition(),
            None,
        )?;
        self.stats.total_opportunities += 1;

        if result.is_profitable {
            self.stats.profitable_opportunities += 1;
            info!(
                signature = %notification.signature,
                slot = notification.slot,
                pool = %pool,
                direction = %result.direction,
                amount_in = record.amount_in,
                amount_out = record.amount_out,
                price_impact_pct = result.price_impact_pct,
                front_run_size = result.front_run_size,
                net_profit = result.net_profit,
                "🚨 profitable sandwich opportunity"
            );
            self.dispatch(&record, &result, pool).await;
        }

        Some(result)
    }

    /// First decodable ray_log line of the notification, if any.
    fn decode_swap(&self, notification: &LogNotification) -> Option<SwapRecord> {
        for line in &notification.logs {
            let Some((_, payload)) = line.split_once(RAY_LOG_PREFIX) else {
                continue;
            };
            match self.decoder.decode(payload) {
                Ok(record) => return Some(record),
                Err(e) => {
                    debug!(
                        signature = %notification.signature,
                        error = %e,
                        "undecodable ray_log line"
                    );
                }
            }
        }
        None
    }

    async fn dispatch(&mut self, record: &SwapRecord, result: &SimulationResult, pool: PoolKey) {
        if self.config.dry_run {
            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            info!("simulated transactions (not valid on any explorer):");
            info!("DRY_RUN_FRONT_{timestamp}");
            info!("DRY_RUN_BACK_{timestamp}");
            return;
        }
        if record.amount_in < self.config.min_live_trade_size {
            info!(
                amount_in = record.amount_in,
                minimum = self.config.min_live_trade_size,
                "trade too small for live execution"
            );
            return;
        }
        let Some(accounts) = self.registry.accounts_for(pool) else {
            warn!(pool = %pool, "no accounts configured, cannot execute");
            return;
        };
        let Some(config) = self.registry.config_for(pool) else {
            return;
        };

        let (front, back) =
            build_sandwich_params(record, result, accounts, config.max_slippage_bps());
        match self.executor.execute_sandwich(&front, &back).await {
            Ok((front_sig, back_sig)) => {
                self.stats.executed_sandwiches += 1;
                self.stats.confirmed_profit += result.net_profit;
                info!(front_sig = %front_sig, back_sig = %back_sig, "sandwich executed");
            }
            Err(e) => {
                warn!(error = %e, "sandwich execution failed");
            }
        }
    }

    fn maybe_log_stats(&mut self) {
        if self.last_stats_log.elapsed() < self.config.stats_interval() {
            return;
        }
        self.last_stats_log = Instant::now();
        info!(
            uptime_secs = self.started_at.elapsed().as_secs(),
            total_requests = self.stats.total_requests,
            rate_limit_hits = self.stats.rate_limit_hits,
            decoded_swaps = self.stats.decoded_swaps,
            opportunities = self.stats.total_opportunities,
            profitable = self.stats.profitable_opportunities,
            executed = self.stats.executed_sandwiches,
            confirmed_profit = self.stats.confirmed_profit,
            "monitor stats"
        );
    }
}

/// Notification shaped like a real swap, used to exercise the pipeline
/// without a network connection.
pub fn synthetic_swap_notification(
    timestamp: u64,
    amount_in: u64,
    amount_out: u64,
) -> LogNotification {
    let values = [timestamp, amount_in, 1, timestamp + 1, amount_out, 1, 0];
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let encoded = BASE64.encode(bytes);

    LogNotification {
        signature: format!("synthetic_swap_tx_{timestamp}"),
        slot: timestamp,
        logs: vec![
            "Program log: Instruction: Swap".to_string(),
            format!("Program log: ray_log: {encoded}"),
        ],
    }
}
