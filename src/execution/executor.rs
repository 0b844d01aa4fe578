use crate::data_sync::rate_limiter::RateLimiter;
use crate::errors::ExecutionError;
use crate::logic::registry::PoolAccounts;
use crate::logic::types::{SimulationResult, SwapRecord, TradeDirection};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry attempts per transaction leg.
const MAX_SEND_RETRIES: u32 = 3;
/// Confirmation polls per submitted transaction.
const CONFIRMATION_ATTEMPTS: u32 = 3;
const CONFIRMATION_POLL_DELAY: Duration = Duration::from_secs(1);
const INITIAL_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Fully specified parameters for one swap leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeParams {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
    pub source_token: String,
    pub destination_token: String,
}

/// Signs, submits and confirms transactions against the ledger. The core
/// never talks to the network itself.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn send_transaction(&self, params: &TradeParams) -> Result<String, ExecutionError>;
    /// `Ok(false)` means not yet visible; callers poll again.
    async fn confirm_transaction(&self, signature: &str) -> Result<bool, ExecutionError>;
}

/// Build the bracketing trade pair for a confirmed opportunity.
///
/// The front-run mimics the victim's direction at the evaluator's size; the
/// back-run unwinds it. Both legs bound their output by the victim's
/// observed output less the pair's slippage allowance.
pub fn build_sandwich_params(
    record: &SwapRecord,
    result: &SimulationResult,
    accounts: &PoolAccounts,
    max_slippage_bps: u64,
) -> (TradeParams, TradeParams) {
    let minimum_amount_out =
        (record.amount_out as u128 * (10_000 - max_slippage_bps as u128) / 10_000) as u64;

    let (source, destination) = match result.direction {
        TradeDirection::Sell => (&accounts.token_a_account, &accounts.token_b_account),
        TradeDirection::Buy => (&accounts.token_b_account, &accounts.token_a_account),
    };

    let front = TradeParams {
        amount_in: result.front_run_size,
        minimum_amount_out,
        source_token: source.clone(),
        destination_token: destination.clone(),
    };
    let back = TradeParams {
        amount_in: result.front_run_size,
        minimum_amount_out,
        source_token: destination.clone(),
        destination_token: source.clone(),
    };
    (front, back)
}

/// Submits the two bracketing transactions with bounded retries.
///
/// Every submission and confirmation poll passes the executor's own rate
/// limiter; retries back off exponentially. In dry-run mode nothing touches
/// the submitter and synthetic signatures are returned.
pub struct SandwichExecutor {
    submitter: Arc<dyn TransactionSubmitter>,
    limiter: Mutex<RateLimiter>,
    dry_run: bool,
}

impl SandwichExecutor {
    pub fn new(submitter: Arc<dyn TransactionSubmitter>, dry_run: bool) -> Self {
        Self {
            submitter,
            limiter: Mutex::new(RateLimiter::new_default()),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute the front-run / back-run pair, returning both signatures.
    pub async fn execute_sandwich(
        &self,
        front: &TradeParams,
        back: &TradeParams,
    ) -> Result<(String, String), ExecutionError> {
        if self.dry_run {
            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let front_sig = format!("DRY_RUN_FRONT_{timestamp}");
            let back_sig = format!("DRY_RUN_BACK_{timestamp}");
            info!(%front_sig, %back_sig, "dry run, skipping submission");
            return Ok((front_sig, back_sig));
        }

        let front_sig = self.send_with_retries(front).await?;
        let back_sig = self.send_with_retries(back).await?;
        Ok((front_sig, back_sig))
    }

    async fn send_with_retries(&self, params: &TradeParams) -> Result<String, ExecutionError> {
        let mut delay = INITIAL_RETRY_BACKOFF;
        for attempt in 0..MAX_SEND_RETRIES {
            if attempt > 0 {
                info!(
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    "retrying transaction"
                );
                sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_BACKOFF);
            }

            self.limiter.lock().await.acquire().await;
            let signature = match self.submitter.send_transaction(params).await {
                Ok(signature) => signature,
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "submission failed");
                    continue;
                }
            };

            match self.await_confirmation(&signature).await {
                Ok(()) => return Ok(signature),
                Err(e) => {
                    warn!(signature = %signature, error = %e, "confirmation failed");
                }
            }
        }
        Err(ExecutionError::RetriesExhausted)
    }

    async fn await_confirmation(&self, signature: &str) -> Result<(), ExecutionError> {
        for attempt in 0..CONFIRMATION_ATTEMPTS {
            if attempt > 0 {
                sleep(CONFIRMATION_POLL_DELAY).await;
            }
            self.limiter.lock().await.acquire().await;
            match self.submitter.confirm_transaction(signature).await {
                Ok(true) => {
                    info!(signature = %signature, "transaction confirmed");
                    return Ok(());
                }
                // Not visible yet, poll again.
                Ok(false) => continue,
                // Provider pushback counts against the poll budget but is
                // not a hard failure.
                Err(ExecutionError::RateLimited) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ExecutionError::Unconfirmed(signature.to_string()))
    }
}
