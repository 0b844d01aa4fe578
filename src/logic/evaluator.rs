use crate::errors::EvaluationError;
use crate::logic::registry::{PoolConfig, PoolReserveSnapshot};
use crate::logic::types::{MarketCondition, SimulationResult, SwapRecord, TradeDirection};
use tracing::{debug, warn};

/// Fixed per-transaction gas cost in base units.
const BASE_GAS_COST: u64 = 5_000;
/// A sandwich is always two transactions: front-run and back-run.
const SANDWICH_TX_COUNT: u64 = 2;
/// Safety buffer applied on top of the market-adjusted gas estimate.
const GAS_SAFETY_BUFFER: f64 = 1.2;

/// Estimated gas cost for a full sandwich under the given market condition.
pub fn estimate_gas_cost(market: MarketCondition) -> u64 {
    let base = BASE_GAS_COST * SANDWICH_TX_COUNT;
    (base as f64 * market.gas_multiplier() * GAS_SAFETY_BUFFER) as u64
}

/// Single-leg pool fee for a trade of `amount` under the pair's fee rate.
pub fn calculate_fees(amount: u64, config: &PoolConfig) -> u64 {
    (amount as u128 * config.fee_bps() as u128 / 10_000) as u64
}

/// Decides whether a decoded swap opens a profitable sandwich window.
///
/// The profit model is the constant-product reserve-based one: the victim's
/// price impact is measured against the pool's fee-adjusted quote, the
/// front-run is sized so the victim's slippage tolerance still admits it,
/// and each bracketing leg captures half the impact on that notional.
pub struct OpportunityEvaluator {
    /// Floor on acceptable net profit, in base units.
    min_profit_threshold: u64,
    /// Victim slippage tolerance assumed when none is supplied, in basis
    /// points.
    default_slippage_bps: u64,
}

impl OpportunityEvaluator {
    pub fn new(min_profit_threshold: u64, default_slippage_bps: u64) -> Self {
        Self {
            min_profit_threshold,
            default_slippage_bps,
        }
    }

    /// Evaluate with normal market conditions and the default victim
    /// slippage tolerance.
    pub fn evaluate(
        &self,
        record: &SwapRecord,
        reserves: &PoolReserveSnapshot,
        config: &PoolConfig,
    ) -> Option<SimulationResult> {
        self.evaluate_with(record, reserves, config, MarketCondition::Normal, None)
    }

    /// Full evaluation entry point.
    ///
    /// Returns `None` when the swap does not qualify (too small, dead pool,
    /// impact below the pair's minimum). A qualifying swap whose profit
    /// computation fails yields a zeroed non-profitable result — evaluation
    /// never aborts the monitor loop.
    pub fn evaluate_with(
        &self,
        record: &SwapRecord,
        reserves: &PoolReserveSnapshot,
        config: &PoolConfig,
        market: MarketCondition,
        victim_slippage_bps: Option<u64>,
    ) -> Option<SimulationResult> {
        if record.amount_in < config.min_amount_threshold {
            debug!(
                amount_in = record.amount_in,
                threshold = config.min_amount_threshold,
                "swap below minimum size"
            );
            return None;
        }
        if reserves.reserve_a == 0 || reserves.reserve_b == 0 {
            debug!("pool reserves are uninitialized");
            return None;
        }

        let direction = trade_direction(record.amount_in, record.amount_out, reserves, config);

        let impact_millis =
            match price_impact_millis(record.amount_in, record.amount_out, reserves, config, direction) {
                Ok(millis) => millis,
                Err(err) => {
                    warn!(error = %err, "price impact computation failed");
                    return Some(SimulationResult::zeroed());
                }
            };

        let impact_pct = impact_millis as f64 / 10.0;
        if impact_pct < config.min_price_impact {
            debug!(
                impact_pct,
                min = config.min_price_impact,
                "price impact below minimum"
            );
            return None;
        }

        let slippage_bps = victim_slippage_bps.unwrap_or(self.default_slippage_bps);
        match self.simulate(record.amount_in, impact_millis, config, market, slippage_bps, direction)
        {
            Ok(result) => Some(result),
            Err(err) => {
                warn!(error = %err, "sandwich simulation failed");
                Some(SimulationResult::zeroed())
            }
        }
    }

    fn simulate(
        &self,
        amount_in: u64,
        impact_millis: u64,
        config: &PoolConfig,
        market: MarketCondition,
        slippage_bps: u64,
        direction: TradeDirection,
    ) -> Result<SimulationResult, EvaluationError> {
        let amount_in = amount_in as u128;
        let impact_millis = impact_millis as u128;
        let slippage_bps = slippage_bps as u128;
        let fee_bps = config.fee_bps() as u128;

        // Largest front-run the victim's slippage tolerance still lets
        // through, then capped at half the victim's own size.
        let max_front_run = amount_in * slippage_bps / (2 * 10_000 + slippage_bps);
        let front_run = (amount_in / 2).min(max_front_run);

        // Symmetric constant-product approximation: each bracketing leg
        // captures half the victim's impact on the front-run notional.
        let leg_profit = front_run
            .checked_mul(impact_millis)
            .ok_or(EvaluationError::Overflow("leg profit"))?
            / 2_000;
        let front_run_profit = leg_profit;
        let back_run_profit = leg_profit;
        let gross_profit = front_run_profit + back_run_profit;

        // Front leg pays fees on the front-run notional; the back leg sells
        // at the impact-inflated price, so its notional grows accordingly.
        let front_fees = front_run * fee_bps / 10_000;
        let back_fees = front_run
            .checked_mul(1_000 + impact_millis)
            .and_then(|notional| notional.checked_mul(fee_bps))
            .ok_or(EvaluationError::Overflow("back-run fees"))?
            / 10_000_000;
        let pool_fees = front_fees + back_fees;

        let gas_cost = estimate_gas_cost(market) as u128;

        let gross = to_i64(gross_profit, "gross profit")?;
        let gas = to_i64(gas_cost, "gas cost")?;
        let fees = to_i64(pool_fees, "pool fees")?;
        let net_profit = gross - gas - fees;

        let dynamic_threshold = (self.min_profit_threshold as i64).max(gas * 2);

        Ok(SimulationResult {
            direction,
            front_run_size: front_run as u64,
            price_impact_pct: impact_millis as f64 / 10.0,
            front_run_profit: to_i64(front_run_profit, "front-run profit")?,
            back_run_profit: to_i64(back_run_profit, "back-run profit")?,
            gross_profit: gross,
            gas_cost: gas,
            pool_fees: fees,
            net_profit,
            is_profitable: net_profit >= dynamic_threshold,
        })
    }
}

fn to_i64(value: u128, field: &'static str) -> Result<i64, EvaluationError> {
    i64::try_from(value).map_err(|_| EvaluationError::Overflow(field))
}

/// Classify the swap as base→quote (`Sell`) or quote→base (`Buy`).
///
/// Both direction hypotheses are priced in decimal-normalized terms and
/// compared against the reserve-implied pool price; the hypothesis whose
/// executed price sits closer to the pool price wins. Ties go to `Sell` —
/// callers and tests rely on that exact default.
pub fn trade_direction(
    amount_in: u64,
    amount_out: u64,
    reserves: &PoolReserveSnapshot,
    config: &PoolConfig,
) -> TradeDirection {
    let scale_a = 10f64.powi(config.token_a_decimals as i32);
    let scale_b = 10f64.powi(config.token_b_decimals as i32);

    let pool_price = (reserves.reserve_b as f64 / scale_b) / (reserves.reserve_a as f64 / scale_a);

    // Sell hypothesis: input is base, output is quote.
    let sell_price = (amount_out as f64 / scale_b) / (amount_in as f64 / scale_a);
    // Buy hypothesis: input is quote, output is base.
    let buy_price = (amount_in as f64 / scale_b) / (amount_out as f64 / scale_a);

    if (buy_price - pool_price).abs() < (sell_price - pool_price).abs() {
        TradeDirection::Buy
    } else {
        TradeDirection::Sell
    }
}

/// Unsigned price impact in thousandths (tenths of a percent ×10), i.e.
/// `impact_millis / 10.0` is the percentage rounded to one decimal place.
///
/// Impact is the deviation of the victim's actual output from the
/// fee-adjusted constant-product quote on current reserves. Integer math
/// throughout so results are exactly reproducible.
fn price_impact_millis(
    amount_in: u64,
    amount_out: u64,
    reserves: &PoolReserveSnapshot,
    config: &PoolConfig,
    direction: TradeDirection,
) -> Result<u64, EvaluationError> {
    let (reserve_in, reserve_out) = match direction {
        TradeDirection::Sell => (reserves.reserve_a as u128, reserves.reserve_b as u128),
        TradeDirection::Buy => (reserves.reserve_b as u128, reserves.reserve_a as u128),
    };
    if reserve_in == 0 || reserve_out == 0 {
        return Err(EvaluationError::EmptyReserves);
    }

    let fee_bps = config.fee_bps() as u128;
    let amount_in_with_fee = amount_in as u128 * (10_000 - fee_bps) / 10_000;

    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(EvaluationError::Overflow("expected output"))?;
    let expected_out = numerator / (reserve_in + amount_in_with_fee);
    if expected_out == 0 {
        return Err(EvaluationError::ZeroQuote);
    }

    let deviation = (amount_out as u128).abs_diff(expected_out);
    let millis = (deviation * 1_000 + expected_out / 2) / expected_out;
    u64::try_from(millis).map_err(|_| EvaluationError::Overflow("price impact"))
}
