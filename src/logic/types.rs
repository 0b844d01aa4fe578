use strum_macros::{Display, EnumString};

/// Trading pair served by a supported AMM pool.
///
/// The string form is the pair key used in configuration files and log
/// output (e.g. "SOL/USDC").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum PoolKey {
    #[strum(serialize = "SOL/USDC")]
    SolUsdc,
    #[strum(serialize = "SOL/USDT")]
    SolUsdt,
}

/// Direction of a detected swap relative to the pair's base token.
///
/// `Sell` is base→quote, `Buy` is quote→base. When the two direction
/// hypotheses are equally consistent with the pool price the evaluator
/// defaults to `Sell`; tests pin this tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// Network congestion level used to scale the gas estimate.
///
/// Supplied by the caller; the evaluator never tries to detect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MarketCondition {
    #[default]
    Normal,
    Congested,
    High,
}

impl MarketCondition {
    pub fn gas_multiplier(self) -> f64 {
        match self {
            MarketCondition::Normal => 1.0,
            MarketCondition::Congested => 1.5,
            MarketCondition::High => 2.0,
        }
    }
}

/// A swap recovered from one ray_log entry.
///
/// Only the amounts are guaranteed: the historical payload layouts omit
/// different subsets of the remaining fields. A record with an unresolved
/// `pool` must be skipped downstream, never evaluated against a guessed
/// pair's economics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRecord {
    pub timestamp_in: Option<u64>,
    /// Input amount in base units. Always positive on successful decode.
    pub amount_in: u64,
    pub pool_id: Option<u64>,
    /// Resolved trading pair, `None` when the pool id has no known mapping.
    pub pool: Option<PoolKey>,
    pub timestamp_out: Option<u64>,
    /// Output amount in base units. Always positive on successful decode.
    pub amount_out: u64,
    pub pool_token: Option<u64>,
    /// Trailing values the matched layout did not assign a meaning to.
    pub extra: Vec<u64>,
}

impl SwapRecord {
    /// Record carrying only the two amounts, as produced by the fallback
    /// layouts.
    pub fn from_amounts(amount_in: u64, amount_out: u64) -> Self {
        Self {
            timestamp_in: None,
            amount_in,
            pool_id: None,
            pool: None,
            timestamp_out: None,
            amount_out,
            pool_token: None,
            extra: Vec::new(),
        }
    }
}

/// Outcome of simulating a sandwich around one detected swap.
///
/// All monetary fields are signed base units. Invariants held by
/// construction: `gross_profit == front_run_profit + back_run_profit` and
/// `net_profit == gross_profit - gas_cost - pool_fees`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationResult {
    pub direction: TradeDirection,
    /// Front-run trade size in base units, bounded by the victim's slippage.
    pub front_run_size: u64,
    /// Unsigned price impact percentage, rounded to one decimal place.
    pub price_impact_pct: f64,
    pub front_run_profit: i64,
    pub back_run_profit: i64,
    pub gross_profit: i64,
    pub gas_cost: i64,
    pub pool_fees: i64,
    pub net_profit: i64,
    pub is_profitable: bool,
}

impl SimulationResult {
    /// Non-profitable result with every field zeroed. Returned when the
    /// profit computation itself fails, so evaluation never aborts the
    /// monitor loop.
    pub fn zeroed() -> Self {
        Self {
            direction: TradeDirection::Sell,
            front_run_size: 0,
            price_impact_pct: 0.0,
            front_run_profit: 0,
            back_run_profit: 0,
            gross_profit: 0,
            gas_cost: 0,
            pool_fees: 0,
            net_profit: 0,
            is_profitable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn pool_key_round_trips_through_pair_string() {
        assert_eq!(PoolKey::SolUsdc.to_string(), "SOL/USDC");
        assert_eq!(PoolKey::from_str("SOL/USDT").unwrap(), PoolKey::SolUsdt);
        assert!(PoolKey::from_str("BTC/USDC").is_err());
    }

    #[test]
    fn market_condition_multipliers() {
        assert_eq!(MarketCondition::Normal.gas_multiplier(), 1.0);
        assert_eq!(MarketCondition::Congested.gas_multiplier(), 1.5);
        assert_eq!(MarketCondition::High.gas_multiplier(), 2.0);
        assert_eq!(MarketCondition::default(), MarketCondition::Normal);
    }

    #[test]
    fn zeroed_result_is_not_profitable() {
        let result = SimulationResult::zeroed();
        assert!(!result.is_profitable);
        assert_eq!(result.net_profit, 0);
        assert_eq!(
            result.net_profit,
            result.gross_profit - result.gas_cost - result.pool_fees
        );
    }
}
