/// Logic Layer - Sandwich Opportunity Engine
///
/// This layer is responsible for:
/// - Decoding the binary ray_log payload into structured swap records
/// - The supported-pool table and the reserve cache behind it
/// - Price impact, front-run sizing and profitability evaluation
///
/// Everything here is pure in-memory computation: the data layer feeds it
/// log lines, the execution layer consumes its verdicts.

pub mod decoder;
pub mod evaluator;
pub mod registry;
pub mod types;

// Re-export key components from the logic layer
pub use decoder::RayLogDecoder;
pub use evaluator::{OpportunityEvaluator, calculate_fees, estimate_gas_cost, trade_direction};
pub use registry::{AccountReader, PoolAccounts, PoolConfig, PoolRegistry, PoolReserveSnapshot};
pub use types::{MarketCondition, PoolKey, SimulationResult, SwapRecord, TradeDirection};
