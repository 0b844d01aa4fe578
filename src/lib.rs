// Three-Layer Architecture
pub mod data_sync; // Data Layer: log stream subscription, rate limiting, monitor service
pub mod logic; // Logic Layer: ray_log decoding, pool registry, opportunity evaluation
pub mod execution; // Execution Layer: sandwich transaction submission

// Common utilities and types
pub mod utils;

// Error taxonomy shared across layers
pub mod errors;

// Re-export key components from each layer
pub use data_sync::{
    ConnectionState, InboundMessage, LogNotification, LogStreamManager, MonitorConfig,
    MonitorService, MonitorStats, RateLimiter, SubscriptionTransport, TransportConnector,
    WsConnector, backoff_delay, parse_inbound, synthetic_swap_notification,
};
pub use errors::{DecodeError, EvaluationError, ExecutionError, RegistryError, TransportError};
pub use execution::{SandwichExecutor, TradeParams, TransactionSubmitter, build_sandwich_params};
pub use logic::{
    AccountReader, MarketCondition, OpportunityEvaluator, PoolAccounts, PoolConfig, PoolKey,
    PoolRegistry, PoolReserveSnapshot, RayLogDecoder, SimulationResult, SwapRecord,
    TradeDirection, calculate_fees, estimate_gas_cost, trade_direction,
};
pub use utils::{LoadConfigError, load_from_file, load_from_file_sync};
