use thiserror::Error;

/// Failure to recover a swap record from a ray_log payload.
///
/// Decode errors are always recoverable: the monitor drops the log entry and
/// keeps consuming the stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty ray_log payload")]
    Empty,
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("no layout matched {0}-byte payload")]
    UnknownLayout(usize),
    #[error("decoded amounts are zero")]
    ZeroAmounts,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unsupported pool: {0}")]
    UnsupportedPool(String),
    #[error("no account configured for pool {0}")]
    MissingAccount(String),
    #[error("pool account data too short: {0} bytes")]
    AccountTooShort(usize),
    #[error("account read failed: {0}")]
    AccountRead(String),
}

/// Arithmetic failure inside the evaluator. Callers map this to a zeroed,
/// non-profitable result instead of propagating.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("pool has no liquidity")]
    EmptyReserves,
    #[error("constant-product quote collapsed to zero")]
    ZeroQuote,
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection timed out")]
    Timeout,
    #[error("subscription rejected: {0}")]
    SubscriptionRejected(String),
    #[error("websocket error: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("transaction submission failed: {0}")]
    Submit(String),
    #[error("transaction {0} not confirmed")]
    Unconfirmed(String),
    #[error("rate limited by provider")]
    RateLimited,
    #[error("max retries exceeded")]
    RetriesExhausted,
}
