/// Execution Layer - Sandwich Submission
///
/// Turns a confirmed opportunity into the front-run / back-run transaction
/// pair and drives it through the submitter collaborator with bounded
/// retries and confirmation polling.

pub mod executor;

pub use executor::{
    SandwichExecutor, TradeParams, TransactionSubmitter, build_sandwich_params,
};
