/// Data Synchronization Layer
///
/// This layer owns everything between the network and the logic layer:
///
/// - WebSocket subscription to AMM program logs, with a reconnecting
///   backoff state machine
/// - Local request rate limiting (sliding window)
/// - The monitor service that sequences decode → registry → evaluation →
///   dispatch for every inbound notification
/// - Pipeline configuration

// Core data sync components
pub mod config;
pub mod rate_limiter;
pub mod service;
pub mod websocket;


// Re-export main components for easy usage
pub use config::MonitorConfig;
pub use rate_limiter::RateLimiter;
pub use service::{MonitorService, MonitorStats, synthetic_swap_notification};
pub use websocket::{
    ConnectionState, InboundMessage, LogNotification, LogStreamManager, SubscriptionTransport,
    TransportConnector, WsConnector, backoff_delay, parse_inbound,
};
