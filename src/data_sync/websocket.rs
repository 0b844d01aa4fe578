use crate::data_sync::config::MonitorConfig;
use crate::errors::TransportError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// One `logsNotification` unwrapped from its JSON-RPC envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogNotification {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    pub logs: Vec<String>,
}

/// Classification of an inbound stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Integer-valued subscription confirmation sent before the first data
    /// message.
    SubscriptionConfirmed(u64),
    Logs(LogNotification),
    /// Well-formed JSON the monitor has no use for (heartbeats, replies).
    Other,
}

/// Classify one raw stream message.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if let Some(id) = value.get("result").and_then(Value::as_u64) {
        return Ok(InboundMessage::SubscriptionConfirmed(id));
    }
    if let Some(inner) = value.pointer("/params/result/value") {
        let notification: LogNotification = serde_json::from_value(inner.clone())?;
        return Ok(InboundMessage::Logs(notification));
    }
    Ok(InboundMessage::Other)
}

/// Connection lifecycle of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Subscribing,
    Active,
}

/// Reconnect delay after `failures` consecutive failed sessions: doubles
/// from the initial delay and caps at the maximum.
pub fn backoff_delay(initial: Duration, max: Duration, failures: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(failures)).min(max)
}

/// An established streaming connection.
#[async_trait]
pub trait SubscriptionTransport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
    /// Next text message, `None` once the stream is closed.
    async fn next_message(&mut self) -> Option<Result<String, TransportError>>;
}

/// Opens streaming connections. Production uses websockets; tests substitute
/// scripted transports.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn SubscriptionTransport>, TransportError>;
}

pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SubscriptionTransport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn next_message(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.to_string())),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.inner.send(Message::Pong(data)).await {
                        return Some(Err(TransportError::Protocol(e.to_string())));
                    }
                }
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(TransportError::Protocol(e.to_string()))),
                None => return None,
            }
        }
    }
}

pub struct WsConnector;

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn SubscriptionTransport>, TransportError> {
        let url = Url::parse(url).map_err(|e| TransportError::Connect(e.to_string()))?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Box::new(WsTransport { inner: stream }))
    }
}

enum SessionEnd {
    Shutdown,
    Dropped { subscribed: bool },
}

/// Manages the program-log subscription over a reconnecting stream.
///
/// Runs `Disconnected → Subscribing → Active` per session; a dropped
/// connection re-enters `Disconnected` and reconnects with exponential
/// backoff (doubling from the initial delay, capped, reset after a session
/// that reached `Active`). Parsed notifications flow out over an `mpsc`
/// channel; a shutdown channel cancels every wait.
#[derive(Clone)]
pub struct LogStreamManager {
    config: MonitorConfig,
    connector: Arc<dyn TransportConnector>,
}

impl LogStreamManager {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: MonitorConfig, connector: Arc<dyn TransportConnector>) -> Self {
        Self { config, connector }
    }

    /// JSON-RPC request subscribing to logs that mention the AMM program.
    pub fn subscription_request(&self) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.config.subscription_id,
            "method": "logsSubscribe",
            "params": [
                { "mentions": [self.config.amm_program_id] },
                { "commitment": self.config.commitment },
            ],
        })
    }

    /// Start streaming. Returns the notification receiver and a shutdown
    /// sender; sending on the latter (or dropping the receiver) ends the
    /// background task.
    pub async fn subscribe_logs(
        &self,
    ) -> Result<(mpsc::Receiver<LogNotification>, mpsc::Sender<()>), TransportError> {
        let (notify_tx, notify_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let manager = self.clone();
        tokio::spawn(async move {
            let mut failures: u32 = 0;
            loop {
                match manager.run_session(&notify_tx, &mut shutdown_rx).await {
                    Ok(SessionEnd::Shutdown) => {
                        info!("log stream shut down");
                        break;
                    }
                    Ok(SessionEnd::Dropped { subscribed }) => {
                        if subscribed {
                            failures = 0;
                        }
                        failures += 1;
                        warn!(failures, "log stream dropped");
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(failures, error = %e, "log stream connection failed");
                    }
                }

                if failures >= manager.config.max_reconnect_attempts {
                    // Not fatal: keep retrying at the capped delay, but make
                    // the persistent failure visible to the operator.
                    error!(failures, "log stream persistently failing");
                }

                let delay = backoff_delay(
                    manager.config.reconnect_initial_delay(),
                    manager.config.reconnect_max_delay(),
                    failures.saturating_sub(1),
                );
                info!(delay_secs = delay.as_secs(), "reconnecting to log stream");
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown_rx.recv() => {
                        info!("log stream shut down during backoff");
                        break;
                    }
                }
            }
        });

        Ok((notify_rx, shutdown_tx))
    }

    async fn run_session(
        &self,
        notify_tx: &mpsc::Sender<LogNotification>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<SessionEnd, TransportError> {
        let mut state = ConnectionState::Subscribing;
        debug!(?state, url = %self.config.rpc_wss_url, "connecting");

        let mut transport = timeout(
            self.config.ws_connection_timeout(),
            self.connector.connect(&self.config.rpc_wss_url),
        )
        .await
        .map_err(|_| TransportError::Timeout)??;

        transport.send(self.subscription_request().to_string()).await?;

        let mut subscribed = false;
        loop {
            tokio::select! {
                message = transport.next_message() => {
                    let text = match message {
                        Some(Ok(text)) => text,
                        Some(Err(e)) => {
                            warn!(error = %e, "stream error");
                            return Ok(SessionEnd::Dropped { subscribed });
                        }
                        None => {
                            debug!("stream closed by remote");
                            return Ok(SessionEnd::Dropped { subscribed });
                        }
                    };

                    match parse_inbound(&text) {
                        Ok(InboundMessage::SubscriptionConfirmed(id)) => {
                            if !subscribed {
                                subscribed = true;
                                state = ConnectionState::Active;
                                info!(subscription_id = id, ?state, "subscription confirmed");
                            }
                        }
                        Ok(InboundMessage::Logs(notification)) => {
                            // Data implies the subscription went through even
                            // if the confirmation was missed.
                            subscribed = true;
                            match notify_tx.try_send(notification) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    warn!("notification channel full, dropping message");
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => {
                                    return Ok(SessionEnd::Shutdown);
                                }
                            }
                        }
                        Ok(InboundMessage::Other) => {
                            if !subscribed {
                                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                    if let Some(err) = value.get("error") {
                                        return Err(TransportError::SubscriptionRejected(
                                            err.to_string(),
                                        ));
                                    }
                                }
                            }
                            debug!("ignoring non-log message");
                        }
                        Err(e) => {
                            warn!(error = %e, "malformed stream message");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedTransport {
        messages: VecDeque<String>,
    }

    #[async_trait]
    impl SubscriptionTransport for ScriptedTransport {
        async fn send(&mut self, _text: String) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_message(&mut self) -> Option<Result<String, TransportError>> {
            self.messages.pop_front().map(Ok)
        }
    }

    /// Connector yielding one scripted session per queued message list;
    /// queued `None` entries simulate connection failures.
    struct ScriptedConnector {
        sessions: Mutex<VecDeque<Option<Vec<String>>>>,
        connects: AtomicUsize,
    }

    impl ScriptedConnector {
        fn new(sessions: Vec<Option<Vec<String>>>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into()),
                connects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransportConnector for ScriptedConnector {
        async fn connect(
            &self,
            _url: &str,
        ) -> Result<Box<dyn SubscriptionTransport>, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.sessions.lock().unwrap().pop_front() {
                Some(Some(messages)) => Ok(Box::new(ScriptedTransport {
                    messages: messages.into(),
                })),
                Some(None) => Err(TransportError::Connect("scripted failure".to_string())),
                None => Err(TransportError::Connect("no more sessions".to_string())),
            }
        }
    }

    fn notification_json(signature: &str) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "value": {
                        "signature": signature,
                        "slot": 42,
                        "logs": ["Program log: Instruction: Swap"],
                    }
                },
                "subscription": 1,
            }
        })
        .to_string()
    }

    #[test]
    fn subscription_request_mentions_the_program() {
        let manager = LogStreamManager::new(MonitorConfig::default());
        let request = manager.subscription_request();

        assert_eq!(request["method"], "logsSubscribe");
        assert_eq!(
            request["params"][0]["mentions"][0],
            MonitorConfig::default().amm_program_id
        );
        assert_eq!(request["params"][1]["commitment"], "confirmed");
    }

    #[test]
    fn parse_inbound_classifies_messages() {
        let confirmation = r#"{"jsonrpc":"2.0","result":23,"id":1}"#;
        assert_eq!(
            parse_inbound(confirmation).unwrap(),
            InboundMessage::SubscriptionConfirmed(23)
        );

        let logs = notification_json("sig1");
        match parse_inbound(&logs).unwrap() {
            InboundMessage::Logs(notification) => {
                assert_eq!(notification.signature, "sig1");
                assert_eq!(notification.slot, 42);
                assert_eq!(notification.logs.len(), 1);
            }
            other => panic!("expected logs, got {other:?}"),
        }

        let unrelated = r#"{"jsonrpc":"2.0","method":"somethingElse"}"#;
        assert_eq!(parse_inbound(unrelated).unwrap(), InboundMessage::Other);

        assert!(parse_inbound("not json").is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let initial = Duration::from_secs(5);
        let max = Duration::from_secs(60);

        let delays: Vec<u64> = (0..6)
            .map(|failures| backoff_delay(initial, max, failures).as_secs())
            .collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_notifications_after_confirmation() {
        let connector = Arc::new(ScriptedConnector::new(vec![Some(vec![
            r#"{"jsonrpc":"2.0","result":1,"id":1}"#.to_string(),
            notification_json("sig_a"),
            notification_json("sig_b"),
        ])]));
        let manager = LogStreamManager::with_connector(MonitorConfig::default(), connector);

        let (mut rx, _shutdown) = manager.subscribe_logs().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().signature, "sig_a");
        assert_eq!(rx.recv().await.unwrap().signature, "sig_b");
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_a_failed_session() {
        let connector = Arc::new(ScriptedConnector::new(vec![
            None,
            Some(vec![
                r#"{"jsonrpc":"2.0","result":1,"id":1}"#.to_string(),
                notification_json("after_reconnect"),
            ]),
        ]));
        let manager =
            LogStreamManager::with_connector(MonitorConfig::default(), connector.clone());

        let (mut rx, _shutdown) = manager.subscribe_logs().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().signature, "after_reconnect");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_subscription_triggers_reconnect() {
        let connector = Arc::new(ScriptedConnector::new(vec![
            Some(vec![
                r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"bad filter"},"id":1}"#
                    .to_string(),
            ]),
            Some(vec![
                r#"{"jsonrpc":"2.0","result":1,"id":1}"#.to_string(),
                notification_json("recovered"),
            ]),
        ]));
        let manager =
            LogStreamManager::with_connector(MonitorConfig::default(), connector.clone());

        let (mut rx, _shutdown) = manager.subscribe_logs().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().signature, "recovered");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ends_the_stream_task() {
        let connector = Arc::new(ScriptedConnector::new(vec![Some(vec![
            r#"{"jsonrpc":"2.0","result":1,"id":1}"#.to_string(),
        ])]));
        let manager = LogStreamManager::with_connector(MonitorConfig::default(), connector);

        let (mut rx, shutdown) = manager.subscribe_logs().await.unwrap();
        shutdown.send(()).await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
