use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::normalize::{normalize_alert, normalize_scan_result};
use crate::channel::{
    parse_push_frame, reconnect_action, ChannelState, DisconnectAction, DisconnectReason,
    PushFrame, CONNECTION_STATUS_EVENT, MARKET_SCAN_UPDATE_EVENT, NEW_ALERT_EVENT,
    PATTERN_ALERT_EVENT, RECONNECT_EVENT, SCAN_UPDATE_EVENT, SUBSCRIBE_ALERTS_EVENT,
    SUBSCRIBE_SCAN_RESULTS_EVENT, SUBSCRIPTION_STATUS_EVENT,
};
use crate::config::ClientConfig;
use crate::error::ClientError;

pub type PushStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PushCallback = Arc<dyn Fn(Value) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
}

impl ChannelConfig {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.push_endpoint(),
            connect_timeout: config.connect_timeout,
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_base_delay: config.reconnect_base_delay,
        }
    }
}

/// Linear backoff: attempt n (1-indexed) waits `n * base` before retrying.
pub fn reconnect_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt)
}

#[derive(Default)]
struct CallbackRegistry {
    alerts: Option<PushCallback>,
    scans: Option<PushCallback>,
    subscription_status: Option<PushCallback>,
}

impl CallbackRegistry {
    fn pending_intents(&self) -> Vec<PushFrame> {
        let mut intents = Vec::new();
        if self.alerts.is_some() {
            intents.push(PushFrame::intent(SUBSCRIBE_ALERTS_EVENT));
        }
        if self.scans.is_some() {
            intents.push(PushFrame::intent(SUBSCRIBE_SCAN_RESULTS_EVENT));
        }
        intents
    }
}

struct ChannelHandle {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

/// Owns the single push-channel connection for the process. Translates
/// server push events into typed callbacks; the connection task reconnects
/// with linear backoff when the remote side drops it.
pub struct ChannelManager {
    config: ChannelConfig,
    state: Arc<Mutex<ChannelState>>,
    registry: Arc<Mutex<CallbackRegistry>>,
    outgoing: Arc<Mutex<Option<mpsc::UnboundedSender<PushFrame>>>>,
    runtime: tokio::sync::Mutex<Option<ChannelHandle>>,
}

impl ChannelManager {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: ChannelConfig::new(config),
            state: Arc::new(Mutex::new(ChannelState::Disconnected)),
            registry: Arc::new(Mutex::new(CallbackRegistry::default())),
            outgoing: Arc::new(Mutex::new(None)),
            runtime: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Idempotent: resolves immediately when already connected. Only the
    /// first error of a connect cycle is surfaced; later automatic reconnect
    /// attempts are silent until the ceiling is hit.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut runtime = self.runtime.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        if let Some(stale) = runtime.take() {
            stale.cancel.cancel();
            let _ = stale.join.await;
        }

        set_state(&self.state, ChannelState::Connecting);
        let stream = match tokio::time::timeout(
            self.config.connect_timeout,
            open_push_stream(&self.config.endpoint),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(error)) => {
                set_state(&self.state, ChannelState::Disconnected);
                return Err(error);
            }
            Err(_) => {
                set_state(&self.state, ChannelState::Disconnected);
                return Err(ClientError::ConnectTimeout);
            }
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        *self.outgoing.lock() = Some(sender);
        set_state(&self.state, ChannelState::Connected);
        debug!(endpoint = %self.config.endpoint, "push channel connected");

        let cancel = CancellationToken::new();
        let join = tokio::spawn(run_channel(
            stream,
            self.config.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.registry),
            receiver,
            cancel.clone(),
        ));
        *runtime = Some(ChannelHandle { cancel, join });
        Ok(())
    }

    /// Tears the connection down and resets reconnect bookkeeping. Safe to
    /// call when already disconnected.
    pub async fn disconnect(&self) {
        let handle = self.runtime.lock().await.take();
        *self.outgoing.lock() = None;
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let _ = handle.join.await;
        }
        set_state(&self.state, ChannelState::Disconnected);
    }

    /// Registers `callback` for both server alert event names and emits the
    /// subscription intent. Errors without registering anything when the
    /// channel is not connected. The callback always receives the normalized
    /// alert shape.
    pub fn subscribe_to_alerts<F>(&self, callback: F) -> Result<(), ClientError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.send_intent(SUBSCRIBE_ALERTS_EVENT)?;
        self.registry.lock().alerts = Some(Arc::new(callback));
        Ok(())
    }

    /// Registers `callback` for both scan event names; payloads pass through
    /// the scan normalizer.
    pub fn subscribe_to_scan_results<F>(&self, callback: F) -> Result<(), ClientError>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.send_intent(SUBSCRIBE_SCAN_RESULTS_EVENT)?;
        self.registry.lock().scans = Some(Arc::new(callback));
        Ok(())
    }

    /// No-op when never subscribed.
    pub fn unsubscribe_from_alerts(&self) {
        self.registry.lock().alerts = None;
    }

    pub fn unsubscribe_from_scan_results(&self) {
        self.registry.lock().scans = None;
    }

    /// Local observer for `subscription_status` acknowledgements.
    pub fn on_subscription_status<F>(&self, callback: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.registry.lock().subscription_status = Some(Arc::new(callback));
    }

    fn send_intent(&self, event: &str) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let sender = self
            .outgoing
            .lock()
            .clone()
            .ok_or(ClientError::NotConnected)?;
        sender
            .send(PushFrame::intent(event))
            .map_err(|_| ClientError::NotConnected)
    }

    #[cfg(test)]
    fn has_alert_callback(&self) -> bool {
        self.registry.lock().alerts.is_some()
    }
}

fn set_state(state: &Mutex<ChannelState>, next: ChannelState) {
    *state.lock() = next;
}

async fn open_push_stream(endpoint: &str) -> Result<PushStream, ClientError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(64 << 20),
        max_frame_size: Some(16 << 20),
        ..Default::default()
    };
    let (stream, _) = connect_async_with_config(endpoint, Some(ws_config), true).await?;
    Ok(stream)
}

/// Connection task: pumps one connection until it drops, then consults the
/// reason table. Remote causes trigger the backoff loop; a local request
/// ends the task with the channel left Disconnected.
async fn run_channel(
    initial: PushStream,
    config: ChannelConfig,
    state: Arc<Mutex<ChannelState>>,
    registry: Arc<Mutex<CallbackRegistry>>,
    mut outgoing: mpsc::UnboundedReceiver<PushFrame>,
    cancel: CancellationToken,
) {
    let mut stream = initial;
    let mut resubscribe = false;
    loop {
        let reason = pump_connection(stream, &registry, &mut outgoing, &cancel, resubscribe).await;
        set_state(&state, ChannelState::Disconnected);
        debug!(?reason, "push channel disconnected");

        if reconnect_action(reason) == DisconnectAction::Stay {
            break;
        }
        match reconnect_with_backoff(&config, &state, &cancel).await {
            Some(next) => {
                set_state(&state, ChannelState::Connected);
                debug!("push channel reconnected");
                stream = next;
                resubscribe = true;
            }
            None => break,
        }
    }
    set_state(&state, ChannelState::Disconnected);
}

async fn pump_connection(
    stream: PushStream,
    registry: &Arc<Mutex<CallbackRegistry>>,
    outgoing: &mut mpsc::UnboundedReceiver<PushFrame>,
    cancel: &CancellationToken,
    resubscribe: bool,
) -> DisconnectReason {
    let (mut sink, mut reader) = stream.split();

    if resubscribe {
        let intents = registry.lock().pending_intents();
        for intent in intents {
            if send_frame(&mut sink, &intent).await.is_err() {
                return DisconnectReason::TransportError;
            }
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return DisconnectReason::ClientRequest;
            }
            command = outgoing.recv() => {
                match command {
                    Some(frame) => {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            return DisconnectReason::TransportError;
                        }
                    }
                    None => return DisconnectReason::ClientRequest,
                }
            }
            message = reader.next() => {
                match message {
                    None => return DisconnectReason::TransportError,
                    Some(Err(error)) => {
                        warn!(%error, "push channel read failed");
                        return DisconnectReason::TransportError;
                    }
                    Some(Ok(Message::Close(_))) => return DisconnectReason::ServerClose,
                    Some(Ok(Message::Text(text))) => {
                        dispatch_payload(registry, text.into_bytes());
                    }
                    Some(Ok(Message::Binary(payload))) => {
                        dispatch_payload(registry, payload);
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn send_frame(
    sink: &mut (impl futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
              + Unpin),
    frame: &PushFrame,
) -> Result<(), ClientError> {
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

fn dispatch_payload(registry: &Arc<Mutex<CallbackRegistry>>, mut payload: Vec<u8>) {
    match parse_push_frame(payload.as_mut_slice()) {
        Ok(frame) => dispatch_frame(registry, frame),
        Err(error) => debug!(%error, "ignoring undecodable push frame"),
    }
}

fn dispatch_frame(registry: &Arc<Mutex<CallbackRegistry>>, frame: PushFrame) {
    let PushFrame { event, data } = frame;
    match event.as_str() {
        PATTERN_ALERT_EVENT | NEW_ALERT_EVENT => {
            let normalized = normalize_alert(data);
            debug!(
                %event,
                symbol = normalized.get("symbol").and_then(serde_json::Value::as_str).unwrap_or(""),
                "alert received"
            );
            let callback = registry.lock().alerts.clone();
            if let Some(callback) = callback {
                callback(normalized);
            }
        }
        SCAN_UPDATE_EVENT | MARKET_SCAN_UPDATE_EVENT => {
            let normalized = normalize_scan_result(data);
            debug!(
                %event,
                symbol = normalized.get("symbol").and_then(serde_json::Value::as_str).unwrap_or(""),
                "scan update received"
            );
            let callback = registry.lock().scans.clone();
            if let Some(callback) = callback {
                callback(normalized);
            }
        }
        SUBSCRIPTION_STATUS_EVENT => {
            let callback = registry.lock().subscription_status.clone();
            match callback {
                Some(callback) => callback(data),
                None => debug!("subscription status: {data}"),
            }
        }
        CONNECTION_STATUS_EVENT | RECONNECT_EVENT => {
            debug!(%event, "channel status event: {data}");
        }
        other => debug!(event = %other, "ignoring unknown push event"),
    }
}

async fn reconnect_with_backoff(
    config: &ChannelConfig,
    state: &Arc<Mutex<ChannelState>>,
    cancel: &CancellationToken,
) -> Option<PushStream> {
    for attempt in 1..=config.max_reconnect_attempts {
        set_state(state, ChannelState::Connecting);
        let delay = reconnect_delay(attempt, config.reconnect_base_delay);
        debug!(attempt, ?delay, "reconnection attempt scheduled");
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        match tokio::time::timeout(
            config.connect_timeout,
            open_push_stream(&config.endpoint),
        )
        .await
        {
            Ok(Ok(stream)) => return Some(stream),
            Ok(Err(error)) => warn!(attempt, %error, "reconnection attempt failed"),
            Err(_) => warn!(attempt, "reconnection attempt timed out"),
        }
    }
    warn!(
        attempts = config.max_reconnect_attempts,
        "max reconnection attempts reached"
    );
    None
}
