pub mod manager;
pub mod normalize;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

// Server-emitted events. Both alert names carry "new alert" payloads and
// both scan names carry "scan update" payloads.
pub const PATTERN_ALERT_EVENT: &str = "pattern_alert";
pub const NEW_ALERT_EVENT: &str = "new_alert";
pub const SCAN_UPDATE_EVENT: &str = "scan_update";
pub const MARKET_SCAN_UPDATE_EVENT: &str = "market_scan_update";
pub const CONNECTION_STATUS_EVENT: &str = "connection_status";
pub const SUBSCRIPTION_STATUS_EVENT: &str = "subscription_status";
pub const RECONNECT_EVENT: &str = "reconnect";

// Client-emitted subscription intents.
pub const SUBSCRIBE_ALERTS_EVENT: &str = "subscribe_alerts";
pub const SUBSCRIBE_SCAN_RESULTS_EVENT: &str = "subscribe_scan_results";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why the connection went down. Kept as an enum so the reconnect decision
/// is a table lookup, not a string comparison against server literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server sent a close frame.
    ServerClose,
    /// Read or write on the socket failed, or the stream ended.
    TransportError,
    /// `disconnect()` or shutdown was requested locally.
    ClientRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectAction {
    Reconnect,
    Stay,
}

pub fn reconnect_action(reason: DisconnectReason) -> DisconnectAction {
    match reason {
        DisconnectReason::ServerClose | DisconnectReason::TransportError => {
            DisconnectAction::Reconnect
        }
        DisconnectReason::ClientRequest => DisconnectAction::Stay,
    }
}

/// One push-channel message: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn intent(event: &str) -> Self {
        Self {
            event: event.to_string(),
            data: Value::Null,
        }
    }
}

pub fn parse_push_frame(payload: &mut [u8]) -> Result<PushFrame, ClientError> {
    let frame: PushFrame = simd_json::serde::from_slice(payload)?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_frame_with_payload() {
        let mut payload =
            br#"{"event":"pattern_alert","data":{"symbol":"TSLA","confidence":0.62}}"#.to_vec();
        let frame = parse_push_frame(&mut payload).expect("frame should parse");
        assert_eq!(frame.event, PATTERN_ALERT_EVENT);
        assert_eq!(frame.data["symbol"], "TSLA");
    }

    #[test]
    fn parses_push_frame_without_payload() {
        let mut payload = br#"{"event":"reconnect"}"#.to_vec();
        let frame = parse_push_frame(&mut payload).expect("frame should parse");
        assert_eq!(frame.event, RECONNECT_EVENT);
        assert!(frame.data.is_null());
    }

    #[test]
    fn rejects_frame_without_event_name() {
        let mut payload = br#"{"data":{}}"#.to_vec();
        assert!(parse_push_frame(&mut payload).is_err());
    }

    #[test]
    fn reconnects_only_on_remote_causes() {
        assert_eq!(
            reconnect_action(DisconnectReason::ServerClose),
            DisconnectAction::Reconnect
        );
        assert_eq!(
            reconnect_action(DisconnectReason::TransportError),
            DisconnectAction::Reconnect
        );
        assert_eq!(
            reconnect_action(DisconnectReason::ClientRequest),
            DisconnectAction::Stay
        );
    }
}
