//! Field-name normalization for heterogeneous push payloads.
//!
//! The backend emits alerts through several code paths with diverging field
//! names (`symbol` vs `ticker` vs `sym`, `confidence` vs `conf`, ...). Every
//! payload is funneled through here before a subscriber callback sees it, so
//! callbacks always observe one stable shape. Non-object payloads are passed
//! through unchanged rather than rejected.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::types::NormalizedAlert;

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key))
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn first_finite(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_f64))
        .filter(|value| value.is_finite())
}

fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Percentage on the 0–100 scale from a raw confidence in [0, 1], with one
/// decimal of precision: `round(confidence * 1000) / 10`.
pub fn confidence_to_pct(confidence: f64) -> f64 {
    (confidence * 1000.0).round() / 10.0
}

/// Maps an arbitrary alert payload to the stable [`NormalizedAlert`] shape.
/// Aliases are tried in priority order, first present wins.
pub fn normalize_alert(raw: Value) -> Value {
    let Value::Object(ref obj) = raw else {
        return raw;
    };
    let meta = first_present(obj, &["metadata", "meta"]).and_then(Value::as_object);

    let id = first_present(obj, &["id", "alert_id", "_id"]).and_then(coerce_id);
    let symbol = first_string(obj, &["symbol", "ticker", "sym"]).unwrap_or_default();
    let alert_type = first_string(obj, &["alert_type", "type", "pattern_type", "name"])
        .unwrap_or_else(|| "Pattern".to_string());
    let message = first_string(obj, &["message"])
        .or_else(|| meta.and_then(|meta| first_string(meta, &["message"])));
    let confidence = first_finite(obj, &["confidence", "conf"])
        .or_else(|| meta.and_then(|meta| first_finite(meta, &["confidence"])));
    let confidence_pct =
        first_finite(obj, &["confidence_pct"]).or_else(|| confidence.map(confidence_to_pct));
    let price = first_finite(obj, &["price", "entry"]);
    let timestamp = first_string(obj, &["timestamp", "created_at", "detected_at"])
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    let alert = NormalizedAlert {
        id,
        symbol,
        alert_type,
        message,
        confidence,
        confidence_pct,
        price,
        timestamp,
    };
    match serde_json::to_value(&alert) {
        Ok(normalized) => normalized,
        Err(_) => raw,
    }
}

/// Maps a scan payload to the stable shape: the two server-labeled pattern
/// groups are concatenated as `patterns`, intraday first, contextual second.
pub fn normalize_scan_result(raw: Value) -> Value {
    let Value::Object(ref obj) = raw else {
        return raw;
    };

    let mut patterns: Vec<Value> = Vec::new();
    for group in ["intraday_patterns", "context_patterns"] {
        if let Some(Value::Array(items)) = obj.get(group) {
            patterns.extend(items.iter().cloned());
        }
    }
    if patterns.is_empty() {
        if let Some(Value::Array(items)) = obj.get("patterns") {
            patterns = items.clone();
        }
    }

    let mut normalized = Map::new();
    normalized.insert(
        "symbol".to_string(),
        Value::String(first_string(obj, &["symbol", "ticker", "sym"]).unwrap_or_default()),
    );
    normalized.insert("patterns".to_string(), Value::Array(patterns));
    if let Some(price) = first_finite(obj, &["price"]) {
        normalized.insert("price".to_string(), Value::from(price));
    }
    if let Some(change) = first_finite(obj, &["change_percent", "changePercent"]) {
        normalized.insert("change_percent".to_string(), Value::from(change));
    }
    normalized.insert(
        "timestamp".to_string(),
        Value::String(
            first_string(obj, &["timestamp"]).unwrap_or_else(|| Utc::now().to_rfc3339()),
        ),
    );
    Value::Object(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_confidence_pct_from_fractional_confidence() {
        let normalized = normalize_alert(json!({"symbol": "AAPL", "confidence": 0.873}));
        assert_eq!(normalized["confidence_pct"], json!(87.3));
        assert_eq!(normalized["confidence"], json!(0.873));
    }

    #[test]
    fn keeps_explicit_confidence_pct() {
        let normalized =
            normalize_alert(json!({"symbol": "AAPL", "confidence": 0.5, "confidence_pct": 51.0}));
        assert_eq!(normalized["confidence_pct"], json!(51.0));
    }

    #[test]
    fn aliases_ticker_to_symbol() {
        let normalized = normalize_alert(json!({"ticker": "MSFT"}));
        assert_eq!(normalized["symbol"], "MSFT");
    }

    #[test]
    fn passes_non_object_payloads_through_unchanged() {
        assert_eq!(normalize_alert(Value::Null), Value::Null);
        assert_eq!(
            normalize_alert(json!("not an alert")),
            json!("not an alert")
        );
        assert_eq!(normalize_scan_result(json!(42)), json!(42));
    }

    #[test]
    fn normalizes_terse_backend_shape() {
        let normalized = normalize_alert(json!({
            "type": "bearish_engulfing",
            "sym": "TSLA",
            "conf": 0.62,
            "entry": 241.5
        }));
        assert_eq!(normalized["symbol"], "TSLA");
        assert_eq!(normalized["alert_type"], "bearish_engulfing");
        assert_eq!(normalized["confidence"], json!(0.62));
        assert_eq!(normalized["confidence_pct"], json!(62.0));
        assert_eq!(normalized["price"], json!(241.5));
        assert!(normalized["timestamp"].is_string());
    }

    #[test]
    fn falls_back_to_metadata_confidence_and_message() {
        let normalized = normalize_alert(json!({
            "symbol": "NVDA",
            "metadata": {"confidence": 0.91, "message": "breakout"}
        }));
        assert_eq!(normalized["confidence"], json!(0.91));
        assert_eq!(normalized["confidence_pct"], json!(91.0));
        assert_eq!(normalized["message"], "breakout");
    }

    #[test]
    fn defaults_alert_type_and_symbol() {
        let normalized = normalize_alert(json!({"price": 10.0}));
        assert_eq!(normalized["alert_type"], "Pattern");
        assert_eq!(normalized["symbol"], "");
    }

    #[test]
    fn coerces_numeric_id_to_string() {
        let normalized = normalize_alert(json!({"alert_id": 42, "symbol": "AMD"}));
        assert_eq!(normalized["id"], "42");
    }

    #[test]
    fn ignores_non_numeric_confidence() {
        let normalized = normalize_alert(json!({"symbol": "AMD", "confidence": "high"}));
        assert!(normalized.get("confidence").is_none());
        assert!(normalized.get("confidence_pct").is_none());
    }

    #[test]
    fn scan_groups_concatenate_intraday_before_context() {
        let normalized = normalize_scan_result(json!({
            "symbol": "SPY",
            "intraday_patterns": [{"pattern_name": "hammer"}],
            "context_patterns": [{"pattern_name": "uptrend"}],
            "price": 456.1,
            "changePercent": 0.4
        }));
        let patterns = normalized["patterns"].as_array().unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0]["pattern_name"], "hammer");
        assert_eq!(patterns[1]["pattern_name"], "uptrend");
        assert_eq!(normalized["change_percent"], json!(0.4));
    }

    #[test]
    fn scan_accepts_already_flat_pattern_list() {
        let normalized = normalize_scan_result(json!({
            "symbol": "QQQ",
            "patterns": [{"pattern_name": "doji"}]
        }));
        assert_eq!(normalized["patterns"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn typed_scan_result_deserializes_from_normalized_value() {
        let normalized = normalize_scan_result(json!({
            "ticker": "SPY",
            "intraday_patterns": [{
                "symbol": "SPY",
                "pattern_name": "hammer",
                "confidence": 71.0,
                "pattern_type": "bullish",
                "timestamp": "2026-08-30T14:00:00Z"
            }],
            "price": 456.1,
            "change_percent": 0.4,
            "timestamp": "2026-08-30T14:00:00Z"
        }));
        let scan: crate::types::ScanResult =
            serde_json::from_value(normalized).expect("normalized scan is always typed");
        assert_eq!(scan.symbol, "SPY");
        assert_eq!(scan.patterns.len(), 1);
        assert_eq!(scan.patterns[0].pattern_name, "hammer");
        assert_eq!(scan.change_percent, 0.4);
    }

    #[test]
    fn typed_alert_deserializes_from_normalized_value() {
        let normalized = normalize_alert(json!({
            "alert_id": "a-1",
            "ticker": "TSLA",
            "pattern_type": "bearish_engulfing",
            "confidence": 0.62,
            "entry": 241.5,
            "created_at": "2026-08-30T12:00:00Z"
        }));
        let alert: crate::types::NormalizedAlert =
            serde_json::from_value(normalized).expect("normalized shape is always typed");
        assert_eq!(alert.id.as_deref(), Some("a-1"));
        assert_eq!(alert.symbol, "TSLA");
        assert_eq!(alert.timestamp, "2026-08-30T12:00:00Z");
    }
}
