//! Wire types exchanged with the monitored service and the agent hub.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::metrics::display_text;

/// Envelope type carrying a live metrics snapshot.
pub const ENVELOPE_METRICS: &str = "metrics";
/// Envelope type sent by a service right after the socket opens.
pub const ENVELOPE_WELCOME: &str = "welcome";
/// Acknowledgement of a direct action, sent by the service.
pub const ENVELOPE_ACK: &str = "ack";
/// Acknowledgement of an agent-forwarded action, sent by the agent hub.
pub const ENVELOPE_ACTION_ACK: &str = "action_ack";
/// Error report from the service.
pub const ENVELOPE_ERROR: &str = "error";

pub const MESSAGE_TYPE_ACTION: &str = "action";
pub const MESSAGE_TYPE_CHAT: &str = "chat";

/// Action name whose value must be a number `>= 1`.
pub const ACTION_SET_MAX_CONCURRENCY: &str = "set_max_concurrency";
pub const ACTION_RESET_METRICS: &str = "reset_metrics";

/// Inbound envelope: a `type` discriminator plus an optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct WsEnvelope {
    pub kind: String,
    pub payload: Option<Value>,
}

impl WsEnvelope {
    /// Interpret a decoded JSON frame as an envelope.
    ///
    /// Non-object frames have neither a type nor a payload. A payload that is
    /// JSON-falsy (`null`, `false`, `0`, `""`) is treated as absent.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self {
                kind: String::new(),
                payload: None,
            };
        };
        let kind = match object.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => String::new(),
        };
        let payload = object.remove("payload").filter(is_truthy);
        Self { kind, payload }
    }

    /// Parse a raw text frame.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Value>(text).map(Self::from_value)
    }

    /// Whether this envelope carries metrics that should be rendered.
    pub fn carries_metrics(&self) -> bool {
        self.payload.is_some() && (self.kind == ENVELOPE_METRICS || self.kind == ENVELOPE_WELCOME)
    }

    /// Payload as a field mapping. Non-object payloads map to an empty object.
    pub fn payload_fields(&self) -> Map<String, Value> {
        match &self.payload {
            Some(Value::Object(fields)) => fields.clone(),
            _ => Map::new(),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Named remote target preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub target_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Bare action addressed to the connected service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action: String,
    pub value: Value,
}

/// Action wrapped for routing through the agent hub to a downstream target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentActionEnvelope {
    pub msg_id: Uuid,
    pub trace_id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub target_id: String,
    pub timestamp: i64,
    pub payload: AgentActionPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentActionPayload {
    pub action: String,
    pub params: ActionParams,
    pub target_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionParams {
    pub value: Value,
}

/// Outbound action in one of its two wire shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundAction {
    Direct(DirectAction),
    Agent(AgentActionEnvelope),
}

impl OutboundAction {
    pub fn action_name(&self) -> &str {
        match self {
            Self::Direct(direct) => &direct.action,
            Self::Agent(envelope) => &envelope.payload.action,
        }
    }

    /// Message id, present only on agent-wrapped actions.
    pub fn msg_id(&self) -> Option<Uuid> {
        match self {
            Self::Direct(_) => None,
            Self::Agent(envelope) => Some(envelope.msg_id),
        }
    }
}

/// Free-text chat message for the agent hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEnvelope {
    pub msg_id: Uuid,
    pub trace_id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: i64,
    pub payload: ChatPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPayload {
    pub message: String,
}

impl ChatEnvelope {
    pub fn new(message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            msg_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            kind: MESSAGE_TYPE_CHAT,
            timestamp,
            payload: ChatPayload {
                message: message.into(),
            },
        }
    }
}

/// Payload of an `action_ack` envelope from the agent hub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionAckPayload {
    pub action_msg_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of an `ack` envelope from a directly connected service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceAckPayload {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub ok: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Request body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// Response body of `POST /api/generate`.
///
/// Every field is kept as raw JSON so an unexpected type in one field does not
/// lose the others; values are rendered with [`display_text`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub service_name: Option<Value>,
    #[serde(default)]
    pub model: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub token_chars: Option<Value>,
}

impl GenerateResponse {
    /// Generated text, empty when absent.
    pub fn output_text(&self) -> String {
        rendered_or(self.text.as_ref(), "")
    }

    pub fn summary(&self) -> String {
        format!(
            "service={}, model={}, token_chars={}",
            rendered_or(self.service_name.as_ref(), "-"),
            rendered_or(self.model.as_ref(), "-"),
            rendered_or(self.token_chars.as_ref(), "0")
        )
    }
}

fn rendered_or(value: Option<&Value>, default: &str) -> String {
    match value {
        None | Some(Value::Null) => default.to_string(),
        Some(value) => display_text(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_routes_metrics_and_welcome_only() {
        for (kind, expected) in [
            ("metrics", true),
            ("welcome", true),
            ("ack", false),
            ("action_ack", false),
            ("", false),
        ] {
            let envelope = WsEnvelope::from_value(json!({"type": kind, "payload": {"queue_size": 1}}));
            assert_eq!(envelope.carries_metrics(), expected, "type {kind}");
        }
    }

    #[test]
    fn falsy_payloads_count_as_absent() {
        for payload in [json!(null), json!(false), json!(0), json!("")] {
            let envelope = WsEnvelope::from_value(json!({"type": "metrics", "payload": payload}));
            assert!(envelope.payload.is_none());
            assert!(!envelope.carries_metrics());
        }
    }

    #[test]
    fn non_object_payload_renders_as_empty_fields() {
        let envelope = WsEnvelope::from_value(json!({"type": "metrics", "payload": [1, 2]}));
        assert!(envelope.carries_metrics());
        assert!(envelope.payload_fields().is_empty());
    }

    #[test]
    fn non_object_frames_have_no_payload() -> serde_json::Result<()> {
        let envelope = WsEnvelope::parse("42")?;
        assert_eq!(envelope.kind, "");
        assert!(envelope.payload.is_none());
        Ok(())
    }

    #[test]
    fn malformed_frames_fail_to_parse() {
        assert!(WsEnvelope::parse("{not json").is_err());
    }

    #[test]
    fn direct_action_omits_routing_fields() -> serde_json::Result<()> {
        let action = OutboundAction::Direct(DirectAction {
            kind: MESSAGE_TYPE_ACTION,
            action: ACTION_SET_MAX_CONCURRENCY.to_string(),
            value: json!(4),
        });
        assert_eq!(
            serde_json::to_string(&action)?,
            r#"{"type":"action","action":"set_max_concurrency","value":4}"#
        );
        assert_eq!(action.msg_id(), None);
        Ok(())
    }

    #[test]
    fn agent_envelope_nests_action_under_payload() -> serde_json::Result<()> {
        let msg_id = Uuid::new_v4();
        let trace_id = Uuid::new_v4();
        let action = OutboundAction::Agent(AgentActionEnvelope {
            msg_id,
            trace_id,
            kind: MESSAGE_TYPE_ACTION,
            target_id: "svc-a".to_string(),
            timestamp: 1_700_000_000_000,
            payload: AgentActionPayload {
                action: ACTION_RESET_METRICS.to_string(),
                params: ActionParams { value: json!("") },
                target_url: "ws://10.0.0.5:8000/ws".to_string(),
            },
        });

        let value = serde_json::to_value(&action)?;
        assert_eq!(
            value,
            json!({
                "msg_id": msg_id.to_string(),
                "trace_id": trace_id.to_string(),
                "type": "action",
                "target_id": "svc-a",
                "timestamp": 1_700_000_000_000_i64,
                "payload": {
                    "action": "reset_metrics",
                    "params": {"value": ""},
                    "target_url": "ws://10.0.0.5:8000/ws"
                }
            })
        );
        assert_eq!(action.action_name(), "reset_metrics");
        assert_eq!(action.msg_id(), Some(msg_id));
        Ok(())
    }

    #[test]
    fn chat_envelope_gets_fresh_ids() {
        let first = ChatEnvelope::new("hello", 1);
        let second = ChatEnvelope::new("hello", 1);
        assert_ne!(first.msg_id, second.msg_id);
        assert_ne!(first.msg_id, first.trace_id);
        assert_eq!(first.kind, "chat");
    }

    #[test]
    fn generate_summary_uses_placeholders() {
        assert_eq!(
            GenerateResponse::default().summary(),
            "service=-, model=-, token_chars=0"
        );
        let response = GenerateResponse {
            service_name: Some(json!("service-a")),
            model: Some(json!("qwen2.5:7b")),
            text: Some(json!("hi")),
            token_chars: Some(json!(2)),
        };
        assert_eq!(
            response.summary(),
            "service=service-a, model=qwen2.5:7b, token_chars=2"
        );
        assert_eq!(response.output_text(), "hi");
    }

    #[test]
    fn generate_response_tolerates_loose_field_types() -> serde_json::Result<()> {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"text":"hi","token_chars":3.0,"model":7}"#)?;
        assert_eq!(response.output_text(), "hi");
        assert_eq!(response.summary(), "service=-, model=7, token_chars=3");

        let response: GenerateResponse =
            serde_json::from_str(r#"{"text":null,"token_chars":-2.5,"service_name":null}"#)?;
        assert_eq!(response.output_text(), "");
        assert_eq!(response.summary(), "service=-, model=-, token_chars=-2.5");
        Ok(())
    }
}
