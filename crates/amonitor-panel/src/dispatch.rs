//! Building outbound action messages from operator input.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{
    ACTION_SET_MAX_CONCURRENCY, ActionParams, AgentActionEnvelope, AgentActionPayload,
    DirectAction, MESSAGE_TYPE_ACTION, OutboundAction,
};

/// Why an action was not sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("not connected, cannot send action")]
    NotConnected,
    #[error("set_max_concurrency needs a number >= 1, got {0:?}")]
    InvalidConcurrency(String),
    #[error("target_id and target_url are required when forwarding through the agent")]
    MissingAgentTarget,
}

/// Operator input for a single action send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDraft {
    pub action: String,
    pub value: String,
    pub use_agent_envelope: bool,
    pub target_id: String,
    pub target_url: String,
}

impl ActionDraft {
    /// Validate the draft and build the wire message, stamping agent envelopes
    /// with fresh ids and `timestamp_ms`.
    pub fn build(&self, timestamp_ms: i64) -> Result<OutboundAction, DispatchError> {
        let value = action_value(&self.action, &self.value)?;

        if !self.use_agent_envelope {
            return Ok(OutboundAction::Direct(DirectAction {
                kind: MESSAGE_TYPE_ACTION,
                action: self.action.clone(),
                value,
            }));
        }

        let target_id = self.target_id.trim();
        let target_url = self.target_url.trim();
        if target_id.is_empty() || target_url.is_empty() {
            return Err(DispatchError::MissingAgentTarget);
        }

        Ok(OutboundAction::Agent(AgentActionEnvelope {
            msg_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            kind: MESSAGE_TYPE_ACTION,
            target_id: target_id.to_string(),
            timestamp: timestamp_ms,
            payload: AgentActionPayload {
                action: self.action.clone(),
                params: ActionParams { value },
                target_url: target_url.to_string(),
            },
        }))
    }
}

fn action_value(action: &str, raw: &str) -> Result<Value, DispatchError> {
    if action != ACTION_SET_MAX_CONCURRENCY {
        return Ok(Value::String(raw.to_string()));
    }
    match parse_number(raw) {
        Some(number) if number.is_finite() && number >= 1.0 => Ok(number_value(number)),
        _ => Err(DispatchError::InvalidConcurrency(raw.to_string())),
    }
}

/// Lenient numeric parse: surrounding whitespace is ignored and blank input is 0.
fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok()
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        Value::from(number)
    }
}
