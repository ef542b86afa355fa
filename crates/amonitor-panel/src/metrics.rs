//! Projection of a metrics payload onto display text.

use serde_json::{Map, Value};

/// Text shown for each of the nine metrics fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsView {
    pub service_name: String,
    pub model: String,
    pub total_token_chars: String,
    pub last_request_token_chars: String,
    pub gpu_usage: String,
    pub queue_size: String,
    pub in_progress_requests: String,
    pub total_requests: String,
    pub failed_requests: String,
}

impl Default for MetricsView {
    fn default() -> Self {
        Self::from_payload(&Map::new())
    }
}

impl MetricsView {
    /// Render every field from `payload`, falling back to fixed defaults.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        Self {
            service_name: field_text(payload, "service_name", "-"),
            model: field_text(payload, "model", "-"),
            total_token_chars: field_text(payload, "total_token_chars", "0"),
            last_request_token_chars: field_text(payload, "last_request_token_chars", "0"),
            gpu_usage: format!("{}%", field_text(payload, "gpu_utilization", "-1")),
            queue_size: field_text(payload, "queue_size", "0"),
            in_progress_requests: field_text(payload, "in_progress_requests", "0"),
            total_requests: field_text(payload, "total_requests", "0"),
            failed_requests: field_text(payload, "failed_requests", "0"),
        }
    }

    /// Replace all fields from a new payload.
    pub fn apply(&mut self, payload: &Map<String, Value>) {
        *self = Self::from_payload(payload);
    }

    /// Label/value rows in display order.
    pub fn rows(&self) -> [(&'static str, &str); 9] {
        [
            ("service", self.service_name.as_str()),
            ("model", self.model.as_str()),
            ("total token chars", self.total_token_chars.as_str()),
            ("last request token chars", self.last_request_token_chars.as_str()),
            ("gpu", self.gpu_usage.as_str()),
            ("queue size", self.queue_size.as_str()),
            ("in progress", self.in_progress_requests.as_str()),
            ("total requests", self.total_requests.as_str()),
            ("failed requests", self.failed_requests.as_str()),
        ]
    }
}

fn field_text(payload: &Map<String, Value>, key: &str, default: &str) -> String {
    match payload.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(value) => display_text(value),
    }
}

/// Coerce a JSON value to display text the way a script engine's `String(x)`
/// would: arrays join their elements with `,` (null elements render empty) and
/// objects render as `[object Object]`.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => {
            if number.is_i64() || number.is_u64() {
                return number.to_string();
            }
            match number.as_f64() {
                Some(float) if float.fract() == 0.0 && float.abs() < 1e21 => format!("{float:.0}"),
                Some(float) => float.to_string(),
                None => number.to_string(),
            }
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                item => display_text(item),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn empty_payload_renders_defaults() {
        let view = MetricsView::from_payload(&Map::new());
        let texts: Vec<&str> = view.rows().iter().map(|(_, text)| *text).collect();
        assert_eq!(texts, vec!["-", "-", "0", "0", "-1%", "0", "0", "0", "0"]);
    }

    #[test]
    fn full_payload_is_rendered_as_text() {
        let view = MetricsView::from_payload(&fields(json!({
            "service_name": "service-a",
            "model": "qwen2.5:7b",
            "total_token_chars": 1532,
            "last_request_token_chars": 88,
            "gpu_utilization": 37,
            "queue_size": 2,
            "in_progress_requests": 1,
            "total_requests": 40,
            "failed_requests": 3
        })));

        assert_eq!(view.service_name, "service-a");
        assert_eq!(view.model, "qwen2.5:7b");
        assert_eq!(view.total_token_chars, "1532");
        assert_eq!(view.last_request_token_chars, "88");
        assert_eq!(view.gpu_usage, "37%");
        assert_eq!(view.queue_size, "2");
        assert_eq!(view.in_progress_requests, "1");
        assert_eq!(view.total_requests, "40");
        assert_eq!(view.failed_requests, "3");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let view = MetricsView::from_payload(&fields(json!({
            "model": null,
            "gpu_utilization": null
        })));
        assert_eq!(view.model, "-");
        assert_eq!(view.gpu_usage, "-1%");
    }

    #[test]
    fn apply_replaces_previous_values() {
        let mut view = MetricsView::from_payload(&fields(json!({"queue_size": 9})));
        view.apply(&fields(json!({"total_requests": 1})));
        assert_eq!(view.queue_size, "0");
        assert_eq!(view.total_requests, "1");
    }

    #[test]
    fn coercion_matches_script_string_conversion() {
        assert_eq!(display_text(&json!(4.0)), "4");
        assert_eq!(display_text(&json!(12.5)), "12.5");
        assert_eq!(display_text(&json!(-1)), "-1");
        assert_eq!(display_text(&json!(true)), "true");
        assert_eq!(display_text(&json!("37")), "37");
        assert_eq!(display_text(&json!([1, 2])), "1,2");
        assert_eq!(display_text(&json!([1, null, [2, 3.0]])), "1,,2,3");
        assert_eq!(display_text(&json!([])), "");
        assert_eq!(display_text(&json!({"a": 1})), "[object Object]");
    }
}
