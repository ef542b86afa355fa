//! Panel controller: owns the operator-visible state and reacts to operator
//! commands and background events.
//!
//! Every handler runs to completion on the task that owns the controller.
//! Socket readers and HTTP calls run elsewhere and report back only through
//! [`PanelEvent`]s, so state is never shared across tasks.

use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::PanelConfig;
use crate::connection::{ConnectionConfig, PanelConnection, SessionEvent, SocketEvent};
use crate::dispatch::{ActionDraft, DispatchError};
use crate::error::{PanelError, Result};
use crate::generate::{
    GenerateClient, GenerateError, generate_endpoint, metrics_endpoint, resolve_api_base,
};
use crate::log_sink::PanelLog;
use crate::metrics::MetricsView;
use crate::protocol::{
    ACTION_SET_MAX_CONCURRENCY, ActionAckPayload, ChatEnvelope, ENVELOPE_ACK, ENVELOPE_ACTION_ACK,
    ENVELOPE_ERROR, GenerateResponse, ServiceAckPayload, WsEnvelope,
};
use crate::targets::TargetRegistry;

/// How many agent-forwarded action ids are remembered for ack matching.
const PENDING_ACK_LIMIT: usize = 256;

/// Background event delivered to the controller.
#[derive(Debug)]
pub enum PanelEvent {
    Socket(SessionEvent),
    Generated(std::result::Result<GenerateResponse, GenerateError>),
    MetricsFetched(std::result::Result<Map<String, Value>, GenerateError>),
}

/// Status indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Error,
    Disconnected,
}

/// Colour class of the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Ok,
    Warn,
    Err,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting...",
            Self::Connected => "connected",
            Self::Error => "connection error",
            Self::Disconnected => "disconnected",
        }
    }

    pub fn tone(self) -> StatusTone {
        match self {
            Self::Connected => StatusTone::Ok,
            Self::Error => StatusTone::Err,
            Self::Connecting | Self::Disconnected => StatusTone::Warn,
        }
    }
}

/// Operator input fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelForm {
    pub ws_url: String,
    pub api_base: String,
    pub action_name: String,
    pub action_value: String,
    pub target_id: String,
    pub target_url: String,
    pub use_agent_envelope: bool,
    pub prompt: String,
}

impl Default for PanelForm {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            api_base: String::new(),
            action_name: ACTION_SET_MAX_CONCURRENCY.to_string(),
            action_value: String::new(),
            target_id: String::new(),
            target_url: String::new(),
            use_agent_envelope: false,
            prompt: String::new(),
        }
    }
}

impl PanelForm {
    pub fn action_draft(&self) -> ActionDraft {
        ActionDraft {
            action: self.action_name.clone(),
            value: self.action_value.clone(),
            use_agent_envelope: self.use_agent_envelope,
            target_id: self.target_id.clone(),
            target_url: self.target_url.clone(),
        }
    }
}

pub struct PanelController {
    form: PanelForm,
    targets: TargetRegistry,
    log: PanelLog,
    metrics: MetricsView,
    status: ConnectionStatus,
    generate_output: String,
    generate_in_flight: bool,
    connection: Option<PanelConnection>,
    connection_url: String,
    session: u64,
    connection_config: ConnectionConfig,
    http: GenerateClient,
    events: mpsc::UnboundedSender<PanelEvent>,
    pending_acks: VecDeque<(String, String)>,
}

impl PanelController {
    /// Build a controller seeded from configuration. Background events are
    /// delivered to `events`; feed them back through [`Self::handle_event`].
    pub fn new(config: &PanelConfig, events: mpsc::UnboundedSender<PanelEvent>) -> Result<Self> {
        let http = GenerateClient::new(config.http_timeout)
            .map_err(|error| PanelError::HttpClient(error.to_string()))?;

        let mut form = PanelForm::default();
        if let Some(ws_url) = &config.default_ws_url {
            form.ws_url.clone_from(ws_url);
        }
        if let Some(api_base) = &config.default_api_base {
            form.api_base.clone_from(api_base);
        }
        let targets = config
            .targets_json
            .as_deref()
            .map(TargetRegistry::from_json)
            .unwrap_or_default();

        Ok(Self {
            form,
            targets,
            log: PanelLog::new(),
            metrics: MetricsView::default(),
            status: ConnectionStatus::Disconnected,
            generate_output: String::new(),
            generate_in_flight: false,
            connection: None,
            connection_url: String::new(),
            session: 0,
            connection_config: ConnectionConfig {
                connect_timeout: config.connect_timeout,
            },
            http,
            events,
            pending_acks: VecDeque::new(),
        })
    }

    pub fn form(&self) -> &PanelForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut PanelForm {
        &mut self.form
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    pub fn log(&self) -> &PanelLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut PanelLog {
        &mut self.log
    }

    pub fn metrics(&self) -> &MetricsView {
        &self.metrics
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn generate_output(&self) -> &str {
        &self.generate_output
    }

    /// Whether the generate trigger is currently disabled.
    pub fn is_generating(&self) -> bool {
        self.generate_in_flight
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some() && self.status == ConnectionStatus::Connected
    }

    fn append_log(&mut self, message: impl AsRef<str>) {
        self.log.append(message);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        debug!("panel status {:?} -> {:?}", self.status, status);
        self.status = status;
    }

    /// Open a connection to the WS URL field.
    pub async fn connect(&mut self) {
        if self.is_connected() {
            self.append_log("connection already open");
            return;
        }

        let url = self.form.ws_url.trim().to_string();
        if url.is_empty() {
            self.append_log("enter a WS URL");
            return;
        }

        if let Some(previous) = self.connection.take() {
            previous.close().await;
        }
        self.session += 1;

        match PanelConnection::open(
            &url,
            self.session,
            self.connection_config.clone(),
            self.events.clone(),
            PanelEvent::Socket,
        ) {
            Ok(connection) => {
                self.connection = Some(connection);
                self.connection_url = url;
                self.set_status(ConnectionStatus::Connecting);
            }
            Err(error) => self.append_log(format!("invalid WS URL: {error}")),
        }
    }

    /// Close the connection, if any.
    pub async fn disconnect(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        connection.close().await;
        self.session += 1;
        self.set_status(ConnectionStatus::Disconnected);
        self.append_log("WS disconnected");
    }

    pub fn handle_event(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::Socket(SessionEvent { session, event }) => {
                if session != self.session {
                    debug!("dropping {:?} from stale session {}", event, session);
                    return;
                }
                self.handle_socket_event(event);
            }
            PanelEvent::Generated(result) => self.finish_generate(result),
            PanelEvent::MetricsFetched(result) => self.finish_fetch_metrics(result),
        }
    }

    fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Opened => {
                self.set_status(ConnectionStatus::Connected);
                let url = self.connection_url.clone();
                self.append_log(format!("connected: {url}"));
            }
            SocketEvent::Frame(text) => self.receive_frame(&text),
            SocketEvent::Binary(len) => {
                self.append_log(format!("received binary frame ({len} bytes), ignored"));
            }
            SocketEvent::Error(detail) => {
                self.set_status(ConnectionStatus::Error);
                self.append_log(format!("WS connection error: {detail}"));
            }
            SocketEvent::Closed => {
                self.connection = None;
                self.set_status(ConnectionStatus::Disconnected);
                self.append_log("WS disconnected");
            }
        }
    }

    /// Log a raw inbound frame and route it.
    pub fn receive_frame(&mut self, text: &str) {
        self.append_log(format!("received: {text}"));

        let envelope = match WsEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(error) => {
                debug!("inbound frame is not JSON: {}", error);
                self.append_log("failed to parse message");
                return;
            }
        };
        if envelope.payload.is_none() {
            return;
        }
        if envelope.carries_metrics() {
            self.metrics.apply(&envelope.payload_fields());
            return;
        }
        self.summarize(&envelope);
    }

    fn summarize(&mut self, envelope: &WsEnvelope) {
        let fields = Value::Object(envelope.payload_fields());
        match envelope.kind.as_str() {
            ENVELOPE_ACTION_ACK => {
                let Ok(ack) = serde_json::from_value::<ActionAckPayload>(fields) else {
                    return;
                };
                let action = self.take_pending(&ack.action_msg_id);
                let mut line = match action {
                    Some(action) => format!(
                        "action {action} ({}) acknowledged: success={}",
                        ack.action_msg_id, ack.success
                    ),
                    None => format!(
                        "action ack {}: success={}",
                        ack.action_msg_id, ack.success
                    ),
                };
                if let Some(message) = ack.message.filter(|message| !message.is_empty()) {
                    line.push_str(&format!(", {message}"));
                }
                self.append_log(line);
            }
            ENVELOPE_ACK => {
                let Ok(ack) = serde_json::from_value::<ServiceAckPayload>(fields) else {
                    return;
                };
                let mut line = format!("service ack: action={}", ack.action);
                if let Some(ok) = ack.ok {
                    line.push_str(&format!(", ok={ok}"));
                }
                if let Some(message) = ack.message.filter(|message| !message.is_empty()) {
                    line.push_str(&format!(", {message}"));
                }
                self.append_log(line);
            }
            ENVELOPE_ERROR => {
                if let Some(Value::String(message)) =
                    envelope.payload_fields().get("message").cloned()
                {
                    self.append_log(format!("service error: {message}"));
                }
            }
            _ => {}
        }
    }

    fn remember_pending(&mut self, msg_id: String, action: String) {
        if self.pending_acks.len() >= PENDING_ACK_LIMIT {
            self.pending_acks.pop_front();
        }
        self.pending_acks.push_back((msg_id, action));
    }

    fn take_pending(&mut self, msg_id: &str) -> Option<String> {
        let index = self
            .pending_acks
            .iter()
            .position(|(pending_id, _)| pending_id == msg_id)?;
        self.pending_acks.remove(index).map(|(_, action)| action)
    }

    async fn transmit(&self, text: String) -> Result<()> {
        if self.status != ConnectionStatus::Connected {
            return Err(PanelError::NotConnected);
        }
        let connection = self.connection.as_ref().ok_or(PanelError::NotConnected)?;
        connection.send_text(text).await
    }

    /// Encode `message` and send it, returning the exact text sent.
    async fn transmit_json<T: Serialize>(&self, message: &T) -> Result<String> {
        let text = serde_json::to_string(message)?;
        self.transmit(text.clone()).await?;
        Ok(text)
    }

    /// Validate the action fields and send the resulting message.
    pub async fn send_action(&mut self) {
        if !self.is_connected() {
            self.append_log(DispatchError::NotConnected.to_string());
            return;
        }

        let message = match self
            .form
            .action_draft()
            .build(Utc::now().timestamp_millis())
        {
            Ok(message) => message,
            Err(error) => {
                self.append_log(error.to_string());
                return;
            }
        };
        match self.transmit_json(&message).await {
            Ok(text) => {
                if let Some(msg_id) = message.msg_id() {
                    self.remember_pending(msg_id.to_string(), message.action_name().to_string());
                }
                self.append_log(format!("sent action: {text}"));
            }
            Err(error) => self.append_log(format!("failed to send action: {error}")),
        }
    }

    /// Send a chat message to the agent hub.
    pub async fn send_chat(&mut self, message: &str) {
        let message = message.trim();
        if message.is_empty() {
            self.append_log("usage: /chat <message>");
            return;
        }
        if !self.is_connected() {
            self.append_log("not connected, run /connect first");
            return;
        }

        let envelope = ChatEnvelope::new(message, Utc::now().timestamp_millis());
        match self.transmit_json(&envelope).await {
            Ok(text) => self.append_log(format!("sent: {text}")),
            Err(error) => self.append_log(format!("failed to send: {error}")),
        }
    }

    /// Send operator-supplied JSON, re-encoded compactly.
    pub async fn send_raw(&mut self, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() {
            self.append_log(r#"usage: /send {"type":"action",...}"#);
            return;
        }
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(error) => {
                self.append_log(format!("JSON parse failed: {error}"));
                return;
            }
        };
        if !self.is_connected() {
            self.append_log("not connected, run /connect first");
            return;
        }

        let text = value.to_string();
        match self.transmit(text.clone()).await {
            Ok(()) => self.append_log(format!("sent: {text}")),
            Err(error) => self.append_log(format!("failed to send: {error}")),
        }
    }

    /// Start a one-shot generation call for the prompt field.
    pub fn generate(&mut self) {
        if self.generate_in_flight {
            self.append_log("generation already in progress");
            return;
        }

        let prompt = self.form.prompt.trim().to_string();
        if prompt.is_empty() {
            self.append_log("enter a prompt");
            return;
        }
        let ws_url = self.form.ws_url.trim().to_string();
        if ws_url.is_empty() {
            self.append_log("fill in the WS URL first");
            return;
        }
        let api_base = match resolve_api_base(&self.form.api_base, &ws_url) {
            Ok(api_base) => api_base,
            Err(error) => {
                self.append_log(format!("cannot resolve API base: {error}"));
                return;
            }
        };
        let endpoint = generate_endpoint(&api_base);

        self.generate_in_flight = true;
        self.append_log(format!("calling generate endpoint: {endpoint}"));

        let client = self.http.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.generate(&endpoint, &prompt).await;
            if events.send(PanelEvent::Generated(result)).is_err() {
                debug!("generate result dropped: panel closed");
            }
        });
    }

    fn finish_generate(&mut self, result: std::result::Result<GenerateResponse, GenerateError>) {
        self.generate_in_flight = false;
        match result {
            Ok(response) => {
                self.generate_output = response.output_text();
                self.append_log(format!("generation complete: {}", response.summary()));
            }
            Err(GenerateError::Http { status, body }) => {
                self.append_log(format!("generation failed ({}): {body}", status.as_u16()));
            }
            Err(error) => self.append_log(format!("generation error: {error}")),
        }
    }

    /// Pull one metrics snapshot over HTTP.
    pub fn fetch_metrics(&mut self) {
        let ws_url = self.form.ws_url.trim().to_string();
        if ws_url.is_empty() && self.form.api_base.trim().is_empty() {
            self.append_log("fill in the WS URL or API base first");
            return;
        }
        let api_base = match resolve_api_base(&self.form.api_base, &ws_url) {
            Ok(api_base) => api_base,
            Err(error) => {
                self.append_log(format!("cannot resolve API base: {error}"));
                return;
            }
        };
        let endpoint = metrics_endpoint(&api_base);
        self.append_log(format!("fetching metrics: {endpoint}"));

        let client = self.http.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.fetch_metrics(&endpoint).await;
            if events.send(PanelEvent::MetricsFetched(result)).is_err() {
                debug!("metrics result dropped: panel closed");
            }
        });
    }

    fn finish_fetch_metrics(
        &mut self,
        result: std::result::Result<Map<String, Value>, GenerateError>,
    ) {
        match result {
            Ok(snapshot) => {
                self.metrics.apply(&snapshot);
                self.append_log("metrics snapshot loaded");
            }
            Err(GenerateError::Http { status, body }) => {
                self.append_log(format!("metrics fetch failed ({}): {body}", status.as_u16()));
            }
            Err(error) => self.append_log(format!("metrics fetch error: {error}")),
        }
    }

    /// Load a named target preset into the form.
    pub fn select_target(&mut self, name: &str) {
        let Some(selected) = self.targets.get(name).cloned() else {
            self.append_log(format!("unknown target config: {name}"));
            return;
        };

        self.form.target_id.clone_from(&selected.target_id);
        self.form.target_url.clone_from(&selected.target_url);
        if !selected.target_url.is_empty() {
            self.form.ws_url.clone_from(&selected.target_url);
        }
        if let Some(api_base) = selected.api_base.filter(|api_base| !api_base.is_empty()) {
            self.form.api_base = api_base;
        }
        self.append_log(format!("loaded target config: {name}"));
    }
}
