//! Operator panel for a remote inference service.
//!
//! The panel keeps one WebSocket open to a monitored service (or to an agent
//! hub that relays to it), renders live metrics, sends runtime actions and
//! triggers one-shot generation calls over HTTP:
//! - [`controller::PanelController`] owns all operator-visible state
//! - [`connection::PanelConnection`] runs the socket on a background task
//! - [`generate::GenerateClient`] handles the HTTP endpoints

pub mod config;
pub mod connection;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod generate;
pub mod log_sink;
pub mod metrics;
pub mod protocol;
pub mod targets;

pub use config::{ConfigError, PanelConfig};
pub use connection::{ConnectionConfig, PanelConnection, SessionEvent, SocketEvent};
pub use controller::{ConnectionStatus, PanelController, PanelEvent, PanelForm, StatusTone};
pub use dispatch::{ActionDraft, DispatchError};
pub use error::{PanelError, Result};
pub use generate::{GenerateClient, GenerateError, resolve_api_base};
pub use log_sink::{MAX_LOG_CHARS, PanelLog};
pub use metrics::MetricsView;
pub use protocol::{OutboundAction, TargetConfig, WsEnvelope};
pub use targets::TargetRegistry;
