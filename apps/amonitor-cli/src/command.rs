//! Slash-command parsing for the interactive panel.

use std::str::FromStr;

use thiserror::Error;

pub const HELP: &str = "\
commands:
  /connect [url]          open the WebSocket (optionally replacing the WS URL)
  /disconnect             close the WebSocket
  /status                 show connection status and form fields
  /metrics                show the metrics panel
  /fetch-metrics          load a metrics snapshot over HTTP
  /action <name> [value]  send an action (set_max_concurrency, reset_metrics, ...)
  /agent on|off           wrap actions in an agent envelope
  /set <field> <value>    ws_url, api_base, action, value, target_id, target_url, prompt
  /targets                list target configs
  /use <name>             load a target config
  /generate [prompt]      call the generate endpoint
  /output                 show the last generation output
  /chat <text>            send a chat message (plain lines do the same)
  /send <json>            send raw JSON
  /log                    print the whole log
  /clear                  clear the log
  /help                   show this help
  /quit                   exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    WsUrl,
    ApiBase,
    Action,
    Value,
    TargetId,
    TargetUrl,
    Prompt,
}

impl FromStr for FormField {
    type Err = CommandError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "ws_url" | "ws" => Ok(Self::WsUrl),
            "api_base" | "api" => Ok(Self::ApiBase),
            "action" => Ok(Self::Action),
            "value" => Ok(Self::Value),
            "target_id" => Ok(Self::TargetId),
            "target_url" => Ok(Self::TargetUrl),
            "prompt" => Ok(Self::Prompt),
            other => Err(CommandError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    Connect(Option<String>),
    Disconnect,
    Status,
    Metrics,
    FetchMetrics,
    Action { name: String, value: String },
    Agent(bool),
    Set { field: FormField, value: String },
    Targets,
    Use(String),
    Generate(Option<String>),
    Output,
    Chat(String),
    Send(String),
    Log,
    Clear,
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    UnknownCommand(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line. Lines without a leading `/` are chat messages.
pub fn parse_command(line: &str) -> Result<PanelCommand, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(PanelCommand::Empty);
    }
    let Some(body) = line.strip_prefix('/') else {
        return Ok(PanelCommand::Chat(line.to_string()));
    };

    let (name, rest) = split_word(body);
    let optional = || (!rest.is_empty()).then(|| rest.to_string());
    match name {
        "connect" => Ok(PanelCommand::Connect(optional())),
        "disconnect" => Ok(PanelCommand::Disconnect),
        "status" => Ok(PanelCommand::Status),
        "metrics" => Ok(PanelCommand::Metrics),
        "fetch-metrics" => Ok(PanelCommand::FetchMetrics),
        "action" => {
            let (action, value) = split_word(rest);
            if action.is_empty() {
                return Err(CommandError::Usage("/action <name> [value]"));
            }
            Ok(PanelCommand::Action {
                name: action.to_string(),
                value: value.to_string(),
            })
        }
        "agent" => match rest {
            "on" => Ok(PanelCommand::Agent(true)),
            "off" => Ok(PanelCommand::Agent(false)),
            _ => Err(CommandError::Usage("/agent on|off")),
        },
        "set" => {
            let (field, value) = split_word(rest);
            if field.is_empty() {
                return Err(CommandError::Usage("/set <field> <value>"));
            }
            Ok(PanelCommand::Set {
                field: field.parse()?,
                value: value.to_string(),
            })
        }
        "targets" => Ok(PanelCommand::Targets),
        "use" => optional()
            .map(PanelCommand::Use)
            .ok_or(CommandError::Usage("/use <name>")),
        "generate" => Ok(PanelCommand::Generate(optional())),
        "output" => Ok(PanelCommand::Output),
        "chat" => optional()
            .map(PanelCommand::Chat)
            .ok_or(CommandError::Usage("/chat <text>")),
        "send" => optional()
            .map(PanelCommand::Send)
            .ok_or(CommandError::Usage("/send <json>")),
        "log" => Ok(PanelCommand::Log),
        "clear" => Ok(PanelCommand::Clear),
        "help" | "?" => Ok(PanelCommand::Help),
        "quit" | "exit" | "q" => Ok(PanelCommand::Quit),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (input, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(
            parse_command("  how busy are you? "),
            Ok(PanelCommand::Chat("how busy are you?".to_string()))
        );
        assert_eq!(parse_command("   "), Ok(PanelCommand::Empty));
    }

    #[test]
    fn connect_takes_optional_url() {
        assert_eq!(parse_command("/connect"), Ok(PanelCommand::Connect(None)));
        assert_eq!(
            parse_command("/connect ws://127.0.0.1:8000/ws"),
            Ok(PanelCommand::Connect(Some("ws://127.0.0.1:8000/ws".to_string())))
        );
    }

    #[test]
    fn action_splits_name_and_value() {
        assert_eq!(
            parse_command("/action set_max_concurrency 4"),
            Ok(PanelCommand::Action {
                name: "set_max_concurrency".to_string(),
                value: "4".to_string(),
            })
        );
        assert_eq!(
            parse_command("/action reset_metrics"),
            Ok(PanelCommand::Action {
                name: "reset_metrics".to_string(),
                value: String::new(),
            })
        );
        assert_eq!(
            parse_command("/action"),
            Err(CommandError::Usage("/action <name> [value]"))
        );
    }

    #[test]
    fn set_keeps_rest_of_line_as_value() {
        assert_eq!(
            parse_command("/set prompt tell me a   story"),
            Ok(PanelCommand::Set {
                field: FormField::Prompt,
                value: "tell me a   story".to_string(),
            })
        );
        assert_eq!(
            parse_command("/set target_url"),
            Ok(PanelCommand::Set {
                field: FormField::TargetUrl,
                value: String::new(),
            })
        );
        assert_eq!(
            parse_command("/set colour red"),
            Err(CommandError::UnknownField("colour".to_string()))
        );
    }

    #[test]
    fn send_keeps_raw_json() {
        assert_eq!(
            parse_command(r#"/send {"type": "action", "action": "reset_metrics"}"#),
            Ok(PanelCommand::Send(
                r#"{"type": "action", "action": "reset_metrics"}"#.to_string()
            ))
        );
    }

    #[test]
    fn agent_toggle_and_unknown_commands() {
        assert_eq!(parse_command("/agent on"), Ok(PanelCommand::Agent(true)));
        assert_eq!(parse_command("/agent off"), Ok(PanelCommand::Agent(false)));
        assert_eq!(
            parse_command("/agent maybe"),
            Err(CommandError::Usage("/agent on|off"))
        );
        assert_eq!(
            parse_command("/bogus"),
            Err(CommandError::UnknownCommand("bogus".to_string()))
        );
    }
}
