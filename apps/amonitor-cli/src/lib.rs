use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use amonitor_panel::{PanelConfig, PanelController};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

pub mod command;

use command::{FormField, HELP, PanelCommand, parse_command};

#[derive(Debug, Parser)]
#[command(name = "amonitor-panel")]
#[command(about = "Operator panel for a remote inference service")]
pub struct PanelCli {
    /// WebSocket URL of the service or agent hub (overrides PANEL_DEFAULT_WS)
    #[arg(long)]
    pub ws_url: Option<String>,
    /// HTTP API base (overrides PANEL_DEFAULT_API_BASE)
    #[arg(long)]
    pub api_base: Option<String>,
    /// Target configs as JSON (overrides PANEL_TARGETS_JSON)
    #[arg(long, conflicts_with = "targets_file")]
    pub targets_json: Option<String>,
    /// Read target configs from a JSON file
    #[arg(long)]
    pub targets_file: Option<PathBuf>,
    /// Start with the agent envelope enabled
    #[arg(long)]
    pub agent: bool,
    /// Connect immediately
    #[arg(long)]
    pub connect: bool,
}

impl PanelCli {
    /// Layer command-line overrides on top of the environment config.
    pub fn apply(&self, mut config: PanelConfig) -> Result<PanelConfig> {
        if let Some(ws_url) = &self.ws_url {
            config.default_ws_url = Some(ws_url.clone());
        }
        if let Some(api_base) = &self.api_base {
            config.default_api_base = Some(api_base.clone());
        }
        if let Some(targets_json) = &self.targets_json {
            config.targets_json = Some(targets_json.clone());
        }
        if let Some(path) = &self.targets_file {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read targets file {}", path.display()))?;
            config.targets_json = Some(raw);
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub async fn run(cli: PanelCli, config: PanelConfig) -> Result<()> {
    let config = cli.apply(config)?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut controller = PanelController::new(&config, events_tx)?;
    controller.form_mut().use_agent_envelope = cli.agent;

    let mut out = io::stdout();
    writeln!(out, "amonitor panel, /help for commands")?;
    if !controller.targets().is_empty() {
        write_targets(&controller, &mut out)?;
    }
    if cli.connect {
        controller.connect().await;
    }
    flush_log(&mut controller, &mut out)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    debug!("stdin closed");
                    break;
                };
                let flow = match parse_command(&line) {
                    Ok(command) => execute(&mut controller, command, &mut out).await?,
                    Err(error) => {
                        writeln!(out, "{error}")?;
                        Flow::Continue
                    }
                };
                if flow == Flow::Quit {
                    break;
                }
            }
            Some(event) = events_rx.recv() => controller.handle_event(event),
        }
        flush_log(&mut controller, &mut out)?;
    }

    controller.disconnect().await;
    flush_log(&mut controller, &mut out)?;
    Ok(())
}

/// Print log lines appended since the last flush, oldest first.
fn flush_log(controller: &mut PanelController, out: &mut impl Write) -> io::Result<()> {
    for line in controller.log_mut().drain_new() {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

pub async fn execute(
    controller: &mut PanelController,
    command: PanelCommand,
    out: &mut impl Write,
) -> io::Result<Flow> {
    match command {
        PanelCommand::Connect(url) => {
            if let Some(url) = url {
                controller.form_mut().ws_url = url;
            }
            controller.connect().await;
        }
        PanelCommand::Disconnect => controller.disconnect().await,
        PanelCommand::Status => write_status(controller, out)?,
        PanelCommand::Metrics => {
            for (label, value) in controller.metrics().rows() {
                writeln!(out, "  {label:<24} {value}")?;
            }
        }
        PanelCommand::FetchMetrics => controller.fetch_metrics(),
        PanelCommand::Action { name, value } => {
            let form = controller.form_mut();
            form.action_name = name;
            form.action_value = value;
            controller.send_action().await;
        }
        PanelCommand::Agent(enabled) => {
            controller.form_mut().use_agent_envelope = enabled;
            writeln!(
                out,
                "agent envelope {}",
                if enabled { "on" } else { "off" }
            )?;
        }
        PanelCommand::Set { field, value } => {
            let form = controller.form_mut();
            let slot = match field {
                FormField::WsUrl => &mut form.ws_url,
                FormField::ApiBase => &mut form.api_base,
                FormField::Action => &mut form.action_name,
                FormField::Value => &mut form.action_value,
                FormField::TargetId => &mut form.target_id,
                FormField::TargetUrl => &mut form.target_url,
                FormField::Prompt => &mut form.prompt,
            };
            *slot = value;
        }
        PanelCommand::Targets => write_targets(controller, out)?,
        PanelCommand::Use(name) => controller.select_target(&name),
        PanelCommand::Generate(prompt) => {
            if let Some(prompt) = prompt {
                controller.form_mut().prompt = prompt;
            }
            controller.generate();
        }
        PanelCommand::Output => writeln!(out, "{}", controller.generate_output())?,
        PanelCommand::Chat(message) => controller.send_chat(&message).await,
        PanelCommand::Send(raw) => controller.send_raw(&raw).await,
        PanelCommand::Log => write!(out, "{}", controller.log().text())?,
        PanelCommand::Clear => controller.log_mut().clear(),
        PanelCommand::Help => writeln!(out, "{HELP}")?,
        PanelCommand::Quit => return Ok(Flow::Quit),
        PanelCommand::Empty => {}
    }
    Ok(Flow::Continue)
}

fn write_status(controller: &PanelController, out: &mut impl Write) -> io::Result<()> {
    let status = controller.status();
    let form = controller.form();
    writeln!(out, "status: {} ({:?})", status.label(), status.tone())?;
    writeln!(out, "  ws_url      {}", form.ws_url)?;
    writeln!(out, "  api_base    {}", form.api_base)?;
    writeln!(out, "  action      {} {}", form.action_name, form.action_value)?;
    writeln!(
        out,
        "  agent       {}",
        if form.use_agent_envelope { "on" } else { "off" }
    )?;
    writeln!(out, "  target_id   {}", form.target_id)?;
    writeln!(out, "  target_url  {}", form.target_url)?;
    if controller.is_generating() {
        writeln!(out, "  generation in progress")?;
    }
    Ok(())
}

fn write_targets(controller: &PanelController, out: &mut impl Write) -> io::Result<()> {
    let targets = controller.targets();
    if targets.is_empty() {
        return writeln!(out, "no target configs loaded");
    }
    writeln!(out, "targets: {}", targets.names().collect::<Vec<_>>().join(", "))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use clap::error::ErrorKind;

    use super::*;

    fn panel() -> PanelController {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = PanelConfig {
            targets_json: Some(
                r#"{"service-a":{"target_id":"svc-a","target_url":"ws://10.0.0.5:8000/ws"}}"#
                    .to_string(),
            ),
            ..PanelConfig::default()
        };
        PanelController::new(&config, tx).expect("controller")
    }

    #[test]
    fn cli_flags_override_environment() -> Result<()> {
        let cli = PanelCli::try_parse_from([
            "amonitor-panel",
            "--ws-url",
            "ws://127.0.0.1:9000/ws",
            "--agent",
        ])?;
        let env = PanelConfig {
            default_ws_url: Some("ws://env:1/ws".to_string()),
            default_api_base: Some("http://env:1".to_string()),
            ..PanelConfig::default()
        };
        let config = cli.apply(env)?;
        assert_eq!(config.default_ws_url.as_deref(), Some("ws://127.0.0.1:9000/ws"));
        assert_eq!(config.default_api_base.as_deref(), Some("http://env:1"));
        assert!(cli.agent);
        assert!(!cli.connect);
        Ok(())
    }

    #[test]
    fn cli_rejects_both_target_sources() {
        let err = match PanelCli::try_parse_from([
            "amonitor-panel",
            "--targets-json",
            "{}",
            "--targets-file",
            "targets.json",
        ]) {
            Ok(_) => panic!("expected conflicting arguments error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn cli_rejects_unknown_flag() {
        let err = match PanelCli::try_parse_from(["amonitor-panel", "--bogus"]) {
            Ok(_) => panic!("expected unknown argument error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[tokio::test]
    async fn set_and_use_update_the_form() -> io::Result<()> {
        let mut controller = panel();
        let mut out = Vec::new();

        for line in ["/set prompt hello there", "/use service-a", "/agent on"] {
            let command = parse_command(line).expect("command");
            assert_eq!(execute(&mut controller, command, &mut out).await?, Flow::Continue);
        }

        let form = controller.form();
        assert_eq!(form.prompt, "hello there");
        assert_eq!(form.target_id, "svc-a");
        assert_eq!(form.ws_url, "ws://10.0.0.5:8000/ws");
        assert!(form.use_agent_envelope);
        assert_eq!(String::from_utf8_lossy(&out), "agent envelope on\n");
        Ok(())
    }

    #[tokio::test]
    async fn status_metrics_and_quit() -> io::Result<()> {
        let mut controller = panel();
        let mut out = Vec::new();

        execute(&mut controller, PanelCommand::Status, &mut out).await?;
        execute(&mut controller, PanelCommand::Metrics, &mut out).await?;
        let printed = String::from_utf8_lossy(&out).to_string();
        assert!(printed.starts_with("status: disconnected (Warn)"));
        assert!(printed.contains("gpu"));
        assert!(printed.contains("-1%"));

        assert_eq!(
            execute(&mut controller, PanelCommand::Quit, &mut out).await?,
            Flow::Quit
        );
        Ok(())
    }

    #[tokio::test]
    async fn flush_prints_new_log_lines_once() -> io::Result<()> {
        let mut controller = panel();
        let mut out = Vec::new();

        execute(&mut controller, PanelCommand::Use("missing".to_string()), &mut out).await?;
        flush_log(&mut controller, &mut out)?;
        flush_log(&mut controller, &mut out)?;

        let printed = String::from_utf8_lossy(&out).to_string();
        assert_eq!(printed.matches("unknown target config: missing").count(), 1);
        Ok(())
    }
}
