use crate::engine::{ChatEngine, EngineControl};
use crate::model::{self, ClientEvent, SessionConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "irc-chat-cli",
    version,
    about = "Terminal IRC chat client with optional TUI"
)]
pub struct Cli {
    /// IRC server hostname
    #[arg(long)]
    pub server: Option<String>,

    /// IRC server port
    #[arg(long, default_value_t = 6667)]
    pub port: u16,

    /// Channel to join (e.g. "#rust")
    #[arg(long)]
    pub channel: Option<String>,

    /// Channel key, for keyed channels
    #[arg(long, default_value = "")]
    pub channel_key: String,

    /// Username for the registration handshake
    #[arg(long)]
    pub username: Option<String>,

    /// Hostname reported in the USER line
    #[arg(long, default_value = "localhost")]
    pub hostname: String,

    /// Server name reported in the USER line (defaults to --server)
    #[arg(long)]
    pub servername: Option<String>,

    /// Real name for the registration handshake
    #[arg(long)]
    pub realname: Option<String>,

    /// Nickname; must be unique on the network
    #[arg(long)]
    pub nick: Option<String>,

    /// Display color for your own messages (#rrggbb); random when omitted
    #[arg(long)]
    pub color: Option<String>,

    /// Print inbound chat as JSON lines and run until Ctrl-C (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print inbound chat as text lines and run until Ctrl-C (no TUI)
    #[arg(long)]
    pub text: bool,

    /// How long to wait for the registration acknowledgment
    #[arg(long, default_value = "10s")]
    pub register_timeout: humantime::Duration,

    /// How long to wait for the join acknowledgment
    #[arg(long, default_value = "10s")]
    pub join_timeout: humantime::Duration,

    /// Skip the register form and connect immediately (TUI mode; requires
    /// all registration flags)
    #[arg(long, default_value_t = false)]
    pub connect_on_launch: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args).await;
        }
    }

    run_headless(args).await
}

/// Build a `SessionConfig` from CLI arguments. `None` when a required
/// registration field is missing; the TUI form collects those
/// interactively instead.
pub fn build_config(args: &Cli) -> Option<SessionConfig> {
    let server = non_empty(args.server.as_deref())?;
    Some(SessionConfig {
        servername: non_empty(args.servername.as_deref()).unwrap_or_else(|| server.clone()),
        server,
        port: args.port,
        channel: non_empty(args.channel.as_deref())?,
        channel_key: args.channel_key.clone(),
        username: non_empty(args.username.as_deref())?,
        hostname: args.hostname.clone(),
        realname: non_empty(args.realname.as_deref())?,
        nick: non_empty(args.nick.as_deref())?,
        color: non_empty(args.color.as_deref()).unwrap_or_else(model::random_hex_color),
        register_timeout: Duration::from(args.register_timeout),
        join_timeout: Duration::from(args.join_timeout),
    })
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.filter(|s| !s.is_empty()).map(|s| s.to_string())
}

/// Connect, join, and relay inbound chat to stdout until Ctrl-C or
/// disconnect. Used for `--text`/`--json` and non-TUI builds.
async fn run_headless(args: Cli) -> Result<()> {
    let cfg = build_config(&args).context(
        "headless mode needs --server, --channel, --username, --realname and --nick",
    )?;
    let as_json = args.json;

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<ClientEvent>();
    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<EngineControl>();

    let engine = ChatEngine::new(cfg);
    let handle = tokio::spawn(async move { engine.run(evt_tx, ctrl_rx).await });

    loop {
        tokio::select! {
            ev = evt_rx.recv() => {
                let Some(ev) = ev else { break };
                match ev {
                    ClientEvent::Chat { message } => {
                        if as_json {
                            if let Ok(line) = message.to_json() {
                                let _ = out_tx.send(OutputLine::Stdout(line));
                            }
                        } else {
                            let name = if message.nick.is_empty() {
                                &message.server
                            } else {
                                &message.nick
                            };
                            let _ = out_tx.send(OutputLine::Stdout(format!(
                                "{} {}: {}",
                                model::wall_clock(),
                                name,
                                message.trailing
                            )));
                        }
                    }
                    ClientEvent::PhaseStarted { phase } => {
                        let _ = out_tx.send(OutputLine::Stderr(format!(
                            "== {} ==",
                            phase.as_status_str()
                        )));
                    }
                    ClientEvent::Joined { channel } => {
                        let _ = out_tx.send(OutputLine::Stderr(format!("Joined {}", channel)));
                    }
                    ClientEvent::ServerInfo { message } => {
                        let _ = out_tx.send(OutputLine::Stderr(format!(
                            "-- {} {}",
                            message.command,
                            if message.trailing.is_empty() {
                                message.middle.join(" ")
                            } else {
                                message.trailing.clone()
                            }
                        )));
                    }
                    ClientEvent::Info(info) => {
                        let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
                    }
                    ClientEvent::Closed { reason } => {
                        let _ = out_tx.send(OutputLine::Stderr(match reason {
                            Some(r) => format!("Disconnected: {}", r),
                            None => "Disconnected".to_string(),
                        }));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = ctrl_tx.send(EngineControl::Quit(None));
            }
        }
    }

    let res = handle.await.context("engine task failed")?;

    drop(out_tx);
    let _ = out_handle.await;

    res.context("chat session failed")
}
