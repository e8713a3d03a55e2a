//! Session lifecycle controller.
//!
//! Owns connect/disconnect orchestration and emits events for
//! presentation layers.

use crate::cli::{build_config, Cli};
use crate::engine::{ChatEngine, EngineControl};
use crate::model::{ClientEvent, InfoEvent, SessionConfig};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Duration;

/// Commands emitted by UI layers to control the session.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Submit the register form: open a session with this config.
    Connect(Box<SessionConfig>),
    /// Raw chat-input text; slash commands included.
    Input(String),
    Quit,
}

/// What a line of chat input turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputAction {
    Forward(EngineControl),
    /// Not sendable; the string is the status-line explanation.
    Reject(String),
}

/// Map chat-input text to an engine command. Plain text is a PRIVMSG;
/// `/quit`, `/nick`, `/away`, and `/names` cover the command surface.
pub(crate) fn parse_input(input: &str) -> InputAction {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return InputAction::Forward(EngineControl::Privmsg(trimmed.to_string()));
    };
    let (cmd, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    let arg = arg.trim();
    match cmd.to_ascii_lowercase().as_str() {
        "quit" => InputAction::Forward(EngineControl::Quit(if arg.is_empty() {
            None
        } else {
            Some(arg.to_string())
        })),
        "nick" if !arg.is_empty() => InputAction::Forward(EngineControl::Nick(arg.to_string())),
        "nick" => InputAction::Reject("usage: /nick <nickname>".to_string()),
        "away" => InputAction::Forward(EngineControl::Away(if arg.is_empty() {
            None
        } else {
            Some(arg.to_string())
        })),
        "names" => InputAction::Forward(EngineControl::Names),
        other => InputAction::Reject(format!("Unknown command: /{}", other)),
    }
}

/// Internal handle for a running session task.
struct SessionCtx {
    ctrl_tx: UnboundedSender<EngineControl>,
    handle: Option<tokio::task::JoinHandle<Result<()>>>,
}

/// Spawn a new session and return its control handle.
fn start_session(cfg: SessionConfig, event_tx: UnboundedSender<ClientEvent>) -> SessionCtx {
    let (ctrl_tx, ctrl_rx) = tokio::sync::mpsc::unbounded_channel::<EngineControl>();
    let engine = ChatEngine::new(cfg);
    let handle = tokio::spawn(async move { engine.run(event_tx, ctrl_rx).await });
    SessionCtx {
        ctrl_tx,
        handle: Some(handle),
    }
}

/// Orchestrate sessions based on UI commands and emit events back to
/// presentation layers.
pub(crate) async fn run_controller(
    args: &Cli,
    event_tx: UnboundedSender<ClientEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut session = if args.connect_on_launch {
        match build_config(args) {
            Some(cfg) => Some(start_session(cfg, event_tx.clone())),
            None => {
                let _ = event_tx.send(ClientEvent::Info(InfoEvent::Message(
                    "Cannot auto-connect: fill in the missing registration fields".into(),
                )));
                None
            }
        }
    } else {
        None
    };
    let mut quit_pending = false;
    // Quit watchdog: if closing the session stalls, keep UI feedback alive.
    let mut quit_deadline: Option<tokio::time::Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Connect(cfg)) => {
                        if session.is_some() {
                            let _ = event_tx.send(ClientEvent::Info(InfoEvent::Message(
                                "Already connected".into(),
                            )));
                        } else {
                            session = Some(start_session(*cfg, event_tx.clone()));
                        }
                    }
                    Some(UiCommand::Input(text)) => {
                        let Some(ctx) = &session else {
                            let _ = event_tx.send(ClientEvent::Info(InfoEvent::Message(
                                "Not connected".into(),
                            )));
                            continue;
                        };
                        match parse_input(&text) {
                            InputAction::Forward(ctrl) => {
                                if matches!(ctrl, EngineControl::Quit(_)) {
                                    quit_deadline = Some(
                                        tokio::time::Instant::now() + Duration::from_secs(3),
                                    );
                                }
                                let _ = ctx.ctrl_tx.send(ctrl);
                            }
                            InputAction::Reject(reason) => {
                                let _ = event_tx.send(ClientEvent::Info(InfoEvent::Message(
                                    reason,
                                )));
                            }
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // Quit waits for the session to close so the QUIT
                        // line actually reaches the server.
                        quit_pending = true;
                        if let Some(ctx) = &session {
                            let _ = ctx.ctrl_tx.send(EngineControl::Quit(None));
                            quit_deadline = Some(
                                tokio::time::Instant::now() + Duration::from_secs(3),
                            );
                        } else {
                            break Ok(());
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it
            // can be dropped if another select branch is chosen, and we'll
            // never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut session {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    if let Some(ctx) = &mut session {
                        ctx.handle.take();
                    }
                    match join_res {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            let _ = event_tx.send(ClientEvent::Info(InfoEvent::Message(format!(
                                "Session failed: {e:#}"
                            ))));
                            let _ = event_tx.send(ClientEvent::Closed {
                                reason: Some(format!("{e:#}")),
                            });
                        }
                        Err(e) => {
                            let _ = event_tx.send(ClientEvent::Info(InfoEvent::Message(format!(
                                "Session join failed: {e}"
                            ))));
                            let _ = event_tx.send(ClientEvent::Closed { reason: None });
                        }
                    }
                    session = None;
                    quit_deadline = None;
                    if quit_pending {
                        break Ok(());
                    }
                }
            }
            // If closing stalls (e.g., a write in flight), keep the user informed.
            _ = watchdog.tick() => {
                if let Some(deadline) = quit_deadline {
                    if tokio::time::Instant::now() >= deadline && session.is_some() {
                        let _ = event_tx.send(ClientEvent::Info(InfoEvent::Message(
                            "Still disconnecting…".into(),
                        )));
                        quit_deadline = None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_becomes_privmsg() {
        assert_eq!(
            parse_input("hello there"),
            InputAction::Forward(EngineControl::Privmsg("hello there".into()))
        );
    }

    #[test]
    fn quit_with_and_without_reason() {
        assert_eq!(
            parse_input("/quit"),
            InputAction::Forward(EngineControl::Quit(None))
        );
        assert_eq!(
            parse_input("/quit gone fishing"),
            InputAction::Forward(EngineControl::Quit(Some("gone fishing".into())))
        );
    }

    #[test]
    fn nick_requires_an_argument() {
        assert_eq!(
            parse_input("/nick newname"),
            InputAction::Forward(EngineControl::Nick("newname".into()))
        );
        assert!(matches!(parse_input("/nick"), InputAction::Reject(_)));
    }

    #[test]
    fn away_toggles_on_argument() {
        assert_eq!(
            parse_input("/away lunch break"),
            InputAction::Forward(EngineControl::Away(Some("lunch break".into())))
        );
        assert_eq!(
            parse_input("/away"),
            InputAction::Forward(EngineControl::Away(None))
        );
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(
            parse_input("/NAMES"),
            InputAction::Forward(EngineControl::Names)
        );
    }

    #[test]
    fn unknown_command_is_rejected_with_its_name() {
        match parse_input("/kickban bob") {
            InputAction::Reject(reason) => assert!(reason.contains("/kickban")),
            other => panic!("expected Reject, got {:?}", other),
        }
    }
}
