pub(crate) mod commands;
mod transport;

use crate::message::Message;
use crate::model::{ClientEvent, InfoEvent, SessionConfig, SessionPhase};
use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc;
use tokio::time::timeout;
use transport::Connection;

/// Commands accepted by a running engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineControl {
    /// Send a chat line to the joined channel
    Privmsg(String),
    /// Request a nickname change
    Nick(String),
    /// Mark away (Some) or clear the away marker (None)
    Away(Option<String>),
    /// Ask the server for the channel's member list
    Names,
    /// Close the session with an optional reason
    Quit(Option<String>),
}

/// One chat session over one TCP connection.
///
/// `run` drives the session through connect, register, join, and active,
/// advancing on server acknowledgments rather than timers, and pushes
/// everything the presentation layers need over `event_tx`.
pub struct ChatEngine {
    cfg: SessionConfig,
}

impl ChatEngine {
    pub fn new(cfg: SessionConfig) -> Self {
        Self { cfg }
    }

    pub async fn run(
        self,
        event_tx: mpsc::UnboundedSender<ClientEvent>,
        mut control_rx: mpsc::UnboundedReceiver<EngineControl>,
    ) -> Result<()> {
        let _ = event_tx.send(ClientEvent::PhaseStarted {
            phase: SessionPhase::Connecting,
        });
        let _ = event_tx.send(ClientEvent::Info(InfoEvent::Connecting {
            server: self.cfg.server.clone(),
            port: self.cfg.port,
        }));
        let mut conn = Connection::open(&self.cfg.server, self.cfg.port).await?;

        let _ = event_tx.send(ClientEvent::PhaseStarted {
            phase: SessionPhase::Registering,
        });
        let _ = event_tx.send(ClientEvent::Info(InfoEvent::Registering {
            nick: self.cfg.nick.clone(),
        }));
        conn.send_line(&commands::user(
            &self.cfg.username,
            &self.cfg.hostname,
            &self.cfg.servername,
            &self.cfg.realname,
        ))
        .await?;
        conn.send_line(&commands::nick(&self.cfg.nick)).await?;
        timeout(
            self.cfg.register_timeout,
            self.await_welcome(&mut conn, &event_tx),
        )
        .await
        .map_err(|_| anyhow!("registration timed out"))??;

        let _ = event_tx.send(ClientEvent::PhaseStarted {
            phase: SessionPhase::Joining,
        });
        let _ = event_tx.send(ClientEvent::Info(InfoEvent::JoiningChannel {
            channel: self.cfg.channel.clone(),
        }));
        let join_line = commands::join(
            std::slice::from_ref(&self.cfg.channel),
            std::slice::from_ref(&self.cfg.channel_key),
        )
        .context("invalid channel/key combination")?;
        conn.send_line(&join_line).await?;
        timeout(self.cfg.join_timeout, self.await_join(&mut conn, &event_tx))
            .await
            .map_err(|_| anyhow!("join timed out"))??;
        let _ = event_tx.send(ClientEvent::Joined {
            channel: self.cfg.channel.clone(),
        });

        let _ = event_tx.send(ClientEvent::PhaseStarted {
            phase: SessionPhase::Active,
        });
        let reason = self
            .active_loop(&mut conn, &event_tx, &mut control_rx)
            .await?;
        let _ = event_tx.send(ClientEvent::Closed { reason });
        Ok(())
    }

    /// Read until the server accepts our registration (RPL_WELCOME).
    async fn await_welcome(
        &self,
        conn: &mut Connection,
        event_tx: &mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<()> {
        loop {
            let line = match conn.read_line().await? {
                Some(l) => l,
                None => bail!("server closed the connection during registration"),
            };
            let msg = Message::parse(&line);
            match msg.command.as_str() {
                "PING" => reply_ping(conn, &msg).await?,
                "001" => return Ok(()),
                "432" | "433" | "436" => {
                    bail!("nickname {} rejected: {}", self.cfg.nick, msg.trailing)
                }
                "464" | "465" => bail!("registration refused: {}", msg.trailing),
                _ => forward_info(event_tx, msg),
            }
        }
    }

    /// Read until the server echoes our JOIN back to us.
    async fn await_join(
        &self,
        conn: &mut Connection,
        event_tx: &mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<()> {
        loop {
            let line = match conn.read_line().await? {
                Some(l) => l,
                None => bail!("server closed the connection while joining"),
            };
            let msg = Message::parse(&line);
            match msg.command.as_str() {
                "PING" => reply_ping(conn, &msg).await?,
                // The echo either carries the channel as a middle param or
                // as trailing, depending on the server.
                "JOIN" if msg.nick == self.cfg.nick && self.names_our_channel(&msg) => {
                    return Ok(())
                }
                "403" | "405" | "471" | "473" | "474" | "475" => {
                    bail!("cannot join {}: {}", self.cfg.channel, msg.trailing)
                }
                _ => forward_info(event_tx, msg),
            }
        }
    }

    fn names_our_channel(&self, msg: &Message) -> bool {
        msg.trailing == self.cfg.channel
            || msg.middle.first().is_some_and(|c| *c == self.cfg.channel)
    }

    /// Relay inbound traffic and serve control commands until quit or
    /// disconnect. Returns the close reason to report.
    async fn active_loop(
        &self,
        conn: &mut Connection,
        event_tx: &mpsc::UnboundedSender<ClientEvent>,
        control_rx: &mut mpsc::UnboundedReceiver<EngineControl>,
    ) -> Result<Option<String>> {
        enum Step {
            Line(Option<String>),
            Control(Option<EngineControl>),
        }
        loop {
            let step = tokio::select! {
                line = conn.read_line() => Step::Line(line?),
                cmd = control_rx.recv() => Step::Control(cmd),
            };
            match step {
                Step::Line(None) => {
                    return Ok(Some("server closed the connection".to_string()))
                }
                Step::Line(Some(line)) => {
                    let msg = Message::parse(&line);
                    match msg.command.as_str() {
                        "PING" => reply_ping(conn, &msg).await?,
                        "PRIVMSG" => {
                            let _ = event_tx.send(ClientEvent::Chat {
                                message: Box::new(msg),
                            });
                        }
                        _ => forward_info(event_tx, msg),
                    }
                }
                // A dropped control channel means the controller is gone;
                // close the session cleanly either way.
                Step::Control(None) => {
                    conn.send_line(&commands::quit(None)).await?;
                    return Ok(None);
                }
                Step::Control(Some(EngineControl::Quit(reason))) => {
                    conn.send_line(&commands::quit(reason.as_deref())).await?;
                    return Ok(reason);
                }
                Step::Control(Some(cmd)) => self.serve_command(conn, event_tx, cmd).await?,
            }
        }
    }

    async fn serve_command(
        &self,
        conn: &mut Connection,
        event_tx: &mpsc::UnboundedSender<ClientEvent>,
        cmd: EngineControl,
    ) -> Result<()> {
        match cmd {
            EngineControl::Privmsg(text) => {
                let line = commands::privmsg(std::slice::from_ref(&self.cfg.channel), &text)
                    .context("no channel to send to")?;
                conn.send_line(&line).await?;
            }
            EngineControl::Nick(new_nick) => {
                conn.send_line(&commands::nick(&new_nick)).await?;
                let _ = event_tx.send(ClientEvent::Info(InfoEvent::NickChanged {
                    nick: new_nick,
                }));
            }
            EngineControl::Away(reason) => {
                conn.send_line(&commands::away(reason.as_deref())).await?;
                let _ = event_tx.send(ClientEvent::Info(InfoEvent::AwaySet { reason }));
            }
            EngineControl::Names => {
                conn.send_line(&commands::names(std::slice::from_ref(&self.cfg.channel)))
                    .await?;
            }
            EngineControl::Quit(_) => unreachable!("handled in active_loop"),
        }
        Ok(())
    }
}

async fn reply_ping(conn: &mut Connection, msg: &Message) -> Result<()> {
    if let Some(line) = commands::pong(&msg.trailing, "") {
        conn.send_line(&line).await?;
    }
    Ok(())
}

fn forward_info(event_tx: &mpsc::UnboundedSender<ClientEvent>, msg: Message) {
    if !msg.command.is_empty() {
        let _ = event_tx.send(ClientEvent::ServerInfo {
            message: Box::new(msg),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    fn test_config(port: u16) -> SessionConfig {
        SessionConfig {
            server: "127.0.0.1".into(),
            port,
            channel: "#test".into(),
            channel_key: String::new(),
            username: "alice".into(),
            hostname: "localhost".into(),
            servername: "irc.example.com".into(),
            realname: "Alice".into(),
            nick: "alice".into(),
            color: "#a1b2c3".into(),
            register_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Skip info/phase noise until the next substantive event.
    async fn next_substantive(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
        loop {
            match next_event(rx).await {
                ClientEvent::Info(_) | ClientEvent::PhaseStarted { .. } => continue,
                ev => return ev,
            }
        }
    }

    #[tokio::test]
    async fn full_session_against_scripted_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (read_half, mut writer) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            let user_line = lines.next_line().await.expect("read").expect("line");
            assert_eq!(user_line, "USER alice localhost irc.example.com Alice");
            let nick_line = lines.next_line().await.expect("read").expect("line");
            assert_eq!(nick_line, "NICK alice");

            // Exercise the in-registration PING path before welcoming.
            writer
                .write_all(b"PING :cookie1\r\n")
                .await
                .expect("write");
            let pong_line = lines.next_line().await.expect("read").expect("line");
            assert_eq!(pong_line, "PONG cookie1");

            writer
                .write_all(b":irc.example.com 001 alice :Welcome\r\n")
                .await
                .expect("write");

            let join_line = lines.next_line().await.expect("read").expect("line");
            assert_eq!(join_line, "JOIN #test");
            writer
                .write_all(b":alice!alice@localhost JOIN :#test\r\n")
                .await
                .expect("write");

            writer
                .write_all(b":carol!carol@peer.example PRIVMSG #test :hi alice\r\n")
                .await
                .expect("write");

            let msg_line = lines.next_line().await.expect("read").expect("line");
            assert_eq!(msg_line, "PRIVMSG #test :hello carol");

            let quit_line = lines.next_line().await.expect("read").expect("line");
            assert_eq!(quit_line, "QUIT");
        });

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let engine = ChatEngine::new(test_config(port));
        let engine_handle = tokio::spawn(engine.run(event_tx, control_rx));

        match next_substantive(&mut event_rx).await {
            ClientEvent::Joined { channel } => assert_eq!(channel, "#test"),
            other => panic!("expected Joined, got {:?}", other),
        }

        match next_substantive(&mut event_rx).await {
            ClientEvent::Chat { message } => {
                assert_eq!(message.nick, "carol");
                assert_eq!(message.trailing, "hi alice");
            }
            other => panic!("expected Chat, got {:?}", other),
        }

        control_tx
            .send(EngineControl::Privmsg("hello carol".into()))
            .expect("send");
        control_tx.send(EngineControl::Quit(None)).expect("send");

        match next_substantive(&mut event_rx).await {
            ClientEvent::Closed { reason } => assert!(reason.is_none()),
            other => panic!("expected Closed, got {:?}", other),
        }

        engine_handle
            .await
            .expect("engine task")
            .expect("engine result");
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn nick_rejection_fails_the_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (read_half, mut writer) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let _ = lines.next_line().await;
            let _ = lines.next_line().await;
            writer
                .write_all(b":irc.example.com 433 * alice :Nickname is already in use\r\n")
                .await
                .expect("write");
        });

        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (_control_tx, control_rx) = mpsc::unbounded_channel();
        let engine = ChatEngine::new(test_config(port));
        let err = engine
            .run(event_tx, control_rx)
            .await
            .expect_err("nick rejection should fail");
        assert!(err.to_string().contains("rejected"));
    }
}
