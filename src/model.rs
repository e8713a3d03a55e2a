use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything needed to open, register, and join one chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub server: String,
    pub port: u16,
    pub channel: String,
    #[serde(default)]
    pub channel_key: String,
    pub username: String,
    pub hostname: String,
    pub servername: String,
    pub realname: String,
    pub nick: String,
    pub color: String,
    #[serde(with = "humantime_serde")]
    pub register_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub join_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Connecting,
    Registering,
    Joining,
    Active,
    Closed,
}

impl SessionPhase {
    /// Short label for status lines.
    pub fn as_status_str(self) -> &'static str {
        match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Registering => "registering",
            SessionPhase::Joining => "joining",
            SessionPhase::Active => "active",
            SessionPhase::Closed => "closed",
        }
    }
}

/// Events pushed by the engine and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientEvent {
    PhaseStarted {
        phase: SessionPhase,
    },
    /// The server confirmed our JOIN; safe to show the channel as current.
    Joined {
        channel: String,
    },
    /// Inbound PRIVMSG. Boxed to keep ClientEvent small; Message carries
    /// every parsed field and would bloat the enum.
    Chat {
        message: Box<Message>,
    },
    /// Inbound non-chat traffic (numerics, NOTICE, topic changes, ...).
    ServerInfo {
        message: Box<Message>,
    },
    Info(InfoEvent),
    Closed {
        reason: Option<String>,
    },
}

/// Structured info events emitted by the engine and controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    // UI/CLI messages generated outside the engine.
    Message(String),
    Connecting { server: String, port: u16 },
    Registering { nick: String },
    JoiningChannel { channel: String },
    AwaySet { reason: Option<String> },
    NickChanged { nick: String },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Connecting { server, port } => {
                format!("Connecting to {}:{}", server, port)
            }
            InfoEvent::Registering { nick } => {
                format!("Registering as {}", nick)
            }
            InfoEvent::JoiningChannel { channel } => {
                format!("Joining {}", channel)
            }
            InfoEvent::AwaySet { reason: Some(r) } => format!("Away: {}", r),
            InfoEvent::AwaySet { reason: None } => "No longer away".to_string(),
            InfoEvent::NickChanged { nick } => format!("Nick change requested: {}", nick),
        }
    }
}

/// Random CSS hex color, uniform over the 24-bit RGB space.
pub fn random_hex_color() -> String {
    use rand::Rng;
    format!("#{:06x}", rand::thread_rng().gen_range(0u32..=0xFF_FFFF))
}

/// Wall-clock stamp for chat lines, local time when available.
pub fn wall_clock() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let format = time::macros::format_description!("[hour]:[minute]:[second]");
    now.format(&format).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_colors_are_six_digit_hex() {
        for _ in 0..200 {
            let c = random_hex_color();
            assert_eq!(c.len(), 7);
            assert!(c.starts_with('#'));
            assert!(c[1..].chars().all(|ch| ch.is_ascii_hexdigit()));
            let v = u32::from_str_radix(&c[1..], 16).expect("hex");
            assert!(v <= 0xFF_FFFF);
        }
    }

    #[test]
    fn wall_clock_is_hh_mm_ss() {
        let stamp = wall_clock();
        assert_eq!(stamp.len(), 8);
        assert_eq!(stamp.as_bytes()[2], b':');
        assert_eq!(stamp.as_bytes()[5], b':');
    }

    #[test]
    fn info_event_messages_read_well() {
        let ev = InfoEvent::Connecting {
            server: "irc.example.com".into(),
            port: 6667,
        };
        assert_eq!(ev.to_message(), "Connecting to irc.example.com:6667");
        assert_eq!(
            InfoEvent::AwaySet { reason: None }.to_message(),
            "No longer away"
        );
    }

    #[test]
    fn session_config_round_trips_with_humantime_fields() {
        let cfg = SessionConfig {
            server: "irc.example.com".into(),
            port: 6667,
            channel: "#test".into(),
            channel_key: String::new(),
            username: "alice".into(),
            hostname: "localhost".into(),
            servername: "irc.example.com".into(),
            realname: "Alice".into(),
            nick: "alice".into(),
            color: "#a1b2c3".into(),
            register_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(10),
        };
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: SessionConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.nick, "alice");
        assert_eq!(back.register_timeout, Duration::from_secs(10));
    }
}
