use crate::cli::Cli;
use crate::model::{self, ClientEvent, SessionConfig, SessionPhase};
use ratatui::style::Color;
use std::time::Duration;

// Register-form field indices; the order matches the rendered form.
pub const F_SERVER: usize = 0;
pub const F_PORT: usize = 1;
pub const F_CHANNEL: usize = 2;
pub const F_CHANNEL_KEY: usize = 3;
pub const F_USERNAME: usize = 4;
pub const F_HOSTNAME: usize = 5;
pub const F_SERVERNAME: usize = 6;
pub const F_REALNAME: usize = 7;
pub const F_NICK: usize = 8;
pub const F_COLOR: usize = 9;

pub struct FormField {
    pub label: &'static str,
    pub value: String,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Register,
    Chat,
}

/// One rendered log entry.
pub struct ChatLine {
    pub stamp: String,
    pub name: String,
    pub color: Color,
    pub text: String,
}

pub struct UiState {
    pub screen: Screen,
    pub fields: Vec<FormField>,
    pub focus: usize,
    pub phase: Option<SessionPhase>,
    pub info: String,

    pub channel_label: String,
    pub nick: String,
    pub own_color: Color,
    /// Single shared color for all remote senders, assigned on first use.
    pub peer_color: Option<Color>,

    pub lines: Vec<ChatLine>,
    /// 0 = stick to the newest line.
    pub scroll_from_bottom: usize,
    pub input: String,

    pub register_timeout: Duration,
    pub join_timeout: Duration,
}

impl UiState {
    /// Build the initial state with form fields prefilled from CLI flags.
    pub fn from_args(args: &Cli) -> Self {
        let prefill = |v: &Option<String>| v.clone().unwrap_or_default();
        let fields = vec![
            FormField {
                label: "Server",
                value: prefill(&args.server),
                required: true,
            },
            FormField {
                label: "Port",
                value: args.port.to_string(),
                required: true,
            },
            FormField {
                label: "Channel",
                value: prefill(&args.channel),
                required: true,
            },
            FormField {
                label: "Channel key",
                value: args.channel_key.clone(),
                required: false,
            },
            FormField {
                label: "Username",
                value: prefill(&args.username),
                required: true,
            },
            FormField {
                label: "Hostname",
                value: args.hostname.clone(),
                required: true,
            },
            FormField {
                label: "Server name",
                value: match &args.servername {
                    Some(s) if !s.is_empty() => s.clone(),
                    _ => prefill(&args.server),
                },
                required: true,
            },
            FormField {
                label: "Real name",
                value: prefill(&args.realname),
                required: true,
            },
            FormField {
                label: "Nickname",
                value: prefill(&args.nick),
                required: true,
            },
            FormField {
                label: "Color",
                value: args
                    .color
                    .clone()
                    .unwrap_or_else(model::random_hex_color),
                required: true,
            },
        ];
        Self {
            screen: Screen::Register,
            fields,
            focus: 0,
            phase: None,
            info: String::new(),
            channel_label: String::new(),
            nick: String::new(),
            own_color: Color::Cyan,
            peer_color: None,
            lines: Vec::new(),
            scroll_from_bottom: 0,
            input: String::new(),
            register_timeout: Duration::from(args.register_timeout),
            join_timeout: Duration::from(args.join_timeout),
        }
    }

    /// The form is valid iff every required field is non-empty.
    pub fn form_valid(&self) -> bool {
        self.fields
            .iter()
            .all(|f| !f.required || !f.value.trim().is_empty())
    }

    /// Turn the form into a session config, or explain what's wrong.
    pub fn config_from_form(&self) -> Result<SessionConfig, String> {
        if !self.form_valid() {
            return Err("Fill in all required fields".to_string());
        }
        let port: u16 = self.fields[F_PORT]
            .value
            .trim()
            .parse()
            .map_err(|_| "Port must be a number between 1 and 65535".to_string())?;
        let field = |i: usize| self.fields[i].value.trim().to_string();
        Ok(SessionConfig {
            server: field(F_SERVER),
            port,
            channel: field(F_CHANNEL),
            channel_key: field(F_CHANNEL_KEY),
            username: field(F_USERNAME),
            hostname: field(F_HOSTNAME),
            servername: field(F_SERVERNAME),
            realname: field(F_REALNAME),
            nick: field(F_NICK),
            color: field(F_COLOR),
            register_timeout: self.register_timeout,
            join_timeout: self.join_timeout,
        })
    }

    pub fn push_line(&mut self, name: String, color: Color, text: String) {
        const MAX: usize = 500;
        self.lines.push(ChatLine {
            stamp: model::wall_clock(),
            name,
            color,
            text,
        });
        if self.lines.len() > MAX {
            let _ = self.lines.drain(0..(self.lines.len() - MAX));
        }
    }

    /// Take the chat input for sending. Non-command text is echoed into
    /// the log under our own nick; slash commands are not.
    pub fn submit_input(&mut self) -> Option<String> {
        if self.input.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.input);
        if !text.starts_with('/') {
            let nick = self.nick.clone();
            let color = self.own_color;
            self.push_line(nick, color, text.clone());
            self.scroll_from_bottom = 0;
        }
        Some(text)
    }

    fn peer_color(&mut self) -> Color {
        *self
            .peer_color
            .get_or_insert_with(|| parse_hex_color(&model::random_hex_color()).unwrap_or(Color::Magenta))
    }
}

/// Fold one engine event into the UI state.
pub fn apply_event(state: &mut UiState, ev: ClientEvent) {
    match ev {
        ClientEvent::PhaseStarted { phase } => {
            state.phase = Some(phase);
        }
        ClientEvent::Joined { channel } => {
            state.channel_label = channel.clone();
            state.screen = Screen::Chat;
            state.info = format!("Joined {}", channel);
        }
        ClientEvent::Chat { message } => {
            // Own messages were already echoed at send time.
            if !message.nick.is_empty() && message.nick != state.nick {
                let color = state.peer_color();
                state.push_line(message.nick.clone(), color, message.trailing.clone());
            }
        }
        ClientEvent::ServerInfo { message } => {
            let detail = if message.trailing.is_empty() {
                message.middle.join(" ")
            } else {
                message.trailing.clone()
            };
            // Numeric reply codes mean nothing to the user; show the text.
            state.info = if message.is_numeric() {
                detail
            } else {
                format!("{} {}", message.command, detail)
            };
        }
        ClientEvent::Info(info) => {
            state.info = info.to_message();
        }
        ClientEvent::Closed { reason } => {
            state.phase = Some(SessionPhase::Closed);
            state.screen = Screen::Register;
            state.info = match reason {
                Some(r) => format!("Disconnected: {}", r),
                None => "Disconnected".to_string(),
            };
        }
    }
}

/// Parse "#rrggbb" into a terminal color.
pub fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}
