//! RFC 1459 message parsing.
//!
//! Grammar handled here:
//! ```text
//! <message>  ::= [':' <prefix> <SPACE> ] <command> <params> <crlf>
//! <prefix>   ::= <servername> | <nick> [ '!' <user> ] [ '@' <host> ]
//! <command>  ::= <letter> { <letter> } | <number> <number> <number>
//! <params>   ::= <SPACE> [ ':' <trailing> | <middle> <params> ]
//! ```
//! Parsing never fails: absent parts stay empty. Servers send malformed
//! lines in practice and a chat client must shrug them off.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub prefix: String,
    /// The full prefix when no nick is present; servers identify
    /// themselves with a bare hostname prefix.
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub host: String,
    pub command: String,
    #[serde(default)]
    pub middle: Vec<String>,
    #[serde(default)]
    pub trailing: String,
}

impl Message {
    /// Parse one wire line. Any trailing CR/LF is stripped first.
    pub fn parse(raw: &str) -> Self {
        let mut msg = Message::default();
        let mut rest = raw.trim_end_matches(['\r', '\n']);

        if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, tail) = stripped.split_once(' ').unwrap_or((stripped, ""));
            msg.prefix = prefix.to_string();
            if let Some((nick, user_host)) = prefix.split_once('!') {
                msg.nick = nick.to_string();
                match user_host.split_once('@') {
                    Some((user, host)) => {
                        msg.user = user.to_string();
                        msg.host = host.to_string();
                    }
                    None => msg.user = user_host.to_string(),
                }
            } else if let Some((nick, host)) = prefix.split_once('@') {
                msg.nick = nick.to_string();
                msg.host = host.to_string();
            } else {
                msg.server = prefix.to_string();
            }
            rest = tail.trim_start_matches(' ');
        }

        // Command: a word, or a three-digit numeric reply.
        let (command, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        msg.command = command.to_string();
        rest = tail;

        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                msg.trailing = trailing.to_string();
                break;
            }
            let (param, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            msg.middle.push(param.to_string());
            rest = tail;
        }

        msg
    }

    /// Numeric replies (001, 433, ...) carry status, not chat.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.chars().all(|c| c.is_ascii_digit())
    }

    /// Serialize to the JSON wire form consumed by presentation layers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_privmsg_with_full_prefix() {
        let m = Message::parse(":alice!ali@host.example PRIVMSG #test :hi there\r\n");
        assert_eq!(m.prefix, "alice!ali@host.example");
        assert!(m.server.is_empty());
        assert_eq!(m.nick, "alice");
        assert_eq!(m.user, "ali");
        assert_eq!(m.host, "host.example");
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.middle, vec!["#test"]);
        assert_eq!(m.trailing, "hi there");
    }

    #[test]
    fn parses_server_prefix_without_nick() {
        let m = Message::parse(":irc.example.com 001 bob :Welcome to the network");
        assert_eq!(m.server, "irc.example.com");
        assert!(m.nick.is_empty());
        assert_eq!(m.command, "001");
        assert!(m.is_numeric());
        assert_eq!(m.middle, vec!["bob"]);
        assert_eq!(m.trailing, "Welcome to the network");
    }

    #[test]
    fn parses_ping_without_prefix() {
        let m = Message::parse("PING :cookie123");
        assert!(m.prefix.is_empty());
        assert_eq!(m.command, "PING");
        assert_eq!(m.trailing, "cookie123");
        assert!(!m.is_numeric());
    }

    #[test]
    fn trailing_keeps_embedded_colons_and_spaces() {
        let m = Message::parse(":a!b@c PRIVMSG #test :see: this :: stays intact");
        assert_eq!(m.trailing, "see: this :: stays intact");
    }

    #[test]
    fn collects_multiple_middle_params() {
        let m = Message::parse(":srv 353 bob = #test :bob alice carol");
        assert_eq!(m.middle, vec!["bob", "=", "#test"]);
        assert_eq!(m.trailing, "bob alice carol");
    }

    #[test]
    fn join_echo_with_trailing_channel() {
        let m = Message::parse(":alice!ali@localhost JOIN :#test");
        assert_eq!(m.command, "JOIN");
        assert_eq!(m.nick, "alice");
        assert!(m.middle.is_empty());
        assert_eq!(m.trailing, "#test");
    }

    #[test]
    fn tolerates_empty_and_garbage_input() {
        let m = Message::parse("");
        assert!(m.command.is_empty());
        let m = Message::parse("   ");
        assert!(m.trailing.is_empty());
        let m = Message::parse(":lonelyprefix");
        assert_eq!(m.prefix, "lonelyprefix");
        assert!(m.command.is_empty());
    }

    #[test]
    fn json_form_carries_all_fields() {
        let m = Message::parse(":alice!ali@h PRIVMSG #test :hi");
        let json = m.to_json().expect("serialize");
        let v: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(v["nick"], "alice");
        assert_eq!(v["command"], "PRIVMSG");
        assert_eq!(v["middle"][0], "#test");
        assert_eq!(v["trailing"], "hi");
    }
}
