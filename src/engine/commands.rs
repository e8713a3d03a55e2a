//! IRC wire command builders.
//!
//! Pure string construction, one function per client command. Builders
//! that can be called with unusable arguments return `None` rather than
//! emitting a malformed line.

/// USER line of the registration pair.
pub fn user(username: &str, hostname: &str, servername: &str, realname: &str) -> String {
    format!("USER {} {} {} {}", username, hostname, servername, realname)
}

pub fn nick(nickname: &str) -> String {
    format!("NICK {}", nickname)
}

/// JOIN one or more channels with positional keys. Keys must be empty or
/// match the channel list in length; a mismatch would silently key the
/// wrong channel.
pub fn join(channels: &[String], keys: &[String]) -> Option<String> {
    if channels.is_empty() || (!keys.is_empty() && keys.len() != channels.len()) {
        return None;
    }
    let mut line = format!("JOIN {}", channels.join(","));
    if keys.iter().any(|k| !k.is_empty()) {
        line.push(' ');
        line.push_str(&keys.join(","));
    }
    Some(line)
}

/// PRIVMSG to every joined channel, comma-separated targeting.
pub fn privmsg(targets: &[String], text: &str) -> Option<String> {
    if targets.is_empty() {
        return None;
    }
    Some(format!("PRIVMSG {} :{}", targets.join(","), text))
}

pub fn names(channels: &[String]) -> String {
    format!("NAMES {}", channels.join(","))
}

/// AWAY with a reason marks us away; without one clears the marker.
pub fn away(reason: Option<&str>) -> String {
    match reason {
        Some(r) => format!("AWAY :{}", r),
        None => "AWAY".to_string(),
    }
}

/// PONG reply to a server PING; the cookie is the PING's trailing value.
pub fn pong(cookie: &str, server: &str) -> Option<String> {
    if cookie.is_empty() {
        return None;
    }
    if server.is_empty() {
        Some(format!("PONG {}", cookie))
    } else {
        Some(format!("PONG {} {}", cookie, server))
    }
}

pub fn quit(reason: Option<&str>) -> String {
    match reason {
        Some(r) => format!("QUIT :{}", r),
        None => "QUIT".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn registration_pair() {
        assert_eq!(
            user("alice", "localhost", "irc.example.com", "Alice"),
            "USER alice localhost irc.example.com Alice"
        );
        assert_eq!(nick("alice"), "NICK alice");
    }

    #[test]
    fn join_without_keys_omits_key_field() {
        assert_eq!(join(&strs(&["#test"]), &[]).as_deref(), Some("JOIN #test"));
        // An all-empty key list means no channel is keyed.
        assert_eq!(
            join(&strs(&["#test"]), &strs(&[""])).as_deref(),
            Some("JOIN #test")
        );
    }

    #[test]
    fn join_with_keys_is_positional() {
        assert_eq!(
            join(&strs(&["#a", "#b"]), &strs(&["k1", "k2"])).as_deref(),
            Some("JOIN #a,#b k1,k2")
        );
    }

    #[test]
    fn join_refuses_mismatched_key_list() {
        assert!(join(&strs(&["#a", "#b"]), &strs(&["k1"])).is_none());
        assert!(join(&[], &[]).is_none());
    }

    #[test]
    fn privmsg_uses_trailing_form() {
        assert_eq!(
            privmsg(&strs(&["#test"]), "hi: all of you").as_deref(),
            Some("PRIVMSG #test :hi: all of you")
        );
        assert!(privmsg(&[], "hi").is_none());
    }

    #[test]
    fn pong_echoes_cookie() {
        assert_eq!(pong("abc123", "").as_deref(), Some("PONG abc123"));
        assert_eq!(
            pong("abc123", "irc.example.com").as_deref(),
            Some("PONG abc123 irc.example.com")
        );
        assert!(pong("", "irc.example.com").is_none());
    }

    #[test]
    fn away_and_quit_reasons_are_optional() {
        assert_eq!(away(Some("lunch")), "AWAY :lunch");
        assert_eq!(away(None), "AWAY");
        assert_eq!(quit(Some("bye")), "QUIT :bye");
        assert_eq!(quit(None), "QUIT");
    }
}
