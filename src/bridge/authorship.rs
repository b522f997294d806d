//! Authorship resolution.
//!
//! The protocol's from-me flag is not always set for messages echoed from
//! linked devices, so attribution is layered: send-path override, protocol
//! flag, structural identifier match, and only then a best-effort substring
//! check. The priority order matters — keep it.

use super::normalizer::strip_jid_domain;

/// Signals available when attributing a message to the local account.
#[derive(Debug, Clone, Copy)]
pub struct AuthorshipSignals<'a> {
    /// Set by the send path: the record is known to be ours.
    pub force_from_me: bool,
    /// The protocol event's own from-me flag.
    pub protocol_from_me: bool,
    /// Sender/participant identifier (JID or bare number).
    pub sender_id: &'a str,
    /// Origin chat address, for the last-resort containment check.
    pub origin: &'a str,
    /// Locally-known account identifier (digits), captured once after the
    /// connection establishes. `None` until known.
    pub own_id: Option<&'a str>,
}

/// Decide whether the message was authored by the local account.
pub fn resolve(signals: &AuthorshipSignals<'_>) -> bool {
    if signals.force_from_me {
        return true;
    }
    if signals.protocol_from_me {
        return true;
    }

    let Some(own) = signals.own_id.filter(|o| !o.is_empty()) else {
        return false;
    };

    // Structural comparison of the phone-number part. Linked-device JIDs
    // carry ":device" / ".agent" suffixes on the user part; drop them.
    let sender_number = strip_jid_domain(signals.sender_id)
        .split([':', '.'])
        .next()
        .unwrap_or_default();
    if !sender_number.is_empty() {
        return sender_number == own;
    }

    // Deprecated fallback: textual containment. Only reached when the sender
    // identifier is unusable; a number being a substring of an unrelated
    // identifier makes this unreliable.
    signals.origin.contains(own)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals<'a>(
        force: bool,
        protocol: bool,
        sender: &'a str,
        origin: &'a str,
        own: Option<&'a str>,
    ) -> AuthorshipSignals<'a> {
        AuthorshipSignals {
            force_from_me: force,
            protocol_from_me: protocol,
            sender_id: sender,
            origin,
            own_id: own,
        }
    }

    #[test]
    fn test_force_always_wins() {
        assert!(resolve(&signals(true, false, "", "", None)));
        assert!(resolve(&signals(
            true,
            false,
            "5511888@s.whatsapp.net",
            "x",
            Some("5511999")
        )));
    }

    #[test]
    fn test_protocol_flag() {
        assert!(resolve(&signals(false, true, "other@s.whatsapp.net", "", None)));
    }

    #[test]
    fn test_structural_match() {
        assert!(resolve(&signals(
            false,
            false,
            "5511999999999@s.whatsapp.net",
            "chat@s.whatsapp.net",
            Some("5511999999999")
        )));
    }

    #[test]
    fn test_structural_match_with_device_suffix() {
        assert!(resolve(&signals(
            false,
            false,
            "5511999999999:12@s.whatsapp.net",
            "chat@s.whatsapp.net",
            Some("5511999999999")
        )));
    }

    #[test]
    fn test_structural_mismatch_rejects() {
        // A usable sender identifier that differs settles the question; no
        // fall-through to the substring heuristic.
        assert!(!resolve(&signals(
            false,
            false,
            "5511888888888@s.whatsapp.net",
            "5511999999999@s.whatsapp.net",
            Some("5511999999999")
        )));
    }

    #[test]
    fn test_containment_fallback_when_sender_unusable() {
        assert!(resolve(&signals(
            false,
            false,
            "",
            "5511999999999@s.whatsapp.net",
            Some("5511999999999")
        )));
        assert!(!resolve(&signals(
            false,
            false,
            "",
            "5511888888888@s.whatsapp.net",
            Some("5511999999999")
        )));
    }

    #[test]
    fn test_unknown_own_id_means_not_ours() {
        assert!(!resolve(&signals(
            false,
            false,
            "5511999999999@s.whatsapp.net",
            "anything",
            None
        )));
    }
}
