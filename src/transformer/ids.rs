//! Message id and signature minting.
//!
//! Client-facing message ids and thinking-block signatures are derived
//! deterministically from the upstream id, so a retried identical request
//! yields identical values. Randomness only enters when the upstream omits
//! its id entirely.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Matches an id of the form `<letters>-<suffix>` (e.g. `chatcmpl-abc123`)
    /// and captures the suffix.
    static ref ID_PREFIX_REGEX: Regex =
        Regex::new(r"^[A-Za-z]+-([A-Za-z0-9_\-]+)").unwrap();
}

/// Extract the suffix of an upstream id.
///
/// Returns the portion after the first `<letters>-` prefix, or the whole id
/// when no prefix matches.
pub fn id_suffix(upstream_id: &str) -> &str {
    ID_PREFIX_REGEX
        .captures(upstream_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(upstream_id)
}

/// Mint the client-facing message id for an upstream id.
///
/// `Some(id)` yields `msg_<suffix>`; `None` synthesizes a random 9-character
/// suffix.
pub fn mint_message_id(upstream_id: Option<&str>) -> String {
    match upstream_id {
        Some(id) if !id.is_empty() => format!("msg_{}", id_suffix(id)),
        _ => format!("msg_{}", random_suffix()),
    }
}

/// Signature value for a reasoning-content thinking block: the id suffix.
pub fn signature_for(upstream_id: &str) -> String {
    id_suffix(upstream_id).to_string()
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_suffix_strips_prefix() {
        assert_eq!(id_suffix("chatcmpl-abc"), "abc");
        assert_eq!(id_suffix("cmpl-xyz_123-456"), "xyz_123-456");
        assert_eq!(id_suffix("gen-20240101-foo"), "20240101-foo");
    }

    #[test]
    fn test_id_suffix_no_prefix() {
        assert_eq!(id_suffix("abc123"), "abc123");
        assert_eq!(id_suffix("123-abc"), "123-abc");
        assert_eq!(id_suffix(""), "");
    }

    #[test]
    fn test_mint_message_id() {
        assert_eq!(mint_message_id(Some("chatcmpl-abc")), "msg_abc");
        assert_eq!(mint_message_id(Some("noprefix")), "msg_noprefix");
    }

    #[test]
    fn test_mint_deterministic() {
        assert_eq!(
            mint_message_id(Some("chatcmpl-xyz")),
            mint_message_id(Some("chatcmpl-xyz"))
        );
    }

    #[test]
    fn test_mint_random_fallback() {
        let id = mint_message_id(None);
        assert!(id.starts_with("msg_"));
        assert_eq!(id.len(), "msg_".len() + 9);

        // Empty upstream ids also get a random suffix
        let id = mint_message_id(Some(""));
        assert_eq!(id.len(), "msg_".len() + 9);
    }

    #[test]
    fn test_signature_matches_suffix() {
        assert_eq!(signature_for("chatcmpl-abc"), "abc");
        assert_eq!(signature_for("rawid"), "rawid");
        assert_eq!(signature_for("chatcmpl-abc"), signature_for("chatcmpl-abc"));
    }
}
