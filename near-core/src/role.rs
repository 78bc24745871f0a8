//! Role resolution.
//!
//! A device's role is derived from its stable id alone: ids on the
//! broadcaster list initiate handoffs, ids on the receiver list only
//! respond, and everyone else is neutral.

use nearlink_types::{Identity, Role, StableId};
use serde::{Deserialize, Serialize};

/// Stable id of the well-known broadcaster installation.
pub const BROADCASTER_ID: &str = "8ddeebd2bcb19a1e";

/// Prefix a broadcaster puts on its radio-visible name.
pub const BROADCASTER_PREFIX: &str = "ARES_";

/// The constant id sets roles are resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownIds {
    /// Ids that resolve to [`Role::Broadcaster`].
    pub broadcasters: Vec<StableId>,
    /// Ids that resolve to [`Role::Receiver`].
    pub receivers: Vec<StableId>,
}

impl Default for KnownIds {
    fn default() -> Self {
        Self {
            broadcasters: vec![StableId::new(BROADCASTER_ID)],
            receivers: Vec::new(),
        }
    }
}

/// Resolve the role of `identity`.
///
/// Broadcaster membership is checked first; an id listed in both sets is a
/// broadcaster.
pub fn resolve_role(identity: &Identity, known: &KnownIds) -> Role {
    if known.broadcasters.contains(&identity.stable_id) {
        Role::Broadcaster
    } else if known.receivers.contains(&identity.stable_id) {
        Role::Receiver
    } else {
        Role::Neutral
    }
}

/// Radio-visible name for a broadcaster currently named `current`.
///
/// Strips any run of leading prefixes and adds exactly one, so repeated
/// renames never stack.
pub fn broadcaster_name(current: &str) -> String {
    let mut base = current;
    while let Some(rest) = base.strip_prefix(BROADCASTER_PREFIX) {
        base = rest;
    }
    format!("{BROADCASTER_PREFIX}{base}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> Identity {
        Identity {
            local_name: "Pixel".into(),
            stable_id: StableId::new(id),
        }
    }

    #[test]
    fn known_broadcaster_resolves() {
        assert_eq!(
            resolve_role(&identity(BROADCASTER_ID), &KnownIds::default()),
            Role::Broadcaster
        );
    }

    #[test]
    fn unknown_id_is_neutral() {
        assert_eq!(
            resolve_role(&identity("0123456789abcdef"), &KnownIds::default()),
            Role::Neutral
        );
    }

    #[test]
    fn receiver_list_resolves() {
        let known = KnownIds {
            broadcasters: vec![StableId::new(BROADCASTER_ID)],
            receivers: vec![StableId::new("feedfacefeedface")],
        };
        assert_eq!(
            resolve_role(&identity("feedfacefeedface"), &known),
            Role::Receiver
        );
    }

    #[test]
    fn comparison_is_exact() {
        // Case and length differences are different ids.
        let known = KnownIds::default();
        assert_eq!(
            resolve_role(&identity("8DDEEBD2BCB19A1E"), &known),
            Role::Neutral
        );
        assert_eq!(resolve_role(&identity("8ddeebd2"), &known), Role::Neutral);
    }

    #[test]
    fn broadcaster_name_adds_single_prefix() {
        assert_eq!(broadcaster_name("Pixel"), "ARES_Pixel");
        assert_eq!(broadcaster_name("ARES_Pixel"), "ARES_Pixel");
        assert_eq!(broadcaster_name("ARES_ARES_ARES_Pixel"), "ARES_Pixel");
        assert_eq!(broadcaster_name(""), "ARES_");
    }

    #[test]
    fn known_ids_roundtrip_through_json() {
        let json = serde_json::to_string(&KnownIds::default()).unwrap();
        assert!(json.contains(BROADCASTER_ID));
    }
}
