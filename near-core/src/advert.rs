//! Advertisement data parsing and display-name resolution.
//!
//! Low-energy advertisement payloads are a sequence of AD structures:
//!
//! ```text
//! +--------+------+----------------------+
//! | len u8 | type | data (len - 1 bytes) |
//! +--------+------+----------------------+
//! ```
//!
//! A zero length terminates the payload (the remainder is padding).

use nearlink_types::BtAddress;

/// AD type: shortened local name.
const AD_TYPE_SHORT_NAME: u8 = 0x08;
/// AD type: complete local name.
const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// Number of trailing address characters used in a synthesized name.
const FALLBACK_SUFFIX_LEN: usize = 5;

/// Prefix of every synthesized name.
pub const UNKNOWN_DEVICE_PREFIX: &str = "Unknown Device";

/// Extract the local name from raw advertisement bytes.
///
/// Returns the first shortened (0x08) or complete (0x09) name field, decoded
/// as UTF-8. Parsing stops at a zero-length structure or at a structure whose
/// declared length overruns the buffer. Invalid UTF-8 and blank names yield
/// `None`.
pub fn parse_advertised_name(bytes: &[u8]) -> Option<String> {
    let mut index = 0;
    while index < bytes.len() {
        let length = bytes[index] as usize;
        if length == 0 || index + length >= bytes.len() {
            break;
        }
        let ad_type = bytes[index + 1];
        if ad_type == AD_TYPE_SHORT_NAME || ad_type == AD_TYPE_COMPLETE_NAME {
            let data = &bytes[index + 2..index + 1 + length];
            return std::str::from_utf8(data)
                .ok()
                .filter(|name| !name.trim().is_empty())
                .map(str::to_owned);
        }
        index += length + 1;
    }
    None
}

/// Synthesized name for a device that never reported one.
pub fn fallback_name(address: &BtAddress) -> String {
    format!(
        "{} ({})",
        UNKNOWN_DEVICE_PREFIX,
        address.suffix(FALLBACK_SUFFIX_LEN)
    )
}

/// Whether `name` looks synthesized by [`fallback_name`] (case-insensitive).
pub fn is_fallback_name(name: &str) -> bool {
    name.to_lowercase()
        .starts_with(&UNKNOWN_DEVICE_PREFIX.to_lowercase())
}

/// Resolve the display name of an advertising device.
///
/// Prefers the platform-reported name, then the name carried in the
/// advertisement payload, then [`fallback_name`].
pub fn resolve_name(
    reported: Option<&str>,
    advertisement: Option<&[u8]>,
    address: &BtAddress,
) -> String {
    if let Some(name) = reported.filter(|n| !n.trim().is_empty()) {
        return name.to_string();
    }
    advertisement
        .and_then(parse_advertised_name)
        .unwrap_or_else(|| fallback_name(address))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> BtAddress {
        BtAddress::new("AA:BB:CC:DD:EE:FF")
    }

    // ===========================================
    // AD structure parsing
    // ===========================================

    #[test]
    fn parses_complete_name() {
        let bytes = [0x05, 0x09, b'P', b'i', b'x', b'l'];
        assert_eq!(parse_advertised_name(&bytes).as_deref(), Some("Pixl"));
    }

    #[test]
    fn parses_short_name_after_flags() {
        // Flags structure, then a shortened name.
        let bytes = [0x02, 0x01, 0x06, 0x04, 0x08, b'A', b'B', b'C'];
        assert_eq!(parse_advertised_name(&bytes).as_deref(), Some("ABC"));
    }

    #[test]
    fn first_name_field_wins() {
        let bytes = [0x02, 0x08, b'S', 0x03, 0x09, b'L', b'g'];
        assert_eq!(parse_advertised_name(&bytes).as_deref(), Some("S"));
    }

    #[test]
    fn zero_length_terminates() {
        let bytes = [0x00, 0x05, 0x09, b'N', b'a', b'm', b'e'];
        assert_eq!(parse_advertised_name(&bytes), None);
    }

    #[test]
    fn overrunning_structure_stops_parsing() {
        // Declares 10 bytes but only 3 follow.
        let bytes = [0x0A, 0x09, b'N', b'o'];
        assert_eq!(parse_advertised_name(&bytes), None);
    }

    #[test]
    fn no_name_field_yields_none() {
        let bytes = [0x02, 0x01, 0x06, 0x03, 0x03, 0x0F, 0x18];
        assert_eq!(parse_advertised_name(&bytes), None);
        assert_eq!(parse_advertised_name(&[]), None);
    }

    #[test]
    fn invalid_utf8_yields_none() {
        let bytes = [0x03, 0x09, 0xFF, 0xFE];
        assert_eq!(parse_advertised_name(&bytes), None);
    }

    #[test]
    fn blank_name_yields_none() {
        let bytes = [0x03, 0x09, b' ', b' '];
        assert_eq!(parse_advertised_name(&bytes), None);
    }

    // ===========================================
    // Name resolution
    // ===========================================

    #[test]
    fn fallback_uses_last_five_chars() {
        assert_eq!(fallback_name(&addr()), "Unknown Device (EE:FF)");
    }

    #[test]
    fn fallback_names_are_recognized() {
        assert!(is_fallback_name(&fallback_name(&addr())));
        assert!(is_fallback_name("unknown device (12:34)"));
        assert!(!is_fallback_name("Buds"));
    }

    #[test]
    fn reported_name_preferred() {
        let bytes = [0x04, 0x09, b'A', b'd', b'v'];
        assert_eq!(resolve_name(Some("Phone"), Some(&bytes), &addr()), "Phone");
    }

    #[test]
    fn blank_reported_name_falls_through_to_advert() {
        let bytes = [0x04, 0x09, b'A', b'd', b'v'];
        assert_eq!(resolve_name(Some("  "), Some(&bytes), &addr()), "Adv");
        assert_eq!(resolve_name(None, Some(&bytes), &addr()), "Adv");
    }

    #[test]
    fn nothing_resolves_to_fallback() {
        let bytes = [0x02, 0x01, 0x06];
        assert_eq!(
            resolve_name(None, Some(&bytes), &addr()),
            "Unknown Device (EE:FF)"
        );
        assert_eq!(resolve_name(Some(""), None, &addr()), "Unknown Device (EE:FF)");
    }
}
