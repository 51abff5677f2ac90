//! Capability string negotiation.
//!
//! A capability string is a whitespace or comma separated list of names.
//! Names starting with `+` are mandatory: the other side must know them.

use thiserror::Error;

/// Capabilities of the tilespec files this crate reads.
pub const TILESPEC_CAPSTR: &str = "+Freeciv-tilespec-Devel-2019-Jul-03 duplicates_ok";

/// Capabilities of the sprite spec files this crate reads.
pub const SPEC_CAPSTR: &str = "+Freeciv-spec-Devel-2019-Jul-03 duplicates_ok";

/// Why two capability strings are incompatible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The file lacks a capability we require.
    #[error("file is too old: it lacks required capability \"{missing}\"")]
    TooOld { missing: String },

    /// The file requires a capability we do not have.
    #[error("file requires unsupported capability \"{missing}\"")]
    Unsupported { missing: String },
}

fn tokens(list: &str) -> impl Iterator<Item = &str> {
    list.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

fn mandatory(list: &str) -> impl Iterator<Item = &str> {
    tokens(list).filter_map(|t| t.strip_prefix('+'))
}

/// Whether `cap` appears in `list`, mandatory or not.
pub fn has_capability(cap: &str, list: &str) -> bool {
    let cap = cap.trim_start_matches('+');
    tokens(list).any(|t| t.trim_start_matches('+') == cap)
}

/// Whether every mandatory capability of `them` is in `us`.
pub fn has_capabilities(us: &str, them: &str) -> bool {
    mandatory(them).all(|cap| has_capability(cap, us))
}

/// Check a file's capability string against ours.
pub fn check_capabilities(us: &str, file: &str) -> Result<(), CapabilityError> {
    if let Some(missing) = mandatory(us).find(|cap| !has_capability(cap, file)) {
        return Err(CapabilityError::TooOld {
            missing: format!("+{missing}"),
        });
    }
    if let Some(missing) = mandatory(file).find(|cap| !has_capability(cap, us)) {
        return Err(CapabilityError::Unsupported {
            missing: format!("+{missing}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_capability_ignores_plus() {
        assert!(has_capability("duplicates_ok", TILESPEC_CAPSTR));
        assert!(has_capability(
            "+Freeciv-tilespec-Devel-2019-Jul-03",
            TILESPEC_CAPSTR
        ));
        assert!(!has_capability("duplicates", TILESPEC_CAPSTR));
    }

    #[test]
    fn test_has_capabilities_checks_only_mandatory() {
        assert!(has_capabilities("+a b", "+a"));
        assert!(has_capabilities("+a", "+a c"));
        assert!(!has_capabilities("+a", "+a +c"));
    }

    #[test]
    fn test_matching_strings_are_compatible() {
        assert_eq!(check_capabilities(TILESPEC_CAPSTR, TILESPEC_CAPSTR), Ok(()));
        assert_eq!(
            check_capabilities(TILESPEC_CAPSTR, "+Freeciv-tilespec-Devel-2019-Jul-03"),
            Ok(())
        );
    }

    #[test]
    fn test_old_file_is_too_old() {
        assert_eq!(
            check_capabilities(TILESPEC_CAPSTR, "+Freeciv-tilespec-Devel-2015-Mar-25"),
            Err(CapabilityError::TooOld {
                missing: "+Freeciv-tilespec-Devel-2019-Jul-03".to_string()
            })
        );
    }

    #[test]
    fn test_newer_file_is_unsupported() {
        assert_eq!(
            check_capabilities(
                TILESPEC_CAPSTR,
                "+Freeciv-tilespec-Devel-2019-Jul-03, +hex_corners"
            ),
            Err(CapabilityError::Unsupported {
                missing: "+hex_corners".to_string()
            })
        );
    }
}
