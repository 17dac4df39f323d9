//! Typed ID and name definitions.

use crate::{define_id, define_name, IdError};

/// Maximum length of a DNS label.
pub const MAX_LABEL_LEN: usize = 63;

// =============================================================================
// Names
// =============================================================================

define_name!(ClusterName, "cluster name");
define_name!(PoolName, "pool name");

/// Checks `s` against DNS-label rules.
///
/// Used by the types generated with `define_name!`.
#[doc(hidden)]
pub fn validate_label(kind: &'static str, s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    if s.len() > MAX_LABEL_LEN {
        return Err(IdError::NameTooLong {
            kind,
            name: s.to_string(),
            max: MAX_LABEL_LEN,
        });
    }

    let invalid = |reason| IdError::InvalidName {
        kind,
        name: s.to_string(),
        reason,
    };

    if !s.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("must start with a lowercase letter"));
    }
    if s.ends_with('-') {
        return Err(invalid("must not end with '-'"));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("only lowercase letters, digits, and '-' are allowed"));
    }

    Ok(())
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Splits `{prefix}_{ulid}` and checks the prefix.
///
/// Used by the types generated with `define_id!`.
#[doc(hidden)]
pub fn parse_prefixed(prefix: &'static str, s: &str) -> Result<crate::Ulid, IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }

    let (actual, raw) = s.split_once('_').ok_or(IdError::MissingSeparator)?;
    if actual != prefix {
        return Err(IdError::InvalidPrefix {
            expected: prefix,
            actual: actual.to_string(),
        });
    }

    raw.parse()
        .map_err(|e: ulid::DecodeError| IdError::InvalidUlid(e.to_string()))
}

define_id!(PassId, "pass");
define_id!(HolderId, "hold");

// =============================================================================
// Tests
// =============================================================================
