//! # bgpool-id
//!
//! Validated names and typed IDs for the bgpool node-pool reconciler.
//!
//! ## Names
//!
//! Clusters and node pools are addressed by operator-chosen names. Names end up
//! inside state-store keys (`/<prefix>/<cluster>/nodepools/<pool>/...`) and
//! inside provisioned resource handles (`<pool>-<digest>`), so they are held to
//! DNS-label rules:
//!
//! - 1 to 63 characters
//! - lowercase ASCII letters, digits, and `-`
//! - must start with a letter and must not end with `-`
//!
//! ## IDs
//!
//! System-generated identifiers use a prefixed ULID format: `{prefix}_{ulid}`.
//!
//! Examples:
//! - `pass_01HV4Z2WQXKJNM8GPQY6VBKC3D` (one reconciliation pass)
//! - `hold_01HV4Z3MXNKPQR9HSTZ7WCLD4E` (a lease holder)

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
