//! Stage name validation.
//!
//! Stage names end up as the last component of `refs/bt/<revision>/<stage>`,
//! so they must be valid git ref components and must not be able to escape
//! the ref namespace.

use crate::error::{BtError, Result};

/// Maximum allowed length for stage names.
pub const MAX_NAME_LENGTH: usize = 128;

/// Reserved names that cannot be used as stage names.
const RESERVED_NAMES: &[&str] = &[".", "..", "HEAD"];

/// Validates that a stage name is safe to embed in a ref path.
///
/// A name is valid if:
/// - It is not empty and no longer than MAX_NAME_LENGTH characters
/// - It contains only alphanumeric characters, dashes, underscores and dots
/// - It does not start with a dot, contain `..` or end with `.lock`
///
/// # Examples
///
/// ```
/// use bt::validation::validate_stage_name;
///
/// assert!(validate_stage_name("build").is_ok());
/// assert!(validate_stage_name("unit_tests-2").is_ok());
/// assert!(validate_stage_name("").is_err());
/// assert!(validate_stage_name("../escape").is_err());
/// ```
pub fn validate_stage_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BtError::malformed(name, "stage name cannot be empty"));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(BtError::malformed(
            name,
            format!(
                "name too long: {} characters (max {MAX_NAME_LENGTH})",
                name.len()
            ),
        ));
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid_chars {
        return Err(BtError::malformed(
            name,
            "name contains invalid characters. Use only alphanumeric characters, dashes (-), underscores (_) and dots (.)",
        ));
    }

    if RESERVED_NAMES.contains(&name) {
        return Err(BtError::malformed(name, "name is reserved"));
    }

    if name.starts_with('.') || name.contains("..") || name.ends_with(".lock") {
        return Err(BtError::malformed(
            name,
            "name must not start with '.', contain '..' or end with '.lock'",
        ));
    }

    Ok(())
}
