//! Input validation and sanitization utilities.
//!
//! This module provides functions for validating and sanitizing
//! administrator input before it reaches the staging store or the platform:
//! import names and descriptions, category field keys, uploaded file names
//! and sizes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length for import names
pub const MAX_IMPORT_NAME_LENGTH: usize = 100;

/// Maximum length for category field keys
pub const MAX_FIELD_KEY_LENGTH: usize = 128;

/// Maximum length for descriptions
pub const MAX_DESCRIPTION_LENGTH: usize = 10000;

/// Maximum length for stored file names
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Errors that can occur during input validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),

    /// Input is a reserved word
    #[error("{field} cannot be a reserved word: {word}")]
    ReservedWord { field: &'static str, word: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate the name of an import.
///
/// # Rules
///
/// - Must not be empty or whitespace only
/// - Must not exceed 100 characters
/// - Must not contain control characters
///
/// # Examples
///
/// ```
/// use geo_import_sdk::validation::input::validate_import_name;
///
/// assert!(validate_import_name("Street trees 2014").is_ok());
/// assert!(validate_import_name("   ").is_err());
/// ```
pub fn validate_import_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("import name"));
    }

    let length = trimmed.chars().count();
    if length > MAX_IMPORT_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "import name",
            max: MAX_IMPORT_NAME_LENGTH,
            actual: length,
        });
    }

    if let Some(c) = trimmed.chars().find(|c| c.is_control()) {
        return Err(ValidationError::InvalidCharacters {
            field: "import name",
            reason: format!("control character U+{:04X}", c as u32),
        });
    }

    Ok(())
}

/// Validate a description string.
///
/// # Rules
///
/// - May be empty
/// - Must not exceed 10000 characters
pub fn validate_description(desc: &str) -> ValidationResult<()> {
    if desc.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_LENGTH,
            actual: desc.len(),
        });
    }

    Ok(())
}

/// Validate a category field key.
///
/// # Rules
///
/// - Must not be empty
/// - Must not exceed 128 characters
/// - Must start with a lowercase letter
/// - May contain lowercase letters, digits, underscores, and hyphens
/// - Cannot be a key the platform reserves for contribution metadata
///
/// # Examples
///
/// ```
/// use geo_import_sdk::validation::input::validate_field_key;
///
/// assert!(validate_field_key("tree_height").is_ok());
/// assert!(validate_field_key("Tree Height").is_err());
/// assert!(validate_field_key("geometry").is_err());
/// ```
pub fn validate_field_key(key: &str) -> ValidationResult<()> {
    if key.is_empty() {
        return Err(ValidationError::Empty("field key"));
    }

    if key.len() > MAX_FIELD_KEY_LENGTH {
        return Err(ValidationError::TooLong {
            field: "field key",
            max: MAX_FIELD_KEY_LENGTH,
            actual: key.len(),
        });
    }

    let starts_with_letter = key.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    if !starts_with_letter {
        return Err(ValidationError::InvalidFormat(
            "field key",
            "must start with a lowercase letter".to_string(),
        ));
    }

    for c in key.chars() {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '_' && c != '-' {
            return Err(ValidationError::InvalidCharacters {
                field: "field key",
                reason: format!("invalid character: '{}'", c),
            });
        }
    }

    if is_reserved_field_key(key) {
        return Err(ValidationError::ReservedWord {
            field: "field key",
            word: key.to_string(),
        });
    }

    Ok(())
}

/// Normalize an attribute name into a field key.
///
/// Lowercases, replaces runs of anything other than ASCII letters and digits
/// with a single underscore, and trims underscores from both ends. Names with
/// nothing usable become `field`; names starting with a digit get a `field_`
/// prefix. Reserved keys get a `_value` suffix.
///
/// # Examples
///
/// ```
/// use geo_import_sdk::validation::input::normalize_field_key;
///
/// assert_eq!(normalize_field_key("Tree Height (m)"), "tree_height_m");
/// assert_eq!(normalize_field_key("2014 count"), "field_2014_count");
/// assert_eq!(normalize_field_key("???"), "field");
/// ```
pub fn normalize_field_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if key.is_empty() {
        return "field".to_string();
    }
    if key.starts_with(|c: char| c.is_ascii_digit()) {
        key.insert_str(0, "field_");
    }
    if key.len() > MAX_FIELD_KEY_LENGTH {
        key.truncate(MAX_FIELD_KEY_LENGTH);
        key = key.trim_end_matches('_').to_string();
    }
    if is_reserved_field_key(&key) {
        key.push_str("_value");
    }

    key
}

/// Validate the size of an uploaded file against a configured limit.
pub fn validate_file_size(file_size: u64, max: u64) -> ValidationResult<()> {
    if file_size == 0 {
        return Err(ValidationError::Empty("uploaded file"));
    }
    if file_size > max {
        return Err(ValidationError::TooLong {
            field: "uploaded file size",
            max: max as usize,
            actual: file_size as usize,
        });
    }
    Ok(())
}

/// Sanitize a string for safe use in descriptions.
///
/// Removes control characters except newlines and tabs.
pub fn sanitize_description(desc: &str) -> String {
    desc.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
        .collect()
}

/// Sanitize an uploaded file name for use in a storage path.
///
/// # Rules
///
/// - Drops any directory components
/// - Preserves alphanumeric characters, hyphens, underscores, and single dots
/// - Replaces other characters with underscores
/// - Truncates to MAX_FILE_NAME_LENGTH if needed
///
/// # Examples
///
/// ```
/// use geo_import_sdk::validation::input::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("trees.csv"), "trees.csv");
/// assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_file_name("my trees..csv"), "my_trees.csv");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut sanitized = String::with_capacity(base.len());
    let mut last_was_dot = false;

    for ch in base.chars() {
        match ch {
            ch if ch.is_alphanumeric() || ch == '-' || ch == '_' => {
                sanitized.push(ch);
                last_was_dot = false;
            }
            '.' if !last_was_dot => {
                sanitized.push('.');
                last_was_dot = true;
            }
            '.' => {}
            _ => {
                sanitized.push('_');
                last_was_dot = false;
            }
        }

        if sanitized.len() >= MAX_FILE_NAME_LENGTH {
            break;
        }
    }

    let sanitized = sanitized.trim_matches(['.', '_']).to_string();
    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

/// Keys the platform stores alongside contribution values.
fn is_reserved_field_key(key: &str) -> bool {
    const RESERVED_KEYS: &[&str] = &[
        "id",
        "geometry",
        "location",
        "category",
        "status",
        "creator",
        "created_at",
        "updated_at",
        "version",
        "display_field",
    ];

    RESERVED_KEYS.contains(&key)
}
