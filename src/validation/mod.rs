//! Validation functionality
//!
//! Provides input validation and sanitization for import names, descriptions,
//! category field keys and uploaded files.

pub mod input;

pub use input::{
    ValidationError, ValidationResult, normalize_field_key, sanitize_description,
    sanitize_file_name, validate_description, validate_field_key, validate_file_size,
    validate_import_name,
};
