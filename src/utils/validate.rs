//! Input validation for record identifiers and query text.
//!
//! Identifiers end up in request paths, so anything that could change the
//! path (separators, traversal, control characters) is rejected before a
//! request is built.

use thiserror::Error;

use crate::error::ArchiveError;
use crate::models::Category;

/// Longest identifier accepted
pub const MAX_ID_LENGTH: usize = 64;

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),

    #[error("Path traversal detected: {0}")]
    PathTraversal(String),

    #[error("Invalid query text: {0}")]
    InvalidQueryText(String),
}

impl From<ValidationError> for ArchiveError {
    fn from(err: ValidationError) -> Self {
        ArchiveError::InvalidArgument(err.to_string())
    }
}

/// Validate a record identifier for `category`.
///
/// Identifiers are 1-64 characters of `[A-Za-z0-9._-]`. Newspaper articles
/// and lists are numeric. Returns the trimmed identifier.
pub fn validate_record_id(category: Category, id: &str) -> Result<String, ValidationError> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::InvalidRecordId("empty ID".to_string()));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::InvalidRecordId(format!(
            "longer than {} characters",
            MAX_ID_LENGTH
        )));
    }

    if id.contains("..") {
        return Err(ValidationError::PathTraversal(id.to_string()));
    }

    if let Some(ch) = id
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')))
    {
        return Err(ValidationError::InvalidRecordId(format!(
            "contains disallowed character: {:?}",
            ch
        )));
    }

    let numeric_only = matches!(category, Category::Newspaper | Category::List);
    if numeric_only && !id.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::InvalidRecordId(format!(
            "{} identifiers are numeric, got {}",
            category.code(),
            id
        )));
    }

    Ok(id.to_string())
}

/// Validate free query text: no null bytes or control characters other
/// than whitespace.
pub fn validate_query_text(text: &str) -> Result<(), ValidationError> {
    if text.contains('\0') {
        return Err(ValidationError::InvalidQueryText(
            "contains null byte".to_string(),
        ));
    }

    for ch in text.chars() {
        if ch.is_control() && ch != '\t' && ch != '\n' && ch != '\r' {
            return Err(ValidationError::InvalidQueryText(
                "contains control characters".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_record_id_valid() {
        assert_eq!(
            validate_record_id(Category::Newspaper, "18342701").unwrap(),
            "18342701"
        );
        assert_eq!(
            validate_record_id(Category::Book, " 12345678 ").unwrap(),
            "12345678"
        );
        assert!(validate_record_id(Category::People, "1478423").is_ok());
        assert!(validate_record_id(Category::Image, "abc-12_3.x").is_ok());
    }

    #[test]
    fn test_validate_record_id_empty() {
        assert!(validate_record_id(Category::Book, "").is_err());
        assert!(validate_record_id(Category::Book, "   ").is_err());
    }

    #[test]
    fn test_validate_record_id_path_traversal() {
        assert_eq!(
            validate_record_id(Category::Book, "..").unwrap_err(),
            ValidationError::PathTraversal("..".to_string())
        );
        assert!(validate_record_id(Category::Book, "../etc/passwd").is_err());
        assert!(validate_record_id(Category::Book, "12/34").is_err());
        assert!(validate_record_id(Category::Book, "12?include=x").is_err());
    }

    #[test]
    fn test_validate_record_id_numeric_categories() {
        assert!(validate_record_id(Category::Newspaper, "abc").is_err());
        assert!(validate_record_id(Category::List, "12a").is_err());
        assert!(validate_record_id(Category::Music, "12a").is_ok());
    }

    #[test]
    fn test_validate_record_id_length() {
        let long = "1".repeat(MAX_ID_LENGTH + 1);
        assert!(validate_record_id(Category::Book, &long).is_err());
        assert!(validate_record_id(Category::Book, &long[1..]).is_ok());
    }

    #[test]
    fn test_validate_query_text() {
        assert!(validate_query_text("wreck of the \"Dunbar\"").is_ok());
        assert!(validate_query_text("line\nbreak\ttab").is_ok());
        assert!(validate_query_text("nul\0byte").is_err());
        assert!(validate_query_text("bell\u{7}").is_err());
    }

    #[test]
    fn test_converts_to_invalid_argument() {
        let err: ArchiveError = ValidationError::InvalidRecordId("x".to_string()).into();
        assert!(matches!(err, ArchiveError::InvalidArgument(_)));
    }
}
