use thiserror::Error;

use crate::models::ApiError;

/// S3 caps object keys at 1024 bytes of UTF-8
pub const MAX_OBJECT_NAME_BYTES: usize = 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Object name is empty")]
    Empty,
    #[error("Object name too long: maximum {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },
    #[error("Object name contains control characters")]
    ControlCharacters,
    #[error("Object name contains a backslash")]
    Backslash,
    #[error("Object name must not start with '/'")]
    LeadingSlash,
    #[error("Object name contains an empty path segment")]
    EmptySegment,
    #[error("Object name contains a relative path segment '{0}'")]
    RelativeSegment(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check that `name` is a safe storage key.
///
/// `/` is allowed as a separator, but every segment must be a real name.
pub fn validate_object_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if name.len() > MAX_OBJECT_NAME_BYTES {
        return Err(ValidationError::TooLong {
            max: MAX_OBJECT_NAME_BYTES,
            actual: name.len(),
        });
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters);
    }
    if name.contains('\\') {
        return Err(ValidationError::Backslash);
    }
    if name.starts_with('/') {
        return Err(ValidationError::LeadingSlash);
    }

    for segment in name.split('/') {
        match segment {
            "" => return Err(ValidationError::EmptySegment),
            "." | ".." => return Err(ValidationError::RelativeSegment(segment.to_string())),
            _ => {}
        }
    }

    Ok(())
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}
