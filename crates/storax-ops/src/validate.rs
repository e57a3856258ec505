//! Filename validation shared by create and rename.

use storax_core::{OpError, OpResult};

/// Validate a node name before any journal write or backend call.
pub fn validate_filename(name: &str) -> OpResult<()> {
    let invalid = |message: String| OpError::InvalidName { message };

    if name.is_empty() {
        return Err(invalid("Name cannot be empty".into()));
    }
    if name.len() > 255 {
        return Err(invalid("Name is too long (max 255 bytes)".into()));
    }
    for c in ['/', '\0'] {
        if name.contains(c) {
            return Err(invalid(format!("Name cannot contain '{}'", c.escape_default())));
        }
    }
    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(invalid("Name cannot start or end with spaces".into()));
    }
    if name.ends_with('.') {
        return Err(invalid("Name cannot end with a dot".into()));
    }
    if name == "." || name == ".." {
        return Err(invalid("'.' and '..' are reserved names".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_filename("test.txt").is_ok());
        assert!(validate_filename("my-file").is_ok());
        assert!(validate_filename(".hidden").is_ok());
        assert!(validate_filename("file with spaces").is_ok());
        assert!(validate_filename("a.txt (1)").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_filename("").is_err());
        assert!(validate_filename("a/b").is_err());
        assert!(validate_filename("nul\0byte").is_err());
        assert!(validate_filename(" leading").is_err());
        assert!(validate_filename("trailing ").is_err());
        assert!(validate_filename("dot.").is_err());
        assert!(validate_filename(".").is_err());
        assert!(validate_filename("..").is_err());
    }
}
