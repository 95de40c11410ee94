//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_NICKNAME_CHARS: usize = 24;

/// Validates that a PIN is made of 4 to 12 ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_pin("042917") // Ok
/// validate_pin("04 917") // Err - not a digit
/// validate_pin("123")    // Err - too short
/// ```
pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if !(4..=12).contains(&pin.len()) {
        let mut err = ValidationError::new("pin_length");
        err.message = Some(format!("PIN must be 4 to 12 digits long (got {})", pin.len()).into());
        return Err(err);
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("pin_format");
        err.message = Some("PIN must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a nickname is non-blank, short and free of control characters.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("nickname_blank");
        err.message = Some("Nickname must not be blank".into());
        return Err(err);
    }

    let chars = trimmed.chars().count();
    if chars > MAX_NICKNAME_CHARS {
        let mut err = ValidationError::new("nickname_length");
        err.message = Some(
            format!("Nickname must be at most {MAX_NICKNAME_CHARS} characters (got {chars})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("nickname_format");
        err.message = Some("Nickname must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pin_valid() {
        assert!(validate_pin("042917").is_ok());
        assert!(validate_pin("0000").is_ok());
        assert!(validate_pin("123456789012").is_ok());
    }

    #[test]
    fn test_validate_pin_invalid() {
        assert!(validate_pin("123").is_err()); // too short
        assert!(validate_pin("1234567890123").is_err()); // too long
        assert!(validate_pin("12a456").is_err());
        assert!(validate_pin("12 456").is_err());
    }

    #[test]
    fn test_validate_nickname() {
        assert!(validate_nickname("Ada").is_ok());
        assert!(validate_nickname("  Grace  ").is_ok());
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname(&"x".repeat(25)).is_err());
        assert!(validate_nickname("bad\u{7}name").is_err());
    }
}
