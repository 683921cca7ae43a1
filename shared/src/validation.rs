use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

use crate::constants::{
    CODE_TOO_LONG_ERROR, EMPTY_CODE_ERROR, MALFORMED_CODE_ERROR, MAX_CUSTOM_CODE_LENGTH,
};
use crate::error::{LotteryError, LotteryResult};

static CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s\p{Cc}]+$").expect("valid code pattern"));

/// Trims and uppercases user input into the canonical code form.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// The only format rule for a code a player enters. Codes already on
/// record are redeemable whatever they look like.
pub fn require_code(code: &str) -> LotteryResult<()> {
    if code.is_empty() {
        return Err(LotteryError::InvalidInput(EMPTY_CODE_ERROR.to_string()));
    }
    Ok(())
}

/// Checks an already-normalized code an admin wants to issue.
pub fn check_code(code: &str) -> LotteryResult<()> {
    require_code(code)?;
    if code.chars().count() > MAX_CUSTOM_CODE_LENGTH {
        return Err(LotteryError::InvalidInput(CODE_TOO_LONG_ERROR.to_string()));
    }
    if !CODE_PATTERN.is_match(code) {
        return Err(LotteryError::InvalidInput(MALFORMED_CODE_ERROR.to_string()));
    }
    Ok(())
}

pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    check_code(&normalize_code(code)).map_err(|_| ValidationError::new("invalid_code"))
}

pub fn validate_optional_code(code: &str) -> Result<(), ValidationError> {
    // An empty custom code means "generate one".
    if code.trim().is_empty() {
        return Ok(());
    }
    validate_code(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_code("  win0001 \n"), "WIN0001");
    }

    #[test]
    fn test_check_code() {
        assert!(check_code("ABC123").is_ok());
        assert!(check_code("SPRING-2026").is_ok());
        assert!(matches!(check_code(""), Err(LotteryError::InvalidInput(_))));
        assert!(check_code("AB C").is_err());
        assert!(check_code("AB\u{7}C").is_err());
        assert!(check_code(&"A".repeat(65)).is_err());
    }

    #[test]
    fn test_require_code_only_rejects_empty() {
        assert!(require_code("SUMMER SALE").is_ok());
        assert!(require_code(&"X".repeat(70)).is_ok());
        assert!(matches!(require_code(""), Err(LotteryError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_optional_code() {
        assert!(validate_optional_code("   ").is_ok());
        assert!(validate_optional_code("promo").is_ok());
        assert!(validate_optional_code("two words").is_err());
    }
}
