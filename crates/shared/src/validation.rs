//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a stored document reference.
const MAX_DOCUMENT_URL_LENGTH: usize = 2048;

/// Largest single amount accepted from a client (1,000,000.00 in major units).
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000;

/// Validates an ISO 4217 currency code in lowercase form (e.g. `eur`).
pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency_format");
        err.message = Some("Currency must be a lowercase 3-letter ISO code".into());
        Err(err)
    }
}

/// Validates that a discount percentage is within valid range (0 to 100).
pub fn validate_percentage(value: i32) -> Result<(), ValidationError> {
    if (0..=100).contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("percentage_range");
        err.message = Some("Percentage must be between 0 and 100".into());
        Err(err)
    }
}

/// Validates that an amount in cents is between 0 and [`MAX_AMOUNT_CENTS`].
pub fn validate_amount_cents(amount: i64) -> Result<(), ValidationError> {
    if (0..=MAX_AMOUNT_CENTS).contains(&amount) {
        Ok(())
    } else {
        let mut err = ValidationError::new("amount_range");
        err.message = Some("Amount must be between 0 and 100000000 cents".into());
        Err(err)
    }
}

/// Validates an uploaded document reference.
///
/// References are storage URLs produced by the upload collaborator; only
/// `https://` and `s3://` locations are accepted.
pub fn validate_document_url(url: &str) -> Result<(), ValidationError> {
    if url.len() > MAX_DOCUMENT_URL_LENGTH {
        let mut err = ValidationError::new("document_url_length");
        err.message = Some("Document URL must be at most 2048 characters".into());
        return Err(err);
    }
    if url.starts_with("https://") || url.starts_with("s3://") {
        Ok(())
    } else {
        let mut err = ValidationError::new("document_url_scheme");
        err.message = Some("Document URL must use https:// or s3://".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("eur").is_ok());
        assert!(validate_currency("usd").is_ok());
        assert!(validate_currency("EUR").is_err());
        assert!(validate_currency("eu").is_err());
        assert!(validate_currency("euro").is_err());
        assert!(validate_currency("e1r").is_err());
    }

    #[test]
    fn test_validate_currency_error_message() {
        let err = validate_currency("EUR").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Currency must be a lowercase 3-letter ISO code"
        );
    }

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage(0).is_ok());
        assert!(validate_percentage(50).is_ok());
        assert!(validate_percentage(100).is_ok());
        assert!(validate_percentage(-1).is_err());
        assert!(validate_percentage(101).is_err());
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents(0).is_ok());
        assert!(validate_amount_cents(1500).is_ok());
        assert!(validate_amount_cents(-1).is_err());
        assert!(validate_amount_cents(MAX_AMOUNT_CENTS).is_ok());
        assert!(validate_amount_cents(MAX_AMOUNT_CENTS + 1).is_err());
        assert!(validate_amount_cents(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_document_url() {
        assert!(validate_document_url("https://files.example.com/doc.pdf").is_ok());
        assert!(validate_document_url("s3://bucket/medical/abc.pdf").is_ok());
        assert!(validate_document_url("http://insecure.example.com/doc.pdf").is_err());
        assert!(validate_document_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_validate_document_url_too_long() {
        let url = format!("https://example.com/{}", "a".repeat(2100));
        let err = validate_document_url(&url).unwrap_err();
        assert_eq!(err.code, "document_url_length");
    }
}
