//! Boundary checks applied by transports before calling the envelope.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{EnvelopeError, EnvelopeResult};

/// Longest filename accepted for sealing, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Reject empty passwords and anything shorter than `min_len` characters.
pub fn check_password(password: &SecretString, min_len: usize) -> EnvelopeResult<()> {
    let chars = password.expose_secret().chars().count();
    if chars == 0 {
        return Err(EnvelopeError::EmptyPassword);
    }
    if chars < min_len {
        return Err(EnvelopeError::WeakPassword { min: min_len });
    }
    Ok(())
}

/// Reduce a client-supplied name to its final path component.
///
/// Used both before sealing (browsers may send full paths) and before
/// writing a decrypted file to disk, so a sealed name like `../../x`
/// cannot escape the output directory.
pub fn sanitize_filename(name: &str) -> EnvelopeResult<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(EnvelopeError::InvalidFilename("empty filename".into()));
    }
    if base.chars().any(char::is_control) {
        return Err(EnvelopeError::InvalidFilename("control characters".into()));
    }
    if base.len() > MAX_FILENAME_BYTES {
        return Err(EnvelopeError::InvalidFilename(format!(
            "{} bytes (maximum {MAX_FILENAME_BYTES})",
            base.len()
        )));
    }
    Ok(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_password_rejected() {
        let result = check_password(&SecretString::from(""), 1);
        assert_eq!(result, Err(EnvelopeError::EmptyPassword));
    }

    #[test]
    fn test_min_length_in_chars() {
        assert_eq!(
            check_password(&SecretString::from("short"), 8),
            Err(EnvelopeError::WeakPassword { min: 8 })
        );
        assert!(check_password(&SecretString::from("ääää"), 4).is_ok());
        assert!(check_password(&SecretString::from("x"), 0).is_ok());
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("C:\\Users\\me\\report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("résumé 2024.txt").unwrap(), "résumé 2024.txt");
    }

    #[test]
    fn test_sanitize_rejects_degenerate_names() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("a\nb").is_err());
    }

    #[test]
    fn test_sanitize_length_limit() {
        assert!(sanitize_filename(&"a".repeat(MAX_FILENAME_BYTES)).is_ok());
        assert!(matches!(
            sanitize_filename(&"a".repeat(MAX_FILENAME_BYTES + 1)),
            Err(EnvelopeError::InvalidFilename(_))
        ));
    }
}
