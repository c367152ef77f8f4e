//! Helpers for keeping secrets and personal data out of log output.

/// Mask a secret, keeping `visible` characters at each end.
///
/// Values too short to keep both ends are fully masked.
pub fn mask_secret(value: &str, visible: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible * 2 {
        return "*".repeat(chars.len());
    }
    let start: String = chars[..visible].iter().collect();
    let end: String = chars[chars.len() - visible..].iter().collect();
    format!("{}***{}", start, end)
}

/// Redact the local part of an email address: `jane@example.com` -> `j***@example.com`.
pub fn redact_email(address: &str) -> String {
    match address.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        Some((_, domain)) => format!("***@{}", domain),
        None if address.is_empty() => String::new(),
        None => "[EMAIL_REDACTED]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_secrets_keeping_both_ends() {
        assert_eq!(mask_secret("sk_test_1234567890abcdef", 4), "sk_t***cdef");
        assert_eq!(mask_secret("my-secret-key", 2), "my***ey");
    }

    #[test]
    fn short_secrets_are_fully_masked() {
        assert_eq!(mask_secret("abcdefgh", 4), "********");
        assert_eq!(mask_secret("", 4), "");
    }

    #[test]
    fn redacts_email_local_part() {
        assert_eq!(redact_email("jane@example.com"), "j***@example.com");
        assert_eq!(redact_email("@example.com"), "***@example.com");
        assert_eq!(redact_email(""), "");
        assert_eq!(redact_email("not-an-email"), "[EMAIL_REDACTED]");
    }
}
