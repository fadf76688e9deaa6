const CODE_PREFIX_LEN: usize = 6;

/// Masks the local part of an email address, keeping its first character and
/// the domain: `jordan@crew.example` becomes `j***@crew.example`.
#[must_use]
pub fn redact_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}***@{domain}")
        }
        _ => "***".to_owned(),
    }
}

/// Truncates an opaque credential to a short prefix suitable for correlating
/// log lines without making the credential usable.
#[must_use]
pub fn redact_code(code: &str) -> String {
    let prefix: String = code.chars().take(CODE_PREFIX_LEN).collect();
    format!("{prefix}…")
}

#[cfg(test)]
mod tests {
    use super::{redact_code, redact_email};

    #[test]
    fn email_keeps_only_first_character_and_domain() {
        assert_eq!(redact_email("jordan@crew.example"), "j***@crew.example");
    }

    #[test]
    fn malformed_email_is_fully_masked() {
        assert_eq!(redact_email("no-at-sign"), "***");
        assert_eq!(redact_email("@crew.example"), "***");
    }

    #[test]
    fn code_is_truncated() {
        assert_eq!(redact_code("0123456789abcdef"), "012345…");
        assert_eq!(redact_code("ab"), "ab…");
    }
}
