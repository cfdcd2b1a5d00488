use super::Checker;
use crate::cancel::CancelToken;
use crate::parse::ParsedEmail;
use crate::result::{CheckLevel, CheckResult};

/// RFC 5321/5322 syntax validation with RFC 6531 (SMTPUTF8) local parts and
/// IDNA2008 domains.
///
/// Always part of the pipeline: a well-formed address is a prerequisite for
/// every other level.
pub struct SyntaxChecker;

/// RFC 5321 atext specials permitted in an unquoted local part, plus dot.
const ASCII_SPECIAL: &str = "!#$%&'*+/=?^_`{|}~-.";

impl Checker for SyntaxChecker {
    fn check(&self, _cancel: &CancelToken, email: &ParsedEmail) -> CheckResult {
        let level = CheckLevel::Syntax;

        if email.raw.is_empty() {
            return CheckResult::fail(level, "empty email address");
        }
        if !email.valid {
            return CheckResult::fail(level, "invalid email syntax");
        }

        if email.raw.len() > 254 {
            return CheckResult::fail(level, "email address exceeds 254 characters");
        }
        if email.local.len() > 64 {
            return CheckResult::fail(level, "local part exceeds 64 characters");
        }

        // A quoted local part permits nearly any printable character, so the
        // character rules only apply to the unquoted form.
        if !has_quoted_local(&email.raw) {
            if let Err(details) = validate_local(&email.local) {
                return CheckResult::fail(level, details);
            }
        }

        // The Unicode form gives readable diagnostics; IDNA2008 validation
        // already happened during parsing.
        if let Err(details) = validate_domain(&email.domain_unicode) {
            return CheckResult::fail(level, details);
        }

        CheckResult::pass(level, "syntax ok")
    }
}

fn has_quoted_local(raw: &str) -> bool {
    match raw.rfind('@') {
        Some(at) if at >= 1 => {
            let local = &raw[..at];
            local.starts_with('"') && local.ends_with('"')
        }
        _ => false,
    }
}

fn validate_local(local: &str) -> Result<(), String> {
    if local.is_empty() {
        return Err("local part is empty".to_string());
    }

    if local.starts_with('"') && local.ends_with('"') {
        return Ok(());
    }

    for ch in local.chars() {
        if !ch.is_ascii() {
            // RFC 6531 (SMTPUTF8) allows non-ASCII codepoints, except
            // control characters.
            if ch.is_control() {
                return Err("local part contains control character".to_string());
            }
            continue;
        }
        if ch.is_ascii_alphanumeric() || ASCII_SPECIAL.contains(ch) {
            continue;
        }
        return Err(format!("local part contains invalid character: {ch}"));
    }

    if local.starts_with('.') || local.ends_with('.') {
        return Err("local part cannot start or end with a dot".to_string());
    }
    if local.contains("..") {
        return Err("local part cannot contain consecutive dots".to_string());
    }

    Ok(())
}

fn validate_domain(domain: &str) -> Result<(), String> {
    if domain.is_empty() {
        return Err("domain is empty".to_string());
    }

    // IP literal, e.g. [127.0.0.1]: accepted without deeper validation.
    if domain.starts_with('[') && domain.ends_with(']') {
        return Ok(());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("domain must have at least two labels".to_string());
    }

    for label in &labels {
        if label.is_empty() {
            return Err("domain contains empty label (consecutive dots)".to_string());
        }
        if label.chars().count() > 63 {
            return Err("domain label exceeds 63 characters".to_string());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("domain label cannot start or end with a hyphen".to_string());
        }
        // Decimal digits only: numeral-like symbols such as circled or
        // Roman numerals are not valid label characters.
        if let Some(ch) = label
            .chars()
            .find(|ch| !ch.is_alphabetic() && !ch.is_ascii_digit() && *ch != '-')
        {
            return Err(format!("domain label contains invalid character: {ch}"));
        }
    }

    let tld = labels[labels.len() - 1];
    if tld.chars().all(|ch| ch.is_ascii_digit()) {
        return Err("TLD cannot be all digits".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(raw: &str) -> CheckResult {
        SyntaxChecker.check(&CancelToken::new(), &ParsedEmail::new(raw))
    }

    #[test]
    fn accepts_and_rejects() {
        let too_long = format!("{}@example.com", "a".repeat(255));
        let cases: Vec<(&str, bool)> = vec![
            ("user@example.com", true),
            ("user+tag@example.com", true),
            ("first.last@example.com", true),
            ("\"user name\"@example.com", true),
            ("user@mail.example.co.uk", true),
            ("user@[127.0.0.1]", true),
            ("", false),
            ("userexample.com", false),
            ("user@", false),
            ("@example.com", false),
            ("user..name@example.com", false),
            (".user@example.com", false),
            ("user.@example.com", false),
            ("user@exam..ple.com", false),
            (too_long.as_str(), false),
            ("user@example.123", false),
            ("user@①.com", false),
            ("user@-example.com", false),
            ("user@example-.com", false),
            ("user@localhost", false),
            // Internationalised domains
            ("user@münchen.de", true),
            ("user@例え.jp", true),
            ("user@почта.рф", true),
            ("user@xn--mnchen-3ya.de", true),
            // Internationalised local parts (RFC 6531)
            ("用户@example.com", true),
            ("معلومات@example.com", true),
            ("用户@münchen.de", true),
        ];
        for (raw, want) in cases {
            let result = check(raw);
            assert_eq!(
                result.passed, want,
                "email {raw:?}, details: {}",
                result.details
            );
        }
    }

    #[test]
    fn reports_specific_diagnostics() {
        assert_eq!(check("").details, "empty email address");
        assert_eq!(check("invalid").details, "invalid email syntax");
        assert_eq!(
            check("user..name@example.com").details,
            "local part cannot contain consecutive dots"
        );
        assert_eq!(check("user@example.123").details, "TLD cannot be all digits");
        assert_eq!(check("user@example.com").details, "syntax ok");
    }

    #[test]
    fn local_part_length_cap() {
        let local = "a".repeat(65);
        let result = check(&format!("{local}@example.com"));
        assert!(!result.passed);
        assert_eq!(result.details, "local part exceeds 64 characters");
    }

    #[test]
    fn quoted_local_skips_character_rules() {
        let result = check("\"odd chars ()\"@example.com");
        assert!(result.passed, "details: {}", result.details);
    }
}
