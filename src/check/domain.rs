use phf::phf_set;
use textdistance::str::levenshtein;
use tracing::debug;

use super::{disposable, Checker};
use crate::cancel::CancelToken;
use crate::options::DomainOptions;
use crate::parse::ParsedEmail;
use crate::result::{CheckLevel, CheckResult};

/// Well-known mailbox providers used for typo suggestions. A domain within
/// the configured edit distance of one of these gets a suggestion attached.
static KNOWN_PROVIDERS: phf::Set<&'static str> = phf_set! {
    "gmail.com", "googlemail.com",
    "yahoo.com", "yahoo.co.uk", "yahoo.fr", "yahoo.de",
    "outlook.com", "hotmail.com", "hotmail.co.uk", "live.com",
    "icloud.com", "me.com", "mac.com",
    "protonmail.com", "proton.me",
    "aol.com",
    "zoho.com",
    "yandex.com", "yandex.ru",
    "mail.com",
    "gmx.com", "gmx.net", "gmx.de",
    "fastmail.com",
    "tutanota.com",
    // Hungarian providers
    "freemail.hu", "citromail.hu", "t-online.hu", "invitel.hu",
};

/// Domain reputation checks: disposable-provider detection and typo
/// suggestions. Operates purely on the parsed domain, no network involved.
pub struct DomainChecker {
    options: DomainOptions,
}

impl DomainChecker {
    pub fn new(options: DomainOptions) -> Self {
        Self { options }
    }

    /// The closest known provider within the threshold, or `None` for an
    /// exact match or no near miss.
    fn typo_suggestion(&self, domain: &str) -> Option<&'static str> {
        let mut best: Option<(usize, &'static str)> = None;
        for &provider in KNOWN_PROVIDERS.iter() {
            if domain == provider {
                return None;
            }
            let distance = levenshtein(domain, provider);
            if distance <= self.options.typo_threshold
                && best.map_or(true, |(best_distance, _)| distance < best_distance)
            {
                best = Some((distance, provider));
            }
        }
        best.map(|(_, provider)| provider)
    }
}

impl Checker for DomainChecker {
    fn check(&self, _cancel: &CancelToken, email: &ParsedEmail) -> CheckResult {
        let level = CheckLevel::Domain;

        if !email.valid {
            return CheckResult::fail(level, "skipped: invalid email");
        }

        // The embedded list is ASCII, so the lookup uses the Punycode form.
        if self.options.check_disposable && disposable::is_disposable(&email.domain_ascii) {
            return CheckResult::fail(level, "disposable email domain detected");
        }

        // Typo matching works better on the Unicode form. A suspected typo
        // never fails the address.
        if self.options.check_typos {
            if let Some(suggestion) = self.typo_suggestion(&email.domain_unicode) {
                debug!(domain = %email.domain_unicode, suggestion, "possible domain typo");
                return CheckResult::pass(level, "possible typo in domain")
                    .with_suggestion(suggestion);
            }
        }

        CheckResult::pass(level, "domain ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_with(options: DomainOptions, raw: &str) -> CheckResult {
        DomainChecker::new(options).check(&CancelToken::new(), &ParsedEmail::new(raw))
    }

    fn check(raw: &str) -> CheckResult {
        check_with(DomainOptions::default(), raw)
    }

    #[test]
    fn disposable_domain_fails() {
        let result = check("user@mailinator.com");
        assert!(!result.passed);
        assert_eq!(result.details, "disposable email domain detected");
    }

    #[test]
    fn typo_attaches_suggestion_without_failing() {
        let result = check("user@gmial.com");
        assert!(result.passed);
        assert_eq!(result.details, "possible typo in domain");
        assert_eq!(result.suggestion.as_deref(), Some("gmail.com"));
    }

    #[test]
    fn exact_provider_match_yields_no_suggestion() {
        let result = check("user@gmail.com");
        assert!(result.passed);
        assert_eq!(result.details, "domain ok");
        assert!(result.suggestion.is_none());
    }

    #[test]
    fn unrelated_domain_passes_clean() {
        let result = check("user@somecompany.example");
        assert!(result.passed);
        assert_eq!(result.details, "domain ok");
        assert!(result.suggestion.is_none());
    }

    #[test]
    fn disabled_checks_are_skipped() {
        let options = DomainOptions {
            check_disposable: false,
            check_typos: false,
            ..DomainOptions::default()
        };
        let result = check_with(options, "user@mailinator.com");
        assert!(result.passed);
        assert_eq!(result.details, "domain ok");
    }

    #[test]
    fn threshold_bounds_suggestions() {
        let options = DomainOptions {
            typo_threshold: 1,
            ..DomainOptions::default()
        };
        // Two edits away from gmail.com, so a threshold of 1 stays silent.
        let result = check_with(options, "user@gmial.com");
        assert!(result.passed);
        assert!(result.suggestion.is_none());
    }

    #[test]
    fn invalid_email_is_skipped() {
        let result = check("invalid");
        assert!(!result.passed);
        assert_eq!(result.details, "skipped: invalid email");
    }
}
