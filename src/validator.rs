//! The fluent validation pipeline.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::check::{Checker, DnsChecker, DomainChecker, SmtpChecker, SyntaxChecker};
use crate::dnscache::Cache;
use crate::error::ValidatorError;
use crate::options::{BulkOptions, DnsOptions, DomainOptions, SmtpOptions};
use crate::parse::ParsedEmail;
use crate::result::ValidationResult;
use crate::smtppool::{Pool, PoolConfig};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const MAX_JOB_BUFFER: usize = 1000;

/// The main entry point: an ordered pipeline of validation levels sharing
/// one DNS cache and one SMTP connection pool.
///
/// A validator is safe to share across threads. When the SMTP level is
/// configured, call [`close`](Self::close) once done so pooled connections
/// say goodbye properly; dropping the validator closes the pool as well.
///
/// ```
/// use mailvet::{CancelToken, Validator};
///
/// let validator = Validator::new().with_domain();
/// let result = validator
///     .validate(&CancelToken::new(), "user@gmial.com")
///     .unwrap();
/// let domain = result.check_for(mailvet::CheckLevel::Domain).unwrap();
/// assert_eq!(domain.suggestion.as_deref(), Some("gmail.com"));
/// ```
pub struct Validator {
    checkers: Vec<Box<dyn Checker>>,
    config_err: Option<ValidatorError>,
    dns_cache: Option<Arc<Cache>>,
    smtp_pool: Option<Arc<Pool>>,
}

impl Validator {
    /// A validator that only performs syntax checking. Syntax always runs
    /// and cannot be disabled: a well-formed address is a prerequisite for
    /// every other level.
    pub fn new() -> Self {
        Self {
            checkers: vec![Box::new(SyntaxChecker)],
            config_err: None,
            dns_cache: None,
            smtp_pool: None,
        }
    }

    /// Adds MX existence validation with default options.
    pub fn with_dns(self) -> Self {
        self.with_dns_options(DnsOptions::default())
    }

    /// Adds MX existence validation. Lookup results are cached and shared
    /// with the SMTP level.
    pub fn with_dns_options(mut self, options: DnsOptions) -> Self {
        let cache = self.ensure_dns_cache(options.timeout);
        self.checkers.push(Box::new(DnsChecker::new(options, cache)));
        self
    }

    /// Adds domain reputation validation with default options.
    pub fn with_domain(self) -> Self {
        self.with_domain_options(DomainOptions::default())
    }

    /// Adds domain reputation validation (disposable detection and typo
    /// suggestions).
    pub fn with_domain_options(mut self, options: DomainOptions) -> Self {
        self.checkers.push(Box::new(DomainChecker::new(options)));
        self
    }

    /// Adds the SMTP `RCPT TO` probe. `helo_domain` and `mail_from` are
    /// required; other zeroed fields take their defaults.
    pub fn with_smtp(mut self, mut options: SmtpOptions) -> Self {
        if options.helo_domain.is_empty() || options.mail_from.is_empty() {
            self.config_err = Some(ValidatorError::InvalidSmtpOptions);
            return self;
        }

        let defaults = SmtpOptions::default();
        if options.connect_timeout.is_zero() {
            options.connect_timeout = defaults.connect_timeout;
        }
        if options.command_timeout.is_zero() {
            options.command_timeout = defaults.command_timeout;
        }
        if options.max_mx_hosts == 0 {
            options.max_mx_hosts = defaults.max_mx_hosts;
        }
        if options.port == 0 {
            options.port = defaults.port;
        }
        if options.max_conns_per_host == 0 {
            options.max_conns_per_host = defaults.max_conns_per_host;
        }

        // The SMTP checker shares the MX cache with the DNS level.
        let cache = self.ensure_dns_cache(5 * options.connect_timeout);

        let pool = Arc::new(Pool::new(PoolConfig {
            helo_domain: options.helo_domain.clone(),
            mail_from: options.mail_from.clone(),
            connect_timeout: options.connect_timeout,
            command_timeout: options.command_timeout,
            port: options.port,
            max_conns_per_host: options.max_conns_per_host,
            ..PoolConfig::default()
        }));
        self.smtp_pool = Some(Arc::clone(&pool));
        self.checkers
            .push(Box::new(SmtpChecker::new(options.max_mx_hosts, cache, pool)));
        self
    }

    /// Releases pooled SMTP connections. Safe to call repeatedly; a no-op
    /// when SMTP was never configured.
    pub fn close(&self) {
        if let Some(pool) = &self.smtp_pool {
            pool.close();
        }
    }

    fn ensure_dns_cache(&mut self, lookup_timeout: Duration) -> Arc<Cache> {
        Arc::clone(
            self.dns_cache
                .get_or_insert_with(|| Arc::new(Cache::new(lookup_timeout, DEFAULT_CACHE_TTL))),
        )
    }

    /// Runs the configured checks in registration order, stopping at the
    /// first failure.
    pub fn validate(
        &self,
        cancel: &CancelToken,
        email: &str,
    ) -> Result<ValidationResult, ValidatorError> {
        if let Some(err) = &self.config_err {
            return Err(err.clone());
        }

        let parsed = ParsedEmail::new(email);
        let mut result = ValidationResult {
            email: email.to_string(),
            valid: false,
            checks: Vec::new(),
        };

        for checker in &self.checkers {
            let check = checker.check(cancel, &parsed);
            let passed = check.passed;
            result.checks.push(check);
            if !passed {
                return Ok(result);
            }
        }

        result.valid = true;
        Ok(result)
    }

    /// Runs every configured check regardless of failures, so callers can
    /// see exactly which levels reject an address.
    pub fn validate_all(
        &self,
        cancel: &CancelToken,
        email: &str,
    ) -> Result<ValidationResult, ValidatorError> {
        if let Some(err) = &self.config_err {
            return Err(err.clone());
        }

        let parsed = ParsedEmail::new(email);
        let mut result = ValidationResult {
            email: email.to_string(),
            valid: true,
            checks: Vec::new(),
        };

        for checker in &self.checkers {
            let check = checker.check(cancel, &parsed);
            if !check.passed {
                result.valid = false;
            }
            result.checks.push(check);
        }

        Ok(result)
    }

    /// Validates many addresses concurrently.
    ///
    /// The output order matches the input order. Internally the jobs are
    /// sorted by domain first, so consecutive probes hit the same cache
    /// entries and the same pooled sessions. The first error encountered is
    /// returned; remaining jobs still run.
    pub fn validate_many(
        &self,
        cancel: &CancelToken,
        emails: &[String],
        options: BulkOptions,
    ) -> Result<Vec<ValidationResult>, ValidatorError> {
        if let Some(err) = &self.config_err {
            return Err(err.clone());
        }
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let workers = if options.workers == 0 {
            BulkOptions::default().workers
        } else {
            options.workers
        };

        // Sort jobs by the case-folded domain suffix; the index carries each
        // result back to its input slot.
        let mut jobs: Vec<(usize, &str, String)> = emails
            .iter()
            .enumerate()
            .map(|(idx, email)| {
                let domain = email
                    .rfind('@')
                    .map(|at| email[at + 1..].to_lowercase())
                    .unwrap_or_default();
                (idx, email.as_str(), domain)
            })
            .collect();
        jobs.sort_by(|a, b| a.2.cmp(&b.2));

        debug!(count = emails.len(), workers, "bulk validation started");

        let bound = emails.len().min(MAX_JOB_BUFFER);
        let (tx, rx) = mpsc::sync_channel::<(usize, &str)>(bound);
        let rx = Mutex::new(rx);
        let results: Mutex<Vec<Option<ValidationResult>>> =
            Mutex::new((0..emails.len()).map(|_| None).collect());
        let first_err: Mutex<Option<ValidatorError>> = Mutex::new(None);

        thread::scope(|scope| {
            scope.spawn(move || {
                for (idx, email, _) in jobs {
                    if tx.send((idx, email)).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..workers {
                scope.spawn(|| loop {
                    let job = {
                        let rx = rx.lock().expect("job channel lock poisoned");
                        rx.recv()
                    };
                    let Ok((idx, email)) = job else { break };
                    match self.validate(cancel, email) {
                        Ok(result) => {
                            results.lock().expect("results lock poisoned")[idx] = Some(result);
                        }
                        Err(err) => {
                            let mut first = first_err.lock().expect("error lock poisoned");
                            if first.is_none() {
                                *first = Some(ValidatorError::Bulk {
                                    email: email.to_string(),
                                    source: Box::new(err),
                                });
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = first_err.into_inner().expect("error lock poisoned") {
            return Err(err);
        }

        let results = results.into_inner().expect("results lock poisoned");
        Ok(results
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| ValidationResult {
                    email: emails[idx].clone(),
                    valid: false,
                    checks: Vec::new(),
                })
            })
            .collect())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Validator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{CheckLevel, CheckResult};

    /// Pipeline probe recording whether it ran and returning a fixed verdict.
    struct StaticChecker {
        level: CheckLevel,
        passed: bool,
    }

    impl Checker for StaticChecker {
        fn check(&self, _cancel: &CancelToken, _email: &ParsedEmail) -> CheckResult {
            if self.passed {
                CheckResult::pass(self.level, "ok")
            } else {
                CheckResult::fail(self.level, "forced failure")
            }
        }
    }

    impl Validator {
        fn with_checker(mut self, checker: impl Checker + 'static) -> Self {
            self.checkers.push(Box::new(checker));
            self
        }
    }

    #[test]
    fn syntax_only_accepts_a_plain_address() {
        let validator = Validator::new();
        let result = validator
            .validate(&CancelToken::new(), "user@example.com")
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.checks.len(), 1);
        assert_eq!(result.checks[0].level, CheckLevel::Syntax);
        assert_eq!(result.checks[0].details, "syntax ok");
    }

    #[test]
    fn syntax_only_rejects_garbage() {
        let validator = Validator::new();
        let result = validator.validate(&CancelToken::new(), "invalid").unwrap();
        assert!(!result.valid);
        assert_eq!(result.checks.len(), 1);
        assert_eq!(result.checks[0].level, CheckLevel::Syntax);
        assert_eq!(result.checks[0].details, "invalid email syntax");
    }

    #[test]
    fn missing_smtp_options_latch_a_config_error() {
        let validator = Validator::new().with_smtp(SmtpOptions::default());
        let err = validator
            .validate(&CancelToken::new(), "user@example.com")
            .unwrap_err();
        assert_eq!(err, ValidatorError::InvalidSmtpOptions);

        // Latched: every call reports it.
        let err = validator
            .validate_many(
                &CancelToken::new(),
                &["user@example.com".to_string()],
                BulkOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err, ValidatorError::InvalidSmtpOptions);
    }

    #[test]
    fn short_circuit_stops_after_the_first_failure() {
        let validator = Validator::new()
            .with_checker(StaticChecker {
                level: CheckLevel::Dns,
                passed: false,
            })
            .with_checker(StaticChecker {
                level: CheckLevel::Smtp,
                passed: true,
            });

        let result = validator
            .validate(&CancelToken::new(), "user@example.com")
            .unwrap();
        assert!(!result.valid);
        assert_eq!(result.checks.len(), 2);
        assert_eq!(result.checks.last().unwrap().level, CheckLevel::Dns);
    }

    #[test]
    fn validate_all_runs_every_level() {
        let validator = Validator::new()
            .with_checker(StaticChecker {
                level: CheckLevel::Dns,
                passed: false,
            })
            .with_checker(StaticChecker {
                level: CheckLevel::Smtp,
                passed: true,
            });

        let result = validator
            .validate_all(&CancelToken::new(), "user@example.com")
            .unwrap();
        assert!(!result.valid);
        assert_eq!(result.checks.len(), 3);
        assert!(result.check_for(CheckLevel::Smtp).unwrap().passed);
    }

    #[test]
    fn valid_iff_every_check_passed() {
        let validator = Validator::new().with_domain();
        for raw in ["user@example.com", "user@mailinator.com", "invalid"] {
            let result = validator.validate(&CancelToken::new(), raw).unwrap();
            assert_eq!(result.valid, result.checks.iter().all(|check| check.passed));
        }
    }

    #[test]
    fn bulk_results_preserve_input_order() {
        let validator = Validator::new();
        let emails: Vec<String> = ["a@example.com", "b@example.com", "invalid"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let results = validator
            .validate_many(&CancelToken::new(), &emails, BulkOptions::default())
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].valid);
        assert!(results[1].valid);
        assert!(!results[2].valid);
        for (input, result) in emails.iter().zip(&results) {
            assert_eq!(&result.email, input);
        }
    }

    #[test]
    fn bulk_handles_mixed_domains_with_few_workers() {
        let validator = Validator::new().with_domain();
        let emails: Vec<String> = (0..40)
            .map(|i| match i % 4 {
                0 => format!("user{i}@example.com"),
                1 => format!("user{i}@zzz.example"),
                2 => format!("user{i}@mailinator.com"),
                _ => "broken".to_string(),
            })
            .collect();

        let results = validator
            .validate_many(&CancelToken::new(), &emails, BulkOptions { workers: 3 })
            .unwrap();
        assert_eq!(results.len(), emails.len());
        for (i, result) in results.iter().enumerate() {
            match i % 4 {
                0 | 1 => assert!(result.valid, "slot {i}"),
                _ => assert!(!result.valid, "slot {i}"),
            }
        }
    }

    #[test]
    fn empty_bulk_input_is_fine() {
        let validator = Validator::new();
        let results = validator
            .validate_many(&CancelToken::new(), &[], BulkOptions::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn close_is_idempotent_without_smtp() {
        let validator = Validator::new();
        validator.close();
        validator.close();
    }
}
