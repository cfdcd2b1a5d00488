use std::sync::Arc;

use tracing::debug;

use super::Checker;
use crate::cancel::CancelToken;
use crate::dnscache::Cache;
use crate::parse::ParsedEmail;
use crate::result::{CheckLevel, CheckResult};
use crate::smtppool::Pool;

/// SMTP `RCPT TO` probing against the domain's mail exchangers.
///
/// MX records come from the shared DNS cache and sessions from the shared
/// connection pool, so a sorted bulk run touches the network as little as
/// possible. A 5xx answer from any exchanger is final for the recipient;
/// transport errors and 4xx answers fail over to the next host.
pub struct SmtpChecker {
    /// How many exchangers to try, in preference order. Zero means all.
    max_mx_hosts: usize,
    cache: Arc<Cache>,
    pool: Arc<Pool>,
}

impl SmtpChecker {
    pub fn new(max_mx_hosts: usize, cache: Arc<Cache>, pool: Arc<Pool>) -> Self {
        Self {
            max_mx_hosts,
            cache,
            pool,
        }
    }
}

impl Checker for SmtpChecker {
    fn check(&self, cancel: &CancelToken, email: &ParsedEmail) -> CheckResult {
        let level = CheckLevel::Smtp;

        if !email.valid {
            return CheckResult::fail(level, "skipped: invalid email");
        }

        let mut records = match self.cache.lookup_mx(&email.domain_ascii) {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => return CheckResult::fail(level, "no MX records found"),
            Err(err) => return CheckResult::fail(level, format!("MX lookup failed: {err}")),
        };
        records.sort_by_key(|record| record.preference);

        let max_hosts = if self.max_mx_hosts == 0 || self.max_mx_hosts > records.len() {
            records.len()
        } else {
            self.max_mx_hosts
        };

        // The wire identity: Unicode domains go out in Punycode form.
        let recipient = format!("{}@{}", email.local, email.domain_ascii);
        let mut last_err: Option<String> = None;

        for record in records.iter().take(max_hosts) {
            if cancel.is_cancelled() {
                return CheckResult::fail(level, "cancelled");
            }

            let mx_host = record.exchange.trim_end_matches('.');
            match self.pool.check_rcpt(mx_host, &recipient) {
                Err(err) => {
                    debug!(host = mx_host, %err, "SMTP probe failed, trying next MX");
                    last_err = Some(err.to_string());
                }
                Ok(reply) if reply.code >= 500 => {
                    return CheckResult::fail(level, format!("RCPT rejected: {}", reply.message))
                        .with_mx_host(mx_host)
                        .with_smtp_code(reply.code);
                }
                Ok(reply) if reply.code >= 400 => {
                    last_err = Some(format!("temporary failure {}: {}", reply.code, reply.message));
                }
                Ok(reply) => {
                    return CheckResult::pass(level, "RCPT TO accepted")
                        .with_mx_host(mx_host)
                        .with_smtp_code(reply.code);
                }
            }
        }

        let last = last_err.unwrap_or_else(|| "no MX host attempted".to_string());
        CheckResult::fail(level, format!("SMTP probe failed on all MX hosts: {last}"))
    }
}
