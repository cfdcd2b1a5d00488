use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;

use super::Checker;
use crate::cancel::CancelToken;
use crate::dnscache::{Cache, DnsError, MxRecord};
use crate::options::DnsOptions;
use crate::parse::ParsedEmail;
use crate::result::{CheckLevel, CheckResult};

type MxLookupFn = Box<dyn Fn(&str) -> Result<Vec<MxRecord>, DnsError> + Send + Sync>;
type HostLookupFn = Box<dyn Fn(&str) -> Vec<IpAddr> + Send + Sync>;

/// Verifies that the address domain has mail exchangers.
///
/// With `fallback_to_a` enabled, a failed MX lookup is retried as an
/// A-record lookup: some domains receive mail on their apex address without
/// publishing MX records.
pub struct DnsChecker {
    options: DnsOptions,
    lookup_mx: MxLookupFn,
    lookup_host: HostLookupFn,
}

impl DnsChecker {
    /// Checker backed by the shared MX cache.
    pub fn new(options: DnsOptions, cache: Arc<Cache>) -> Self {
        Self::with_lookup(options, Box::new(move |domain| cache.lookup_mx(domain)))
    }

    /// Checker with an injected MX lookup, used by tests.
    pub fn with_lookup(options: DnsOptions, lookup_mx: MxLookupFn) -> Self {
        Self {
            options,
            lookup_mx,
            lookup_host: Box::new(system_host_lookup),
        }
    }

    #[cfg(test)]
    fn with_host_lookup(mut self, lookup_host: HostLookupFn) -> Self {
        self.lookup_host = lookup_host;
        self
    }
}

impl Checker for DnsChecker {
    fn check(&self, _cancel: &CancelToken, email: &ParsedEmail) -> CheckResult {
        let level = CheckLevel::Dns;

        if !email.valid {
            return CheckResult::fail(level, "skipped: invalid email");
        }

        let mut records = match (self.lookup_mx)(&email.domain_ascii) {
            Ok(records) => records,
            Err(err) => {
                if self.options.fallback_to_a {
                    let addrs = (self.lookup_host)(&email.domain_ascii);
                    if let Some(first) = addrs.first() {
                        return CheckResult::pass(
                            level,
                            "no MX record, but A record found (fallback)",
                        )
                        .with_mx_host(first.to_string());
                    }
                }
                return CheckResult::fail(level, format!("MX lookup failed: {err}"));
            }
        };

        if records.is_empty() {
            return CheckResult::fail(level, "no MX records found");
        }

        records.sort_by_key(|record| record.preference);
        let primary = records[0].exchange.trim_end_matches('.').to_string();
        CheckResult::pass(level, format!("{} MX record(s) found", records.len()))
            .with_mx_host(primary)
    }
}

/// A-record lookup through the system resolver. The port is irrelevant, it
/// only satisfies the address syntax.
fn system_host_lookup(domain: &str) -> Vec<IpAddr> {
    format!("{domain}:25")
        .to_socket_addrs()
        .map(|addrs| addrs.map(|addr| addr.ip()).collect())
        .unwrap_or_default()
}
