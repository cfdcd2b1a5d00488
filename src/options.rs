use std::time::Duration;

/// Options for the DNS (MX existence) level.
#[derive(Debug, Clone)]
pub struct DnsOptions {
    /// Maximum time for one MX lookup.
    pub timeout: Duration,
    /// Accept an A record for the domain when the MX lookup fails.
    pub fallback_to_a: bool,
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            fallback_to_a: false,
        }
    }
}

/// Options for the domain reputation level.
#[derive(Debug, Clone)]
pub struct DomainOptions {
    /// Fail addresses whose domain is a known disposable provider.
    pub check_disposable: bool,
    /// Suggest corrections for domains close to a well-known provider.
    /// Never fails an address, only populates the suggestion field.
    pub check_typos: bool,
    /// Levenshtein distance threshold for typo detection.
    pub typo_threshold: usize,
}

impl Default for DomainOptions {
    fn default() -> Self {
        Self {
            check_disposable: true,
            check_typos: true,
            typo_threshold: 2,
        }
    }
}

/// Options for the SMTP probe level.
///
/// `helo_domain` and `mail_from` are required; every other zeroed field
/// falls back to its default.
#[derive(Debug, Clone)]
pub struct SmtpOptions {
    /// Domain announced in the `EHLO` command, e.g. `myapp.com`.
    pub helo_domain: String,
    /// Envelope sender for `MAIL FROM`, e.g. `verify@myapp.com`.
    pub mail_from: String,
    /// Maximum time for the TCP connect.
    pub connect_timeout: Duration,
    /// Maximum response time for a single SMTP command.
    pub command_timeout: Duration,
    /// How many MX hosts to try, in preference order.
    pub max_mx_hosts: usize,
    /// SMTP port.
    pub port: u16,
    /// Idle pooled connections kept per MX host.
    pub max_conns_per_host: usize,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            helo_domain: String::new(),
            mail_from: String::new(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
            max_mx_hosts: 2,
            port: 25,
            max_conns_per_host: 3,
        }
    }
}

/// Options for bulk validation.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Number of concurrent worker threads.
    pub workers: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self { workers: 5 }
    }
}
