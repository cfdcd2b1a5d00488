#![forbid(unsafe_code)]
//! mailvet — multi-level email address validation.
//!
//! Addresses are validated through an ordered pipeline of checks with very
//! different costs: syntax conformance (always on), domain reputation
//! (disposable lists, typo suggestions), DNS MX existence, and a live SMTP
//! `RCPT TO` probe against the domain's mail exchangers. MX lookups are
//! served from a shared TTL cache and SMTP sessions are reused across
//! recipients through a per-host connection pool, which keeps bulk list
//! cleaning cheap.
//!
//! ```
//! use mailvet::{CancelToken, Validator};
//!
//! let validator = Validator::new().with_domain();
//! let result = validator
//!     .validate(&CancelToken::new(), "user@example.com")
//!     .unwrap();
//! assert!(result.valid);
//! ```
//!
//! When the SMTP level is configured, call [`Validator::close`] once done to
//! release pooled connections.

pub mod cancel;
pub mod check;
pub mod dnscache;
mod error;
mod options;
pub mod parse;
mod result;
pub mod smtppool;
mod validator;

pub use cancel::CancelToken;
pub use error::ValidatorError;
pub use options::{BulkOptions, DnsOptions, DomainOptions, SmtpOptions};
pub use result::{CheckLevel, CheckResult, ValidationResult};
pub use validator::Validator;
