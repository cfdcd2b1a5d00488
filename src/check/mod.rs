//! The validation levels composed by the [`Validator`](crate::Validator).

mod disposable;
mod dns;
mod domain;
mod smtp;
mod syntax;

pub use dns::DnsChecker;
pub use domain::DomainChecker;
pub use smtp::SmtpChecker;
pub use syntax::SyntaxChecker;

use crate::cancel::CancelToken;
use crate::parse::ParsedEmail;
use crate::result::CheckResult;

/// A single validation level.
///
/// Implementations re-gate on [`ParsedEmail::valid`] so an unparsable
/// address never reaches a network check, whichever levels are registered.
pub trait Checker: Send + Sync {
    fn check(&self, cancel: &CancelToken, email: &ParsedEmail) -> CheckResult;
}
