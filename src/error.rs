use thiserror::Error;

/// Configuration errors latched on the [`Validator`](crate::Validator).
///
/// Per-level failures are not errors: they are reported inside
/// [`CheckResult`](crate::CheckResult) with `passed = false`. A latched
/// configuration error is returned by every validate call until fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    /// `with_smtp` was called without `helo_domain` or `mail_from`.
    #[error("SmtpOptions requires helo_domain and mail_from")]
    InvalidSmtpOptions,
    /// First error encountered while validating a batch.
    #[error("validating {email:?}: {source}")]
    Bulk {
        email: String,
        #[source]
        source: Box<ValidatorError>,
    },
}
