use std::io;

use thiserror::Error;

/// Errors surfaced by [`Pool::check_rcpt`](super::Pool::check_rcpt).
///
/// A permanent `MAIL FROM` or `RCPT TO` rejection is not an error: it comes
/// back as an [`SmtpReply`](super::SmtpReply) so the caller can inspect the
/// status code. Errors mean the attempt itself failed and the connection
/// has been discarded.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been closed; no further probes are possible.
    #[error("connection pool is closed")]
    Closed,
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
    #[error("server rejected connection: {code} {message}")]
    Banner { code: u16, message: String },
    #[error("{command} rejected: {code} {message}")]
    Rejected {
        command: &'static str,
        code: u16,
        message: String,
    },
    #[error("MAIL FROM temporary failure: {code} {message}")]
    TransientMailFrom { code: u16, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
}
