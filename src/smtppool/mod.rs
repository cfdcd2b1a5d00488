//! Per-host SMTP connection pooling.
//!
//! Live sessions are reused across recipients through the `RSET` command,
//! so bulk validation pays the banner and `EHLO` exchange once per host
//! rather than once per address. Connections are retired after too many
//! uses, past a maximum age, on any protocol error, and when the idle stack
//! for their host is full.

mod conn;
mod error;

pub use conn::{Conn, Dialer, TcpDialer};
pub use error::PoolError;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, trace};

use conn::PooledConn;

/// A raw SMTP reply: the final status code plus the concatenated message
/// text of every reply line.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub message: String,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }
}

/// Pool configuration. Zeroed limits fall back to their defaults.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Domain announced in `EHLO`.
    pub helo_domain: String,
    /// Envelope sender for `MAIL FROM`.
    pub mail_from: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub port: u16,
    /// Idle connections kept per MX host.
    pub max_conns_per_host: usize,
    /// RCPT probes served by one connection before it is retired.
    pub max_uses_per_conn: u32,
    /// Lifetime of a connection before it is retired.
    pub max_conn_age: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            helo_domain: String::new(),
            mail_from: String::new(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
            port: 25,
            max_conns_per_host: 3,
            max_uses_per_conn: 100,
            max_conn_age: Duration::from_secs(300),
        }
    }
}

struct PoolInner {
    /// Idle connections per MX host, most recently released last.
    hosts: HashMap<String, Vec<PooledConn>>,
    closed: bool,
}

/// The SMTP connection pool shared by every checker on a validator.
///
/// A connection is either in a host's idle stack or exclusively owned by
/// one borrower, never both. All shared state sits behind a single mutex
/// which is never held across network I/O.
pub struct Pool {
    cfg: PoolConfig,
    dialer: Box<dyn Dialer>,
    inner: Mutex<PoolInner>,
}

impl Pool {
    /// Pool with the default TCP dialer.
    pub fn new(cfg: PoolConfig) -> Self {
        Self::with_dialer(cfg, TcpDialer)
    }

    /// Pool with an injected dialer, used by tests.
    pub fn with_dialer(mut cfg: PoolConfig, dialer: impl Dialer + 'static) -> Self {
        let defaults = PoolConfig::default();
        if cfg.max_conns_per_host == 0 {
            cfg.max_conns_per_host = defaults.max_conns_per_host;
        }
        if cfg.max_uses_per_conn == 0 {
            cfg.max_uses_per_conn = defaults.max_uses_per_conn;
        }
        if cfg.max_conn_age.is_zero() {
            cfg.max_conn_age = defaults.max_conn_age;
        }
        Self {
            cfg,
            dialer: Box::new(dialer),
            inner: Mutex::new(PoolInner {
                hosts: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Performs an `RCPT TO` probe for `email` against `mx_host` on a
    /// pooled connection.
    ///
    /// New connections run banner, `EHLO`, `MAIL FROM`, `RCPT TO`; reused
    /// ones replace the greeting with `RSET`. The returned reply is the
    /// server's `RCPT TO` answer, or the `MAIL FROM` answer when that was
    /// rejected permanently (the probe sender itself is refused, which the
    /// caller should report rather than retry elsewhere).
    pub fn check_rcpt(&self, mx_host: &str, email: &str) -> Result<SmtpReply, PoolError> {
        let (mut conn, reused) = self.acquire(mx_host)?;
        match self.converse(&mut conn, email, reused) {
            Ok(reply) => {
                self.release(mx_host, conn);
                Ok(reply)
            }
            // Connection state is unknown after a failure: drop the
            // transport instead of returning it.
            Err(err) => Err(err),
        }
    }

    /// Closes the pool: every idle connection gets a best-effort `QUIT`.
    /// Subsequent probes fail with [`PoolError::Closed`]. Safe to call
    /// repeatedly.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        inner.closed = true;
        for (_, stack) in inner.hosts.drain() {
            for mut conn in stack {
                conn.quit();
            }
        }
    }

    fn acquire(&self, mx_host: &str) -> Result<(PooledConn, bool), PoolError> {
        {
            let mut inner = self.inner.lock().expect("pool lock poisoned");
            if inner.closed {
                return Err(PoolError::Closed);
            }
            if let Some(stack) = inner.hosts.get_mut(mx_host) {
                while let Some(mut conn) = stack.pop() {
                    if conn.uses >= self.cfg.max_uses_per_conn
                        || conn.created_at.elapsed() > self.cfg.max_conn_age
                    {
                        trace!(host = mx_host, uses = conn.uses, "retiring connection");
                        conn.quit();
                        continue;
                    }
                    trace!(host = mx_host, "reusing pooled connection");
                    return Ok((conn, true));
                }
            }
        }

        debug!(host = mx_host, port = self.cfg.port, "dialing SMTP host");
        let stream = self
            .dialer
            .dial(mx_host, self.cfg.port, self.cfg.connect_timeout)
            .map_err(|source| PoolError::Connect {
                address: format!("{mx_host}:{}", self.cfg.port),
                source,
            })?;
        Ok((PooledConn::new(stream), false))
    }

    fn release(&self, mx_host: &str, mut conn: PooledConn) {
        let mut inner = self.inner.lock().expect("pool lock poisoned");
        let full = inner
            .hosts
            .get(mx_host)
            .is_some_and(|stack| stack.len() >= self.cfg.max_conns_per_host);
        if inner.closed || full {
            conn.quit();
            return;
        }
        inner.hosts.entry(mx_host.to_string()).or_default().push(conn);
    }

    fn converse(
        &self,
        conn: &mut PooledConn,
        email: &str,
        reused: bool,
    ) -> Result<SmtpReply, PoolError> {
        conn.set_timeouts(self.cfg.command_timeout)
            .map_err(|source| PoolError::Io { source })?;

        if reused {
            // A fresh transaction on the reused session.
            let reply = conn.command("RSET")?;
            if reply.code >= 400 {
                return Err(PoolError::Rejected {
                    command: "RSET",
                    code: reply.code,
                    message: reply.message,
                });
            }
        } else {
            let banner = conn.read_reply()?;
            if banner.code >= 500 {
                return Err(PoolError::Banner {
                    code: banner.code,
                    message: banner.message,
                });
            }
            let reply = conn.command(&format!("EHLO {}", self.cfg.helo_domain))?;
            if reply.code >= 400 {
                return Err(PoolError::Rejected {
                    command: "EHLO",
                    code: reply.code,
                    message: reply.message,
                });
            }
        }

        let reply = conn.command(&format!("MAIL FROM:<{}>", self.cfg.mail_from))?;
        if reply.code >= 500 {
            return Ok(reply);
        }
        if reply.code >= 400 {
            return Err(PoolError::TransientMailFrom {
                code: reply.code,
                message: reply.message,
            });
        }

        let reply = conn.command(&format!("RCPT TO:<{email}>"))?;
        conn.uses += 1;
        Ok(reply)
    }
}
