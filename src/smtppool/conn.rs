use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use super::error::PoolError;
use super::SmtpReply;

/// Byte transport carrying one SMTP session. [`TcpStream`] is the
/// production implementation; tests substitute scripted in-memory
/// connections so no real network is involved.
pub trait Conn: Read + Write + Send {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Conn for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

/// Opens transports to MX hosts. Injectable at pool construction time.
pub trait Dialer: Send + Sync {
    fn dial(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Box<dyn Conn>>;
}

/// Default dialer: plain TCP with a connect timeout, trying each resolved
/// address in turn.
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Box<dyn Conn>> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(Box::new(stream)),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no socket address available")
        }))
    }
}

/// A pooled SMTP session: the transport, a line buffer for reply framing,
/// and the bookkeeping used to retire connections.
pub(crate) struct PooledConn {
    stream: Box<dyn Conn>,
    buffer: Vec<u8>,
    pub(crate) created_at: Instant,
    pub(crate) uses: u32,
}

impl PooledConn {
    pub(crate) fn new(stream: Box<dyn Conn>) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            created_at: Instant::now(),
            uses: 0,
        }
    }

    pub(crate) fn set_timeouts(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))
    }

    /// Sends a command and reads the complete reply.
    pub(crate) fn command(&mut self, command: &str) -> Result<SmtpReply, PoolError> {
        self.send_command(command)
            .map_err(|source| PoolError::Io { source })?;
        self.read_reply()
    }

    fn send_command(&mut self, command: &str) -> io::Result<()> {
        let mut line = command.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        self.stream.write_all(&line)?;
        self.stream.flush()
    }

    /// Reads a complete, possibly multi-line SMTP reply. A line whose fourth
    /// character is `-` continues the reply; the first line without it
    /// terminates and carries the final status code. The message is the
    /// per-line text joined with ` | `.
    pub(crate) fn read_reply(&mut self) -> Result<SmtpReply, PoolError> {
        let mut texts: Vec<String> = Vec::new();
        let code = loop {
            let line = self
                .read_line()
                .map_err(|source| PoolError::Io { source })?;
            if line.len() < 3 {
                return Err(PoolError::Protocol(format!(
                    "response line too short: {line:?}"
                )));
            }
            let code_part = line.get(..3).ok_or_else(|| {
                PoolError::Protocol(format!("invalid response code in {line:?}"))
            })?;
            let code = code_part.parse::<u16>().map_err(|_| {
                PoolError::Protocol(format!("invalid response code: {code_part:?}"))
            })?;
            let continuation = line.as_bytes().get(3).copied() == Some(b'-');
            texts.push(line.get(4..).unwrap_or("").to_string());
            if !continuation {
                break code;
            }
        };
        Ok(SmtpReply {
            code,
            message: texts.join(" | "),
        })
    }

    fn read_line(&mut self) -> io::Result<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if line.ends_with(b"\r\n") {
                    line.truncate(line.len() - 2);
                } else if line.ends_with(b"\n") {
                    line.truncate(line.len() - 1);
                }
                return String::from_utf8(line)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err));
            }

            let mut chunk = [0u8; 512];
            let read = self.stream.read(&mut chunk)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed while reading reply",
                ));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    /// Best-effort `QUIT` before the transport is dropped. The reply, if
    /// any, is not read.
    pub(crate) fn quit(&mut self) {
        let _ = self.stream.set_write_timeout(Some(Duration::from_secs(2)));
        let _ = self.send_command("QUIT");
    }
}
