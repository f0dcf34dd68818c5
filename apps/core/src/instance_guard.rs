//! Single-instance detection through a loopback HTTP listener.
//!
//! The first process binds the guard port and keeps listening. A later
//! process fails to bind, sends one empty `POST` to the same address so the
//! running instance surfaces itself, and exits.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

/// A peer that stalls mid-request is dropped after this long.
pub const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(2);
/// Longer than `CONNECTION_READ_TIMEOUT`, so a signal queued behind a stalled
/// peer still gets its answer.
pub const SIGNAL_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_LINE_BYTES: u64 = 8 * 1024;
const MAX_HEADER_LINES: usize = 64;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to signal running instance at {url}: {message}")]
    Signal { url: String, message: String },
    #[error("guard listener io error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum GuardOutcome {
    Primary(InstanceListener),
    Delegated,
}

pub struct InstanceGuard;

impl InstanceGuard {
    pub fn acquire(host: &str, port: u16) -> Result<GuardOutcome, GuardError> {
        let addr = format!("{host}:{port}");
        match TcpListener::bind(&addr) {
            Ok(listener) => {
                tracing::info!(%addr, "instance guard bound");
                Ok(GuardOutcome::Primary(InstanceListener { listener }))
            }
            Err(error) if error.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::info!(%addr, "another instance is running; asking it to show");
                signal_running_instance(host, port)?;
                Ok(GuardOutcome::Delegated)
            }
            Err(source) => Err(GuardError::Bind { addr, source }),
        }
    }
}

pub fn signal_running_instance(host: &str, port: u16) -> Result<(), GuardError> {
    let url = format!("http://{host}:{port}/");
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(SIGNAL_TIMEOUT))
        .build()
        .into();
    agent
        .post(&url)
        .send_empty()
        .map(|_| ())
        .map_err(|error| GuardError::Signal {
            url,
            message: error.to_string(),
        })
}

pub struct InstanceListener {
    listener: TcpListener,
}

impl InstanceListener {
    pub fn local_addr(&self) -> Result<SocketAddr, GuardError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves activation requests on a background thread for the rest of the
    /// process lifetime. Every request is answered `200 OK`; `POST`s invoke
    /// `on_activate`.
    pub fn serve<F>(self, mut on_activate: F) -> Result<JoinHandle<()>, GuardError>
    where
        F: FnMut() + Send + 'static,
    {
        let listener = self.listener;
        let handle = thread::Builder::new()
            .name("popbox-guard".to_string())
            .spawn(move || {
                for stream in listener.incoming() {
                    let stream = match stream {
                        Ok(stream) => stream,
                        Err(error) => {
                            tracing::warn!(%error, "guard accept failed");
                            continue;
                        }
                    };
                    match handle_connection(stream) {
                        Ok(method) if method.eq_ignore_ascii_case("POST") => {
                            tracing::info!("activation requested by another instance");
                            on_activate();
                        }
                        Ok(method) => tracing::debug!(%method, "ignoring guard request"),
                        Err(error) => tracing::warn!(%error, "guard request failed"),
                    }
                }
            })?;
        Ok(handle)
    }
}

/// Reads one request, answers `200 OK` and returns the request method.
fn handle_connection(mut stream: TcpStream) -> Result<String, std::io::Error> {
    stream.set_read_timeout(Some(CONNECTION_READ_TIMEOUT))?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader
        .by_ref()
        .take(MAX_LINE_BYTES)
        .read_line(&mut request_line)?;
    let method = request_line
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    let mut content_length = 0_usize;
    for _ in 0..MAX_HEADER_LINES {
        let mut line = String::new();
        if reader.by_ref().take(MAX_LINE_BYTES).read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    if content_length > 0 {
        let mut body = vec![0_u8; content_length.min(64 * 1024)];
        reader.read_exact(&mut body)?;
    }

    stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")?;
    stream.flush()?;
    Ok(method)
}
