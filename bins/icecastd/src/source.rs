use crate::error::SourceError;
use crate::mux::ProducerMux;
use base64::Engine;
use icecast_ring::{ExportedCounters, RingBuffer};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const MAX_HEADER_BYTES: usize = 8 * 1024;
const READ_CHUNK: usize = 16 * 1024;

/// Listens for the single live source connection, authenticates it, and
/// streams its body into the ring for the duration of the session.
///
/// §4.3: one acceptor loop, at most one live session at a time (enforced
/// by [`ProducerMux::acquire_source`], not by this struct).
pub struct SourceAcceptor {
    listener: TcpListener,
    ring: Arc<RingBuffer>,
    mux: Arc<ProducerMux>,
    counters: Arc<ExportedCounters>,
    source_password: String,
    source_timeout: Duration,
}

impl SourceAcceptor {
    /// Binds `host:port`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error on bind failure (§7's `Fatal`
    /// category — the caller is expected to exit with code `2`).
    pub async fn bind(
        host: &str,
        port: u16,
        ring: Arc<RingBuffer>,
        mux: Arc<ProducerMux>,
        counters: Arc<ExportedCounters>,
        source_password: String,
        source_timeout: Duration,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self {
            listener,
            ring,
            mux,
            counters,
            source_password,
            source_timeout,
        })
    }

    /// Spawns the accept loop as its own task. Each connection is handled
    /// on its own spawned task so a slow or malicious source handshake
    /// never blocks subsequent accepts.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let this = Arc::new(self);
        loop {
            let (socket, addr) = match this.listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(%err, "source acceptor: accept failed");
                    continue;
                }
            };
            let this = Arc::clone(&this);
            tokio::spawn(async move {
                if let Err(err) = this.handle_connection(socket).await {
                    warn!(%err, %addr, "source session ended");
                }
            });
        }
    }

    async fn handle_connection(&self, socket: TcpStream) -> Result<(), SourceError> {
        let mut reader = BufReader::new(socket);
        let (mount, claimed_password) = match read_handshake(&mut reader).await {
            Ok(parsed) => parsed,
            Err(err) => {
                let mut socket = reader.into_inner();
                let _ = socket.write_all(b"HTTP/1.0 400 Bad Request\r\n\r\n").await;
                return Err(err);
            }
        };
        let _ = mount;

        if !passwords_match(&claimed_password, &self.source_password) {
            let mut socket = reader.into_inner();
            let _ = socket.write_all(b"HTTP/1.0 401 Unauthorized\r\n\r\n").await;
            return Err(SourceError::AuthFailed);
        }

        let slot = match self.mux.acquire_source() {
            Ok(slot) => slot,
            Err(err) => {
                let mut socket = reader.into_inner();
                let _ = socket.write_all(b"HTTP/1.0 403 Forbidden\r\n\r\n").await;
                return Err(err);
            }
        };

        {
            let mut socket_mut = reader.get_mut();
            socket_mut.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await?;
        }
        info!("source authenticated and streaming");

        let result = self.stream_body(&mut reader).await;
        drop(slot);
        result
    }

    async fn stream_body(&self, reader: &mut BufReader<TcpStream>) -> Result<(), SourceError> {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let read = tokio::time::timeout(self.source_timeout, reader.read(&mut buf));
            let n = match read.await {
                Ok(Ok(n)) => n,
                Ok(Err(err)) => return Err(SourceError::Io(err)),
                Err(_) => return Err(SourceError::Timeout),
            };
            if n == 0 {
                return Ok(());
            }
            self.counters.add_bytes_in(n as u64);
            self.write_with_retry(&buf[..n]).await;
        }
    }

    async fn write_with_retry(&self, chunk: &[u8]) {
        loop {
            if self.ring.write(chunk) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Reads the request line and headers, returning `(mount, password)`.
///
/// Accepts either `SOURCE <mount> ICE/1.0` or `PUT <mount> HTTP/1.x`, per
/// §4.3/§6. Only the password half of `Authorization: Basic base64(user:pass)`
/// is extracted; the username is discarded unread.
async fn read_handshake(
    reader: &mut BufReader<TcpStream>,
) -> Result<(String, String), SourceError> {
    let mut line = String::new();
    let n = reader
        .read_line(&mut line)
        .await
        .map_err(SourceError::Io)?;
    if n == 0 {
        return Err(SourceError::Protocol("connection closed before request line".into()));
    }
    let mount = parse_request_line(line.trim_end())?;

    let mut password = None;
    let mut total_header_bytes = 0usize;
    loop {
        let mut header_line = String::new();
        let n = reader
            .read_line(&mut header_line)
            .await
            .map_err(SourceError::Io)?;
        if n == 0 {
            return Err(SourceError::Protocol("connection closed mid-headers".into()));
        }
        total_header_bytes += n;
        if total_header_bytes > MAX_HEADER_BYTES {
            return Err(SourceError::Protocol("headers too large".into()));
        }
        let trimmed = header_line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some(rest) = trimmed
            .strip_prefix("Authorization:")
            .or_else(|| trimmed.strip_prefix("authorization:"))
        {
            password = parse_basic_auth_password(rest.trim());
        }
    }

    let password = password
        .ok_or_else(|| SourceError::Protocol("missing Authorization header".into()))?;
    Ok((mount, password))
}

fn parse_request_line(line: &str) -> Result<String, SourceError> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| SourceError::Protocol("empty request line".into()))?;
    let mount = parts
        .next()
        .ok_or_else(|| SourceError::Protocol("missing mount in request line".into()))?;

    match method {
        "SOURCE" | "PUT" => Ok(mount.to_string()),
        other => Err(SourceError::Protocol(format!(
            "unsupported method '{other}', expected SOURCE or PUT"
        ))),
    }
}

fn parse_basic_auth_password(value: &str) -> Option<String> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (_user, pass) = decoded.split_once(':')?;
    Some(pass.to_string())
}

/// Constant-time password comparison, per §4.3/§6: never a short-circuiting
/// `==` on the secret.
fn passwords_match(claimed: &str, configured: &str) -> bool {
    claimed.as_bytes().ct_eq(configured.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_request_line() {
        assert_eq!(parse_request_line("SOURCE /stream ICE/1.0").unwrap(), "/stream");
    }

    #[test]
    fn parses_put_request_line() {
        assert_eq!(parse_request_line("PUT /stream HTTP/1.1").unwrap(), "/stream");
    }

    #[test]
    fn rejects_unsupported_method() {
        assert!(parse_request_line("GET /stream HTTP/1.1").is_err());
    }

    #[test]
    fn decodes_basic_auth_password_ignoring_username() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("anything:hunter2");
        let header_value = format!("Basic {encoded}");
        assert_eq!(
            parse_basic_auth_password(&header_value).unwrap(),
            "hunter2"
        );
    }

    #[test]
    fn password_comparison_is_exact() {
        assert!(passwords_match("hunter2", "hunter2"));
        assert!(!passwords_match("hunter3", "hunter2"));
        assert!(!passwords_match("hunter", "hunter2"));
    }

    /// Scenario 3: a source connecting with the wrong password gets `401`
    /// and closed, and never touches the ring or flips `source_connected`.
    #[tokio::test]
    async fn wrong_password_is_rejected_without_mutating_shared_state() {
        use icecast_ring::{ExportedCounters, RingConfig};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;

        let ring = Arc::new(RingBuffer::new(RingConfig::from_mib(1).unwrap()));
        let counters = Arc::new(ExportedCounters::new());
        let mux = ProducerMux::new(Arc::clone(&ring), Arc::clone(&counters));
        let acceptor = SourceAcceptor::bind(
            "127.0.0.1",
            0,
            Arc::clone(&ring),
            Arc::clone(&mux),
            Arc::clone(&counters),
            "correct-horse".into(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let addr = acceptor.listener.local_addr().unwrap();
        acceptor.spawn();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let auth = base64::engine::general_purpose::STANDARD.encode("ignored:wrong-password");
        client
            .write_all(format!("SOURCE /stream ICE/1.0\r\nAuthorization: Basic {auth}\r\n\r\n").as_bytes())
            .await
            .unwrap();

        let mut response = [0u8; 64];
        let n = client.read(&mut response).await.unwrap();
        let response = String::from_utf8_lossy(&response[..n]);
        assert!(response.starts_with("HTTP/1.0 401"));

        assert_eq!(ring.available(), 0);
        assert!(!counters.snapshot(0.0).source_connected);
        assert!(!mux.source_is_live());
    }
}
