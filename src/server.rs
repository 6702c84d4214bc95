//! Line-oriented SMTP front-end.
//!
//! Minimal wire surface needed to drive the session callbacks: HELO,
//! EHLO, AUTH PLAIN, MAIL FROM, RCPT TO, DATA, RSET, NOOP, QUIT. All
//! policy lives in the session; this module only frames commands and
//! maps session errors to SMTP reply codes.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{DataError, ServerError, SessionError};
use crate::session::{Backend, Session, SessionState};

/// Ceiling on a single message, matching common relay limits.
const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct SmtpServer {
    backend: Arc<Backend>,
    hostname: String,
}

impl SmtpServer {
    pub fn new(backend: Arc<Backend>, hostname: impl Into<String>) -> Self {
        Self {
            backend,
            hostname: hostname.into(),
        }
    }

    pub async fn bind(&self, addr: &str) -> Result<TcpListener, ServerError> {
        TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
    }

    /// Accept loop. Each connection is handled on its own task; a slow
    /// DATA or dispatch only blocks that task.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                tracing::debug!(%peer, "connection accepted");
                if let Err(e) = server.handle_connection(stream).await {
                    tracing::debug!(%peer, error = %e, "connection ended with error");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> std::io::Result<()> {
        let peer = stream.peer_addr()?;
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        reply(&mut write, &format!("220 {} ESMTP mailpush", self.hostname)).await?;

        let mut session = self.backend.anonymous_login(peer.ip());
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                // Connection closed; abandon the session without dispatch.
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            let (verb, args) = line.split_once(' ').unwrap_or((line, ""));

            match verb.to_ascii_uppercase().as_str() {
                "HELO" => reply(&mut write, &format!("250 {}", self.hostname)).await?,
                "EHLO" => {
                    reply(
                        &mut write,
                        &format!("250-{}\r\n250-AUTH PLAIN\r\n250 8BITMIME", self.hostname),
                    )
                    .await?;
                }
                "AUTH" => {
                    self.handle_auth(args, &mut reader, &mut write, &mut session, peer.ip())
                        .await?;
                }
                "MAIL" => match parse_path(args, "FROM:") {
                    Some(from) => match session.mail(&from) {
                        Ok(()) => reply(&mut write, "250 2.1.0 OK").await?,
                        Err(e) => reply(&mut write, &error_reply(&e)).await?,
                    },
                    None => reply(&mut write, "501 5.5.4 syntax: MAIL FROM:<address>").await?,
                },
                "RCPT" => match parse_path(args, "TO:") {
                    Some(to) => match session.rcpt(&to) {
                        Ok(()) => reply(&mut write, "250 2.1.5 OK").await?,
                        Err(e) => reply(&mut write, &error_reply(&e)).await?,
                    },
                    None => reply(&mut write, "501 5.5.4 syntax: RCPT TO:<address>").await?,
                },
                "DATA" => {
                    if session.state() != SessionState::HasRecipient {
                        reply(&mut write, "503 5.5.1 bad sequence: RCPT required before DATA")
                            .await?;
                        continue;
                    }
                    reply(&mut write, "354 End data with <CR><LF>.<CR><LF>").await?;
                    self.handle_data(&mut reader, &mut write, &mut session).await?;
                }
                "RSET" => {
                    session.reset();
                    reply(&mut write, "250 2.0.0 OK").await?;
                }
                "NOOP" => reply(&mut write, "250 2.0.0 OK").await?,
                "QUIT" => {
                    reply(&mut write, "221 2.0.0 Bye").await?;
                    return Ok(());
                }
                _ => reply(&mut write, "500 5.5.2 command not recognized").await?,
            }
        }
    }

    /// AUTH PLAIN, with or without an initial response. Credentials are
    /// not verified here — only the authenticated identity tag matters
    /// to session policy.
    async fn handle_auth(
        &self,
        args: &str,
        reader: &mut BufReader<OwnedReadHalf>,
        write: &mut OwnedWriteHalf,
        session: &mut Session,
        remote: std::net::IpAddr,
    ) -> std::io::Result<()> {
        let (mechanism, initial) = args.split_once(' ').unwrap_or((args, ""));
        if !mechanism.eq_ignore_ascii_case("PLAIN") {
            return reply(write, "504 5.5.4 unrecognized authentication type").await;
        }

        let response = if initial.is_empty() {
            reply(write, "334 ").await?;
            let mut buf = Vec::new();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(());
            }
            String::from_utf8_lossy(&buf).trim().to_string()
        } else {
            initial.trim().to_string()
        };

        match decode_auth_plain(&response) {
            Some(username) => {
                *session = self.backend.login(remote, &username);
                tracing::debug!(%remote, %username, "authenticated session");
                reply(write, "235 2.7.0 authentication successful").await
            }
            None => reply(write, "501 5.5.4 malformed AUTH PLAIN response").await,
        }
    }

    /// Collect the dot-terminated message body and run it through the
    /// session pipeline.
    async fn handle_data(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        write: &mut OwnedWriteHalf,
        session: &mut Session,
    ) -> std::io::Result<()> {
        let mut raw: Vec<u8> = Vec::new();
        let mut too_big = false;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                // Mid-message disconnect: abandon without dispatch.
                return Ok(());
            }
            let mut line: &[u8] = &buf;
            while line.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
                line = &line[..line.len() - 1];
            }
            if line == b"." {
                break;
            }
            // Transparency per RFC 5321: drop one leading dot.
            if line.first() == Some(&b'.') {
                line = &line[1..];
            }
            if raw.len() + line.len() + 2 > MAX_MESSAGE_BYTES {
                too_big = true;
                continue;
            }
            raw.extend_from_slice(line);
            raw.extend_from_slice(b"\r\n");
        }

        if too_big {
            return reply(write, "552 5.3.4 message exceeds maximum size").await;
        }

        match session.data(&raw).await {
            Ok(()) => reply(write, "250 2.0.0 OK: message accepted").await,
            Err(e) => reply(write, &error_reply(&e)).await,
        }
    }
}

async fn reply(write: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    write.write_all(format!("{line}\r\n").as_bytes()).await
}

/// Extract the address from `FROM:<addr>` / `TO:<addr>` arguments,
/// ignoring any trailing ESMTP parameters.
fn parse_path(args: &str, label: &str) -> Option<String> {
    let rest = args.trim();
    let (head, tail) = rest.split_at_checked(label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let token = tail.trim_start().split_whitespace().next().unwrap_or("");
    let addr = token
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(token);
    Some(addr.to_string())
}

/// The AUTH PLAIN response is `authzid NUL authcid NUL password`,
/// base64-encoded. Returns the authentication identity.
fn decode_auth_plain(response: &str) -> Option<String> {
    let bytes = BASE64.decode(response).ok()?;
    let mut fields = bytes.split(|b| *b == 0);
    let _authzid = fields.next()?;
    let authcid = fields.next()?;
    let _password = fields.next()?;
    if authcid.is_empty() {
        return None;
    }
    String::from_utf8(authcid.to_vec()).ok()
}

fn error_reply(err: &SessionError) -> String {
    match err {
        SessionError::BadSequence { .. } => format!("503 5.5.1 {err}"),
        SessionError::Recipient(_) => format!("550 5.1.1 {err}"),
        SessionError::Data(DataError::UnsupportedContentType(_)) => format!("554 5.6.1 {err}"),
        SessionError::Data(DataError::Parse) => format!("554 5.6.0 {err}"),
        SessionError::Data(DataError::Dispatch(_)) => format!("451 4.3.0 {err}"),
    }
}
