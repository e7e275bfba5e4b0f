use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

static LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\d+)\}$").unwrap());

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Guard against a broken server announcing an absurd literal.
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Untagged lines and literals collected while waiting for a tagged `OK`.
#[derive(Debug, Default)]
pub struct Reply {
    pub lines: Vec<String>,
    pub literals: Vec<Vec<u8>>,
}

/// Minimal IMAP4rev1 session: enough to log in, search one mailbox, and pull
/// whole messages. Production sessions run over implicit TLS.
pub struct ImapSession<S = TlsStream<TcpStream>> {
    stream: BufReader<S>,
    next_tag: u32,
}

impl ImapSession<TlsStream<TcpStream>> {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        debug!("Connecting to IMAP server {}:{}", host, port);

        let tcp = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| anyhow!("timed out connecting to {}:{}", host, port))?
            .with_context(|| format!("failed to connect to {}:{}", host, port))?;
        tcp.set_nodelay(true)?;

        use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
        let _ = CryptoProvider::install_default(ring::default_provider());

        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(tls_config));
        let server_name = ServerName::try_from(host)
            .map_err(|e| anyhow!("invalid IMAP host {}: {}", host, e))?
            .to_owned();

        let tls = timeout(HANDSHAKE_TIMEOUT, connector.connect(server_name, tcp))
            .await
            .map_err(|_| anyhow!("TLS handshake with {} timed out", host))?
            .context("TLS handshake failed")?;

        Self::from_stream(tls).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ImapSession<S> {
    /// Wrap an established connection and consume the server greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut session = Self {
            stream: BufReader::new(stream),
            next_tag: 1,
        };

        let greeting = session.read_line().await?;
        debug!("Server greeting: {}", greeting);
        if !(greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH")) {
            bail!("unexpected IMAP greeting: {}", greeting);
        }
        Ok(session)
    }

    pub async fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let cmd = format!("LOGIN {} {}", quote(user), quote(password));
        self.command(&cmd, Some("LOGIN <redacted>")).await?;
        debug!("Logged in as {}", user);
        Ok(())
    }

    pub async fn select(&mut self, mailbox: &str) -> Result<()> {
        self.command(&format!("SELECT {}", quote(mailbox)), None).await?;
        Ok(())
    }

    /// Sequence numbers matching `criteria` (raw IMAP search syntax).
    pub async fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let reply = self.command(&format!("SEARCH {}", criteria), None).await?;
        Ok(parse_search(&reply.lines))
    }

    /// Whole RFC 822 message for sequence number `seq`.
    pub async fn fetch_rfc822(&mut self, seq: u32) -> Result<Option<Vec<u8>>> {
        let reply = self.command(&format!("FETCH {} RFC822", seq), None).await?;
        Ok(reply.literals.into_iter().next())
    }

    pub async fn logout(mut self) -> Result<()> {
        self.command("LOGOUT", None).await?;
        Ok(())
    }

    async fn command(&mut self, cmd: &str, log_as: Option<&str>) -> Result<Reply> {
        let tag = format!("A{:04}", self.next_tag);
        self.next_tag += 1;

        trace!("Sending command: {} {}", tag, log_as.unwrap_or(cmd));
        let wire = format!("{} {}\r\n", tag, cmd);
        self.stream.get_mut().write_all(wire.as_bytes()).await?;
        self.stream.get_mut().flush().await?;

        let verb = cmd.split_whitespace().next().unwrap_or(cmd);
        let mut reply = Reply::default();
        loop {
            let line = self.read_line().await?;

            if let Some(rest) = line.strip_prefix(tag.as_str()).and_then(|r| r.strip_prefix(' ')) {
                let (status, text) = rest.split_once(' ').unwrap_or((rest, ""));
                if status.eq_ignore_ascii_case("OK") {
                    return Ok(reply);
                }
                bail!("IMAP {} failed: {} {}", verb, status, text);
            }

            if let Some(len) = literal_len(&line) {
                if len > MAX_LITERAL_SIZE {
                    bail!("IMAP literal of {} bytes exceeds limit", len);
                }
                let mut buf = vec![0u8; len];
                timeout(READ_TIMEOUT, self.stream.read_exact(&mut buf))
                    .await
                    .map_err(|_| anyhow!("timed out reading IMAP literal"))??;
                trace!("Received literal of {} bytes", len);
                reply.literals.push(buf);
            }
            reply.lines.push(line);
        }
    }

    /// One response line with the trailing CRLF removed.
    async fn read_line(&mut self) -> Result<String> {
        let mut bytes = Vec::with_capacity(256);
        let n = timeout(READ_TIMEOUT, self.stream.read_until(b'\n', &mut bytes))
            .await
            .map_err(|_| anyhow!("timed out waiting for IMAP response"))??;
        if n == 0 {
            bail!("IMAP connection closed by server");
        }

        let line = String::from_utf8_lossy(&bytes)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        trace!("Received: {}", line);
        Ok(line)
    }
}

/// IMAP quoted string.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn literal_len(line: &str) -> Option<usize> {
    LITERAL_RE.captures(line)?[1].parse().ok()
}

fn parse_search(lines: &[String]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().filter_map(|n| n.parse().ok()))
        .collect()
}
