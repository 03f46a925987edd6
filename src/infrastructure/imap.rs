use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::services::email::mailbox::Mailbox;
use async_imap::extensions::idle::IdleResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mail_parser::MessageParser;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub type ImapSession = async_imap::Session<tokio_native_tls::TlsStream<TcpStream>>;

const IMAPS_PORT: u16 = 993;

/// Read timeout for every bounded IMAP command. The only intentionally
/// unbounded wait is IDLE.
const IMAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-response bound for body transfers. Bodies can be large and slow
/// links are common, so FETCH responses get a much wider window than
/// ordinary commands; the timer re-arms for every item the server sends.
const FETCH_BODY_TIMEOUT: Duration = Duration::from_secs(300);

/// How long one IDLE slice lasts before the keep-alive probe runs.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(120);

/// One unseen message, fetched in full and ready for dispatch.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub seq: u32,
    pub subject: String,
    pub sent_date: DateTime<Utc>,
    pub raw: Vec<u8>,
}

/// What a single IDLE slice ended with.
#[derive(Debug, PartialEq, Eq)]
pub enum IdleOutcome {
    /// The server signalled mailbox activity, or the connection dropped and
    /// the caller should run another pass (it will observe the closed
    /// session and reconnect).
    NewActivity,
    /// The keep-alive interval elapsed without activity.
    KeepAlive,
    /// Shutdown was requested while idling.
    Shutdown,
}

/// One IMAPS connection with the INBOX selected read-write.
pub struct MailboxSession {
    host: String,
    username: String,
    password: String,
    session: Option<ImapSession>,
}

impl MailboxSession {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            session: None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut ImapSession> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::Transport("IMAP session not connected".into()))
    }

    async fn store_flags(&mut self, seq: u32, flags: &str) -> Result<()> {
        let session = self.session_mut()?;
        let store = async {
            let mut stream = std::pin::pin!(session.store(seq.to_string(), flags).await?);
            while let Some(item) = stream.next().await {
                item?;
            }
            Ok::<(), async_imap::error::Error>(())
        };
        match timeout(IMAP_TIMEOUT, store).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(imap_error(&format!("STORE {}", seq), e)),
            Err(_) => Err(Error::Transport(format!("STORE {} timed out", seq))),
        }
    }
}

#[async_trait]
impl Mailbox for MailboxSession {
    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Connects, logs in and selects INBOX read-write. A no-op when the
    /// session is already open.
    async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        info!("connecting to {}", self.host);
        let tcp_stream = timeout(
            IMAP_TIMEOUT,
            TcpStream::connect((self.host.as_str(), IMAPS_PORT)),
        )
        .await
        .map_err(|_| Error::Transport(format!("timed out connecting to {}", self.host)))?
        .map_err(|e| Error::Transport(format!("TCP connect failed: {}", e)))?;

        // Deployments run against a known internal server, so any
        // certificate is accepted.
        let native_tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to create TLS connector: {}", e)))?;
        let connector = tokio_native_tls::TlsConnector::from(native_tls);

        let tls_stream = timeout(IMAP_TIMEOUT, connector.connect(&self.host, tcp_stream))
            .await
            .map_err(|_| Error::Transport("TLS handshake timed out".into()))?
            .map_err(|e| Error::Transport(format!("TLS handshake failed: {}", e)))?;

        let client = async_imap::Client::new(tls_stream);
        let mut session = timeout(IMAP_TIMEOUT, client.login(&self.username, &self.password))
            .await
            .map_err(|_| Error::Transport("login timed out".into()))?
            .map_err(|e| Error::Transport(format!("IMAP authentication failed: {}", e.0)))?;

        let inbox = bounded("SELECT INBOX", session.select("INBOX")).await?;
        debug!("INBOX selected, {} messages exist", inbox.exists);

        self.session = Some(session);
        Ok(())
    }

    /// Fetches every message lacking the SEEN flag, newest first.
    ///
    /// A message whose sent date cannot be read fails the whole fetch: a
    /// malformed date points at mailbox corruption or protocol desync, and
    /// silently reordering is worse than surfacing the error. Bodies are
    /// fetched with `BODY.PEEK[]`, so an aborted fetch leaves every message
    /// unseen for the next pass.
    async fn fetch_unseen(&mut self) -> Result<Vec<MailMessage>> {
        let session = self.session_mut()?;

        let seqs = bounded("SEARCH UNSEEN", session.search("UNSEEN")).await?;
        let mut seqs: Vec<u32> = seqs.into_iter().collect();
        seqs.sort_unstable();
        info!("processing {} unread messages...", seqs.len());

        let mut messages = Vec::with_capacity(seqs.len());
        for seq in seqs {
            let raw = fetch_body(session, seq).await?;
            let Some(raw) = raw else {
                warn!("message {} vanished before it could be fetched", seq);
                continue;
            };
            let (subject, sent_date) = message_headers(&raw)?;
            messages.push(MailMessage {
                seq,
                subject,
                sent_date,
                raw,
            });
        }

        messages.sort_by(|a, b| b.sent_date.cmp(&a.sent_date));
        Ok(messages)
    }

    /// One IDLE slice: blocks until the server signals activity, the
    /// keep-alive interval elapses or shutdown is requested. Transport
    /// errors do not surface here; the session is invalidated and the
    /// caller reopens it on the next pass.
    async fn idle_wait(&mut self, shutdown: &mut watch::Receiver<bool>) -> IdleOutcome {
        let Some(session) = self.session.take() else {
            return IdleOutcome::NewActivity;
        };

        let mut idle = session.idle();
        if let Err(e) = idle.init().await {
            warn!("IDLE init failed: {}", e);
            return IdleOutcome::NewActivity;
        }

        let response = {
            let (idle_wait, _stop) = idle.wait_with_timeout(KEEP_ALIVE_INTERVAL);
            tokio::select! {
                result = idle_wait => Some(result),
                _ = shutdown.changed() => None,
            }
        };

        match idle.done().await {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                warn!("failed to terminate IDLE: {}", e);
                return match response {
                    None => IdleOutcome::Shutdown,
                    _ => IdleOutcome::NewActivity,
                };
            }
        }

        match response {
            None => IdleOutcome::Shutdown,
            Some(Ok(IdleResponse::NewData(_))) => IdleOutcome::NewActivity,
            Some(Ok(IdleResponse::Timeout)) => IdleOutcome::KeepAlive,
            Some(Ok(IdleResponse::ManualInterrupt)) => IdleOutcome::Shutdown,
            Some(Err(e)) => {
                warn!("IDLE ended with error: {}", e);
                self.session = None;
                IdleOutcome::NewActivity
            }
        }
    }

    /// Cheap command to keep the TCP connection and the server-side session
    /// alive between IDLE slices.
    async fn keep_alive_probe(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        bounded("NOOP", session.noop()).await
    }

    async fn mark_seen(&mut self, seq: u32) -> Result<()> {
        self.store_flags(seq, "+FLAGS (\\Seen)").await
    }

    async fn mark_deleted(&mut self, seq: u32) -> Result<()> {
        self.store_flags(seq, "+FLAGS (\\Deleted)").await
    }

    /// Permanently removes messages flagged `\Deleted`.
    async fn expunge(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        let expunge = async {
            let mut stream = std::pin::pin!(session.expunge().await?);
            while let Some(item) = stream.next().await {
                item?;
            }
            Ok::<(), async_imap::error::Error>(())
        };
        match timeout(IMAP_TIMEOUT, expunge).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(imap_error("EXPUNGE", e)),
            Err(_) => Err(Error::Transport("EXPUNGE timed out".into())),
        }
    }

    /// Logs out and drops the connection. Errors are logged, never raised;
    /// this runs on the shutdown path.
    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            match timeout(IMAP_TIMEOUT, session.logout()).await {
                Ok(Ok(())) => debug!("logged out"),
                Ok(Err(e)) => warn!("logout failed: {}", e),
                Err(_) => warn!("logout timed out"),
            }
        }
    }
}

/// Fetches one message body without touching its flags. `BODY.PEEK[]`
/// leaves `\Seen` unset, so an aborted pass cannot hide messages that were
/// fetched but never dispatched; the seen flag is set explicitly after
/// dispatch.
async fn fetch_body(session: &mut ImapSession, seq: u32) -> Result<Option<Vec<u8>>> {
    let mut stream = match timeout(IMAP_TIMEOUT, session.fetch(seq.to_string(), "BODY.PEEK[]")).await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(imap_error(&format!("FETCH {}", seq), e)),
        Err(_) => return Err(Error::Transport(format!("FETCH {} timed out", seq))),
    };

    let mut body = None;
    loop {
        let item = match timeout(FETCH_BODY_TIMEOUT, stream.next()).await {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(_) => return Err(Error::Transport(format!("FETCH {} stalled", seq))),
        };
        let fetch = item.map_err(|e| imap_error(&format!("FETCH {}", seq), e))?;
        if let Some(bytes) = fetch.body() {
            body = Some(bytes.to_vec());
        }
    }
    Ok(body)
}

/// Pulls subject and sent date out of a raw RFC822 message.
pub(crate) fn message_headers(raw: &[u8]) -> Result<(String, DateTime<Utc>)> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Transport("message headers could not be parsed".into()))?;
    let subject = parsed.subject().unwrap_or("").to_string();
    let date = parsed.date().ok_or_else(|| {
        Error::Transport(format!("message '{}' has no readable sent date", subject))
    })?;
    let sent_date = DateTime::<Utc>::from_timestamp(date.to_timestamp(), 0).ok_or_else(|| {
        Error::Transport(format!("message '{}' has an out-of-range sent date", subject))
    })?;
    Ok((subject, sent_date))
}

async fn bounded<F, T>(op: &str, future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, async_imap::error::Error>>,
{
    match timeout(IMAP_TIMEOUT, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(imap_error(op, e)),
        Err(_) => Err(Error::Transport(format!("{} timed out", op))),
    }
}

fn imap_error(op: &str, e: async_imap::error::Error) -> Error {
    Error::Transport(format!("{} failed: {}", op, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_message(date_header: Option<&str>) -> Vec<u8> {
        let mut msg = String::new();
        msg.push_str("From: sender@example.com\r\n");
        msg.push_str("To: printer@example.com\r\n");
        msg.push_str("Subject: invoice\r\n");
        if let Some(date) = date_header {
            msg.push_str(&format!("Date: {}\r\n", date));
        }
        msg.push_str("\r\nhello\r\n");
        msg.into_bytes()
    }

    #[test]
    fn test_message_headers_reads_subject_and_date() {
        let raw = raw_message(Some("Tue, 01 Jul 2025 10:30:00 +0000"));
        let (subject, sent_date) = message_headers(&raw).unwrap();
        assert_eq!(subject, "invoice");
        assert_eq!(sent_date.timestamp(), 1_751_365_800);
    }

    #[test]
    fn test_message_without_date_fails_the_fetch() {
        let raw = raw_message(None);
        let result = message_headers(&raw);
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn test_messages_sort_newest_first() {
        let mut messages: Vec<MailMessage> = [(1u32, 100i64), (2, 300), (3, 200)]
            .iter()
            .map(|&(seq, ts)| MailMessage {
                seq,
                subject: String::new(),
                sent_date: DateTime::<Utc>::from_timestamp(ts, 0).unwrap(),
                raw: Vec::new(),
            })
            .collect();
        messages.sort_by(|a, b| b.sent_date.cmp(&a.sent_date));
        let order: Vec<u32> = messages.iter().map(|m| m.seq).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }
}
