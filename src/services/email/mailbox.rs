use crate::core::error::Result;
use crate::infrastructure::imap::{IdleOutcome, MailMessage};
use async_trait::async_trait;
use tokio::sync::watch;

/// Seam over the IMAP session, so the supervisor can be driven against a
/// fake mailbox in tests.
#[async_trait]
pub trait Mailbox: Send {
    fn is_open(&self) -> bool;
    async fn connect(&mut self) -> Result<()>;
    /// Every message lacking the SEEN flag, newest first.
    async fn fetch_unseen(&mut self) -> Result<Vec<MailMessage>>;
    /// Blocks until server activity, keep-alive expiry or shutdown.
    async fn idle_wait(&mut self, shutdown: &mut watch::Receiver<bool>) -> IdleOutcome;
    async fn keep_alive_probe(&mut self) -> Result<()>;
    async fn mark_seen(&mut self, seq: u32) -> Result<()>;
    async fn mark_deleted(&mut self, seq: u32) -> Result<()>;
    async fn expunge(&mut self) -> Result<()>;
    async fn close(&mut self);
}
