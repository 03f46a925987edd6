use crate::core::config::Config;
use crate::core::error::Result;
use crate::infrastructure::imap::IdleOutcome;
use crate::services::email::dispatcher::Dispatcher;
use crate::services::email::mailbox::Mailbox;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Delay before retrying after the connection was lost in idle mode.
const REOPEN_DELAY: Duration = Duration::from_secs(10);

/// Top-level loop: drains unseen messages through the dispatcher, then (in
/// idle mode) parks in IMAP IDLE with a periodic keep-alive probe until the
/// server signals activity or the process is interrupted.
pub struct Supervisor<M: Mailbox> {
    config: Config,
    mailbox: M,
    dispatcher: Dispatcher,
}

impl<M: Mailbox> Supervisor<M> {
    pub fn new(config: Config, mailbox: M, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            mailbox,
            dispatcher,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                let _ = shutdown_tx.send(true);
            }
        });

        // The initial connect is fatal; later drops are reopened in-loop.
        let result = match self.mailbox.connect().await {
            Ok(()) => self.main_loop(&mut shutdown_rx).await,
            Err(e) => Err(e),
        };

        self.shutdown().await;
        result
    }

    async fn main_loop(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            if !self.mailbox.is_open() {
                info!("connection was lost, reestablishing...");
                if let Err(e) = self.mailbox.connect().await {
                    if !self.config.idle_mode {
                        return Err(e);
                    }
                    error!("reconnect failed: {}", e);
                    tokio::time::sleep(REOPEN_DELAY).await;
                    continue;
                }
            }

            if let Err(e) = self.process_pass().await {
                // A pass-level failure is a transport problem; drop the
                // session so the next iteration reopens it.
                error!("processing pass failed: {}", e);
                self.mailbox.close().await;
                if !self.config.idle_mode {
                    return Err(e);
                }
                continue;
            }

            if !self.config.idle_mode {
                return Ok(());
            }

            info!("waiting for new messages (IDLE)...");
            loop {
                match self.mailbox.idle_wait(shutdown).await {
                    IdleOutcome::Shutdown => return Ok(()),
                    IdleOutcome::NewActivity => break,
                    IdleOutcome::KeepAlive => {
                        debug!("checking if connection is alive...");
                        if let Err(e) = self.mailbox.keep_alive_probe().await {
                            error!("keep-alive probe failed: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// One PROCESS pass: every unseen message is dispatched exactly once,
    /// newest first. Messages with at least one successful spool or print
    /// are flagged deleted when `-d` is set, and the pass ends with an
    /// EXPUNGE if anything was flagged.
    async fn process_pass(&mut self) -> Result<()> {
        let messages = self.mailbox.fetch_unseen().await?;

        let mut any_deleted = false;
        for message in &messages {
            let processed = match self.dispatcher.process(message).await {
                Ok(processed) => processed,
                Err(e) => {
                    error!("failed to process '{}': {}", message.subject, e);
                    false
                }
            };

            // Bodies are fetched with BODY.PEEK[], so the seen flag only
            // lands once the message has actually been through the
            // dispatcher.
            if let Err(e) = self.mailbox.mark_seen(message.seq).await {
                error!("failed to mark '{}' seen: {}", message.subject, e);
            }

            if processed && self.config.delete_mails {
                match self.mailbox.mark_deleted(message.seq).await {
                    Ok(()) => any_deleted = true,
                    Err(e) => error!("failed to flag '{}' for deletion: {}", message.subject, e),
                }
            }
        }

        if any_deleted {
            if let Err(e) = self.mailbox.expunge().await {
                error!("expunge failed: {}", e);
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.dispatcher.shutdown().await;
        self.mailbox.close().await;
        info!("shutdown complete");
    }
}
