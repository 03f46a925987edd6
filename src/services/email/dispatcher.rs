use crate::core::error::{Error, Result};
use crate::infrastructure::imap::MailMessage;
use crate::infrastructure::printer::PrintSink;
use crate::services::convert::ConverterRegistry;
use crate::services::email::attachment::{extract_attachments, AttachmentData};
use crate::services::email::spool::FileSpool;
use mail_parser::MessageParser;
use std::borrow::Cow;
use tracing::{debug, error, info, warn};

/// Per-message orchestrator: extracts attachments, drives the converter
/// registry and fans out to the spool and the printer.
pub struct Dispatcher {
    spool: Option<FileSpool>,
    printer: Option<Box<dyn PrintSink>>,
    registry: ConverterRegistry,
}

impl Dispatcher {
    pub fn new(
        spool: Option<FileSpool>,
        printer: Option<Box<dyn PrintSink>>,
        registry: ConverterRegistry,
    ) -> Self {
        Self {
            spool,
            printer,
            registry,
        }
    }

    /// Processes one message. Returns `true` iff at least one attachment
    /// was successfully spooled or printed; only such messages may be
    /// deleted afterwards. Per-attachment errors are logged and contained
    /// here.
    pub async fn process(&self, message: &MailMessage) -> Result<bool> {
        debug!("processing '{}'", message.subject);
        let parsed = MessageParser::default().parse(&message.raw).ok_or_else(|| {
            Error::Parse(format!("malformed MIME in message '{}'", message.subject))
        })?;
        let attachments = extract_attachments(&parsed);

        let mut processed = false;
        for attachment in &attachments {
            if let Some(spool) = &self.spool {
                match spool.write(&attachment.name, &attachment.data) {
                    Ok(path) => {
                        info!("attachment saved to {}", path.display());
                        processed = true;
                    }
                    Err(e) => error!("failed to spool {}: {}", attachment.name, e),
                }
            }
            if let Some(printer) = &self.printer {
                if self
                    .print_attachment(&message.subject, attachment, printer.as_ref())
                    .await
                {
                    processed = true;
                }
            }
        }
        Ok(processed)
    }

    /// PDF fast path or registry conversion, then submission to the sink.
    /// Returns whether the attachment counts as processed.
    async fn print_attachment(
        &self,
        subject: &str,
        attachment: &AttachmentData,
        printer: &dyn PrintSink,
    ) -> bool {
        let pdf: Cow<[u8]> = if is_pdf(attachment) {
            debug!(
                "printing {} with type {}",
                attachment.name, attachment.content_type
            );
            Cow::Borrowed(&attachment.data)
        } else {
            match self
                .registry
                .convert(
                    &attachment.data,
                    &attachment.content_type,
                    &attachment.name,
                    subject,
                )
                .await
            {
                Some(bytes) => Cow::Owned(bytes),
                None => {
                    info!(
                        "skipping unsupported {} with type {}",
                        attachment.name, attachment.content_type
                    );
                    return false;
                }
            }
        };

        match printer.print(&pdf).await {
            Ok(()) => true,
            Err(e) => {
                warn!("printing error for {}: {}", attachment.name, e);
                false
            }
        }
    }

    /// Shuts down the converter registry (each plugin at most once).
    pub async fn shutdown(&mut self) {
        self.registry.shutdown().await;
    }
}

/// PDF attachments bypass the converter registry entirely.
fn is_pdf(attachment: &AttachmentData) -> bool {
    attachment.name.to_lowercase().ends_with(".pdf")
        || attachment.content_type.contains("application/pdf")
}
