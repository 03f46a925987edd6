use mail_parser::{Message, MimeHeaders};
use std::path::Path;

/// One attachment, fully buffered. The bytes are materialised once so the
/// spool and print paths can both read them.
#[derive(Debug, Clone)]
pub struct AttachmentData {
    pub name: String,
    /// Lower-cased for matching.
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Extracts attachments from a parsed message, in part order. Parts
/// without a usable filename keep the name `unknown`.
pub fn extract_attachments(parsed: &Message) -> Vec<AttachmentData> {
    let mut attachments = Vec::new();

    for part in parsed.attachments() {
        let content_type = part
            .content_type()
            .map(|ct| {
                if let Some(subtype) = ct.subtype() {
                    format!("{}/{}", ct.c_type, subtype)
                } else {
                    ct.c_type.to_string()
                }
            })
            .unwrap_or_else(|| "application/octet-stream".to_string())
            .to_lowercase();

        attachments.push(AttachmentData {
            name: sanitize_name(part.attachment_name().unwrap_or("unknown")),
            content_type,
            data: part.contents().to_vec(),
        });
    }

    attachments
}

/// Keeps only the final path component of a mail-supplied filename, so a
/// hostile name cannot escape the spool directory.
fn sanitize_name(raw: &str) -> String {
    Path::new(raw)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
