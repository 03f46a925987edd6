use thiserror::Error;

/// Application error taxonomy. Per-attachment errors (`Convert`, `Print`,
/// `Spool`) never escape the dispatcher; `Transport` errors make the
/// supervisor reopen the mailbox.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IMAP transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("conversion error: {0}")]
    Convert(String),

    #[error("print error: {0}")]
    Print(String),

    #[error("spool error: {0}")]
    Spool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
