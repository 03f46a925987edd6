use crate::core::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Sink for finished PDF jobs. Print errors are reported to the caller but
/// are never fatal to the agent.
#[async_trait]
pub trait PrintSink: Send + Sync {
    async fn print(&self, pdf: &[u8]) -> Result<()>;
}

/// Submits jobs to the host print system through CUPS `lp`.
pub struct CupsPrinter {
    name: String,
}

impl CupsPrinter {
    /// Resolves a printer by exact name. An unknown name is a configuration
    /// error surfaced at startup, not at runtime.
    pub async fn lookup(name: &str) -> Result<Self> {
        let status = Command::new("lpstat")
            .arg("-p")
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Config(format!("cannot query print system (lpstat): {}", e)))?;
        if !status.success() {
            return Err(Error::Config(format!("printer {} not found", name)));
        }
        Ok(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl PrintSink for CupsPrinter {
    async fn print(&self, pdf: &[u8]) -> Result<()> {
        debug!("submitting {} bytes to printer {}", pdf.len(), self.name);

        let mut child = Command::new("lp")
            .arg("-d")
            .arg(&self.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Print(format!("failed to spawn lp: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Print("lp stdin not captured".into()))?;
        stdin
            .write_all(pdf)
            .await
            .map_err(|e| Error::Print(format!("failed to stream job to lp: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Print(format!("failed to wait for lp: {}", e)))?;
        if !output.status.success() {
            return Err(Error::Print(format!(
                "lp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
