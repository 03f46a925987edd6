use super::ConverterPlugin;
use crate::core::error::{Error, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

const OFFICE_EXTENSIONS: &[&str] = &[
    ".doc", ".docx", ".odt", ".ott", ".xls", ".xlsx", ".ods", ".ppt", ".pptx", ".odp", ".rtf",
];

const OFFICE_CONTENT_TYPES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument",
    "application/vnd.oasis.opendocument",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
    "application/rtf",
];

/// Converts office documents to PDF by running a headless LibreOffice /
/// OpenOffice in a scratch directory.
pub struct OfficeConverter;

impl OfficeConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OfficeConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConverterPlugin for OfficeConverter {
    fn name(&self) -> &str {
        "office-converter"
    }

    fn can_convert(&self, content_type: &str, filename: &str, _subject: &str) -> bool {
        let name = filename.to_lowercase();
        OFFICE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
            || OFFICE_CONTENT_TYPES.iter().any(|ct| content_type.contains(ct))
    }

    async fn convert_to_pdf(
        &self,
        input: &[u8],
        _content_type: &str,
        filename: &str,
        _subject: &str,
    ) -> Result<Vec<u8>> {
        let workdir = tempfile::tempdir()?;
        let source = workdir.path().join(filename);
        tokio::fs::write(&source, input).await?;

        debug!("converting {} via soffice", filename);
        let output = Command::new("soffice")
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(workdir.path())
            .arg(&source)
            .output()
            .await
            .map_err(|e| Error::Convert(format!("failed to run soffice: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Convert(format!(
                "soffice exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pdf_path = source.with_extension("pdf");
        tokio::fs::read(&pdf_path)
            .await
            .map_err(|_| Error::Convert(format!("soffice produced no output for {}", filename)))
    }
}
