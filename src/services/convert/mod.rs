pub mod office;

use crate::core::config::Config;
use crate::core::error::Result;
use async_trait::async_trait;
use tracing::{error, info};

/// Capability contract for a converter: turns one attachment format into
/// PDF bytes. Instantiated at most once per process.
#[async_trait]
pub trait ConverterPlugin: Send + Sync {
    /// Stable identifier for logging.
    fn name(&self) -> &str;

    /// Pure predicate; must not perform I/O.
    fn can_convert(&self, content_type: &str, filename: &str, subject: &str) -> bool;

    async fn convert_to_pdf(
        &self,
        input: &[u8],
        content_type: &str,
        filename: &str,
        subject: &str,
    ) -> Result<Vec<u8>>;

    /// Releases plugin resources. Idempotent.
    async fn shutdown(&self) {}
}

/// Explicit discovery step: builds the ordered plugin list for this
/// process. The office converter joins only when `-c` was passed.
pub fn load_plugins(config: &Config) -> Vec<Box<dyn ConverterPlugin>> {
    info!("loading plugins...");
    let mut plugins: Vec<Box<dyn ConverterPlugin>> = Vec::new();
    if config.convert_office_files {
        plugins.push(Box::new(office::OfficeConverter::new()));
    }
    plugins
}

/// Ordered list of converters. Selection is first-match in registration
/// order; converters are assumed authoritative for their claimed types, so
/// a failed conversion does NOT fall through to the next plugin. Silent
/// re-selection would mask configuration errors.
pub struct ConverterRegistry {
    plugins: Vec<Box<dyn ConverterPlugin>>,
    shut_down: bool,
}

impl ConverterRegistry {
    pub fn new(plugins: Vec<Box<dyn ConverterPlugin>>) -> Self {
        for plugin in &plugins {
            info!("plugin {} loaded", plugin.name());
        }
        Self {
            plugins,
            shut_down: false,
        }
    }

    /// First plugin in registration order whose `can_convert` claims the
    /// attachment.
    pub fn select(
        &self,
        content_type: &str,
        filename: &str,
        subject: &str,
    ) -> Option<&dyn ConverterPlugin> {
        self.plugins
            .iter()
            .find(|p| p.can_convert(content_type, filename, subject))
            .map(|p| p.as_ref())
    }

    /// Converts through the selected plugin. `None` means the attachment is
    /// unconvertible, either because no plugin claimed it or because the
    /// claiming plugin failed (the failure is logged here).
    pub async fn convert(
        &self,
        input: &[u8],
        content_type: &str,
        filename: &str,
        subject: &str,
    ) -> Option<Vec<u8>> {
        let plugin = self.select(content_type, filename, subject)?;
        info!("using {} to convert {}", plugin.name(), filename);
        match plugin
            .convert_to_pdf(input, content_type, filename, subject)
            .await
        {
            Ok(pdf) => Some(pdf),
            Err(e) => {
                error!("{} failed to convert {}: {}", plugin.name(), filename, e);
                None
            }
        }
    }

    /// Shuts every plugin down. Safe to call more than once; each plugin's
    /// shutdown runs at most once.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        for plugin in &self.plugins {
            plugin.shutdown().await;
        }
    }
}
