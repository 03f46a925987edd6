use crate::core::cli::Cli;
use crate::core::error::{Error, Result};
use std::path::PathBuf;

/// Immutable runtime configuration, built once from the CLI and validated
/// before anything connects.
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub username: String,
    pub password: String,
    pub printer: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub idle_mode: bool,
    pub delete_mails: bool,
    pub convert_office_files: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let config = Self {
            host: cli.host,
            username: cli.username,
            password: cli.password,
            printer: cli.printer,
            output_dir: cli.output_folder,
            idle_mode: cli.idle_mode,
            delete_mails: cli.delete,
            convert_office_files: cli.convert_office_files,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.printer.is_none() && self.output_dir.is_none() {
            return Err(Error::Config(
                "nothing to do: specify --printer and/or --output-folder".into(),
            ));
        }
        if let Some(dir) = &self.output_dir {
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "folder {} does not exist or is not a directory",
                    dir.display()
                )));
            }
            // Probe writability up front instead of failing on the first mail.
            tempfile::tempfile_in(dir).map_err(|e| {
                Error::Config(format!("folder {} is not writable: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            host: "imap.example.com".into(),
            username: "scanner".into(),
            password: "secret".into(),
            printer: None,
            output_dir: None,
            idle_mode: false,
            delete_mails: false,
            convert_office_files: false,
        }
    }

    #[test]
    fn test_rejects_config_without_any_sink() {
        let config = base_config();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_printer_only_is_enough() {
        let config = Config {
            printer: Some("office-laser".into()),
            ..base_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_accepts_writable_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_dir: Some(dir.path().to_path_buf()),
            ..base_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_output_dir() {
        let config = Config {
            output_dir: Some(PathBuf::from("/nonexistent/mail2print-out")),
            ..base_config()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
