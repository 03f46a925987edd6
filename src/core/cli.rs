use clap::Parser;
use std::path::PathBuf;

/// Command-line surface. `-h` is taken by `--host`, so the automatic help
/// short flag is disabled and help is reachable via `--help` only.
#[derive(Parser, Debug)]
#[command(name = "mail2print")]
#[command(about = "Watch an IMAP mailbox and print or spool incoming attachments as PDF", long_about = None)]
#[command(disable_help_flag = true)]
pub struct Cli {
    /// IMAP server
    #[arg(short = 'h', long)]
    pub host: String,

    /// Username for the IMAP account
    #[arg(short = 'u', long)]
    pub username: String,

    /// Password for the IMAP account
    #[arg(short = 'P', long)]
    pub password: String,

    /// Printer to use. If not specified, files won't be printed
    #[arg(short = 'p', long)]
    pub printer: Option<String>,

    /// Folder where to save attachments
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_folder: Option<PathBuf>,

    /// Use IMAP-IDLE to wait for new messages
    #[arg(short = 'i', long)]
    pub idle_mode: bool,

    /// Delete mails after successful processing
    #[arg(short = 'd', long)]
    pub delete: bool,

    /// Use Libre/Open Office to convert Office documents
    #[arg(short = 'c', long)]
    pub convert_office_files: bool,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_minimal() {
        let cli = Cli::try_parse_from([
            "mail2print",
            "-h",
            "imap.example.com",
            "-u",
            "scanner",
            "-P",
            "secret",
        ]);
        assert!(cli.is_ok());
        let cli = cli.unwrap();
        assert_eq!(cli.host, "imap.example.com");
        assert_eq!(cli.username, "scanner");
        assert_eq!(cli.password, "secret");
        assert!(cli.printer.is_none());
        assert!(!cli.idle_mode);
        assert!(!cli.delete);
    }

    #[test]
    fn test_cli_long_flags() {
        let cli = Cli::try_parse_from([
            "mail2print",
            "--host",
            "imap.example.com",
            "--username",
            "scanner",
            "--password",
            "secret",
            "--printer",
            "office-laser",
            "--output-folder",
            "/var/spool/mail2print",
            "--idle-mode",
            "--delete",
            "--convert-office-files",
        ])
        .unwrap();
        assert_eq!(cli.printer.as_deref(), Some("office-laser"));
        assert_eq!(
            cli.output_folder,
            Some(PathBuf::from("/var/spool/mail2print"))
        );
        assert!(cli.idle_mode);
        assert!(cli.delete);
        assert!(cli.convert_office_files);
    }

    #[test]
    fn test_cli_missing_password_fails() {
        let cli = Cli::try_parse_from(["mail2print", "-h", "imap.example.com", "-u", "scanner"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_missing_host_fails() {
        let cli = Cli::try_parse_from(["mail2print", "-u", "scanner", "-P", "secret"]);
        assert!(cli.is_err());
    }
}
