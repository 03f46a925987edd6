use clap::Parser;
use mail2print::core::cli::Cli;
use mail2print::core::config::Config;
use mail2print::core::error::{Error, Result};
use mail2print::infrastructure::imap::MailboxSession;
use mail2print::infrastructure::logging::init_logging;
use mail2print::infrastructure::printer::{CupsPrinter, PrintSink};
use mail2print::services::convert::{load_plugins, ConverterRegistry};
use mail2print::services::email::dispatcher::Dispatcher;
use mail2print::services::email::spool::FileSpool;
use mail2print::services::email::supervisor::Supervisor;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        error!("fatal: {}", e);
        let code = match e {
            Error::Config(_) => 1,
            _ => 2,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging("mail2print")?;
    let config = Config::from_cli(cli)?;

    let printer: Option<Box<dyn PrintSink>> = match &config.printer {
        Some(name) => Some(Box::new(CupsPrinter::lookup(name).await?)),
        None => None,
    };
    let spool = config.output_dir.clone().map(FileSpool::new);
    let registry = ConverterRegistry::new(load_plugins(&config));
    let dispatcher = Dispatcher::new(spool, printer, registry);
    let mailbox = MailboxSession::new(&config);

    Supervisor::new(config, mailbox, dispatcher).run().await
}
