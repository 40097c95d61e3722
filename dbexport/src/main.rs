//! MySQL logical export tool.
//!
//! Connects to a MySQL or MariaDB server, reads its schema, grant and user
//! catalogs, and writes a directory that recreates them on another server:
//! a users script, one dump file per schema, and an import script.
//!
//! # Security Guarantees
//! - Read-only catalog operations only
//! - The administrative password is never logged or passed on a command line
//! - Stored credential hashes are copied verbatim, never cracked or re-hashed

mod cli;

use clap::{CommandFactory, Parser, error::ErrorKind};
use cli::Cli;
use dbexport_core::{
    Credentials, ExportError, ExportOrchestrator, MySqlCatalog, Result, logging::init_logging,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Conventional exit status after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(output_dir) = cli.resolve_output_dir(std::io::stdout().is_terminal()) else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "--output-dir is required when stdout is not a terminal",
            )
            .exit();
    };

    if let Err(e) = init_logging(cli.log_level) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&cli, output_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ExportError::Cancelled) => {
            warn!("Export cancelled; files already written were left in place");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!("Export failed: {}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                debug!("Caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, output_dir: PathBuf) -> Result<()> {
    let credentials = Credentials::new(cli.user.clone(), resolve_password(cli)?);
    let connection = cli.connection_config();
    let options = cli.export_options(output_dir);

    info!("Starting export from {}", connection);

    let catalog = MySqlCatalog::connect(connection.clone(), &credentials)?;
    // Checks options and the output directory before the server is contacted
    let mut orchestrator =
        ExportOrchestrator::for_server(&catalog, &connection, credentials, &options)?;
    catalog.verify().await?;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupts(cancel.clone()));

    let result = orchestrator.run(&cancel).await;
    catalog.close().await;

    let summary = result?;
    info!(
        "✓ Wrote {} files ({} schemas, {} principals)",
        summary.files.len(),
        summary.schemas,
        summary.principals
    );
    Ok(())
}

/// Cancels the run on the first Ctrl-C and exits on the second.
async fn watch_interrupts(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupt received; stopping after the schemas in progress (Ctrl-C again to abort)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(i32::from(EXIT_INTERRUPTED));
    }
}

fn resolve_password(cli: &Cli) -> Result<Option<String>> {
    if cli.ask_password {
        let password = rpassword::prompt_password(format!("Password for {}: ", cli.user))
            .map_err(|e| ExportError::io("Failed to read password", e))?;
        return Ok(Some(password));
    }
    Ok(cli.password.clone())
}
