use clap::Parser;

use tapline::cli::{self, Cli, Command};
use tapline::logging::{self, LogConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = cli::load_cli_config(cli.config.as_deref())?;
    logging::init_logging(LogConfig::from_section(
        config.logging.format,
        &config.logging.level,
    ))?;

    match cli.command {
        // No subcommand or explicit `serve` both launch the admin server.
        None => cli::handle_serve(&config, None).await,
        Some(Command::Serve { bind }) => cli::handle_serve(&config, bind).await,

        Some(Command::Test {
            kind,
            url,
            method,
            headers,
            allow_private,
            timeout_ms,
        }) => {
            cli::handle_test(
                &config,
                kind,
                url,
                method,
                headers,
                allow_private,
                timeout_ms,
            )
            .await
        }

        Some(Command::Fetch { path, kind, plugin }) => {
            cli::handle_fetch(&config, &path, kind, plugin.as_deref()).await
        }

        Some(Command::CheckUrl { url, allow_private }) => cli::handle_check_url(&url, allow_private),
    }
}
