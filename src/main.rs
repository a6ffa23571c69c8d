//! nodecert: issue, renew and inspect node certificates.

use clap::Parser;
use tracing::debug;

use nodecert::cli::{execute_command, log_filter, Cli};
use nodecert::Config;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays clean on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();
    debug!("Config file: {}", cli.config.display());

    let config = Config::load(&cli.config)?;

    match execute_command(&config, cli.command) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
