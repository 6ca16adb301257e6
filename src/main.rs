//! beacon CLI entry point.

use beacon::cli::commands;
use beacon::cli::{Cli, Commands, IssuesCommands};
use beacon::error::Error;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("beacon=info"),
            2 => EnvFilter::new("beacon=debug"),
            _ => EnvFilter::new("beacon=trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

async fn run(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Issues { command } => match command {
            IssuesCommands::List(args) => commands::issues::execute(cli, args).await,
        },
        Commands::Login { token } => commands::auth::login(cli, token.as_deref()),
        Commands::Logout => commands::auth::logout(cli),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
