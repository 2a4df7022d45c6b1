mod cli;
mod commands;
mod config;
mod error;
mod notifier;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, profile_wants_debug(&cli.global));

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `debug = true` on the active profile raises the default filter.
fn profile_wants_debug(global: &cli::GlobalOpts) -> bool {
    let cfg = config::load_config_or_default();
    let name = config::active_profile_name(global, &cfg);
    cfg.profiles.get(&name).is_some_and(|p| p.debug)
}

fn init_tracing(verbosity: u8, debug: bool) {
    let filter = match verbosity {
        0 if !debug => "warn",
        1 => "info",
        0 | 2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");
    match cli.command {
        Command::Listen(args) => commands::listen::handle(args, &cli.global).await,
        Command::History(args) => commands::history::handle(args, &cli.global),
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "trajeto", &mut std::io::stdout());
            Ok(())
        }
    }
}
