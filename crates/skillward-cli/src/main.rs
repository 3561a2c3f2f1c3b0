//! Skillward CLI entry point.
//!
//! Binary name: `skillward`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the command
//! handler. The process exits 0 when everything verified, 1 on unsafe
//! skills or a failed resolution, and 2 on unusable input.

mod cli;

use clap::Parser;
use clap_complete::generate;
use console::style;

use cli::{Cli, Commands, Output};
use skillward_core::report::ExitStatus;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,skillward=debug",
        _ => "trace",
    };
    if let Err(e) = skillward_observe::tracing_setup::init_tracing(cli.otel, filter) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let code = match run(cli).await {
        Ok(status) => status.code(),
        Err(e) => {
            eprintln!("{} {e:#}", style("error:").red().bold());
            ExitStatus::InputError.code()
        }
    };

    skillward_observe::tracing_setup::shutdown_tracing();
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<ExitStatus> {
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Scan { path } => cli::scan::scan(&path, config, cli.threshold, out).await,
        Commands::Verify { path } => cli::scan::verify(&path, config, cli.threshold, out).await,
        Commands::Trust { path } => cli::trust::trust(&path, config, out).await,
        Commands::Lock { path, output } => {
            cli::lock::lock(&path, output, config, cli.threshold, out).await
        }
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "skillward", &mut std::io::stdout());
            Ok(ExitStatus::Success)
        }
    }
}
