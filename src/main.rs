//! tfwrap - main entry point
//!
//! Parses the CLI surface, wires up the production runner and fetcher, and
//! forwards Terraform's exit code. Failures before dispatch exit with a
//! fixed code distinct from anything Terraform produces.

use clap::{CommandFactory, FromArgMatches};
use tracing_subscriber::EnvFilter;

use tfwrap::installer::HttpFetcher;
use tfwrap::runner::SystemRunner;
use tfwrap::{BuildInfo, Cli, Orchestrator, PRE_DISPATCH_EXIT_CODE};

fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: option_env!("TFWRAP_COMMIT").unwrap_or("HEAD").to_string(),
        date: option_env!("TFWRAP_BUILD_DATE")
            .unwrap_or("unknown")
            .to_string(),
    }
}

/// Diagnostics go to stderr so Terraform's stdout stays clean for piping.
fn init_tracing(debug: bool) {
    let default_filter = if debug { "tfwrap=debug" } else { "tfwrap=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let build_info = build_info();
    let matches = Cli::command()
        .version(build_info.full())
        .get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_tracing(cli.debug);

    let orchestrator = Orchestrator::new(SystemRunner, HttpFetcher::new(), build_info);
    match orchestrator.run(&cli.into_invocation()) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("tfwrap: {err}");
            std::process::exit(PRE_DISPATCH_EXIT_CODE);
        }
    }
}
