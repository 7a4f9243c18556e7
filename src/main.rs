use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

use defpipe::cli::{log_filter, Cli, Commands};
use defpipe::output::Printer;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, env.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let printer = Printer::new();
    match cli.command {
        Commands::Tree(args) => defpipe::cli::tree::run(args, &printer)?,
        Commands::Check(args) => defpipe::cli::check::run(args, &printer)?,
        Commands::Completions(args) => defpipe::cli::completions::run(args)?,
    }

    Ok(())
}
