pub mod check;
pub mod completions;
pub mod tree;

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// defpipe - Definition file parser and worker pipeline
#[derive(Parser, Debug)]
#[command(name = "defpipe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the definition tree of files without running workers
    Tree(tree::TreeArgs),

    /// Parse a project and dispatch its definitions to the manifest's workers
    Check(check::CheckArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Log filter from a `RUST_LOG`-style spec, defaulting to `warn`. Each `-v`
/// sets a higher global level on top of it.
pub fn log_filter(verbose: u8, env: Option<&str>) -> EnvFilter {
    let base = env
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    match verbose {
        0 => base,
        1 => base.add_directive(Level::INFO.into()),
        2 => base.add_directive(Level::DEBUG.into()),
        _ => base.add_directive(Level::TRACE.into()),
    }
}
