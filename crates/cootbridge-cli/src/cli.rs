use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The cootbridge developers",
    version,
    about = "cootbridge CLI - Runs the cootbridge engine worker over standard input and output, one JSON message per line.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a worker and answer JSON messages read line by line from standard input.
    Serve(ServeArgs),
    /// Validate and list the registered shims and result type tags.
    Registry,
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Path to a worker configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON fixture with canned results and failures for the in-memory engine.
    #[arg(short, long, value_name = "PATH")]
    pub fixture: Option<PathBuf>,

    /// Override the map sampling rate applied at startup.
    #[arg(long, value_name = "FLOAT")]
    pub map_sampling_rate: Option<f64>,

    /// Override the size ceiling for oriented instances in instanced meshes.
    #[arg(long, value_name = "FLOAT")]
    pub bond_length_ceiling: Option<f32>,

    /// Journal native handle activity and log a per-message summary at debug level.
    #[arg(long)]
    pub heap_journal: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S engine.map-sampling-rate=2.0
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
