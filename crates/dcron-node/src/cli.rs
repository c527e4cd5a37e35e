//! Command-line front end.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "dcron-node", version, about = "A distributed cron node")]
pub struct Cli {
    /// Directory containing `default.toml`/`{environment}.toml`/`local.toml`.
    #[arg(long, default_value = "./config")]
    pub config_dir: String,

    /// Overrides the node's configured name.
    #[arg(long)]
    pub name: Option<String>,

    /// Overrides the `RUST_LOG`/default tracing filter.
    #[arg(long)]
    pub log_level: Option<String>,
}
