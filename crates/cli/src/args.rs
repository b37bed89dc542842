use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hive")]
#[command(version = "0.1.0")]
#[command(about = "Coordination core of a security-testing swarm", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one dry-run mission against a target. Ctrl-C ends it early.
    Mission {
        /// Target URL. Example: https://shop.example/api/order/7
        #[arg(short = 't', long, required = true)]
        target: String,

        /// Mission timeout in seconds (overrides preset and config file)
        #[arg(long)]
        timeout: Option<u64>,

        /// Preset: balanced, aggressive, stealth
        #[arg(long, default_value = "balanced", value_parser = ["balanced", "aggressive", "stealth"])]
        preset: String,

        /// TOML mission config; replaces the preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format: text, json, csv
        #[arg(short, long, default_value = "text")]
        output_format: String,
    },

    /// Score text, a domain and DOM hints; prints the verdict as JSON
    Analyze {
        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        domain: Option<String>,

        /// The element was reported hidden
        #[arg(long)]
        hidden: bool,

        /// Element description as JSON, e.g. '{"style":{"opacity":"0"}}'
        #[arg(long)]
        element: Option<String>,
    },
}
