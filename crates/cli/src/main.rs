mod args;
mod output;
mod runner;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use args::{Cli, Commands};
use runner::{run_analyze, run_mission};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Mission {
            target,
            timeout,
            preset,
            config,
            output_format,
        } => {
            run_mission(target, timeout, preset, config, output_format).await?;
        }
        Commands::Analyze {
            text,
            domain,
            hidden,
            element,
        } => {
            run_analyze(text, domain, hidden, element)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, json: bool) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    // Reports go to stdout; logs stay on stderr.
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
