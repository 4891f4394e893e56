use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use speedprobe::fetch::{Fetch, HttpFetcher};
use speedprobe::RunOptions;

#[derive(Parser)]
#[command(
    name = "speedprobe",
    about = "Command line interface for testing internet bandwidth using speedtest.net",
    version,
    long_about = None,
    disable_help_flag = true
)]
struct Cli {
    /// Show this help message and exit
    #[arg(long)]
    help: bool,

    /// Generate and provide a URL to the speedtest.net share results image
    #[arg(long)]
    share: bool,

    /// Suppress verbose output, only show basic information
    #[arg(long)]
    simple: bool,

    /// Display a list of speedtest.net servers sorted by distance
    #[arg(long)]
    list: bool,

    /// Specify a server ID to test against
    #[arg(long, value_name = "ID")]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for test narration.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.help {
        Cli::command().print_help()?;
        process::exit(2);
    }
    if cli.share {
        tracing::warn!("--share is accepted for compatibility but result sharing is not performed");
    }

    let options = RunOptions {
        quiet: cli.simple,
        server_id: cli.server,
        ..RunOptions::default()
    };
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(options.timeout)?);

    if cli.list {
        let servers = speedprobe::server_listing(fetcher.as_ref(), &options).await?;
        for server in servers {
            println!(
                "{:>5}) {} ({}, {}) [{:.2} km]",
                server.id, server.sponsor, server.name, server.country, server.distance_km
            );
        }
        return Ok(());
    }

    let report = speedprobe::run(fetcher, &options).await?;
    println!("Download: {:.2} Mbit/s", report.download_mbps);

    Ok(())
}
