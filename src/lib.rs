//! speedprobe -- command-line internet bandwidth testing against speedtest.net.
//!
//! This crate provides the core library for the measurement pipeline:
//! client configuration, server directory ranking, latency-based server
//! election, and download throughput sampling.

pub mod config;
pub mod engine;
pub mod fetch;
pub mod servers;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ClientInfo;
use crate::engine::{closest_servers, haversine_km, measure_download, pick_best_server};
use crate::fetch::Fetch;
use crate::servers::{find_by_id, parse_server_list, Server};

/// Endpoint that reports the caller's identity and location.
pub const DEFAULT_CONFIG_URL: &str = "http://www.speedtest.net/speedtest-config.php";

/// Endpoint that lists candidate test servers.
pub const DEFAULT_SERVERS_URL: &str = "http://www.speedtest.net/speedtest-servers.php";

/// Errors the measurement pipeline can raise on its own, as opposed to
/// transport errors surfaced by the fetcher.
#[derive(Debug, Error)]
pub enum SpeedtestError {
    #[error("configuration response contained no client record")]
    MissingClientRecord,

    #[error("server directory contained no servers")]
    EmptyServerList,

    #[error("no server with id {id} in the directory")]
    UnknownServerId { id: String },

    #[error("server has an unusable url: {url}")]
    BadServerUrl { url: String },

    #[error("every latency probe failed; cannot pick a server")]
    AllProbesFailed,

    #[error("no download completed; cannot compute a rate")]
    NoSuccessfulDownloads,

    #[error("malformed xml document")]
    Xml(#[from] quick_xml::de::DeError),
}

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Suppress progress narration on stdout.
    pub quiet: bool,
    /// Test against this directory id instead of electing a server.
    pub server_id: Option<String>,
    pub config_url: String,
    pub servers_url: String,
    /// Per-request timeout; `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            server_id: None,
            config_url: DEFAULT_CONFIG_URL.to_string(),
            servers_url: DEFAULT_SERVERS_URL.to_string(),
            timeout: None,
        }
    }
}

/// The outcome of a full pipeline run.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub client: ClientInfo,
    pub server: Server,
    /// Mean latency of the elected server; `None` when the election was
    /// bypassed with an explicit server id.
    pub ping_ms: Option<u64>,
    pub download_mbps: f64,
}

/// Run the whole measurement pipeline: configuration, directory, server
/// election (or explicit pick), then the download test.
pub async fn run(fetcher: Arc<dyn Fetch>, options: &RunOptions) -> Result<TestReport> {
    // 1. Who and where the caller is.
    if !options.quiet {
        println!("Retrieving speedtest.net configuration...");
    }
    let client = fetch_client(fetcher.as_ref(), options).await?;
    if !options.quiet {
        println!("Testing from {} ({})...", client.isp, client.ip);
    }

    // 2. The candidate pool.
    if !options.quiet {
        println!("Retrieving speedtest.net server list ...");
    }
    let servers = fetch_servers(fetcher.as_ref(), options).await?;

    // 3. Pick a server: explicit id bypasses ranking and probing.
    let (server, ping_ms) = match &options.server_id {
        Some(id) => {
            let mut server = find_by_id(servers, id)?;
            server.distance_km = haversine_km(client.location, server.location());
            debug!(id = %server.id, name = %server.name, "using explicitly chosen server");
            (server, None)
        }
        None => {
            if !options.quiet {
                println!("Selecting best server based on ping...");
            }
            let ranked = closest_servers(client.location, servers);
            let outcome = pick_best_server(Arc::clone(&fetcher), ranked).await?;
            if outcome.successful_probes == 0 {
                return Err(SpeedtestError::AllProbesFailed.into());
            }
            info!(
                id = %outcome.server.id,
                name = %outcome.server.name,
                mean_ms = outcome.mean_ms,
                "elected best server"
            );
            (outcome.server, Some(outcome.mean_ms))
        }
    };

    if !options.quiet {
        match ping_ms {
            Some(ms) => println!(
                "Hosted by {} ({}) [{:.2} km] {} ms",
                server.sponsor, server.name, server.distance_km, ms
            ),
            None => println!(
                "Hosted by {} ({}) [{:.2} km]",
                server.sponsor, server.name, server.distance_km
            ),
        }
    }

    // 4. The download test itself.
    if !options.quiet {
        print!("Testing download speed");
        let _ = std::io::stdout().flush();
    }
    let download_mbps = measure_download(fetcher, &server, options.quiet).await?;
    if !options.quiet {
        println!();
    }

    Ok(TestReport {
        client,
        server,
        ping_ms,
        download_mbps,
    })
}

/// Fetch and rank the full server directory without probing, for listing.
pub async fn server_listing(fetcher: &dyn Fetch, options: &RunOptions) -> Result<Vec<Server>> {
    let client = fetch_client(fetcher, options).await?;
    let mut servers = fetch_servers(fetcher, options).await?;
    for server in &mut servers {
        server.distance_km = haversine_km(client.location, server.location());
    }
    servers.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(servers)
}

async fn fetch_client(fetcher: &dyn Fetch, options: &RunOptions) -> Result<ClientInfo> {
    let response = fetcher
        .fetch(&options.config_url)
        .await
        .context("failed to retrieve the speedtest configuration")?;
    let client = config::parse_client_config(&response.body)?;
    info!(ip = %client.ip, isp = %client.isp, "resolved client identity");
    Ok(client)
}

async fn fetch_servers(fetcher: &dyn Fetch, options: &RunOptions) -> Result<Vec<Server>> {
    let response = fetcher
        .fetch(&options.servers_url)
        .await
        .context("failed to retrieve the speedtest server list")?;
    let servers = parse_server_list(&response.body)?;
    debug!(count = servers.len(), "loaded server directory");
    Ok(servers)
}
