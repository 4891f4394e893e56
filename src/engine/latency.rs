//! Latency probing -- elect the best server by mean round-trip time.
//!
//! Every ranked candidate is probed concurrently from its own task. Each
//! task fetches the server's `latency.txt` a fixed number of times, averages
//! over the full probe count (failures contribute nothing but still divide),
//! and races to update a shared best slot. A candidate replaces the incumbent
//! only by a strictly lower mean, so among equals the first finisher stays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use url::Url;

use crate::fetch::Fetch;
use crate::servers::Server;
use crate::SpeedtestError;

/// Fixed number of latency fetches per candidate.
pub const PROBES_PER_SERVER: u32 = 5;

/// The result of probing one server.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// The probed server, with `ping_ms` filled in.
    pub server: Server,
    /// Mean round-trip time over [`PROBES_PER_SERVER`] attempts, in whole
    /// milliseconds.
    pub mean_ms: u64,
    /// How many of the attempts actually succeeded.
    pub successful_probes: u32,
}

impl ProbeOutcome {
    /// Whether this outcome displaces the incumbent best.
    ///
    /// Any successful outcome beats one with no successes; otherwise only a
    /// strictly lower mean wins. Ties keep the incumbent.
    fn beats(&self, incumbent: &ProbeOutcome) -> bool {
        if (self.successful_probes > 0) != (incumbent.successful_probes > 0) {
            return self.successful_probes > 0;
        }
        self.mean_ms < incumbent.mean_ms
    }
}

/// Derive the latency probe URL for a server: the directory URL with its
/// whole path replaced by `/latency.txt`.
pub fn latency_url(server: &Server) -> Result<String, SpeedtestError> {
    let mut url = Url::parse(&server.url).map_err(|_| SpeedtestError::BadServerUrl {
        url: server.url.clone(),
    })?;
    url.set_path("/latency.txt");
    Ok(url.into())
}

/// Probe one server [`PROBES_PER_SERVER`] times and average.
async fn probe_server(fetcher: &dyn Fetch, server: &Server, url: &str) -> ProbeOutcome {
    let mut total = Duration::ZERO;
    let mut successful_probes = 0u32;

    for attempt in 1..=PROBES_PER_SERVER {
        match fetcher.fetch(url).await {
            Ok(response) => {
                total += response.elapsed;
                successful_probes += 1;
            }
            Err(error) => {
                warn!(server = %server.name, attempt, error = %error, "latency probe failed");
            }
        }
    }

    // Average over the full probe count, truncating to whole milliseconds.
    let mean_ms = (total.as_millis() as u64) / u64::from(PROBES_PER_SERVER);
    debug!(server = %server.name, mean_ms, successful_probes, "latency probes complete");

    let mut server = server.clone();
    server.ping_ms = Some(mean_ms);
    ProbeOutcome {
        server,
        mean_ms,
        successful_probes,
    }
}

/// Probe every candidate concurrently and elect the best.
///
/// Probe URLs are derived up front so a malformed server URL fails the run
/// before any traffic is sent. The election always produces an outcome, even
/// when every probe of every candidate failed; callers decide whether an
/// all-failure winner is usable.
pub async fn pick_best_server(
    fetcher: Arc<dyn Fetch>,
    candidates: Vec<Server>,
) -> Result<ProbeOutcome> {
    if candidates.is_empty() {
        return Err(SpeedtestError::EmptyServerList.into());
    }

    let targets: Vec<(Server, String)> = candidates
        .into_iter()
        .map(|server| {
            let url = latency_url(&server)?;
            Ok((server, url))
        })
        .collect::<Result<_, SpeedtestError>>()?;

    let best: Arc<Mutex<Option<ProbeOutcome>>> = Arc::new(Mutex::new(None));

    let mut handles = Vec::with_capacity(targets.len());
    for (server, url) in targets {
        let fetcher = Arc::clone(&fetcher);
        let best = Arc::clone(&best);
        handles.push(tokio::spawn(async move {
            let outcome = probe_server(fetcher.as_ref(), &server, &url).await;
            let mut slot = best.lock().unwrap();
            if slot.as_ref().map_or(true, |incumbent| outcome.beats(incumbent)) {
                *slot = Some(outcome);
            }
        }));
    }

    for handle in handles {
        handle.await.context("latency probe task panicked")?;
    }

    let winner = best.lock().unwrap().take();
    winner.context("no probe outcome recorded")
}
