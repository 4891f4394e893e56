//! Download measurement -- a bounded worker pool over a shared work queue.
//!
//! One producer task feeds image URLs through a rendezvous channel to a
//! fixed pool of worker tasks. Workers pull, fetch, and fold byte counts and
//! fetcher-reported elapsed time into shared totals. The final figure is
//! cumulative bytes over cumulative elapsed, so it is independent of how the
//! work was spread across workers.

use std::io::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::Fetch;
use crate::servers::Server;
use crate::SpeedtestError;

/// Image side lengths probed during the download test, smallest first.
const DOWNLOAD_SIZES: [u32; 10] = [350, 500, 750, 1000, 1500, 2000, 2500, 3000, 3500, 4000];

/// How many times each size is fetched.
const DOWNLOADS_PER_SIZE: u32 = 4;

/// Size of the worker pool.
const DOWNLOAD_WORKERS: usize = 6;

/// Conversion factor from bytes per second to megabits per second.
const BYTES_PER_MEGABIT: f64 = 131_072.0;

/// Build the full download workload for a server: every payload size in
/// ascending order, each repeated four times.
///
/// Each URL is the server's directory URL with its final path segment
/// replaced by `random{size}x{size}.jpg`.
pub fn download_urls(server: &Server) -> Result<Vec<String>, SpeedtestError> {
    let base = Url::parse(&server.url).map_err(|_| SpeedtestError::BadServerUrl {
        url: server.url.clone(),
    })?;
    let parent = base
        .path()
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");

    let mut urls = Vec::with_capacity(DOWNLOAD_SIZES.len() * DOWNLOADS_PER_SIZE as usize);
    for size in DOWNLOAD_SIZES {
        let mut url = base.clone();
        url.set_path(&format!("{parent}/random{size}x{size}.jpg"));
        for _ in 0..DOWNLOADS_PER_SIZE {
            urls.push(url.as_str().to_string());
        }
    }
    Ok(urls)
}

#[derive(Debug, Default)]
struct Totals {
    bytes: u64,
    elapsed: Duration,
    downloads: u32,
}

/// Run the download test against `server` and return the rate in Mbit/s.
pub async fn measure_download(
    fetcher: Arc<dyn Fetch>,
    server: &Server,
    quiet: bool,
) -> Result<f64> {
    measure_with_workers(fetcher, server, quiet, DOWNLOAD_WORKERS).await
}

/// [`measure_download`] with an explicit pool size.
pub async fn measure_with_workers(
    fetcher: Arc<dyn Fetch>,
    server: &Server,
    quiet: bool,
    workers: usize,
) -> Result<f64> {
    ensure!(workers > 0, "download worker pool must not be empty");

    let urls = download_urls(server)?;
    let totals = Arc::new(Mutex::new(Totals::default()));

    // Rendezvous-sized channel: the producer stays one URL ahead of the
    // pool, and workers share the receiving end behind an async mutex.
    let (tx, rx) = mpsc::channel::<String>(1);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    let producer = tokio::spawn(async move {
        for url in urls {
            if tx.send(url).await.is_err() {
                break;
            }
        }
    });

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let fetcher = Arc::clone(&fetcher);
        let rx = Arc::clone(&rx);
        let totals = Arc::clone(&totals);
        handles.push(tokio::spawn(async move {
            loop {
                let next = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };
                let Some(url) = next else { break };

                if !quiet {
                    print!(".");
                    let _ = std::io::stdout().flush();
                }

                match fetcher.fetch(&url).await {
                    Ok(response) => {
                        let mut totals = totals.lock().unwrap();
                        totals.bytes += response.body.len() as u64;
                        totals.elapsed += response.elapsed;
                        totals.downloads += 1;
                    }
                    Err(error) => {
                        warn!(url = %url, error = %error, "download failed");
                    }
                }
            }
        }));
    }

    producer.await.context("download producer task panicked")?;
    for handle in handles {
        handle.await.context("download worker task panicked")?;
    }

    let totals = totals.lock().unwrap();
    if totals.downloads == 0 || totals.elapsed.is_zero() {
        return Err(SpeedtestError::NoSuccessfulDownloads.into());
    }
    debug!(
        bytes = totals.bytes,
        elapsed_ms = totals.elapsed.as_millis() as u64,
        downloads = totals.downloads,
        "download test complete"
    );
    Ok(rate_mbps(totals.bytes, totals.elapsed))
}

fn rate_mbps(bytes: u64, elapsed: Duration) -> f64 {
    (bytes as f64 / elapsed.as_secs_f64()) / BYTES_PER_MEGABIT
}
