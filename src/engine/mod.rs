//! Measurement engine -- ranking, probing, and throughput sampling.

pub mod download;
pub mod geo;
pub mod latency;

pub use download::{measure_download, measure_with_workers};
pub use geo::{closest_servers, haversine_km, GeoPoint};
pub use latency::{pick_best_server, ProbeOutcome};
