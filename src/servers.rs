//! Server directory decode -- the candidate pool for every later stage.
//!
//! The directory endpoint returns XML with one or more `<servers>` groups,
//! each holding `<server/>` entries. All groups are flattened into a single
//! candidate pool; ranking decides what matters, not grouping.

use serde::Deserialize;

use crate::engine::geo::GeoPoint;
use crate::SpeedtestError;

/// One speedtest.net server entry.
///
/// `distance_km` and `ping_ms` are never present in the directory document;
/// the ranking and probing stages fill them in.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@sponsor")]
    pub sponsor: String,
    #[serde(rename = "@country")]
    pub country: String,
    #[serde(rename = "@lat")]
    pub lat: f64,
    #[serde(rename = "@lon")]
    pub lon: f64,
    #[serde(rename = "@url")]
    pub url: String,
    #[serde(rename = "@host", default)]
    pub host: String,
    #[serde(skip)]
    pub distance_km: f64,
    #[serde(skip)]
    pub ping_ms: Option<u64>,
}

impl Server {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Debug, Deserialize)]
struct ServerDirectory {
    #[serde(rename = "servers", default)]
    groups: Vec<ServerGroup>,
}

#[derive(Debug, Deserialize)]
struct ServerGroup {
    #[serde(rename = "server", default)]
    servers: Vec<Server>,
}

/// Decode the server directory and flatten every group into one pool.
pub fn parse_server_list(xml: &[u8]) -> Result<Vec<Server>, SpeedtestError> {
    let directory: ServerDirectory = quick_xml::de::from_reader(xml)?;
    let servers: Vec<Server> = directory
        .groups
        .into_iter()
        .flat_map(|group| group.servers)
        .collect();

    if servers.is_empty() {
        return Err(SpeedtestError::EmptyServerList);
    }
    Ok(servers)
}

/// Pick the server with the given directory id out of the pool.
pub fn find_by_id(servers: Vec<Server>, id: &str) -> Result<Server, SpeedtestError> {
    servers
        .into_iter()
        .find(|server| server.id == id)
        .ok_or_else(|| SpeedtestError::UnknownServerId { id: id.to_string() })
}
