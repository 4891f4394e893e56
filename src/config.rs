//! Client configuration decode -- who and where the caller is.
//!
//! The configuration endpoint returns an XML document whose `<client>`
//! element carries the caller's public IP, ISP name, and geolocation. Only
//! those fields are mapped; the rest of the document (license keys, upload
//! ratios, server blacklists) is ignored by serde.

use serde::Deserialize;

use crate::engine::geo::GeoPoint;
use crate::SpeedtestError;

/// The caller's identity as reported by the configuration endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInfo {
    pub ip: String,
    pub isp: String,
    pub location: GeoPoint,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "client", default)]
    clients: Vec<ClientRecord>,
}

#[derive(Debug, Deserialize)]
struct ClientRecord {
    #[serde(rename = "@ip")]
    ip: String,
    #[serde(rename = "@isp")]
    isp: String,
    #[serde(rename = "@lat")]
    lat: f64,
    #[serde(rename = "@lon")]
    lon: f64,
}

/// Decode the configuration document and extract the first client record.
pub fn parse_client_config(xml: &[u8]) -> Result<ClientInfo, SpeedtestError> {
    let document: ConfigDocument = quick_xml::de::from_reader(xml)?;
    let record = document
        .clients
        .into_iter()
        .next()
        .ok_or(SpeedtestError::MissingClientRecord)?;

    Ok(ClientInfo {
        ip: record.ip,
        isp: record.isp,
        location: GeoPoint::new(record.lat, record.lon),
    })
}
