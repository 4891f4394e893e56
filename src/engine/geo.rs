//! Great-circle distance ranking of candidate servers.
//!
//! Haversine on a spherical Earth (R = 6371 km), feeding a bounded top-k
//! selection. The selection is keyed by server identity with distance as a
//! comparison field only, so two servers at exactly the same distance never
//! collapse into one entry.

use crate::servers::Server;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// How many nearby servers survive the ranking stage.
pub const CLOSEST_SERVER_COUNT: usize = 5;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(origin: GeoPoint, dest: GeoPoint) -> f64 {
    let dlat = (dest.lat - origin.lat).to_radians();
    let dlon = (dest.lon - origin.lon).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + origin.lat.to_radians().cos() * dest.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Rank `candidates` by distance from `client` and keep the closest
/// [`CLOSEST_SERVER_COUNT`], ordered nearest first.
///
/// Every retained server has its `distance_km` field filled in. While the
/// retained set is below capacity every candidate is kept, including ones
/// tied on distance; once full, the farthest retained entry is evicted only
/// for a strictly closer candidate.
pub fn closest_servers(client: GeoPoint, candidates: Vec<Server>) -> Vec<Server> {
    let mut closest: Vec<Server> = Vec::with_capacity(CLOSEST_SERVER_COUNT);

    for mut server in candidates {
        server.distance_km = haversine_km(client, server.location());

        if closest.len() < CLOSEST_SERVER_COUNT {
            closest.push(server);
            continue;
        }

        let mut worst_idx = 0;
        for (idx, retained) in closest.iter().enumerate() {
            if retained.distance_km > closest[worst_idx].distance_km {
                worst_idx = idx;
            }
        }
        if server.distance_km < closest[worst_idx].distance_km {
            closest[worst_idx] = server;
        }
    }

    closest.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    closest
}
