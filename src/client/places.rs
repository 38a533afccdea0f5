use crate::ports;
use crate::types::places::SafePlace;

use futures::future::join_all;
use tracing::{debug, warn};

use std::collections::HashSet;

pub const DEFAULT_LOOKUP_RADIUS: u32 = 5000;

/// Searched in this order; merge order follows it.
pub const SAFE_PLACE_CATEGORIES: [&str; 16] = [
    "hospital",
    "police",
    "fire_station",
    "school",
    "university",
    "local_government_office",
    "city_hall",
    "library",
    "museum",
    "stadium",
    "lodging",
    "shopping_mall",
    "supermarket",
    "train_station",
    "bus_station",
    "subway_station",
];

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone)]
pub struct PlacesLookup<P> {
    search: P,
}

impl<P> PlacesLookup<P>
where
    P: ports::PlacesSearch,
{
    pub fn new(search: P) -> Self {
        Self { search }
    }

    /// One search per category, all in flight at once. A failing category is
    /// logged and skipped. The static fallback is only used when nothing came
    /// back and no category call succeeded.
    pub async fn nearby_safe_places(&self, lat: f64, lng: f64, radius: u32) -> Vec<SafePlace> {
        let searches = SAFE_PLACE_CATEGORIES.iter().map(|&category| async move {
            (category, self.search.nearby(lat, lng, category, radius).await)
        });
        let outcomes = join_all(searches).await;

        let mut any_success = false;
        let mut seen = HashSet::new();
        let mut places = Vec::new();
        for (category, outcome) in outcomes {
            let results = match outcome {
                Ok(results) => results,
                Err(err) => {
                    warn!(%category, error = %err, "places search failed");
                    continue;
                }
            };
            any_success = true;
            for result in results {
                if !seen.insert(result.place_id.clone()) {
                    continue;
                }
                let mut place = SafePlace::from_result(result, category);
                place.distance_meters = Some(distance_meters(lat, lng, place.lat, place.lng));
                places.push(place);
            }
        }

        if places.is_empty() && !any_success {
            warn!(lat, lng, "every places search failed; using static fallback");
            return fallback_places(lat, lng);
        }
        debug!(count = places.len(), "merged nearby safe places");
        places
    }
}

pub fn fallback_places(lat: f64, lng: f64) -> Vec<SafePlace> {
    let entry = |id: &str, name: &str, address: &str, at: (f64, f64), kind: &str| SafePlace {
        id: id.to_string(),
        name: name.to_string(),
        address: address.to_string(),
        lat: at.0,
        lng: at.1,
        kind: kind.to_string(),
        rating: None,
        open_now: None,
        icon: None,
        distance_meters: Some(distance_meters(lat, lng, at.0, at.1)),
    };
    vec![
        entry("static-hospital", "General Hospital", "Main Ave", (lat, lng + 0.01), "hospital"),
        entry(
            "static-police",
            "City Police HQ",
            "3rd Street",
            (lat + 0.008, lng - 0.008),
            "police",
        ),
        entry(
            "static-school",
            "Central High School",
            "School Rd",
            (lat - 0.006, lng + 0.006),
            "school",
        ),
        entry(
            "static-university",
            "City University",
            "Campus Way",
            (lat + 0.012, lng + 0.004),
            "university",
        ),
    ]
}

/// Great-circle distance (haversine).
pub fn distance_meters(from_lat: f64, from_lng: f64, to_lat: f64, to_lng: f64) -> f64 {
    let d_lat = (to_lat - from_lat).to_radians();
    let d_lng = (to_lng - from_lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from_lat.to_radians().cos() * to_lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

pub fn directions_url(origin: (f64, f64), destination: (f64, f64)) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&origin={}%2C{}&destination={}%2C{}",
        origin.0, origin.1, destination.0, destination.1
    )
}
