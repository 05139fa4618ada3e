use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{SAMPLE_DISTANCE_M, SAMPLE_INTERVAL};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SampleOrigin {
    Foreground,
    Background,
}

/// One GPS reading. Foreground and background samples share this shape and
/// are reported the same way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub accuracy: Option<f64>,
    pub origin: SampleOrigin,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64, origin: SampleOrigin) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            origin,
        }
    }

    pub fn distance_to(&self, other: &LocationSample) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Drops foreground samples that arrive faster than the watch cadence: a
/// sample passes once enough time has elapsed OR the device has moved far
/// enough since the last sample that passed.
#[derive(Debug, Clone)]
pub struct SampleThrottle {
    min_interval: Duration,
    min_distance_m: f64,
    last_forwarded: Option<LocationSample>,
}

impl Default for SampleThrottle {
    fn default() -> Self {
        Self::new(SAMPLE_INTERVAL, SAMPLE_DISTANCE_M)
    }
}

impl SampleThrottle {
    pub fn new(min_interval: Duration, min_distance_m: f64) -> Self {
        Self {
            min_interval,
            min_distance_m,
            last_forwarded: None,
        }
    }

    pub fn admit(&mut self, sample: &LocationSample) -> bool {
        let admit = match &self.last_forwarded {
            None => true,
            Some(last) => {
                let elapsed_ms = sample.timestamp.saturating_sub(last.timestamp);
                elapsed_ms >= self.min_interval.as_millis() as i64
                    || sample.distance_to(last) >= self.min_distance_m
            }
        };

        if admit {
            self.last_forwarded = Some(sample.clone());
        }
        admit
    }
}
