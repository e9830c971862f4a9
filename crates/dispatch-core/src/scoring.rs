//! Distance and wait-time aware priority. Lower score = dispatched sooner.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::GeoPoint;
use crate::time::{EpochMs, MS_PER_MINUTE};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Straight-line agent speed used to turn distance into minutes.
    pub avg_speed_m_per_min: f64,
    pub wait_weight: f64,
    pub travel_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            avg_speed_m_per_min: 200.0,
            wait_weight: 1.0,
            travel_weight: 2.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.avg_speed_m_per_min.is_finite() && self.avg_speed_m_per_min > 0.0) {
            return Err(ConfigError::InvalidSpeed(self.avg_speed_m_per_min));
        }
        for (name, value) in [("wait", self.wait_weight), ("travel", self.travel_weight)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

/// Great-circle distance in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let la1 = a.lat.to_radians();
    let la2 = b.lat.to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + la1.cos() * la2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn travel_minutes(from: GeoPoint, to: GeoPoint, avg_speed_m_per_min: f64) -> f64 {
    haversine_meters(from, to) / avg_speed_m_per_min
}

/// Clamped at zero so clock skew never yields negative waiting.
pub fn wait_minutes(now_ms: EpochMs, created_at_ms: EpochMs) -> f64 {
    (now_ms.saturating_sub(created_at_ms) as f64 / MS_PER_MINUTE).max(0.0)
}

pub fn score_at(
    now_ms: EpochMs,
    created_at_ms: EpochMs,
    order: GeoPoint,
    agent: GeoPoint,
    cfg: &ScoringConfig,
) -> f64 {
    let waiting = wait_minutes(now_ms, created_at_ms);
    let travel = travel_minutes(agent, order, cfg.avg_speed_m_per_min);
    cfg.wait_weight * waiting + cfg.travel_weight * travel
}
