use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, RestaurantId, UserId};
use crate::time::EpochMs;

/// Status assumed when an order or queue record carries none.
pub const DEFAULT_STATUS: &str = "pending";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both halves must be present and finite; a half coordinate is no coordinate.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

/// Authoritative order document.
///
/// Two historical creation-time fields exist on stored documents; `createdAt`
/// wins over `timestamp` when both are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<EpochMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<EpochMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Set in the same write as the profile geo stamp; an order is stamped at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_stamped_at: Option<EpochMs>,
}

impl Order {
    pub fn created_at_ms(&self) -> Option<EpochMs> {
        self.created_at.or(self.timestamp)
    }

    pub fn status_or_default(&self) -> &str {
        self.status.as_deref().unwrap_or(DEFAULT_STATUS)
    }

    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.lat, self.lng)
    }

    /// Field-level merge. Returns true when any field changed.
    pub fn apply_patch(&mut self, patch: &OrderPatch) -> bool {
        let before = self.clone();
        if let Some(status) = &patch.status {
            self.status = Some(status.clone());
        }
        if let Some(address) = &patch.address {
            self.address = Some(address.clone());
        }
        if let Some(lat) = patch.lat {
            self.lat = Some(lat);
        }
        if let Some(lng) = patch.lng {
            self.lng = Some(lng);
        }
        if let Some(at) = patch.geo_stamped_at {
            self.geo_stamped_at = Some(at);
        }
        *self != before
    }
}

/// Merge payload for an order document. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_stamped_at: Option<EpochMs>,
}

impl OrderPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.address.is_none()
            && self.lat.is_none()
            && self.lng.is_none()
            && self.geo_stamped_at.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl UserProfile {
    /// Snapshot of the profile's delivery location as an order patch.
    ///
    /// Only populated fields are stamped, and coordinates only as a complete pair.
    pub fn geo_stamp(&self) -> OrderPatch {
        let position = GeoPoint::from_parts(self.lat, self.lng);
        OrderPatch {
            status: None,
            address: self.address.clone(),
            lat: position.map(|p| p.lat),
            lng: position.map(|p| p.lng),
            geo_stamped_at: None,
        }
    }
}

/// Record under `/queue/{orderId}` or `/active/{orderId}`.
///
/// Every field is optional on the stored shape: records materialized by a
/// merge, or written by the external dispatch process, may be partial.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    #[serde(default)]
    pub restaurant_id: Option<RestaurantId>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub created_at_ms: Option<EpochMs>,
    #[serde(default)]
    pub priority: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// Same shape as a queue record; lives under `/active`.
pub type ActiveItem = QueueItem;

impl QueueItem {
    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.lat, self.lng)
    }

    pub fn from_patch(patch: &QueuePatch) -> Self {
        let mut item = Self::default();
        item.apply_patch(patch);
        item
    }

    /// Merge semantics: writes identity, status and (when carried) `createdAtMs`.
    /// Address, coordinates and priority are never touched.
    pub fn apply_patch(&mut self, patch: &QueuePatch) {
        self.restaurant_id = Some(patch.restaurant_id.clone());
        self.order_id = Some(patch.order_id.clone());
        self.status = Some(patch.status.clone());
        if let Some(created_at_ms) = patch.created_at_ms {
            self.created_at_ms = Some(created_at_ms);
        }
    }
}

/// Partial projection applied on order updates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePatch {
    pub restaurant_id: RestaurantId,
    pub order_id: OrderId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<EpochMs>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentLocation {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<EpochMs>,
}

impl AgentLocation {
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            lat: Some(lat),
            lng: Some(lng),
            updated_at: None,
        }
    }

    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.lat, self.lng)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtree {
    Queue,
    Active,
}

impl Subtree {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subtree::Queue => "queue",
            Subtree::Active => "active",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePath {
    pub subtree: Subtree,
    pub order_id: OrderId,
}

impl QueuePath {
    pub fn queue(order_id: impl Into<OrderId>) -> Self {
        Self {
            subtree: Subtree::Queue,
            order_id: order_id.into(),
        }
    }

    pub fn active(order_id: impl Into<OrderId>) -> Self {
        Self {
            subtree: Subtree::Active,
            order_id: order_id.into(),
        }
    }
}

impl fmt::Display for QueuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.subtree.as_str(), self.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_at_wins_over_legacy_timestamp() {
        let order = Order {
            created_at: Some(10),
            timestamp: Some(20),
            ..Order::default()
        };
        assert_eq!(order.created_at_ms(), Some(10));

        let legacy = Order {
            timestamp: Some(20),
            ..Order::default()
        };
        assert_eq!(legacy.created_at_ms(), Some(20));
        assert_eq!(Order::default().created_at_ms(), None);
    }

    #[test]
    fn half_coordinates_are_not_a_position() {
        assert_eq!(GeoPoint::from_parts(Some(1.0), None), None);
        assert_eq!(GeoPoint::from_parts(Some(f64::NAN), Some(1.0)), None);
        assert_eq!(GeoPoint::from_parts(Some(1.0), Some(2.0)), Some(GeoPoint::new(1.0, 2.0)));
    }

    #[test]
    fn order_patch_reports_change() {
        let mut order = Order {
            status: Some("ready".into()),
            ..Order::default()
        };
        assert!(!order.apply_patch(&OrderPatch::status("ready")));
        assert!(order.apply_patch(&OrderPatch::status("delivered")));
        assert_eq!(order.status.as_deref(), Some("delivered"));
    }

    #[test]
    fn geo_stamp_skips_incomplete_coordinates() {
        let profile = UserProfile {
            address: Some("A".into()),
            lat: Some(1.0),
            lng: None,
        };
        let stamp = profile.geo_stamp();
        assert_eq!(stamp.address.as_deref(), Some("A"));
        assert_eq!(stamp.lat, None);
        assert_eq!(stamp.lng, None);
    }

    #[test]
    fn order_reads_camel_case_wire_names() {
        let order: Order = serde_json::from_str(
            r#"{"userId":"u1","createdAt":5,"status":"ready","lat":1.5,"lng":2.5}"#,
        )
        .unwrap();
        assert_eq!(order.user_id, Some(UserId::from("u1")));
        assert_eq!(order.created_at_ms(), Some(5));
        assert_eq!(order.position(), Some(GeoPoint::new(1.5, 2.5)));
    }

    #[test]
    fn queue_path_display() {
        assert_eq!(QueuePath::queue("o1").to_string(), "/queue/o1");
        assert_eq!(QueuePath::active("o1").to_string(), "/active/o1");
    }
}
