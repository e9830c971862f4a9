//! Order → queue record projection.
//!
//! The full build runs once, on creation, and owns every field. The partial
//! build runs on updates and deliberately leaves address, coordinates and
//! priority alone: the geo stamp is fixed at creation and priority belongs to
//! the sweep.

use crate::ids::OrderKey;
use crate::model::{Order, QueueItem, QueuePatch};
use crate::time::EpochMs;

pub fn full_build(key: &OrderKey, order: &Order, now_ms: EpochMs) -> QueueItem {
    let created_at_ms = order.created_at_ms().unwrap_or(now_ms);
    QueueItem {
        restaurant_id: Some(key.restaurant_id.clone()),
        order_id: Some(key.order_id.clone()),
        address: Some(order.address.clone().unwrap_or_default()),
        created_at_ms: Some(created_at_ms),
        // FIFO until the sweep sees an agent position.
        priority: Some(created_at_ms as f64),
        status: Some(order.status_or_default().to_string()),
        lat: order.lat,
        lng: order.lng,
    }
}

pub fn partial_build(key: &OrderKey, order: &Order) -> QueuePatch {
    QueuePatch {
        restaurant_id: key.restaurant_id.clone(),
        order_id: key.order_id.clone(),
        status: order.status_or_default().to_string(),
        created_at_ms: order.created_at_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> OrderKey {
        OrderKey::new("r1", "o1")
    }

    #[test]
    fn full_build_defaults_to_fifo_priority() {
        let order = Order {
            address: Some("12 Main".into()),
            created_at: Some(1_000),
            status: Some("ready".into()),
            lat: Some(1.0),
            lng: Some(2.0),
            ..Order::default()
        };
        let item = full_build(&key(), &order, 99_999);
        assert_eq!(item.created_at_ms, Some(1_000));
        assert_eq!(item.priority, Some(1_000.0));
        assert_eq!(item.address.as_deref(), Some("12 Main"));
        assert_eq!(item.status.as_deref(), Some("ready"));
        assert_eq!(item.restaurant_id.as_ref().map(|r| r.as_str()), Some("r1"));
        assert_eq!(item.order_id.as_ref().map(|o| o.as_str()), Some("o1"));
        assert_eq!((item.lat, item.lng), (Some(1.0), Some(2.0)));
    }

    #[test]
    fn full_build_falls_back_to_legacy_then_now() {
        let legacy = Order {
            timestamp: Some(7),
            ..Order::default()
        };
        assert_eq!(full_build(&key(), &legacy, 50).created_at_ms, Some(7));

        let bare = Order::default();
        let item = full_build(&key(), &bare, 50);
        assert_eq!(item.created_at_ms, Some(50));
        assert_eq!(item.priority, Some(50.0));
        assert_eq!(item.status.as_deref(), Some("pending"));
        assert_eq!(item.address.as_deref(), Some(""));
        assert_eq!((item.lat, item.lng), (None, None));
    }

    #[test]
    fn full_build_is_deterministic() {
        let order = Order {
            created_at: Some(3),
            ..Order::default()
        };
        assert_eq!(full_build(&key(), &order, 10), full_build(&key(), &order, 10));
    }

    #[test]
    fn partial_build_carries_timestamp_only_when_present() {
        let with_ts = Order {
            created_at: Some(3),
            status: Some("prepping".into()),
            address: Some("ignored".into()),
            lat: Some(5.0),
            lng: Some(5.0),
            ..Order::default()
        };
        let patch = partial_build(&key(), &with_ts);
        assert_eq!(patch.created_at_ms, Some(3));
        assert_eq!(patch.status, "prepping");

        let without = partial_build(&key(), &Order::default());
        assert_eq!(without.created_at_ms, None);
        assert_eq!(without.status, "pending");
    }

    #[test]
    fn partial_patch_is_idempotent_and_keeps_owned_fields() {
        let mut item = full_build(
            &key(),
            &Order {
                created_at: Some(1),
                address: Some("A".into()),
                lat: Some(1.0),
                lng: Some(1.0),
                ..Order::default()
            },
            0,
        );
        item.priority = Some(42.5);

        let update = Order {
            status: Some("ready".into()),
            address: Some("B".into()),
            lat: Some(9.0),
            lng: Some(9.0),
            ..Order::default()
        };
        let patch = partial_build(&key(), &update);

        item.apply_patch(&patch);
        let once = item.clone();
        item.apply_patch(&patch);
        assert_eq!(item, once);

        assert_eq!(item.status.as_deref(), Some("ready"));
        assert_eq!(item.address.as_deref(), Some("A"));
        assert_eq!((item.lat, item.lng), (Some(1.0), Some(1.0)));
        assert_eq!(item.priority, Some(42.5));
        assert_eq!(item.created_at_ms, Some(1));
    }
}
