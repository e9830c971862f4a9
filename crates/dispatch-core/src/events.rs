use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, OrderKey};
use crate::model::{AgentLocation, Order, QueueItem, QueuePath};

/// Change notification delivered by either store. `before` is absent on
/// creation and `after` on deletion. Delivery is at-least-once and unordered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    OrderCreated {
        key: OrderKey,
        #[serde(default)]
        order: Option<Order>,
    },
    OrderWritten {
        key: OrderKey,
        #[serde(default)]
        before: Option<Order>,
        #[serde(default)]
        after: Option<Order>,
    },
    AgentLocationWritten {
        agent_id: AgentId,
        #[serde(default)]
        before: Option<AgentLocation>,
        #[serde(default)]
        after: Option<AgentLocation>,
    },
    /// A `/queue` or `/active` record was written.
    LiveItemWritten {
        path: QueuePath,
        #[serde(default)]
        before: Option<QueueItem>,
        #[serde(default)]
        after: Option<QueueItem>,
    },
}

impl ChangeEvent {
    pub fn label(&self) -> String {
        match self {
            ChangeEvent::OrderCreated { key, .. } => format!("order_created {key}"),
            ChangeEvent::OrderWritten { key, .. } => format!("order_written {key}"),
            ChangeEvent::AgentLocationWritten { agent_id, .. } => {
                format!("agent_location_written /agents/{agent_id}/location")
            }
            ChangeEvent::LiveItemWritten { path, .. } => format!("live_item_written {path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_wire_shape() {
        let ev: ChangeEvent = serde_json::from_str(
            r#"{"kind":"order_written","key":{"restaurantId":"r1","orderId":"o1"},"after":{"status":"ready"}}"#,
        )
        .unwrap();
        match &ev {
            ChangeEvent::OrderWritten { key, before, after } => {
                assert_eq!(key.order_id.as_str(), "o1");
                assert!(before.is_none());
                assert_eq!(after.as_ref().and_then(|o| o.status.as_deref()), Some("ready"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ev.label(), "order_written restaurants/r1/orders/o1");
    }
}
