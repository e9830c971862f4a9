use std::path::Path;

use anyhow::{anyhow, Context, Result};
use dispatch_core::{
    AgentId, AgentLocation, ChangeEvent, Clock, EpochMs, Order, OrderId, OrderKey, OrderPatch, QueueItem, QueuePath,
    RestaurantId, Subtree, UserId, UserProfile,
};
use dispatch_store::{QueueStore, RecordStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::runtime::Runtime;

pub const DEFAULT_START_MS: EpochMs = 1_700_000_000_000;

fn default_start_ms() -> EpochMs {
    DEFAULT_START_MS
}

/// A replayable sequence of upstream writes, agent moves and dispatcher
/// actions. Writes go through the in-memory stores, so change events are
/// produced the same way production triggers would see them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Script {
    #[serde(default = "default_start_ms")]
    pub start_ms: EpochMs,
    /// Overrides `delivery.duplicate_deliveries` from the config.
    #[serde(default)]
    pub duplicate_deliveries: Option<bool>,
    pub steps: Vec<Step>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreName {
    Records,
    Queue,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    PutUser {
        user_id: UserId,
        profile: UserProfile,
    },
    /// Whole-document write of a new order.
    CreateOrder {
        restaurant_id: RestaurantId,
        order_id: OrderId,
        order: Order,
    },
    /// Field merge onto an existing order, as the order-taking system does.
    UpdateOrder {
        restaurant_id: RestaurantId,
        order_id: OrderId,
        patch: OrderPatch,
    },
    DeleteOrder {
        restaurant_id: RestaurantId,
        order_id: OrderId,
    },
    /// Both coordinates absent clears the location.
    MoveAgent {
        agent_id: AgentId,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lng: Option<f64>,
    },
    /// Dispatcher claims an order: whole record under `/active`.
    SetActive {
        order_id: OrderId,
        item: QueueItem,
    },
    /// Dispatcher edits the status of an existing queue or active record.
    SetLiveStatus {
        subtree: Subtree,
        order_id: OrderId,
        status: String,
    },
    AdvanceClock {
        ms: i64,
    },
    FailWrites {
        store: StoreName,
        count: u32,
    },
    FailReads {
        store: StoreName,
        count: u32,
    },
    /// Re-injects a raw event, possibly stale or out of order.
    Redeliver {
        event: ChangeEvent,
    },
    /// Drains the substrate.
    Settle,
}

pub fn load_script(path: &Path) -> Result<Script> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read script: {}", path.display()))?;
    let script: Script = serde_yaml::from_str(&s).with_context(|| format!("parse script: {}", path.display()))?;
    Ok(script)
}

impl Script {
    /// Applies every step in order and settles once more at the end.
    pub async fn run(&self, rt: &mut Runtime) -> Result<()> {
        rt.clock.set(self.start_ms);
        if let Some(dup) = self.duplicate_deliveries {
            rt.set_duplicate_deliveries(dup);
        }
        for (idx, step) in self.steps.iter().enumerate() {
            apply(rt, step).await.with_context(|| format!("step {} ({})", idx + 1, step.name()))?;
        }
        rt.settle().await?;
        Ok(())
    }
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::PutUser { .. } => "put_user",
            Step::CreateOrder { .. } => "create_order",
            Step::UpdateOrder { .. } => "update_order",
            Step::DeleteOrder { .. } => "delete_order",
            Step::MoveAgent { .. } => "move_agent",
            Step::SetActive { .. } => "set_active",
            Step::SetLiveStatus { .. } => "set_live_status",
            Step::AdvanceClock { .. } => "advance_clock",
            Step::FailWrites { .. } => "fail_writes",
            Step::FailReads { .. } => "fail_reads",
            Step::Redeliver { .. } => "redeliver",
            Step::Settle => "settle",
        }
    }
}

async fn apply(rt: &mut Runtime, step: &Step) -> Result<()> {
    debug!(step = step.name(), "applying script step");
    match step {
        Step::PutUser { user_id, profile } => {
            rt.records.put_user(user_id, profile.clone()).await?;
        }
        Step::CreateOrder {
            restaurant_id,
            order_id,
            order,
        } => {
            let key = OrderKey::new(restaurant_id.clone(), order_id.clone());
            rt.records.put_order(&key, order.clone()).await?;
        }
        Step::UpdateOrder {
            restaurant_id,
            order_id,
            patch,
        } => {
            let key = OrderKey::new(restaurant_id.clone(), order_id.clone());
            if !rt.records.merge_order(&key, patch).await? {
                warn!(key = %key, "update_order on a missing order; nothing written");
            }
        }
        Step::DeleteOrder {
            restaurant_id,
            order_id,
        } => {
            let key = OrderKey::new(restaurant_id.clone(), order_id.clone());
            rt.records.delete_order(&key).await?;
        }
        Step::MoveAgent { agent_id, lat, lng } => {
            let location = match (lat, lng) {
                (None, None) => None,
                _ => Some(AgentLocation {
                    lat: *lat,
                    lng: *lng,
                    updated_at: Some(rt.clock.now_ms()),
                }),
            };
            rt.queue.write_agent_location(agent_id, location).await?;
        }
        Step::SetActive { order_id, item } => {
            rt.queue.set(&QueuePath::active(order_id.clone()), item.clone()).await?;
        }
        Step::SetLiveStatus {
            subtree,
            order_id,
            status,
        } => {
            let path = QueuePath {
                subtree: *subtree,
                order_id: order_id.clone(),
            };
            let mut item = rt
                .queue
                .get(&path)
                .await?
                .ok_or_else(|| anyhow!("no record at {path}"))?;
            item.status = Some(status.clone());
            rt.queue.set(&path, item).await?;
        }
        Step::AdvanceClock { ms } => rt.clock.advance_ms(*ms),
        Step::FailWrites { store, count } => match store {
            StoreName::Records => rt.records.failures().fail_next_writes(*count),
            StoreName::Queue => rt.queue.failures().fail_next_writes(*count),
        },
        Step::FailReads { store, count } => match store {
            StoreName::Records => rt.records.failures().fail_next_reads(*count),
            StoreName::Queue => rt.queue.failures().fail_next_reads(*count),
        },
        Step::Redeliver { event } => rt.inject(event.clone())?,
        Step::Settle => {
            rt.settle().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use dispatch_core::FixedClock;
    use std::sync::Arc;

    const SCRIPT: &str = r#"
start_ms: 1700000000000
steps:
  - step: create_order
    restaurant_id: r1
    order_id: o1
    order: { status: ready, createdAt: 1700000000000 }
  - step: settle
  - step: update_order
    restaurant_id: r1
    order_id: o1
    patch: { status: delivered }
"#;

    #[test]
    fn parses_tagged_steps() {
        let script: Script = serde_yaml::from_str(SCRIPT).unwrap();
        let names: Vec<_> = script.steps.iter().map(Step::name).collect();
        assert_eq!(names, vec!["create_order", "settle", "update_order"]);
    }

    #[tokio::test]
    async fn run_settles_after_last_step() {
        let script: Script = serde_yaml::from_str(SCRIPT).unwrap();
        let mut rt = Runtime::in_memory(&Config::default(), Arc::new(FixedClock::default())).unwrap();
        script.run(&mut rt).await.unwrap();
        assert!(rt.items(Subtree::Queue).unwrap().is_empty());
        let orders = rt.orders().unwrap();
        assert_eq!(orders[&OrderKey::new("r1", "o1")].status.as_deref(), Some("delivered"));
    }

    #[tokio::test]
    async fn live_status_on_missing_record_fails() {
        let script: Script = serde_yaml::from_str(
            "steps:\n  - step: set_live_status\n    subtree: active\n    order_id: nope\n    status: ready\n",
        )
        .unwrap();
        let mut rt = Runtime::in_memory(&Config::default(), Arc::new(FixedClock::default())).unwrap();
        assert!(script.run(&mut rt).await.is_err());
    }
}
