use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use dispatch_core::{ChangeEvent, FixedClock, Order, OrderId, OrderKey, QueueItem, Subtree};
use dispatch_store::{InMemoryQueueStore, InMemoryRecordStore};
use dispatch_sync::Handlers;
use tracing::info;

use crate::config::Config;
use crate::substrate::{DeadLetter, DeliveryStats, Substrate};

/// Both in-memory stores, a manual clock and the delivery substrate, wired
/// so that every store write flows back through the handlers.
pub struct Runtime {
    pub records: Arc<InMemoryRecordStore>,
    pub queue: Arc<InMemoryQueueStore>,
    pub clock: Arc<FixedClock>,
    substrate: Substrate,
}

impl Runtime {
    pub fn in_memory(cfg: &Config, clock: Arc<FixedClock>) -> Result<Self> {
        cfg.validate()?;
        let records = Arc::new(InMemoryRecordStore::new());
        let queue = Arc::new(InMemoryQueueStore::new());
        let handlers = Handlers::new(records.clone(), queue.clone(), clock.clone(), &cfg.dispatch());
        let substrate = Substrate::new(handlers, cfg.delivery.clone());
        records.feed().attach(substrate.sender());
        queue.feed().attach(substrate.sender());
        Ok(Self {
            records,
            queue,
            clock,
            substrate,
        })
    }

    pub fn set_duplicate_deliveries(&mut self, on: bool) {
        self.substrate.set_duplicate_deliveries(on);
    }

    /// Queues a raw event, as if the trigger runtime had redelivered it.
    pub fn inject(&self, event: ChangeEvent) -> Result<()> {
        self.substrate.inject(event).context("inject event")
    }

    /// Delivers pending events until the system is quiescent.
    pub async fn settle(&mut self) -> Result<DeliveryStats> {
        let stats = self.substrate.run_until_idle().await.context("settle")?;
        info!(
            delivered = stats.delivered,
            retried = stats.retried,
            dead_lettered = stats.dead_lettered,
            "substrate idle"
        );
        Ok(stats)
    }

    pub fn stats(&self) -> DeliveryStats {
        self.substrate.stats()
    }

    pub fn dead_letters(&self) -> &[DeadLetter] {
        self.substrate.dead_letters()
    }

    pub fn items(&self, subtree: Subtree) -> Result<BTreeMap<OrderId, QueueItem>> {
        Ok(self.queue.items(subtree)?)
    }

    pub fn orders(&self) -> Result<BTreeMap<OrderKey, Order>> {
        Ok(self.records.orders()?)
    }

    /// Queue records in dispatch order: lowest priority first, records without
    /// a priority last, ties broken by order id.
    pub fn ranked_queue(&self) -> Result<Vec<(OrderId, QueueItem)>> {
        let mut ranked: Vec<_> = self.items(Subtree::Queue)?.into_iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            let a_key = a.priority.unwrap_or(f64::INFINITY);
            let b_key = b.priority.unwrap_or(f64::INFINITY);
            a_key.total_cmp(&b_key).then_with(|| a_id.cmp(b_id))
        });
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::{AgentLocation, AgentId, QueuePath};
    use dispatch_store::{QueueStore, RecordStore};

    const T0: i64 = 1_700_000_000_000;

    fn placed(status: &str, lat: f64) -> Order {
        Order {
            status: Some(status.into()),
            created_at: Some(T0),
            lat: Some(lat),
            lng: Some(0.0),
            ..Order::default()
        }
    }

    #[tokio::test]
    async fn ranking_puts_unscored_items_last() {
        let mut rt = Runtime::in_memory(&Config::default(), Arc::new(FixedClock::new(T0))).unwrap();
        rt.records.put_order(&OrderKey::new("r1", "near"), placed("ready", 0.0)).await.unwrap();
        rt.records.put_order(&OrderKey::new("r1", "far"), placed("ready", 0.5)).await.unwrap();
        rt.settle().await.unwrap();
        rt.queue
            .merge(
                &QueuePath::queue("bare"),
                dispatch_core::QueuePatch {
                    restaurant_id: "r1".into(),
                    order_id: "bare".into(),
                    status: "ready".into(),
                    created_at_ms: None,
                },
            )
            .await
            .unwrap();
        rt.clock.advance_ms(60_000);
        rt.queue
            .write_agent_location(&AgentId::from("a1"), Some(AgentLocation::at(0.0, 0.0)))
            .await
            .unwrap();
        rt.settle().await.unwrap();

        let ids: Vec<_> = rt.ranked_queue().unwrap().into_iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec!["near", "far", "bare"]);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut cfg = Config::default();
        cfg.scoring.avg_speed_m_per_min = 0.0;
        assert!(Runtime::in_memory(&cfg, Arc::new(FixedClock::new(T0))).is_err());
    }
}
