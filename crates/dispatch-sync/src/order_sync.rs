use std::sync::Arc;

use dispatch_core::{
    full_build, partial_build, Clock, Eligibility, Order, OrderKey, OrderPatch, QueuePath, StatusPolicy,
};
use dispatch_store::{QueueStore, QueueWrite, RecordStore};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::outcome::{SkipReason, SyncOutcome};

/// Keeps `/queue` and `/active` in step with authoritative order writes.
///
/// Owns the geo stamp (address and coordinates, once, at creation) and queue
/// membership. Never writes `priority` after the initial FIFO value.
pub struct OrderSync {
    records: Arc<dyn RecordStore>,
    queue: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    statuses: StatusPolicy,
}

impl OrderSync {
    pub fn new(
        records: Arc<dyn RecordStore>,
        queue: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        statuses: StatusPolicy,
    ) -> Self {
        Self {
            records,
            queue,
            clock,
            statuses,
        }
    }

    pub async fn on_order_created(&self, key: &OrderKey, order: Option<&Order>) -> Result<SyncOutcome, SyncError> {
        let Some(order) = order else {
            debug!(key = %key, "order created without payload; ignoring");
            return Ok(SyncOutcome::skipped(SkipReason::MissingPayload));
        };
        if self.statuses.classify(order.status.as_deref()) != Eligibility::Eligible {
            debug!(key = %key, status = order.status_or_default(), "new order not eligible for queue");
            return Ok(SyncOutcome::skipped(SkipReason::NotEligible));
        }

        let stamp = self.profile_stamp(key, order).await;
        let current = match stamp {
            Some(patch) => {
                let statuses = self.statuses.clone();
                let stamped_at = self.clock.now_ms();
                self.records
                    .transact_order(
                        key,
                        Box::new(move |current: &Order| {
                            // Stamped once per lifetime; never onto an order that has moved on.
                            if current.geo_stamped_at.is_some() || !statuses.is_eligible(current.status.as_deref()) {
                                return None;
                            }
                            Some(OrderPatch {
                                geo_stamped_at: Some(stamped_at),
                                ..patch
                            })
                        }),
                    )
                    .await?
            }
            None => self.records.get_order(key).await?,
        };

        // The stored document is authoritative; the event payload may be stale.
        let Some(order) = current else {
            warn!(key = %key, "order no longer exists; not enqueueing");
            return Ok(SyncOutcome::skipped(SkipReason::OrderNotFound));
        };
        if self.statuses.classify(order.status.as_deref()) != Eligibility::Eligible {
            debug!(key = %key, status = order.status_or_default(), "order no longer eligible");
            return Ok(SyncOutcome::skipped(SkipReason::NotEligible));
        }
        let geo_stamped = order.geo_stamped_at.is_some();

        let item = full_build(key, &order, self.clock.now_ms());
        self.queue.set(&QueuePath::queue(key.order_id.clone()), item).await?;
        info!(key = %key, geo_stamped, "order enqueued");
        Ok(SyncOutcome::Enqueued {
            order_id: key.order_id.clone(),
            geo_stamped,
        })
    }

    /// Profile snapshot to stamp onto a new order, if any. Lookup failures degrade to none.
    async fn profile_stamp(&self, key: &OrderKey, order: &Order) -> Option<OrderPatch> {
        let user_id = order.user_id.as_ref()?;
        match self.records.get_user(user_id).await {
            Ok(Some(profile)) => Some(profile.geo_stamp()).filter(|stamp| !stamp.is_empty()),
            Ok(None) => {
                debug!(key = %key, user_id = %user_id, "no profile for user; keeping order address");
                None
            }
            Err(e) => {
                warn!(key = %key, user_id = %user_id, error = %e, "profile lookup failed; enqueueing without geo stamp");
                None
            }
        }
    }

    pub async fn on_order_written(
        &self,
        key: &OrderKey,
        before: Option<&Order>,
        after: Option<&Order>,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(after) = after else {
            debug!(key = %key, "order write without after-state; ignoring");
            return Ok(SyncOutcome::skipped(SkipReason::MissingPayload));
        };
        let order_id = key.order_id.clone();
        let from = before.map(Order::status_or_default);
        let to = after.status_or_default();

        match self.statuses.classify(after.status.as_deref()) {
            Eligibility::Terminal => {
                self.queue
                    .update(vec![
                        QueueWrite::Remove {
                            path: QueuePath::queue(order_id.clone()),
                        },
                        QueueWrite::Remove {
                            path: QueuePath::active(order_id.clone()),
                        },
                    ])
                    .await?;
                info!(key = %key, ?from, to, "order finished; removed from queue and active");
                Ok(SyncOutcome::Retired { order_id })
            }
            Eligibility::Eligible => {
                self.queue
                    .merge(&QueuePath::queue(order_id.clone()), partial_build(key, after))
                    .await?;
                debug!(key = %key, ?from, to, "queue record patched");
                Ok(SyncOutcome::Patched { order_id })
            }
            Eligibility::Ineligible => {
                self.queue.remove(&QueuePath::queue(order_id.clone())).await?;
                info!(key = %key, ?from, to, "order left the queue");
                Ok(SyncOutcome::Dequeued { order_id })
            }
        }
    }
}
