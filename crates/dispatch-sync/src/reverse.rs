use std::sync::Arc;

use dispatch_core::{OrderKey, OrderPatch, QueueItem, QueuePath};
use dispatch_store::RecordStore;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::outcome::{SkipReason, SyncOutcome};

/// Propagates queue/active status changes back onto the authoritative order.
///
/// Read current, compare, write only if different. The comparison is what
/// stops the order → queue → order write cycle.
pub struct ReverseStatusSync {
    records: Arc<dyn RecordStore>,
}

impl ReverseStatusSync {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub async fn on_live_item_written(
        &self,
        path: &QueuePath,
        before: Option<&QueueItem>,
        after: Option<&QueueItem>,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(item) = after else {
            // Removal; order-side cleanup belongs to OrderSync.
            return Ok(SyncOutcome::skipped(SkipReason::MissingPayload));
        };
        if let Some(before) = before {
            if before.status == item.status {
                return Ok(SyncOutcome::skipped(SkipReason::StatusUnchanged));
            }
        }

        let Some(status) = item.status.clone() else {
            warn!(path = %path, "live record has no status; skipping");
            return Ok(SyncOutcome::skipped(SkipReason::MissingStatus));
        };
        let Some(restaurant_id) = item.restaurant_id.clone() else {
            warn!(path = %path, "live record has no restaurantId; skipping");
            return Ok(SyncOutcome::skipped(SkipReason::MissingRestaurant));
        };
        let key = OrderKey {
            restaurant_id,
            order_id: path.order_id.clone(),
        };

        let Some(order) = self.records.get_order(&key).await? else {
            warn!(path = %path, key = %key, "live record points at a missing order");
            return Ok(SyncOutcome::skipped(SkipReason::OrderNotFound));
        };
        if order.status_or_default() == status {
            debug!(key = %key, status = %status, "order status already in sync");
            return Ok(SyncOutcome::skipped(SkipReason::StatusUnchanged));
        }

        if !self.records.merge_order(&key, &OrderPatch::status(status.clone())).await? {
            warn!(key = %key, "order deleted before status write-back");
            return Ok(SyncOutcome::skipped(SkipReason::OrderNotFound));
        }
        info!(key = %key, from = order.status_or_default(), to = %status, "status written back to order");
        Ok(SyncOutcome::StatusWrittenBack { key, status })
    }
}
