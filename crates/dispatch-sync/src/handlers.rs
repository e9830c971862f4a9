use std::sync::Arc;

use dispatch_core::{ChangeEvent, Clock, DispatchConfig};
use dispatch_store::{QueueStore, RecordStore};

use crate::error::SyncError;
use crate::order_sync::OrderSync;
use crate::outcome::SyncOutcome;
use crate::reverse::ReverseStatusSync;
use crate::sweep::PrioritySweep;

/// All handlers, wired to the same injected store clients.
pub struct Handlers {
    pub orders: OrderSync,
    pub sweep: PrioritySweep,
    pub reverse: ReverseStatusSync,
}

impl Handlers {
    pub fn new(
        records: Arc<dyn RecordStore>,
        queue: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        cfg: &DispatchConfig,
    ) -> Self {
        Self {
            orders: OrderSync::new(records.clone(), queue.clone(), clock.clone(), cfg.statuses.clone()),
            sweep: PrioritySweep::new(queue, clock, cfg.scoring.clone()),
            reverse: ReverseStatusSync::new(records),
        }
    }

    /// Routes one change event to the handler subscribed to it.
    pub async fn handle(&self, event: &ChangeEvent) -> Result<SyncOutcome, SyncError> {
        match event {
            ChangeEvent::OrderCreated { key, order } => self.orders.on_order_created(key, order.as_ref()).await,
            ChangeEvent::OrderWritten { key, before, after } => {
                self.orders.on_order_written(key, before.as_ref(), after.as_ref()).await
            }
            ChangeEvent::AgentLocationWritten { agent_id, after, .. } => {
                self.sweep.on_agent_moved(agent_id, after.as_ref()).await
            }
            ChangeEvent::LiveItemWritten { path, before, after } => {
                self.reverse.on_live_item_written(path, before.as_ref(), after.as_ref()).await
            }
        }
    }
}
