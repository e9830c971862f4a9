use std::sync::Arc;

use dispatch_core::{score_at, AgentId, AgentLocation, Clock, ScoringConfig, Subtree};
use dispatch_store::{QueueStore, QueueWrite};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::outcome::{SkipReason, SyncOutcome};

/// Recomputes queue priorities when an agent reports a new position.
///
/// Full scan of `/queue`, one atomic update. Writes `priority` and nothing else.
/// Items without a creation time or coordinates keep whatever priority they
/// have (FIFO or stale).
pub struct PrioritySweep {
    queue: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    scoring: ScoringConfig,
}

impl PrioritySweep {
    pub fn new(queue: Arc<dyn QueueStore>, clock: Arc<dyn Clock>, scoring: ScoringConfig) -> Self {
        Self { queue, clock, scoring }
    }

    pub async fn on_agent_moved(
        &self,
        agent_id: &AgentId,
        location: Option<&AgentLocation>,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(agent) = location.and_then(AgentLocation::position) else {
            debug!(agent_id = %agent_id, "agent location missing coordinates; priorities untouched");
            return Ok(SyncOutcome::skipped(SkipReason::InvalidLocation));
        };

        let items = self.queue.snapshot(Subtree::Queue).await?;
        if items.is_empty() {
            return Ok(SyncOutcome::skipped(SkipReason::EmptyQueue));
        }

        let now = self.clock.now_ms();
        let mut writes = Vec::new();
        let mut skipped = 0;
        for (order_id, item) in &items {
            let (Some(created_at_ms), Some(position)) = (item.created_at_ms, item.position()) else {
                skipped += 1;
                continue;
            };
            let priority = score_at(now, created_at_ms, position, agent, &self.scoring);
            if item.priority == Some(priority) {
                continue;
            }
            writes.push(QueueWrite::SetPriority {
                order_id: order_id.clone(),
                priority,
            });
        }

        let updated = writes.len();
        if updated > 0 {
            self.queue.update(writes).await?;
        }
        info!(agent_id = %agent_id, updated, skipped, total = items.len(), "priorities recomputed");
        Ok(SyncOutcome::Reprioritized { updated, skipped })
    }
}
