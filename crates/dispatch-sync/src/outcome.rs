use dispatch_core::{OrderId, OrderKey};

/// Why a handler finished without writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Event arrived without the expected payload (deleted or transient read).
    MissingPayload,
    NotEligible,
    /// Agent location without usable coordinates.
    InvalidLocation,
    EmptyQueue,
    StatusUnchanged,
    MissingStatus,
    MissingRestaurant,
    /// The authoritative order no longer exists.
    OrderNotFound,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    Skipped { reason: SkipReason },
    /// Full projection written to `/queue`.
    Enqueued { order_id: OrderId, geo_stamped: bool },
    /// Partial projection merged into `/queue`.
    Patched { order_id: OrderId },
    /// Left the queue without finishing (ineligible status).
    Dequeued { order_id: OrderId },
    /// Terminal: removed from `/queue` and `/active`.
    Retired { order_id: OrderId },
    Reprioritized { updated: usize, skipped: usize },
    StatusWrittenBack { key: OrderKey, status: String },
}

impl SyncOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}
