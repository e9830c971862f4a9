use std::collections::BTreeMap;

use async_trait::async_trait;
use dispatch_core::{
    AgentId, AgentLocation, Order, OrderId, OrderKey, OrderPatch, QueueItem, QueuePatch, QueuePath, Subtree,
    UserId, UserProfile,
};

use crate::error::StoreResult;

/// Read-modify-write body run inside [`RecordStore::transact_order`].
/// Returning `None` commits nothing.
pub type OrderMutation = Box<dyn FnOnce(&Order) -> Option<OrderPatch> + Send>;

/// Authoritative document store: `restaurants/{rid}/orders/{oid}` and `users/{uid}`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_order(&self, key: &OrderKey) -> StoreResult<Option<Order>>;

    /// Whole-document write, used by upstream order-taking systems.
    async fn put_order(&self, key: &OrderKey, order: Order) -> StoreResult<()>;

    /// Field-level merge onto an existing order. Returns false when the order
    /// does not exist; nothing is created in that case.
    async fn merge_order(&self, key: &OrderKey, patch: &OrderPatch) -> StoreResult<bool>;

    async fn delete_order(&self, key: &OrderKey) -> StoreResult<()>;

    /// Transactional read-modify-write. Returns the order as committed, or
    /// `None` when it does not exist.
    async fn transact_order(&self, key: &OrderKey, mutation: OrderMutation) -> StoreResult<Option<Order>>;

    async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<UserProfile>>;

    async fn put_user(&self, user_id: &UserId, profile: UserProfile) -> StoreResult<()>;
}

/// One leg of an atomic multi-key queue-store update.
#[derive(Clone, Debug, PartialEq)]
pub enum QueueWrite {
    Set { path: QueuePath, item: QueueItem },
    /// Creates the record when absent.
    Merge { path: QueuePath, patch: QueuePatch },
    /// `/queue/{id}/priority`. Never materializes a missing record.
    SetPriority { order_id: OrderId, priority: f64 },
    /// Removing an absent key is a no-op.
    Remove { path: QueuePath },
}

impl QueueWrite {
    pub fn path(&self) -> QueuePath {
        match self {
            QueueWrite::Set { path, .. } | QueueWrite::Merge { path, .. } | QueueWrite::Remove { path } => {
                path.clone()
            }
            QueueWrite::SetPriority { order_id, .. } => QueuePath::queue(order_id.clone()),
        }
    }
}

/// Realtime tree holding `/queue`, `/active` and `/agents/{id}/location`.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn get(&self, path: &QueuePath) -> StoreResult<Option<QueueItem>>;

    /// Applies every write or none of them.
    async fn update(&self, writes: Vec<QueueWrite>) -> StoreResult<()>;

    /// Full read of one subtree.
    async fn snapshot(&self, subtree: Subtree) -> StoreResult<BTreeMap<OrderId, QueueItem>>;

    async fn write_agent_location(&self, agent_id: &AgentId, location: Option<AgentLocation>) -> StoreResult<()>;

    async fn agent_location(&self, agent_id: &AgentId) -> StoreResult<Option<AgentLocation>>;

    /// Whole-record overwrite.
    async fn set(&self, path: &QueuePath, item: QueueItem) -> StoreResult<()> {
        self.update(vec![QueueWrite::Set { path: path.clone(), item }]).await
    }

    async fn merge(&self, path: &QueuePath, patch: QueuePatch) -> StoreResult<()> {
        self.update(vec![QueueWrite::Merge { path: path.clone(), patch }]).await
    }

    async fn remove(&self, path: &QueuePath) -> StoreResult<()> {
        self.update(vec![QueueWrite::Remove { path: path.clone() }]).await
    }
}
