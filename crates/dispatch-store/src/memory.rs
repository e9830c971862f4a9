use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use dispatch_core::{
    AgentId, AgentLocation, ChangeEvent, Order, OrderId, OrderKey, OrderPatch, QueueItem, QueuePath, Subtree,
    UserId, UserProfile,
};
use tracing::trace;

use crate::error::StoreResult;
use crate::feed::{ChangeFeed, FailureInjector};
use crate::traits::{OrderMutation, QueueStore, QueueWrite, RecordStore};

/// In-memory authoritative store for tests, scenario replay and the CLI.
/// Not durable. Every committed write publishes change events, no-op writes included.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: Mutex<RecordInner>,
    feed: ChangeFeed,
    failures: FailureInjector,
    user_failures: FailureInjector,
}

#[derive(Debug, Default)]
struct RecordInner {
    orders: BTreeMap<OrderKey, Order>,
    users: HashMap<UserId, UserProfile>,
    writes: u64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Failure injection for order reads and writes.
    pub fn failures(&self) -> &FailureInjector {
        &self.failures
    }

    /// Failure injection for profile lookups only.
    pub fn user_failures(&self) -> &FailureInjector {
        &self.user_failures
    }

    /// Committed order writes so far.
    pub fn write_count(&self) -> StoreResult<u64> {
        Ok(self.inner.lock()?.writes)
    }

    pub fn orders(&self) -> StoreResult<BTreeMap<OrderKey, Order>> {
        Ok(self.inner.lock()?.orders.clone())
    }

    fn commit(&self, key: &OrderKey, after: Option<Order>) -> StoreResult<Option<Order>> {
        let before = {
            let mut inner = self.inner.lock()?;
            inner.writes += 1;
            match &after {
                Some(order) => inner.orders.insert(key.clone(), order.clone()),
                None => inner.orders.remove(key),
            }
        };
        trace!(key = %key, "order write committed");
        if before.is_none() {
            if let Some(order) = &after {
                self.feed.publish(ChangeEvent::OrderCreated {
                    key: key.clone(),
                    order: Some(order.clone()),
                });
            }
        }
        self.feed.publish(ChangeEvent::OrderWritten {
            key: key.clone(),
            before: before.clone(),
            after,
        });
        Ok(before)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_order(&self, key: &OrderKey) -> StoreResult<Option<Order>> {
        self.failures.check_read()?;
        Ok(self.inner.lock()?.orders.get(key).cloned())
    }

    async fn put_order(&self, key: &OrderKey, order: Order) -> StoreResult<()> {
        self.failures.check_write()?;
        self.commit(key, Some(order))?;
        Ok(())
    }

    async fn merge_order(&self, key: &OrderKey, patch: &OrderPatch) -> StoreResult<bool> {
        self.failures.check_write()?;
        let merged = {
            let inner = self.inner.lock()?;
            inner.orders.get(key).cloned().map(|mut order| {
                order.apply_patch(patch);
                order
            })
        };
        match merged {
            Some(order) => {
                self.commit(key, Some(order))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_order(&self, key: &OrderKey) -> StoreResult<()> {
        self.failures.check_write()?;
        let exists = self.inner.lock()?.orders.contains_key(key);
        if exists {
            self.commit(key, None)?;
        }
        Ok(())
    }

    async fn transact_order(&self, key: &OrderKey, mutation: OrderMutation) -> StoreResult<Option<Order>> {
        self.failures.check_write()?;
        // Read, mutate and write under one lock so no other writer interleaves.
        let (committed, before) = {
            let mut inner = self.inner.lock()?;
            let Some(current) = inner.orders.get(key).cloned() else {
                return Ok(None);
            };
            let Some(patch) = mutation(&current) else {
                return Ok(Some(current));
            };
            let mut next = current.clone();
            next.apply_patch(&patch);
            inner.orders.insert(key.clone(), next.clone());
            inner.writes += 1;
            (next, current)
        };
        self.feed.publish(ChangeEvent::OrderWritten {
            key: key.clone(),
            before: Some(before),
            after: Some(committed.clone()),
        });
        Ok(Some(committed))
    }

    async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<UserProfile>> {
        self.user_failures.check_read()?;
        Ok(self.inner.lock()?.users.get(user_id).cloned())
    }

    async fn put_user(&self, user_id: &UserId, profile: UserProfile) -> StoreResult<()> {
        self.inner.lock()?.users.insert(user_id.clone(), profile);
        Ok(())
    }
}

/// Committed batches retained for inspection; older ones are dropped.
pub const BATCH_HISTORY: usize = 256;

/// In-memory realtime tree. Notifies only when a value actually changes.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    inner: Mutex<QueueInner>,
    feed: ChangeFeed,
    failures: FailureInjector,
}

#[derive(Debug, Default)]
struct QueueInner {
    queue: BTreeMap<OrderId, QueueItem>,
    active: BTreeMap<OrderId, QueueItem>,
    agents: BTreeMap<AgentId, AgentLocation>,
    batches: VecDeque<Vec<QueueWrite>>,
}

impl QueueInner {
    fn tree(&self, subtree: Subtree) -> &BTreeMap<OrderId, QueueItem> {
        match subtree {
            Subtree::Queue => &self.queue,
            Subtree::Active => &self.active,
        }
    }

    fn tree_mut(&mut self, subtree: Subtree) -> &mut BTreeMap<OrderId, QueueItem> {
        match subtree {
            Subtree::Queue => &mut self.queue,
            Subtree::Active => &mut self.active,
        }
    }

    fn apply(&mut self, write: &QueueWrite) {
        match write {
            QueueWrite::Set { path, item } => {
                self.tree_mut(path.subtree).insert(path.order_id.clone(), item.clone());
            }
            QueueWrite::Merge { path, patch } => {
                self.tree_mut(path.subtree)
                    .entry(path.order_id.clone())
                    .and_modify(|item| item.apply_patch(patch))
                    .or_insert_with(|| QueueItem::from_patch(patch));
            }
            QueueWrite::SetPriority { order_id, priority } => {
                if let Some(item) = self.queue.get_mut(order_id) {
                    item.priority = Some(*priority);
                }
            }
            QueueWrite::Remove { path } => {
                self.tree_mut(path.subtree).remove(&path.order_id);
            }
        }
    }
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn failures(&self) -> &FailureInjector {
        &self.failures
    }

    /// The last [`BATCH_HISTORY`] committed `update` batches, in commit order.
    pub fn batches(&self) -> StoreResult<Vec<Vec<QueueWrite>>> {
        Ok(self.inner.lock()?.batches.iter().cloned().collect())
    }

    pub fn items(&self, subtree: Subtree) -> StoreResult<BTreeMap<OrderId, QueueItem>> {
        Ok(self.inner.lock()?.tree(subtree).clone())
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn get(&self, path: &QueuePath) -> StoreResult<Option<QueueItem>> {
        self.failures.check_read()?;
        Ok(self.inner.lock()?.tree(path.subtree).get(&path.order_id).cloned())
    }

    async fn update(&self, writes: Vec<QueueWrite>) -> StoreResult<()> {
        self.failures.check_write()?;
        if writes.is_empty() {
            return Ok(());
        }

        let mut touched: BTreeMap<QueuePath, (Option<QueueItem>, Option<QueueItem>)> = BTreeMap::new();
        {
            let mut inner = self.inner.lock()?;
            for write in &writes {
                let path = write.path();
                let prior = inner.tree(path.subtree).get(&path.order_id).cloned();
                touched.entry(path).or_insert((prior, None));
                inner.apply(write);
            }
            for (path, (_, after)) in touched.iter_mut() {
                *after = inner.tree(path.subtree).get(&path.order_id).cloned();
            }
            if inner.batches.len() == BATCH_HISTORY {
                inner.batches.pop_front();
            }
            inner.batches.push_back(writes);
        }

        for (path, (before, after)) in touched {
            if before != after {
                trace!(path = %path, "queue value changed");
                self.feed.publish(ChangeEvent::LiveItemWritten { path, before, after });
            }
        }
        Ok(())
    }

    async fn snapshot(&self, subtree: Subtree) -> StoreResult<BTreeMap<OrderId, QueueItem>> {
        self.failures.check_read()?;
        Ok(self.inner.lock()?.tree(subtree).clone())
    }

    async fn write_agent_location(&self, agent_id: &AgentId, location: Option<AgentLocation>) -> StoreResult<()> {
        self.failures.check_write()?;
        let before = {
            let mut inner = self.inner.lock()?;
            match &location {
                Some(loc) => inner.agents.insert(agent_id.clone(), loc.clone()),
                None => inner.agents.remove(agent_id),
            }
        };
        if before != location {
            self.feed.publish(ChangeEvent::AgentLocationWritten {
                agent_id: agent_id.clone(),
                before,
                after: location,
            });
        }
        Ok(())
    }

    async fn agent_location(&self, agent_id: &AgentId) -> StoreResult<Option<AgentLocation>> {
        self.failures.check_read()?;
        Ok(self.inner.lock()?.agents.get(agent_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::QueuePatch;

    fn patch(order_id: &str, status: &str) -> QueuePatch {
        QueuePatch {
            restaurant_id: "r1".into(),
            order_id: order_id.into(),
            status: status.into(),
            created_at_ms: None,
        }
    }

    #[tokio::test]
    async fn put_order_publishes_created_and_written() {
        let store = InMemoryRecordStore::new();
        let mut rx = store.feed().subscribe();
        let key = OrderKey::new("r1", "o1");
        store.put_order(&key, Order::default()).await.unwrap();

        assert!(matches!(rx.try_recv().unwrap(), ChangeEvent::OrderCreated { .. }));
        assert!(matches!(rx.try_recv().unwrap(), ChangeEvent::OrderWritten { before: None, .. }));

        store.put_order(&key, Order::default()).await.unwrap();
        // Second write is an update only.
        assert!(matches!(rx.try_recv().unwrap(), ChangeEvent::OrderWritten { before: Some(_), .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn merge_order_does_not_create() {
        let store = InMemoryRecordStore::new();
        let key = OrderKey::new("r1", "missing");
        assert!(!store.merge_order(&key, &OrderPatch::status("ready")).await.unwrap());
        assert!(store.get_order(&key).await.unwrap().is_none());
        assert_eq!(store.write_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn transaction_without_patch_commits_nothing() {
        let store = InMemoryRecordStore::new();
        let key = OrderKey::new("r1", "o1");
        store.put_order(&key, Order::default()).await.unwrap();
        let out = store.transact_order(&key, Box::new(|_| None)).await.unwrap();
        assert!(out.is_some());
        assert_eq!(store.write_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn merge_creates_missing_queue_record() {
        let store = InMemoryQueueStore::new();
        let path = QueuePath::queue("o1");
        store.merge(&path, patch("o1", "ready")).await.unwrap();
        let item = store.get(&path).await.unwrap().unwrap();
        assert_eq!(item.status.as_deref(), Some("ready"));
        assert_eq!(item.priority, None);
    }

    #[tokio::test]
    async fn priority_write_never_materializes_a_record() {
        let store = InMemoryQueueStore::new();
        store
            .update(vec![QueueWrite::SetPriority {
                order_id: "gone".into(),
                priority: 1.0,
            }])
            .await
            .unwrap();
        assert!(store.items(Subtree::Queue).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unchanged_values_do_not_notify() {
        let store = InMemoryQueueStore::new();
        let mut rx = store.feed().subscribe();
        let path = QueuePath::queue("o1");
        store.merge(&path, patch("o1", "ready")).await.unwrap();
        assert!(rx.try_recv().is_ok());
        store.merge(&path, patch("o1", "ready")).await.unwrap();
        store.remove(&QueuePath::active("o1")).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_update_applies_nothing() {
        let store = InMemoryQueueStore::new();
        store.failures().fail_next_writes(1);
        let err = store.merge(&QueuePath::queue("o1"), patch("o1", "ready")).await;
        assert!(err.is_err());
        assert!(store.items(Subtree::Queue).unwrap().is_empty());
        assert!(store.batches().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_update_is_not_a_batch() {
        let store = InMemoryQueueStore::new();
        store.update(vec![]).await.unwrap();
        assert!(store.batches().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_history_is_bounded() {
        let store = InMemoryQueueStore::new();
        for i in 0..BATCH_HISTORY + 10 {
            store.remove(&QueuePath::queue(format!("o{i}"))).await.unwrap();
        }
        let batches = store.batches().unwrap();
        assert_eq!(batches.len(), BATCH_HISTORY);
        let last = format!("o{}", BATCH_HISTORY + 9);
        assert_eq!(batches.last().unwrap()[0].path(), QueuePath::queue(last));
    }
}
