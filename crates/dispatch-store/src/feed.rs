use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use dispatch_core::ChangeEvent;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::{StoreError, StoreResult};

/// Fan-out of store change notifications to subscribers.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Mutex<Vec<UnboundedSender<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn subscribe(&self) -> UnboundedReceiver<ChangeEvent> {
        let (tx, rx) = unbounded_channel();
        self.attach(tx);
        rx
    }

    /// Route notifications into an existing channel, so several stores can share one.
    pub fn attach(&self, tx: UnboundedSender<ChangeEvent>) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
    }

    pub fn publish(&self, event: ChangeEvent) {
        let Ok(mut subs) = self.subscribers.lock() else {
            return;
        };
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Makes the next N reads or writes fail with [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct FailureInjector {
    reads: AtomicU32,
    writes: AtomicU32,
}

impl FailureInjector {
    pub fn fail_next_reads(&self, n: u32) {
        self.reads.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, n: u32) {
        self.writes.store(n, Ordering::SeqCst);
    }

    pub fn check_read(&self) -> StoreResult<()> {
        Self::take(&self.reads, "injected read failure")
    }

    pub fn check_write(&self) -> StoreResult<()> {
        Self::take(&self.writes, "injected write failure")
    }

    fn take(counter: &AtomicU32, msg: &str) -> StoreResult<()> {
        let hit = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            Err(StoreError::unavailable(msg))
        } else {
            Ok(())
        }
    }
}
