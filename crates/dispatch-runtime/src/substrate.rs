use dispatch_core::ChangeEvent;
use dispatch_sync::{Handlers, SyncOutcome};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::DeliveryConfig;

#[derive(Debug, Error)]
pub enum SubstrateError {
    /// The drain handled more events than `max_events` without going idle.
    #[error("event budget exhausted after {handled} events (last: {last})")]
    EventBudgetExhausted { handled: usize, last: String },
    #[error("event channel closed")]
    ChannelClosed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Successful handler invocations, duplicates included.
    pub delivered: u64,
    pub retried: u64,
    pub duplicates: u64,
    pub dead_lettered: u64,
}

/// An event whose handler kept failing.
#[derive(Clone, Debug, Serialize)]
pub struct DeadLetter {
    pub event: ChangeEvent,
    pub error: String,
    pub attempts: u32,
}

/// In-process stand-in for the managed trigger runtime: at-least-once
/// delivery of store change events to the handlers, with retry and backoff.
pub struct Substrate {
    handlers: Handlers,
    tx: UnboundedSender<ChangeEvent>,
    rx: UnboundedReceiver<ChangeEvent>,
    delivery: DeliveryConfig,
    stats: DeliveryStats,
    dead_letters: Vec<DeadLetter>,
}

impl Substrate {
    pub fn new(handlers: Handlers, delivery: DeliveryConfig) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            handlers,
            tx,
            rx,
            delivery,
            stats: DeliveryStats::default(),
            dead_letters: Vec::new(),
        }
    }

    /// Sender that store feeds attach to.
    pub fn sender(&self) -> UnboundedSender<ChangeEvent> {
        self.tx.clone()
    }

    pub fn inject(&self, event: ChangeEvent) -> Result<(), SubstrateError> {
        self.tx.send(event).map_err(|_| SubstrateError::ChannelClosed)
    }

    pub fn set_duplicate_deliveries(&mut self, on: bool) {
        self.delivery.duplicate_deliveries = on;
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    pub fn dead_letters(&self) -> &[DeadLetter] {
        &self.dead_letters
    }

    /// Delivers one event, retrying transient failures. Returns `None` when
    /// the event was dead-lettered.
    pub async fn deliver(&mut self, event: &ChangeEvent) -> Option<SyncOutcome> {
        let max_attempts = self.delivery.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.handlers.handle(event).await {
                Ok(outcome) => {
                    self.stats.delivered += 1;
                    debug!(event = %event.label(), attempt, ?outcome, "event handled");
                    return Some(outcome);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let wait = self.delivery.backoff_for(attempt);
                    let wait_ms = wait.as_millis() as u64;
                    warn!(event = %event.label(), attempt, error = %e, wait_ms, "handler failed; retrying");
                    self.stats.retried += 1;
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(event = %event.label(), attempts = attempt, error = %e, "handler failed; dead-lettering event");
                    self.stats.dead_lettered += 1;
                    self.dead_letters.push(DeadLetter {
                        event: event.clone(),
                        error: e.to_string(),
                        attempts: attempt,
                    });
                    return None;
                }
            }
        }
    }

    /// Drains the channel, including events produced while draining, until
    /// no event is pending.
    pub async fn run_until_idle(&mut self) -> Result<DeliveryStats, SubstrateError> {
        let mut handled = 0usize;
        while let Ok(event) = self.rx.try_recv() {
            handled += 1;
            if handled > self.delivery.max_events {
                return Err(SubstrateError::EventBudgetExhausted {
                    handled: handled - 1,
                    last: event.label(),
                });
            }
            self.deliver(&event).await;
            if self.delivery.duplicate_deliveries {
                self.stats.duplicates += 1;
                self.deliver(&event).await;
            }
        }
        Ok(self.stats)
    }
}
