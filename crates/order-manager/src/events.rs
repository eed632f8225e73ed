//! Typed outcome and monitoring events
//!
//! - [`SourceEvent`]: delivered to the source that submitted the order
//! - [`PipelineEvent`]: generic `{kind, order_id, timestamp, payload}` record
//!   broadcast to any monitoring collector

use keel_core::{Fill, OrderId, Timestamp};
use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Outcome of one order, sent to its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceEvent {
    Filled {
        order_id: OrderId,
        fill: Fill,
    },
    Rejected {
        order_id: OrderId,
        code: String,
        reasons: Vec<String>,
    },
    Failed {
        order_id: OrderId,
        code: String,
        reason: String,
        attempts: u32,
    },
    Cancelled {
        order_id: OrderId,
        reason: String,
    },
}

impl SourceEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            SourceEvent::Filled { order_id, .. }
            | SourceEvent::Rejected { order_id, .. }
            | SourceEvent::Failed { order_id, .. }
            | SourceEvent::Cancelled { order_id, .. } => *order_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Submitted,
    RiskViolation,
    Rejected,
    Queued,
    Dispatched,
    Retrying,
    Filled,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub kind: EventKind,
    pub order_id: OrderId,
    pub timestamp: Timestamp,
    pub payload: Value,
}

/// Broadcast bus for pipeline events; publishing never blocks
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, kind: EventKind, order_id: OrderId, timestamp: Timestamp, payload: Value) {
        let event = PipelineEvent {
            kind,
            order_id,
            timestamp,
            payload,
        };
        // No subscribers is fine
        if self.tx.send(event).is_err() {
            trace!("[EVENTS] No subscribers for {:?} {}", kind, order_id);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}
