use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// ```text
/// Pending ─► Validated ─► Queued ─► Executing ─► { Filled | Rejected | Failed | Cancelled }
/// ```
///
/// Transitions only move forward. Any terminal state can be reached from any
/// non-terminal state; nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Received, not yet risk-checked
    Pending,
    /// Passed (or was observed by) risk validation
    Validated,
    /// Waiting in the dispatch queue
    Queued,
    /// Handed to the execution adapter
    Executing,
    /// Execution produced a fill
    Filled,
    /// Refused by risk validation or admission
    Rejected,
    /// Execution attempts exhausted or failed fatally
    Failed,
    /// Cancelled by the source or at shutdown
    Cancelled,
}

impl OrderStatus {
    fn stage(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Validated => 1,
            OrderStatus::Queued => 2,
            OrderStatus::Executing => 3,
            OrderStatus::Filled
            | OrderStatus::Rejected
            | OrderStatus::Failed
            | OrderStatus::Cancelled => 4,
        }
    }

    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.stage() == 4
    }

    /// Returns true if a source may still cancel the order
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Queued)
    }

    /// Returns true if moving to `next` keeps the lifecycle monotonic
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        !self.is_terminal() && next.stage() > self.stage()
    }
}
