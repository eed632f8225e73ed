//! Keel Order Manager
//!
//! The Order Manager sits between order sources and the execution gateway:
//! - **Admission**: every order is checked by the Risk Manager before queueing
//! - **Dispatch**: bounded priority queue with throttle, concurrency cap and retry
//! - **Protection**: stop-loss / take-profit levels derived from dollar amounts
//! - **Position Tracking**: positions built from fills, each fill applied once
//!
//! ## Architecture
//!
//! ```text
//! Sources ──► Orders ──► ┌────────────────────────────────────────┐
//!                        │              Aggregator                │
//!                        │  ┌─────────────────────────────────┐   │
//!                        │  │   Risk Manager                  │   │
//!                        │  │   - Enforce (real) / Observe    │   │
//!                        │  │     (shadow)                    │   │
//!                        │  └───────────────┬─────────────────┘   │
//!                        │                  │ Accepted            │
//!                        │  ┌───────────────▼─────────────────┐   │
//!                        │  │   Queue Manager                 │   │
//!                        │  │   - Priority: MARKET>STOP>LIMIT │   │
//!                        │  │   - Token bucket + slots        │   │
//!                        │  │   - Backoff + jitter retries    │   │
//!                        │  └───────────────┬─────────────────┘   │
//!                        │                  │ Dispatch            │
//!                        │  ┌───────────────▼─────────────────┐   │
//!                        │  │   Execution Stage               │   │
//!                        │  │   - SL/TP from dollar amounts   │   │
//!                        │  │   - Real or Shadow adapter      │   │
//!                        │  └───────────────┬─────────────────┘   │
//!                        └──────────────────┼─────────────────────┘
//!                                           │ Fills
//!                                           ▼
//!                          Position Table ──► SourceEvent / PipelineEvent
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_order_manager::{Aggregator, AggregatorConfig, AggregatorParts};
//!
//! let aggregator = Aggregator::start(AggregatorConfig::default(), parts)?;
//! let mut outcomes = aggregator.register_source("mes-breakout")?;
//!
//! let order = Order::market("mes-breakout", "MES", Side::Long, dec!(2))
//!     .with_stop_loss(dec!(100));
//! aggregator.submit_order(order)?;
//!
//! while let Some(event) = outcomes.recv().await {
//!     // SourceEvent::Filled / Rejected / Failed / Cancelled
//! }
//! ```

pub mod aggregator;
pub mod error;
pub mod events;
pub mod execution;
pub mod position;
pub mod queue;
pub mod sltp;

// Re-export main types
pub use aggregator::{Aggregator, AggregatorConfig, AggregatorParts, ShutdownReport};
pub use error::{CalculationError, DispatchError, Error, Result};
pub use events::{EventBus, EventKind, PipelineEvent, SourceEvent};
pub use execution::ExecutionStage;
pub use position::PositionTable;
pub use queue::{
    DispatchHandler, DispatchOutcome, PriorityTable, QueueConfig, QueueEvent, QueueManager,
    RetryConfig, ThrottleConfig,
};
pub use sltp::SltpCalculator;
