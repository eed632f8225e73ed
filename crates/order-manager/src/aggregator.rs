//! Aggregator
//!
//! Root orchestrator of the pipeline. Owns the source registry, the order
//! registry, the position table and the event bus, and wires the risk manager,
//! the dispatch queue and the execution adapter together.
//!
//! ## Order Flow
//!
//! ```text
//! Source ──► submit_order ──► RiskManager ──► QueueManager ──► ExecutionStage
//!   ▲            │ (sync accept/reject)                              │
//!   │            ▼                                                   ▼
//!   └──── SourceEvent ◄──── outcome loop ◄──── QueueEvent ◄──── Fill / failure
//!                                │
//!                                ├──► PositionTable (each fill once)
//!                                └──► EventBus (PipelineEvent)
//! ```
//!
//! Acceptance is reported synchronously; execution outcomes arrive later on
//! the source's event channel.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use keel_core::{
    Fill, InstrumentCatalog, Order, OrderId, OrderStatus, Position, SourceId,
};
use keel_gateway::{AdapterKind, ExecutionAdapter};
use keel_ports::{Clock, PriceFeed};
use keel_risk_manager::{AccountState, EnforcementMode, RiskLimits, RiskManager};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::events::{EventBus, EventKind, PipelineEvent, SourceEvent};
use crate::execution::ExecutionStage;
use crate::position::PositionTable;
use crate::queue::{DispatchOutcome, QueueConfig, QueueEvent, QueueManager};
use crate::sltp::SltpCalculator;

/// Configuration for the Aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub queue: QueueConfig,
    pub risk: RiskLimits,
    /// Account equity before any fills (dollars)
    pub starting_equity: Decimal,
    /// Capacity of the pipeline event broadcast
    pub event_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            risk: RiskLimits::default(),
            starting_equity: dec!(100_000),
            event_capacity: 1024,
        }
    }
}

/// Collaborators injected at startup
pub struct AggregatorParts {
    pub catalog: Arc<InstrumentCatalog>,
    pub adapter: Arc<dyn ExecutionAdapter>,
    pub prices: Arc<dyn PriceFeed>,
    pub clock: Arc<dyn Clock>,
}

/// Orders resolved during the life of the pipeline vs. force-cancelled at shutdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Orders that reached FILLED or FAILED
    pub completed: Vec<OrderId>,
    /// Orders cancelled because the drain window elapsed
    pub cancelled: Vec<OrderId>,
}

#[derive(Debug, Clone)]
struct OrderRecord {
    order: Order,
    fill: Option<Fill>,
    /// Outcome handed to the source
    resolved: bool,
}

struct Inner {
    config: AggregatorConfig,
    catalog: Arc<InstrumentCatalog>,
    prices: Arc<dyn PriceFeed>,
    clock: Arc<dyn Clock>,
    adapter_kind: AdapterKind,
    risk: RiskManager,
    queue: Arc<QueueManager>,
    sources: DashMap<SourceId, mpsc::UnboundedSender<SourceEvent>>,
    orders: DashMap<OrderId, OrderRecord>,
    positions: PositionTable,
    events: EventBus,
    accepting: AtomicBool,
    settled: Notify,
    shutdown_cancels: Mutex<Vec<OrderId>>,
}

pub struct Aggregator {
    inner: Arc<Inner>,
    dispatch_loop: Mutex<Option<JoinHandle<()>>>,
    outcome_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Aggregator {
    /// Build the pipeline and start its dispatch and outcome loops
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: AggregatorConfig, parts: AggregatorParts) -> Result<Self> {
        let queue = Arc::new(QueueManager::new(config.queue.clone())?);

        let adapter_kind = parts.adapter.kind();
        let mode = match adapter_kind {
            AdapterKind::Real => EnforcementMode::Enforce,
            AdapterKind::Shadow => EnforcementMode::Observe,
        };
        let risk = RiskManager::new(config.risk.clone(), mode, Arc::clone(&parts.clock));

        let stage = ExecutionStage::new(
            Arc::clone(&parts.adapter),
            SltpCalculator::new(Arc::clone(&parts.catalog)),
            Arc::clone(&parts.prices),
        );

        let inner = Arc::new(Inner {
            events: EventBus::new(config.event_capacity),
            config,
            catalog: parts.catalog,
            prices: parts.prices,
            clock: parts.clock,
            adapter_kind,
            risk,
            queue: Arc::clone(&queue),
            sources: DashMap::new(),
            orders: DashMap::new(),
            positions: PositionTable::new(),
            accepting: AtomicBool::new(true),
            settled: Notify::new(),
            shutdown_cancels: Mutex::new(Vec::new()),
        });

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let dispatch_loop = queue.start(Arc::new(stage), queue_tx);
        let outcome_loop = tokio::spawn(Arc::clone(&inner).outcome_loop(queue_rx));

        info!(
            "[AGGREGATOR] Started with {:?} adapter ({:?} risk), {} instruments",
            adapter_kind,
            mode,
            inner.catalog.len()
        );

        Ok(Self {
            inner,
            dispatch_loop: Mutex::new(Some(dispatch_loop)),
            outcome_loop: Mutex::new(Some(outcome_loop)),
        })
    }

    /// Register a source and get its outcome channel
    pub fn register_source(
        &self,
        source_id: impl Into<SourceId>,
    ) -> Result<mpsc::UnboundedReceiver<SourceEvent>> {
        let source_id = source_id.into();
        match self.inner.sources.entry(source_id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateSource(source_id)),
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::unbounded_channel();
                slot.insert(tx);
                info!("[AGGREGATOR] Registered source {}", source_id);
                Ok(rx)
            }
        }
    }

    /// Stop delivering outcomes to a source; its accepted orders still run
    pub fn unregister_source(&self, source_id: &str) -> bool {
        let removed = self.inner.sources.remove(source_id).is_some();
        if removed {
            info!("[AGGREGATOR] Unregistered source {}", source_id);
        }
        removed
    }

    /// Validate and enqueue an order
    ///
    /// `Ok` means the order is queued; its outcome is delivered to the source.
    pub fn submit_order(&self, mut order: Order) -> Result<OrderId> {
        let inner = &self.inner;
        if !inner.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if !inner.sources.contains_key(&order.source_id) {
            return Err(Error::UnknownSource(order.source_id.clone()));
        }

        let now = inner.clock.now();
        order.status = OrderStatus::Pending;
        order.submitted_at = now;
        let order_id = order.id;

        match inner.orders.entry(order_id) {
            Entry::Occupied(_) => return Err(Error::DuplicateOrder(order_id)),
            Entry::Vacant(slot) => {
                slot.insert(OrderRecord {
                    order: order.clone(),
                    fill: None,
                    resolved: false,
                });
            }
        }
        inner.events.publish(
            EventKind::Submitted,
            order_id,
            now,
            json!({
                "source_id": order.source_id,
                "symbol": order.symbol,
                "side": order.side,
                "order_type": order.order_type,
                "quantity": order.quantity,
            }),
        );

        // Static shape and instrument
        if let Err(e) = order.validate().and_then(|_| inner.catalog.get(&order.symbol).map(|_| ())) {
            let reasons = vec![e.to_string()];
            inner.reject(&order, "invalid_order", reasons);
            return Err(Error::InvalidOrder(e));
        }

        // Risk
        let account = inner.account_state();
        let validation = inner.risk.validate(&order, &account);
        for violation in &validation.violations {
            inner.events.publish(
                EventKind::RiskViolation,
                order_id,
                violation.timestamp,
                json!({
                    "kind": violation.kind,
                    "threshold": violation.threshold,
                    "observed": violation.observed,
                    "enforced": inner.risk.mode() == EnforcementMode::Enforce,
                }),
            );
        }
        if !validation.valid {
            let reasons = validation.reasons();
            inner.reject(&order, "risk_rejected", reasons.clone());
            return Err(Error::ValidationRejected { order_id, reasons });
        }
        inner.transition(order_id, OrderStatus::Validated);
        order.status = OrderStatus::Validated;

        // Queue
        inner.transition(order_id, OrderStatus::Queued);
        order.status = OrderStatus::Queued;
        let priority = inner.config.queue.priorities.priority(order.order_type);
        if let Err(e) = inner.queue.enqueue(order.clone()) {
            inner.reject(&order, "queue_overflow", vec![e.to_string()]);
            return Err(e);
        }
        inner.events.publish(
            EventKind::Queued,
            order_id,
            now,
            json!({ "priority": priority, "depth": inner.queue.len() }),
        );
        debug!(
            "[AGGREGATOR] Accepted {} from {} ({:?} {} {})",
            order_id, order.source_id, order.side, order.quantity, order.symbol
        );
        Ok(order_id)
    }

    /// Cancel an order that has not started executing
    ///
    /// Unknown, executing and terminal orders all yield `CancelNotFound`.
    pub fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        let inner = &self.inner;
        let cancellable = inner
            .orders
            .get(&order_id)
            .map(|r| r.order.status.is_cancellable())
            .unwrap_or(false);
        if !cancellable {
            return Err(Error::CancelNotFound(order_id));
        }
        let Some(order) = inner.queue.remove(order_id) else {
            return Err(Error::CancelNotFound(order_id));
        };

        info!("[AGGREGATOR] Cancelled {} on request", order_id);
        inner.cancel(&order, "cancelled by request");
        Ok(())
    }

    /// Stop accepting, drain for up to `drain_timeout`, cancel what remains
    pub async fn shutdown(&self, drain_timeout: Duration) -> ShutdownReport {
        let inner = &self.inner;
        if !inner.accepting.swap(false, Ordering::SeqCst) {
            return ShutdownReport::default();
        }
        info!(
            "[AGGREGATOR] Shutting down: {} queued, {} in flight, drain window {}ms",
            inner.queue.len(),
            inner.queue.in_flight(),
            drain_timeout.as_millis()
        );

        let deadline = tokio::time::Instant::now() + drain_timeout;
        loop {
            let settled = inner.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();
            if inner.unsettled() == 0 {
                break;
            }
            if tokio::time::timeout_at(deadline, settled).await.is_err() {
                warn!(
                    "[AGGREGATOR] Drain window elapsed with {} orders unresolved",
                    inner.unsettled()
                );
                break;
            }
        }

        // Stop dispatching, then let the outcome loop flush what already finished
        let dispatch_loop = self.dispatch_loop.lock().take();
        if let Some(handle) = dispatch_loop {
            handle.abort();
            let _ = handle.await;
        }
        for order in inner.queue.drain() {
            inner.cancel(&order, "shutdown");
        }
        let aborted = inner.queue.abort_in_flight().await;
        if aborted > 0 {
            warn!("[AGGREGATOR] Aborted {} in-flight executions", aborted);
        }
        let outcome_loop = self.outcome_loop.lock().take();
        if let Some(handle) = outcome_loop {
            let _ = handle.await;
        }

        // Anything still unresolved was executing when we stopped
        let stranded: Vec<Order> = inner
            .orders
            .iter()
            .filter(|r| !r.order.status.is_terminal())
            .map(|r| r.order.clone())
            .collect();
        for order in &stranded {
            inner.cancel(order, "shutdown");
        }

        let mut report = ShutdownReport {
            completed: inner
                .orders
                .iter()
                .filter(|r| matches!(r.order.status, OrderStatus::Filled | OrderStatus::Failed))
                .map(|r| r.order.id)
                .collect(),
            cancelled: inner.shutdown_cancels.lock().clone(),
        };
        report.completed.sort();
        report.cancelled.sort();

        info!(
            "[AGGREGATOR] Shutdown complete: {} completed, {} cancelled",
            report.completed.len(),
            report.cancelled.len()
        );
        report
    }

    /// Rebase daily loss accounting (start of a trading day)
    pub fn reset_daily(&self) {
        let previous = self.inner.positions.reset_daily();
        info!("[AGGREGATOR] Daily reset: realized PnL was {}", previous);
    }

    /// Forget orders whose outcome has already reached their source
    ///
    /// Order records and applied-fill markers are kept for the life of the
    /// pipeline unless evicted here. Evicted orders no longer answer
    /// `order_status`, `order` or `fill`, are not listed in a later
    /// `ShutdownReport`, and their ids are no longer checked for duplicates.
    /// Positions and daily PnL are unaffected.
    pub fn evict_resolved(&self) -> usize {
        let inner = &self.inner;
        let mut evicted = Vec::new();
        inner.orders.retain(|id, record| {
            let done = record.resolved && record.order.status.is_terminal();
            if done {
                evicted.push(*id);
            }
            !done
        });
        for id in &evicted {
            inner.positions.forget(*id);
        }
        if !evicted.is_empty() {
            debug!("[AGGREGATOR] Evicted {} resolved orders", evicted.len());
        }
        evicted.len()
    }

    /// Order records currently held, resolved or not
    pub fn tracked_orders(&self) -> usize {
        self.inner.orders.len()
    }

    pub fn order_status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.inner.orders.get(&order_id).map(|r| r.order.status)
    }

    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.inner.orders.get(&order_id).map(|r| r.order.clone())
    }

    pub fn fill(&self, order_id: OrderId) -> Option<Fill> {
        self.inner.orders.get(&order_id).and_then(|r| r.fill.clone())
    }

    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.inner.positions.get(symbol)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.inner.positions.snapshot()
    }

    pub fn account_state(&self) -> AccountState {
        self.inner.account_state()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.queue.in_flight()
    }

    /// Risk manager, for violation ledger access
    pub fn risk(&self) -> &RiskManager {
        &self.inner.risk
    }

    pub fn adapter_kind(&self) -> AdapterKind {
        self.inner.adapter_kind
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatch_loop.get_mut().take() {
            handle.abort();
        }
        if let Some(handle) = self.outcome_loop.get_mut().take() {
            handle.abort();
        }
    }
}

impl Inner {
    async fn outcome_loop(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<QueueEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                QueueEvent::Dispatched { order_id } => {
                    self.transition(order_id, OrderStatus::Executing);
                    self.events
                        .publish(EventKind::Dispatched, order_id, self.clock.now(), json!({}));
                }
                QueueEvent::Retrying {
                    order_id,
                    attempt,
                    delay_ms,
                    reason,
                } => {
                    self.events.publish(
                        EventKind::Retrying,
                        order_id,
                        self.clock.now(),
                        json!({ "attempt": attempt, "delay_ms": delay_ms, "reason": reason }),
                    );
                }
                QueueEvent::Finished { order_id, outcome } => match outcome {
                    DispatchOutcome::Filled(fill) => self.on_fill(order_id, fill),
                    DispatchOutcome::Failed { error, attempts } => {
                        self.transition(order_id, OrderStatus::Failed);
                        let reason = error.to_string();
                        self.events.publish(
                            EventKind::Failed,
                            order_id,
                            self.clock.now(),
                            json!({ "code": error.code(), "reason": reason, "attempts": attempts }),
                        );
                        self.notify_source(
                            order_id,
                            SourceEvent::Failed {
                                order_id,
                                code: error.code().to_string(),
                                reason,
                                attempts,
                            },
                        );
                        self.settled.notify_waiters();
                    }
                },
            }
        }
        debug!("[AGGREGATOR] Outcome loop stopped");
    }

    fn on_fill(&self, order_id: OrderId, fill: Fill) {
        match self.catalog.multiplier(&fill.symbol) {
            Ok(multiplier) => {
                if let Some(realized) = self.positions.apply(&fill, multiplier)
                    && !realized.is_zero()
                {
                    info!("[AGGREGATOR] {} realized {} on {}", fill.symbol, realized, order_id);
                }
            }
            Err(e) => warn!("[AGGREGATOR] Fill {} not applied to positions: {}", order_id, e),
        }

        self.transition(order_id, OrderStatus::Filled);
        if let Some(mut record) = self.orders.get_mut(&order_id) {
            record.fill = Some(fill.clone());
        }
        self.events.publish(
            EventKind::Filled,
            order_id,
            fill.timestamp,
            json!({
                "price": fill.price,
                "quantity": fill.quantity,
                "stop_price": fill.stop_price,
                "take_profit_price": fill.take_profit_price,
            }),
        );
        self.notify_source(order_id, SourceEvent::Filled { order_id, fill });
        self.settled.notify_waiters();
    }

    fn account_state(&self) -> AccountState {
        let unrealized = self.positions.unrealized(self.prices.as_ref(), &self.catalog);
        AccountState {
            equity: self.config.starting_equity + self.positions.total_realized() + unrealized,
            realized_pnl: self.positions.realized_today(),
            unrealized_pnl: unrealized,
            open_symbols: self.positions.open_symbols(),
        }
    }

    fn transition(&self, order_id: OrderId, next: OrderStatus) {
        if let Some(mut record) = self.orders.get_mut(&order_id)
            && let Err(e) = record.order.transition(next)
        {
            warn!("[AGGREGATOR] {}", e);
        }
    }

    fn reject(&self, order: &Order, code: &str, reasons: Vec<String>) {
        self.transition(order.id, OrderStatus::Rejected);
        self.events.publish(
            EventKind::Rejected,
            order.id,
            self.clock.now(),
            json!({ "code": code, "reasons": reasons }),
        );
        self.notify_source(
            order.id,
            SourceEvent::Rejected {
                order_id: order.id,
                code: code.to_string(),
                reasons,
            },
        );
    }

    fn cancel(&self, order: &Order, reason: &str) {
        self.transition(order.id, OrderStatus::Cancelled);
        if reason == "shutdown" {
            self.shutdown_cancels.lock().push(order.id);
        }
        self.events.publish(
            EventKind::Cancelled,
            order.id,
            self.clock.now(),
            json!({ "reason": reason }),
        );
        self.notify_source(
            order.id,
            SourceEvent::Cancelled {
                order_id: order.id,
                reason: reason.to_string(),
            },
        );
        self.settled.notify_waiters();
    }

    fn notify_source(&self, order_id: OrderId, event: SourceEvent) {
        let source_id = match self.orders.get_mut(&order_id) {
            Some(mut record) => {
                record.resolved = true;
                record.order.source_id.clone()
            }
            None => return,
        };
        let delivered = self
            .sources
            .get(&source_id)
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false);
        if !delivered {
            debug!(
                "[AGGREGATOR] No listener for {} (order {})",
                source_id, order_id
            );
        }
    }

    /// Orders accepted but not yet terminal
    fn unsettled(&self) -> usize {
        self.orders
            .iter()
            .filter(|r| !r.order.status.is_terminal())
            .count()
    }
}
