//! Priority dispatch queue
//!
//! Bounded priority queue with a single dispatch loop:
//!
//! ```text
//! enqueue ──► ┌──────────────────────────┐
//!             │ PriorityQueue            │  priority desc,
//!             │ (type → priority, FIFO)  │  then submitted_at asc, then seq
//!             └────────────┬─────────────┘
//!                          │
//!        concurrency slot ─┤  (Semaphore, max_concurrent)
//!          throttle token ─┤  (TokenBucket, rate + burst)
//!                          ▼
//!                   attempt task ──► DispatchHandler ──► QueueEvent
//!                      │   ▲
//!                      └───┘ retry: backoff + jitter, one token per attempt
//! ```
//!
//! Enqueue never blocks: a full queue fails fast with `QueueOverflow`.

pub mod backoff;
pub mod throttle;

pub use backoff::RetryConfig;
pub use throttle::{ThrottleConfig, TokenBucket};

use async_trait::async_trait;
use keel_core::{Fill, Order, OrderId, OrderType, Timestamp};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use priority_queue::PriorityQueue;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{DispatchError, Error, Result};

/// Order type → dispatch priority (higher dispatches first)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityTable {
    pub by_type: HashMap<OrderType, u8>,
    /// Priority for types missing from `by_type`
    pub default_priority: u8,
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self {
            by_type: HashMap::from([
                (OrderType::Market, 10),
                (OrderType::Stop, 9),
                (OrderType::Limit, 5),
            ]),
            default_priority: 1,
        }
    }
}

impl PriorityTable {
    pub fn priority(&self, order_type: OrderType) -> u8 {
        self.by_type
            .get(&order_type)
            .copied()
            .unwrap_or(self.default_priority)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of queued (not yet dispatched) orders
    pub capacity: usize,
    pub priorities: PriorityTable,
    pub throttle: ThrottleConfig,
    /// Maximum simultaneously executing orders
    pub max_concurrent: usize,
    pub retry: RetryConfig,
    /// Bound on a single execution attempt (ms)
    pub attempt_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            priorities: PriorityTable::default(),
            throttle: ThrottleConfig::default(),
            max_concurrent: 5,
            retry: RetryConfig::default(),
            attempt_timeout_ms: 10_000,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be positive".into()));
        }
        if self.max_concurrent == 0 {
            return Err(Error::InvalidConfig("max_concurrent must be positive".into()));
        }
        if !(self.throttle.rate_per_sec.is_finite() && self.throttle.rate_per_sec > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "throttle rate {} must be positive",
                self.throttle.rate_per_sec
            )));
        }
        if self.throttle.burst == 0 {
            return Err(Error::InvalidConfig("throttle burst must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts must be positive".into()));
        }
        Ok(())
    }
}

/// Executes one attempt for a dispatched order
#[async_trait]
pub trait DispatchHandler: Send + Sync {
    async fn dispatch(
        &self,
        order: &Order,
        attempt: u32,
    ) -> std::result::Result<Fill, DispatchError>;
}

/// Final result of a dispatched order
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Filled(Fill),
    Failed { error: DispatchError, attempts: u32 },
}

/// Progress reported by the dispatch loop
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// Order left the queue and its first attempt is starting
    Dispatched { order_id: OrderId },
    /// An attempt failed and another one is scheduled
    Retrying {
        order_id: OrderId,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },
    Finished {
        order_id: OrderId,
        outcome: DispatchOutcome,
    },
}

/// Heap key: priority desc, then oldest submission, then enqueue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey(u8, Reverse<Timestamp>, Reverse<u64>);

struct QueueState {
    heap: PriorityQueue<OrderId, QueueKey>,
    orders: HashMap<OrderId, Order>,
    next_seq: u64,
}

pub struct QueueManager {
    config: QueueConfig,
    state: Mutex<QueueState>,
    work: Notify,
    throttle: TokenBucket,
    slots: Arc<Semaphore>,
    in_flight: AtomicUsize,
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl QueueManager {
    pub fn new(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        let throttle = TokenBucket::new(&config.throttle);
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            state: Mutex::new(QueueState {
                heap: PriorityQueue::with_capacity(config.capacity),
                orders: HashMap::with_capacity(config.capacity),
                next_seq: 0,
            }),
            work: Notify::new(),
            throttle,
            slots,
            in_flight: AtomicUsize::new(0),
            tasks: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
            config,
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add an order; fails fast when the queue is at capacity or closed
    pub fn enqueue(&self, order: Order) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ShuttingDown);
        }
        let priority = self.config.priorities.priority(order.order_type);
        {
            let mut state = self.state.lock();
            if state.heap.len() >= self.config.capacity {
                warn!(
                    "[QUEUE] Overflow: rejecting {} (capacity {})",
                    order.id, self.config.capacity
                );
                return Err(Error::QueueOverflow {
                    capacity: self.config.capacity,
                });
            }
            if state.orders.contains_key(&order.id) {
                return Err(Error::DuplicateOrder(order.id));
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            let key = QueueKey(priority, Reverse(order.submitted_at), Reverse(seq));
            debug!(
                "[QUEUE] Enqueued {} {:?} priority {} (depth {})",
                order.id,
                order.order_type,
                priority,
                state.heap.len() + 1
            );
            state.heap.push(order.id, key);
            state.orders.insert(order.id, order);
        }
        self.work.notify_one();
        Ok(())
    }

    /// Remove a still-queued order; `None` once it has been dispatched
    pub fn remove(&self, order_id: OrderId) -> Option<Order> {
        let mut state = self.state.lock();
        state.heap.remove(&order_id)?;
        state.orders.remove(&order_id)
    }

    /// Empty the queue, returning the orders in dispatch order
    pub fn drain(&self) -> Vec<Order> {
        let mut state = self.state.lock();
        let mut drained = Vec::with_capacity(state.heap.len());
        while let Some((id, _)) = state.heap.pop() {
            if let Some(order) = state.orders.remove(&id) {
                drained.push(order);
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Orders currently holding a concurrency slot (executing or backing off)
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// True once `abort_in_flight` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.state.lock().heap.get(&order_id).is_some()
    }

    fn pop(&self) -> Option<Order> {
        let mut state = self.state.lock();
        let (id, _) = state.heap.pop()?;
        state.orders.remove(&id)
    }

    /// Start the dispatch loop
    ///
    /// Exactly one loop should run per queue.
    pub fn start(
        self: &Arc<Self>,
        handler: Arc<dyn DispatchHandler>,
        events: mpsc::UnboundedSender<QueueEvent>,
    ) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.dispatch_loop(handler, events).await })
    }

    async fn dispatch_loop(
        self: Arc<Self>,
        handler: Arc<dyn DispatchHandler>,
        events: mpsc::UnboundedSender<QueueEvent>,
    ) {
        info!(
            "[QUEUE] Dispatch loop started (rate {}/s, burst {}, max concurrent {})",
            self.config.throttle.rate_per_sec,
            self.config.throttle.burst,
            self.config.max_concurrent
        );

        'dispatch: loop {
            let permit = match Arc::clone(&self.slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // Register for wakeups before checking, so a close or enqueue
            // between the check and the await is not missed
            loop {
                let work = self.work.notified();
                tokio::pin!(work);
                work.as_mut().enable();
                if self.is_closed() {
                    break 'dispatch;
                }
                if !self.is_empty() {
                    break;
                }
                work.await;
            }

            self.throttle.acquire().await;
            if self.is_closed() {
                self.throttle.refund();
                break;
            }

            // Cancelled while we waited for the token
            let Some(order) = self.pop() else {
                self.throttle.refund();
                continue;
            };

            self.in_flight.fetch_add(1, Ordering::SeqCst);
            debug!(
                "[QUEUE] Dispatching {} ({} queued, {} in flight)",
                order.id,
                self.len(),
                self.in_flight()
            );
            if events
                .send(QueueEvent::Dispatched { order_id: order.id })
                .is_err()
            {
                warn!("[QUEUE] Event receiver dropped, stopping dispatch loop");
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                break;
            }

            let queue = Arc::clone(&self);
            let handler = Arc::clone(&handler);
            let events = events.clone();
            self.tasks
                .lock()
                .spawn(async move { queue.run_attempts(order, handler, events, permit).await });

            // Reap finished attempt tasks
            let mut tasks = self.tasks.lock();
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result
                    && e.is_panic()
                {
                    error!("[QUEUE] Attempt task panicked: {}", e);
                }
            }
        }

        info!("[QUEUE] Dispatch loop stopped");
    }

    async fn run_attempts(
        self: Arc<Self>,
        order: Order,
        handler: Arc<dyn DispatchHandler>,
        events: mpsc::UnboundedSender<QueueEvent>,
        _permit: OwnedSemaphorePermit,
    ) {
        let timeout = Duration::from_millis(self.config.attempt_timeout_ms);
        let mut attempt = 1;

        let outcome = loop {
            let result = match tokio::time::timeout(timeout, handler.dispatch(&order, attempt)).await
            {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Execution(
                    keel_gateway::ExecutionError::Timeout {
                        after_ms: self.config.attempt_timeout_ms,
                    },
                )),
            };

            match result {
                Ok(fill) => break DispatchOutcome::Filled(fill),
                Err(error) if error.is_retryable() && self.config.retry.should_retry(attempt) => {
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        "[QUEUE] Attempt {}/{} for {} failed: {} (retrying in {}ms)",
                        attempt,
                        self.config.retry.max_attempts,
                        order.id,
                        error,
                        delay.as_millis()
                    );
                    let _ = events.send(QueueEvent::Retrying {
                        order_id: order.id,
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        reason: error.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                    self.throttle.acquire().await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(
                        "[QUEUE] Order {} failed after {} attempt(s): {}",
                        order.id, attempt, error
                    );
                    break DispatchOutcome::Failed {
                        error,
                        attempts: attempt,
                    };
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = events.send(QueueEvent::Finished {
            order_id: order.id,
            outcome,
        });
    }

    /// Stop dispatching and abort in-flight attempts
    ///
    /// The dispatch loop exits at its next wakeup, including when idle on an
    /// empty queue, and later enqueues fail with `ShuttingDown`. Returns the
    /// number of attempt tasks that were aborted.
    pub async fn abort_in_flight(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        self.slots.close();
        self.work.notify_waiters();
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let aborted = tasks.len();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        self.in_flight.store(0, Ordering::SeqCst);
        aborted
    }
}
