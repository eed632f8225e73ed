//! Integration test: QueueManager dispatch loop
//!
//! Drives the queue with scripted DispatchHandlers on paused tokio time and
//! checks what the loop reports on its event channel.

use async_trait::async_trait;
use chrono::Utc;
use keel_core::{Fill, Order, OrderId, Side};
use keel_gateway::ExecutionError;
use keel_order_manager::{
    CalculationError, DispatchError, DispatchHandler, DispatchOutcome, Error, QueueConfig,
    QueueEvent, QueueManager, RetryConfig, ThrottleConfig,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

fn fill_for(order: &Order) -> Fill {
    Fill::new(
        order.id,
        order.symbol.clone(),
        order.side,
        dec!(5000),
        order.quantity,
        Utc::now(),
    )
}

fn no_jitter() -> RetryConfig {
    RetryConfig {
        jitter: 0.0,
        ..Default::default()
    }
}

/// Fills immediately, optionally after a fixed delay; tracks concurrency
#[derive(Default)]
struct Filler {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl DispatchHandler for Filler {
    async fn dispatch(&self, order: &Order, _attempt: u32) -> Result<Fill, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(fill_for(order))
    }
}

/// Fails the first `failures` attempts of every order with `error`
struct Flaky {
    failures: u32,
    error: DispatchError,
    attempts: Mutex<HashMap<OrderId, u32>>,
}

impl Flaky {
    fn new(failures: u32, error: DispatchError) -> Self {
        Self {
            failures,
            error,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn attempts_for(&self, id: OrderId) -> u32 {
        self.attempts.lock().get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DispatchHandler for Flaky {
    async fn dispatch(&self, order: &Order, attempt: u32) -> Result<Fill, DispatchError> {
        self.attempts.lock().insert(order.id, attempt);
        if attempt <= self.failures {
            Err(self.error.clone())
        } else {
            Ok(fill_for(order))
        }
    }
}

/// Collect events until `n` orders have finished
async fn collect_finished(
    rx: &mut mpsc::UnboundedReceiver<QueueEvent>,
    n: usize,
) -> Vec<(QueueEvent, Instant)> {
    let mut events = Vec::new();
    let mut finished = 0;
    while finished < n {
        let event = rx.recv().await.expect("queue event channel closed");
        if matches!(event, QueueEvent::Finished { .. }) {
            finished += 1;
        }
        events.push((event, Instant::now()));
    }
    events
}

fn dispatched(events: &[(QueueEvent, Instant)]) -> Vec<(OrderId, Instant)> {
    events
        .iter()
        .filter_map(|(e, at)| match e {
            QueueEvent::Dispatched { order_id } => Some((*order_id, *at)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_by_priority_then_arrival() {
    let _ = env_logger::try_init();

    let queue = Arc::new(QueueManager::new(QueueConfig::default()).unwrap());
    let t0 = Utc::now();
    let mut orders = vec![
        Order::limit("a", "ES", Side::Long, dec!(1), dec!(4990)),
        Order::market("a", "ES", Side::Long, dec!(1)),
        Order::stop("a", "ES", Side::Short, dec!(1), dec!(4980)),
        Order::limit("a", "ES", Side::Long, dec!(1), dec!(4985)),
        Order::market("a", "ES", Side::Short, dec!(1)),
    ];
    for (i, order) in orders.iter_mut().enumerate() {
        order.submitted_at = t0 + chrono::Duration::milliseconds(i as i64);
    }
    let expected = vec![orders[1].id, orders[4].id, orders[2].id, orders[0].id, orders[3].id];
    for order in orders {
        queue.enqueue(order).unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(Arc::new(Filler::default()), tx);

    let events = collect_finished(&mut rx, 5).await;
    let order: Vec<_> = dispatched(&events).into_iter().map(|(id, _)| id).collect();
    assert_eq!(order, expected);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_allows_burst_then_sustained_rate() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        throttle: ThrottleConfig {
            rate_per_sec: 10.0,
            burst: 20,
        },
        max_concurrent: 100,
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    for _ in 0..30 {
        queue
            .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
            .unwrap();
    }

    let start = Instant::now();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(Arc::new(Filler::default()), tx);

    let events = collect_finished(&mut rx, 30).await;
    let times: Vec<_> = dispatched(&events).into_iter().map(|(_, at)| at).collect();
    assert_eq!(times.len(), 30);

    // Burst goes out immediately
    for at in &times[..20] {
        assert!(at.duration_since(start) < Duration::from_millis(1));
    }
    // Then one every 100ms
    for pair in times[19..].windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(95));
    }
    assert!(times[29].duration_since(start) >= Duration::from_millis(950));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_capped() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        max_concurrent: 3,
        throttle: ThrottleConfig {
            rate_per_sec: 1000.0,
            burst: 100,
        },
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    for _ in 0..12 {
        queue
            .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
            .unwrap();
    }

    let handler = Arc::new(Filler {
        delay: Duration::from_millis(50),
        ..Default::default()
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(handler.clone(), tx);

    collect_finished(&mut rx, 12).await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 12);
    assert_eq!(handler.peak.load(Ordering::SeqCst), 3);
    assert!(queue.is_empty());
    assert_eq!(queue.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_until_filled() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        retry: no_jitter(),
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    let order = Order::market("a", "ES", Side::Long, dec!(1));
    let id = order.id;
    queue.enqueue(order).unwrap();

    let handler = Arc::new(Flaky::new(
        2,
        DispatchError::Execution(ExecutionError::Failed("gateway busy".into())),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(handler.clone(), tx);

    let events = collect_finished(&mut rx, 1).await;
    let retries: Vec<_> = events
        .iter()
        .filter_map(|(e, _)| match e {
            QueueEvent::Retrying {
                attempt, delay_ms, ..
            } => Some((*attempt, *delay_ms)),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![(1, 100), (2, 200)]);
    assert_eq!(handler.attempts_for(id), 3);
    assert!(matches!(
        &events.last().unwrap().0,
        QueueEvent::Finished { outcome: DispatchOutcome::Filled(_), .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_with_attempt_count() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        retry: no_jitter(),
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    let order = Order::market("a", "ES", Side::Long, dec!(1));
    queue.enqueue(order).unwrap();

    let error = DispatchError::Execution(ExecutionError::Failed("no liquidity".into()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(Arc::new(Flaky::new(u32::MAX, error.clone())), tx);

    let events = collect_finished(&mut rx, 1).await;
    match &events.last().unwrap().0 {
        QueueEvent::Finished {
            outcome: DispatchOutcome::Failed { error: e, attempts },
            ..
        } => {
            assert_eq!(e, &error);
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_calculation_error_is_not_retried() {
    let _ = env_logger::try_init();

    let queue = Arc::new(QueueManager::new(QueueConfig::default()).unwrap());
    let order = Order::market("a", "XYZ", Side::Long, dec!(1));
    let id = order.id;
    queue.enqueue(order).unwrap();

    let handler = Arc::new(Flaky::new(
        u32::MAX,
        DispatchError::Calculation(CalculationError::MissingMultiplier("XYZ".into())),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(handler.clone(), tx);

    let events = collect_finished(&mut rx, 1).await;
    assert!(
        !events
            .iter()
            .any(|(e, _)| matches!(e, QueueEvent::Retrying { .. }))
    );
    assert_eq!(handler.attempts_for(id), 1);
    assert!(matches!(
        &events.last().unwrap().0,
        QueueEvent::Finished {
            outcome: DispatchOutcome::Failed { attempts: 1, .. },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_slow_attempt_times_out_and_is_retried() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        attempt_timeout_ms: 200,
        retry: RetryConfig {
            max_attempts: 2,
            ..no_jitter()
        },
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    queue
        .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
        .unwrap();

    let handler = Arc::new(Filler {
        delay: Duration::from_secs(1),
        ..Default::default()
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(handler.clone(), tx);

    let events = collect_finished(&mut rx, 1).await;
    assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    match &events.last().unwrap().0 {
        QueueEvent::Finished {
            outcome: DispatchOutcome::Failed { error, attempts },
            ..
        } => {
            assert!(error.is_retryable());
            assert_eq!(error.code(), "execution_timeout");
            assert_eq!(*attempts, 2);
        }
        other => panic!("expected timeout failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retries_consume_throttle_tokens() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        throttle: ThrottleConfig {
            rate_per_sec: 10.0,
            burst: 1,
        },
        retry: RetryConfig {
            initial_backoff_ms: 0,
            ..no_jitter()
        },
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    queue
        .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
        .unwrap();

    let start = Instant::now();
    let handler = Arc::new(Flaky::new(
        2,
        DispatchError::Execution(ExecutionError::Failed("busy".into())),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(handler, tx);

    let events = collect_finished(&mut rx, 1).await;
    let (_, finished_at) = events.last().unwrap();
    // Two retries, each waiting for a fresh token at 10/s
    assert!(finished_at.duration_since(start) >= Duration::from_millis(195));
}

#[tokio::test(start_paused = true)]
async fn test_order_removed_before_dispatch_is_skipped() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        throttle: ThrottleConfig {
            rate_per_sec: 1.0,
            burst: 1,
        },
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    let first = Order::market("a", "ES", Side::Long, dec!(1));
    let second = Order::market("a", "ES", Side::Long, dec!(1));
    let third = Order::market("a", "ES", Side::Long, dec!(1));
    let (first_id, second_id, third_id) = (first.id, second.id, third.id);
    for order in [first, second, third] {
        queue.enqueue(order).unwrap();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _loop = queue.start(Arc::new(Filler::default()), tx);

    // First goes out on the initial token; second is pulled while waiting
    let events = collect_finished(&mut rx, 1).await;
    assert_eq!(dispatched(&events)[0].0, first_id);
    assert!(queue.remove(second_id).is_some());

    let events = collect_finished(&mut rx, 1).await;
    let ids: Vec<_> = dispatched(&events).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![third_id]);
}

#[tokio::test(start_paused = true)]
async fn test_abort_in_flight_stops_dispatch() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        max_concurrent: 2,
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    for _ in 0..4 {
        queue
            .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
            .unwrap();
    }

    let handler = Arc::new(Filler {
        delay: Duration::from_secs(60),
        ..Default::default()
    });
    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatch_loop = queue.start(handler, tx);

    // Two dispatches fill both slots
    for _ in 0..2 {
        assert!(matches!(
            rx.recv().await,
            Some(QueueEvent::Dispatched { .. })
        ));
    }
    assert_eq!(queue.in_flight(), 2);

    assert_eq!(queue.abort_in_flight().await, 2);
    dispatch_loop.await.unwrap();
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.len(), 2);
    assert!(queue.is_closed());
    assert_eq!(
        queue
            .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
            .unwrap_err(),
        Error::ShuttingDown
    );
}

#[tokio::test(start_paused = true)]
async fn test_abort_stops_idle_loop() {
    let _ = env_logger::try_init();

    let queue = Arc::new(QueueManager::new(QueueConfig::default()).unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatch_loop = queue.start(Arc::new(Filler::default()), tx);

    // Let the loop take a slot and park on the empty queue
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!dispatch_loop.is_finished());

    assert_eq!(queue.abort_in_flight().await, 0);
    tokio::time::timeout(Duration::from_secs(1), dispatch_loop)
        .await
        .expect("dispatch loop still running after abort")
        .unwrap();

    assert_eq!(
        queue
            .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
            .unwrap_err(),
        Error::ShuttingDown
    );
    // Loop exited and dropped its sender without dispatching anything
    assert!(rx.recv().await.is_none());
    assert!(queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_abort_while_waiting_for_token_dispatches_nothing() {
    let _ = env_logger::try_init();

    let config = QueueConfig {
        throttle: ThrottleConfig {
            rate_per_sec: 1.0,
            burst: 1,
        },
        ..Default::default()
    };
    let queue = Arc::new(QueueManager::new(config).unwrap());
    for _ in 0..2 {
        queue
            .enqueue(Order::market("a", "ES", Side::Long, dec!(1)))
            .unwrap();
    }
    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatch_loop = queue.start(Arc::new(Filler::default()), tx);

    // First order uses the only token; the loop then sleeps for the next one
    collect_finished(&mut rx, 1).await;
    queue.abort_in_flight().await;
    dispatch_loop.await.unwrap();

    assert!(rx.recv().await.is_none());
    assert_eq!(queue.len(), 1);
}
