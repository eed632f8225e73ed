//! Integration test: RealAdapter <-> external gateway double
//!
//! Order Manager -> RealAdapter -> ChannelGatewayLink -> GatewayEndpoint
//!               <- Fill        <- ExecutionReport   <-

use chrono::Utc;
use keel_core::{Order, ProtectiveLevels, Side};
use keel_gateway::{
    ExecStatusWire, ExecutionAdapter, ExecutionError, ExecutionReport, RealAdapter,
    RealAdapterConfig, messages::to_nanos,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_fill_round_trip_carries_protection() {
    let _ = env_logger::try_init();

    let (adapter, endpoint) = RealAdapter::channel(RealAdapterConfig::default(), 8);
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_by_gateway = seen.clone();
    tokio::spawn(endpoint.serve(move |req| {
        seen_by_gateway.fetch_add(1, Ordering::SeqCst);
        async move {
            // Gateway sees the protective levels on the wire
            assert_eq!(req.stop_price, Some(dec!(14990)));
            ExecutionReport::filled(&req, dec!(15000.5), to_nanos(Utc::now()))
        }
    }));

    let order = Order::market("bot-a", "NQ", Side::Long, dec!(2)).with_stop_loss(dec!(400));
    let protection = ProtectiveLevels {
        stop_price: Some(dec!(14990)),
        take_profit_price: Some(dec!(15020)),
    };

    let fill = adapter.execute(&order, protection).await.unwrap();
    assert_eq!(fill.order_id, order.id);
    assert_eq!(fill.price, dec!(15000.5));
    assert_eq!(fill.quantity, dec!(2));
    assert_eq!(fill.take_profit_price, Some(dec!(15020)));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gateway_rejection_is_execution_failure() {
    let (adapter, endpoint) = RealAdapter::channel(RealAdapterConfig::default(), 8);
    tokio::spawn(endpoint.serve(|req| async move {
        ExecutionReport::rejected(&req, "instrument halted", 0)
    }));

    let order = Order::market("bot-a", "ES", Side::Short, dec!(1));
    let err = adapter
        .execute(&order, ProtectiveLevels::none())
        .await
        .unwrap_err();
    assert_eq!(err, ExecutionError::Failed("instrument halted".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_silent_gateway_times_out() {
    let config = RealAdapterConfig { timeout_ms: 250 };
    let (adapter, mut endpoint) = RealAdapter::channel(config, 8);

    // Hold requests without replying
    let holder = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Some(pending) = endpoint.next().await {
            held.push(pending);
        }
    });

    let order = Order::market("bot-a", "ES", Side::Long, dec!(1));
    let err = adapter
        .execute(&order, ProtectiveLevels::none())
        .await
        .unwrap_err();
    assert_eq!(err, ExecutionError::Timeout { after_ms: 250 });
    assert!(err.is_timeout());

    holder.abort();
}

#[tokio::test]
async fn test_closed_gateway_fails() {
    let (adapter, endpoint) = RealAdapter::channel(RealAdapterConfig::default(), 8);
    drop(endpoint);

    let order = Order::market("bot-a", "ES", Side::Long, dec!(1));
    let err = adapter
        .execute(&order, ProtectiveLevels::none())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Failed(_)));
}

#[tokio::test]
async fn test_partial_fill_reports_filled_quantity() {
    let (adapter, endpoint) = RealAdapter::channel(RealAdapterConfig::default(), 8);
    tokio::spawn(endpoint.serve(|req| async move {
        let mut report = ExecutionReport::filled(&req, dec!(5000), 0);
        report.status = ExecStatusWire::PartiallyFilled;
        report.filled_qty = dec!(1);
        report
    }));

    let order = Order::market("bot-a", "ES", Side::Long, dec!(4));
    let fill = adapter
        .execute(&order, ProtectiveLevels::none())
        .await
        .unwrap();
    assert_eq!(fill.quantity, dec!(1));
}
