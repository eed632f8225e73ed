//! Keel Gateway
//!
//! Execution layer for the Keel order pipeline. Provides:
//! - Transport abstraction (tokio channels, with traits for other transports)
//! - Wire message types for execution requests/reports and prices
//! - Execution adapters: a real adapter that talks to an external gateway,
//!   and a shadow adapter that simulates fills from the latest market price
//!
//! ## Architecture
//!
//! ```text
//!            Order Manager
//!                 │ execute(order, SL/TP)
//!       ┌─────────▼──────────┐
//!       │  ExecutionAdapter  │
//!       └───┬────────────┬───┘
//!           │            │
//!     RealAdapter   ShadowAdapter ◄── LatestPrices ◄── prices.{symbol}
//!           │
//!           │ request/reply (orders.execute)
//!    ┌──────▼──────┐
//!    │  External   │
//!    │  Gateway    │
//!    └─────────────┘
//! ```
//!
//! ## Transport
//!
//! Uses tokio channels for single-process operation. The `Publisher`/
//! `Subscriber`/`Requester` traits allow plugging in network transports.

pub mod adapters;
pub mod error;
pub mod messages;
pub mod prices;
pub mod transport;

// Re-export commonly used types
pub use adapters::{
    AdapterKind, ExecutionAdapter, RealAdapter, RealAdapterConfig, ShadowAdapter, ShadowConfig,
};
pub use error::{ExecutionError, GatewayError, TransportError};
pub use messages::{
    market_data::PriceUpdate,
    order::{ExecStatusWire, ExecutionReport, ExecutionRequest, OrderSide, OrderTypeWire},
};
pub use prices::LatestPrices;
pub use transport::{
    ChannelGatewayLink, GatewayEndpoint, Publisher, Requester, Subscriber,
    channel::{ChannelPublisher, ChannelRequester, ChannelResponder, ChannelSubscriber},
};
