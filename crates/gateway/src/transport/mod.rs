//! Transport abstraction layer
//!
//! Provides unified traits for message passing using tokio channels.
//! The trait-based design allows swapping in other transports (NATS, Aeron, etc.) later.

pub mod channel;

use crate::error::TransportError;
use crate::messages::order::{ExecutionReport, ExecutionRequest};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// Publisher - sends messages to a subject/channel
#[async_trait]
pub trait Publisher<M>: Send + Sync
where
    M: Serialize + Send + Sync,
{
    /// Publish a message
    async fn publish(&self, msg: &M) -> Result<(), TransportError>;
}

/// Subscriber - receives messages from a subject
#[async_trait]
pub trait Subscriber<M>: Send
where
    M: DeserializeOwned + Send,
{
    /// Wait for the next message
    async fn next(&mut self) -> Result<M, TransportError>;

    /// Try to receive without blocking (returns None if no message available)
    fn try_next(&mut self) -> Result<Option<M>, TransportError>;
}

/// Request/Reply pattern (execution request -> execution report)
#[async_trait]
pub trait Requester<Req, Res>: Send + Sync
where
    Req: Serialize + Send + Sync,
    Res: DeserializeOwned + Send,
{
    /// Send a request and wait for a response
    async fn request(&self, req: &Req) -> Result<Res, TransportError>;
}

/// In-process link from the real adapter to an external gateway
pub type ChannelGatewayLink = channel::ChannelRequester<ExecutionRequest, ExecutionReport>;

/// Gateway side of a [`ChannelGatewayLink`]
pub type GatewayEndpoint = channel::ChannelResponder<ExecutionRequest, ExecutionReport>;
