//! Tokio channel-based transport for single-process mode
//!
//! Broadcast channels give pub/sub semantics for prices; mpsc + oneshot give
//! request/reply for execution. No serialization overhead.

use crate::error::TransportError;
use crate::transport::{Publisher, Requester, Subscriber};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Channel-based publisher using broadcast
pub struct ChannelPublisher<M> {
    tx: broadcast::Sender<M>,
}

impl<M: Clone> ChannelPublisher<M> {
    /// Create a publisher/subscriber pair with given capacity
    pub fn pair(capacity: usize) -> (Self, ChannelSubscriber<M>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx: tx.clone() }, ChannelSubscriber { rx, _tx: tx })
    }

    /// Get another subscriber for this publisher
    pub fn subscribe(&self) -> ChannelSubscriber<M> {
        ChannelSubscriber {
            rx: self.tx.subscribe(),
            _tx: self.tx.clone(),
        }
    }
}

#[async_trait]
impl<M> Publisher<M> for ChannelPublisher<M>
where
    M: Serialize + Clone + Send + Sync + 'static,
{
    async fn publish(&self, msg: &M) -> Result<(), TransportError> {
        self.tx
            .send(msg.clone())
            .map_err(|_| TransportError::ChannelClosed)?;
        Ok(())
    }
}

/// Channel-based subscriber using broadcast receiver
pub struct ChannelSubscriber<M> {
    rx: broadcast::Receiver<M>,
    // Keep sender alive to prevent channel from closing
    _tx: broadcast::Sender<M>,
}

#[async_trait]
impl<M> Subscriber<M> for ChannelSubscriber<M>
where
    M: DeserializeOwned + Clone + Send + 'static,
{
    async fn next(&mut self) -> Result<M, TransportError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Ok(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Prices are last-value; older ones can be dropped
                    debug!("Subscriber lagged, skipped {} messages", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(TransportError::ChannelClosed);
                }
            }
        }
    }

    fn try_next(&mut self) -> Result<Option<M>, TransportError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(_)) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(TransportError::ChannelClosed),
        }
    }
}

/// Request message wrapper for channel-based request/reply
struct ChannelRequest<Req, Res> {
    request: Req,
    reply_tx: oneshot::Sender<Res>,
}

/// Channel-based requester for request/reply pattern
pub struct ChannelRequester<Req, Res> {
    tx: mpsc::Sender<ChannelRequest<Req, Res>>,
}

impl<Req, Res> ChannelRequester<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Create a requester/responder pair
    pub fn pair(capacity: usize) -> (Self, ChannelResponder<Req, Res>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, ChannelResponder { rx })
    }
}

#[async_trait]
impl<Req, Res> Requester<Req, Res> for ChannelRequester<Req, Res>
where
    Req: Serialize + Clone + Send + Sync + 'static,
    Res: DeserializeOwned + Send + 'static,
{
    async fn request(&self, req: &Req) -> Result<Res, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ChannelRequest {
            request: req.clone(),
            reply_tx,
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| TransportError::ChannelClosed)?;

        // Responder dropped the reply sender without answering
        reply_rx
            .await
            .map_err(|_| TransportError::Request("no reply from responder".to_string()))
    }
}

/// Channel-based responder (server side of request/reply)
pub struct ChannelResponder<Req, Res> {
    rx: mpsc::Receiver<ChannelRequest<Req, Res>>,
}

impl<Req, Res> ChannelResponder<Req, Res> {
    /// Receive the next request
    pub async fn next(&mut self) -> Option<(Req, oneshot::Sender<Res>)> {
        self.rx.recv().await.map(|req| (req.request, req.reply_tx))
    }

    /// Answer every request with `handler` until all requesters are dropped
    pub async fn serve<F, Fut>(mut self, mut handler: F)
    where
        F: FnMut(Req) -> Fut,
        Fut: Future<Output = Res>,
    {
        while let Some((request, reply_tx)) = self.next().await {
            let response = handler(request).await;
            if reply_tx.send(response).is_err() {
                warn!("Failed to send response: requester dropped");
            }
        }
    }
}
