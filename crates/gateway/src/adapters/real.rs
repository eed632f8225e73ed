use crate::error::ExecutionError;
use crate::messages::order::{ExecutionReport, ExecutionRequest};
use crate::transport::{ChannelGatewayLink, GatewayEndpoint, Requester};
use crate::adapters::{AdapterKind, ExecutionAdapter};
use async_trait::async_trait;
use keel_core::{Fill, Order, ProtectiveLevels};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealAdapterConfig {
    /// How long to wait for the gateway's report (ms)
    pub timeout_ms: u64,
}

impl Default for RealAdapterConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

/// Forwards orders plus SL/TP to an external gateway over a request/reply link
pub struct RealAdapter {
    link: Arc<dyn Requester<ExecutionRequest, ExecutionReport>>,
    config: RealAdapterConfig,
}

impl RealAdapter {
    pub fn new(
        link: Arc<dyn Requester<ExecutionRequest, ExecutionReport>>,
        config: RealAdapterConfig,
    ) -> Self {
        Self { link, config }
    }

    /// Adapter over an in-process channel, plus the gateway end of it
    pub fn channel(config: RealAdapterConfig, capacity: usize) -> (Self, GatewayEndpoint) {
        let (link, endpoint) = ChannelGatewayLink::pair(capacity);
        (Self::new(Arc::new(link), config), endpoint)
    }
}

#[async_trait]
impl ExecutionAdapter for RealAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Real
    }

    async fn execute(
        &self,
        order: &Order,
        protection: ProtectiveLevels,
    ) -> Result<Fill, ExecutionError> {
        let request = ExecutionRequest::from_order(order, protection);
        debug!(
            "[EXEC] Sending {} {} {} {} to gateway",
            request.client_order_id,
            request.side.as_str(),
            request.quantity,
            request.symbol
        );

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let report = match tokio::time::timeout(timeout, self.link.request(&request)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!("[EXEC] Gateway error for {}: {}", order.id, e);
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    "[EXEC] No report for {} within {}ms",
                    order.id, self.config.timeout_ms
                );
                return Err(ExecutionError::Timeout {
                    after_ms: self.config.timeout_ms,
                });
            }
        };

        let fill = report
            .into_fill(order)
            .map_err(ExecutionError::Failed)?
            .with_protection(protection);
        Ok(fill)
    }
}
