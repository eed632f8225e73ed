//! Execution adapters
//!
//! One adapter is selected at startup and used for the life of the process:
//! the real adapter forwards orders to an external gateway, the shadow adapter
//! synthesizes fills locally and never leaves the process.

pub mod real;
pub mod shadow;

pub use real::{RealAdapter, RealAdapterConfig};
pub use shadow::{ShadowAdapter, ShadowConfig};

use crate::error::ExecutionError;
use async_trait::async_trait;
use keel_core::{Fill, Order, ProtectiveLevels};
use serde::{Deserialize, Serialize};

/// Which execution path is live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterKind {
    Real,
    Shadow,
}

impl AdapterKind {
    pub fn is_shadow(&self) -> bool {
        matches!(self, AdapterKind::Shadow)
    }
}

/// Executes one order attempt
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    /// Execute the order with its pre-trade protective levels attached
    async fn execute(
        &self,
        order: &Order,
        protection: ProtectiveLevels,
    ) -> Result<Fill, ExecutionError>;
}
