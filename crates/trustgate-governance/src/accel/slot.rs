//! One-shot acquisition of the accelerated backend.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use trustgate_core::error::{GovernanceError, Result};

use super::{GovernanceBackend, ReferenceBackend, UnavailableBackend};

/// Produces the accelerated backend. Called at most once per slot.
#[async_trait]
pub trait AcceleratorLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn GovernanceBackend>>;
}

/// Loader for builds that link no accelerated backend.
#[derive(Debug, Clone)]
pub struct NoAccelerator {
    reason: String,
}

impl NoAccelerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Default for NoAccelerator {
    fn default() -> Self {
        Self::new("no accelerated backend linked into this build")
    }
}

#[async_trait]
impl AcceleratorLoader for NoAccelerator {
    async fn load(&self) -> Result<Arc<dyn GovernanceBackend>> {
        Err(GovernanceError::AccelerationUnavailable(self.reason.clone()))
    }
}

pub struct AcceleratorSlot {
    loader: Box<dyn AcceleratorLoader>,
    cell: OnceCell<Arc<dyn GovernanceBackend>>,
    reference: Arc<ReferenceBackend>,
}

impl AcceleratorSlot {
    pub fn new(loader: impl AcceleratorLoader + 'static) -> Self {
        Self::with_reference(loader, Arc::new(ReferenceBackend::default()))
    }

    pub fn with_reference(loader: impl AcceleratorLoader + 'static, reference: Arc<ReferenceBackend>) -> Self {
        Self {
            loader: Box::new(loader),
            cell: OnceCell::new(),
            reference,
        }
    }

    /// Slot whose accelerated side is switched off by configuration.
    pub fn disabled() -> Self {
        Self::new(NoAccelerator::new("acceleration disabled by configuration"))
    }

    /// The accelerated backend, or the unavailable stub if loading failed.
    /// Concurrent first callers share one in-flight load.
    pub async fn accelerated(&self) -> Arc<dyn GovernanceBackend> {
        let backend = self
            .cell
            .get_or_init(|| async {
                match self.loader.load().await {
                    Ok(backend) => {
                        tracing::info!(backend = backend.name(), "accelerated backend loaded");
                        backend
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accelerated backend unavailable, using reference");
                        Arc::new(UnavailableBackend::new(e.to_string())) as Arc<dyn GovernanceBackend>
                    }
                }
            })
            .await;
        Arc::clone(backend)
    }

    /// Accelerated backend when available, otherwise the reference backend.
    pub async fn select(&self) -> Arc<dyn GovernanceBackend> {
        let accelerated = self.accelerated().await;
        if accelerated.is_available() {
            accelerated
        } else {
            Arc::clone(&self.reference) as Arc<dyn GovernanceBackend>
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}
