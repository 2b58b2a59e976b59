//! Knowledge-base version tracking.
//!
//! Every entry is stamped with the source version current at generation
//! time; lookups only serve entries whose stamp the orchestrator still
//! accepts. The provider is a consumed interface: deployments wire in
//! whatever signals their knowledge-base rebuilds.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Provider of the current knowledge-base version tag
#[async_trait]
pub trait SourceVersionProvider: Send + Sync {
    /// The opaque tag identifying the current knowledge-base state
    ///
    /// # Errors
    ///
    /// Returns error when the version cannot be determined; the orchestrator
    /// treats the affected lookup as a miss and skips the affected store.
    async fn current(&self) -> Result<String>;
}

/// Fixed-tag provider for deployments whose version changes are pushed
/// through [`set`](StaticVersionProvider::set) (and for tests).
#[derive(Debug)]
pub struct StaticVersionProvider {
    current: RwLock<String>,
}

impl StaticVersionProvider {
    /// Provider starting at `version`.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(version.into()),
        }
    }

    /// Replace the current version tag.
    pub fn set(&self, version: impl Into<String>) {
        *self.current.write() = version.into();
    }
}

#[async_trait]
impl SourceVersionProvider for StaticVersionProvider {
    async fn current(&self) -> Result<String> {
        Ok(self.current.read().clone())
    }
}
