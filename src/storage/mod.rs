//! Checkpoint persistence.
//!
//! The checkpoint is a single JSON document loaded wholesale at startup and
//! overwritten wholesale on every commit. It must only be saved after the
//! rows it accounts for have been written.

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CheckpointState;

// Re-export for convenience
pub use local::LocalCheckpointStore;

/// Trait for checkpoint storage backends.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the persisted state.
    ///
    /// A missing or unreadable checkpoint yields the default state.
    async fn load(&self) -> CheckpointState;

    /// Replace the persisted state.
    async fn save(&self, state: &CheckpointState) -> Result<()>;
}
