//! Trait definitions for the stage module.

use async_trait::async_trait;

use super::error::StageError;
use super::types::Step;
use crate::pipeline::WorkItem;

/// A unit of work the pipeline runs for one item and one step.
///
/// Implementations must be cheap to share across workers; the pipeline holds a
/// single instance behind an `Arc` and calls it concurrently.
#[async_trait]
pub trait StageOperation: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Runs `step` for `item`.
    async fn execute(&self, item: &WorkItem, step: &Step) -> Result<(), StageError>;
}
