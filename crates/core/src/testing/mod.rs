//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable [`StageOperation`](crate::stage::StageOperation)
//! so pipeline behaviour can be tested deterministically, without random
//! failures or real wall-clock delays.
//!
//! # Example
//!
//! ```rust,ignore
//! use imagepipe_core::testing::{fixtures, MockStage};
//!
//! let stage = MockStage::new();
//! stage.fail_on("vacation.jpg", StepKind::Resize).await;
//!
//! let pipeline = Pipeline::new(config, stage.clone());
//! let summary = pipeline.run(fixtures::demo_items()).await?;
//! ```

mod mock_stage;

pub use mock_stage::{MockStage, RecordedStep};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::pipeline::WorkItem;

    pub use crate::pipeline::DEMO_IMAGES;

    /// Demo images as work items.
    pub fn demo_items() -> Vec<WorkItem> {
        DEMO_IMAGES.iter().map(|name| WorkItem::new(*name)).collect()
    }

    /// `count` generated items named `image-000.jpg`, `image-001.jpg`, ...
    pub fn numbered_items(count: usize) -> Vec<WorkItem> {
        (0..count)
            .map(|i| WorkItem::new(format!("image-{:03}.jpg", i)))
            .collect()
    }
}
