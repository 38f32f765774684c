//! Two-stage image pipeline.
//!
//! This module provides the [`Pipeline`] coordinator which runs:
//! - Processing: a pool of workers applying the resize/watermark plan
//! - Saving: a second pool persisting every fully processed item
//!
//! Both pools report into one result stream. Every seeded item produces exactly
//! one [`Outcome`], whether it failed while processing, failed while saving, or
//! was saved successfully.
//!
//! # Example
//!
//! ```ignore
//! use imagepipe_core::pipeline::{Pipeline, WorkItem};
//! use imagepipe_core::stage::{SimulatedStage, SimulationConfig};
//! use imagepipe_core::PipelineConfig;
//!
//! let config = PipelineConfig::default()
//!     .with_processor_workers(2)
//!     .with_saver_workers(4);
//! let pipeline = Pipeline::new(config, SimulatedStage::new(SimulationConfig::default()));
//!
//! let items = vec![WorkItem::new("wedding.jpg"), WorkItem::new("birthday.jpg")];
//! let summary = pipeline.run(items).await?;
//! println!("Total: {}, Failed: {}", summary.total, summary.failed);
//! ```

mod completion;
mod coordinator;
mod error;
mod pool;
mod processor_pool;
mod saver_pool;
mod types;

pub use completion::{CompletionSignal, WorkerGuard};
pub use coordinator::{OutcomeCallback, Pipeline};
pub use error::{PipelineError, RunError};
pub use types::{
    FailureRecord, Outcome, PipelineStatus, PoolStatus, RunPhase, RunSummary, Tally, WorkItem,
    DEMO_IMAGES,
};
