//! Stage operations for the image pipeline.
//!
//! A stage operation performs one [`Step`] for one item: a resize variant, the
//! watermark, or the final save. The pipeline only depends on the
//! [`StageOperation`] trait, so the real work can be swapped for the
//! [`SimulatedStage`] (timed delay plus configurable failure rate) or for the
//! scripted mock in [`crate::testing`].
//!
//! # Example
//!
//! ```ignore
//! use imagepipe_core::stage::{SimulatedStage, SimulationConfig, StageOperation, Step};
//! use imagepipe_core::pipeline::WorkItem;
//!
//! let stage = SimulatedStage::new(SimulationConfig::default().with_seed(7));
//! let item = WorkItem::new("wedding.jpg");
//!
//! stage.execute(&item, &Step::resize("thumbnail")).await?;
//! stage.execute(&item, &Step::Save).await?;
//! ```

mod config;
mod error;
mod simulated;
mod traits;
mod types;

pub use config::{SimulationConfig, StepProfile};
pub use error::StageError;
pub use simulated::SimulatedStage;
pub use traits::StageOperation;
pub use types::{Phase, Step, StepKind, StepPlan};
