pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod stage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, PipelineConfig,
};
pub use pipeline::{
    Outcome, Pipeline, PipelineError, PipelineStatus, RunError, RunPhase, RunSummary, WorkItem,
    DEMO_IMAGES,
};
pub use stage::{SimulatedStage, SimulationConfig, StageError, StageOperation, Step, StepPlan};
