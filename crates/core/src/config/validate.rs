use super::{types::Config, types::PipelineConfig, ConfigError};
use crate::stage::StepProfile;

/// Validate configuration
/// Currently validates:
/// - Both pools have at least one worker
/// - Queue capacities are not 0
/// - Resize variants are named and the stage timeout is not 0
/// - Failure rates are probabilities
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    config.pipeline.validate()?;

    let simulation = &config.simulation;
    check_profile("resize", &simulation.resize)?;
    check_profile("watermark", &simulation.watermark)?;
    check_profile("save", &simulation.save)?;

    Ok(())
}

impl PipelineConfig {
    /// Checks the settings a pipeline run depends on: worker counts, queue
    /// capacities, resize variant names and the stage timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processor_workers == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.processor_workers cannot be 0".to_string(),
            ));
        }
        if self.saver_workers == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.saver_workers cannot be 0".to_string(),
            ));
        }

        for (name, capacity) in [
            ("input_queue_capacity", self.input_capacity()),
            ("save_queue_capacity", self.save_capacity()),
            ("result_queue_capacity", self.result_capacity()),
        ] {
            if capacity == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "pipeline.{} cannot be 0",
                    name
                )));
            }
        }

        if self.resize_variants.iter().any(|v| v.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "pipeline.resize_variants cannot contain empty names".to_string(),
            ));
        }

        if self.stage_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "pipeline.stage_timeout_ms cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_profile(name: &str, profile: &StepProfile) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&profile.failure_rate) {
        return Err(ConfigError::ValidationError(format!(
            "simulation.{}.failure_rate must be between 0 and 1, got {}",
            name, profile.failure_rate
        )));
    }
    Ok(())
}
