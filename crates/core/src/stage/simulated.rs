//! Simulated stage operation: a timed delay followed by a weighted coin flip.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use super::config::SimulationConfig;
use super::error::StageError;
use super::traits::StageOperation;
use super::types::Step;
use crate::pipeline::WorkItem;

/// Stage that sleeps for the configured duration and then fails with the
/// configured probability.
pub struct SimulatedStage {
    config: SimulationConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedStage {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn roll_failure(&self, failure_rate: f64) -> bool {
        if failure_rate <= 0.0 {
            return false;
        }
        // A poisoned lock only means another worker panicked mid-roll; the RNG
        // state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_bool(failure_rate.min(1.0))
    }
}

impl Default for SimulatedStage {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[async_trait]
impl StageOperation for SimulatedStage {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn execute(&self, item: &WorkItem, step: &Step) -> Result<(), StageError> {
        let profile = *self.config.profile(step.kind());
        tokio::time::sleep(profile.duration()).await;

        if self.roll_failure(profile.failure_rate) {
            return Err(StageError::failed(
                step.clone(),
                format!("{} failed", step.kind().as_str()),
            ));
        }

        match step {
            Step::Resize { variant } => {
                tracing::debug!(item = %item, "Resized {} to {} size", item, variant)
            }
            Step::Watermark => tracing::debug!(item = %item, "Watermarked {}", item),
            Step::Save => tracing::debug!(item = %item, "Saved {} to storage", item),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StepProfile;

    #[tokio::test(start_paused = true)]
    async fn test_reliable_stage_succeeds() {
        let stage = SimulatedStage::new(SimulationConfig::reliable(300));
        let item = WorkItem::new("wedding.jpg");

        for step in [Step::resize("thumbnail"), Step::Watermark, Step::Save] {
            assert!(stage.execute(&item, &step).await.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_save() {
        let mut config = SimulationConfig::reliable(1);
        config.save = StepProfile::new(1, 1.0);
        let stage = SimulatedStage::new(config);
        let item = WorkItem::new("birthday.jpg");

        assert!(stage.execute(&item, &Step::Watermark).await.is_ok());
        let err = stage.execute(&item, &Step::Save).await.unwrap_err();
        assert_eq!(err.step(), &Step::Save);
        assert_eq!(err.to_string(), "save failed: save failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_takes_configured_time() {
        let stage = SimulatedStage::new(SimulationConfig::reliable(500));
        let item = WorkItem::new("nature1.jpg");

        let start = tokio::time::Instant::now();
        stage.execute(&item, &Step::Save).await.unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_stages_agree() {
        let mut config = SimulationConfig::reliable(1).with_seed(1234);
        config.resize = StepProfile::new(1, 0.5);
        let first = SimulatedStage::new(config.clone());
        let second = SimulatedStage::new(config);
        let item = WorkItem::new("fashion.jpg");
        let step = Step::resize("medium");

        for _ in 0..32 {
            let a = first.execute(&item, &step).await.is_ok();
            let b = second.execute(&item, &step).await.is_ok();
            assert_eq!(a, b);
        }
    }
}
