//! Stage reporting for long-running generations.

use std::time::Duration;

/// Where a generation currently is.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum GenerationStage {
    /// Normalizing and binding the graph
    Binding,
    /// Sending reference images
    Uploading,
    /// Queueing the graph
    Submitting,
    /// Waiting for the backend
    #[strum(to_string = "Polling")]
    Polling {
        /// Time since polling started
        elapsed: Duration,
        /// Time at which polling gives up
        timeout: Duration,
    },
    /// Terminal, successful or not
    Finished {
        /// Whether an artifact was produced
        success: bool,
    },
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct ProgressUpdate {
    /// Current stage
    stage: GenerationStage,
    /// Completion estimate, 0 to 100
    percent: u8,
    /// Human-readable step text
    step: String,
}

impl ProgressUpdate {
    /// Build the update for a stage.
    pub fn for_stage(stage: GenerationStage) -> Self {
        let (percent, step) = match &stage {
            GenerationStage::Binding => (5, "Preparing workflow".to_string()),
            GenerationStage::Uploading => (15, "Uploading reference images".to_string()),
            GenerationStage::Submitting => (25, "Submitting to backend".to_string()),
            GenerationStage::Polling { elapsed, timeout } => {
                let fraction = if timeout.is_zero() {
                    1.0
                } else {
                    (elapsed.as_secs_f64() / timeout.as_secs_f64()).min(1.0)
                };
                (
                    30 + (fraction * 65.0) as u8,
                    format!("Generating ({}s elapsed)", elapsed.as_secs()),
                )
            }
            GenerationStage::Finished { success: true } => (100, "Done".to_string()),
            GenerationStage::Finished { success: false } => (100, "Failed".to_string()),
        };
        Self {
            stage,
            percent,
            step,
        }
    }
}

/// Receives stage updates so callers can mirror them into their own task records.
pub trait ProgressReporter: Send + Sync {
    /// Handle one update.
    fn report(&self, update: ProgressUpdate);
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_percent_stays_below_done() {
        let update = ProgressUpdate::for_stage(GenerationStage::Polling {
            elapsed: Duration::from_secs(500),
            timeout: Duration::from_secs(120),
        });
        assert_eq!(*update.percent(), 95);

        let update = ProgressUpdate::for_stage(GenerationStage::Polling {
            elapsed: Duration::ZERO,
            timeout: Duration::from_secs(120),
        });
        assert_eq!(*update.percent(), 30);
    }

    #[test]
    fn stages_are_monotonic() {
        let percents: Vec<u8> = [
            GenerationStage::Binding,
            GenerationStage::Uploading,
            GenerationStage::Submitting,
            GenerationStage::Finished { success: false },
        ]
        .into_iter()
        .map(|stage| *ProgressUpdate::for_stage(stage).percent())
        .collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
    }
}
