//! Per-step outcomes and watermark finalization.

use hydro_common::{TimeStep, Watermark};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub step: TimeStep,
    pub succeeded: bool,
}

impl StepOutcome {
    pub fn succeeded(step: TimeStep) -> Self {
        Self {
            step,
            succeeded: true,
        }
    }

    pub fn failed(step: TimeStep) -> Self {
        Self {
            step,
            succeeded: false,
        }
    }
}

/// Folds step outcomes into counts and time maxima.
///
/// Maxima cover every recorded step, failed or not.
#[derive(Debug, Clone, Default)]
pub struct RunAccumulator {
    attempted: usize,
    failed: usize,
    max_observation_time: Option<f64>,
    max_update_time: Option<f64>,
}

fn max_of(current: Option<f64>, value: f64) -> Option<f64> {
    Some(current.map_or(value, |c| c.max(value)))
}

impl RunAccumulator {
    pub fn record(&mut self, outcome: StepOutcome) {
        self.attempted += 1;
        if !outcome.succeeded {
            self.failed += 1;
        }
        self.max_observation_time = max_of(self.max_observation_time, outcome.step.observation_time);
        self.max_update_time = max_of(self.max_update_time, outcome.step.update_time);
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Watermark to store after the run.
    ///
    /// `last_update_time_seen` becomes the latest observation time scanned.
    /// `last_update_time_without_errors` moves to the latest update time only
    /// when no step failed; otherwise the prior value is kept so the failed
    /// steps are selected again next time.
    pub fn finalize(&self, prior: &Watermark) -> Watermark {
        let seen = self
            .max_observation_time
            .unwrap_or(prior.last_update_time_seen);
        let without_errors = match (self.failed, self.max_update_time) {
            (0, Some(update)) => update,
            _ => prior.last_update_time_without_errors,
        };
        Watermark::new(seen, without_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, observation: f64, update: f64) -> TimeStep {
        TimeStep::new(index, observation, update)
    }

    #[test]
    fn test_clean_run_advances() {
        let mut acc = RunAccumulator::default();
        acc.record(StepOutcome::succeeded(step(0, 10.0, 10.0)));
        acc.record(StepOutcome::succeeded(step(1, 20.0, 20.0)));
        acc.record(StepOutcome::succeeded(step(2, 30.0, 30.0)));

        let wm = acc.finalize(&Watermark::EPOCH);
        assert_eq!(wm, Watermark::new(30.0, 30.0));
        assert_eq!((acc.attempted(), acc.succeeded(), acc.failed()), (3, 3, 0));
    }

    #[test]
    fn test_failure_holds_watermark() {
        let mut acc = RunAccumulator::default();
        acc.record(StepOutcome::succeeded(step(0, 10.0, 10.0)));
        acc.record(StepOutcome::failed(step(1, 20.0, 20.0)));
        acc.record(StepOutcome::succeeded(step(2, 30.0, 30.0)));

        let wm = acc.finalize(&Watermark::new(5.0, 5.0));
        assert_eq!(wm.last_update_time_seen, 30.0);
        assert_eq!(wm.last_update_time_without_errors, 5.0);
        assert_eq!(acc.failed(), 1);
    }

    #[test]
    fn test_seen_uses_observation_time() {
        let mut acc = RunAccumulator::default();
        acc.record(StepOutcome::succeeded(step(0, 100.0, 250.0)));
        acc.record(StepOutcome::succeeded(step(1, 120.0, 240.0)));

        let wm = acc.finalize(&Watermark::EPOCH);
        assert_eq!(wm, Watermark::new(120.0, 250.0));
        assert!(!wm.is_ordered());
    }

    #[test]
    fn test_empty_keeps_prior() {
        let prior = Watermark::new(7.0, 6.0);
        assert_eq!(RunAccumulator::default().finalize(&prior), prior);
    }
}
