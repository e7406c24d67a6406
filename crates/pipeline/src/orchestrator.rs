//! Dataset-level publishing runs.

use std::fmt;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use hydro_common::{
    ArraySource, Calendar, DatasetDescriptor, SourceError, SourceOpener, TimeStep, Watermark,
};
use storage::{RowSink, SinkConnector, WatermarkStore};

use crate::error::{PipelineError, Result};
use crate::outcome::{RunAccumulator, StepOutcome};
use crate::projector::project_time_step;
use crate::selector::select_changes;

/// Options for a publishing run.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Publish at most the last N changed time-steps per dataset.
    pub only_last_n: Option<usize>,
    /// Select and project, but neither publish rows nor write state.
    pub dry_run: bool,
}

/// Where the orchestrator is within a dataset run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Selecting,
    /// Publishing the i-th selected step.
    Publishing(usize),
    Finalizing,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Selecting => write!(f, "selecting"),
            RunState::Publishing(i) => write!(f, "publishing({})", i),
            RunState::Finalizing => write!(f, "finalizing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    /// Nothing newer than the watermark.
    UpToDate,
    /// Every selected step was attempted and the state written.
    Published,
    /// Selected and projected only; nothing was written.
    DryRun,
    /// Stopped on a source error; the state was left untouched.
    Aborted,
}

/// Outcome of one dataset's run.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub status: DatasetStatus,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Watermark in effect after the run (the stored one unless published).
    pub watermark: Watermark,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatasetReport {
    fn new(dataset: &DatasetDescriptor, status: DatasetStatus, watermark: Watermark) -> Self {
        Self {
            dataset: dataset.name.clone(),
            status,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            watermark,
            error: None,
        }
    }

    fn with_counts(mut self, acc: &RunAccumulator) -> Self {
        self.attempted = acc.attempted();
        self.succeeded = acc.succeeded();
        self.failed = acc.failed();
        self
    }

    fn with_error(mut self, error: &PipelineError) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn is_clean(&self) -> bool {
        self.status != DatasetStatus::Aborted && self.failed == 0
    }
}

/// Outcome of a whole run, datasets in processing order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub datasets: Vec<DatasetReport>,
    pub elapsed: Duration,
}

impl RunReport {
    /// No dataset aborted and no step failed.
    pub fn is_clean(&self) -> bool {
        self.datasets.iter().all(DatasetReport::is_clean)
    }

    pub fn failed_steps(&self) -> usize {
        self.datasets.iter().map(|d| d.failed).sum()
    }
}

/// Drives datasets through select, publish and finalize.
///
/// One sink session is held per dataset and released when that dataset is
/// done, whatever the outcome.
pub struct Orchestrator<O, C> {
    opener: O,
    connector: C,
    calendar: Calendar,
    options: PublishOptions,
    state: RunState,
}

impl<O, C> Orchestrator<O, C>
where
    O: SourceOpener,
    C: SinkConnector,
{
    pub fn new(opener: O, connector: C, options: PublishOptions) -> Self {
        Self {
            opener,
            connector,
            calendar: Calendar::cnes(),
            options,
            state: RunState::Idle,
        }
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "Run state");
        self.state = next;
    }

    /// Publish every dataset in order.
    ///
    /// Datasets stopped by source errors are reported and the run moves on;
    /// an unreachable sink or a failing watermark store ends the run.
    pub async fn run(&mut self, datasets: &[DatasetDescriptor]) -> Result<RunReport> {
        DatasetDescriptor::validate_all(datasets)?;

        let started = Instant::now();
        let mut reports = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            reports.push(self.publish_dataset(dataset).await?);
        }

        let report = RunReport {
            datasets: reports,
            elapsed: started.elapsed(),
        };
        info!(
            datasets = report.datasets.len(),
            failed_steps = report.failed_steps(),
            clean = report.is_clean(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run complete"
        );
        Ok(report)
    }

    /// Publish one dataset with its own sink session.
    #[instrument(skip(self, dataset), fields(dataset = %dataset.name))]
    pub async fn publish_dataset(&mut self, dataset: &DatasetDescriptor) -> Result<DatasetReport> {
        let mut session = self.connector.session().await?;
        let report = self.publish_with_session(&mut session, dataset).await;
        self.transition(RunState::Idle);
        report
    }

    async fn publish_with_session(
        &mut self,
        session: &mut C::Session,
        dataset: &DatasetDescriptor,
    ) -> Result<DatasetReport> {
        self.transition(RunState::Selecting);

        let prior = session.read(&dataset.name).await?.unwrap_or_default();

        let (source, steps) = match self.open_source(dataset) {
            Ok(opened) => opened,
            Err(e) => {
                warn!(error = %e, "Dataset aborted before publishing");
                return Ok(DatasetReport::new(dataset, DatasetStatus::Aborted, prior).with_error(&e));
            }
        };

        let selected = select_changes(
            &steps,
            prior.last_update_time_without_errors,
            self.options.only_last_n,
        );
        if selected.is_empty() {
            info!(
                watermark = prior.last_update_time_without_errors,
                time_steps = steps.len(),
                "Up to date"
            );
            return Ok(DatasetReport::new(dataset, DatasetStatus::UpToDate, prior));
        }

        info!(
            selected = selected.len(),
            time_steps = steps.len(),
            watermark = prior.last_update_time_without_errors,
            dry_run = self.options.dry_run,
            "Publishing changed time-steps"
        );

        let mut acc = RunAccumulator::default();
        for (i, step) in selected.iter().enumerate() {
            self.transition(RunState::Publishing(i));
            let started = Instant::now();

            match self.publish_step(&source, session, dataset, step).await {
                Ok(rows) => {
                    acc.record(StepOutcome::succeeded(*step));
                    counter!("hydro_publisher_steps_total", "dataset" => dataset.name.clone(), "outcome" => "succeeded").increment(1);
                    info!(
                        time_index = step.index,
                        observation_time = step.observation_time,
                        update_time = step.update_time,
                        rows = rows,
                        "Published time-step"
                    );
                }
                Err(e) if e.is_sink_unavailable() => {
                    warn!(time_index = step.index, error = %e, "Sink lost, state not written");
                    return Err(e);
                }
                Err(e) if e.is_fatal() => {
                    warn!(time_index = step.index, error = %e, "Dataset aborted");
                    return Ok(DatasetReport::new(dataset, DatasetStatus::Aborted, prior)
                        .with_counts(&acc)
                        .with_error(&e));
                }
                Err(e) => {
                    acc.record(StepOutcome::failed(*step));
                    counter!("hydro_publisher_steps_total", "dataset" => dataset.name.clone(), "outcome" => "failed").increment(1);
                    warn!(
                        time_index = step.index,
                        observation_time = step.observation_time,
                        error = %e,
                        "Failed to publish time-step"
                    );
                }
            }

            histogram!("hydro_publisher_step_duration_seconds", "dataset" => dataset.name.clone())
                .record(started.elapsed().as_secs_f64());
        }

        self.transition(RunState::Finalizing);
        let watermark = acc.finalize(&prior);
        if !watermark.is_ordered() {
            warn!(
                seen = watermark.last_update_time_seen,
                without_errors = watermark.last_update_time_without_errors,
                "Update time ahead of observation time"
            );
        }

        if self.options.dry_run {
            info!("Dry run, state not written");
            return Ok(DatasetReport::new(dataset, DatasetStatus::DryRun, prior).with_counts(&acc));
        }

        let errors = u32::try_from(acc.failed()).unwrap_or(u32::MAX);
        session.write(&dataset.name, &watermark, errors).await?;
        gauge!("hydro_publisher_watermark_days", "dataset" => dataset.name.clone())
            .set(watermark.last_update_time_without_errors);

        info!(
            attempted = acc.attempted(),
            failed = acc.failed(),
            seen = watermark.last_update_time_seen,
            without_errors = watermark.last_update_time_without_errors,
            "Dataset published"
        );

        Ok(DatasetReport::new(dataset, DatasetStatus::Published, watermark).with_counts(&acc))
    }

    /// Open the store, check the configured variables and list its steps.
    fn open_source(&self, dataset: &DatasetDescriptor) -> Result<(O::Source, Vec<TimeStep>)> {
        let source = self.opener.open(&dataset.source)?;
        if let Some(missing) = dataset
            .variables
            .iter()
            .find(|v| !source.has_variable(&v.source))
        {
            return Err(SourceError::VariableMissing(missing.source.clone()).into());
        }
        let steps = source.time_steps()?;
        Ok((source, steps))
    }

    async fn publish_step(
        &self,
        source: &O::Source,
        session: &mut C::Session,
        dataset: &DatasetDescriptor,
        step: &TimeStep,
    ) -> Result<usize> {
        let batch = project_time_step(source, dataset, step, &self.calendar)?;
        if !self.options.dry_run {
            session.publish(&batch, &dataset.target).await?;
        }
        Ok(batch.len())
    }
}
