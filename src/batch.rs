//! Sequential processing of many radiographs with failure accounting.

use std::time::{Duration, Instant};

use image::DynamicImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::measurement::Calibration;
use crate::config::BatchConfig;
use crate::error::AnalysisError;
use crate::pipeline::{AnalysisResult, Analyzer};

/// One input of a batch. Loading happens upstream, so a decode failure
/// arrives here as an error to be accounted for.
#[derive(Debug)]
pub struct BatchItem {
    pub name: String,
    pub image: Result<DynamicImage, AnalysisError>,
}

impl BatchItem {
    pub fn loaded(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            image: Ok(image),
        }
    }

    pub fn failed(name: impl Into<String>, error: AnalysisError) -> Self {
        Self {
            name: name.into(),
            image: Err(error),
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("processing took {elapsed_ms} ms, limit is {limit_ms} ms")]
    DeadlineExceeded { elapsed_ms: u64, limit_ms: u64 },
}

impl BatchError {
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            BatchError::Analysis(err) => err.suggestions(),
            BatchError::DeadlineExceeded { .. } => vec![
                "Downscale very large radiographs before analysis".to_string(),
                "Use the fast quality mode".to_string(),
            ],
        }
    }
}

#[derive(Debug)]
pub enum BatchOutcome {
    Success {
        name: String,
        result: Box<AnalysisResult>,
    },
    Failure {
        name: String,
        error: BatchError,
    },
    /// Not attempted because the batch was aborted earlier
    Skipped { name: String },
}

impl BatchOutcome {
    pub fn name(&self) -> &str {
        match self {
            BatchOutcome::Success { name, .. }
            | BatchOutcome::Failure { name, .. }
            | BatchOutcome::Skipped { name } => name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success { .. })
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    /// True when the consecutive failure limit was reached
    pub aborted: bool,
}

impl BatchReport {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Failure { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Skipped { .. }))
            .count()
    }
}

pub struct BatchRunner<'a> {
    analyzer: &'a Analyzer,
    calibration: Option<Calibration>,
    max_consecutive_failures: usize,
    deadline: Duration,
}

impl<'a> BatchRunner<'a> {
    /// Runner with the limits of the analyzer's batch profile
    pub fn new(analyzer: &'a Analyzer) -> Self {
        let BatchConfig {
            max_consecutive_failures,
            max_processing_time_secs,
        } = analyzer.config().batch;
        Self {
            analyzer,
            calibration: None,
            max_consecutive_failures,
            deadline: Duration::try_from_secs_f64(max_processing_time_secs)
                .unwrap_or(Duration::MAX),
        }
    }

    pub fn with_calibration(mut self, calibration: Option<Calibration>) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Limits below 1 are raised to 1
    pub fn with_max_consecutive_failures(mut self, limit: usize) -> Self {
        self.max_consecutive_failures = limit.max(1);
        self
    }

    fn process(
        &self,
        image: Result<DynamicImage, AnalysisError>,
    ) -> Result<AnalysisResult, BatchError> {
        let image = image?;
        let started = Instant::now();
        let result = self.analyzer.analyze(&image, self.calibration);
        let elapsed = started.elapsed();

        if elapsed > self.deadline {
            return Err(BatchError::DeadlineExceeded {
                elapsed_ms: elapsed.as_millis() as u64,
                limit_ms: self.deadline.as_millis() as u64,
            });
        }
        Ok(result?)
    }

    pub fn run<I>(&self, items: I) -> BatchReport
    where
        I: IntoIterator<Item = BatchItem>,
    {
        let mut report = BatchReport::default();
        let mut consecutive_failures = 0;

        for item in items {
            if report.aborted {
                report.outcomes.push(BatchOutcome::Skipped { name: item.name });
                continue;
            }

            info!("Processing {}", item.name);
            match self.process(item.image) {
                Ok(result) => {
                    consecutive_failures = 0;
                    report.outcomes.push(BatchOutcome::Success {
                        name: item.name,
                        result: Box::new(result),
                    });
                }
                Err(error) => {
                    consecutive_failures += 1;
                    warn!("{} failed: {}", item.name, error);
                    report.outcomes.push(BatchOutcome::Failure {
                        name: item.name,
                        error,
                    });

                    if consecutive_failures >= self.max_consecutive_failures {
                        warn!(
                            "Stopping batch after {} consecutive failures",
                            consecutive_failures
                        );
                        report.aborted = true;
                    }
                }
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            report.successes(),
            report.failures(),
            report.skipped()
        );
        report
    }
}
