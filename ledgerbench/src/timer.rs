use ledgerbench_core::{Phase, PhaseDuration, PipelineError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Brackets phase calls and keeps the durations of the ones that succeeded.
pub(crate) struct PhaseTimer {
    phases: Vec<PhaseDuration>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self {
            phases: Vec::with_capacity(Phase::ALL.len()),
        }
    }

    /// Runs `fut` as `phase`. On failure nothing is recorded and the error comes back tagged with
    /// the phase that was running.
    pub async fn time<F, T>(&mut self, phase: Phase, fut: F) -> Result<T, (Phase, PipelineError)>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        let start = Instant::now();
        let res = fut.await;
        let elapsed = start.elapsed();

        match res {
            Ok(value) => {
                trace!("{phase} completed in {elapsed:?}");
                record_phase(phase, elapsed);
                self.phases.push(PhaseDuration::new(phase, elapsed));
                Ok(value)
            }
            Err(err) => {
                debug!("{phase} failed after {elapsed:?}: {err}");
                Err((phase, err))
            }
        }
    }

    pub fn into_phases(self) -> Vec<PhaseDuration> {
        self.phases
    }
}

#[cfg(feature = "metrics")]
fn record_phase(phase: Phase, elapsed: Duration) {
    let labels = ledgerbench_core::TASK_LABELS;
    metrics::histogram!(labels.phase_latency, "phase" => phase.as_str())
        .record(elapsed.as_secs_f64());
}

#[cfg(not(feature = "metrics"))]
fn record_phase(_phase: Phase, _elapsed: Duration) {}
