use crate::Phase;

/// Target rate used when the caller does not provide one.
pub const DEFAULT_TARGET_RATE: f64 = 10.;

/// Number of transactions dispatched when the caller does not provide a count.
pub const DEFAULT_TASK_COUNT: usize = 100;

/// Phases summed into a task's latency under [`LatencyDefinition::PhaseSum`](crate::LatencyDefinition).
///
/// Building the proposal is local work and is left out; the remaining phases are backend round trips.
pub const LATENCY_PHASES: [Phase; 3] = [Phase::Endorse, Phase::Submit, Phase::Status];

/// Commit validation code reported for a valid transaction.
pub const VALID_COMMIT_CODE: i32 = 0;
