use std::fmt;
use std::ops::{Index, IndexMut};
use std::time::Duration;

/// A step of the transaction submission protocol, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Propose,
    Endorse,
    /// Hand-off to the ordering service.
    Submit,
    /// Wait for the commit status.
    Status,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Propose, Phase::Endorse, Phase::Submit, Phase::Status];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Propose => "propose",
            Phase::Endorse => "endorse",
            Phase::Submit => "submit",
            Phase::Status => "status",
        }
    }

    /// Human readable name used in reports.
    pub fn title(self) -> &'static str {
        match self {
            Phase::Propose => "Propose",
            Phase::Endorse => "Endorse",
            Phase::Submit => "Ordering",
            Phase::Status => "Commit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Propose => "Propose",
            Phase::Endorse => "Endorse",
            Phase::Submit => "Submit",
            Phase::Status => "Status",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDuration {
    pub phase: Phase,
    pub elapsed: Duration,
}

impl PhaseDuration {
    pub fn new(phase: Phase, elapsed: Duration) -> Self {
        Self { phase, elapsed }
    }
}

/// Fixed-size map with one entry per [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseMap<T>([T; 4]);

impl<T> PhaseMap<T> {
    pub fn from_fn(f: impl FnMut(Phase) -> T) -> Self {
        Self(Phase::ALL.map(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, &T)> {
        Phase::ALL.into_iter().zip(self.0.iter())
    }
}

impl PhaseMap<u64> {
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

impl<T> Index<Phase> for PhaseMap<T> {
    type Output = T;

    fn index(&self, phase: Phase) -> &T {
        &self.0[phase as usize]
    }
}

impl<T> IndexMut<Phase> for PhaseMap<T> {
    fn index_mut(&mut self, phase: Phase) -> &mut T {
        &mut self.0[phase as usize]
    }
}
