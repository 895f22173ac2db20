//! Race-free collection of task results.
//!
//! Every strategy guarantees that, once all tasks have finished, exactly one outcome per task is
//! held. They differ in how much detail is kept and in when results become visible.
use async_channel::{bounded, Receiver, Sender};
use ledgerbench_core::{LatencyDefinition, Phase, PhaseDuration, PhaseMap, TaskResult};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectorStrategy {
    /// One pre-sized slot per task, written exactly once by its owner.
    #[default]
    Indexed,
    /// Results are sent over a channel and handed to an observer as they arrive.
    Streaming,
    /// Only a success/failure tally and duration samples are kept.
    Counted,
}

/// Receives each result of a streaming run as soon as its task completes.
///
/// Called from a single consumer task, in completion order.
pub trait ResultObserver: Send + 'static {
    fn observe(&mut self, result: &TaskResult);
}

impl<F> ResultObserver for F
where
    F: FnMut(&TaskResult) + Send + 'static,
{
    fn observe(&mut self, result: &TaskResult) {
        self(result)
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Result for task {0} was delivered more than once")]
    Duplicate(usize),

    #[error("No result was delivered for task {0}")]
    Missing(usize),

    #[error("Task index {index} is out of range for a batch of {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("Collected {found} results, expected {expected}")]
    Count { found: usize, expected: usize },

    #[error("Result channel closed unexpectedly")]
    ChannelClosed,

    #[error("Results were drained while tasks were still running")]
    InFlight,

    #[error("Collector mutex is poisoned")]
    PoisonData,

    #[error("Result consumer task failed: {0}")]
    Consumer(#[from] tokio::task::JoinError),
}

impl<T> From<PoisonError<T>> for CollectError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}

/// Results held after the join barrier.
#[derive(Debug, Clone)]
pub enum Collected {
    Detailed(Vec<TaskResult>),
    Counted(CountedResults),
}

impl Collected {
    /// Number of task outcomes held.
    pub fn len(&self) -> usize {
        match self {
            Collected::Detailed(results) => results.len(),
            Collected::Counted(counted) => counted.total() as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-task results, when the strategy kept them.
    pub fn results(&self) -> Option<&[TaskResult]> {
        match self {
            Collected::Detailed(results) => Some(results),
            Collected::Counted(_) => None,
        }
    }
}

/// Tallies and samples kept by [`CollectorStrategy::Counted`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountedResults {
    pub success: u64,
    pub failures: PhaseMap<u64>,
    /// Latencies of successful tasks.
    pub latencies: Vec<Duration>,
    /// Durations of every completed phase, successful task or not.
    pub phases: PhaseMap<Vec<Duration>>,
}

impl CountedResults {
    pub fn total(&self) -> u64 {
        self.success + self.failures.total()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Tally {
    success: u64,
    failures: PhaseMap<u64>,
}

pub(crate) enum Sample {
    Phase(PhaseDuration),
    Latency(Duration),
}

/// Owns the shared state of a run. Tasks get a [`ResultSink`] each; [`finish`](Self::finish) must
/// only be called after every task has been joined.
pub(crate) enum ResultCollector {
    Indexed {
        slots: Arc<Vec<OnceLock<TaskResult>>>,
    },
    Streaming {
        len: usize,
        tx: Sender<TaskResult>,
        consumer: JoinHandle<Vec<TaskResult>>,
    },
    Counted {
        len: usize,
        latency: LatencyDefinition,
        tally: Arc<Mutex<Tally>>,
        tx: Sender<Sample>,
        consumer: JoinHandle<(Vec<Duration>, PhaseMap<Vec<Duration>>)>,
    },
}

impl ResultCollector {
    pub fn indexed(len: usize) -> Self {
        Self::Indexed {
            slots: Arc::new((0..len).map(|_| OnceLock::new()).collect()),
        }
    }

    /// Spawns the single consumer of the result channel; must be called within a tokio runtime.
    pub fn streaming(len: usize, mut observer: Option<Box<dyn ResultObserver>>) -> Self {
        // NOTE: Capacity covers the whole batch so senders never wait on the consumer.
        let (tx, rx) = bounded(len.max(1));
        let consumer = tokio::spawn(
            async move {
                let mut results = Vec::with_capacity(len);
                while let Ok(result) = rx.recv().await {
                    if let Some(observer) = observer.as_mut() {
                        observer.observe(&result);
                    }
                    results.push(result);
                }
                results
            }
            .in_current_span(),
        );

        Self::Streaming { len, tx, consumer }
    }

    /// Spawns the single consumer of the sample channel; must be called within a tokio runtime.
    pub fn counted(len: usize, latency: LatencyDefinition) -> Self {
        // NOTE: Up to four phase samples plus one latency per task.
        let (tx, rx) = bounded(len.max(1) * (Phase::ALL.len() + 1));
        let consumer = tokio::spawn(drain_samples(rx).in_current_span());

        Self::Counted {
            len,
            latency,
            tally: Arc::new(Mutex::new(Tally::default())),
            tx,
            consumer,
        }
    }

    pub fn sink(&self) -> ResultSink {
        match self {
            ResultCollector::Indexed { slots } => ResultSink::Indexed(slots.clone()),
            ResultCollector::Streaming { tx, .. } => ResultSink::Streaming(tx.clone()),
            ResultCollector::Counted {
                latency, tally, tx, ..
            } => ResultSink::Counted {
                latency: *latency,
                tally: tally.clone(),
                tx: tx.clone(),
            },
        }
    }

    /// Drains the collector once every task has finished.
    pub async fn finish(self) -> Result<Collected, CollectError> {
        match self {
            ResultCollector::Indexed { slots } => {
                let slots = Arc::into_inner(slots).ok_or(CollectError::InFlight)?;
                let results = slots
                    .into_iter()
                    .enumerate()
                    .map(|(index, slot)| slot.into_inner().ok_or(CollectError::Missing(index)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Collected::Detailed(results))
            }
            ResultCollector::Streaming { len, tx, consumer } => {
                drop(tx);
                let mut results = consumer.await?;
                check_count(results.len(), len)?;
                results.sort_by_key(|r| r.index);
                if let Some(pair) = results.windows(2).find(|w| w[0].index == w[1].index) {
                    return Err(CollectError::Duplicate(pair[0].index));
                }
                Ok(Collected::Detailed(results))
            }
            ResultCollector::Counted {
                len,
                tally,
                tx,
                consumer,
                ..
            } => {
                drop(tx);
                let (latencies, phases) = consumer.await?;
                let tally = Arc::into_inner(tally)
                    .ok_or(CollectError::InFlight)?
                    .into_inner()?;
                let counted = CountedResults {
                    success: tally.success,
                    failures: tally.failures,
                    latencies,
                    phases,
                };
                check_count(counted.total() as usize, len)?;
                Ok(Collected::Counted(counted))
            }
        }
    }
}

async fn drain_samples(rx: Receiver<Sample>) -> (Vec<Duration>, PhaseMap<Vec<Duration>>) {
    let mut latencies = vec![];
    let mut phases = PhaseMap::<Vec<Duration>>::default();
    while let Ok(sample) = rx.recv().await {
        match sample {
            Sample::Phase(PhaseDuration { phase, elapsed }) => phases[phase].push(elapsed),
            Sample::Latency(latency) => latencies.push(latency),
        }
    }
    (latencies, phases)
}

fn check_count(found: usize, expected: usize) -> Result<(), CollectError> {
    if found == expected {
        Ok(())
    } else {
        Err(CollectError::Count { found, expected })
    }
}

/// Handle a task uses to deliver its result exactly once.
#[derive(Clone)]
pub(crate) enum ResultSink {
    Indexed(Arc<Vec<OnceLock<TaskResult>>>),
    Streaming(Sender<TaskResult>),
    Counted {
        latency: LatencyDefinition,
        tally: Arc<Mutex<Tally>>,
        tx: Sender<Sample>,
    },
}

impl ResultSink {
    pub async fn deliver(&self, result: TaskResult) -> Result<(), CollectError> {
        match self {
            ResultSink::Indexed(slots) => {
                let index = result.index;
                let slot = slots.get(index).ok_or(CollectError::OutOfRange {
                    index,
                    len: slots.len(),
                })?;
                slot.set(result).map_err(|_| CollectError::Duplicate(index))
            }
            ResultSink::Streaming(tx) => tx
                .send(result)
                .await
                .map_err(|_| CollectError::ChannelClosed),
            ResultSink::Counted { latency, tally, tx } => {
                {
                    let mut tally = tally.lock()?;
                    match result.failed_phase() {
                        None => tally.success += 1,
                        Some(phase) => tally.failures[phase] += 1,
                    }
                }

                for phase in &result.phases {
                    tx.send(Sample::Phase(*phase))
                        .await
                        .map_err(|_| CollectError::ChannelClosed)?;
                }
                if result.success() {
                    tx.send(Sample::Latency(result.latency(*latency)))
                        .await
                        .map_err(|_| CollectError::ChannelClosed)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerbench_core::{PipelineError, TaskOutcome};
    use time::OffsetDateTime;

    fn result(index: usize, failed: Option<Phase>) -> TaskResult {
        let completed = Phase::ALL
            .into_iter()
            .take_while(|p| Some(*p) != failed)
            .map(|p| PhaseDuration::new(p, Duration::from_millis(10)))
            .collect();
        let outcome = match failed {
            None => TaskOutcome::Committed {
                transaction_id: format!("tx-{index}"),
            },
            Some(phase) => TaskOutcome::Failed {
                phase,
                error: PipelineError::Proposal {
                    detail: "boom".into(),
                },
            },
        };
        TaskResult {
            index,
            start: OffsetDateTime::UNIX_EPOCH,
            end: OffsetDateTime::UNIX_EPOCH,
            span: Duration::from_millis(40),
            phases: completed,
            outcome,
        }
    }

    fn mixed(index: usize) -> Option<Phase> {
        match index % 4 {
            1 => Some(Phase::Endorse),
            3 => Some(Phase::Status),
            _ => None,
        }
    }

    async fn deliver_concurrently(collector: &ResultCollector, len: usize) {
        let handles: Vec<_> = (0..len)
            .rev()
            .map(|index| {
                let sink = collector.sink();
                tokio::spawn(async move { sink.deliver(result(index, mixed(index))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn indexed_holds_every_result() {
        let collector = ResultCollector::indexed(64);
        deliver_concurrently(&collector, 64).await;

        let collected = collector.finish().await.unwrap();
        let results = collected.results().unwrap();
        assert_eq!(results.len(), 64);
        assert!(results.iter().enumerate().all(|(i, r)| r.index == i));
        assert_eq!(results.iter().filter(|r| r.success()).count(), 32);
    }

    #[tokio::test]
    async fn indexed_rejects_duplicates_and_gaps() {
        let collector = ResultCollector::indexed(2);
        let sink = collector.sink();
        sink.deliver(result(0, None)).await.unwrap();
        assert!(matches!(
            sink.deliver(result(0, None)).await,
            Err(CollectError::Duplicate(0))
        ));
        assert!(matches!(
            sink.deliver(result(5, None)).await,
            Err(CollectError::OutOfRange { index: 5, len: 2 })
        ));
        drop(sink);

        assert!(matches!(
            collector.finish().await,
            Err(CollectError::Missing(1))
        ));
    }

    #[tokio::test]
    async fn indexed_refuses_to_drain_while_shared() {
        let collector = ResultCollector::indexed(1);
        let _sink = collector.sink();
        assert!(matches!(
            collector.finish().await,
            Err(CollectError::InFlight)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn streaming_observes_every_result() {
        let seen = Arc::new(Mutex::new(vec![]));
        let observed = seen.clone();
        let collector = ResultCollector::streaming(
            40,
            Some(Box::new(move |r: &TaskResult| {
                observed.lock().unwrap().push(r.index)
            })),
        );
        deliver_concurrently(&collector, 40).await;

        let collected = collector.finish().await.unwrap();
        let results = collected.results().unwrap();
        assert_eq!(results.len(), 40);
        assert!(results.iter().enumerate().all(|(i, r)| r.index == i));

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn streaming_detects_missing_results() {
        let collector = ResultCollector::streaming(3, None);
        let sink = collector.sink();
        sink.deliver(result(0, None)).await.unwrap();
        drop(sink);

        assert!(matches!(
            collector.finish().await,
            Err(CollectError::Count {
                found: 1,
                expected: 3
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn counted_tallies_outcomes() {
        let collector = ResultCollector::counted(20, LatencyDefinition::PhaseSum);
        deliver_concurrently(&collector, 20).await;

        let Collected::Counted(counted) = collector.finish().await.unwrap() else {
            panic!("expected counted results");
        };
        assert_eq!(counted.total(), 20);
        assert_eq!(counted.success, 10);
        assert_eq!(counted.failures[Phase::Endorse], 5);
        assert_eq!(counted.failures[Phase::Status], 5);
        assert_eq!(counted.latencies.len(), 10);
        assert!(counted
            .latencies
            .iter()
            .all(|l| *l == Duration::from_millis(30)));
        // Every task proposed, the endorse failures stopped there.
        assert_eq!(counted.phases[Phase::Propose].len(), 20);
        assert_eq!(counted.phases[Phase::Endorse].len(), 15);
        assert_eq!(counted.phases[Phase::Status].len(), 10);
    }
}
