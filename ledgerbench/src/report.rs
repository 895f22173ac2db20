//! Console and CSV renderings of a batch.
use crate::collector::ResultObserver;
use ledgerbench_core::{AggregateMetrics, LatencyDefinition, Phase, TaskResult};
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

fn timestamp(t: OffsetDateTime) -> Result<String, fmt::Error> {
    t.format(TIMESTAMP).map_err(|_| fmt::Error)
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.
}

fn rule(f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
    writeln!(f, "{}", "-".repeat(width))
}

/// One row per task: index, start, end, latency and whether it committed.
pub struct DetailTable<'a> {
    results: &'a [TaskResult],
    latency: LatencyDefinition,
}

impl<'a> DetailTable<'a> {
    pub fn new(results: &'a [TaskResult], latency: LatencyDefinition) -> Self {
        Self { results, latency }
    }
}

impl fmt::Display for DetailTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 98;

        writeln!(f, "*** Individual Transactions ***")?;
        rule(f, WIDTH)?;
        writeln!(
            f,
            "| {:<5} | {:<30} | {:<30} | {:<11} | {:<8} |",
            "ID", "Start", "End", "Latency(ms)", "Success"
        )?;
        rule(f, WIDTH)?;
        for result in self.results {
            writeln!(
                f,
                "| {:<5} | {:<30} | {:<30} | {:<11.2} | {:<8} |",
                result.index,
                timestamp(result.start)?,
                timestamp(result.end)?,
                millis(result.latency(self.latency)),
                if result.success() { "YES" } else { "NO" }
            )?;
        }
        rule(f, WIDTH)
    }
}

/// Fixed-width summary of a batch. Numeric columns use two decimals and can be read back with
/// [`SummaryTable::parse_row`].
pub struct SummaryTable<'a> {
    metrics: &'a AggregateMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub target_rate: f64,
    pub task_count: usize,
    pub success_count: u64,
    pub elapsed_secs: f64,
    pub achieved_rate: f64,
    pub mean_latency_ms: f64,
    pub stddev_latency_ms: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseRowError {
    #[error("Expected 7 columns, found {0}")]
    Columns(usize),

    #[error("Column {column} is not a number: {value:?}")]
    Number { column: usize, value: String },
}

impl<'a> SummaryTable<'a> {
    pub fn new(metrics: &'a AggregateMetrics) -> Self {
        Self { metrics }
    }

    /// The data row, without borders above or below.
    pub fn row(&self) -> String {
        let m = self.metrics;
        format!(
            "| {:<15.2} | {:<20} | {:<7} | {:<11.2} | {:<8.2} | {:<20.2} | {:<20.2} |",
            m.target_rate,
            m.task_count,
            m.success_count,
            m.elapsed.as_secs_f64(),
            m.achieved_rate,
            m.mean_latency_ms,
            m.stddev_latency_ms,
        )
    }

    pub fn parse_row(line: &str) -> Result<SummaryRow, ParseRowError> {
        let columns: Vec<&str> = line
            .trim()
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();
        if columns.len() != 7 {
            return Err(ParseRowError::Columns(columns.len()));
        }

        fn parse<T: std::str::FromStr>(columns: &[&str], column: usize) -> Result<T, ParseRowError> {
            columns[column].parse().map_err(|_| ParseRowError::Number {
                column,
                value: columns[column].to_string(),
            })
        }

        Ok(SummaryRow {
            target_rate: parse(&columns, 0)?,
            task_count: parse(&columns, 1)?,
            success_count: parse(&columns, 2)?,
            elapsed_secs: parse(&columns, 3)?,
            achieved_rate: parse(&columns, 4)?,
            mean_latency_ms: parse(&columns, 5)?,
            stddev_latency_ms: parse(&columns, 6)?,
        })
    }
}

impl fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 121;

        writeln!(f, "*** Benchmarking Summary ***")?;
        rule(f, WIDTH)?;
        writeln!(
            f,
            "| {:<15} | {:<20} | {:<7} | {:<11} | {:<8} | {:<20} | {:<20} |",
            "Target TPS",
            "Transactions sent",
            "Success",
            "Elapsed (s)",
            "TPS",
            "Mean latency (ms)",
            "Std dev (ms)"
        )?;
        rule(f, WIDTH)?;
        writeln!(f, "{}", self.row())?;
        rule(f, WIDTH)
    }
}

/// Throughput figures followed by the average time spent in each phase.
pub struct PhaseBreakdown<'a> {
    metrics: &'a AggregateMetrics,
}

impl<'a> PhaseBreakdown<'a> {
    pub fn new(metrics: &'a AggregateMetrics) -> Self {
        Self { metrics }
    }
}

fn human(d: Duration) -> humantime::FormattedDuration {
    // Sub-microsecond digits are noise for network round trips.
    humantime::format_duration(Duration::from_micros(d.as_micros() as u64))
}

impl fmt::Display for PhaseBreakdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WIDTH: usize = 103;
        let m = self.metrics;

        writeln!(f, "*** Benchmarking Complete ***")?;
        rule(f, WIDTH)?;
        writeln!(
            f,
            "| {:<21} | {:<23} | {:<14} | {:<12} | {:<17} |",
            "Transactions executed",
            "Successful Transactions",
            "Elapsed time",
            "TPS achieved",
            "Average Latency"
        )?;
        rule(f, WIDTH)?;
        writeln!(
            f,
            "| {:<21} | {:<23} | {:<14} | {:<12.2} | {:<17} |",
            m.task_count,
            m.success_count,
            human(m.elapsed).to_string(),
            m.achieved_rate,
            human(m.mean_latency()).to_string(),
        )?;
        rule(f, WIDTH)?;

        writeln!(f)?;
        writeln!(f, "Detailed Timing Breakdown:")?;
        for (phase, mean) in m.phase_means.iter() {
            match mean {
                Some(mean) => writeln!(f, "  Average {} Time: {}", phase.title(), human(*mean))?,
                None => writeln!(f, "  Average {} Time: n/a", phase.title())?,
            }
        }
        writeln!(f, "  Total Time Per Transaction: {}", human(m.mean_latency()))?;

        let failed: Vec<_> = m
            .failures
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(phase, count)| format!("{phase}: {count}"))
            .collect();
        if !failed.is_empty() {
            writeln!(f, "  Failures: {}", failed.join(", "))?;
        }
        Ok(())
    }
}

/// Index, failed phase and error of every task that did not commit.
pub struct FailureList<'a> {
    results: &'a [TaskResult],
}

impl<'a> FailureList<'a> {
    pub fn new(results: &'a [TaskResult]) -> Self {
        Self { results }
    }
}

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in self.results {
            if let (Some(phase), Some(err)) = (result.failed_phase(), result.error()) {
                writeln!(f, "| {:<5} | {:<8} | {err}", result.index, phase)?;
            }
        }
        Ok(())
    }
}

pub const CSV_HEADER: &str = "Transaction,Propose Time (ms),Endorse Time (ms),Ordering Time (ms),Commit Time (ms),Total Time (ms),Latency (ms),Timestamp (ms)";

/// Writes one CSV line per committed task as soon as it completes.
///
/// `Total Time` is the sum of the endorse, ordering and commit times and `Latency` follows the
/// configured [`LatencyDefinition`]. Failed tasks are logged instead of written.
pub struct CsvStream<W> {
    writer: W,
    latency: LatencyDefinition,
}

impl<W: Write + Send + 'static> CsvStream<W> {
    /// Writes the header line right away.
    pub fn new(mut writer: W, latency: LatencyDefinition) -> io::Result<Self> {
        writeln!(writer, "{CSV_HEADER}")?;
        writer.flush()?;
        Ok(Self { writer, latency })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, result: &TaskResult) -> io::Result<()> {
        let phase = |p: Phase| millis(result.phase(p).unwrap_or_default());
        writeln!(
            self.writer,
            "{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{}",
            result.index + 1,
            phase(Phase::Propose),
            phase(Phase::Endorse),
            phase(Phase::Submit),
            phase(Phase::Status),
            millis(result.phase_sum()),
            millis(result.latency(self.latency)),
            result.end.unix_timestamp_nanos() / 1_000_000,
        )?;
        self.writer.flush()
    }
}

impl<W: Write + Send + 'static> ResultObserver for CsvStream<W> {
    fn observe(&mut self, result: &TaskResult) {
        if let (Some(phase), Some(err)) = (result.failed_phase(), result.error()) {
            warn!("Transaction {} failed at {phase}: {err}", result.index + 1);
            return;
        }

        if let Err(err) = self.write_line(result) {
            error!("Failed to write CSV line for transaction {}: {err}", result.index + 1);
        }
    }
}
