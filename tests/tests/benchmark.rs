mod utils;
#[allow(unused)]
use utils::*;

use ledger_client::assets::{create_asset_invocation, AssetIdGenerator, UPDATE_ASSET};
use ledgerbench::prelude::*;
use ledgerbench::report::CSV_HEADER;
use mock_ledger::MockConfig;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn phase_delay() -> MockConfig {
    MockConfig::new().phase_delay(Duration::from_millis(5))
}

#[tokio::test(flavor = "multi_thread")]
async fn every_strategy_collects_the_batch() {
    let contract = Arc::new(ledger_contract(phase_delay()).await);
    let mut ids = AssetIdGenerator::new(1);

    for strategy in [
        CollectorStrategy::Indexed,
        CollectorStrategy::Streaming,
        CollectorStrategy::Counted,
    ] {
        let config = BenchmarkConfig::new(50., 20).unwrap();
        let outcome = Benchmark::new(config)
            .strategy(strategy)
            .run(contract.clone(), |_| create_asset_invocation(&ids.next_id()))
            .await
            .unwrap();

        assert_eq!(outcome.collected().len(), 20, "{strategy:?}");
        let metrics = outcome.metrics().unwrap();
        assert_eq!(metrics.success_count, 20, "{strategy:?}");
        assert_eq!(metrics.failure_count, 0);
        assert!(metrics.mean_latency_ms >= 15., "{}", metrics.mean_latency_ms);
        assert!(metrics.achieved_rate > 0.);
        assert!(metrics.latency_p50 <= metrics.latency_p99);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn detailed_results_are_ordered_and_consistent() {
    let contract = Arc::new(ledger_contract(phase_delay()).await);
    let mut ids = AssetIdGenerator::new(2);

    let outcome = Benchmark::from_rate(100., 10)
        .unwrap()
        .run(contract, |_| create_asset_invocation(&ids.next_id()))
        .await
        .unwrap();

    let results = outcome.results().unwrap();
    assert_eq!(results.len(), 10);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.index, i);
        assert!(result.success());
        assert!(result.is_consistent());
        assert_eq!(result.phases.len(), Phase::ALL.len());
        assert!(result.phase_sum() <= result.span);
    }

    let table = DetailTable::new(results, LatencyDefinition::PhaseSum).to_string();
    assert_eq!(table.lines().filter(|l| l.starts_with("| ")).count(), 11);
}

#[tracing_test::traced_test]
#[tokio::test(flavor = "multi_thread")]
async fn failures_are_counted_by_phase() {
    let contract = Arc::new(ledger_contract(MockConfig::new()).await);
    let mut ids = AssetIdGenerator::new(3);

    // Odd tasks update assets that do not exist.
    let outcome = Benchmark::from_rate(200., 10)
        .unwrap()
        .run(contract, |i| {
            let id = ids.next_id();
            if i % 2 == 0 {
                create_asset_invocation(&id)
            } else {
                Invocation::new(UPDATE_ASSET, [id.as_str(), "blue", "5", "Tomoko", "300"])
            }
        })
        .await
        .unwrap();

    let metrics = outcome.metrics().unwrap();
    assert_eq!(metrics.success_count, 5);
    assert_eq!(metrics.failure_count, 5);
    assert_eq!(metrics.failures[Phase::Endorse], 5);
    assert_eq!(outcome.failures().count(), 5);

    let listing = FailureList::new(outcome.results().unwrap()).to_string();
    assert!(listing.contains("does not exist"), "{listing}");
    assert!(logs_contain("Task 1 failed at Endorse"));
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn csv_stream_writes_one_line_per_commit() {
    let contract = Arc::new(ledger_contract(phase_delay()).await);
    let mut ids = AssetIdGenerator::new(4);
    let buffer = SharedBuffer::default();

    let csv = CsvStream::new(buffer.clone(), LatencyDefinition::PhaseSum).unwrap();
    let outcome = Benchmark::from_rate(100., 8)
        .unwrap()
        .stream_to(csv)
        .run(contract, |_| create_asset_invocation(&ids.next_id()))
        .await
        .unwrap();
    assert_eq!(outcome.metrics().unwrap().success_count, 8);

    let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));

    let mut transactions: Vec<usize> = lines
        .map(|line| {
            let columns: Vec<&str> = line.split(',').collect();
            assert_eq!(columns.len(), 8, "{line}");
            columns[0].parse().unwrap()
        })
        .collect();
    transactions.sort();
    assert_eq!(transactions, (1..=8).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn ordering_cap_slows_the_batch() {
    let contract = Arc::new(ledger_contract(MockConfig::new().max_order_rate(20)).await);
    let mut ids = AssetIdGenerator::new(5);

    let outcome = Benchmark::from_rate(200., 30)
        .unwrap()
        .strategy(CollectorStrategy::Counted)
        .run(contract, |_| create_asset_invocation(&ids.next_id()))
        .await
        .unwrap();

    let metrics = outcome.metrics().unwrap();
    assert_eq!(metrics.success_count, 30);
    assert!(metrics.achieved_rate < 200., "{}", metrics.achieved_rate);
    assert!(metrics.elapsed > Duration::from_millis(300), "{:?}", metrics.elapsed);
}
