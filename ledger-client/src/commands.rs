use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use ledger_client::assets::{
    create_asset_invocation, pretty_json, AssetIdGenerator, CREATE_ASSET, GET_ALL_ASSETS,
    INIT_LEDGER, READ_ASSET, TRANSFER_ASSET, UPDATE_ASSET,
};
use ledger_client::{ConnectOptions, Contract, Gateway, Identity};
use ledgerbench::prelude::*;
use mock_ledger::MockConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Drive and benchmark the asset-transfer contract")]
pub struct Cli {
    /// Gateway peer, as a URL or host:port.
    #[arg(long, env = "LEDGER_ENDPOINT", default_value = "localhost:7051", global = true)]
    endpoint: String,

    #[arg(long, env = "MSP_ID", default_value = "Org1MSP", global = true)]
    msp_id: String,

    /// Directory holding the client certificate; the first file is used.
    #[arg(long, env = "CERT_PATH", global = true)]
    cert_path: Option<PathBuf>,

    /// PEM CA certificate of the peer's TLS endpoint.
    #[arg(long, env = "TLS_CA", global = true)]
    tls_ca: Option<PathBuf>,

    #[arg(long, env = "CHANNEL_NAME", default_value = "mychannel", global = true)]
    channel: String,

    #[arg(long, env = "CHAINCODE_NAME", default_value = "basic", global = true)]
    contract: String,

    /// Seed for generated asset ids. Defaults to the current time.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = LatencyArg::PhaseSum, global = true)]
    latency: LatencyArg,

    /// Expose Prometheus metrics on this address.
    #[arg(long, global = true)]
    pub prometheus: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the initial set of assets.
    InitLedger,
    /// Print every asset on the ledger.
    GetAllAssets,
    /// Create assets one at a time, waiting for each commit.
    CreateAsset {
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        count: i64,
    },
    /// Create assets one after another, timing each phase separately.
    EndorseAsset {
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        count: i64,
    },
    ReadAsset {
        id: String,
    },
    /// Transfer an asset, awaiting the commit after ordering.
    TransferAsset {
        id: String,
        owner: String,
    },
    /// Create assets at a fixed rate and report latencies.
    Bench {
        #[arg(default_value_t = ledgerbench::core::DEFAULT_TARGET_RATE, allow_negative_numbers = true)]
        rate: f64,
        #[arg(default_value_t = ledgerbench::core::DEFAULT_TASK_COUNT as i64, allow_negative_numbers = true)]
        count: i64,
        #[arg(long, value_enum, default_value_t = Report::Table)]
        report: Report,
    },
    /// Show how failures of each phase are reported.
    ErrorHandling,
    /// Serve a mock ledger.
    MockLedger {
        #[arg(long, default_value = "127.0.0.1:7051")]
        listen: SocketAddr,
        /// Delay added to the endorse, order and commit phases.
        #[arg(long, default_value = "10ms", value_parser = humantime::parse_duration)]
        phase_delay: Duration,
        /// Ordering throughput cap in transactions per second; 0 disables it.
        #[arg(long, default_value_t = 0)]
        max_order_rate: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LatencyArg {
    PhaseSum,
    EndToEnd,
}

impl From<LatencyArg> for LatencyDefinition {
    fn from(arg: LatencyArg) -> Self {
        match arg {
            LatencyArg::PhaseSum => LatencyDefinition::PhaseSum,
            LatencyArg::EndToEnd => LatencyDefinition::EndToEnd,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Report {
    /// Per-transaction table and summary.
    Table,
    /// One CSV line per committed transaction, as it commits.
    Csv,
    /// Summary and average time per phase.
    Breakdown,
}

impl Report {
    fn strategy(self) -> CollectorStrategy {
        match self {
            Report::Table => CollectorStrategy::Indexed,
            Report::Csv => CollectorStrategy::Streaming,
            Report::Breakdown => CollectorStrategy::Counted,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        if let Command::MockLedger {
            listen,
            phase_delay,
            max_order_rate,
        } = self.command
        {
            let config = MockConfig::new()
                .phase_delay(phase_delay)
                .max_order_rate(max_order_rate);
            mock_ledger::run(listen, config).await?;
            return Ok(());
        }

        let contract = self.connect()?;
        let seed = self.seed.unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp_nanos() as u64);
        let mut ids = AssetIdGenerator::new(seed);
        info!("Asset id seed: {seed}");

        match self.command {
            Command::InitLedger => init_ledger(&contract).await,
            Command::GetAllAssets => get_all_assets(&contract).await,
            Command::CreateAsset { count } => create_assets(&contract, &mut ids, count).await,
            Command::EndorseAsset { count } => {
                endorse_assets(contract, ids, count, self.latency.into()).await
            }
            Command::ReadAsset { id } => read_asset(&contract, &id).await,
            Command::TransferAsset { id, owner } => transfer_asset(&contract, &id, &owner).await,
            Command::Bench {
                rate,
                count,
                report,
            } => bench(contract, ids, rate, count, report, self.latency.into()).await,
            Command::ErrorHandling => error_handling(&contract).await,
            Command::MockLedger { .. } => Ok(()),
        }
    }

    fn connect(&self) -> anyhow::Result<Contract> {
        let identity = match &self.cert_path {
            Some(dir) => Identity::from_cert_dir(&self.msp_id, dir)?,
            None => {
                warn!("No --cert-path given; connecting without a certificate");
                Identity::new(&self.msp_id, Vec::<u8>::new())
            }
        };

        let mut options = ConnectOptions::new(&self.endpoint, identity);
        if let Some(ca) = &self.tls_ca {
            options = options.tls_ca(ca);
        }

        let gateway = Gateway::connect(options)
            .with_context(|| format!("Failed to connect to {}", self.endpoint))?;
        Ok(gateway.network(&self.channel).contract(&self.contract))
    }
}

async fn init_ledger(contract: &Contract) -> anyhow::Result<()> {
    println!("\n--> Submit Transaction: {INIT_LEDGER}, function creates the initial set of assets on the ledger");
    contract.submit(INIT_LEDGER, &[]).await?;
    println!("*** Transaction committed successfully");
    Ok(())
}

async fn get_all_assets(contract: &Contract) -> anyhow::Result<()> {
    println!("\n--> Evaluate Transaction: {GET_ALL_ASSETS}, function returns all the current assets on the ledger");
    let result = contract.evaluate(GET_ALL_ASSETS, &[]).await?;
    println!("*** Result:{}", pretty_json(&result));
    Ok(())
}

async fn create_assets(
    contract: &Contract,
    ids: &mut AssetIdGenerator,
    count: i64,
) -> anyhow::Result<()> {
    let count = count.max(1);
    println!("\n--> Submit Transactions: {CREATE_ASSET}, creates {count} new assets with ID, Color, Size, Owner, and AppraisedValue arguments");

    for _ in 0..count {
        let invocation = create_asset_invocation(&ids.next_id());
        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();

        let start = Instant::now();
        contract.submit(&invocation.method, &args).await?;
        let elapsed = start.elapsed();

        println!("*** Transaction {} committed successfully", args[0]);
        println!("Time taken: {}", humantime::format_duration(elapsed));
    }
    Ok(())
}

async fn endorse_assets(
    contract: Contract,
    mut ids: AssetIdGenerator,
    count: i64,
    latency: LatencyDefinition,
) -> anyhow::Result<()> {
    let sequence = Sequence::new(count).latency(latency);
    println!(
        "\n--> Submit Transactions: {CREATE_ASSET}, creates {} new assets one at a time, timing the endorse, ordering and commit phases",
        sequence.task_count()
    );

    let outcome = sequence
        .run(Arc::new(contract), |_| create_asset_invocation(&ids.next_id()))
        .await;

    for result in outcome.results() {
        match (result.failed_phase(), result.error()) {
            (Some(phase), Some(err)) => println!("*** {phase} failed for transaction {}: {err}", result.index + 1),
            _ => println!("*** Transaction {} committed successfully", result.transaction_id().unwrap_or_default()),
        }
    }

    match outcome.metrics() {
        Ok(metrics) => println!("\n{}", PhaseBreakdown::new(&metrics)),
        Err(no_data) => println!("{no_data}"),
    }
    Ok(())
}

async fn read_asset(contract: &Contract, id: &str) -> anyhow::Result<()> {
    println!("\n--> Evaluate Transaction: {READ_ASSET}, function returns asset attributes for asset ID: {id}");
    let result = contract.evaluate(READ_ASSET, &[id]).await?;
    println!("*** Result:{}", pretty_json(&result));
    Ok(())
}

async fn transfer_asset(contract: &Contract, id: &str, owner: &str) -> anyhow::Result<()> {
    println!("\n--> Async Submit Transaction: {TRANSFER_ASSET}, updates existing asset owner");
    let (old_owner, commit) = contract.submit_async(TRANSFER_ASSET, &[id, owner]).await?;
    println!(
        "\n*** Successfully submitted transaction to transfer ownership from {} to {owner}.",
        String::from_utf8_lossy(&old_owner)
    );
    println!("*** Waiting for transaction commit.");

    let status = contract.status(commit).await?;
    if !status.successful {
        bail!(
            "Transaction {} failed to commit with status code {}",
            status.transaction_id,
            status.code
        );
    }
    println!("*** Transaction committed successfully");
    Ok(())
}

async fn bench(
    contract: Contract,
    mut ids: AssetIdGenerator,
    rate: f64,
    count: i64,
    report: Report,
    latency: LatencyDefinition,
) -> anyhow::Result<()> {
    let config = BenchmarkConfig::new(rate, count)?.with_latency(latency);
    println!(
        "\n--> Benchmarking {CREATE_ASSET} at {} TPS ({} transactions)",
        config.target_rate(),
        config.task_count()
    );

    let benchmark = match report {
        Report::Csv => Benchmark::new(config).stream_to(CsvStream::new(std::io::stdout(), latency)?),
        _ => Benchmark::new(config).strategy(report.strategy()),
    };
    let outcome = benchmark
        .run(Arc::new(contract), |_| create_asset_invocation(&ids.next_id()))
        .await?;

    if let (Report::Table, Some(results)) = (report, outcome.results()) {
        println!("\n{}", DetailTable::new(results, latency));
        if outcome.failures().next().is_some() {
            println!("\n*** Failed Transactions ***");
            print!("{}", FailureList::new(results));
        }
    }

    let metrics = match outcome.metrics() {
        Ok(metrics) => metrics,
        Err(no_data) => {
            println!("{no_data}");
            return Ok(());
        }
    };

    match report {
        Report::Table => println!("\n{}", SummaryTable::new(&metrics)),
        Report::Csv => info!(
            "{} of {} committed, {:.2} TPS, mean latency {:.2}ms",
            metrics.success_count, metrics.task_count, metrics.achieved_rate, metrics.mean_latency_ms
        ),
        Report::Breakdown => println!("\n{}", PhaseBreakdown::new(&metrics)),
    }
    Ok(())
}

async fn error_handling(contract: &Contract) -> anyhow::Result<()> {
    println!("\n--> Submit Transaction: {UPDATE_ASSET} asset70, asset70 does not exist and should return an error");

    let err = match contract
        .submit(UPDATE_ASSET, &["asset70", "blue", "5", "Tomoko", "300"])
        .await
    {
        Ok(_) => bail!("******** FAILED to return an error"),
        Err(err) => err,
    };

    println!("*** Successfully caught the error:");
    match &err {
        PipelineError::Proposal { detail } => println!("Failed to create proposal: {detail}"),
        PipelineError::Endorse {
            transaction_id,
            detail,
        } => println!("Endorse error for transaction {transaction_id}: {detail}"),
        PipelineError::Order {
            transaction_id,
            detail,
        } => println!("Submit error for transaction {transaction_id}: {detail}"),
        PipelineError::CommitStatus {
            transaction_id,
            timed_out: true,
            detail,
        } => println!("Timeout waiting for transaction {transaction_id} commit status: {detail}"),
        PipelineError::CommitStatus {
            transaction_id,
            detail,
            ..
        } => println!("Error obtaining commit status for transaction {transaction_id}: {detail}"),
        PipelineError::Commit {
            transaction_id,
            code,
        } => println!("Transaction {transaction_id} failed to commit with status {code}"),
    }
    debug!("Failed at {}", err.phase());
    Ok(())
}
