mod utils;
#[allow(unused)]
use utils::*;

use ledger_client::assets::{
    create_asset_invocation, AssetIdGenerator, CREATE_ASSET, GET_ALL_ASSETS, INIT_LEDGER,
    READ_ASSET, TRANSFER_ASSET, UPDATE_ASSET,
};
use ledgerbench::prelude::*;
use mock_ledger::prelude::*;
use mock_ledger::MockConfig;
use std::time::Duration;

#[tokio::test]
async fn init_and_query_assets() {
    let contract = ledger_contract(MockConfig::new()).await;

    contract.submit(INIT_LEDGER, &[]).await.unwrap();

    let all = contract.evaluate(GET_ALL_ASSETS, &[]).await.unwrap();
    let assets: Vec<Asset> = serde_json::from_slice(&all).unwrap();
    assert_eq!(assets.len(), 6);

    let one = contract.evaluate(READ_ASSET, &["asset1"]).await.unwrap();
    let asset: Asset = serde_json::from_slice(&one).unwrap();
    assert_eq!(asset, Asset::new("asset1", "blue", 5, "Tomoko", 300));
}

#[tokio::test]
async fn create_and_transfer() {
    let contract = ledger_contract(MockConfig::new().phase_delay(Duration::from_millis(5))).await;
    let id = AssetIdGenerator::new(7).next_id();

    contract
        .submit(CREATE_ASSET, &[&id, "yellow", "5", "Tom", "1300"])
        .await
        .unwrap();

    let (old_owner, commit) = contract
        .submit_async(TRANSFER_ASSET, &[&id, "Saptha"])
        .await
        .unwrap();
    assert_eq!(old_owner, b"Tom");

    let status = contract.status(commit).await.unwrap();
    assert!(status.successful);
    assert_eq!(status.code, ValidationCode::Valid.code());

    let read = contract.evaluate(READ_ASSET, &[&id]).await.unwrap();
    let asset: Asset = serde_json::from_slice(&read).unwrap();
    assert_eq!(asset.owner, "Saptha");
}

#[tokio::test]
async fn missing_asset_fails_at_endorsement() {
    let contract = ledger_contract(MockConfig::new()).await;

    let err = contract
        .submit(UPDATE_ASSET, &["asset70", "blue", "5", "Tomoko", "300"])
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Endorse);
    assert!(err.transaction_id().is_some());
    match err {
        PipelineError::Endorse { detail, .. } => {
            assert!(detail.contains("mspId: Org1MSP"), "{detail}");
            assert!(detail.contains("the asset asset70 does not exist"), "{detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn evaluate_reports_peer_details() {
    let contract = ledger_contract(MockConfig::new()).await;

    let err = contract.evaluate(READ_ASSET, &["asset70"]).await.unwrap_err();
    let details = err.details();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].msp_id, "Org1MSP");
    assert!(details[0].message.starts_with("chaincode response 500"));
}

#[tokio::test]
async fn concurrent_transfers_conflict_at_commit() {
    let contract = ledger_contract(MockConfig::new().commit_delay(Duration::from_millis(20))).await;
    contract
        .submit(CREATE_ASSET, &["asset9", "blue", "5", "Tom", "300"])
        .await
        .unwrap();

    // Both endorsements read the same version of asset9.
    let first = contract
        .propose(&Invocation::new(TRANSFER_ASSET, ["asset9", "Ann"]))
        .await
        .unwrap();
    let second = contract
        .propose(&Invocation::new(TRANSFER_ASSET, ["asset9", "Bob"]))
        .await
        .unwrap();
    let first = contract.endorse(first).await.unwrap();
    let second = contract.endorse(second).await.unwrap();

    let first = Pipeline::submit(&contract, first).await.unwrap();
    let second = Pipeline::submit(&contract, second).await.unwrap();
    let statuses = [
        contract.status(first).await.unwrap(),
        contract.status(second).await.unwrap(),
    ];

    assert_eq!(statuses.iter().filter(|s| s.successful).count(), 1);
    let conflict = statuses.iter().find(|s| !s.successful).unwrap();
    assert_eq!(conflict.code, ValidationCode::MvccReadConflict.code());
}

#[tokio::test]
async fn failed_endorsement_keeps_transaction_id() {
    let contract = ledger_contract(MockConfig::new()).await;

    let proposal = contract
        .propose(&Invocation::new(READ_ASSET, ["asset1"]))
        .await
        .unwrap();
    let id = proposal.transaction_id().to_string();
    let transaction = contract.endorse(proposal).await;

    // Endorsing a read of a missing asset fails; the transaction never reaches ordering.
    let err = transaction.unwrap_err();
    assert_eq!(err.transaction_id(), Some(id.as_str()));
}

#[tracing_test::traced_test]
#[tokio::test]
async fn sequential_creates_time_every_phase() {
    let contract = std::sync::Arc::new(
        ledger_contract(MockConfig::new().phase_delay(Duration::from_millis(5))).await,
    );
    let mut ids = AssetIdGenerator::new(11);
    let duplicate = ids.next_id();

    // The second create reuses the first id and is rejected once the first has committed.
    let outcome = Sequence::new(3)
        .run(contract, |i| match i {
            0 | 1 => create_asset_invocation(&duplicate),
            _ => create_asset_invocation(&ids.next_id()),
        })
        .await;

    let results = outcome.results();
    assert_eq!(results.len(), 3);
    assert!(results[0].success());
    assert_eq!(results[1].failed_phase(), Some(Phase::Endorse));
    assert!(results[2].success());

    let metrics = outcome.metrics().unwrap();
    assert_eq!(metrics.success_count, 2);
    assert_eq!(metrics.failures[Phase::Endorse], 1);
    for phase in [Phase::Endorse, Phase::Submit, Phase::Status] {
        assert!(
            metrics.phase_means[phase].unwrap() >= Duration::from_millis(5),
            "{phase}"
        );
    }

    let breakdown = PhaseBreakdown::new(&metrics).to_string();
    assert!(breakdown.contains("Average Endorse Time"));
    assert!(breakdown.contains("Failures: Endorse: 1"), "{breakdown}");
    assert!(logs_contain("committed successfully"));
}
