// Full pipeline flows against a scripted job service and scripted wallet.

use std::sync::Arc;
use std::time::Duration;

use chainscribe::payload::Payload;
use chainscribe::pipeline::error::PipelineError;
use chainscribe::pipeline::poller::PollPolicy;
use chainscribe::pipeline::step::Phase;
use chainscribe::pipeline::work_item::{UnsignedPayload, WorkItemStatus};
use chainscribe::pipeline::SubmissionOrchestrator;
use chainscribe::api::JobServiceClient;
use chainscribe::wallet::mocks::{MockConnector, MockWallet};
use chainscribe::wallet::store::InMemoryWalletStore;
use chainscribe::wallet::WalletConnector;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn fast_policy() -> PollPolicy {
    PollPolicy {
        confirm_interval: Duration::from_millis(20),
        retrieve_interval: Duration::from_millis(10),
        max_attempts: Some(50),
    }
}

struct Harness {
    server: MockServer,
    wallet: Arc<MockWallet>,
    connector: Arc<MockConnector>,
    orchestrator: SubmissionOrchestrator,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let client = Arc::new(JobServiceClient::new(server.uri(), "test-key").unwrap());
    let wallet = Arc::new(MockWallet::new());
    let connector = Arc::new(MockConnector::new(Arc::clone(&wallet)));
    let store = Arc::new(InMemoryWalletStore::with_default("lace"));
    let orchestrator = SubmissionOrchestrator::new(
        client,
        Arc::clone(&connector) as Arc<dyn WalletConnector>,
        store,
    )
    .with_poll_policy(fast_policy());
    Harness {
        server,
        wallet,
        connector,
        orchestrator,
    }
}

async fn mount_preparation_happy_path(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/prepare-utxos/construct-tx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "executionArn": "arn-1",
            "httpStatus": 200
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/prepare-utxos/retrieve-unsigned-tx"))
        .and(body_json(json!("arn-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"inProgress": "building"})))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/prepare-utxos/retrieve-unsigned-tx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": {"tx": "dHgtMQ==", "ulid": "u1", "txid": "tx1"}
        })))
        .with_priority(2)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/prepare-utxos/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "executionArn": "arn-2",
            "httpStatus": 200
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/prepare-utxos/retrieve-submission-status"))
        .and(body_json(json!("arn-2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": {
                "onchain": "on-chain",
                "submissionTime": "2024-01-01T00:00:00Z",
                "txid": "tx1"
            }
        })))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, endpoint: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().ends_with(endpoint))
        .collect()
}

#[tokio::test]
async fn text_payload_reaches_confirmed_through_the_full_preparation_flow() {
    let mut h = harness().await;
    mount_preparation_happy_path(&h.server).await;

    h.orchestrator.prepare_text("hello").await.unwrap();

    let item = h.orchestrator.preparation().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Unsigned);
    assert_eq!(item.progress, 50);
    assert_eq!(
        item.tx_info.constructed.as_ref().unwrap().execution_arn,
        "arn-1"
    );
    assert_eq!(
        h.orchestrator.preparation().current_step_label(),
        "prepare/retrieve"
    );

    h.orchestrator.sign_and_submit_preparation().await.unwrap();

    let item = h.orchestrator.preparation().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Confirmed);
    assert_eq!(item.progress, 100);
    assert_eq!(item.tx_info.unsigned_txid.as_deref(), Some("tx1"));
    assert_eq!(
        item.tx_info.submitted.as_ref().unwrap().execution_arn,
        "arn-2"
    );
    assert_eq!(
        h.orchestrator.preparation().current_step_label(),
        "prepare/retrieve-submission"
    );
    assert!(h.orchestrator.preparation_confirmed());

    let outcome = h.orchestrator.preparation_outcome().unwrap();
    assert_eq!(outcome.txid, "tx1");
    assert_eq!(
        outcome.submitted_at.as_deref(),
        Some("2024-01-01T00:00:00Z")
    );

    // One in-progress reply plus the success reply.
    assert_eq!(requests_to(&h.server, "retrieve-unsigned-tx").await.len(), 2);

    // The wallet witnessed the hex form of the unsigned payload.
    let signed = h.wallet.signed_payloads();
    assert_eq!(signed.len(), 1);
    assert_eq!(signed[0], "74782D31"); // "tx-1" uppercased hex
}

#[tokio::test]
async fn signing_rejection_preserves_progress_and_allows_retry() {
    let mut h = harness().await;
    mount_preparation_happy_path(&h.server).await;
    h.wallet.queue_rejection("User declined");

    h.orchestrator.prepare_text("hello").await.unwrap();
    let fetches_before_sign = h.connector.fetch_count();

    let err = h
        .orchestrator
        .sign_and_submit_preparation()
        .await
        .unwrap_err();

    // The error is the recoverable signing class, surfaced verbatim.
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "Wallet signing error: User declined");
    assert_eq!(
        h.orchestrator.preparation().error().unwrap().to_string(),
        "Wallet signing error: User declined"
    );

    // The item reverted to unsigned with its cached payload and token.
    let item = h.orchestrator.preparation().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Unsigned);
    assert_eq!(item.progress, 75);
    assert_eq!(item.error.as_deref(), Some("User declined"));
    assert!(matches!(
        item.tx_info.unsigned,
        Some(UnsignedPayload::Prepare(_))
    ));
    assert_eq!(
        item.tx_info.constructed.as_ref().unwrap().execution_arn,
        "arn-1"
    );

    // The step did not move and nothing was submitted.
    assert_eq!(
        h.orchestrator.preparation().current_step_label(),
        "prepare/retrieve"
    );
    assert!(requests_to(&h.server, "submit").await.is_empty());

    // Retrying signs with a freshly fetched handle and does not refetch the
    // cached unsigned payload.
    let retrieves_before_retry = requests_to(&h.server, "retrieve-unsigned-tx").await.len();
    h.orchestrator.sign_and_submit_preparation().await.unwrap();

    assert!(h.connector.fetch_count() > fetches_before_sign + 1);
    assert_eq!(
        requests_to(&h.server, "retrieve-unsigned-tx").await.len(),
        retrieves_before_retry
    );

    let item = h.orchestrator.preparation().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Confirmed);
    assert_eq!(item.progress, 100);
    assert!(item.error.is_none());
    assert!(h.orchestrator.preparation().error().is_none());
    assert!(h.orchestrator.preparation_confirmed());
}

#[tokio::test]
async fn inscription_is_gated_on_preparation_confirmation() {
    let mut h = harness().await;

    let err = h
        .orchestrator
        .inscribe(vec![Payload::from_text("data").unwrap()])
        .await
        .unwrap_err();

    assert_eq!(err, PipelineError::PreparationNotConfirmed);
    assert!(requests_to(&h.server, "construct-tx").await.is_empty());
    assert!(h.orchestrator.inscription().items().is_empty());
}

async fn mount_inscription_happy_path(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/inscriptions/construct-tx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "executionArn": "arn-3",
            "httpStatus": 200
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/inscriptions/retrieve-unsigned-tx"))
        .and(body_json(json!("arn-3")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": {
                "indexingTx": "aXR4LTE=",
                "indexingTxId": "itx-1",
                "objectUlid": "obj-1",
                "shardTxs": ["c2hhcmQtMA==", "c2hhcmQtMQ=="],
                "shardTxIds": ["s0", "s1"]
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/inscriptions/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "executionArn": "arn-4",
            "httpStatus": 200
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/inscriptions/retrieve-submission-status"))
        .and(body_json(json!("arn-4")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": {
                "allShardSubmissions": [{
                    "shardSubmittedDataHash": "hash-0",
                    "shardSubmittedTxSubmittedAt": "2024-01-02T00:00:00Z",
                    "shardSubmittedTxid": "stx-0"
                }],
                "indexingTxId": "itx-1",
                "onchain": ["itx-1"],
                "notOnchain": []
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn inscription_signs_indexing_and_every_shard_then_confirms() {
    let mut h = harness().await;
    mount_preparation_happy_path(&h.server).await;
    mount_inscription_happy_path(&h.server).await;

    h.orchestrator.prepare_text("hello").await.unwrap();
    h.orchestrator.sign_and_submit_preparation().await.unwrap();
    let prep_signs = h.wallet.sign_call_count();

    h.orchestrator.inscribe_text("hello").await.unwrap();
    h.orchestrator.sign_and_submit_inscription().await.unwrap();

    // One indexing transaction plus two shards.
    assert_eq!(h.wallet.sign_call_count(), prep_signs + 3);

    let item = h.orchestrator.inscription().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Confirmed);
    assert_eq!(item.progress, 100);
    assert_eq!(item.tx_info.unsigned_txid.as_deref(), Some("itx-1"));
    assert_eq!(h.orchestrator.inscription().current_step_label(), "end");

    let outcome = h.orchestrator.inscription_outcome().unwrap();
    assert!(outcome.onchain);
    assert_eq!(outcome.txid, "itx-1");

    // The submit body paired every shard with its witness and carried the
    // object ulid.
    let submits = requests_to(&h.server, "/inscriptions/submit").await;
    assert_eq!(submits.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&submits[0].body).unwrap();
    assert_eq!(body["ulidOfObject"], "obj-1");
    assert_eq!(body["indexingTxToSubmit"][0], "aXR4LTE=");
    assert_eq!(body["txsToSubmit"].as_array().unwrap().len(), 2);
    assert_eq!(body["txsToSubmit"][0][0], "c2hhcmQtMA==");
}

#[tokio::test]
async fn shard_rejection_retries_only_the_missing_shard() {
    let mut h = harness().await;
    mount_preparation_happy_path(&h.server).await;
    mount_inscription_happy_path(&h.server).await;

    h.orchestrator.prepare_text("hello").await.unwrap();
    h.orchestrator.sign_and_submit_preparation().await.unwrap();

    h.orchestrator.inscribe_text("hello").await.unwrap();

    // Indexing and the first shard sign; the second shard is rejected.
    h.wallet.queue_witness("w-indexing");
    h.wallet.queue_witness("w-shard-0");
    h.wallet.queue_rejection("User declined");

    let signs_before = h.wallet.sign_call_count();
    let err = h
        .orchestrator
        .sign_and_submit_inscription()
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.wallet.sign_call_count(), signs_before + 3);

    // Partial signing progress survived: indexing witness and shard 0 are
    // cached, shard 1 is still missing, and the item is retryable.
    let item = h.orchestrator.inscription().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Unsigned);
    assert_eq!(item.tx_info.witness.as_deref(), Some("w-indexing"));
    assert_eq!(
        item.tx_info.shard_witnesses,
        vec![Some("w-shard-0".to_string()), None]
    );
    assert_eq!(
        h.orchestrator.inscription().current_step_label(),
        "inscription/retrieve"
    );
    assert!(requests_to(&h.server, "/inscriptions/submit").await.is_empty());

    // The retry signs exactly the missing shard and completes.
    h.orchestrator.sign_and_submit_inscription().await.unwrap();
    assert_eq!(h.wallet.sign_call_count(), signs_before + 4);

    let item = h.orchestrator.inscription().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Confirmed);
    assert_eq!(h.orchestrator.inscription().current_step_label(), "end");
}

#[tokio::test]
async fn non_signing_inscription_failure_moves_the_phase_to_end() {
    let mut h = harness().await;
    mount_preparation_happy_path(&h.server).await;

    // Inscription construct succeeds, but retrieval later explodes.
    Mock::given(method("POST"))
        .and(path("/inscriptions/construct-tx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "executionArn": "arn-3",
            "httpStatus": 200
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/inscriptions/retrieve-unsigned-tx"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&h.server)
        .await;

    h.orchestrator.prepare_text("hello").await.unwrap();
    h.orchestrator.sign_and_submit_preparation().await.unwrap();
    h.orchestrator.inscribe_text("hello").await.unwrap();

    let err = h
        .orchestrator
        .sign_and_submit_inscription()
        .await
        .unwrap_err();
    assert!(!err.is_retryable());

    let item = h.orchestrator.inscription().item(0).unwrap().clone();
    assert_eq!(item.status, WorkItemStatus::Failed);
    assert_eq!(item.progress, 0);
    assert_eq!(h.orchestrator.inscription().current_step_label(), "end");
    assert!(h.orchestrator.inscription().error().is_some());
}

#[tokio::test]
async fn cancellation_abandons_the_poll_and_resets_the_phase() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prepare-utxos/construct-tx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "executionArn": "arn-1",
            "httpStatus": 200
        })))
        .mount(&server)
        .await;
    // The unsigned transaction never becomes available.
    Mock::given(method("POST"))
        .and(path("/prepare-utxos/retrieve-unsigned-tx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"inProgress": "stuck"})))
        .mount(&server)
        .await;

    let client = Arc::new(JobServiceClient::new(server.uri(), "test-key").unwrap());
    let wallet = Arc::new(MockWallet::new());
    let connector = Arc::new(MockConnector::new(wallet));
    let store = Arc::new(InMemoryWalletStore::with_default("lace"));
    let mut orchestrator = SubmissionOrchestrator::new(client, connector, store)
        .with_poll_policy(PollPolicy {
            confirm_interval: Duration::from_secs(30),
            retrieve_interval: Duration::from_secs(30),
            max_attempts: None,
        });

    orchestrator.prepare_text("hello").await.unwrap();
    let cancel = orchestrator.cancel_handle(Phase::Preparation);

    let task = tokio::spawn(async move {
        let result = orchestrator.sign_and_submit_preparation().await;
        (orchestrator, result)
    });
    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();

    let (orchestrator, result) = task.await.unwrap();
    assert_eq!(result.unwrap_err(), PipelineError::Cancelled);

    // The phase is back at its initial step with no items, tokens or
    // payloads retained.
    assert_eq!(
        orchestrator.preparation().current_step_label(),
        "prepare/construct"
    );
    assert!(orchestrator.preparation().items().is_empty());
    assert!(orchestrator.preparation().error().is_none());
}
