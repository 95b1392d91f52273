use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use beatschain_api::app::{build_app, AppServices};
use beatschain_infra::{RelayerClient, RelayerError};
use beatschain_isrc::{designation_range_for, Isrc};
use beatschain_minting::{MintJob, RelayReceipt};

const ADMIN_KEY: &str = "test-admin-key";

/// Relayer double: fails jobs whose metadata URI mentions "fail".
struct StubRelayer;

#[async_trait]
impl RelayerClient for StubRelayer {
    async fn forward_mint(&self, job: &MintJob) -> Result<RelayReceipt, RelayerError> {
        if job.request.metadata_uri.contains("fail") {
            return Err(RelayerError::Rejected {
                status: 503,
                message: "relayer rejected".to_string(),
            });
        }
        Ok(RelayReceipt {
            queue_id: format!("q-{}", job.id),
            transaction_hash: Some("0xdeadbeef".to_string()),
        })
    }
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    _data_dir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build the same router as prod, on file stores in a temp dir,
        // bound to an ephemeral port.
        let data_dir = tempfile::tempdir().expect("failed to create temp dir");
        let services = AppServices::file_only(data_dir.path(), Some(Arc::new(StubRelayer)))
            .expect("failed to wire file services");
        let app = build_app(services, Some(ADMIN_KEY.to_string()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            _data_dir: data_dir,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn wallet(n: u8) -> String {
    format!("0x{:040x}", n)
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_key_required_for_admin_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body = json!({"name": "launch", "owner": wallet(1), "budget": 100});

    let res = client
        .post(format!("{}/api/campaigns", srv.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/api/campaigns", srv.base_url))
        .header("x-admin-key", "wrong-key")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(format!("{}/api/campaigns", srv.base_url))
        .header("x-admin-key", ADMIN_KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn isrc_generate_returns_valid_sequential_codes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let mut codes = Vec::new();
    for i in 0..2 {
        let res = client
            .post(format!("{}/api/isrc/generate", srv.base_url))
            .json(&json!({
                "title": format!("Track {i}"),
                "artist": "DJ Kalahari",
                "user_id": "artist-42",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["success"], true);
        codes.push(body["isrc"].as_str().unwrap().to_string());
    }

    let user_id = "artist-42".parse().unwrap();
    let range = designation_range_for(&user_id);
    let mut designations = Vec::new();
    for raw in &codes {
        assert!(Isrc::is_valid(raw), "invalid isrc: {raw}");
        let code: Isrc = raw.parse().unwrap();
        assert!(range.contains(code.designation()));
        designations.push(code.designation());
    }
    assert_eq!(designations[1], designations[0] + 1);

    let res = client
        .get(format!("{}/api/isrc/codes/artist-42", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["codes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn credit_ledger_balances_and_history() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let w = wallet(9);

    for (delta, reason) in [(100i64, "purchase"), (-30, "mint_fee")] {
        let res = client
            .post(format!("{}/api/credits/append", srv.base_url))
            .json(&json!({"wallet": w, "delta": delta, "reason": reason}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    // Zero deltas are rejected at the domain layer.
    let res = client
        .post(format!("{}/api/credits/append", srv.base_url))
        .json(&json!({"wallet": w, "delta": 0, "reason": "noop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/api/credits/{}/balance", srv.base_url, w))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["balance"], 70);

    let res = client
        .get(format!("{}/api/credits/{}/history?limit=1", srv.base_url, w))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["delta"], -30);
}

#[tokio::test]
async fn campaign_reservation_respects_remaining_budget() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/campaigns", srv.base_url))
        .header("x-admin-key", ADMIN_KEY)
        .json(&json!({"name": "drop week", "owner": wallet(2), "budget": 100}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let id = body["campaign"]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/api/campaigns/{}/reserve", srv.base_url, id))
        .json(&json!({"amount": 60}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Over-reserving fails without touching the remaining budget.
    let res = client
        .post(format!("{}/api/campaigns/{}/reserve", srv.base_url, id))
        .json(&json!({"amount": 60}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["reserved"], false);

    let res = client
        .get(format!("{}/api/campaigns/{}", srv.base_url, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["campaign"]["remaining"], 40);

    // Refund restores the reserved amount (admin).
    let res = client
        .post(format!("{}/api/campaigns/{}/refund", srv.base_url, id))
        .header("x-admin-key", ADMIN_KEY)
        .json(&json!({"amount": 60}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/campaigns/{}", srv.base_url, id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["campaign"]["remaining"], 100);
}

#[tokio::test]
async fn mint_queue_lifecycle_forwarded() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/mint", srv.base_url))
        .json(&json!({
            "to": wallet(5),
            "metadata_uri": "ipfs://bafy/track.json",
            "metadata": {"name": "Track #1"},
            "client_id": "storefront",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let res = client
        .get(format!("{}/api/mint/pending", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);

    let res = client
        .post(format!("{}/api/mint/process-queue", srv.base_url))
        .header("x-admin-key", ADMIN_KEY)
        .json(&json!({"worker_id": "worker-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["processed"].as_array().unwrap().len(), 1);

    let res = client
        .get(format!("{}/api/mint/status/{}", srv.base_url, job_id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["job"]["status"], "forwarded");
    assert_eq!(body["job"]["processing_by"], "worker-1");

    // Claimed jobs are gone from the pending set.
    let res = client
        .get(format!("{}/api/mint/pending", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn failed_relayer_forward_marks_job_failed() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/mint", srv.base_url))
        .json(&json!({
            "to": wallet(6),
            "metadata_uri": "ipfs://fail/track.json",
            "client_id": "storefront",
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/api/mint/process-queue", srv.base_url))
        .header("x-admin-key", ADMIN_KEY)
        .json(&json!({"worker_id": "worker-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/api/mint/status/{}", srv.base_url, job_id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["job"]["status"], "failed");

    // Failed jobs are terminal; they never come back as pending.
    let res = client
        .get(format!("{}/api/mint/pending", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["jobs"].as_array().unwrap().is_empty());
}
