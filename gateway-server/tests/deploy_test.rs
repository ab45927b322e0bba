// gateway-server/tests/deploy_test.rs
#[macro_use]
mod support;

use std::sync::Arc;
use actix_web::http::StatusCode;
use actix_web::test;
use common::Address;
use serde_json::{json, Value};
use gateway_server::reconciler::{PickTiming, TimeWindow};
use support::{config_with_toolkit, state, MemoryStore, DEPLOY_OK, MARKET, NO_SHARE, YES_SHARE};

fn bearer(state: &gateway_server::state::AppState) -> String {
    let wallet: Address = "0x00000000000000000000000000000000000000cc".parse().unwrap();
    let credential = state.verifier.as_ref().unwrap().issue(&wallet).unwrap();
    format!("Bearer {}", credential.token)
}

#[actix_web::test]
async fn test_deploy_records_market_on_pick() {
    let store = Arc::new(MemoryStore::default());
    let state = state(config_with_toolkit(DEPLOY_OK), store.clone());
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({
            "pickId": 42,
            "feeBps": "150",
            "endTime": 1_900_000_000,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["marketAddress"], json!(MARKET));
    assert_eq!(body["yesShareAddress"], json!(YES_SHARE));
    assert_eq!(body["noShareAddress"], json!(NO_SHARE));
    assert_eq!(body["feeBps"], json!(150));
    assert_eq!(body["cutoffTime"], json!(1_900_000_000 - 1800));
    assert_eq!(body["dbUpdate"], json!("ok"));
    assert!(body.get("dbError").is_none());

    let writes = store.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    let (pick, update) = &writes[0];
    assert_eq!(pick, "42");
    assert_eq!(update.market_address, MARKET);
    assert_eq!(update.fee_bps, 150);
    assert_eq!(update.market_status, "deployed");
}

#[actix_web::test]
async fn test_reconcile_failure_still_returns_market() {
    let store = Arc::new(MemoryStore {
        fail_writes: true,
        ..Default::default()
    });
    let state = state(config_with_toolkit(DEPLOY_OK), store);
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/launch-evm-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "pickId": "p-9" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["marketAddress"], json!(MARKET));
    assert_eq!(body["dbUpdate"], json!("failed"));
    assert!(body["dbError"].as_str().unwrap().contains("500"));
}

#[actix_web::test]
async fn test_deploy_without_pick_skips_datastore() {
    let store = Arc::new(MemoryStore::default());
    let state = state(config_with_toolkit(DEPLOY_OK), store.clone());
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["dbUpdate"], json!("skipped"));
    assert_eq!(body["feeBps"], json!(300));
    assert_eq!(
        body["endTime"].as_i64().unwrap() - body["cutoffTime"].as_i64().unwrap(),
        1800
    );
    assert!(store.writes.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn test_toolkit_failure_reports_output() {
    let script = r#"echo "Error: insufficient funds for gas" >&2; echo '{"success":false,"error":"insufficient funds"}'; exit 1"#;
    let state = state(config_with_toolkit(script), Arc::new(MemoryStore::default()));
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "pickId": 5 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["exitCode"], json!(1));
    assert_eq!(body["result"]["error"], json!("insufficient funds"));
    assert!(body["output"].as_str().unwrap().contains("insufficient funds for gas"));
}

#[actix_web::test]
async fn test_missing_toolkit_config_lists_keys() {
    let mut config = config_with_toolkit(DEPLOY_OK);
    config.toolkit.deployer_pk = None;
    config.toolkit.escrow_asset = None;
    let state = state(config, Arc::new(MemoryStore::default()));
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = test::read_body_json(resp).await;
    let missing = body["missing"].as_array().unwrap();
    assert!(missing.contains(&json!("DEPLOYER_PK")));
    assert!(missing.contains(&json!("ESCROW_ASSET")));
}

#[actix_web::test]
async fn test_concurrent_deploy_for_same_pick_conflicts() {
    let state = state(config_with_toolkit(DEPLOY_OK), Arc::new(MemoryStore::default()));
    let auth = bearer(&state);
    let running = state.orchestrator.in_flight().try_acquire("42").unwrap();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "pickId": 42 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    drop(running);
    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "pickId": 42 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_invalid_parameters_rejected_before_spawn() {
    // A toolkit that would fail loudly if it were ever started
    let state = state(config_with_toolkit("exit 99"), Arc::new(MemoryStore::default()));
    let auth = bearer(&state);
    let app = app!(state);

    for body in [
        json!({ "feeBps": "NaN" }),
        json!({ "feeBps": 20_000 }),
        json!({ "endTime": "soon" }),
        json!({ "asset": "0xnot-an-address" }),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/deploy-market")
            .insert_header(("Authorization", auth.clone()))
            .set_json(&body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    let req = test::TestRequest::post()
        .uri("/api/resolve-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "marketAddress": MARKET, "result": "maybe" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_claim_defaults_to_authenticated_wallet() {
    let script = r#"printf 'TOOLKIT_RESULT {"success":true,"wallet":"%s","market":"%s"}\n' "$CLAIM_WALLET" "$MARKET_ADDRESS""#;
    let state = state(config_with_toolkit(script), Arc::new(MemoryStore::default()));
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/claim-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "marketAddress": "0x00000000000000000000000000000000000000AB" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["wallet"], json!("0x00000000000000000000000000000000000000cc"));
    assert_eq!(body["market"], json!(MARKET));
}

#[actix_web::test]
async fn test_reconcile_retry_writes_again() {
    let store = Arc::new(MemoryStore::default());
    let state = state(config_with_toolkit("exit 99"), store.clone());
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/reconcile-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({
            "pickId": 42,
            "marketAddress": MARKET,
            "feeBps": 300,
            "endTime": 2_000,
            "cutoffTime": 1_000,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["dbUpdate"], json!("ok"));
    assert_eq!(store.writes.lock().unwrap()[0].1.end_time, 2_000);
}

#[actix_web::test]
async fn test_partial_datastore_override_never_reaches_store() {
    let store = Arc::new(MemoryStore::default());
    let state = state(config_with_toolkit("exit 99"), store.clone());
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth.clone()))
        .set_json(json!({ "pickId": 42, "datastore": { "url": "https://attacker.example" } }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/reconcile-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({
            "pickId": 42,
            "marketAddress": MARKET,
            "feeBps": 300,
            "endTime": 2_000,
            "cutoffTime": 1_000,
            "datastore": { "url": "https://attacker.example" },
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    assert!(store.creds_seen.lock().unwrap().is_empty());
    assert!(store.writes.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn test_full_datastore_override_replaces_configuration() {
    let store = Arc::new(MemoryStore::default());
    let state = state(config_with_toolkit(DEPLOY_OK), store.clone());
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({
            "pickId": 42,
            "datastore": { "url": "https://staging.example.co", "key": "staging-key" },
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["dbUpdate"], json!("ok"));

    let seen = store.creds_seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for creds in seen.iter() {
        assert_eq!(creds.url, "https://staging.example.co");
        assert_eq!(creds.key, "staging-key");
    }
}

#[actix_web::test]
async fn test_out_of_range_timestamps_are_bad_requests() {
    let state = state(config_with_toolkit("exit 99"), Arc::new(MemoryStore::default()));
    let auth = bearer(&state);
    let app = app!(state);

    for body in [
        json!({ "endTime": -9_223_372_036_854_775_000i64 }),
        json!({ "endTime": i64::MAX }),
        json!({ "endTime": "1e300" }),
        json!({ "endTime": 1_900_000_000, "cutoffTime": -1 }),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/deploy-market")
            .insert_header(("Authorization", auth.clone()))
            .set_json(&body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    let req = test::TestRequest::post()
        .uri("/api/reconcile-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({
            "pickId": 42,
            "marketAddress": MARKET,
            "feeBps": 300,
            "endTime": i64::MAX,
            "cutoffTime": 1_000,
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_absurd_record_duration_uses_default_window() {
    let store = Arc::new(MemoryStore {
        timing: Some(PickTiming {
            expires_at: None,
            duration_hours: Some(1e300),
        }),
        ..Default::default()
    });
    let state = state(config_with_toolkit(DEPLOY_OK), store.clone());
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "pickId": 42 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let end_time = body["endTime"].as_i64().unwrap();
    let lead = end_time - chrono::Utc::now().timestamp();
    assert!((TimeWindow::DEFAULT_DURATION_SECS - 60..=TimeWindow::DEFAULT_DURATION_SECS).contains(&lead));
    assert_eq!(end_time - body["cutoffTime"].as_i64().unwrap(), TimeWindow::CUTOFF_GAP_SECS);
}

#[actix_web::test]
async fn test_refund_defaults_to_authenticated_wallet() {
    let script = r#"printf 'TOOLKIT_RESULT {"success":true,"claimWallet":"%s","direct":"%s"}\n' "$CLAIM_WALLET" "$REFUND_DIRECT""#;
    let state = state(config_with_toolkit(script), Arc::new(MemoryStore::default()));
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/refund-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "marketAddress": MARKET, "direct": true }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["claimWallet"], json!("0x00000000000000000000000000000000000000cc"));
    assert_eq!(body["direct"], json!("true"));
}

#[actix_web::test]
async fn test_factory_deployment_reads_market_line() {
    let script = r#"case "$1" in
  *create-market.js) echo "Fee bps: $FEE_BPS"; echo "Market: 0x00000000000000000000000000000000000000AB" ;;
  *) exit 99 ;;
esac"#;
    let mut config = config_with_toolkit(script);
    config.toolkit.factory_addr = Some("0x00000000000000000000000000000000000000fa".to_string());
    let store = Arc::new(MemoryStore::default());
    let state = state(config, store.clone());
    let auth = bearer(&state);
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/deploy-market")
        .insert_header(("Authorization", auth))
        .set_json(json!({ "pickId": 8 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["marketAddress"], json!(MARKET));
    assert_eq!(body["dbUpdate"], json!("ok"));
    assert_eq!(store.writes.lock().unwrap()[0].0, "8");
}
