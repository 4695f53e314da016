//! EA 网关端到端集成测试
//!
//! 启动真实的 axum 服务器（随机端口 + 内存 Nonce 存储），
//! 用 reqwest 按线上协议构造签名请求，覆盖认证流水线的
//! 各个拒绝分支与轮询/回执业务语义。

use chrono::Utc;
use eagate::signature;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tradix_common::MemoryNonceStore;
use tradix_common::config::TradixConfig;
use uuid::Uuid;

struct TestServer {
    base_url: String,
    admin_key: String,
}

// 全局测试数据库只初始化一次（OnceCell），
// 服务器则每个测试各起一个：tokio::test 的运行时随测试结束销毁，
// 跨测试共享 server 任务会悬空
static DB_INIT: OnceCell<()> = OnceCell::const_new();

async fn init_test_db() {
    DB_INIT
        .get_or_init(|| async {
            let db_dir = std::env::temp_dir().join(format!("eagate_it_{}", std::process::id()));
            if db_dir.exists() {
                std::fs::remove_dir_all(&db_dir).expect("failed to clear test db dir");
            }
            std::fs::create_dir_all(&db_dir).expect("failed to create test db dir");
            tradix_common::storage::db::set_db_path(&db_dir)
                .await
                .expect("failed to initialize test database");
        })
        .await;
}

/// 在当前测试运行时内启动一个网关服务器
async fn start_server() -> TestServer {
    init_test_db().await;

    let mut config = TradixConfig::default();
    config.sqlite_path = PathBuf::from(std::env::temp_dir());
    let eagate_config = config.eagate_config();

    let router = eagate::create_eagate_router_with_store(
        &eagate_config,
        &config,
        Arc::new(MemoryNonceStore::new()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("missing local addr");

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server crashed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        admin_key: config.tradix_shared_key.clone(),
    }
}

/// 通过管理端点注册设备，返回 (device_id, secret 字节)
async fn register_device(server: &TestServer, client_id: &str) -> (String, Vec<u8>) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/admin/devices", server.base_url))
        .header("X-Admin-Key", server.admin_key.as_str())
        .json(&json!({ "client_id": client_id, "name": "it-vps" }))
        .send()
        .await
        .expect("register request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("invalid register response");
    let device_id = body["device_id"].as_str().expect("missing device_id").to_string();
    // 注册响应中的密钥是 hex 编码的 32 字节
    let secret_hex = body["secret"].as_str().expect("missing secret");
    assert_eq!(secret_hex.len(), 64);
    let secret = hex::decode(secret_hex).expect("bad secret hex");
    (device_id, secret)
}

/// 通过管理端点发布信号，返回 signal_id
async fn publish_signal(server: &TestServer, client_id: &str, symbol: &str) -> String {
    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/admin/signals", server.base_url))
        .header("X-Admin-Key", server.admin_key.as_str())
        .json(&json!({
            "client_id": client_id,
            "symbol": symbol,
            "side": "buy",
            "entry_price": 2380.5,
            "stop_loss": 2370.0,
            "take_profit": 2400.0,
        }))
        .send()
        .await
        .expect("publish request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("invalid publish response");
    body["signal_id"].as_str().expect("missing signal_id").to_string()
}

/// 构造一套完整的认证请求头
fn auth_headers(
    method: &str,
    path: &str,
    body: &str,
    device_id: &str,
    secret: &[u8],
) -> Vec<(String, String)> {
    let nonce = Uuid::new_v4().to_string();
    let timestamp = Utc::now().to_rfc3339();
    let canonical =
        signature::build_canonical_string(method, path, body, device_id, &nonce, &timestamp);
    let sig = signature::sign(&canonical, secret);

    vec![
        ("X-Device-Id".to_string(), device_id.to_string()),
        ("X-Nonce".to_string(), nonce),
        ("X-Timestamp".to_string(), timestamp),
        ("X-Signature".to_string(), sig),
    ]
}

async fn reason_of(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("expected json error body");
    body["reason"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_poll_then_replay_is_rejected() {
    let server = start_server().await;
    let (device_id, secret) = register_device(&server, "client_e2e").await;
    publish_signal(&server, "client_e2e", "XAUUSD").await;

    let headers = auth_headers("GET", "/api/v1/client/poll", "", &device_id, &secret);
    let client = reqwest::Client::new();

    // 首次请求：200，返回一条已审批信号
    let mut request = client.get(format!("{}/api/v1/client/poll", server.base_url));
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("poll failed");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("invalid poll body");
    assert_eq!(body["count"], 1);
    assert_eq!(body["signals"][0]["symbol"], "XAUUSD");
    assert_eq!(body["signals"][0]["client_id"], "client_e2e");
    // 密钥材料不应出现在任何响应中
    assert!(body["signals"][0].get("secret_key").is_none());

    // 相同请求头（含相同 nonce）重放：401 replayed_nonce
    let mut request = client.get(format!("{}/api/v1/client/poll", server.base_url));
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("replay failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason_of(response).await, "replayed_nonce");
}

#[tokio::test]
async fn test_missing_signature_header() {
    let server = start_server().await;
    let (device_id, secret) = register_device(&server, "client_hdr").await;

    let headers = auth_headers("GET", "/api/v1/client/poll", "", &device_id, &secret);
    let client = reqwest::Client::new();

    // 省略 X-Signature：401 missing_header，而不是 500 或签名不匹配
    let mut request = client.get(format!("{}/api/v1/client/poll", server.base_url));
    for (name, value) in &headers {
        if name != "X-Signature" {
            request = request.header(name.as_str(), value.as_str());
        }
    }
    let response = request.send().await.expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason_of(response).await, "missing_header");
}

#[tokio::test]
async fn test_tampered_body_fails_signature() {
    let server = start_server().await;
    let (device_id, secret) = register_device(&server, "client_tamper").await;
    let signal_id = publish_signal(&server, "client_tamper", "EURUSD").await;

    // 对 body A 签名，实际发送 body B
    let signed_body = json!({ "signal_id": signal_id, "status": "filled" }).to_string();
    let sent_body = json!({ "signal_id": signal_id, "status": "rejected" }).to_string();
    let headers = auth_headers(
        "POST",
        "/api/v1/client/ack",
        &signed_body,
        &device_id,
        &secret,
    );

    let mut request = reqwest::Client::new()
        .post(format!("{}/api/v1/client/ack", server.base_url))
        .header("Content-Type", "application/json")
        .body(sent_body);
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason_of(response).await, "invalid_signature");
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected() {
    let server = start_server().await;
    let (device_id, secret) = register_device(&server, "client_stale").await;

    // 10 分钟前的时间戳，签名本身有效
    let nonce = Uuid::new_v4().to_string();
    let timestamp = (Utc::now() - chrono::Duration::seconds(600)).to_rfc3339();
    let canonical = signature::build_canonical_string(
        "GET",
        "/api/v1/client/poll",
        "",
        &device_id,
        &nonce,
        &timestamp,
    );
    let sig = signature::sign(&canonical, &secret);

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/client/poll", server.base_url))
        .header("X-Device-Id", device_id.as_str())
        .header("X-Nonce", nonce.as_str())
        .header("X-Timestamp", timestamp.as_str())
        .header("X-Signature", sig.as_str())
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason_of(response).await, "invalid_timestamp");
}

#[tokio::test]
async fn test_revoked_device_never_authenticates() {
    let server = start_server().await;
    let (device_id, secret) = register_device(&server, "client_revoked").await;

    // 吊销设备
    let response = reqwest::Client::new()
        .post(format!(
            "{}/api/v1/admin/devices/{}/revoke",
            server.base_url, device_id
        ))
        .header("X-Admin-Key", server.admin_key.as_str())
        .send()
        .await
        .expect("revoke failed");
    assert_eq!(response.status(), StatusCode::OK);

    // 签名完全有效，但设备已吊销：401 device_revoked，
    // 不能到达签名校验的成功路径
    let headers = auth_headers("GET", "/api/v1/client/poll", "", &device_id, &secret);
    let mut request = reqwest::Client::new().get(format!("{}/api/v1/client/poll", server.base_url));
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason_of(response).await, "device_revoked");
}

#[tokio::test]
async fn test_unknown_device_is_rejected() {
    let server = start_server().await;

    let headers = auth_headers("GET", "/api/v1/client/poll", "", "dev_ghost", b"whatever");
    let mut request = reqwest::Client::new().get(format!("{}/api/v1/client/poll", server.base_url));
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reason_of(response).await, "unknown_device");
}

#[tokio::test]
async fn test_duplicate_acknowledgment_returns_conflict() {
    let server = start_server().await;
    let (device_id, secret) = register_device(&server, "client_dup").await;
    let signal_id = publish_signal(&server, "client_dup", "GBPUSD").await;

    let body = json!({ "signal_id": signal_id, "status": "filled", "broker_ref": "ord-77" })
        .to_string();

    // 首次回执：200
    let headers = auth_headers("POST", "/api/v1/client/ack", &body, &device_id, &secret);
    let mut request = reqwest::Client::new()
        .post(format!("{}/api/v1/client/ack", server.base_url))
        .header("Content-Type", "application/json")
        .body(body.clone());
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("ack failed");
    assert_eq!(response.status(), StatusCode::OK);

    // 第二次回执（新 nonce，认证通过）：409，幂等约束在业务层面生效
    let headers = auth_headers("POST", "/api/v1/client/ack", &body, &device_id, &secret);
    let mut request = reqwest::Client::new()
        .post(format!("{}/api/v1/client/ack", server.base_url))
        .header("Content-Type", "application/json")
        .body(body.clone());
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("duplicate ack failed");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // 回执过的信号不再出现在该设备的轮询结果中
    let headers = auth_headers("GET", "/api/v1/client/poll", "", &device_id, &secret);
    let mut request = reqwest::Client::new().get(format!("{}/api/v1/client/poll", server.base_url));
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }
    let response = request.send().await.expect("poll failed");
    assert_eq!(response.status(), StatusCode::OK);
    let poll_body: Value = response.json().await.expect("invalid poll body");
    assert_eq!(poll_body["count"], 0);
}

#[tokio::test]
async fn test_same_nonce_is_per_device() {
    let server = start_server().await;
    let (device_a, secret_a) = register_device(&server, "client_nonce_a").await;
    let (device_b, secret_b) = register_device(&server, "client_nonce_b").await;

    // 认领键是 (device_id, nonce) 组合键：两台设备可以使用相同 nonce
    let shared_nonce = Uuid::new_v4().to_string();
    let client = reqwest::Client::new();

    for (device_id, secret) in [(&device_a, &secret_a), (&device_b, &secret_b)] {
        let timestamp = Utc::now().to_rfc3339();
        let canonical = signature::build_canonical_string(
            "GET",
            "/api/v1/client/poll",
            "",
            device_id,
            &shared_nonce,
            &timestamp,
        );
        let sig = signature::sign(&canonical, secret);

        let response = client
            .get(format!("{}/api/v1/client/poll", server.base_url))
            .header("X-Device-Id", device_id.as_str())
            .header("X-Nonce", shared_nonce.as_str())
            .header("X-Timestamp", timestamp.as_str())
            .header("X-Signature", sig.as_str())
            .send()
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_admin_requires_shared_key() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    // 无密钥
    let response = client
        .post(format!("{}/api/v1/admin/devices", server.base_url))
        .json(&json!({ "client_id": "client_x" }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 错误密钥
    let response = client
        .post(format!("{}/api/v1/admin/devices", server.base_url))
        .header("X-Admin-Key", "wrong-key")
        .json(&json!({ "client_id": "client_x" }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_endpoint_is_open() {
    let server = start_server().await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/health", server.base_url))
        .send()
        .await
        .expect("health failed");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("invalid health body");
    assert_eq!(body["service"], "eagate");
    assert_eq!(body["database"], "ok");
}
