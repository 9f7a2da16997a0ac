//! End-to-end tests: a real proxy in front of a stubbed upstream.

use std::sync::{Arc, Mutex};

use gemma_proxy::config::Config;
use gemma_proxy::server::{ProxyServer, RunningServer};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEFAULT_MODEL_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

async fn start_proxy(upstream_base_url: String) -> RunningServer {
    let config = Config {
        port: 0,
        upstream_base_url,
        ..Config::default()
    };
    ProxyServer::bind(&config).await.unwrap().spawn().unwrap()
}

async fn start_with_upstream() -> (MockServer, RunningServer) {
    let upstream = MockServer::start().await;
    let proxy = start_proxy(format!("{}/v1beta", upstream.uri())).await;
    (upstream, proxy)
}

async fn post_relay(proxy: &RunningServer, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/gemma", proxy.url()))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn hello_scenario_forwards_stripped_body_to_default_model() {
    let (upstream, proxy) = start_with_upstream().await;

    Mock::given(method("POST"))
        .and(path(DEFAULT_MODEL_PATH))
        .and(query_param("key", "k1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "contents": [{ "parts": [{ "text": "Hello" }] }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = post_relay(
        &proxy,
        json!({ "apiKey": "k1", "contents": [{ "parts": [{ "text": "Hello" }] }] }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 200);
    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn explicit_model_and_key_land_in_url_not_body() {
    let (upstream, proxy) = start_with_upstream().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemma-3-27b-it:generateContent"))
        .and(query_param("key", "secret-key"))
        .and(body_json(json!({
            "contents": [{ "parts": [{ "text": "Hi" }] }],
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 100 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = post_relay(
        &proxy,
        json!({
            "apiKey": "secret-key",
            "model": "gemma-3-27b-it",
            "contents": [{ "parts": [{ "text": "Hi" }] }],
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 100 }
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 200);

    let requests = upstream.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let forwarded: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(forwarded.get("apiKey").is_none());
    assert!(forwarded.get("model").is_none());

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn forwarded_body_keeps_inbound_key_order() {
    let (upstream, proxy) = start_with_upstream().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemma-3-27b-it:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/gemma", proxy.url()))
        .header("content-type", "application/json")
        .body(
            r#"{"systemInstruction":{"parts":[]},"apiKey":"k","model":"gemma-3-27b-it","contents":[],"generationConfig":{"topK":1,"maxOutputTokens":5}}"#,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let requests = upstream.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        String::from_utf8(requests[0].body.clone()).unwrap(),
        r#"{"systemInstruction":{"parts":[]},"contents":[],"generationConfig":{"topK":1,"maxOutputTokens":5}}"#
    );

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn success_body_is_relayed_unchanged() {
    let (upstream, proxy) = start_with_upstream().await;
    let upstream_body = r#"{"candidates":[{"text":"hi"}]}"#;

    Mock::given(method("POST"))
        .and(path(DEFAULT_MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(upstream_body, "application/json"))
        .mount(&upstream)
        .await;

    let response = post_relay(&proxy, json!({ "apiKey": "k1", "contents": [] })).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(response.text().await.unwrap(), upstream_body);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn success_is_logged_at_info_level() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (upstream, proxy) = start_with_upstream().await;

    Mock::given(method("POST"))
        .and(path(DEFAULT_MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&upstream)
        .await;

    let response = post_relay(&proxy, json!({ "apiKey": "k1", "contents": [] })).await;
    assert_eq!(response.status().as_u16(), 200);
    proxy.stop().await.unwrap();

    let output = logs.contents();
    assert!(output.contains("Upstream API success"), "{output}");
    assert!(!output.contains("Upstream response body"), "{output}");
    assert!(output.contains("key=***"), "{output}");
}

#[tokio::test]
async fn upstream_error_status_and_body_are_relayed() {
    let (upstream, proxy) = start_with_upstream().await;
    let upstream_body = r#"{"error":{"message":"quota exceeded"}}"#;

    Mock::given(method("POST"))
        .and(path(DEFAULT_MODEL_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_raw(upstream_body, "application/json"))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = post_relay(&proxy, json!({ "apiKey": "k1", "contents": [] })).await;

    assert_eq!(response.status().as_u16(), 429);
    assert_eq!(response.text().await.unwrap(), upstream_body);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn missing_key_never_reaches_upstream() {
    let (upstream, proxy) = start_with_upstream().await;

    for body in [
        json!({ "contents": [] }),
        json!({ "apiKey": "", "contents": [] }),
        json!({ "apiKey": null, "contents": [] }),
    ] {
        let response = post_relay(&proxy, body).await;
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "error": "API key is required" }));
    }

    assert!(upstream.received_requests().await.unwrap().is_empty());
    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn non_json_upstream_response_is_internal_error() {
    let (upstream, proxy) = start_with_upstream().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&upstream)
        .await;

    let response = post_relay(&proxy, json!({ "apiKey": "k1" })).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
    assert!(!body["details"].as_str().unwrap().is_empty());

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn unreachable_upstream_is_internal_error() {
    // Bind and release a port so nothing is listening on it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let proxy = start_proxy(format!("http://127.0.0.1:{port}/v1beta")).await;

    let response = post_relay(&proxy, json!({ "apiKey": "k1", "contents": [] })).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
    let details = body["details"].as_str().unwrap();
    assert!(!details.is_empty());
    assert!(!details.contains("k1"), "details leaked the key: {details}");

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn health_is_repeatable_with_non_decreasing_timestamps() {
    let proxy = start_proxy("http://127.0.0.1:9/v1beta".to_string()).await;
    let http = reqwest::Client::new();

    let mut previous = String::new();
    for _ in 0..3 {
        let body: Value = http
            .get(format!("{}/health", proxy.url()))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Gemma API Proxy Server is running");

        let timestamp = body["timestamp"].as_str().unwrap().to_string();
        assert!(timestamp >= previous, "{timestamp} < {previous}");
        previous = timestamp;
    }

    proxy.stop().await.unwrap();
}
