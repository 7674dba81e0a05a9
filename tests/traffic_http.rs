//! Integration tests for the traffic HTTP service.
//!
//! Each test spins up a fake upstream (Airtable REST + Anthropic Messages)
//! and the real traffic server, both on random ports, and drives the
//! `/traffic` contract over HTTP with the production clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use dot_traffic::llm::AnthropicProvider;
use dot_traffic::lookup::{AirtableConfig, AirtableLookup};
use dot_traffic::routing::{ClientVocabulary, LookupFailurePolicy, TrafficRouter};
use dot_traffic::server::traffic_routes;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const BASE_ID: &str = "appTEST";

const UPDATE_ANSWER: &str = r#"{"route": "update", "intent": "Status update on the newsletter job", "confidence": "high", "rationale": "Progress report on an existing job."}"#;

// ── Fake upstream ───────────────────────────────────────────────────────

#[derive(Clone)]
struct Upstream {
    /// Text the fake model answers with; `None` makes it return HTTP 500.
    answer: Option<&'static str>,
}

fn project_record() -> Value {
    json!({
        "id": "recTOW087",
        "fields": {
            "Job Number": "TOW 087",
            "Project Name": "Newsletter",
            "Client": ["Tower Insurance"],
            "Stage": "Craft",
            "Status": "In Progress",
            "Round": 2,
            "With Client?": false,
            "Teams Channel ID": "19:tow087@thread.tacv2"
        }
    })
}

async fn airtable(
    Path((base, table)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if base != BASE_ID {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "NOT_FOUND"})));
    }
    let formula = params.get("filterByFormula").cloned().unwrap_or_default();
    let records = match table.as_str() {
        "Projects" if formula.contains("'TOW 087'") => vec![project_record()],
        "Projects" if formula.starts_with("AND(FIND('TOW'") => vec![
            project_record(),
            json!({"id": "recTOW999", "fields": {"Job Number": "TOW 999", "Project Name": "Admin"}}),
        ],
        "Clients" if formula.contains("'TOW'") => vec![json!({
            "id": "recClientTOW",
            "fields": {"Client": "Tower Insurance", "Client code": "TOW"}
        })],
        _ => Vec::new(),
    };
    (StatusCode::OK, Json(json!({ "records": records })))
}

async fn messages(State(upstream): State<Upstream>) -> (StatusCode, Json<Value>) {
    match upstream.answer {
        Some(text) => (
            StatusCode::OK,
            Json(json!({
                "id": "msg_test",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": text}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 420, "output_tokens": 38}
            })),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"type": "error", "error": {"type": "api_error", "message": "boom"}})),
        ),
    }
}

async fn start_upstream(upstream: Upstream) -> String {
    let app = Router::new()
        .route("/v1/messages", post(messages))
        .route("/{base}/{table}", get(airtable))
        .with_state(upstream);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

// ── Traffic server ──────────────────────────────────────────────────────

struct Options {
    answer: Option<&'static str>,
    airtable_key: Option<&'static str>,
    policy: LookupFailurePolicy,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            answer: Some(UPDATE_ANSWER),
            airtable_key: Some("pat-test"),
            policy: LookupFailurePolicy::Degrade,
        }
    }
}

/// Start the traffic server against a fresh fake upstream; return its port.
async fn start_server(options: Options) -> u16 {
    let upstream = start_upstream(Upstream {
        answer: options.answer,
    })
    .await;

    let lookup = AirtableLookup::new(AirtableConfig {
        api_key: options.airtable_key.map(SecretString::from),
        base_id: BASE_ID.to_string(),
        projects_table: "Projects".to_string(),
        clients_table: "Clients".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap()
    .with_base_url(&upstream);

    let llm = AnthropicProvider::new(
        SecretString::from("sk-ant-test"),
        "claude-sonnet-4-20250514",
        Duration::from_secs(2),
    )
    .unwrap()
    .with_base_url(&upstream);

    let router = TrafficRouter::new(
        ClientVocabulary::agency_defaults(),
        Arc::new(lookup),
        Arc::new(llm),
        vec!["hunch.co.nz".to_string()],
    )
    .with_lookup_policy(options.policy);
    let app = traffic_routes(Arc::new(router));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the servers a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    port
}

async fn post_traffic(port: u16, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/traffic"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap();
    (status, body)
}

fn newsletter_update() -> Value {
    json!({
        "emailContent": "Just a quick status update on the newsletter job.",
        "subjectLine": "TOW 087 - newsletter update",
        "senderEmail": "sam@hunch.co.nz",
        "senderName": "Sam Taylor",
        "allRecipients": ["jane@tower.co.nz"],
        "hasAttachments": false,
        "attachmentNames": []
    })
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options::default()).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "dot-traffic");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn resolved_job_routes_to_update() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options::default()).await;

        let (status, body) = post_traffic(port, newsletter_update()).await;
        assert_eq!(status, 200);
        assert_eq!(body["route"], "update");
        assert_eq!(body["confidence"], "high");
        assert_eq!(body["jobNumber"], "TOW 087");
        assert_eq!(body["clientCode"], "TOW");
        assert_eq!(body["clientName"], "Tower Insurance");
        assert_eq!(body["source"], "email");
        assert_eq!(body["project"]["round"], 2);
        assert_eq!(body["project"]["teamsChannelId"], "19:tow087@thread.tacv2");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn no_job_number_routes_to_clarify() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options::default()).await;

        let (status, body) = post_traffic(
            port,
            json!({
                "emailContent": "Can you send me that thing from last week?",
                "subjectLine": "Quick question",
                "senderEmail": "someone@example.com",
                "senderName": "Alex"
            }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["route"], "clarify");
        assert_eq!(body["confidence"], "low");
        assert!(body.get("jobNumber").is_none());
        let draft = body["clarifyEmail"].as_str().unwrap();
        assert!(draft.contains("Hi Alex,"));
        assert!(draft.contains("TRIAGE"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_lookup_degrades() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options {
            airtable_key: None,
            ..Options::default()
        })
        .await;

        let (status, body) = post_traffic(port, newsletter_update()).await;
        assert_eq!(status, 200);
        assert_ne!(body["confidence"], "high");
        assert_eq!(body["jobNumber"], "TOW 087");
        assert!(body.get("clientName").is_none());
        assert!(
            body["reason"]
                .as_str()
                .unwrap()
                .contains("Unresolved entity lookup")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_lookup_fails_under_fail_policy() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options {
            airtable_key: None,
            policy: LookupFailurePolicy::Fail,
            ..Options::default()
        })
        .await;

        let (status, body) = post_traffic(port, newsletter_update()).await;
        assert_eq!(status, 503);
        assert!(body["error"].as_str().unwrap().contains("Lookup unavailable"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn inference_outage_is_bad_gateway() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options {
            answer: None,
            ..Options::default()
        })
        .await;

        let (status, body) = post_traffic(port, newsletter_update()).await;
        assert_eq!(status, 502);
        assert!(body["error"].as_str().unwrap().contains("Inference unavailable"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_model_output_routes_to_clarify() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options {
            answer: Some("I'm not sure what this is."),
            ..Options::default()
        })
        .await;

        let (status, body) = post_traffic(port, newsletter_update()).await;
        assert_eq!(status, 200);
        assert_eq!(body["route"], "clarify");
        assert_eq!(body["confidence"], "low");
        assert_eq!(body["jobNumber"], "TOW 087");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_content_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let port = start_server(Options::default()).await;

        let (status, body) = post_traffic(port, json!({"subjectLine": "TOW 087"})).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("emailContent"));
    })
    .await
    .expect("test timed out");
}
