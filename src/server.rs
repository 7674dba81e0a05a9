//! HTTP surface: `POST /traffic` and `GET /health`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RoutingError;
use crate::routing::{InboundMessage, RoutingDecision, Source, TrafficRouter};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<TrafficRouter>,
}

/// Build the Axum router for the traffic service.
pub fn traffic_routes(router: Arc<TrafficRouter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/traffic", post(traffic))
        .with_state(AppState { router })
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, router: Arc<TrafficRouter>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Traffic server listening");
    }
    axum::serve(listener, traffic_routes(router)).await
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "dot-traffic",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Traffic ─────────────────────────────────────────────────────────────

/// A single value or a list; `allRecipients` arrives both ways.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => s
                .split([',', ';'])
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRequest {
    email_content: Option<String>,
    #[serde(default)]
    subject_line: String,
    #[serde(default)]
    sender_email: String,
    #[serde(default)]
    sender_name: Option<String>,
    #[serde(default)]
    all_recipients: Option<OneOrMany>,
    #[serde(default)]
    has_attachments: bool,
    #[serde(default)]
    attachment_names: Option<OneOrMany>,
    #[serde(default)]
    source: Source,
}

impl TrafficRequest {
    /// Convert to a message, or `MalformedInput` when the body is absent.
    fn into_message(self) -> Result<InboundMessage, RoutingError> {
        let body = self
            .email_content
            .ok_or_else(|| RoutingError::MalformedInput("emailContent is required".into()))?;
        let attachment_names = if self.has_attachments {
            self.attachment_names.map(OneOrMany::into_vec).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(InboundMessage {
            body,
            subject: self.subject_line,
            sender_email: self.sender_email.trim().to_string(),
            sender_name: self.sender_name.filter(|n| !n.trim().is_empty()),
            recipients: self.all_recipients.map(OneOrMany::into_vec).unwrap_or_default(),
            has_attachments: self.has_attachments,
            attachment_names,
            source: self.source,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrafficResponse {
    #[serde(flatten)]
    decision: RoutingDecision,
    source: Source,
    request_id: Uuid,
    decided_at: DateTime<Utc>,
}

async fn traffic(
    State(state): State<AppState>,
    payload: Result<Json<TrafficRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected traffic request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };

    let message = match request.into_message() {
        Ok(message) => message,
        Err(e) => return error_response(&e),
    };

    let request_id = Uuid::new_v4();
    match state.router.decide_with_id(&message, request_id).await {
        Ok(decision) => (
            StatusCode::OK,
            Json(TrafficResponse {
                decision,
                source: message.source,
                request_id,
                decided_at: Utc::now(),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &RoutingError) -> Response {
    let status = match err {
        RoutingError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        RoutingError::InferenceUnavailable(_) => StatusCode::BAD_GATEWAY,
        RoutingError::LookupUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}
