//! HTTP gateway for potager.
//!
//! One streaming chat endpoint plus introspection routes. The chat
//! response is newline-delimited JSON: one record per agent event,
//! closed by an empty line once the loop is done.
//!
//! Built on Axum.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use potager_agent::runner::{AgentRequest, AgentRunner};
use potager_agent::stream_event::AgentStreamEvent;
use potager_config::GatewayConfig;
use potager_core::message::HistoryMessage;
use potager_core::tool::ToolSchema;
use potager_telemetry::{InteractionTrace, TraceStore};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state.
pub struct GatewayState {
    pub runner: Arc<AgentRunner>,
    pub traces: Arc<TraceStore>,
}

type SharedState = Arc<GatewayState>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolSchema>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct TracesQuery {
    #[serde(default = "default_traces_limit")]
    limit: usize,
}

fn default_traces_limit() -> usize {
    20
}

#[derive(Serialize)]
struct TraceListResponse {
    traces: Vec<InteractionTrace>,
}

/// Build the router. `allowed_origin` comes pre-parsed so a bad
/// configuration fails at startup, not per request.
pub fn build_router(state: SharedState, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/tools", get(tools_handler))
        .route("/traces", get(traces_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /chat` — run the conversation loop, streaming NDJSON events.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    info!(conversation_id = ?payload.conversation_id, "chat request");

    let request = AgentRequest {
        query: payload.query,
        history: payload.history,
        conversation_id: payload.conversation_id,
        context: String::new(),
    };
    let rx = state.runner.run_stream(request);

    let stream = ReceiverStream::new(rx).map(|event| {
        let line = match &event {
            // Terminal empty marker instead of the internal Done record.
            AgentStreamEvent::Done { .. } => "\n".to_string(),
            // An error also ends the stream; close it the same way.
            err @ AgentStreamEvent::Error { .. } => serde_json::to_string(err)
                .map(|json| format!("{json}\n\n"))
                .unwrap_or_default(),
            other => serde_json::to_string(other)
                .map(|json| format!("{json}\n"))
                .unwrap_or_default(),
        };
        Ok::<_, Infallible>(line)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// `GET /tools` — the registered tool schemas.
async fn tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.runner.tools().schemas(),
    })
}

/// `GET /traces?limit=N` — most recent interaction traces.
async fn traces_handler(
    State(state): State<SharedState>,
    Query(query): Query<TracesQuery>,
) -> Json<TraceListResponse> {
    Json(TraceListResponse {
        traces: state.traces.recent(query.limit),
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Start the HTTP server; runs until the process is stopped.
pub async fn serve(config: &GatewayConfig, state: SharedState) -> anyhow::Result<()> {
    let origin: HeaderValue = config
        .allowed_origin
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid gateway.allowed_origin: {e}"))?;
    let router = build_router(state, origin);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use potager_config::AgentConfig;
    use potager_providers::scripted::{ScriptedBackend, ScriptedTurn};
    use potager_tools::{MemoryGardenStore, garden_registry};
    use tower::ServiceExt;

    fn test_router(turns: Vec<ScriptedTurn>) -> Router {
        let store = Arc::new(MemoryGardenStore::new());
        store.seed_demo();
        let traces = Arc::new(TraceStore::new(100));
        let runner = Arc::new(AgentRunner::new(
            Arc::new(ScriptedBackend::new(turns)),
            Arc::new(garden_registry(store)),
            traces.clone(),
            AgentConfig::default(),
            "test-model",
        ));
        build_router(
            Arc::new(GatewayState { runner, traces }),
            HeaderValue::from_static("http://localhost:5173"),
        )
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = test_router(vec![]);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("ok"));
    }

    #[tokio::test]
    async fn tools_endpoint_lists_garden_tools() {
        let app = test_router(vec![]);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/tools")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("search_garden"));
        assert!(body.contains("log_event"));
    }

    #[tokio::test]
    async fn chat_streams_ndjson_with_terminal_blank_line() {
        let app = test_router(vec![ScriptedTurn::whole(
            "PENSÉE : simple\n\nRÉPONSE : Bonjour jardinier.",
        )]);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"query":"salut"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-ndjson"
        );

        let body = body_string(response).await;
        let mut lines = body.lines();
        let first: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(first["type"], "thought_token");
        // every non-empty line is valid JSON with a type tag
        for line in body.lines().filter(|l| !l.is_empty()) {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["type"].is_string());
        }
        // stream closes with the empty terminal marker
        assert!(body.ends_with("\n\n"));
        let joined = body
            .lines()
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("");
        assert!(joined.contains("Bonjour jardinier."));
    }

    #[tokio::test]
    async fn chat_generation_failure_still_closes_with_blank_line() {
        // no scripted turns: the first generation attempt fails
        let app = test_router(vec![]);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"query":"salut"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("\"type\":\"error\""));
        assert!(body.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn chat_step_events_appear_on_tool_turns() {
        let app = test_router(vec![
            ScriptedTurn::whole(
                "PENSÉE : je cherche\n\n```json\n{\"tool\":\"search_garden\",\"args\":{\"query\":\"radis\"}}\n```",
            ),
            ScriptedTurn::whole("RÉPONSE : Vous avez 30 radis."),
        ]);
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"query":"mes radis ?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("\"type\":\"step_start\""));
        assert!(body.contains("\"type\":\"step_end\""));
        assert!(body.contains("Vous avez 30 radis."));
    }
}
