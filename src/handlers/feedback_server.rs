use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{FeedbackConfig, ServerConfig};
use crate::models::{Feedback, FeedbackRequest};
use crate::providers::logging::StructuredLogger;
use crate::services::{FeedbackStore, TicketCreator};
use crate::utils::error::{AppError, Result};
use crate::utils::request_id::extract_request_id;

pub const NOTICE_RECEIVED: &str = "Thank you for your feedback.";
pub const NOTICE_TICKET_CREATED: &str = "Thank you for your feedback. A support ticket has been created.";
pub const NOTICE_TICKET_FAILED: &str = "Thank you for your feedback. (Ticket creation failed.)";

#[async_trait]
pub trait FeedbackServerTrait {
    async fn start(&self) -> Result<()>;
    async fn shutdown(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FeedbackStore>,
    pub ticket_creator: Arc<TicketCreator>,
    pub feedback_config: FeedbackConfig,
}

#[derive(Clone)]
pub struct FeedbackServer {
    config: ServerConfig,
    state: AppState,
}

impl FeedbackServer {
    pub fn new(
        config: ServerConfig,
        feedback_config: FeedbackConfig,
        store: Arc<dyn FeedbackStore>,
        ticket_creator: Arc<TicketCreator>,
    ) -> Self {
        Self {
            config,
            state: AppState {
                store,
                ticket_creator,
                feedback_config,
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.config.feedback_path, post(create_feedback_handler))
            .route("/health", get(health_check_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout))),
            )
            .with_state(self.state.clone())
    }
}

fn requestor_email(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn unprocessable(errors: Vec<String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "success": false, "errors": errors })),
    )
        .into_response()
}

pub async fn create_feedback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = extract_request_id(&headers);
    let config = &state.feedback_config;

    StructuredLogger::log_info(
        "Received feedback submission",
        Some(&request_id),
        Some(json!({ "body_size": body.len() })),
    );

    let email = requestor_email(&headers, &config.requestor_email_header);
    if config.require_authentication && email.is_none() {
        StructuredLogger::log_warning(
            "Rejected unauthenticated feedback submission",
            Some(&request_id),
            None,
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let request: FeedbackRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            StructuredLogger::log_warning(
                &format!("Failed to parse feedback payload: {}", e),
                Some(&request_id),
                None,
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "errors": ["param is missing or the value is empty: feedback"]
                })),
            )
                .into_response();
        }
    };

    let feedback = Feedback::from(request.feedback);
    let errors = feedback.validate(config.max_context_length);
    if !errors.is_empty() {
        return unprocessable(errors);
    }

    let stored = match state.store.save(feedback).await {
        Ok(stored) => stored,
        Err(e) => {
            StructuredLogger::log_error(
                &format!("Failed to store feedback: {}", e),
                Some(&request_id),
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "errors": [e.to_string()] })),
            )
                .into_response();
        }
    };

    let mut ticket_id = None;
    let notice = if state.ticket_creator.is_enabled() {
        let result = state
            .ticket_creator
            .call(&stored.feedback, email.as_deref())
            .await;

        if result.is_success() {
            ticket_id = result.ticket_id().cloned();
            NOTICE_TICKET_CREATED
        } else {
            let reason = result
                .error()
                .map(|e| e.to_string())
                .unwrap_or_default();
            StructuredLogger::log_warning(
                &format!("TDX ticket creation failed: {}", reason),
                Some(&request_id),
                Some(json!({ "feedback_id": stored.id })),
            );
            NOTICE_TICKET_FAILED
        }
    } else {
        NOTICE_RECEIVED
    };

    StructuredLogger::log_info(
        "Feedback accepted",
        Some(&request_id),
        Some(json!({
            "feedback_id": stored.id,
            "ticket_id": ticket_id.as_ref().map(|id| id.to_string())
        })),
    );

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": notice,
            "feedback_id": stored.id,
            "ticket_id": ticket_id,
        })),
    )
        .into_response()
}

pub async fn health_check_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Application is healthy"
        })),
    )
}

#[async_trait]
impl FeedbackServerTrait for FeedbackServer {
    async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.listen_host, self.config.listen_port)
            .parse()
            .map_err(|e| AppError::configuration(format!("Invalid server address: {}", e)))?;

        let app = self.router();

        info!("Feedback server listening on {}", addr);
        StructuredLogger::log_info(
            "Feedback server started",
            None,
            Some(json!({
                "address": addr.to_string(),
                "feedback_path": self.config.feedback_path,
                "ticket_creation": self.state.ticket_creator.is_enabled()
            })),
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::configuration(format!("Failed to bind to address {}: {}", addr, e)))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        StructuredLogger::log_info("Feedback server shutting down", None, None);
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            StructuredLogger::log_error(&format!("Failed to install Ctrl+C handler: {}", e), None);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                StructuredLogger::log_error(&format!("Failed to install SIGTERM handler: {}", e), None);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    StructuredLogger::log_info("Signal received, starting graceful shutdown", None, None);
}
