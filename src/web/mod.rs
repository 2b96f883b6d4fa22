//! Web chat surface
//!
//! Information Hiding:
//! - Route layout and wire shapes hidden behind `app_router`
//! - Agent progress streamed as server-sent events

mod handlers;

use crate::error::ChatError;
use crate::session::ChatService;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

pub use handlers::MessageRequest;

const PAGE: &str = include_str!("page.html");

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }
}

/// JSON error body with a status derived from the failure kind
pub struct ApiError(pub ChatError);

impl ApiError {
    fn kind(&self) -> &'static str {
        match self.0 {
            ChatError::Configuration(_) => "configuration",
            ChatError::Connection(_) => "connection",
            ChatError::Agent(_) => "agent",
            ChatError::EmptyMessage => "empty",
            ChatError::InvalidSession(_) => "invalid_session",
            ChatError::Storage(_) => "storage",
        }
    }

    fn status(&self) -> StatusCode {
        match self.0 {
            ChatError::Configuration(_)
            | ChatError::EmptyMessage
            | ChatError::InvalidSession(_) => StatusCode::BAD_REQUEST,
            ChatError::Connection(_) => StatusCode::BAD_GATEWAY,
            ChatError::Agent(_) | ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn body(&self) -> serde_json::Value {
        json!({ "error": { "kind": self.kind(), "message": self.0.to_string() } })
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn app_router(state: AppState) -> Router {
    use handlers::{clear_messages, list_messages, list_sources, post_message};

    let api = Router::new()
        .route("/api/sources", get(list_sources))
        .route(
            "/api/sessions/{id}/messages",
            get(list_messages).post(post_message).delete(clear_messages),
        );

    Router::new()
        .route("/", get(index))
        .merge(api)
        .fallback(not_found_handler)
        .with_state(state)
}
