//! HTTP wiring: the command webhook and a liveness probe.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;

use milkbot_infra::store::InventoryStore;

use crate::command::InboundCommand;
use crate::dispatcher::CommandDispatcher;
use crate::middleware::{secret_middleware, SecretState};

/// Store handle chosen at startup (Postgres or in-memory).
pub type SharedStore = Arc<dyn InventoryStore>;

type SharedDispatcher = Arc<CommandDispatcher<SharedStore>>;

/// Build the full HTTP router (used by `main.rs` and the black-box tests).
pub fn build_app(store: SharedStore, bot_token: impl Into<Arc<str>>) -> Router {
    let dispatcher: SharedDispatcher = Arc::new(CommandDispatcher::new(store));

    let webhook = Router::new()
        .route("/commands", post(handle_command))
        .with_state(dispatcher)
        .layer(axum::middleware::from_fn_with_state(
            SecretState::new(bot_token),
            secret_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(webhook)
        .layer(ServiceBuilder::new())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn handle_command(
    State(dispatcher): State<SharedDispatcher>,
    body: Result<Json<InboundCommand>, JsonRejection>,
) -> Response {
    let Json(command) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text());
        }
    };

    Json(dispatcher.handle(command).await).into_response()
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
