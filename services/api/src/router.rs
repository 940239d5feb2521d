//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ConversationRow, ErrorResponse, MessageRow, RecognitionResponse, SessionStarted,
        StartSessionPayload, SummaryResponse, TurnPayload, TurnReply,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::start_session,
        handlers::post_turn,
        handlers::get_summary,
        handlers::list_conversations,
        handlers::get_messages,
        handlers::recognize,
    ),
    components(
        schemas(
            StartSessionPayload,
            SessionStarted,
            TurnPayload,
            TurnReply,
            SummaryResponse,
            RecognitionResponse,
            ConversationRow,
            MessageRow,
            ErrorResponse
        )
    ),
    tags(
        (name = "Yuban API", description = "Turn-based Mandarin conversation practice")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route(
            "/sessions",
            get(handlers::list_conversations).post(handlers::start_session),
        )
        .route("/sessions/{id}/turns", post(handlers::post_turn))
        .route("/sessions/{id}/summary", post(handlers::get_summary))
        .route("/sessions/{id}/messages", get(handlers::get_messages))
        .route("/speech/recognitions", post(handlers::recognize))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
