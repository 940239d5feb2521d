//! HTTP request handlers.
//!
//! Sessions are checked out of the shared map for the duration of a request
//! so turn handling never holds the map lock across an oracle round trip. A
//! session that fails mid-turn is discarded: its durable history survives but
//! it accepts no further turns.

use crate::models::{
    ConversationRow, ErrorResponse, MessageRow, RecognitionResponse, SessionStarted,
    StartSessionPayload, SummaryResponse, TurnPayload, TurnReply,
};
use crate::state::{ActiveSession, AppState};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;
use yuban_core::error::TutorError;
use yuban_core::level::Level;
use yuban_core::orchestrator::{ProficiencyStore, SessionOrchestrator, SessionStart};
use yuban_core::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tutor(#[from] TutorError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unconfigured(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Tutor(err) => match err {
                TutorError::OracleUnavailable(_) => {
                    error!(error = %err, "upstream oracle failure");
                    (StatusCode::BAD_GATEWAY, err.to_string())
                }
                TutorError::StoreUnavailable(_) => {
                    error!(error = %err, "store failure");
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                }
                TutorError::EmptyVocabulary { .. }
                | TutorError::SessionClosed(_)
                | TutorError::SessionOpen(_) => (StatusCode::CONFLICT, err.to_string()),
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Unconfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.to_string()),
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

fn user_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn orchestrator(state: &AppState) -> SessionOrchestrator {
    SessionOrchestrator::new(
        state.oracle.clone(),
        state.store.clone() as Arc<dyn ProficiencyStore>,
        state.catalog.clone(),
        state.prompts.clone(),
    )
    .with_words_per_session(state.config.words_per_session)
}

/// Starts a practice session.
///
/// With an `x-user-id` header the user's stored level is assessed and
/// possibly updated first; without one the session is anonymous at the level
/// named in the payload.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = StartSessionPayload,
    responses(
        (status = 200, description = "Session started", body = SessionStarted),
        (status = 409, description = "No vocabulary for the level", body = ErrorResponse),
        (status = 502, description = "Oracle unavailable", body = ErrorResponse)
    )
)]
pub async fn start_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<StartSessionPayload>,
) -> Result<Json<SessionStarted>, ApiError> {
    let rounds = payload.rounds.unwrap_or(state.config.session_rounds);
    let user = user_header(&headers);

    let SessionStart {
        mut session,
        level,
        vocabulary,
    } = match &user {
        Some(user) => {
            state.store.ensure_user(user, None).await?;
            orchestrator(&state)
                .start_session(user, rounds, payload.topic)
                .await?
        }
        None => {
            let level = Level::clamped(payload.level.unwrap_or(Level::MIN.get()) as i64);
            orchestrator(&state).start_anonymous(level, rounds, payload.topic)?
        }
    };

    let conversation_id = session.id();
    state
        .store
        .create_conversation(conversation_id, user.as_deref(), &vocabulary)
        .await?;

    let opener = session.open().await?;
    state
        .store
        .append_message(conversation_id, &opener, false)
        .await?;

    state
        .sessions
        .lock()
        .await
        .insert(conversation_id, ActiveSession::new(session));

    Ok(Json(SessionStarted {
        conversation_id,
        level: level.get(),
        level_label: level.label(),
        vocabulary,
        opener,
    }))
}

/// When the voice and avatar providers are configured, renders the reply as
/// a talking-avatar video. Rendering failures degrade to a text-only reply.
async fn render_reply_video(state: &AppState, text: &str) -> Option<String> {
    let synthesizer = state.synthesizer.as_ref()?;
    let animator = state.animator.as_ref()?;
    let voice_id = state.config.tutor_voice_id.as_deref()?;
    let face_id = state.config.tutor_face_id.as_deref()?;

    let audio = match synthesizer.synthesize(text, voice_id).await {
        Ok(audio) => audio,
        Err(err) => {
            warn!(error = %err, "speech synthesis failed; replying with text only");
            return None;
        }
    };
    match animator.animate(face_id, &audio).await {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(error = %err, "avatar render failed; replying with text only");
            None
        }
    }
}

/// Submits a learner turn and returns the tutor's reply.
#[utoipa::path(
    post,
    path = "/sessions/{id}/turns",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = TurnPayload,
    responses(
        (status = 200, description = "Tutor reply", body = TurnReply),
        (status = 404, description = "No such active session", body = ErrorResponse),
        (status = 409, description = "Session already closed", body = ErrorResponse),
        (status = 502, description = "Oracle unavailable", body = ErrorResponse)
    )
)]
pub async fn post_turn(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TurnPayload>,
) -> Result<Json<TurnReply>, ApiError> {
    let mut active = state
        .sessions
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| ApiError::NotFound(format!("no active session {id}")))?;

    if active.session.state() == SessionState::Closed {
        // Keep the closed session around: the summary still needs it.
        let err = TutorError::SessionClosed(id);
        state.sessions.lock().await.insert(id, active);
        return Err(err.into());
    }

    // A failure from here on drops the session.
    let reply = active
        .session
        .submit(payload.text.clone(), payload.report.clone())
        .await?;

    state.store.append_message(id, &payload.text, true).await?;
    state.store.append_message(id, &reply.text, false).await?;
    if let Some(report) = payload.report {
        // The recognition endpoint already persisted the record; here the
        // report is only collected for the post-session summary.
        active.reports.push(report);
    }
    if reply.closed {
        state.store.close_conversation(id).await?;
    }

    let video_url = render_reply_video(&state, &reply.text).await;

    active.touch();
    state.sessions.lock().await.insert(id, active);
    Ok(Json(TurnReply {
        text: reply.text,
        closed: reply.closed,
        video_url,
    }))
}

/// Produces the post-session performance summary.
///
/// Available once the session has closed; the session's in-memory context is
/// released after a successful summary.
#[utoipa::path(
    post,
    path = "/sessions/{id}/summary",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Session summary", body = SummaryResponse),
        (status = 404, description = "No such active session", body = ErrorResponse),
        (status = 409, description = "Session still open", body = ErrorResponse),
        (status = 502, description = "Oracle unavailable", body = ErrorResponse)
    )
)]
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = summarize_and_release(&state.sessions, id).await?;
    Ok(Json(SummaryResponse { summary }))
}

/// Checks the session out of the map and summarizes it. A successful summary
/// releases the in-memory context; a failed one puts it back so the summary
/// can be retried.
async fn summarize_and_release(
    sessions: &Mutex<HashMap<Uuid, ActiveSession>>,
    id: Uuid,
) -> Result<String, ApiError> {
    let active = sessions
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| ApiError::NotFound(format!("no active session {id}")))?;

    match active.session.summarize(&active.reports).await {
        Ok(summary) => Ok(summary),
        Err(err) => {
            sessions.lock().await.insert(id, active);
            Err(err.into())
        }
    }
}

/// Lists the calling user's conversations, most recent first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Conversation list", body = [ConversationRow]),
        (status = 400, description = "Missing x-user-id header", body = ErrorResponse)
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationRow>>, ApiError> {
    let user = user_header(&headers)
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))?;
    let rows = state.store.list_conversations(&user).await?;
    Ok(Json(rows))
}

/// The full message history of one conversation.
#[utoipa::path(
    get,
    path = "/sessions/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Message history", body = [MessageRow]),
        (status = 404, description = "No such conversation", body = ErrorResponse)
    )
)]
pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    state
        .store
        .get_conversation(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no conversation {id}")))?;
    let rows = state.store.messages(id).await?;
    Ok(Json(rows))
}

/// Recognizes one WAV utterance, with pronunciation assessment when the
/// engine provides it.
#[utoipa::path(
    post,
    path = "/speech/recognitions",
    request_body(content = Vec<u8>, content_type = "audio/wav"),
    responses(
        (status = 200, description = "Recognized text and metrics", body = RecognitionResponse),
        (status = 400, description = "Not a PCM WAV payload", body = ErrorResponse),
        (status = 503, description = "Recognizer not configured", body = ErrorResponse)
    )
)]
pub async fn recognize(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RecognitionResponse>, ApiError> {
    let recognizer = state
        .recognizer
        .as_ref()
        .ok_or(ApiError::Unconfigured("speech recognition is not configured"))?;
    crate::audio::parse_wav_header(&body).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let recognition = recognizer.recognize(&body).await?;
    if let Some(report) = &recognition.report {
        state
            .store
            .save_speech_record(user_header(&headers).as_deref(), &recognition.text, report)
            .await?;
    }
    Ok(Json(RecognitionResponse {
        text: recognition.text,
        report: recognition.report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedOracle, session_with};

    #[tokio::test]
    async fn successful_summary_releases_the_session_context() {
        let oracle = ScriptedOracle::new(&[
            "老师：你好！",
            "老师：再见！",
            "Nice work. Practise tones next.",
        ]);
        let mut session = session_with(oracle, 1);
        session.open().await.unwrap();
        let reply = session.submit("你好", None).await.unwrap();
        assert!(reply.closed);
        let id = session.id();

        let sessions = Mutex::new(HashMap::new());
        sessions
            .lock()
            .await
            .insert(id, ActiveSession::new(session));

        let summary = summarize_and_release(&sessions, id).await.unwrap();
        assert_eq!(summary, "Nice work. Practise tones next.");
        assert!(sessions.lock().await.is_empty());

        // The context is gone: a repeat request no longer finds it.
        let err = summarize_and_release(&sessions, id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_summary_keeps_the_session_for_retry() {
        let oracle = ScriptedOracle::new(&["老师：你好！"]);
        let mut session = session_with(oracle, 1);
        session.open().await.unwrap();
        let id = session.id();

        let sessions = Mutex::new(HashMap::new());
        sessions
            .lock()
            .await
            .insert(id, ActiveSession::new(session));

        // Still open: the summary is refused and the context stays in place.
        let err = summarize_and_release(&sessions, id).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Tutor(TutorError::SessionOpen(open_id)) if open_id == id
        ));
        assert!(sessions.lock().await.contains_key(&id));
    }
}
