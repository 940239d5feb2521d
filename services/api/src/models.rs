//! API and Database Models
//!
//! This module defines the row types mapped with `sqlx` and the
//! request/response payloads documented with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use yuban_core::speech::PronunciationReport;

/// A registered learner.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    /// Canonical proficiency code, 1..=6.
    pub level: i16,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// One practice session. `ended_at` is null while the session is open and is
/// set exactly once when it closes.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct ConversationRow {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Comma-separated vocabulary assigned to the session.
    pub vocabulary: String,
}

impl ConversationRow {
    pub fn vocabulary_list(&self) -> Vec<String> {
        self.vocabulary
            .split(',')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One utterance within a conversation.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    #[schema(value_type = String, format = Uuid)]
    pub conversation_id: Uuid,
    pub content: String,
    /// True when the learner spoke, false for the tutor.
    pub is_learner: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct StartSessionPayload {
    /// Optional topic folded into the tutor's prompt.
    #[schema(example = "点菜")]
    pub topic: Option<String>,
    /// Learner turns before closure; defaults to the configured value.
    pub rounds: Option<u32>,
    /// Explicit level for anonymous sessions (ignored when a user header is
    /// present); out-of-range values are clamped.
    pub level: Option<u8>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct SessionStarted {
    #[schema(value_type = String, format = Uuid)]
    pub conversation_id: Uuid,
    /// Canonical level code.
    pub level: u8,
    /// Display form of the level, e.g. `HSK3`.
    #[schema(example = "HSK3")]
    pub level_label: String,
    pub vocabulary: Vec<String>,
    /// The tutor's opening remark.
    pub opener: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct TurnPayload {
    /// The learner's utterance (usually recognized speech).
    pub text: String,
    /// Recognition-quality metrics attached to the utterance.
    #[schema(value_type = Option<Object>)]
    pub report: Option<PronunciationReport>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct TurnReply {
    /// The tutor's reply.
    pub text: String,
    /// True when the reply was the closing remark.
    pub closed: bool,
    /// Rendered avatar video, when the voice and avatar providers are
    /// configured.
    pub video_url: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct RecognitionResponse {
    pub text: String,
    #[schema(value_type = Option<Object>)]
    pub report: Option<PronunciationReport>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_row_splits_vocabulary() {
        let row = ConversationRow {
            id: Uuid::new_v4(),
            user_id: Some("lin".to_string()),
            started_at: Utc::now(),
            ended_at: None,
            vocabulary: "你好,谢谢,再见".to_string(),
        };
        assert_eq!(row.vocabulary_list(), ["你好", "谢谢", "再见"]);

        let empty = ConversationRow {
            vocabulary: String::new(),
            ..row
        };
        assert!(empty.vocabulary_list().is_empty());
    }

    #[test]
    fn start_session_payload_fields_are_optional() {
        let payload: StartSessionPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.topic.is_none());
        assert!(payload.rounds.is_none());
        assert!(payload.level.is_none());

        let payload: StartSessionPayload =
            serde_json::from_str(r#"{"topic": "运动", "rounds": 3, "level": 2}"#).unwrap();
        assert_eq!(payload.topic.as_deref(), Some("运动"));
        assert_eq!(payload.rounds, Some(3));
        assert_eq!(payload.level, Some(2));
    }

    #[test]
    fn turn_payload_accepts_an_attached_report() {
        let json = r#"{
            "text": "你好",
            "report": {"accuracy": 90.0, "fluency": 85.0, "completeness": 100.0, "overall": 88.0}
        }"#;
        let payload: TurnPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.text, "你好");
        let report = payload.report.unwrap();
        assert_eq!(report.accuracy, 90.0);
        assert!(report.prosody.is_none());
    }

    #[test]
    fn turn_payload_requires_text() {
        let result: Result<TurnPayload, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn session_started_serializes_both_level_forms() {
        let started = SessionStarted {
            conversation_id: Uuid::new_v4(),
            level: 3,
            level_label: "HSK3".to_string(),
            vocabulary: vec!["打算".to_string()],
            opener: "老师：你好！".to_string(),
        };
        let json = serde_json::to_string(&started).unwrap();
        assert!(json.contains("\"level\":3"));
        assert!(json.contains("\"level_label\":\"HSK3\""));
    }

    #[test]
    fn error_response_serialization() {
        let error = ErrorResponse {
            message: "Conversation not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Conversation not found"}"#);
    }
}
