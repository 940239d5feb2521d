//! Data Access Layer
//!
//! All PostgreSQL access goes through [`PgStore`]. The pool validates
//! connections before reuse and discards broken ones; the initial connection
//! uses a bounded retry loop with a fixed backoff before surfacing
//! `StoreUnavailable`.

use crate::config::Config;
use crate::models::{ConversationRow, MessageRow};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use tracing::warn;
use uuid::Uuid;
use yuban_core::error::TutorError;
use yuban_core::level::Level;
use yuban_core::orchestrator::ProficiencyStore;
use yuban_core::speech::PronunciationReport;

fn store_err(err: sqlx::Error) -> TutorError {
    TutorError::store(err)
}

/// A wrapper around the `PgPool` providing the record-store contract.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects to the database with bounded retry-and-reconnect.
    pub async fn connect(config: &Config) -> Result<Self, TutorError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match PgPoolOptions::new()
                .max_connections(5)
                .test_before_acquire(true)
                .connect(&config.database_url)
                .await
            {
                Ok(pool) => return Ok(Self { pool }),
                Err(err) if attempt <= config.store_connect_retries => {
                    warn!(
                        attempt,
                        retries = config.store_connect_retries,
                        error = %err,
                        "store connection failed; retrying"
                    );
                    tokio::time::sleep(config.store_retry_backoff).await;
                }
                Err(err) => return Err(TutorError::store(err)),
            }
        }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Creates the user if absent; refreshes `last_login` either way.
    pub async fn ensure_user(
        &self,
        username: &str,
        email: Option<&str>,
    ) -> Result<(), TutorError> {
        sqlx::query(
            r#"
            INSERT INTO users (username, email)
            VALUES ($1, $2)
            ON CONFLICT (username)
            DO UPDATE SET last_login = now()
            "#,
        )
        .bind(username)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Creates a conversation row under the session's own id.
    pub async fn create_conversation(
        &self,
        id: Uuid,
        user_id: Option<&str>,
        vocabulary: &[String],
    ) -> Result<ConversationRow, TutorError> {
        sqlx::query_as::<_, ConversationRow>(
            r#"
            INSERT INTO conversations (id, user_id, vocabulary)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, started_at, ended_at, vocabulary
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(vocabulary.join(","))
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
    }

    /// Records the end time. The guard keeps the write exactly-once even if
    /// the caller closes twice.
    pub async fn close_conversation(&self, id: Uuid) -> Result<(), TutorError> {
        sqlx::query("UPDATE conversations SET ended_at = now() WHERE id = $1 AND ended_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    pub async fn get_conversation(
        &self,
        id: Uuid,
    ) -> Result<Option<ConversationRow>, TutorError> {
        sqlx::query_as::<_, ConversationRow>(
            "SELECT id, user_id, started_at, ended_at, vocabulary FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)
    }

    /// Lists a user's conversations, most recent first.
    pub async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationRow>, TutorError> {
        sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user_id, started_at, ended_at, vocabulary
            FROM conversations
            WHERE user_id = $1
            ORDER BY started_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }

    /// Appends one utterance to a conversation's history.
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        is_learner: bool,
    ) -> Result<MessageRow, TutorError> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (conversation_id, content, is_learner)
            VALUES ($1, $2, $3)
            RETURNING id, conversation_id, content, is_learner, created_at
            "#,
        )
        .bind(conversation_id)
        .bind(content)
        .bind(is_learner)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
    }

    /// The full message history for a conversation, in original order.
    pub async fn messages(&self, conversation_id: Uuid) -> Result<Vec<MessageRow>, TutorError> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, content, is_learner, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }

    /// Stores one recognized utterance with its quality metrics, passed
    /// through unmodified.
    pub async fn save_speech_record(
        &self,
        user_id: Option<&str>,
        text: &str,
        report: &PronunciationReport,
    ) -> Result<(), TutorError> {
        sqlx::query("INSERT INTO speech_records (user_id, text, report) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(text)
            .bind(Json(report))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl ProficiencyStore for PgStore {
    async fn level(&self, user_id: &str) -> Result<Level, TutorError> {
        let level: Option<i16> =
            sqlx::query_scalar("SELECT level FROM users WHERE username = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
        // Unknown users default to the minimum level.
        Ok(level.map(|v| Level::clamped(v as i64)).unwrap_or_default())
    }

    async fn set_level(&self, user_id: &str, level: Level) -> Result<(), TutorError> {
        // The upsert keeps the read-modify-write serialized on the user row.
        sqlx::query(
            r#"
            INSERT INTO users (username, level)
            VALUES ($1, $2)
            ON CONFLICT (username)
            DO UPDATE SET level = EXCLUDED.level
            "#,
        )
        .bind(user_id)
        .bind(level.get() as i16)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
