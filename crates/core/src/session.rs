//! The turn-based conversation state machine.
//!
//! A session holds the rolling transcript, enforces the round limit, renders
//! prompts for the tutor oracle, and closes itself after the final learner
//! turn. Ordering of the transcript is the sole coherence mechanism the
//! oracle consumes: beyond the vocabulary list there is no structured state
//! in the prompt.

use crate::error::TutorError;
use crate::oracle::{ChatOracle, strip_speaker_label};
use crate::prompts::PromptSet;
use crate::speech::PronunciationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Learner,
    Tutor,
}

impl Speaker {
    fn transcript_label(self) -> &'static str {
        match self {
            Speaker::Learner => "学生",
            Speaker::Tutor => "老师",
        }
    }
}

/// One utterance. Append-only: turns are never edited or deleted once
/// recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Recognition-quality metrics, present when the turn originates from
    /// recognized speech.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<PronunciationReport>,
}

impl Turn {
    fn learner(text: String, report: Option<PronunciationReport>) -> Self {
        Self {
            speaker: Speaker::Learner,
            text,
            at: Utc::now(),
            report,
        }
    }

    fn tutor(text: String) -> Self {
        Self {
            speaker: Speaker::Tutor,
            text,
            at: Utc::now(),
            report: None,
        }
    }

    fn transcript_line(&self) -> String {
        format!("{}：{}", self.speaker.transcript_label(), self.text)
    }
}

/// The durable identity of one practice session.
///
/// The record references its user weakly: deleting a conversation must never
/// delete the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub vocabulary: Vec<String>,
}

impl ConversationRecord {
    fn new(user_id: Option<String>, vocabulary: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            started_at: Utc::now(),
            ended_at: None,
            vocabulary,
        }
    }

    /// Records the end time. Exactly-once: a second call is a no-op.
    pub fn close(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting learner turns.
    Open,
    /// Terminal; end time recorded, no further turns accepted.
    Closed,
}

/// What the tutor said in reply to a learner turn.
#[derive(Debug, Clone)]
pub struct TutorReply {
    pub text: String,
    /// True when this reply was the closing remark and the session is now
    /// terminal.
    pub closed: bool,
}

/// One turn-based practice session against the tutor oracle.
pub struct ConversationSession {
    oracle: Arc<dyn ChatOracle>,
    prompts: Arc<PromptSet>,
    rounds: u32,
    learner_turns: u32,
    topic: Option<String>,
    record: ConversationRecord,
    turns: Vec<Turn>,
    state: SessionState,
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("prompts", &self.prompts)
            .field("rounds", &self.rounds)
            .field("learner_turns", &self.learner_turns)
            .field("topic", &self.topic)
            .field("record", &self.record)
            .field("turns", &self.turns)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ConversationSession {
    /// Creates an open session. `rounds` is the number of learner turns
    /// before closure and is floored at 1.
    pub fn new(
        oracle: Arc<dyn ChatOracle>,
        prompts: Arc<PromptSet>,
        rounds: u32,
        vocabulary: Vec<String>,
        user_id: Option<String>,
        topic: Option<String>,
    ) -> Self {
        Self {
            oracle,
            prompts,
            rounds: rounds.max(1),
            learner_turns: 0,
            topic,
            record: ConversationRecord::new(user_id, vocabulary),
            turns: Vec::new(),
            state: SessionState::Open,
        }
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn record(&self) -> &ConversationRecord {
        &self.record
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.record.vocabulary
    }

    fn render_prompt(&self, is_end: bool) -> String {
        let vocab = self.record.vocabulary.join("、");
        let topic_line = self
            .topic
            .as_deref()
            .map(|t| format!("对话主题：{t}。\n"))
            .unwrap_or_default();
        let context: Vec<String> = self.turns.iter().map(Turn::transcript_line).collect();
        let mut prompt = self
            .prompts
            .conversation
            .replace("{vocab}", &vocab)
            .replace("{topic}", &topic_line)
            .replace("{context}", &context.join("\n"));
        if is_end {
            prompt.push_str(&self.prompts.closing);
        }
        prompt
    }

    /// Renders the system prompt from the template (vocabulary plus the full
    /// ordered transcript), sends it to the oracle and returns the reply
    /// with any leading speaker label stripped.
    ///
    /// When `is_end` is true the closing instruction block is appended and
    /// the record's end time is set; setting the end time is idempotent
    /// against accidental double invocation.
    pub async fn respond(&mut self, is_end: bool) -> Result<String, TutorError> {
        let prompt = self.render_prompt(is_end);
        let reply = self.oracle.generate(&prompt).await?;
        if is_end {
            self.record.close();
        }
        Ok(strip_speaker_label(&reply).to_string())
    }

    /// The tutor's unprompted opener. Call once, before any learner turn.
    pub async fn open(&mut self) -> Result<String, TutorError> {
        if self.state == SessionState::Closed {
            return Err(TutorError::SessionClosed(self.record.id));
        }
        let reply = self.respond(false).await?;
        self.turns.push(Turn::tutor(reply.clone()));
        Ok(reply)
    }

    /// Appends a learner turn and produces the tutor's reply.
    ///
    /// On the final round the reply is the closing remark and the session
    /// transitions to `Closed`; later submissions are rejected.
    pub async fn submit(
        &mut self,
        text: impl Into<String>,
        report: Option<PronunciationReport>,
    ) -> Result<TutorReply, TutorError> {
        if self.state == SessionState::Closed {
            return Err(TutorError::SessionClosed(self.record.id));
        }

        self.turns.push(Turn::learner(text.into(), report));
        self.learner_turns += 1;
        let is_end = self.learner_turns >= self.rounds;

        let reply = self.respond(is_end).await?;
        self.turns.push(Turn::tutor(reply.clone()));
        if is_end {
            self.state = SessionState::Closed;
        }

        Ok(TutorReply {
            text: reply,
            closed: is_end,
        })
    }

    /// Produces the post-session summary: one distinct oracle call sending
    /// the full transcript plus the collected pronunciation reports.
    ///
    /// Available only after closure; never mutates the turn history. The
    /// summary language is fixed (English) independent of the conversation
    /// language.
    pub async fn summarize(
        &self,
        reports: &[PronunciationReport],
    ) -> Result<String, TutorError> {
        if self.state != SessionState::Closed {
            return Err(TutorError::SessionOpen(self.record.id));
        }
        let transcript: Vec<String> = self.turns.iter().map(Turn::transcript_line).collect();
        let reports_json =
            serde_json::to_string_pretty(reports).map_err(TutorError::oracle)?;
        let prompt = self
            .prompts
            .summary
            .replace("{transcript}", &transcript.join("\n"))
            .replace("{reports}", &reports_json);
        let reply = self.oracle.generate(&prompt).await?;
        Ok(reply.trim().to_string())
    }
}
