//! Shared application state.

use crate::config::Config;
use crate::db::PgStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;
use yuban_core::media::{AvatarAnimator, SpeechSynthesizer};
use yuban_core::oracle::ChatOracle;
use yuban_core::prompts::PromptSet;
use yuban_core::session::ConversationSession;
use yuban_core::speech::{PronunciationReport, SpeechRecognizer};
use yuban_core::vocabulary::VocabularyCatalog;

/// An in-flight session plus the pronunciation reports collected along the
/// way for the post-session summary.
pub struct ActiveSession {
    pub session: ConversationSession,
    pub reports: Vec<PronunciationReport>,
    touched_at: Instant,
}

impl ActiveSession {
    pub fn new(session: ConversationSession) -> Self {
        Self {
            session,
            reports: Vec::new(),
            touched_at: Instant::now(),
        }
    }

    /// Resets the eviction clock. Called whenever a request makes progress
    /// on the session.
    pub fn touch(&mut self) {
        self.touched_at = Instant::now();
    }
}

/// Removes every session that has seen no activity within `ttl`.
///
/// Sessions are normally released by a successful summary or dropped on a
/// mid-turn failure; this sweep reclaims the rest, where the learner walked
/// away from an open session or never asked for the summary. Returns the
/// number of contexts evicted.
pub async fn evict_stale(
    sessions: &Mutex<HashMap<Uuid, ActiveSession>>,
    ttl: Duration,
) -> usize {
    let mut map = sessions.lock().await;
    let before = map.len();
    map.retain(|_, active| active.touched_at.elapsed() <= ttl);
    before - map.len()
}

/// Shared state for all request handlers.
///
/// Sessions live here between requests. A handler takes a session OUT of the
/// map while it works on it and puts it back on success; a session that
/// failed mid-turn is dropped rather than resumed in an unknown state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PgStore>,
    pub catalog: Arc<VocabularyCatalog>,
    pub oracle: Arc<dyn ChatOracle>,
    pub prompts: Arc<PromptSet>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub animator: Option<Arc<dyn AvatarAnimator>>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub config: Arc<Config>,
    pub sessions: Arc<Mutex<HashMap<Uuid, ActiveSession>>>,
}
