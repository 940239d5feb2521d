//! Session orchestration: assessment, the confidence-gated level update,
//! vocabulary selection and session construction.

use crate::assessor::LevelAssessor;
use crate::error::TutorError;
use crate::level::Level;
use crate::oracle::ChatOracle;
use crate::prompts::PromptSet;
use crate::session::ConversationSession;
use crate::vocabulary::VocabularyCatalog;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Durable mapping from user to current proficiency level.
///
/// Levels cross this boundary only in canonical numeric form; display
/// conversion happens at the presentation layer. Implementations must
/// serialize writes per user row (read-modify-write on level).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProficiencyStore: Send + Sync {
    /// The user's current level; `Level::MIN` when the user has no record.
    async fn level(&self, user_id: &str) -> Result<Level, TutorError>;
    async fn set_level(&self, user_id: &str, level: Level) -> Result<(), TutorError>;
}

/// Number of vocabulary words seeded into a session by default.
pub const DEFAULT_WORDS_PER_SESSION: usize = 5;

/// A stored level only moves when a new measurement disagrees with it AND
/// its confidence strictly exceeds this threshold.
pub const LEVEL_UPDATE_CONFIDENCE: f32 = 0.8;

/// Everything the caller needs to display and drive a freshly started
/// session.
#[derive(Debug)]
pub struct SessionStart {
    pub session: ConversationSession,
    pub level: Level,
    pub vocabulary: Vec<String>,
}

/// Composes the assessor, the proficiency store, the vocabulary catalog and
/// the session constructor.
pub struct SessionOrchestrator {
    oracle: Arc<dyn ChatOracle>,
    store: Arc<dyn ProficiencyStore>,
    catalog: Arc<VocabularyCatalog>,
    prompts: Arc<PromptSet>,
    words_per_session: usize,
}

impl SessionOrchestrator {
    pub fn new(
        oracle: Arc<dyn ChatOracle>,
        store: Arc<dyn ProficiencyStore>,
        catalog: Arc<VocabularyCatalog>,
        prompts: Arc<PromptSet>,
    ) -> Self {
        Self {
            oracle,
            store,
            catalog,
            prompts,
            words_per_session: DEFAULT_WORDS_PER_SESSION,
        }
    }

    pub fn with_words_per_session(mut self, count: usize) -> Self {
        self.words_per_session = count.max(1);
        self
    }

    /// Starts a session for a known user.
    ///
    /// Runs the level assessment first and applies the conservative update
    /// rule: the stored level changes only when the suggestion differs from
    /// it and the confidence strictly exceeds [`LEVEL_UPDATE_CONFIDENCE`].
    /// Vocabulary is then sampled at the effective (possibly updated) level.
    pub async fn start_session(
        &self,
        user_id: &str,
        rounds: u32,
        topic: Option<String>,
    ) -> Result<SessionStart, TutorError> {
        let current = self.store.level(user_id).await?;
        let assessor = LevelAssessor::new(self.oracle.clone(), self.prompts.clone());
        let assessment = assessor.assess(current).await?;

        let effective = if assessment.suggested != current
            && assessment.confidence > LEVEL_UPDATE_CONFIDENCE
        {
            self.store.set_level(user_id, assessment.suggested).await?;
            info!(
                user_id,
                from = %current,
                to = %assessment.suggested,
                confidence = assessment.confidence,
                "stored level updated"
            );
            assessment.suggested
        } else {
            current
        };

        let vocabulary = self
            .catalog
            .words_for_conversation(effective, self.words_per_session)?;
        let session = ConversationSession::new(
            self.oracle.clone(),
            self.prompts.clone(),
            rounds,
            vocabulary.clone(),
            Some(user_id.to_string()),
            topic,
        );
        Ok(SessionStart {
            session,
            level: effective,
            vocabulary,
        })
    }

    /// Starts an anonymous session at an explicit level, skipping the
    /// assessment and the store entirely.
    pub fn start_anonymous(
        &self,
        level: Level,
        rounds: u32,
        topic: Option<String>,
    ) -> Result<SessionStart, TutorError> {
        let vocabulary = self
            .catalog
            .words_for_conversation(level, self.words_per_session)?;
        let session = ConversationSession::new(
            self.oracle.clone(),
            self.prompts.clone(),
            rounds,
            vocabulary.clone(),
            None,
            topic,
        );
        Ok(SessionStart {
            session,
            level,
            vocabulary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;
    use mockall::predicate::eq;

    const ELICITED: &str = "我学了两年中文。";

    fn catalog() -> Arc<VocabularyCatalog> {
        let words = [
            (1, "你好"),
            (1, "谢谢"),
            (2, "时间"),
            (2, "运动"),
            (3, "打算"),
            (4, "标准"),
            (4, "观点"),
        ]
        .into_iter()
        .map(|(n, w)| (Level::new(n).unwrap(), w.to_string()));
        Arc::new(VocabularyCatalog::from_entries(words, std::iter::empty()))
    }

    fn orchestrator(
        oracle: Arc<ScriptedOracle>,
        store: MockProficiencyStore,
    ) -> SessionOrchestrator {
        SessionOrchestrator::new(
            oracle,
            Arc::new(store),
            catalog(),
            Arc::new(PromptSet::default()),
        )
    }

    #[tokio::test]
    async fn confident_disagreement_moves_the_stored_level() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 4\n置信度: 0.9"]);
        let mut store = MockProficiencyStore::new();
        store
            .expect_level()
            .with(eq("lin"))
            .returning(|_| Ok(Level::clamped(2)));
        store
            .expect_set_level()
            .with(eq("lin"), eq(Level::clamped(4)))
            .times(1)
            .returning(|_, _| Ok(()));

        let start = orchestrator(oracle, store)
            .start_session("lin", 5, None)
            .await
            .unwrap();
        assert_eq!(start.level, Level::clamped(4));
        assert_eq!(start.session.record().user_id.as_deref(), Some("lin"));
    }

    #[tokio::test]
    async fn low_confidence_leaves_the_stored_level_alone() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 4\n置信度: 0.7"]);
        let mut store = MockProficiencyStore::new();
        store
            .expect_level()
            .returning(|_| Ok(Level::clamped(2)));
        store.expect_set_level().times(0);

        let start = orchestrator(oracle, store)
            .start_session("lin", 5, None)
            .await
            .unwrap();
        assert_eq!(start.level, Level::clamped(2));
    }

    #[tokio::test]
    async fn confidence_exactly_at_the_threshold_does_not_update() {
        // The rule is strict `>`.
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 4\n置信度: 0.8"]);
        let mut store = MockProficiencyStore::new();
        store
            .expect_level()
            .returning(|_| Ok(Level::clamped(2)));
        store.expect_set_level().times(0);

        let start = orchestrator(oracle, store)
            .start_session("lin", 5, None)
            .await
            .unwrap();
        assert_eq!(start.level, Level::clamped(2));
    }

    #[tokio::test]
    async fn agreeing_assessment_never_writes() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 2\n置信度: 0.95"]);
        let mut store = MockProficiencyStore::new();
        store
            .expect_level()
            .returning(|_| Ok(Level::clamped(2)));
        store.expect_set_level().times(0);

        let start = orchestrator(oracle, store)
            .start_session("lin", 5, None)
            .await
            .unwrap();
        assert_eq!(start.level, Level::clamped(2));
    }

    #[tokio::test]
    async fn first_session_defaults_to_level_one_vocabulary() {
        // No prior record: the store reports the default level, and a
        // malformed scoring reply keeps it there with no-signal confidence.
        let oracle = ScriptedOracle::new(&[ELICITED, "我无法评估。"]);
        let mut store = MockProficiencyStore::new();
        store.expect_level().returning(|_| Ok(Level::MIN));
        store.expect_set_level().times(0);

        let orchestrator = orchestrator(oracle, store);
        let start = orchestrator.start_session("new-user", 5, None).await.unwrap();
        assert_eq!(start.level, Level::MIN);
        assert!(start.vocabulary.len() <= 5);
        for word in &start.vocabulary {
            assert!(orchestrator.catalog.words_for_level(Level::MIN).contains(word));
        }
    }

    #[tokio::test]
    async fn empty_band_surfaces_to_the_caller() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 6\n置信度: 0.99"]);
        let mut store = MockProficiencyStore::new();
        store.expect_level().returning(|_| Ok(Level::clamped(6)));
        store.expect_set_level().times(0);

        let err = orchestrator(oracle, store)
            .start_session("lin", 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::EmptyVocabulary { .. }));
    }

    #[tokio::test]
    async fn anonymous_sessions_skip_assessment_and_store() {
        let oracle = ScriptedOracle::new(&[]);
        let store = MockProficiencyStore::new();
        let start = orchestrator(oracle, store)
            .start_anonymous(Level::clamped(2), 3, Some("运动".to_string()))
            .unwrap();
        assert_eq!(start.level, Level::clamped(2));
        assert!(start.session.record().user_id.is_none());
    }
}
