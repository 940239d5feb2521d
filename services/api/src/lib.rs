//! The Yuban HTTP service: REST surface, durable store and provider clients
//! around the `yuban-core` tutoring domain.

pub mod audio;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use yuban_core::error::TutorError;
    use yuban_core::oracle::ChatOracle;
    use yuban_core::prompts::PromptSet;
    use yuban_core::session::ConversationSession;

    /// A scripted oracle for tests: pops canned replies in order. An
    /// exhausted script reports the oracle as unavailable.
    pub struct ScriptedOracle {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedOracle {
        pub fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl ChatOracle for ScriptedOracle {
        async fn generate(&self, _prompt: &str) -> Result<String, TutorError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TutorError::oracle("scripted oracle exhausted"))
        }
    }

    /// An anonymous session over the scripted oracle with a small fixed
    /// vocabulary.
    pub fn session_with(oracle: Arc<ScriptedOracle>, rounds: u32) -> ConversationSession {
        ConversationSession::new(
            oracle,
            Arc::new(PromptSet::default()),
            rounds,
            vec!["你好".to_string(), "再见".to_string()],
            None,
            None,
        )
    }
}
