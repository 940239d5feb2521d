//! Yuban core: the conversation-practice tutoring domain.
//!
//! This crate holds all of the decision logic: the adaptive-level state
//! machine, the turn-based conversation session and the vocabulary selection
//! policy. External collaborators (text generation, speech recognition,
//! speech synthesis, avatar rendering, the durable store) are traits; the
//! `yuban-api` service provides the concrete implementations.

pub mod assessor;
pub mod error;
pub mod level;
pub mod media;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod session;
pub mod speech;
pub mod vocabulary;

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::TutorError;
    use crate::oracle::ChatOracle;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// A scripted oracle for tests: pops canned replies in order and records
    /// every prompt it was given. An exhausted script reports the oracle as
    /// unavailable.
    pub struct ScriptedOracle {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedOracle {
        pub fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatOracle for ScriptedOracle {
        async fn generate(&self, prompt: &str) -> Result<String, TutorError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TutorError::oracle("scripted oracle exhausted"))
        }
    }
}
