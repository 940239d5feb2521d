//! Level assessment: turning a short elicited exchange into a calibrated
//! `(level, confidence)` estimate.
//!
//! The scoring reply is free text, so the extractor is a small regex over
//! labeled lines rather than line-prefix string surgery; any parse failure
//! is caught as a unit and collapses to the no-signal fallback
//! `(current level, 0.5)`. A session is never blocked on a bad model reply.

use crate::error::{AssessmentParseError, TutorError};
use crate::level::Level;
use crate::oracle::{ChatOracle, strip_speaker_label};
use crate::prompts::PromptSet;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::warn;

/// An ephemeral assessment outcome, consumed immediately by the
/// confidence-gated update rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub suggested: Level,
    pub confidence: f32,
}

static LEVEL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:级别|Level)\s*[:：]\s*(.+)$").unwrap());
static CONFIDENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:置信度|Confidence)\s*[:：]\s*(.+)$").unwrap());

fn labeled_value<'a>(
    re: &Regex,
    reply: &'a str,
    label: &'static str,
) -> Result<&'a str, AssessmentParseError> {
    let caps = re
        .captures(reply)
        .ok_or(AssessmentParseError::MissingLabel(label))?;
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    Ok(raw.trim().trim_matches(['[', ']']).trim())
}

/// Extracts the raw `(level, confidence)` pair from a scoring reply.
///
/// Values are returned unclamped; clamping into the canonical domains is the
/// assessor's job so that this function stays a pure parser.
pub fn parse_scored_reply(reply: &str) -> Result<(i64, f64), AssessmentParseError> {
    let level_raw = labeled_value(&LEVEL_LINE, reply, "级别")?;
    let level = level_raw
        .parse::<i64>()
        .map_err(|_| AssessmentParseError::BadNumber {
            label: "级别",
            value: level_raw.to_string(),
        })?;

    let confidence_raw = labeled_value(&CONFIDENCE_LINE, reply, "置信度")?;
    let confidence = confidence_raw
        .parse::<f64>()
        .map_err(|_| AssessmentParseError::BadNumber {
            label: "置信度",
            value: confidence_raw.to_string(),
        })?;

    Ok((level, confidence))
}

/// Runs the elicitation-and-scoring dialogue against the text oracle.
pub struct LevelAssessor {
    oracle: Arc<dyn ChatOracle>,
    prompts: Arc<PromptSet>,
}

impl LevelAssessor {
    pub fn new(oracle: Arc<dyn ChatOracle>, prompts: Arc<PromptSet>) -> Self {
        Self { oracle, prompts }
    }

    /// Produces a `(suggested level, confidence)` estimate.
    ///
    /// Two oracle calls: the scripted elicitation, then the weighted rubric
    /// embedding the elicited response. Transport failures propagate; a
    /// malformed scoring reply falls back to `(current, 0.5)`.
    pub async fn assess(&self, current: Level) -> Result<Assessment, TutorError> {
        let elicited = self.oracle.generate(&self.prompts.elicitation).await?;
        let user_response = strip_speaker_label(&elicited);

        let scoring_prompt = self.prompts.rubric.replace("{response}", user_response);
        let reply = self.oracle.generate(&scoring_prompt).await?;

        match parse_scored_reply(&reply) {
            Ok((level, confidence)) => Ok(Assessment {
                suggested: Level::clamped(level),
                confidence: confidence.clamp(0.0, 1.0) as f32,
            }),
            Err(err) => {
                warn!(error = %err, "malformed scoring reply; keeping current level");
                Ok(Assessment {
                    suggested: current,
                    confidence: 0.5,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOracle;

    const ELICITED: &str = "学生：我学了两年中文。";

    #[tokio::test]
    async fn parses_a_well_formed_scoring_reply() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 4\n置信度: 0.85\n理由: 词汇量不错。"]);
        let assessor = LevelAssessor::new(oracle.clone(), Arc::new(PromptSet::default()));
        let assessment = assessor.assess(Level::MIN).await.unwrap();
        assert_eq!(assessment.suggested, Level::clamped(4));
        assert!((assessment.confidence - 0.85).abs() < f32::EPSILON);

        // The scoring prompt embeds the elicited response with its speaker
        // label stripped.
        let prompts = oracle.prompts();
        assert!(prompts[1].contains("我学了两年中文。"));
        assert!(!prompts[1].contains("学生："));
    }

    #[tokio::test]
    async fn clamps_out_of_range_scores() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 9\n置信度: 1.7"]);
        let assessor = LevelAssessor::new(oracle, Arc::new(PromptSet::default()));
        let assessment = assessor.assess(Level::clamped(2)).await.unwrap();
        assert_eq!(assessment.suggested, Level::MAX);
        assert_eq!(assessment.confidence, 1.0);
    }

    #[tokio::test]
    async fn missing_confidence_line_yields_the_fallback() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 5\n理由: 很好。"]);
        let assessor = LevelAssessor::new(oracle, Arc::new(PromptSet::default()));
        let current = Level::clamped(3);
        let assessment = assessor.assess(current).await.unwrap();
        assert_eq!(assessment.suggested, current);
        assert_eq!(assessment.confidence, 0.5);
    }

    #[tokio::test]
    async fn non_numeric_values_yield_the_fallback() {
        let oracle = ScriptedOracle::new(&[ELICITED, "级别: 中级\n置信度: 高"]);
        let assessor = LevelAssessor::new(oracle, Arc::new(PromptSet::default()));
        let current = Level::clamped(2);
        let assessment = assessor.assess(current).await.unwrap();
        assert_eq!(assessment.suggested, current);
        assert_eq!(assessment.confidence, 0.5);
    }

    #[tokio::test]
    async fn oracle_failures_propagate() {
        let oracle = ScriptedOracle::new(&[]);
        let assessor = LevelAssessor::new(oracle, Arc::new(PromptSet::default()));
        let err = assessor.assess(Level::MIN).await.unwrap_err();
        assert!(matches!(err, TutorError::OracleUnavailable(_)));
    }

    #[test]
    fn parser_accepts_fullwidth_separators_and_brackets() {
        let (level, confidence) =
            parse_scored_reply("评估结果如下\n级别：[4]\n置信度：0.9\n").unwrap();
        assert_eq!(level, 4);
        assert_eq!(confidence, 0.9);
    }

    #[test]
    fn parser_reports_missing_labels() {
        assert_eq!(
            parse_scored_reply("置信度: 0.9").unwrap_err(),
            AssessmentParseError::MissingLabel("级别")
        );
    }

    #[test]
    fn parser_reports_bad_numbers() {
        let err = parse_scored_reply("级别: [1-6]\n置信度: 0.9").unwrap_err();
        assert!(matches!(err, AssessmentParseError::BadNumber { label: "级别", .. }));
    }
}
