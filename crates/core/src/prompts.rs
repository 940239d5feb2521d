//! Prompt templates for the tutoring oracle.
//!
//! Templates use `{name}` placeholders filled by plain string replacement.
//! The conversation itself runs in Mandarin; the post-session summary is
//! produced in English regardless of the conversation language, so the
//! dashboard can render it for learners at any level.

/// The set of templates used by the assessor and the conversation session.
///
/// Callers can override individual templates (e.g. from a prompts directory)
/// before sharing the set across sessions.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Scripted elicitation questions for the level assessment.
    pub elicitation: String,
    /// Scoring rubric; expects `{response}`.
    pub rubric: String,
    /// Turn-generation template; expects `{vocab}`, `{topic}` and `{context}`.
    pub conversation: String,
    /// Closing instruction block appended on the final turn.
    pub closing: String,
    /// Post-session summary; expects `{transcript}` and `{reports}`.
    pub summary: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            elicitation: ELICITATION.to_string(),
            rubric: RUBRIC.to_string(),
            conversation: CONVERSATION.to_string(),
            closing: CLOSING.to_string(),
            summary: SUMMARY.to_string(),
        }
    }
}

const ELICITATION: &str = "\
我是一个中文老师，我需要评估你的中文水平。我会问你几个问题，请用中文回答。
我会根据你的回答中的词汇使用、语法正确性、表达流畅度来评估你的水平。

第一个问题：你学习中文多久了？你平时用中文做什么？
第二个问题：你觉得中文最难的部分是什么？
第三个问题：你能简单介绍一下你自己吗？

请用中文回答以上问题。如果你觉得某个问题太难，可以用简单的词汇来表达。
";

const RUBRIC: &str = "\
请仔细分析用户的回答：\"{response}\"

评估标准：
1. 词汇量 (占比30%):
   - 1级: 只会基础问候语和数字
   - 2级: 能使用150-300个基础词汇
   - 3级: 能使用300-600个常用词汇
   - 4级: 能使用600-1000个词汇，包括一些抽象词汇
   - 5级: 能使用1000-2000个词汇，表达更复杂的概念
   - 6级: 能使用2000个以上词汇，接近母语者水平

2. 语法准确性 (占比30%):
   - 1级: 只能说单字或简单词组
   - 2级: 能组成简单句子，有基本语序
   - 3级: 能使用基础语法结构，但有明显错误
   - 4级: 能正确使用常见语法结构，偶有错误
   - 5级: 能熟练运用复杂语法结构
   - 6级: 语法使用自然，几乎没有错误

3. 表达流畅度 (占比20%):
   - 1级: 只能回答是/否
   - 2级: 能用简单句子回答
   - 3级: 能进行基本对话
   - 4级: 能流畅表达简单话题
   - 5级: 能自然讨论较复杂话题
   - 6级: 表达流畅自然，接近母语者

4. 理解能力 (占比20%):
   - 1级: 只能理解单个词汇
   - 2级: 能理解简单指令
   - 3级: 能理解日常对话
   - 4级: 能理解较复杂的表达
   - 5级: 能理解抽象概念
   - 6级: 理解能力接近母语者

请根据以上标准分析用户回答，并给出以下格式的评估结果：
级别: [1-6]
置信度: [0-1]
理由: [详细分析每个评估维度的表现，并说明最终评级的原因]
";

const CONVERSATION: &str = "\
现在请你扮演一个中文老师，你的学生是一个正在学习中文的外国人。
请使用以下词汇，引导一个简单的多轮对话。
词汇：{vocab}。
{topic}**请注意，你的回答应该是中文的。**
**请注意，每次回答需要以“老师：”开头。**
**请注意，除非被要求，不要自己结束对话。**
**请注意，你需要使用以上词汇自行构筑对话内容，引导学生的学习。**
{context}
";

const CLOSING: &str = "\
请你用简短的语言总结并结束这个对话。
**请注意，你的语气需要有结束感。**
老师：
";

const SUMMARY: &str = "\
Below is the full transcript of a Mandarin practice conversation, followed
by the learner's per-utterance pronunciation assessment data as JSON.

Transcript:
{transcript}

Pronunciation assessments:
{reports}

Write a short, friendly progress summary for the learner, in English,
regardless of the conversation language. Mention what went well, one or two
concrete things to practise next, and keep an encouraging tone.
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_carry_their_placeholders() {
        let prompts = PromptSet::default();
        assert!(prompts.rubric.contains("{response}"));
        assert!(prompts.conversation.contains("{vocab}"));
        assert!(prompts.conversation.contains("{context}"));
        assert!(prompts.conversation.contains("{topic}"));
        assert!(prompts.summary.contains("{transcript}"));
        assert!(prompts.summary.contains("{reports}"));
    }

    #[test]
    fn rubric_carries_the_weighted_dimensions() {
        let rubric = PromptSet::default().rubric;
        for label in ["词汇量 (占比30%)", "语法准确性 (占比30%)", "表达流畅度 (占比20%)", "理解能力 (占比20%)"] {
            assert!(rubric.contains(label), "missing dimension: {label}");
        }
    }
}
