//! Prompt construction for post generation and editing.

use super::llm::Message;
use anyhow::{bail, Context, Result};
use std::path::Path;

const TOPIC_PLACEHOLDER: &str = "{topic}";
const MAX_CHARS_PLACEHOLDER: &str = "{max_chars}";

const DEFAULT_STYLE_PROMPT: &str = "\
Role: you are an experienced content manager and copywriter for a Telegram channel about \
health, sport and nutrition. You know how to format text for Telegram so that it catches \
the eye and keeps readers engaged.

Today's topic: {topic}

Format:
- No preamble, start directly with a bold headline.
- Bold for headings, italics for motivation and emphasis.
- Emoji sparingly and only where they fit.
- Topical #hashtags at the end.

Structure:
1. Hook: a question, a fact, a pain point or a comparison.
2. Why it matters: benefits with concrete examples, as a bulleted list.
3. When and how: instructions and frequency, as a numbered list.
4. How much: amounts by body weight and activity level, with example foods.
5. Myths and mistakes: debunk common misconceptions, with humour.
6. Takeaway: short summary, a call to action and a question to the audience.

Style: conversational and lively, short sentences, clear images, a fair amount of humour, \
at most {max_chars} characters including spaces (strict).";

/// Builds the chat messages sent to the language model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    style_template: String,
    max_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_chars: usize) -> Self {
        Self {
            style_template: DEFAULT_STYLE_PROMPT.to_string(),
            max_chars,
        }
    }

    /// Use a custom style template. It must contain the `{topic}` placeholder.
    pub fn with_template(template: String, max_chars: usize) -> Result<Self> {
        if !template.contains(TOPIC_PLACEHOLDER) {
            bail!("Style prompt must contain the {} placeholder", TOPIC_PLACEHOLDER);
        }
        Ok(Self {
            style_template: template,
            max_chars,
        })
    }

    pub fn from_file(path: &Path, max_chars: usize) -> Result<Self> {
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read style prompt: {:?}", path))?;
        Self::with_template(template, max_chars)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Messages for a fresh post. Feedback, when given, leads the prompt.
    pub fn generation_messages(&self, topic: &str, feedback: Option<&str>) -> Vec<Message> {
        let style = self
            .style_template
            .replace(TOPIC_PLACEHOLDER, topic)
            .replace(MAX_CHARS_PLACEHOLDER, &self.max_chars.to_string());

        let prompt = match feedback.map(str::trim).filter(|f| !f.is_empty()) {
            Some(feedback) => format!("USER FEEDBACK (HIGH PRIORITY):\n{}\n\n{}", feedback, style),
            None => style,
        };

        vec![
            Message::system(format!(
                "Professional fitness copywriter. Write at most {} characters including spaces.",
                self.max_chars
            )),
            Message::user(prompt),
        ]
    }

    /// Messages asking for a targeted revision of `text`.
    pub fn edit_messages(&self, text: &str, feedback: &str, topic: &str) -> Vec<Message> {
        let prompt = format!(
            "You are a professional fitness content editor. Revise the post below, following \
             the editor's instructions exactly while keeping its structure and style.\n\n\
             Topic: {topic}\n\
             Editor's instructions: {feedback}\n\n\
             Post:\n{text}\n\n\
             Rules:\n\
             1. Apply every requested change and nothing else.\n\
             2. Keep the original structure, tone and length.\n\
             3. Stay within {max_chars} characters.\n\
             4. Keep the Markdown formatting (bold, italics, lists).\n\
             5. Do not add new sections unless asked.",
            topic = topic,
            feedback = feedback,
            text = text,
            max_chars = self.max_chars,
        );

        vec![
            Message::system("Professional editor for fitness content"),
            Message::user(prompt),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::llm::MessageRole;
    use std::io::Write;

    #[test]
    fn test_generation_prompt_embeds_topic_and_limit() {
        let builder = PromptBuilder::new(950);
        let messages = builder.generation_messages("Protein", None);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("950"));
        assert!(messages[1].content.contains("Today's topic: Protein"));
        assert!(messages[1].content.contains("at most 950 characters"));
        assert!(!messages[1].content.contains("USER FEEDBACK"));
    }

    #[test]
    fn test_feedback_is_prepended_with_priority() {
        let builder = PromptBuilder::new(950);
        let messages = builder.generation_messages("Protein", Some("more humour"));

        assert!(messages[1]
            .content
            .starts_with("USER FEEDBACK (HIGH PRIORITY):\nmore humour\n\n"));
    }

    #[test]
    fn test_blank_feedback_is_ignored() {
        let builder = PromptBuilder::new(950);
        let messages = builder.generation_messages("Protein", Some("   "));
        assert!(!messages[1].content.contains("USER FEEDBACK"));
    }

    #[test]
    fn test_edit_prompt_contains_text_feedback_and_topic() {
        let builder = PromptBuilder::new(800);
        let messages = builder.edit_messages("Post X", "make it shorter", "Sleep");

        let prompt = &messages[1].content;
        assert!(prompt.contains("Topic: Sleep"));
        assert!(prompt.contains("Editor's instructions: make it shorter"));
        assert!(prompt.contains("Post:\nPost X"));
        assert!(prompt.contains("800 characters"));
    }

    #[test]
    fn test_custom_template_requires_topic_placeholder() {
        assert!(PromptBuilder::with_template("Write a post".to_string(), 950).is_err());

        let builder =
            PromptBuilder::with_template("Post about {topic} in {max_chars} chars".to_string(), 500)
                .unwrap();
        let messages = builder.generation_messages("Sleep", None);
        assert_eq!(messages[1].content, "Post about Sleep in 500 chars");
    }

    #[test]
    fn test_template_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Daily post: {{topic}}").unwrap();

        let builder = PromptBuilder::from_file(file.path(), 950).unwrap();
        let messages = builder.generation_messages("Hydration", None);
        assert_eq!(messages[1].content, "Daily post: Hydration");
    }
}
