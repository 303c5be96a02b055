//! Texts sent to the approver.

pub const START_HELP: &str = "Bot activated! Use /generate to create new post";
pub const START_DENIED: &str = "⛔ Access Denied";
pub const GENERATE_DENIED: &str = "🚫 You are not authorized to use this command.";
pub const CALLBACK_DENIED: &str = "🚫 You are not authorized!";
pub const NO_ACTIVE_SESSION: &str = "❌ No active approval session!";
pub const ACTION_UNAVAILABLE: &str = "This action is not available right now.";
pub const UNKNOWN_ACTION: &str = "Unknown action";

pub const GENERATION_STARTED: &str = "⚙️ Starting content generation...";
pub const NO_IMAGE_TODAY: &str = "⚠️ No image found for today!";
pub const DRAFT_DISCARDED: &str = "⚠️ A previous draft was pending; it has been discarded.";
pub const TEXT_APPROVED: &str = "Text approved! Processing image...";
pub const IMAGE_CAPTION: &str = "Today's image for the post";
pub const IMAGE_SEND_FAILED: &str = "⚠️ Failed to send image. Press Retry image to try again.";
pub const AWAITING_FEEDBACK: &str = "Awaiting your feedback...";
pub const EDITING: &str = "🔄 Editing text based on your feedback...";
pub const EDIT_DROPPED: &str = "⚠️ Text was approved while editing. The edit was discarded.";
pub const IMAGE_APPROVED: &str = "Image approved! Publishing to channel...";
pub const PUBLISHED: &str = "✅ Post published successfully!";
pub const PUBLISH_FAILED: &str = "⚠️ Failed to publish post.";
pub const CANCELLED_ANSWER: &str = "Approval cancelled!";
pub const CANCELLED: &str = "❌ Post approval cancelled.";

/// Longest error text carried by a notice, in characters.
pub const MAX_ERROR_CHARS: usize = 200;

pub fn generated_text(text: &str) -> String {
    format!("**Generated Text:**\n\n{}", text)
}

pub fn edited_text(text: &str) -> String {
    format!("**Edited Text:**\n\n{}", text)
}

pub fn current_text(text: &str) -> String {
    format!("**Current Text:**\n\n{}", text)
}

pub fn edit_prompt(text: &str) -> String {
    format!(
        "**Current Text:**\n\n{}\n\n✏️ **Describe what to change:**",
        text
    )
}

/// A failure notice: `⚠️ <context>: <error>`, with the error text cut short.
pub fn warning(context: &str, error: &impl std::fmt::Display) -> String {
    let error = error.to_string();
    let truncated: String = error.chars().take(MAX_ERROR_CHARS).collect();
    format!("⚠️ {}: {}", context, truncated)
}
