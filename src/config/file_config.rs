use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub approver_id: Option<i64>,
    pub image_root: Option<String>,
    pub audit_log_path: Option<String>,

    // Collaborators
    pub telegram: Option<TelegramConfig>,
    pub openai: Option<OpenAiConfig>,
    pub sheets: Option<SheetsConfig>,

    // Workflow tuning
    pub approval: Option<ApprovalConfig>,
    pub generation: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    /// Token of the bot talking to the approver.
    pub bot_token: Option<String>,
    /// Token of the bot allowed to post in the channel.
    pub publisher_token: Option<String>,
    /// Channel id (`-100...`) or public `@username`.
    pub channel_id: Option<String>,
    pub api_base_url: Option<String>,
    pub poll_timeout_secs: Option<u64>,
    /// `Markdown`, `MarkdownV2`, `HTML`, or empty for plain text.
    pub parse_mode: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Shell command printing the API key, run before each request.
    pub api_key_command: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub range: Option<String>,
    pub date_format: Option<String>,
    pub credentials_path: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ApprovalConfig {
    pub timeout_secs: Option<u64>,
    pub reaper_interval_secs: Option<u64>,
    pub reaper_retry_secs: Option<u64>,
    pub lock_wait_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_chars: Option<usize>,
    /// Text file holding the style prompt, with a `{topic}` placeholder.
    pub style_prompt_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            approver_id = 123456
            image_root = "/srv/postbot/images"

            [telegram]
            bot_token = "bot-token"
            publisher_token = "publisher-token"
            channel_id = "@healthy_daily"
            parse_mode = "HTML"

            [openai]
            model = "gpt-4o-mini"
            api_key_command = "pass show openai"

            [sheets]
            spreadsheet_id = "sheet-1"
            range = "Plan!A:B"

            [approval]
            timeout_secs = 900
        "#;

        let config: FileConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.approver_id, Some(123456));
        assert_eq!(config.image_root.as_deref(), Some("/srv/postbot/images"));
        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.channel_id.as_deref(), Some("@healthy_daily"));
        assert_eq!(telegram.parse_mode.as_deref(), Some("HTML"));
        assert!(telegram.api_base_url.is_none());
        let openai = config.openai.unwrap();
        assert_eq!(openai.api_key_command.as_deref(), Some("pass show openai"));
        assert_eq!(config.sheets.unwrap().range.as_deref(), Some("Plan!A:B"));
        let approval = config.approval.unwrap();
        assert_eq!(approval.timeout_secs, Some(900));
        assert!(approval.reaper_interval_secs.is_none());
        assert!(config.generation.is_none());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.approver_id.is_none());
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "approver_id = \"not a number\"").unwrap();

        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/postbot.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
