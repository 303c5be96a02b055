mod file_config;

pub use file_config::{
    ApprovalConfig, FileConfig, GenerationConfig, OpenAiConfig, SheetsConfig, TelegramConfig,
};

use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub image_root: Option<PathBuf>,
    pub audit_log: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub approver_id: i64,
    pub image_root: PathBuf,
    pub audit_log_path: PathBuf,

    pub telegram: TelegramSettings,
    pub openai: OpenAiSettings,
    pub sheets: SheetsSettings,
    pub approval: ApprovalSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub publisher_token: String,
    pub channel_id: String,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub parse_mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub range: String,
    pub date_format: String,
    pub credentials_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ApprovalSettings {
    pub timeout: Duration,
    pub reaper_interval: Duration,
    pub reaper_retry: Duration,
    pub lock_wait: Duration,
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            reaper_interval: Duration::from_secs(300),
            reaper_retry: Duration::from_secs(60),
            lock_wait: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_chars: usize,
    pub style_prompt_path: Option<PathBuf>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_chars: 950,
            style_prompt_path: None,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let approver_id = file
            .approver_id
            .ok_or_else(|| anyhow!("approver_id must be specified in config file"))?;

        let image_root = file
            .image_root
            .map(PathBuf::from)
            .or_else(|| cli.image_root.clone())
            .unwrap_or_else(|| PathBuf::from("images"));

        let audit_log_path = file
            .audit_log_path
            .map(PathBuf::from)
            .or_else(|| cli.audit_log.clone())
            .unwrap_or_else(|| PathBuf::from("bot_audit.log"));

        let tg = file.telegram.unwrap_or_default();
        let telegram = TelegramSettings {
            bot_token: required(tg.bot_token, "telegram.bot_token")?,
            publisher_token: required(tg.publisher_token, "telegram.publisher_token")?,
            channel_id: required(tg.channel_id, "telegram.channel_id")?,
            api_base_url: tg
                .api_base_url
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string()),
            poll_timeout_secs: tg.poll_timeout_secs.unwrap_or(30),
            parse_mode: match tg.parse_mode {
                Some(mode) if mode.trim().is_empty() => None,
                Some(mode) => Some(mode),
                None => Some("Markdown".to_string()),
            },
        };

        let ai = file.openai.unwrap_or_default();
        if ai.api_key.is_some() && ai.api_key_command.is_some() {
            bail!("openai.api_key and openai.api_key_command are mutually exclusive");
        }
        let openai = OpenAiSettings {
            base_url: ai
                .base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: ai.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: ai.api_key,
            api_key_command: ai.api_key_command,
            timeout: Duration::from_secs(ai.timeout_secs.unwrap_or(120)),
        };

        let sh = file.sheets.unwrap_or_default();
        let sheets = SheetsSettings {
            spreadsheet_id: required(sh.spreadsheet_id, "sheets.spreadsheet_id")?,
            range: sh.range.unwrap_or_else(|| "A:B".to_string()),
            date_format: sh.date_format.unwrap_or_else(|| "%m/%d/%Y".to_string()),
            credentials_path: sh
                .credentials_path
                .map(PathBuf::from)
                .or_else(|| cli.credentials.clone())
                .unwrap_or_else(|| PathBuf::from("credentials.json")),
        };

        let ap = file.approval.unwrap_or_default();
        let defaults = ApprovalSettings::default();
        let approval = ApprovalSettings {
            timeout: secs_or(ap.timeout_secs, defaults.timeout),
            reaper_interval: secs_or(ap.reaper_interval_secs, defaults.reaper_interval),
            reaper_retry: secs_or(ap.reaper_retry_secs, defaults.reaper_retry),
            lock_wait: secs_or(ap.lock_wait_secs, defaults.lock_wait),
        };
        if approval.reaper_interval.is_zero() {
            bail!("approval.reaper_interval_secs must be greater than zero");
        }

        let gf = file.generation.unwrap_or_default();
        let generation = GenerationSettings {
            max_chars: gf.max_chars.unwrap_or(950),
            style_prompt_path: gf.style_prompt_path.map(PathBuf::from),
        };

        Ok(Self {
            approver_id,
            image_root,
            audit_log_path,
            telegram,
            openai,
            sheets,
            approval,
            generation,
        })
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(anyhow!("{} must be specified in config file", key)),
    }
}

fn secs_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}
