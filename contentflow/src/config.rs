//! Application configuration.
//!
//! [`AppConfig`] is built once at start-up, either from the environment or
//! from a JSON file, and handed to the orchestrator and every adapter. Nothing
//! below this module reads the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::pipeline::RetryPolicy;

/// Which implementation backs a generation or QA capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP API.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Deterministic local stub.
    #[serde(rename = "stub")]
    Stub,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Stub => write!(f, "stub"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "stub" => Ok(Self::Stub),
            other => Err(format!("unsupported provider '{other}' (expected openai|stub)")),
        }
    }
}

/// Whether publishers talk to the real platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherMode {
    /// Post to Telegram and VK.
    Live,
    /// Log what would be posted.
    #[default]
    DryRun,
}

impl fmt::Display for PublisherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::DryRun => write!(f, "dry_run"),
        }
    }
}

impl FromStr for PublisherMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "live" => Ok(Self::Live),
            "dry_run" | "dryrun" => Ok(Self::DryRun),
            other => Err(format!("unsupported publisher mode '{other}' (expected live|dry_run)")),
        }
    }
}

/// OpenAI API settings shared by the article, image and QA adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Chat model used for articles.
    #[serde(default = "default_article_model")]
    pub article_model: String,
    /// Image model.
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Chat model used for QA.
    #[serde(default = "default_qa_model")]
    pub qa_model: String,
    /// Image size, e.g. `1024x1024`.
    #[serde(default = "default_image_size")]
    pub image_size: String,
    /// Image quality, e.g. `standard`.
    #[serde(default = "default_image_quality")]
    pub image_quality: String,
    /// Sampling temperature for articles.
    #[serde(default = "default_article_temperature")]
    pub article_temperature: f32,
    /// Token cap for articles.
    #[serde(default = "default_article_max_tokens")]
    pub article_max_tokens: u32,
    /// Sampling temperature for QA.
    #[serde(default = "default_qa_temperature")]
    pub qa_temperature: f32,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_article_model() -> String {
    "gpt-4.1".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_qa_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_image_quality() -> String {
    "standard".to_string()
}

fn default_article_temperature() -> f32 {
    0.7
}

fn default_article_max_tokens() -> u32 {
    1200
}

fn default_qa_temperature() -> f32 {
    0.2
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            article_model: default_article_model(),
            image_model: default_image_model(),
            qa_model: default_qa_model(),
            image_size: default_image_size(),
            image_quality: default_image_quality(),
            article_temperature: default_article_temperature(),
            article_max_tokens: default_article_max_tokens(),
            qa_temperature: default_qa_temperature(),
        }
    }
}

/// Provider selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Article provider.
    #[serde(default)]
    pub article: ProviderKind,
    /// Image provider.
    #[serde(default)]
    pub image: ProviderKind,
    /// QA provider.
    #[serde(default)]
    pub qa: ProviderKind,
    /// Publisher mode.
    #[serde(default)]
    pub publisher: PublisherMode,
}

impl ProviderConfig {
    /// Selects the stub for every provider and dry-run publishing.
    #[must_use]
    pub fn stubbed() -> Self {
        Self {
            article: ProviderKind::Stub,
            image: ProviderKind::Stub,
            qa: ProviderKind::Stub,
            publisher: PublisherMode::DryRun,
        }
    }
}

/// Upper bounds for external calls, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Article generation.
    #[serde(default = "default_generation_timeout")]
    pub article_seconds: u64,
    /// Image generation.
    #[serde(default = "default_generation_timeout")]
    pub image_seconds: u64,
    /// Each QA call.
    #[serde(default = "default_qa_timeout")]
    pub qa_seconds: u64,
    /// One platform publish (text post plus attachments).
    #[serde(default = "default_publish_timeout")]
    pub publish_seconds: u64,
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_qa_timeout() -> u64 {
    90
}

fn default_publish_timeout() -> u64 {
    60
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            article_seconds: default_generation_timeout(),
            image_seconds: default_generation_timeout(),
            qa_seconds: default_qa_timeout(),
            publish_seconds: default_publish_timeout(),
        }
    }
}

impl TimeoutConfig {
    /// Article generation bound.
    #[must_use]
    pub fn article(&self) -> Duration {
        Duration::from_secs(self.article_seconds)
    }

    /// Image generation bound.
    #[must_use]
    pub fn image(&self) -> Duration {
        Duration::from_secs(self.image_seconds)
    }

    /// QA call bound.
    #[must_use]
    pub fn qa(&self) -> Duration {
        Duration::from_secs(self.qa_seconds)
    }

    /// Publish bound.
    #[must_use]
    pub fn publish(&self) -> Duration {
        Duration::from_secs(self.publish_seconds)
    }
}

/// QA gate policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaGateConfig {
    /// Minimum passing score on the 0–10 scale.
    #[serde(default = "default_qa_threshold")]
    pub threshold: f64,
    /// Characters of article text sent to QA.
    #[serde(default = "default_article_excerpt_chars")]
    pub article_excerpt_chars: usize,
    /// Image references sent to QA.
    #[serde(default = "default_image_list_limit")]
    pub image_list_limit: usize,
}

fn default_qa_threshold() -> f64 {
    5.0
}

fn default_article_excerpt_chars() -> usize {
    3000
}

fn default_image_list_limit() -> usize {
    5
}

impl Default for QaGateConfig {
    fn default() -> Self {
        Self {
            threshold: default_qa_threshold(),
            article_excerpt_chars: default_article_excerpt_chars(),
            image_list_limit: default_image_list_limit(),
        }
    }
}

/// Defaults applied to records that carry no generation overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Article tone.
    #[serde(default = "default_style")]
    pub style: String,
    /// Platform hint given to the article writer.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Article length hint.
    #[serde(default = "default_length")]
    pub length: String,
    /// Characters of article text used as image-generation context.
    #[serde(default = "default_image_context_chars")]
    pub image_context_chars: usize,
}

fn default_style() -> String {
    "informative".to_string()
}

fn default_platform() -> String {
    "telegram".to_string()
}

fn default_length() -> String {
    "medium".to_string()
}

fn default_image_context_chars() -> usize {
    1500
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            style: default_style(),
            platform: default_platform(),
            length: default_length(),
            image_context_chars: default_image_context_chars(),
        }
    }
}

/// Retry policy for the full-pipeline composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeRetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Fixed delay between attempts.
    #[serde(default = "default_retry_delay_seconds")]
    pub delay_seconds: u64,
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_delay_seconds() -> u64 {
    60
}

impl Default for CompositeRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_seconds: default_retry_delay_seconds(),
        }
    }
}

impl CompositeRetryConfig {
    /// The fixed-delay policy these settings describe.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_secs(self.delay_seconds))
    }
}

/// Periodic sweep and worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minutes between batch sweeps.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Concurrent task workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_workers() -> usize {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            workers: default_workers(),
        }
    }
}

impl SchedulerConfig {
    /// Sweep interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token. Never serialized.
    #[serde(default, skip_serializing)]
    pub bot_token: Option<String>,
    /// Channel username or chat id.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Bot API base URL.
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            api_base: default_telegram_api_base(),
        }
    }
}

/// VK API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VkConfig {
    /// Community access token. Never serialized.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    /// Numeric community id, without the leading minus.
    #[serde(default)]
    pub group_id: Option<String>,
    /// API version sent with every call.
    #[serde(default = "default_vk_api_version")]
    pub api_version: String,
    /// Method endpoint base URL.
    #[serde(default = "default_vk_api_base")]
    pub api_base: String,
}

fn default_vk_api_version() -> String {
    "5.131".to_string()
}

fn default_vk_api_base() -> String {
    "https://api.vk.com/method".to_string()
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            group_id: None,
            api_version: default_vk_api_version(),
            api_base: default_vk_api_base(),
        }
    }
}

/// Publish behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Skip a platform whose posted flag is already set.
    #[serde(default = "default_skip_already_posted")]
    pub skip_already_posted: bool,
}

fn default_skip_already_posted() -> bool {
    true
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            skip_already_posted: default_skip_already_posted(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenAI settings.
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Provider selection.
    #[serde(default)]
    pub providers: ProviderConfig,
    /// External call bounds.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// QA gate policy.
    #[serde(default)]
    pub qa_gate: QaGateConfig,
    /// Generation defaults.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Composite retry policy.
    #[serde(default)]
    pub retry: CompositeRetryConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Telegram settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// VK settings.
    #[serde(default)]
    pub vk: VkConfig,
    /// Publish behaviour.
    #[serde(default)]
    pub publish: PublishConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// Creates a configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration wired to stub providers and dry-run publishing.
    #[must_use]
    pub fn stubbed() -> Self {
        Self {
            providers: ProviderConfig::stubbed(),
            ..Self::default()
        }
    }

    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from a key lookup, starting from defaults.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.openai.api_key = get("OPENAI_API_KEY");
        if let Some(v) = get("OPENAI_ARTICLE_MODEL") {
            config.openai.article_model = v;
        }
        if let Some(v) = get("OPENAI_IMAGE_MODEL") {
            config.openai.image_model = v;
        }
        if let Some(v) = get("OPENAI_QA_MODEL") {
            config.openai.qa_model = v;
        }
        if let Some(v) = get("IMAGE_SIZE") {
            config.openai.image_size = v;
        }
        if let Some(v) = get("IMAGE_QUALITY") {
            config.openai.image_quality = v;
        }

        if let Some(v) = parse_var(&get, "ARTICLE_PROVIDER")? {
            config.providers.article = v;
        }
        if let Some(v) = parse_var(&get, "IMAGE_PROVIDER")? {
            config.providers.image = v;
        }
        if let Some(v) = parse_var(&get, "QA_PROVIDER")? {
            config.providers.qa = v;
        }
        if let Some(v) = parse_var(&get, "PUBLISHER_MODE")? {
            config.providers.publisher = v;
        }

        if let Some(v) = parse_var(&get, "QA_TIMEOUT")? {
            config.timeouts.qa_seconds = v;
        }
        if let Some(v) = parse_var(&get, "SCHEDULER_INTERVAL_MINUTES")? {
            config.scheduler.interval_minutes = v;
        }
        if let Some(v) = parse_var(&get, "WORKERS")? {
            config.scheduler.workers = v;
        }
        if let Some(v) = parse_var(&get, "PIPELINE_MAX_ATTEMPTS")? {
            config.retry.max_attempts = v;
        }
        if let Some(v) = parse_var(&get, "PIPELINE_RETRY_DELAY_SECONDS")? {
            config.retry.delay_seconds = v;
        }

        config.telegram.bot_token = get("BOT_TOKEN");
        config.telegram.channel_id = get("TELEGRAM_CHANNEL_ID");
        config.vk.access_token = get("VK_ACCESS_TOKEN");
        config.vk.group_id = get("VK_GROUP_ID");

        if let Some(v) = get("LOG_LEVEL") {
            config.log.level = v.to_ascii_lowercase();
        }
        if let Some(v) = get("LOG_JSON") {
            config.log.json = parse_bool("LOG_JSON", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.scheduler.interval_minutes == 0 {
            return Err(ConfigError::invalid(
                "scheduler.interval_minutes",
                "must be at least 1",
            ));
        }
        if self.scheduler.workers == 0 {
            return Err(ConfigError::invalid("scheduler.workers", "must be at least 1"));
        }
        if !(0.0..=10.0).contains(&self.qa_gate.threshold) {
            return Err(ConfigError::invalid(
                "qa_gate.threshold",
                format!("{} is outside 0-10", self.qa_gate.threshold),
            ));
        }
        if self.providers.publisher == PublisherMode::Live {
            let telegram = [
                ("BOT_TOKEN", &self.telegram.bot_token),
                ("TELEGRAM_CHANNEL_ID", &self.telegram.channel_id),
            ];
            let vk = [
                ("VK_ACCESS_TOKEN", &self.vk.access_token),
                ("VK_GROUP_ID", &self.vk.group_id),
            ];
            for (key, value) in telegram.iter().chain(vk.iter()) {
                if value.is_none() {
                    return Err(ConfigError::invalid(*key, "required when PUBLISHER_MODE=live"));
                }
            }
        }
        Ok(())
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(key, e.to_string()))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("'{other}' is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.timeouts.article(), Duration::from_secs(120));
        assert_eq!(config.timeouts.image(), Duration::from_secs(120));
        assert_eq!(config.timeouts.qa(), Duration::from_secs(90));
        assert_eq!(config.timeouts.publish(), Duration::from_secs(60));
        assert!((config.qa_gate.threshold - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.qa_gate.article_excerpt_chars, 3000);
        assert_eq!(config.qa_gate.image_list_limit, 5);
        assert_eq!(config.generation.image_context_chars, 1500);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_seconds, 60);
        assert_eq!(config.scheduler.interval(), Duration::from_secs(3600));
        assert_eq!(config.vk.api_version, "5.131");
        assert!(config.publish.skip_already_posted);
        assert_eq!(config.providers.article, ProviderKind::OpenAi);
        assert_eq!(config.providers.publisher, PublisherMode::DryRun);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("QA_PROVIDER", "stub"),
            ("IMAGE_PROVIDER", "STUB"),
            ("QA_TIMEOUT", "30"),
            ("IMAGE_SIZE", "512x512"),
            ("SCHEDULER_INTERVAL_MINUTES", "5"),
            ("PIPELINE_MAX_ATTEMPTS", "4"),
            ("LOG_JSON", "true"),
            ("LOG_LEVEL", "DEBUG"),
        ]))
        .unwrap();

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.providers.qa, ProviderKind::Stub);
        assert_eq!(config.providers.image, ProviderKind::Stub);
        assert_eq!(config.providers.article, ProviderKind::OpenAi);
        assert_eq!(config.timeouts.qa_seconds, 30);
        assert_eq!(config.openai.image_size, "512x512");
        assert_eq!(config.scheduler.interval_minutes, 5);
        assert_eq!(config.retry.max_attempts, 4);
        assert!(config.log.json);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = AppConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("QA_PROVIDER", "anthropic")])).unwrap_err();
        assert!(err.to_string().contains("QA_PROVIDER"));

        let err = AppConfig::from_lookup(lookup(&[("QA_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.to_string().contains("QA_TIMEOUT"));

        let err = AppConfig::from_lookup(lookup(&[("LOG_JSON", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("LOG_JSON"));
    }

    #[test]
    fn test_live_mode_requires_credentials() {
        let err = AppConfig::from_lookup(lookup(&[("PUBLISHER_MODE", "live")])).unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));

        let config = AppConfig::from_lookup(lookup(&[
            ("PUBLISHER_MODE", "live"),
            ("BOT_TOKEN", "t"),
            ("TELEGRAM_CHANNEL_ID", "@chan"),
            ("VK_ACCESS_TOKEN", "v"),
            ("VK_GROUP_ID", "123"),
        ]))
        .unwrap();
        assert_eq!(config.providers.publisher, PublisherMode::Live);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.qa_gate.threshold = 11.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_section_maps_to_fixed_policy() {
        let policy = CompositeRetryConfig::default().policy();
        assert_eq!(policy, RetryPolicy::fixed(3, Duration::from_secs(60)));

        let config = AppConfig::from_lookup(lookup(&[
            ("PIPELINE_MAX_ATTEMPTS", "5"),
            ("PIPELINE_RETRY_DELAY_SECONDS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.retry.policy(), RetryPolicy::fixed(5, Duration::from_secs(10)));
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"providers": {{"article": "stub", "qa": "stub"}}, "qa_gate": {{"threshold": 6.5}}}}"#
        )
        .unwrap();

        let config = AppConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.providers.article, ProviderKind::Stub);
        assert_eq!(config.providers.image, ProviderKind::OpenAi);
        assert!((config.qa_gate.threshold - 6.5).abs() < f64::EPSILON);
        assert_eq!(config.timeouts.qa_seconds, 90);
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = AppConfig::stubbed();
        config.openai.api_key = Some("sk-secret".to_string());
        config.telegram.bot_token = Some("bot-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
