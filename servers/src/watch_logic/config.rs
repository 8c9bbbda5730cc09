use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use lib_watch::configs::{CollectionConfig, WatchConfig};
use lib_watch::core::RecentSettings;
use lib_watch::ingestors::PushConfig;
use lib_watch::stackexchange::apicall::{API_BASE_URL, DEFAULT_API_KEY};

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "StackExchange watched-tag question tracker", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "STACKWATCH_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "STACKWATCH_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "STACKWATCH_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "STACKWATCH_API_URL", help = "Base URL of the StackExchange REST API.")]
    pub api_url: Option<String>,

    #[clap(long, env = "STACKWATCH_API_KEY", help = "StackExchange application key.")]
    pub api_key: Option<String>,

    #[clap(long, env = "STACKWATCH_PUSH_URL", help = "StackExchange question websocket URL.")]
    pub push_url: Option<String>,

    #[clap(long, env = "STACKWATCH_LIMIT", help = "Maximum number of watched questions per recent collection (1-100).")]
    pub limit: Option<usize>,

    #[clap(long, env = "STACKWATCH_RECENT_POLL_SECONDS", help = "Refresh interval of recent collections in seconds.")]
    pub recent_poll_seconds: Option<u64>,

    #[clap(long, env = "STACKWATCH_BOUNTY_POLL_SECONDS", help = "Refresh interval of bounty collections in seconds.")]
    pub bounty_poll_seconds: Option<u64>,

    #[clap(long, env = "STACKWATCH_TAG_REFRESH_SECONDS", help = "Minimum time between two tag listings in seconds.")]
    pub tag_refresh_seconds: Option<u64>,

    #[clap(long, env = "STACKWATCH_TAG_WINDOW_DAYS", help = "How many days back a tag listing reaches.")]
    pub tag_window_days: Option<u64>,

    #[clap(long, env = "STACKWATCH_NOTIFY", help = "Send desktop notifications through notify-send (true/false).")]
    pub notify: Option<bool>,

    /// Only read from the configuration file.
    #[clap(skip)]
    pub collections: Option<Vec<CollectionConfig>>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            api_url: other.api_url.or(self.api_url),
            api_key: other.api_key.or(self.api_key),
            push_url: other.push_url.or(self.push_url),
            limit: other.limit.or(self.limit),
            recent_poll_seconds: other.recent_poll_seconds.or(self.recent_poll_seconds),
            bounty_poll_seconds: other.bounty_poll_seconds.or(self.bounty_poll_seconds),
            tag_refresh_seconds: other.tag_refresh_seconds.or(self.tag_refresh_seconds),
            tag_window_days: other.tag_window_days.or(self.tag_window_days),
            notify: other.notify.or(self.notify),
            collections: other.collections.or(self.collections),
        }
    }

    fn defaults() -> Config {
        let recent = RecentSettings::default();
        Config {
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            api_url: Some(API_BASE_URL.to_string()),
            api_key: Some(DEFAULT_API_KEY.to_string()),
            push_url: Some(PushConfig::default().url),
            limit: Some(recent.limit),
            recent_poll_seconds: Some(60),
            bounty_poll_seconds: Some(15 * 60),
            tag_refresh_seconds: Some(recent.tag_interval.as_secs()),
            tag_window_days: Some(recent.tag_window.as_secs() / (24 * 60 * 60)),
            notify: Some(true),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    pub fn api_url(&self) -> String {
        self.api_url.clone().unwrap_or_else(|| API_BASE_URL.to_string())
    }

    pub fn api_key(&self) -> String {
        self.api_key.clone().unwrap_or_else(|| DEFAULT_API_KEY.to_string())
    }

    pub fn push_config(&self) -> PushConfig {
        let mut push = PushConfig::default();
        if let Some(url) = &self.push_url {
            push.url = url.clone();
        }
        push
    }

    pub fn recent_settings(&self) -> RecentSettings {
        let mut settings = RecentSettings::default();
        if let Some(limit) = self.limit {
            settings.limit = limit;
        }
        if let Some(seconds) = self.tag_refresh_seconds {
            settings.tag_interval = Duration::from_secs(seconds);
        }
        if let Some(days) = self.tag_window_days {
            settings.tag_window = Duration::from_secs(days * 24 * 60 * 60);
        }
        settings
    }

    pub fn recent_interval(&self) -> Duration {
        Duration::from_secs(self.recent_poll_seconds.unwrap_or(60))
    }

    pub fn bounty_interval(&self) -> Duration {
        Duration::from_secs(self.bounty_poll_seconds.unwrap_or(15 * 60))
    }

    pub fn notify_enabled(&self) -> bool {
        self.notify.unwrap_or(true)
    }

    /// The tracked collections, validated. Also checks the limit, which the
    /// engine would otherwise reject with a panic.
    pub fn watch_config(&self) -> anyhow::Result<WatchConfig> {
        let limit = self.limit.unwrap_or(RecentSettings::default().limit);
        if !(1..=lib_watch::stackexchange::MAX_BATCH).contains(&limit) {
            anyhow::bail!("limit {} is outside 1..={}", limit, lib_watch::stackexchange::MAX_BATCH);
        }
        let config = WatchConfig {
            collections: self.collections.clone().unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

pub fn load_config() -> Config {
    // 1. Load defaults
    let default_config = Config::defaults();

    // 2. Load from config file (stackwatch.json) if present.
    //    Allow overriding default config file path with CLI arg.
    let cli_args = Config::parse();

    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("stackwatch.json"));

    let mut current_config = default_config;

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => log::warn!(
                    "Failed to parse config file: {} ({}). Falling back to other sources.",
                    config_file_path.display(),
                    e
                ),
            },
            Err(e) => log::warn!(
                "Failed to read config file: {} ({}). Falling back to other sources.",
                config_file_path.display(),
                e
            ),
        }
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    // 3. Environment variables and CLI arguments win over the file.
    current_config.merge(cli_args)
}
