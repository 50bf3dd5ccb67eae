use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use content_model::Settings;

use crate::rotation::ManualNavPolicy;
use crate::tasks::manager::EngineOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// YAML document holding products, categories, announcements and settings.
    pub content_path: PathBuf,
    /// Watch the content file and re-aggregate when a section changes.
    pub watch_content: bool,
    /// Display settings used when the store has none or cannot be read.
    pub defaults: Settings,
    /// How long fetched settings are reused before asking the store again.
    #[serde(with = "humantime_serde")]
    pub settings_cache_ttl: Duration,
    /// Restart the auto-advance countdown on every manual navigation.
    pub reset_timer_on_manual_nav: bool,
    /// Delay before retrying after a source failed to answer.
    #[serde(with = "humantime_serde")]
    pub retry_after: Duration,
    /// How long navigation controls stay visible after manual input.
    #[serde(with = "humantime_serde")]
    pub controls_hide_after: Duration,
    /// Capacity of the engine's command mailbox.
    pub command_queue: usize,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        let mut cfg: Self = serde_yaml::from_str(&s)?;
        if cfg.content_path.is_relative() {
            if let Some(dir) = path.parent() {
                cfg.content_path = dir.join(&cfg.content_path);
            }
        }
        Ok(cfg)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.defaults
            .validate()
            .context("invalid defaults section")?;
        ensure!(
            !self.retry_after.is_zero(),
            "retry-after must be greater than zero"
        );
        ensure!(
            self.command_queue > 0,
            "command-queue must be greater than zero"
        );
        ensure!(
            !self.content_path.as_os_str().is_empty(),
            "content-path must not be empty"
        );
        Ok(self)
    }

    pub fn engine_options(&self, now_override: Option<DateTime<Utc>>) -> EngineOptions {
        EngineOptions {
            initial_settings: self.defaults,
            manual_nav: ManualNavPolicy::from_reset_flag(self.reset_timer_on_manual_nav),
            retry_after: self.retry_after,
            now_override,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            content_path: PathBuf::from("content.yaml"),
            watch_content: true,
            defaults: Settings::default(),
            settings_cache_ttl: Duration::from_secs(60),
            reset_timer_on_manual_nav: false,
            retry_after: Duration::from_secs(30),
            controls_hide_after: Duration::from_secs(5),
            command_queue: 16,
        }
    }
}
