//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::{Deserialize, Deserializer};

use super::types::Res;

/// Default TTL for cached guild, channel and user lookups.
fn default_cache_ttl_secs() -> u64 {
    5
}

/// Default TTL for the activity tracker's opt-in decisions.
fn default_opt_in_ttl_secs() -> u64 {
    5
}

/// Default time budget for handling a single event.
fn default_event_timeout_secs() -> u64 {
    5
}

/// Default name of the channel voice activity is written to.
fn default_activity_log_channel() -> String {
    "activity_log".to_string()
}

/// Default role users must hold to have their voice activity logged.
fn default_tracking_role() -> Option<String> {
    Some("Tracked".to_string())
}

/// A blank tracking role means "no role", since neither TOML nor env vars have a null.
fn deserialize_tracking_role<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let role = Option::<String>::deserialize(deserializer)?;

    Ok(role.filter(|role| !role.trim().is_empty()))
}

/// Default reaction added to a message a listener failed on.
fn default_failure_emoji() -> String {
    "🤯".to_string()
}

/// Configuration for the herald-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Discord bot token (`DISCORD_BOT_TOKEN`).
    pub discord_bot_token: String,
    /// Seconds a resolved guild, channel or user stays cached (`CACHE_TTL_SECS`).
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Seconds an activity opt-in decision stays cached (`OPT_IN_TTL_SECS`).
    #[serde(default = "default_opt_in_ttl_secs")]
    pub opt_in_ttl_secs: u64,
    /// Seconds a single event may take before it is abandoned (`EVENT_TIMEOUT_SECS`).
    #[serde(default = "default_event_timeout_secs")]
    pub event_timeout_secs: u64,
    /// Name of the per-guild channel voice activity is written to (`ACTIVITY_LOG_CHANNEL`).
    #[serde(default = "default_activity_log_channel")]
    pub activity_log_channel: String,
    /// Role that opts a user into activity logging (`TRACKING_ROLE`).
    /// Set it to an empty string to track every user.
    #[serde(default = "default_tracking_role", deserialize_with = "deserialize_tracking_role")]
    pub tracking_role: Option<String>,
    /// Reaction added when any listener fails on a message (`FAILURE_EMOJI`).
    #[serde(default = "default_failure_emoji")]
    pub failure_emoji: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            discord_bot_token: String::new(),
            cache_ttl_secs: default_cache_ttl_secs(),
            opt_in_ttl_secs: default_opt_in_ttl_secs(),
            event_timeout_secs: default_event_timeout_secs(),
            activity_log_channel: default_activity_log_channel(),
            tracking_role: default_tracking_role(),
            failure_emoji: default_failure_emoji(),
        }
    }
}

impl ConfigInner {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn opt_in_ttl(&self) -> Duration {
        Duration::from_secs(self.opt_in_ttl_secs)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_secs(self.event_timeout_secs)
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("HERALD_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    pub fn validate(&self) -> Res<()> {
        if self.discord_bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("Discord bot token must be set."));
        }

        if self.cache_ttl_secs == 0 || self.opt_in_ttl_secs == 0 {
            return Err(anyhow::anyhow!("Cache TTLs must be at least one second."));
        }

        if self.event_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Event timeout must be at least one second."));
        }

        if self.activity_log_channel.is_empty() {
            return Err(anyhow::anyhow!("Activity log channel name must not be empty."));
        }

        Ok(())
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

// Tests.
