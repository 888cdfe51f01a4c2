//! Outbound notifications.
//!
//! Delivery is best effort. [`Notifier::notify`] has no error channel: implementations log
//! their own failures and return, so a broken notification backend can never fail a cycle.

#[cfg(feature = "notify_telegram")]
mod telegram;

use async_trait::async_trait;
use serde::Deserialize;
use strum::Display;
use tracing::info;

#[cfg(feature = "notify_telegram")]
pub use telegram::Config as TelegramConfig;
#[cfg(feature = "notify_telegram")]
pub use telegram::TelegramNotifier;

/// Fire-and-forget message sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the name of this notifier for logging
    fn name(&self) -> &str;

    /// Deliver a plain-text message, swallowing any failure
    async fn notify(&self, message: &str);
}

/// Notifier that only writes messages to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, message: &str) {
        info!("Notification: {}", message);
    }
}

/// Notification backend selection
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    /// Write notifications to the log only
    #[default]
    Log,

    /// Send notifications through the Telegram Bot API
    Telegram,
}

/// Which cycle events produce a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Events {
    pub on_known: bool,
    pub on_new_unknown: bool,
    pub on_cycle: bool,
}

impl Default for Events {
    fn default() -> Self {
        Self {
            on_known: true,
            on_new_unknown: false,
            on_cycle: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Configuration for outbound notifications
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channel: Channel,

    /// Notify when a device from the known registry is observed (default: true)
    #[serde(default = "default_true")]
    pub on_known: bool,

    /// Notify when a device is added to the unknown registry (default: false)
    #[serde(default)]
    pub on_new_unknown: bool,

    /// Send a summary after every successful cycle (default: false)
    #[serde(default)]
    pub on_cycle: bool,

    #[cfg(feature = "notify_telegram")]
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: Channel::default(),
            on_known: true,
            on_new_unknown: false,
            on_cycle: false,
            #[cfg(feature = "notify_telegram")]
            telegram: TelegramConfig::default(),
        }
    }
}

impl Config {
    pub fn events(&self) -> Events {
        Events {
            on_known: self.on_known,
            on_new_unknown: self.on_new_unknown,
            on_cycle: self.on_cycle,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Missing notification setting `{0}` (set it in the config or the environment)")]
    MissingSetting(&'static str),

    #[error("Notification channel `{0}` is not compiled into this build")]
    Unsupported(Channel),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Build the notifier selected by `config`.
pub fn from_config(config: &Config) -> Result<Box<dyn Notifier>, NotifyError> {
    match config.channel {
        Channel::Log => Ok(Box::new(LogNotifier)),
        #[cfg(feature = "notify_telegram")]
        Channel::Telegram => Ok(Box::new(TelegramNotifier::new(&config.telegram)?)),
        #[cfg(not(feature = "notify_telegram"))]
        Channel::Telegram => Err(NotifyError::Unsupported(Channel::Telegram)),
    }
}

/// Mock notifier for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockNotifier {
    pub messages: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
