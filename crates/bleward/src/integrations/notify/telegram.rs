use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use super::Notifier;
use super::NotifyError;

/// Environment variable consulted when `bot_token` is not configured
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable consulted when `chat_id` is not configured
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Configuration for the Telegram notifier
///
/// Credentials are usually left out of the config file and supplied through the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot token (falls back to `TELEGRAM_BOT_TOKEN`)
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Destination chat (falls back to `TELEGRAM_CHAT_ID`)
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Bot API base URL (default: "https://api.telegram.org")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sends notifications as Telegram bot messages.
pub struct TelegramNotifier {
    client: reqwest::Client,
    /// Full sendMessage URL; contains the bot token and must not be logged
    endpoint: String,
    chat_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(config: &Config) -> Result<Self, NotifyError> {
        let token = resolve(config.bot_token.as_deref(), TOKEN_ENV)?;
        let chat_id = resolve(config.chat_id.as_deref(), CHAT_ID_ENV)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            chat_id,
        })
    }

    async fn send(&self, message: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: message,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, message: &str) {
        match self.send(message).await {
            Ok(()) => debug!("Telegram notification delivered"),
            // Strip the URL so the bot token never reaches the log
            Err(e) => warn!("Telegram notification failed: {}", e.without_url()),
        }
    }
}

/// Prefer the configured value, then the environment variable.
fn resolve(configured: Option<&str>, env: &'static str) -> Result<String, NotifyError> {
    configured
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var(env).ok().filter(|v| !v.is_empty()))
        .ok_or(NotifyError::MissingSetting(env))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_config() {
        assert_eq!(resolve(Some("from-config"), TOKEN_ENV).unwrap(), "from-config");
    }

    #[test]
    fn test_resolve_missing_setting() {
        let err = resolve(None, "BLEWARD_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(
            err,
            NotifyError::MissingSetting("BLEWARD_TEST_UNSET_VARIABLE")
        ));
    }

    #[test]
    fn test_endpoint_and_debug_hide_token() {
        let notifier = TelegramNotifier::new(&Config {
            bot_token: Some("123:secret".to_string()),
            chat_id: Some("42".to_string()),
            api_base: "https://api.example.org/".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        assert_eq!(
            notifier.endpoint,
            "https://api.example.org/bot123:secret/sendMessage"
        );
        assert!(!format!("{:?}", notifier).contains("secret"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let notifier = TelegramNotifier::new(&Config {
            bot_token: Some("123:secret".to_string()),
            chat_id: Some("42".to_string()),
            // Nothing listens on the discard port
            api_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        })
        .unwrap();

        notifier.notify("device spotted").await;
    }
}
