//! Notification sinks.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use fleetscale_core::NotifyConfig;

/// Fire-and-forget delivery of a human-readable status line.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}

/// Bot token and destination chat.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sends messages through the Telegram Bot API. Without credentials every
/// call is a no-op.
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    credentials: Option<Credentials>,
}

impl TelegramNotifier {
    /// Notifier posting to `config.api_base`; disabled when `credentials`
    /// is `None`.
    pub fn new(config: &NotifyConfig, credentials: Option<Credentials>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "notification client setup failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Build from the environment variables named in the config. Both the
    /// token and the chat id must be present and non-empty.
    pub fn from_env(config: &NotifyConfig) -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let credentials = match (read(&config.token_env), read(&config.chat_id_env)) {
            (Some(token), Some(chat_id)) => Some(Credentials { token, chat_id }),
            _ => {
                debug!(
                    token_env = %config.token_env,
                    chat_id_env = %config.chat_id_env,
                    "notification credentials absent, notifications disabled"
                );
                None
            }
        };
        Self::new(config, credentials)
    }

    /// True when credentials are present.
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) {
        let Some(creds) = &self.credentials else {
            return;
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, creds.token);
        let body = SendMessage {
            chat_id: &creds.chat_id,
            text,
        };

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("notification delivered");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "notification rejected");
            }
            Err(e) => {
                // The URL carries the token; log only the cause.
                warn!(error = %e.without_url(), "notification delivery failed");
            }
        }
    }
}

/// Keeps every message in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
    }
}
