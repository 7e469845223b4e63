use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use retractscope_core::RegistryConfig;

use crate::error::{EnrichError, Result};

pub const USER_AGENT: &str = "retractscope/0.1";

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// reqwest client with a fixed-window throttle: after every
/// `requests_per_window` requests it pauses for `window_pause`.
///
/// There are no retries; a failed request is reported to the caller once.
pub struct RateLimitedClient {
    client: reqwest::Client,
    requests_per_window: usize,
    window_pause: Duration,
    sent: Arc<Mutex<usize>>,
}

impl RateLimitedClient {
    pub fn new(
        requests_per_window: usize,
        window_pause: Duration,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            requests_per_window: requests_per_window.max(1),
            window_pause,
            sent: Arc::new(Mutex::new(0)),
        })
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let user_agent = match &config.polite_email {
            Some(email) => format!("{USER_AGENT} (mailto:{email})"),
            None => USER_AGENT.to_string(),
        };
        Self::new(
            config.requests_per_window,
            config.window_pause(),
            config.timeout(),
            &user_agent,
        )
    }

    async fn wait_for_window(&self) {
        let mut sent = self.sent.lock().await;
        if *sent > 0 && *sent % self.requests_per_window == 0 && !self.window_pause.is_zero() {
            debug!("{} requests sent, pausing {:?}", *sent, self.window_pause);
            sleep(self.window_pause).await;
        }
        *sent += 1;
    }

    /// Number of requests issued so far.
    pub async fn requests_sent(&self) -> usize {
        *self.sent.lock().await
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        self.wait_for_window().await;
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EnrichError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        let resp = self.send(request, url).await?;
        resp.text().await.map_err(EnrichError::Http)
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.send(self.client.get(url), url).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get(url).await?;
        serde_json::from_str(&text).map_err(|e| EnrichError::Parse(e.to_string()))
    }
}
