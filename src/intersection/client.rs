use super::{IntersectionConfig, IntersectionModel};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// HTTP client for the intersection model endpoint
pub struct IntersectionClient {
    http_client: Client,
    url: String,
}

impl IntersectionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            url: url.into(),
        }
    }

    /// Single GET of the geometry document
    pub async fn fetch(&self) -> Result<IntersectionModel> {
        let response = self
            .http_client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send intersection geometry request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Intersection geometry request failed with status {}", status));
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read intersection geometry response")?;

        IntersectionModel::from_json(&body)
    }

    /// Try `attempts` times, waiting `delay` between failures
    pub async fn fetch_with_attempts(
        &self,
        attempts: u32,
        delay: Duration,
    ) -> Result<IntersectionModel> {
        let attempts = attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.fetch().await {
                Ok(model) => return Ok(model),
                Err(e) => {
                    warn!(
                        url = %self.url,
                        attempt = attempt,
                        attempts = attempts,
                        error = %e,
                        "Intersection geometry fetch failed"
                    );
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        let e = last_error.unwrap_or_else(|| anyhow!("no attempts made"));
        Err(e.context(format!(
            "Intersection geometry unavailable after {} attempts",
            attempts
        )))
    }
}

/// Load the intersection model from a local file or over HTTP
pub async fn load_intersection(config: &IntersectionConfig) -> Result<IntersectionModel> {
    let model = if config.is_remote() {
        info!(url = %config.source, "Fetching intersection geometry");
        IntersectionClient::new(config.source.clone())
            .fetch_with_attempts(config.attempts, Duration::from_millis(config.retry_delay_ms))
            .await?
    } else {
        info!(path = %config.source, "Loading intersection geometry");
        let bytes = tokio::fs::read(&config.source)
            .await
            .with_context(|| format!("Failed to read intersection geometry '{}'", config.source))?;
        IntersectionModel::from_json(&bytes)?
    };

    info!(
        intersection_id = model.id(),
        name = %model.name(),
        lanes = model.lane_count(),
        entry_lanes = model.entry_lanes().count(),
        "Intersection model loaded"
    );

    Ok(model)
}
