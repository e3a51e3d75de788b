use crate::transport::InboundTransport;
use anyhow::{Context, Result};
use async_nats::connection::State;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::SchedulePublisher;

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Queue group shared by all scheduler replicas
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_consumer_subject")]
    pub consumer_subject: String,
    #[serde(default = "default_producer_subject")]
    pub producer_subject: String,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_group_id() -> String {
    "allstop-scheduling".to_string()
}

fn default_consumer_subject() -> String {
    "v2xhub.status_intent".to_string()
}

fn default_producer_subject() -> String {
    "v2xhub.scheduling_plan".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            group_id: default_group_id(),
            consumer_subject: default_consumer_subject(),
            producer_subject: default_producer_subject(),
        }
    }
}

/// Connected NATS client
pub struct NatsClient {
    client: async_nats::Client,
    config: NatsConfig,
}

impl NatsClient {
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        Ok(Self { client, config })
    }

    /// Join the status-intent queue group
    pub async fn consumer(&self) -> Result<StatusIntentConsumer> {
        let subscriber = self
            .client
            .queue_subscribe(
                self.config.consumer_subject.clone(),
                self.config.group_id.clone(),
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to subscribe to '{}' in group '{}'",
                    self.config.consumer_subject, self.config.group_id
                )
            })?;

        info!(
            subject = %self.config.consumer_subject,
            group = %self.config.group_id,
            "Subscribed to status intent messages"
        );

        Ok(StatusIntentConsumer {
            subscriber,
            running: matches!(self.client.connection_state(), State::Connected),
        })
    }

    pub fn producer(&self) -> SchedulePublisher {
        SchedulePublisher::new(self.client.clone(), self.config.producer_subject.clone())
    }

}

/// Queue-group subscription delivering raw status-intent payloads
pub struct StatusIntentConsumer {
    subscriber: async_nats::Subscriber,
    running: bool,
}

#[async_trait]
impl InboundTransport for StatusIntentConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        if !self.running {
            return Ok(None);
        }

        match tokio::time::timeout(timeout, self.subscriber.next()).await {
            Ok(Some(message)) => Ok(Some(message.payload.to_vec())),
            Ok(None) => {
                warn!("Status intent subscription closed");
                self.running = false;
                Ok(None)
            }
            Err(_elapsed) => Ok(None),
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        self.subscriber
            .unsubscribe()
            .await
            .context("Failed to unsubscribe from status intent subject")?;
        info!("Status intent consumer stopped");
        Ok(())
    }
}
