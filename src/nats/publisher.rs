use crate::transport::OutboundTransport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

/// Publishes serialized schedules to the plan subject
#[derive(Clone)]
pub struct SchedulePublisher {
    client: async_nats::Client,
    subject: String,
}

impl SchedulePublisher {
    pub fn new(client: async_nats::Client, subject: String) -> Self {
        Self { client, subject }
    }
}

#[async_trait]
impl OutboundTransport for SchedulePublisher {
    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        debug!(
            subject = %self.subject,
            bytes = payload.len(),
            "Publishing schedule to NATS"
        );

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .context(format!("Failed to publish schedule to subject '{}'", self.subject))?;

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .context("Failed to flush pending schedules")?;
        info!("Schedule publisher stopped");
        Ok(())
    }
}
