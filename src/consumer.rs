//! NATS subscription for incoming score requests

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving score requests from NATS
pub struct ProfileRequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl ProfileRequestConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: None,
        }
    }

    /// Share the subject with other workers in the same queue group
    pub fn with_queue_group(mut self, queue_group: Option<String>) -> Self {
        self.queue_group = queue_group.filter(|g| !g.trim().is_empty());
        self
    }

    /// Subscribe to the request subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await?
            }
            None => self.client.subscribe(self.subject.clone()).await?,
        };

        info!(
            subject = %self.subject,
            queue_group = self.queue_group.as_deref().unwrap_or("-"),
            "Subscribed to request subject"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn queue_group(&self) -> Option<&str> {
        self.queue_group.as_deref()
    }
}
