//! NATS publisher for score reports

use crate::types::report::ScoreReport;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publishes reports to the requester's inbox or the verdict subject
#[derive(Clone)]
pub struct ReportProducer {
    client: Client,
    subject: String,
}

impl ReportProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a report, to `reply` when the request carried one
    pub async fn publish(&self, report: &ScoreReport, reply: Option<&str>) -> Result<()> {
        let payload = serde_json::to_vec(report)?;
        let subject = reply.unwrap_or(&self.subject).to_string();

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(
            report_id = %report.report_id,
            request_id = %report.request_id,
            subject = %subject,
            label = report.result.as_ref().map(|r| r.label.to_string()).unwrap_or_default(),
            "Published score report"
        );

        Ok(())
    }

    /// Subject used when a request has no reply inbox
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
