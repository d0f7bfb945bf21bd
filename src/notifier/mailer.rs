//! Outbound mail boundary.

use async_trait::async_trait;
use wreq::Client;
use wreq::header::AUTHORIZATION;
use wreq::header::CONTENT_TYPE;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MailError {
    #[error("Mail request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Mail delivery rejected with status {status}")]
    Rejected { status: u16 },

    #[error("Failed to encode mail payload: {0}")]
    EncodeFailed(#[from] serde_json::Error),
}

impl From<wreq::Error> for MailError {
    fn from(e: wreq::Error) -> Self {
        MailError::RequestFailed(Box::new(e))
    }
}

/// Transport-level delivery of one rendered HTML email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_html(
        &self,
        from: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), MailError>;
}

/// Delivery through a managed email HTTP API.
pub struct HttpApiMailer {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpApiMailer {
    pub fn new(endpoint: String, api_key: String) -> Self {
        let client = Client::builder()
            .build()
            .expect("Failed to create client");

        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for HttpApiMailer {
    async fn send_html(
        &self,
        from: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let payload = serde_json::to_string(&serde_json::json!({
            "from": from,
            "to": recipients,
            "subject": subject,
            "html": body,
        }))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
