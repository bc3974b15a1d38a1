//! HTTP channel sender
//!
//! Posts notifications to the configured provider endpoint. Every call is
//! bounded by the client timeout so a slow provider cannot hang a whole
//! notification pass; transport errors and non-success responses come
//! back as [`SendFailure`] with the reason preserved.

use std::time::Duration;

use async_trait::async_trait;
use recurpay_billing::{ChannelSender, NotificationChannel, SendFailure, SendReceipt};

pub struct HttpChannelSender {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChannelSender {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ChannelSender for HttpChannelSender {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        message: &str,
    ) -> Result<SendReceipt, SendFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "channel": channel.as_str(),
                "to": recipient,
                "message": message,
            }))
            .send()
            .await
            .map_err(|e| SendFailure::new(format!("transport error: {e}")))?;

        if !response.status().is_success() {
            return Err(SendFailure::new(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        Ok(SendReceipt {
            provider_ref: body
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn successful_post_returns_provider_ref() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"msg-123"}"#)
            .create_async()
            .await;

        let sender = HttpChannelSender::new(
            &format!("{}/send", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let receipt = sender
            .send(NotificationChannel::Sms, "+2348012345678", "hello")
            .await
            .unwrap();

        assert_eq!(receipt.provider_ref.as_deref(), Some("msg-123"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn provider_error_becomes_send_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send")
            .with_status(503)
            .create_async()
            .await;

        let sender = HttpChannelSender::new(
            &format!("{}/send", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let failure = sender
            .send(NotificationChannel::Email, "ade@example.test", "hello")
            .await
            .unwrap_err();

        assert!(failure.reason.contains("503"));
    }
}
