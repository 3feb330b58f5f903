use crate::error::Error;
use crate::log::info;
use aws_sdk_ses::types::{Body, Content, Destination, Message};
use aws_sdk_ses::Client;

#[cfg(feature = "tracing")]
use tracing::instrument;

const CHARSET: &str = "UTF-8";

/// SES convenience wrapper. Sender and recipients must be verified identities
/// while the account is in the sandbox.
#[derive(Debug, Clone)]
pub struct Ses {
    client: Client,
}

impl Ses {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }

    /// Send a plain-text email and return the SES message id
    #[cfg_attr(feature = "tracing", instrument(skip(self, body)))]
    pub async fn send_email(
        &self,
        sender: &str,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String, Error> {
        if to.is_empty() {
            return Err(Error::InvalidInput("At least one recipient is required".to_string()));
        }

        let output = self
            .client
            .send_email()
            .source(sender)
            .destination(
                Destination::builder()
                    .set_to_addresses(Some(to.to_vec()))
                    .build(),
            )
            .message(text_message(subject, body)?)
            .send()
            .await
            .map_err(|e| Error::Ses(e.to_string()))?;

        let message_id = output.message_id().to_string();
        info!("Email sent with message id {}", message_id);
        Ok(message_id)
    }
}

/// A text-only message with UTF-8 subject and body
pub fn text_message(subject: &str, body: &str) -> Result<Message, Error> {
    let subject = utf8_content(subject)?;
    let text = utf8_content(body)?;

    Ok(Message::builder()
        .subject(subject)
        .body(Body::builder().text(text).build())
        .build())
}

fn utf8_content(data: &str) -> Result<Content, Error> {
    Content::builder()
        .data(data)
        .charset(CHARSET)
        .build()
        .map_err(|e| Error::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message() {
        let message = text_message("Weekly report", "All green").unwrap();

        assert_eq!(message.subject().map(|s| s.data()), Some("Weekly report"));
        assert_eq!(message.subject().and_then(|s| s.charset()), Some("UTF-8"));

        let text = message.body().and_then(|b| b.text()).unwrap();
        assert_eq!(text.data(), "All green");
        assert_eq!(text.charset(), Some("UTF-8"));
        assert!(message.body().and_then(|b| b.html()).is_none());
    }
}
