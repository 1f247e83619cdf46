use async_trait::async_trait;
use thiserror::Error;

use super::nomi_models::ReplyMessage;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to send message: {0}")]
    Send(String),
    #[error("Failed to download image {url}: {reason}")]
    ImageDownload { url: String, reason: String },
}

/// Downstream channel that displays forwarded companion messages.
///
/// Each call is independently fallible. Callers log failures and move on.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<(), SinkError>;
    async fn send_image(&self, channel_id: u64, image_url: &str) -> Result<(), SinkError>;
}

#[async_trait]
impl<T: MessageSink + ?Sized> MessageSink for std::sync::Arc<T> {
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<(), SinkError> {
        (**self).send_text(channel_id, text).await
    }

    async fn send_image(&self, channel_id: u64, image_url: &str) -> Result<(), SinkError> {
        (**self).send_image(channel_id, image_url).await
    }
}

/// What actually reached the sink for one forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    pub text_sent: bool,
    pub image_sent: bool,
}

/// Send text, then the image if there is one. Failures are logged, not returned.
///
/// Blank text is never handed to the sink, so `text_sent` is only true when
/// something was actually posted.
pub async fn forward<S: MessageSink + ?Sized>(
    sink: &S,
    channel_id: u64,
    text: &str,
    image_url: Option<&str>,
) -> Delivery {
    let mut delivery = Delivery::default();

    if text.trim().is_empty() {
        tracing::debug!(channel_id, "Skipping empty Nomi text");
    } else {
        match sink.send_text(channel_id, text).await {
            Ok(()) => delivery.text_sent = true,
            Err(err) => tracing::warn!(channel_id, error = %err, "Failed to forward Nomi text"),
        }
    }

    if let Some(url) = image_url {
        match sink.send_image(channel_id, url).await {
            Ok(()) => delivery.image_sent = true,
            Err(err) => {
                tracing::warn!(channel_id, image_url = url, error = %err, "Failed to forward Nomi image")
            }
        }
    }

    delivery
}

/// Forward a reply-endpoint answer. Goes through the combined string form so
/// the split convention has one code path.
pub async fn forward_reply<S: MessageSink + ?Sized>(
    sink: &S,
    channel_id: u64,
    reply: &ReplyMessage,
) -> Delivery {
    let combined = reply.combined();
    let (text, image_url) = super::nomi_models::split_combined_reply(&combined);
    forward(sink, channel_id, text, image_url).await
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SinkCall {
        Text(u64, String),
        Image(u64, String),
    }

    /// Records every call; can be told to fail text or image sends.
    #[derive(Default)]
    pub struct RecordingSink {
        pub calls: Mutex<Vec<SinkCall>>,
        pub fail_text: bool,
        pub fail_image: bool,
    }

    impl RecordingSink {
        pub fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_text(&self, channel_id: u64, text: &str) -> Result<(), SinkError> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Text(channel_id, text.to_string()));
            if self.fail_text {
                return Err(SinkError::Send("channel unavailable".to_string()));
            }
            Ok(())
        }

        async fn send_image(&self, channel_id: u64, image_url: &str) -> Result<(), SinkError> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Image(channel_id, image_url.to_string()));
            if self.fail_image {
                return Err(SinkError::ImageDownload {
                    url: image_url.to_string(),
                    reason: "404".to_string(),
                });
            }
            Ok(())
        }
    }
}
