use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;

use crate::core::nomi::{MessageSink, SinkError};

/// Discord's per-message character limit.
const MAX_MESSAGE_CHARS: usize = 2000;
const IMAGE_FILENAME: &str = "image.webp";

/// Posts forwarded Nomi messages into Discord channels.
pub struct DiscordSink {
    http: Arc<serenity::Http>,
    downloader: reqwest::Client,
}

impl DiscordSink {
    pub fn new(http: Arc<serenity::Http>, timeout: Duration) -> Result<Self, SinkError> {
        let downloader = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Send(e.to_string()))?;

        Ok(Self { http, downloader })
    }

    async fn download(&self, image_url: &str) -> Result<Vec<u8>, SinkError> {
        let failed = |reason: String| SinkError::ImageDownload {
            url: image_url.to_string(),
            reason,
        };

        let response = self
            .downloader
            .get(image_url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Split on char boundaries so multi-byte text never gets cut mid-codepoint.
fn chunk_message(text: &str) -> Vec<String> {
    text.chars()
        .collect::<Vec<char>>()
        .chunks(MAX_MESSAGE_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<(), SinkError> {
        let channel = serenity::ChannelId::new(channel_id);
        for chunk in chunk_message(text) {
            channel
                .say(&self.http, chunk)
                .await
                .map_err(|e| SinkError::Send(e.to_string()))?;
        }
        Ok(())
    }

    async fn send_image(&self, channel_id: u64, image_url: &str) -> Result<(), SinkError> {
        let bytes = self.download(image_url).await?;
        let attachment = serenity::CreateAttachment::bytes(bytes, IMAGE_FILENAME);

        serenity::ChannelId::new(channel_id)
            .send_message(&self.http, serenity::CreateMessage::new().add_file(attachment))
            .await
            .map_err(|e| SinkError::Send(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_message("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn test_long_text_split_at_limit() {
        let text = "é".repeat(MAX_MESSAGE_CHARS + 5);
        let chunks = chunk_message(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(chunks[1].chars().count(), 5);
    }
}
