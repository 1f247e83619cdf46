use async_trait::async_trait;
use thiserror::Error;

use super::nomi_models::{NomiMessage, NomiSession, ReplyMessage};

/// Failures from a single call to the Nomi API. None of these are fatal.
#[derive(Debug, Error)]
pub enum NomiError {
    #[error("Nomi API request failed: {0}")]
    Transport(String),
    #[error("Nomi API returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Failed to parse Nomi API response: {0}")]
    Parse(String),
    #[error("Invalid Nomi credentials: {0}")]
    InvalidCredentials(String),
    #[error("Invalid Nomi API URL: {0}")]
    InvalidUrl(String),
}

impl NomiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            NomiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The subset of the Nomi API the bridge relies on. Implementations must not
/// retry internally; retry policy belongs to the caller.
#[async_trait]
pub trait NomiApi: Send + Sync {
    /// Most recent messages of a room, in the order the API returned them.
    async fn fetch_recent_messages(
        &self,
        session: &NomiSession,
        room_id: &str,
    ) -> Result<Vec<NomiMessage>, NomiError>;

    /// Ask the session's companion for a reply in a room.
    async fn request_reply(
        &self,
        session: &NomiSession,
        room_id: &str,
    ) -> Result<ReplyMessage, NomiError>;
}

#[async_trait]
impl<T: NomiApi + ?Sized> NomiApi for std::sync::Arc<T> {
    async fn fetch_recent_messages(
        &self,
        session: &NomiSession,
        room_id: &str,
    ) -> Result<Vec<NomiMessage>, NomiError> {
        (**self).fetch_recent_messages(session, room_id).await
    }

    async fn request_reply(
        &self,
        session: &NomiSession,
        room_id: &str,
    ) -> Result<ReplyMessage, NomiError> {
        (**self).request_reply(session, room_id).await
    }
}
