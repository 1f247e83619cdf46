use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;

use super::message_sink::{forward_reply, Delivery, MessageSink};
use super::nomi_client::{NomiApi, NomiError};
use super::nomi_models::{NomiSession, ReplyMessage, Room};
use super::polling::{RoomPoller, StartOutcome};
use super::room_store::{find_room, RoomStore, RoomStoreError};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Nomi(#[from] NomiError),
    #[error("Failed to load rooms: {0}")]
    Rooms(#[from] RoomStoreError),
    #[error("Room reference is empty")]
    EmptyRoom,
    #[error("Invalid room id `{0}`")]
    InvalidRoomId(String),
}

/// Room ids end up as a URL path segment; anything that could change the
/// shape of that path is refused up front.
fn validate_room_id(room_id: &str) -> Result<(), BridgeError> {
    let bad_char = |c: char| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    };
    if room_id == "." || room_id == ".." || room_id.chars().any(bad_char) {
        return Err(BridgeError::InvalidRoomId(room_id.to_string()));
    }
    Ok(())
}

/// Snapshot of one room's poller for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerStatus {
    pub room_id: String,
    pub channel_id: Option<u64>,
    pub running: bool,
    pub last_seen: Option<String>,
}

/// Entry point used by the Discord layer. Owns one [`RoomPoller`] per room so
/// each room gets an independent cursor and at most one task.
pub struct NomiBridgeService<C: NomiApi + 'static, S: MessageSink + 'static, R: RoomStore> {
    api: Arc<C>,
    sink: Arc<S>,
    rooms: R,
    session: NomiSession,
    interval: Duration,
    pollers: DashMap<String, Arc<RoomPoller<C, S>>>,
}

impl<C, S, R> NomiBridgeService<C, S, R>
where
    C: NomiApi + 'static,
    S: MessageSink + 'static,
    R: RoomStore,
{
    pub fn new(api: C, sink: Arc<S>, rooms: R, session: NomiSession, interval: Duration) -> Self {
        Self {
            api: Arc::new(api),
            sink,
            rooms,
            session,
            interval,
            pollers: DashMap::new(),
        }
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, BridgeError> {
        Ok(self.rooms.load_rooms().await?)
    }

    /// Turn a room name or id into a room id. Unknown references are passed
    /// through as raw ids once they pass [`validate_room_id`].
    pub async fn resolve_room(&self, reference: &str) -> Result<String, BridgeError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(BridgeError::EmptyRoom);
        }

        let rooms = self.rooms.load_rooms().await?;
        let room_id = find_room(&rooms, reference)
            .map(|room| room.uuid.clone())
            .unwrap_or_else(|| reference.to_string());
        validate_room_id(&room_id)?;
        Ok(room_id)
    }

    fn poller(&self, room_id: &str) -> Arc<RoomPoller<C, S>> {
        let entry = self
            .pollers
            .entry(room_id.to_string())
            .or_insert_with(|| {
                Arc::new(RoomPoller::new(
                    room_id,
                    Arc::clone(&self.api),
                    Arc::clone(&self.sink),
                    self.session.clone(),
                    self.interval,
                ))
            });
        Arc::clone(entry.value())
    }

    pub async fn start_polling(
        &self,
        reference: &str,
        channel_id: u64,
    ) -> Result<(String, StartOutcome), BridgeError> {
        let room_id = self.resolve_room(reference).await?;
        let outcome = self.poller(&room_id).start(channel_id).await;
        Ok((room_id, outcome))
    }

    pub async fn stop_polling(&self, reference: &str) -> Result<(String, bool), BridgeError> {
        let room_id = self.resolve_room(reference).await?;
        let poller = self.pollers.get(&room_id).map(|p| Arc::clone(p.value()));
        let stopped = match poller {
            Some(poller) => poller.stop().await,
            None => false,
        };
        // A poller that never saw a message has nothing worth keeping.
        self.pollers
            .remove_if(&room_id, |_, p| !p.is_running() && p.last_seen().is_none());
        Ok((room_id, stopped))
    }

    pub fn is_polling(&self, room_id: &str) -> bool {
        self.pollers
            .get(room_id)
            .map(|p| p.is_running())
            .unwrap_or(false)
    }

    pub fn running_count(&self) -> usize {
        self.pollers.iter().filter(|p| p.is_running()).count()
    }

    pub async fn status(&self) -> Vec<PollerStatus> {
        // Collect first so no shard lock is held across the awaits below.
        let pollers: Vec<_> = self.pollers.iter().map(|p| Arc::clone(p.value())).collect();

        let mut statuses = Vec::with_capacity(pollers.len());
        for poller in pollers {
            statuses.push(PollerStatus {
                room_id: poller.room_id().to_string(),
                channel_id: poller.channel_id().await,
                running: poller.is_running(),
                last_seen: poller.last_seen(),
            });
        }
        statuses.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        statuses
    }

    pub async fn request_reply(&self, reference: &str) -> Result<ReplyMessage, BridgeError> {
        let room_id = self.resolve_room(reference).await?;
        Ok(self.api.request_reply(&self.session, &room_id).await?)
    }

    /// Request a reply and forward it straight to `channel_id`.
    pub async fn relay_reply(
        &self,
        reference: &str,
        channel_id: u64,
    ) -> Result<Delivery, BridgeError> {
        let reply = self.request_reply(reference).await?;
        Ok(forward_reply(self.sink.as_ref(), channel_id, &reply).await)
    }

    /// Cancel every running poller.
    pub async fn shutdown(&self) {
        let pollers: Vec<_> = self.pollers.iter().map(|p| Arc::clone(p.value())).collect();
        for poller in pollers {
            poller.stop().await;
        }
    }
}
