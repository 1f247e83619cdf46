use super::nomi_models::Room;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum RoomStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read-only source of configured rooms.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn load_rooms(&self) -> Result<Vec<Room>, RoomStoreError>;
}

/// Look a room up by name (case-insensitive) or by id.
pub fn find_room<'a>(rooms: &'a [Room], reference: &str) -> Option<&'a Room> {
    rooms
        .iter()
        .find(|room| room.uuid == reference)
        .or_else(|| {
            rooms
                .iter()
                .find(|room| room.name.eq_ignore_ascii_case(reference))
        })
}
