use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::nomi::{Room, RoomContainer, RoomStore, RoomStoreError};

/// Reads the room list from a JSON file on every call, so edits are picked up
/// without a restart. A missing file means no rooms.
pub struct JsonRoomStore {
    path: PathBuf,
}

impl JsonRoomStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RoomStore for JsonRoomStore {
    async fn load_rooms(&self) -> Result<Vec<Room>, RoomStoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path).await?;
        let container: RoomContainer = serde_json::from_str(&text)?;
        Ok(container.rooms)
    }
}
