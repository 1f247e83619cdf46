// Nomi infra layer.
// - `nomi_api_client.rs` talks to the Nomi HTTP API.
// - `room_file_store.rs` reads the static room list from disk.

#[path = "nomi_api_client.rs"]
pub mod nomi_api_client;

#[path = "room_file_store.rs"]
pub mod room_file_store;

pub use nomi_api_client::NomiApiClient;
pub use room_file_store::JsonRoomStore;
