pub mod message_sink;
pub mod nomi_client;
pub mod nomi_models;
pub mod nomi_service;
pub mod polling;
pub mod room_store;

pub use message_sink::{MessageSink, SinkError};
pub use nomi_client::{NomiApi, NomiError};
pub use nomi_models::{NomiMessage, NomiSession, ReplyMessage, Room, RoomContainer};
pub use nomi_service::NomiBridgeService;
pub use polling::{StartOutcome, DEFAULT_POLL_INTERVAL};
pub use room_store::{RoomStore, RoomStoreError};
