use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator placed between the reply text and its image URL when a reply is
/// flattened into a single string.
pub const REPLY_IMAGE_SEPARATOR: &str = "\n||image||\n";

/// Credentials for one companion. Passed by reference into both the fetcher
/// and the polling loop.
#[derive(Debug, Clone)]
pub struct NomiSession {
    pub api_key: String,
    pub companion_id: String,
}

impl NomiSession {
    pub fn new(api_key: impl Into<String>, companion_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            companion_id: companion_id.into(),
        }
    }
}

/// A single message from a room's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NomiMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

impl NomiMessage {
    /// The image URL, if one is present and non-empty.
    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Body of `GET /v1/rooms/{id}/messages`.
#[derive(Debug, Deserialize, Default)]
pub struct RecentMessagesResponse {
    #[serde(default)]
    pub messages: Vec<NomiMessage>,
}

/// Body sent to the reply endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest<'a> {
    pub companion_id: &'a str,
}

/// The companion's answer from the reply endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ReplyMessage {
    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Flatten into `text + REPLY_IMAGE_SEPARATOR + imageUrl`, or just the text
    /// when there is no image. See [`split_combined_reply`].
    pub fn combined(&self) -> String {
        match self.image() {
            Some(url) => format!("{}{}{}", self.text, REPLY_IMAGE_SEPARATOR, url),
            None => self.text.clone(),
        }
    }
}

/// Body of `POST /v1/rooms/{id}/reply`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResponse {
    pub reply_message: ReplyMessage,
}

/// Inverse of [`ReplyMessage::combined`].
pub fn split_combined_reply(combined: &str) -> (&str, Option<&str>) {
    match combined.rsplit_once(REPLY_IMAGE_SEPARATOR) {
        Some((text, url)) if !url.is_empty() => (text, Some(url)),
        _ => (combined, None),
    }
}

/// Static room lookup data loaded from the rooms file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    #[serde(alias = "id")]
    pub uuid: String,
    #[serde(default)]
    pub nomis: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoomContainer {
    #[serde(default)]
    pub rooms: Vec<Room>,
}

/// Where a poller reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub room_id: String,
    pub channel_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ignores_unknown_fields_and_defaults_missing() {
        let json = r#"{"messages":[{"id":"m1","text":"hey","sent":"x","extra":{"a":1}}]}"#;
        let parsed: RecentMessagesResponse = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.messages.len(), 1);
        let msg = &parsed.messages[0];
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.text, "hey");
        assert_eq!(msg.image_url, None);
        assert_eq!(msg.timestamp, "");
        assert!(msg.image().is_none());
    }

    #[test]
    fn test_empty_image_url_counts_as_no_image() {
        let msg: NomiMessage =
            serde_json::from_str(r#"{"id":"1","text":"t","imageUrl":""}"#).unwrap();
        assert!(msg.image().is_none());
    }

    #[test]
    fn test_reply_request_payload_shape() {
        let payload = ReplyRequest {
            companion_id: "abc",
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"companionId":"abc"}"#
        );
    }

    #[test]
    fn test_combined_reply_without_image_is_plain_text() {
        let resp: ReplyResponse =
            serde_json::from_str(r#"{"replyMessage":{"text":"hi","imageUrl":""}}"#).unwrap();

        let combined = resp.reply_message.combined();
        assert_eq!(combined, "hi");
        assert_eq!(split_combined_reply(&combined), ("hi", None));
    }

    #[test]
    fn test_combined_reply_with_image_splits_back() {
        let reply = ReplyMessage {
            text: "look".to_string(),
            image_url: Some("https://cdn.example/x.webp".to_string()),
        };

        let combined = reply.combined();
        let (text, image) = split_combined_reply(&combined);
        assert_eq!(text, "look");
        assert_eq!(image, Some("https://cdn.example/x.webp"));
    }

    #[test]
    fn test_room_accepts_id_alias() {
        let room: Room = serde_json::from_str(r#"{"name":"Lounge","id":"r-1"}"#).unwrap();
        assert_eq!(room.uuid, "r-1");
        assert!(room.nomis.is_empty());
    }

    #[test]
    fn test_sent_at_parses_rfc3339() {
        let msg = NomiMessage {
            timestamp: "2024-05-01T12:00:00.000Z".to_string(),
            ..Default::default()
        };
        assert!(msg.sent_at().is_some());
        assert!(NomiMessage::default().sent_at().is_none());
    }
}
