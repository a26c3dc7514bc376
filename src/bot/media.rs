//! Transport-independent view of an incoming Telegram message.
//!
//! Converts teloxide `Message` values (photo or document) into the small model
//! the orchestrator works with.

use std::path::Path;
use teloxide::types::Message;

/// A photo; always the largest size Telegram offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoItem {
    /// File id used to download the photo
    pub file_id: String,
    /// Stable unique id, used as the local file name
    pub file_unique_id: String,
}

/// A file sent as a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentItem {
    /// File id used to download the document
    pub file_id: String,
    /// Stable unique id, fallback for the local file name
    pub file_unique_id: String,
    /// File name declared by the sender
    pub file_name: Option<String>,
    /// MIME type declared by the sender
    pub mime_type: Option<String>,
}

/// Media payload of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaItem {
    /// Compressed photo
    Photo(PhotoItem),
    /// Uncompressed file
    Document(DocumentItem),
}

impl MediaItem {
    /// Telegram file id to download
    #[must_use]
    pub fn file_id(&self) -> &str {
        match self {
            Self::Photo(photo) => &photo.file_id,
            Self::Document(doc) => &doc.file_id,
        }
    }

    /// Local file name for the staged copy
    ///
    /// Photos are always JPEG. Documents keep the final path component of
    /// their declared name, or fall back to the unique id.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Photo(photo) => format!("{}.jpg", photo.file_unique_id),
            Self::Document(doc) => doc
                .file_name
                .as_deref()
                .and_then(|name| Path::new(name).file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| doc.file_unique_id.clone()),
        }
    }

    /// Whether the item is a video document that must not be uploaded
    #[must_use]
    pub fn is_video(&self) -> bool {
        match self {
            Self::Photo(_) => false,
            Self::Document(doc) => doc
                .mime_type
                .as_deref()
                .is_some_and(|mime| mime.starts_with("video/")),
        }
    }
}

/// One incoming message with the fields needed for routing and processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Telegram user id of the sender, if known
    pub sender_id: Option<i64>,
    /// Chat the message came from
    pub chat_id: i64,
    /// Message id within the chat
    pub message_id: i32,
    /// Album key shared by messages sent together
    pub media_group_id: Option<String>,
    /// Photo or document payload
    pub media: Option<MediaItem>,
}

impl IncomingMessage {
    /// Convert a teloxide message
    #[must_use]
    pub fn from_telegram(msg: &Message) -> Self {
        Self {
            sender_id: msg.from.as_ref().map(|u| u.id.0.cast_signed()),
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            media_group_id: msg.media_group_id().map(|id| id.0.clone()),
            media: media_from_telegram(msg),
        }
    }
}

fn media_from_telegram(msg: &Message) -> Option<MediaItem> {
    if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        return Some(MediaItem::Photo(PhotoItem {
            file_id: photo.file.id.0.clone(),
            file_unique_id: photo.file.unique_id.0.clone(),
        }));
    }

    msg.document().map(|doc| {
        MediaItem::Document(DocumentItem {
            file_id: doc.file.id.0.clone(),
            file_unique_id: doc.file.unique_id.0.clone(),
            file_name: doc.file_name.clone(),
            mime_type: doc.mime_type.as_ref().map(ToString::to_string),
        })
    })
}
