/// Album (media group) deduplication and member collection
pub mod album;
/// Command and media endpoints for the dispatcher
pub mod handlers;
/// Message model independent of teloxide types
pub mod media;
/// Upload flow per message
pub mod orchestrator;
/// Temporary download and validation of media
pub mod staging;
/// Chat operations used by the upload flow
pub mod transport;
/// User-facing texts
pub mod views;

pub use orchestrator::UploadOrchestrator;
pub use transport::{ChatTransport, TelegramTransport};
