//! Per-message upload flow.
//!
//! Authorize → album gate → acknowledgment → stage/upload loop → one edited
//! reply with every link, or one classified failure message.

use super::album::AlbumGate;
use super::media::{IncomingMessage, MediaItem};
use super::staging::{FileStager, StagingError};
use super::transport::{ChatTransport, TextFormat};
use super::views;
use crate::config::{Settings, ALBUM_TTL_SECS};
use crate::hosting::{ImageHost, UploadError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failure of a processing run
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Download or validation failed
    #[error(transparent)]
    Staging(#[from] StagingError),
    /// Upload failed
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Drives one processing run per message or album
pub struct UploadOrchestrator {
    transport: Arc<dyn ChatTransport>,
    host: Arc<dyn ImageHost>,
    stager: FileStager,
    albums: AlbumGate,
    admin_id: i64,
    album_settle: Duration,
}

impl UploadOrchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        host: Arc<dyn ImageHost>,
        stager: FileStager,
        admin_id: i64,
        album_settle: Duration,
    ) -> Self {
        Self {
            transport,
            host,
            stager,
            albums: AlbumGate::new(Duration::from_secs(ALBUM_TTL_SECS)),
            admin_id,
            album_settle,
        }
    }

    /// Create an orchestrator configured from settings
    #[must_use]
    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn ChatTransport>,
        host: Arc<dyn ImageHost>,
    ) -> Self {
        Self::new(
            transport,
            host,
            FileStager::from_settings(settings),
            settings.admin_id,
            settings.album_settle(),
        )
    }

    /// Whether `msg` comes from the administrator
    #[must_use]
    pub fn is_authorized(&self, msg: &IncomingMessage) -> bool {
        msg.sender_id == Some(self.admin_id)
    }

    async fn deny(&self, msg: &IncomingMessage) {
        info!(
            user_id = ?msg.sender_id,
            chat_id = msg.chat_id,
            "⛔️ Unauthorized access, sending denial message"
        );
        if let Err(e) = self
            .transport
            .reply(msg.chat_id, msg.message_id, views::ACCESS_DENIED, TextFormat::Plain)
            .await
        {
            error!("Failed to send access denied message: {e}");
        }
    }

    /// Answer `/start` and `/help`
    pub async fn handle_help(&self, msg: &IncomingMessage) {
        if !self.is_authorized(msg) {
            self.deny(msg).await;
            return;
        }
        let text = views::render_help(&self.stager);
        if let Err(e) = self
            .transport
            .reply(msg.chat_id, msg.message_id, &text, TextFormat::Html)
            .await
        {
            error!("Failed to send help message: {e}");
        }
    }

    /// Process one incoming photo or document message
    ///
    /// Never fails: every error ends as a message to the user and a log line.
    pub async fn handle_media(&self, msg: IncomingMessage) {
        if !self.is_authorized(&msg) {
            self.deny(&msg).await;
            return;
        }

        let album_key = msg.media_group_id.clone();
        if let Some(key) = album_key.as_deref() {
            if !self.albums.admit(key, msg.clone()) {
                return;
            }
        }

        let ack_id = match self
            .transport
            .reply(msg.chat_id, msg.message_id, views::PROCESSING, TextFormat::Plain)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to send processing notice: {e}");
                if let Some(key) = album_key.as_deref() {
                    // Nobody will collect these, stop buffering siblings
                    let dropped = self.albums.take_members(key);
                    debug!(album = %key, dropped = dropped.len(), "Album run abandoned");
                }
                return;
            }
        };

        let items = match album_key.as_deref() {
            Some(key) => {
                tokio::time::sleep(self.album_settle).await;
                self.albums.take_members(key)
            }
            None => vec![msg.clone()],
        };
        info!(
            chat_id = msg.chat_id,
            album = ?album_key,
            items = items.len(),
            "Processing upload request"
        );

        match self.upload_all(&items).await {
            Ok(urls) if urls.is_empty() => {
                self.finish(&msg, ack_id, views::NO_IMAGES, TextFormat::Plain)
                    .await;
            }
            Ok(urls) => {
                info!(count = urls.len(), "All uploads complete");
                self.finish(&msg, ack_id, &views::render_success(&urls), TextFormat::Html)
                    .await;
            }
            Err(e) => {
                log_failure(&e);
                self.finish(&msg, ack_id, &views::render_failure(&e), TextFormat::Plain)
                    .await;
            }
        }
    }

    /// Stage and upload every item in order, stopping at the first error
    async fn upload_all(&self, items: &[IncomingMessage]) -> Result<Vec<String>, ProcessError> {
        let mut urls = Vec::with_capacity(items.len());
        for item in items {
            let Some(media) = item.media.as_ref() else {
                continue;
            };
            if media.is_video() {
                debug!(message_id = item.message_id, "Skipping video document");
                continue;
            }
            urls.push(self.upload_one(media).await?);
        }
        Ok(urls)
    }

    async fn upload_one(&self, media: &MediaItem) -> Result<String, ProcessError> {
        let staged = self
            .stager
            .download_and_validate(self.transport.as_ref(), media)
            .await?;
        let result = self.host.upload(staged.path()).await;
        staged.cleanup().await;
        Ok(result?)
    }

    /// Replace the acknowledgment with the final text, replying anew if the edit fails
    async fn finish(&self, msg: &IncomingMessage, ack_id: i32, text: &str, format: TextFormat) {
        let Err(e) = self.transport.edit(msg.chat_id, ack_id, text, format).await else {
            return;
        };
        warn!("Failed to edit processing notice: {e}");
        if let Err(e) = self
            .transport
            .reply(msg.chat_id, msg.message_id, text, format)
            .await
        {
            error!("Failed to deliver result message: {e}");
        }
    }
}

fn log_failure(e: &ProcessError) {
    match e {
        ProcessError::Upload(UploadError::Http { status, body }) => {
            error!(status, body = %body, "HTTP error during upload");
        }
        ProcessError::Upload(UploadError::Connect(source)) => {
            error!(error = ?source, "Network/DNS error");
        }
        other => error!(error = ?other, "General error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::media::{DocumentItem, PhotoItem};
    use crate::bot::transport::MockChatTransport;
    use crate::hosting::MockImageHost;
    use std::path::Path;

    const ADMIN: i64 = 42;
    const CHAT: i64 = 1000;

    fn photo(message_id: i32, album: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            sender_id: Some(ADMIN),
            chat_id: CHAT,
            message_id,
            media_group_id: album.map(ToString::to_string),
            media: Some(MediaItem::Photo(PhotoItem {
                file_id: format!("file-{message_id}"),
                file_unique_id: format!("uniq{message_id}"),
            })),
        }
    }

    fn orchestrator(transport: MockChatTransport, host: MockImageHost) -> UploadOrchestrator {
        let exts = [".jpg", ".png"].iter().map(ToString::to_string).collect();
        UploadOrchestrator::new(
            Arc::new(transport),
            Arc::new(host),
            FileStager::new(exts, 30.0, Duration::from_secs(5)),
            ADMIN,
            Duration::from_millis(50),
        )
    }

    fn write_fake_image(_: &str, dest: &Path) -> anyhow::Result<()> {
        std::fs::write(dest, b"\xFF\xD8\xFFfake-jpeg")?;
        Ok(())
    }

    fn url_for(path: &Path) -> Result<String, UploadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("https://lookmyimg.com/i/{name}"))
    }

    #[tokio::test]
    async fn test_non_admin_is_denied_without_upload() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .withf(|chat_id, reply_to, text, format| {
                *chat_id == CHAT
                    && *reply_to == 7
                    && text.to_string() == "Access denied. You are not authorized to use this bot."
                    && *format == TextFormat::Plain
            })
            .times(1)
            .returning(|_, _, _, _| Ok(8));
        transport.expect_download().never();
        transport.expect_edit().never();

        let mut host = MockImageHost::new();
        host.expect_upload().never();

        let mut msg = photo(7, None);
        msg.sender_id = Some(999);
        orchestrator(transport, host).handle_media(msg).await;
    }

    #[tokio::test]
    async fn test_message_without_sender_is_denied() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .withf(|_, _, text, _| text.to_string() == views::ACCESS_DENIED)
            .times(1)
            .returning(|_, _, _, _| Ok(8));
        let mut host = MockImageHost::new();
        host.expect_upload().never();

        let mut msg = photo(7, None);
        msg.sender_id = None;
        orchestrator(transport, host).handle_media(msg).await;
    }

    #[tokio::test]
    async fn test_single_photo_uploaded() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .withf(|_, _, text, _| text.to_string() == views::PROCESSING)
            .times(1)
            .returning(|_, _, _, _| Ok(500));
        transport
            .expect_download()
            .times(1)
            .returning(write_fake_image);
        transport
            .expect_edit()
            .withf(|chat_id, message_id, text, format| {
                *chat_id == CHAT
                    && *message_id == 500
                    && text.to_string()
                        == "<b>Uploaded successfully ❤️</b>\n\n<code>https://lookmyimg.com/i/uniq3.jpg</code>"
                    && *format == TextFormat::Html
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut host = MockImageHost::new();
        host.expect_upload().times(1).returning(url_for);

        orchestrator(transport, host).handle_media(photo(3, None)).await;
    }

    #[tokio::test]
    async fn test_album_processed_once_with_all_links() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .withf(|_, reply_to, text, _| *reply_to == 11 && text.to_string() == views::PROCESSING)
            .times(1)
            .returning(|_, _, _, _| Ok(900));
        transport
            .expect_download()
            .times(3)
            .returning(write_fake_image);
        transport
            .expect_edit()
            .withf(|chat_id, message_id, text, format| {
                *chat_id == CHAT
                    && *message_id == 900
                    && text.to_string()
                        == "<b>Uploaded successfully ❤️</b>\n\n<code>https://lookmyimg.com/i/uniq11.jpg, https://lookmyimg.com/i/uniq12.jpg, https://lookmyimg.com/i/uniq13.jpg</code>"
                    && *format == TextFormat::Html
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut host = MockImageHost::new();
        host.expect_upload().times(3).returning(url_for);

        let orch = orchestrator(transport, host);
        tokio::join!(
            orch.handle_media(photo(11, Some("album-x"))),
            orch.handle_media(photo(12, Some("album-x"))),
            orch.handle_media(photo(13, Some("album-x"))),
        );
    }

    #[tokio::test]
    async fn test_lone_video_document_reports_no_images() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .times(1)
            .returning(|_, _, _, _| Ok(77));
        transport.expect_download().never();
        transport
            .expect_edit()
            .withf(|chat_id, message_id, text, _| {
                *chat_id == CHAT
                    && *message_id == 77
                    && text.to_string() == "No image files found in that message/album."
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut host = MockImageHost::new();
        host.expect_upload().never();

        let msg = IncomingMessage {
            sender_id: Some(ADMIN),
            chat_id: CHAT,
            message_id: 5,
            media_group_id: None,
            media: Some(MediaItem::Document(DocumentItem {
                file_id: "vid".to_string(),
                file_unique_id: "AgADvid".to_string(),
                file_name: Some("clip.mp4".to_string()),
                mime_type: Some("video/mp4".to_string()),
            })),
        };
        orchestrator(transport, host).handle_media(msg).await;
    }

    #[tokio::test]
    async fn test_http_500_reported_in_place() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .times(1)
            .returning(|_, _, _, _| Ok(31));
        transport
            .expect_download()
            .times(1)
            .returning(write_fake_image);
        transport
            .expect_edit()
            .withf(|_, message_id, text, format| {
                *message_id == 31
                    && text.contains("Status: 500")
                    && text.contains("server error")
                    && *format == TextFormat::Plain
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut host = MockImageHost::new();
        host.expect_upload().times(1).returning(|_| {
            Err(UploadError::Http {
                status: 500,
                body: "server error".to_string(),
            })
        });

        orchestrator(transport, host).handle_media(photo(4, None)).await;
    }

    #[tokio::test]
    async fn test_album_failure_aborts_remaining_items() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .times(1)
            .returning(|_, _, _, _| Ok(60));
        transport
            .expect_download()
            .times(1)
            .returning(write_fake_image);
        transport
            .expect_edit()
            .withf(|_, _, text, _| {
                text.starts_with("Sorry, something went wrong:") && !text.contains("https://")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut host = MockImageHost::new();
        host.expect_upload().times(1).returning(|_| {
            Err(UploadError::UrlNotFound {
                body: "{}".to_string(),
            })
        });

        let orch = orchestrator(transport, host);
        tokio::join!(
            orch.handle_media(photo(21, Some("album-y"))),
            orch.handle_media(photo(22, Some("album-y"))),
        );
    }

    #[tokio::test]
    async fn test_failed_edit_falls_back_to_reply() {
        let mut transport = MockChatTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_reply()
            .withf(|_, _, text, _| text.to_string() == views::PROCESSING)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(70));
        transport
            .expect_edit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("message to edit not found")));
        transport
            .expect_reply()
            .withf(|_, _, text, _| text.to_string() == views::NO_IMAGES)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(71));

        let host = MockImageHost::new();
        let mut msg = photo(9, None);
        msg.media = None;
        orchestrator(transport, host).handle_media(msg).await;
    }

    #[tokio::test]
    async fn test_help_for_admin_only() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .withf(|_, _, text, format| {
                text.contains("Supported formats: JPG, PNG") && *format == TextFormat::Html
            })
            .times(1)
            .returning(|_, _, _, _| Ok(1));
        transport
            .expect_reply()
            .withf(|_, _, text, _| text.to_string() == views::ACCESS_DENIED)
            .times(1)
            .returning(|_, _, _, _| Ok(2));

        let orch = orchestrator(transport, MockImageHost::new());
        orch.handle_help(&photo(1, None)).await;

        let mut stranger = photo(2, None);
        stranger.sender_id = Some(7);
        orch.handle_help(&stranger).await;
    }

    #[tokio::test]
    async fn test_failed_ack_stops_album_buffering() {
        let mut transport = MockChatTransport::new();
        transport
            .expect_reply()
            .times(1)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("bot was blocked by the user")));
        transport.expect_download().never();
        transport.expect_edit().never();

        let mut host = MockImageHost::new();
        host.expect_upload().never();

        let orch = orchestrator(transport, host);
        orch.handle_media(photo(41, Some("album-z"))).await;
        // Late sibling is still suppressed but no longer held in memory
        orch.handle_media(photo(42, Some("album-z"))).await;

        assert_eq!(orch.albums.len(), 1);
        assert!(orch.albums.take_members("album-z").is_empty());
    }
}
