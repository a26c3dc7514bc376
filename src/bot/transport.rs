use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, LinkPreviewOptions, MessageId, ParseMode, ReplyParameters};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// How a text should be rendered by Telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// Sent as-is
    Plain,
    /// Parsed as Telegram HTML, link previews disabled
    Html,
}

/// Chat operations the orchestrator needs from the messenger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Reply to `reply_to` in `chat_id`, returning the new message id
    async fn reply(
        &self,
        chat_id: i64,
        reply_to: i32,
        text: &str,
        format: TextFormat,
    ) -> Result<i32>;

    /// Replace the text of an existing message
    async fn edit(&self, chat_id: i64, message_id: i32, text: &str, format: TextFormat)
        -> Result<()>;

    /// Download a file by id into `dest`
    async fn download(&self, file_id: &str, dest: &Path) -> Result<()>;
}

/// `ChatTransport` backed by the Telegram Bot API.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wrap a bot handle.
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

const fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn reply(
        &self,
        chat_id: i64,
        reply_to: i32,
        text: &str,
        format: TextFormat,
    ) -> Result<i32> {
        let req = self
            .bot
            .send_message(ChatId(chat_id), text.to_string())
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)));
        let sent = match format {
            TextFormat::Plain => req.await?,
            TextFormat::Html => {
                req.parse_mode(ParseMode::Html)
                    .link_preview_options(no_preview())
                    .await?
            }
        };
        Ok(sent.id.0)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        format: TextFormat,
    ) -> Result<()> {
        let req = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text.to_string());
        match format {
            TextFormat::Plain => req.await?,
            TextFormat::Html => {
                req.parse_mode(ParseMode::Html)
                    .link_preview_options(no_preview())
                    .await?
            }
        };
        Ok(())
    }

    async fn download(&self, file_id: &str, dest: &Path) -> Result<()> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await?;
        let mut dst = tokio::fs::File::create(dest).await?;
        self.bot.download_file(&file.path, &mut dst).await?;
        dst.flush().await?;
        debug!(path = %dest.display(), size = file.size, "Downloaded file from Telegram");
        Ok(())
    }
}
