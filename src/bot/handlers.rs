use super::media::IncomingMessage;
use super::orchestrator::UploadOrchestrator;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show usage instructions
    #[command(description = "Show usage instructions.")]
    Start,
    /// Show usage instructions
    #[command(description = "Show usage instructions.")]
    Help,
}

/// Whether a message carries something the upload flow handles
#[must_use]
pub fn has_media(msg: &Message) -> bool {
    msg.photo().is_some() || msg.document().is_some()
}

/// `/start` and `/help` endpoint
///
/// # Errors
///
/// Never fails; delivery errors are logged by the orchestrator.
pub async fn handle_command(
    msg: Message,
    _cmd: Command,
    orchestrator: Arc<UploadOrchestrator>,
) -> Result<(), teloxide::RequestError> {
    orchestrator
        .handle_help(&IncomingMessage::from_telegram(&msg))
        .await;
    respond(())
}

/// Photo/document endpoint
///
/// The run is spawned so that album siblings from the same chat reach the
/// album gate while the admitted run is still collecting.
///
/// # Errors
///
/// Never fails.
pub async fn handle_media(
    msg: Message,
    orchestrator: Arc<UploadOrchestrator>,
) -> Result<(), teloxide::RequestError> {
    let incoming = IncomingMessage::from_telegram(&msg);
    tokio::spawn(async move {
        orchestrator.handle_media(incoming).await;
    });
    respond(())
}
