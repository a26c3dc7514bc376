use crate::bot::handlers::{handle_command, handle_media, has_media, Command};
use crate::bot::{TelegramTransport, UploadOrchestrator};
use crate::config::Settings;
use crate::hosting::{HostConfig, LookMyImgClient};
use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::info;

/// Run the Telegram transport runtime until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the upload client cannot be configured.
pub async fn run_bot(settings: Arc<Settings>) -> Result<()> {
    let host = LookMyImgClient::new(HostConfig::from_settings(&settings)?)?;
    info!(endpoint = %settings.lookmyimg_endpoint, "Upload client initialized.");

    let bot = Bot::new(settings.bot_token.clone());
    let transport = TelegramTransport::new(bot.clone());
    let orchestrator = Arc::new(UploadOrchestrator::from_settings(
        &settings,
        Arc::new(transport),
        Arc::new(host),
    ));

    info!(admin_id = settings.admin_id, "Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![orchestrator])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| has_media(&msg)).endpoint(handle_media))
}
