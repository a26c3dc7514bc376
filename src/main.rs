use dotenvy::dotenv;
use lookmyimg_bot::config::Settings;
use lookmyimg_bot::logging::{init_logging, RedactionPatterns};
use lookmyimg_bot::runner::run_bot;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting LookMyImg uploader bot...");

    let settings = init_settings();

    if let Err(e) = run_bot(settings).await {
        error!("Bot stopped with error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn init_settings() -> Arc<Settings> {
    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let missing = settings.missing_required();
    if !missing.is_empty() {
        eprintln!(
            "Missing required env vars: {}\nSet them in the environment or in a .env file next to the binary.",
            missing.join(", ")
        );
        std::process::exit(1);
    }

    if let Err(e) = settings.extra_form_fields() {
        error!("EXTRA_FORM_FIELDS is not a valid JSON object: {}", e);
        std::process::exit(1);
    }

    info!("Configuration loaded successfully.");
    Arc::new(settings)
}
