//! User-facing texts.

use super::orchestrator::ProcessError;
use super::staging::FileStager;
use crate::config::ERROR_DETAILS_MAX_CHARS;
use crate::hosting::UploadError;
use crate::utils::truncate_str;

/// Reply to anyone but the administrator
pub const ACCESS_DENIED: &str = "Access denied. You are not authorized to use this bot.";
/// Acknowledgment posted before processing starts
pub const PROCESSING: &str = "Processing image(s)…";
/// Final text when nothing uploadable was found
pub const NO_IMAGES: &str = "No image files found in that message/album.";

/// Success message with all links in a single monospace block
#[must_use]
pub fn render_success(urls: &[String]) -> String {
    format!(
        "<b>Uploaded successfully ❤️</b>\n\n<code>{}</code>",
        html_escape::encode_text(&urls.join(", "))
    )
}

/// Help text for `/start` and `/help` (HTML)
#[must_use]
pub fn render_help(stager: &FileStager) -> String {
    let formats = stager
        .allowed_exts()
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_uppercase())
        .collect::<Vec<_>>()
        .join(", ");
    #[allow(clippy::cast_possible_truncation)]
    let max_mb = stager.max_file_mb() as i64;

    format!(
        "Send me one or more <b>photos</b> or <b>image files</b> and I'll upload them to LookMyImg and reply with the link(s).\n\n\
         If you send multiple images at once, you'll get a single message with all links separated by commas.\n\n\
         Supported formats: {formats}. Max size: ~{max_mb} MB.\n\n\
         Admin notes: set API creds in <code>.env</code>."
    )
}

/// Plain-text failure message for the user
#[must_use]
pub fn render_failure(error: &ProcessError) -> String {
    match error {
        ProcessError::Upload(UploadError::Http { status, body }) => format!(
            "Upload failed with an HTTP error.\nStatus: {status}\nDetails: {}",
            truncate_str(body, ERROR_DETAILS_MAX_CHARS)
        ),
        ProcessError::Upload(UploadError::Connect(e)) => format!(
            "Network error while connecting to LookMyImg. This usually means DNS could not resolve the API host or outbound internet is blocked on the server.\n\n\
             Try: 1) Verify LOOKMYIMG_ENDPOINT host, 2) Check DNS on server (dig +short <hostname>), 3) Force IPv4 or set a public resolver like 1.1.1.1/8.8.8.8, 4) Ensure firewall allows HTTPS egress.\n\n\
             Details: {}: {e}",
            std::any::type_name::<reqwest::Error>()
        ),
        other => format!("Sorry, something went wrong: {other}"),
    }
}
