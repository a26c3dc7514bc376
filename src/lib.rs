#![deny(missing_docs)]
//! LookMyImg upload bot.
//!
//! Receives images over Telegram, uploads them to an image host and replies
//! with the hosted links.

/// Telegram-facing logic: message model, staging, albums, orchestration.
pub mod bot;
/// Configuration management.
pub mod config;
/// Image host client and response parsing.
pub mod hosting;
/// Logging setup with secret redaction.
pub mod logging;
/// Telegram runtime entrypoint.
pub mod runner;
/// Utility functions.
pub mod utils;
