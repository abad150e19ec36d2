//! Telegram bot integration.

pub mod client;
pub mod commands;
pub mod ingest;
pub mod sender;

pub use client::run_telegram_daemon;
pub use sender::TelegramResourceSender;
