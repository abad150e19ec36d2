//! archivebot library root.

pub mod ai;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod providers;
pub mod storage;
pub mod telegram;

pub use app::App;
pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use error::{Error, Result};
pub use telegram::run_telegram_daemon;
