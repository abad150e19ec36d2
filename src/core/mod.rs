//! Core module - caching and archive mutation paths.
//!
//! - `cache`: fixed-capacity LRU map
//! - `ai_data_cache`: TTL-bounded aggregates for the assistant
//! - `archive_manager`: writes that keep the aggregates honest

pub mod ai_data_cache;
pub mod archive_manager;
pub mod cache;

pub use ai_data_cache::{AiDataCache, CacheKey, Clock, RecentSample, Statistics, SystemClock};
pub use archive_manager::ArchiveManager;
pub use cache::BoundedCache;
