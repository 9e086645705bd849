//! Infinity Bot List API client
//!
//! - Session lifecycle with an optional hourly stats refresh task
//! - Rate-limit aware requests with exponential backoff on 429
//! - Async client plus a blocking facade over the same engine

pub mod blocking;
pub mod client;
pub mod request;
pub mod session;
pub mod types;

pub use blocking::SyncInfinityClient;
pub use client::InfinityClient;
pub use session::{SessionGuard, CLIENT_USER_AGENT};
pub use types::{AutoRefreshInfo, BotStats, RateLimitInfo, RateLimitState};
