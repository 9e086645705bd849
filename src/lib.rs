//! Post Discord bot statistics to Infinity Bot List and read bot, user and
//! shard metadata back, independent of the Discord library the bot uses.

pub mod api;
pub mod config;
pub mod error;
pub mod shards;
pub mod utils;

// Re-export the client surface for easy access
pub use api::{
    AutoRefreshInfo, BotStats, InfinityClient, RateLimitInfo, SessionGuard, SyncInfinityClient,
    CLIENT_USER_AGENT,
};
pub use config::ClientConfig;
pub use error::{ErrorCategory, InfinityError, RetryPolicy};
pub use shards::{
    analyze_shard_distribution, calculate_shard_stats, generate_shard_report,
    DistributionAnalysis, ShardId, ShardStats, ShardStatsMap,
};
