//! Per-shard statistics: even distribution of totals, load analysis and
//! a printable report. Nothing here touches the network.

pub mod analysis;
pub mod report;

pub use analysis::{
    analyze_shard_distribution, DistributionAnalysis, DistributionInsights, DistributionSpread,
    DistributionSummary,
};
pub use report::generate_shard_report;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ShardId = u32;

/// Servers and users handled by one shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    pub servers: u64,
    pub users: u64,
}

impl ShardStats {
    pub fn new(servers: u64, users: u64) -> Self {
        Self { servers, users }
    }
}

/// Shard id to stats. Iteration is ascending by shard id.
pub type ShardStatsMap = BTreeMap<ShardId, ShardStats>;

/// Splits the totals evenly across `shard_ids`.
///
/// The integer remainder of each total is handed out one unit at a time to
/// the shards at positions 0, 1, 2, ... in the order given, so every shard
/// ends up within one unit of the mean and the sums match the totals.
pub fn calculate_shard_stats(
    total_servers: u64,
    total_users: u64,
    shard_ids: &[ShardId],
) -> ShardStatsMap {
    if shard_ids.is_empty() {
        return ShardStatsMap::new();
    }

    let shard_count = shard_ids.len() as u64;
    let servers_per_shard = total_servers / shard_count;
    let users_per_shard = total_users / shard_count;
    let server_remainder = total_servers % shard_count;
    let user_remainder = total_users % shard_count;

    shard_ids
        .iter()
        .enumerate()
        .map(|(position, &shard_id)| {
            let position = position as u64;
            let extra_servers = u64::from(position < server_remainder);
            let extra_users = u64::from(position < user_remainder);
            (
                shard_id,
                ShardStats::new(servers_per_shard + extra_servers, users_per_shard + extra_users),
            )
        })
        .collect()
}
