use serde::Serialize;

use super::{ShardId, ShardStatsMap};

/// Both balance ratios must stay below this for a distribution to count as
/// well balanced.
pub const BALANCE_THRESHOLD: f64 = 0.2;

/// Result of [`analyze_shard_distribution`].
///
/// An empty input yields only `error`; otherwise `summary`, `distribution`
/// and `insights` are all present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DistributionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionSpread>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<DistributionInsights>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub total_shards: usize,
    pub total_servers: u64,
    pub total_users: u64,
    pub avg_servers_per_shard: f64,
    pub avg_users_per_shard: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSpread {
    pub min_servers: u64,
    pub max_servers: u64,
    pub min_users: u64,
    pub max_users: u64,
    pub server_balance_ratio: f64,
    pub user_balance_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionInsights {
    pub most_loaded_shard: ShardId,
    pub least_loaded_shard: ShardId,
    pub is_well_balanced: bool,
    pub balance_recommendation: String,
}

impl DistributionAnalysis {
    fn empty() -> Self {
        Self {
            error: Some("No shard statistics provided".to_string()),
            summary: None,
            distribution: None,
            insights: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `(max - min) / avg`, or 0 when the average is 0
fn balance_ratio(min: u64, max: u64, avg: f64) -> f64 {
    if avg > 0.0 {
        (max - min) as f64 / avg
    } else {
        0.0
    }
}

/// Summarizes how evenly load is spread across shards.
pub fn analyze_shard_distribution(shard_stats: &ShardStatsMap) -> DistributionAnalysis {
    // Seeding from the first entry keeps ties on the earliest shard id.
    let Some((&first_id, &first)) = shard_stats.iter().next() else {
        return DistributionAnalysis::empty();
    };

    let mut total_servers = 0u64;
    let mut total_users = 0u64;
    let (mut min_servers, mut max_servers) = (first.servers, first.servers);
    let (mut min_users, mut max_users) = (first.users, first.users);
    let (mut most_loaded, mut least_loaded) = (first_id, first_id);

    for (&shard_id, stats) in shard_stats {
        total_servers = total_servers.saturating_add(stats.servers);
        total_users = total_users.saturating_add(stats.users);

        if stats.servers > max_servers {
            max_servers = stats.servers;
            most_loaded = shard_id;
        }
        if stats.servers < min_servers {
            min_servers = stats.servers;
            least_loaded = shard_id;
        }
        min_users = min_users.min(stats.users);
        max_users = max_users.max(stats.users);
    }

    let shard_count = shard_stats.len();
    let avg_servers = total_servers as f64 / shard_count as f64;
    let avg_users = total_users as f64 / shard_count as f64;

    let server_balance = balance_ratio(min_servers, max_servers, avg_servers);
    let user_balance = balance_ratio(min_users, max_users, avg_users);

    let balance_recommendation = if server_balance < BALANCE_THRESHOLD {
        "Well balanced"
    } else {
        "Consider rebalancing shards"
    };

    DistributionAnalysis {
        error: None,
        summary: Some(DistributionSummary {
            total_shards: shard_count,
            total_servers,
            total_users,
            avg_servers_per_shard: round_to(avg_servers, 2),
            avg_users_per_shard: round_to(avg_users, 2),
        }),
        distribution: Some(DistributionSpread {
            min_servers,
            max_servers,
            min_users,
            max_users,
            server_balance_ratio: round_to(server_balance, 3),
            user_balance_ratio: round_to(user_balance, 3),
        }),
        insights: Some(DistributionInsights {
            most_loaded_shard: most_loaded,
            least_loaded_shard: least_loaded,
            is_well_balanced: server_balance < BALANCE_THRESHOLD
                && user_balance < BALANCE_THRESHOLD,
            balance_recommendation: balance_recommendation.to_string(),
        }),
    }
}
