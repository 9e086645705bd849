use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shards::{ShardId, ShardStatsMap};

/// Remaining quota assumed until the service reports otherwise.
pub const DEFAULT_RATE_LIMIT_REMAINING: u32 = 100;

/// Below this many remaining requests a warning is logged.
pub const LOW_RATE_LIMIT_THRESHOLD: u32 = 10;

/// Bot-wide statistics posted to `/bots/{id}/stats`.
///
/// Absent optional fields are left out of the request body entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotStats {
    #[serde(rename = "servers")]
    pub server_count: u64,
    #[serde(rename = "users", skip_serializing_if = "Option::is_none")]
    pub user_count: Option<u64>,
    #[serde(rename = "shards", skip_serializing_if = "Option::is_none")]
    pub shard_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_list: Option<Vec<ShardId>>,
}

impl BotStats {
    pub fn new(server_count: u64) -> Self {
        Self {
            server_count,
            user_count: None,
            shard_count: None,
            shard_list: None,
        }
    }

    pub fn with_users(mut self, user_count: u64) -> Self {
        self.user_count = Some(user_count);
        self
    }

    pub fn with_shards(mut self, shard_count: u64) -> Self {
        self.shard_count = Some(shard_count);
        self
    }

    pub fn with_shard_list(mut self, shard_list: Vec<ShardId>) -> Self {
        self.shard_list = Some(shard_list);
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ShardStatsPayload {
    pub shard_id: ShardId,
    pub servers: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchShardStatsPayload<'a> {
    pub shard_stats: &'a ShardStatsMap,
}

/// Rate-limit quota as last reported by the service. Advisory only: requests
/// are never held back because of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            remaining: DEFAULT_RATE_LIMIT_REMAINING,
            reset_at: None,
        }
    }
}

/// The last successfully posted [`BotStats`], replayed by auto-refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CachedStats {
    pub stats: BotStats,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
    /// Never negative; 0 when no reset time is known
    pub reset_in_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoRefreshInfo {
    pub enabled: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub next_refresh: Option<DateTime<Utc>>,
    /// Never negative; 0 when nothing has been posted yet
    pub seconds_until_next: f64,
    pub has_stats_cached: bool,
}

/// Seconds from now until `at`, clamped at zero
pub(crate) fn seconds_until(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    at.map(|at| (at - now).num_milliseconds().max(0) as f64 / 1000.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_bot_stats_omits_absent_fields() {
        let minimal = serde_json::to_value(BotStats::new(100)).unwrap();
        assert_eq!(minimal, json!({"servers": 100}));

        let full = serde_json::to_value(
            BotStats::new(100)
                .with_users(5000)
                .with_shards(2)
                .with_shard_list(vec![0, 1]),
        )
        .unwrap();
        assert_eq!(
            full,
            json!({"servers": 100, "users": 5000, "shards": 2, "shard_list": [0, 1]})
        );
    }

    #[test]
    fn test_batch_payload_keys_are_shard_ids() {
        let stats: ShardStatsMap = [(0, crate::shards::ShardStats::new(50, 1000))]
            .into_iter()
            .collect();
        let body = serde_json::to_value(BatchShardStatsPayload { shard_stats: &stats }).unwrap();
        assert_eq!(body, json!({"shard_stats": {"0": {"servers": 50, "users": 1000}}}));
    }

    #[test]
    fn test_seconds_until_never_negative() {
        let now = Utc::now();
        assert_eq!(seconds_until(None, now), 0.0);
        assert_eq!(seconds_until(Some(now - Duration::seconds(30)), now), 0.0);
        assert_eq!(seconds_until(Some(now + Duration::seconds(30)), now), 30.0);
    }
}
