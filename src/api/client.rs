use chrono::{DateTime, Utc};
use log::info;
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};

use super::session::{read, write, RefreshTask};
use super::types::{
    seconds_until, AutoRefreshInfo, BatchShardStatsPayload, BotStats, CachedStats, RateLimitInfo,
    RateLimitState, ShardStatsPayload,
};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::shards::{self, DistributionAnalysis, ShardId, ShardStatsMap};

/// State shared by every handle to one client and, weakly, by its refresh task.
pub(crate) struct ClientState {
    pub(crate) config: ClientConfig,
    pub(crate) transport: RwLock<Option<reqwest::Client>>,
    pub(crate) refresh_task: Mutex<Option<RefreshTask>>,
    pub(crate) rate_limit: RwLock<RateLimitState>,
    pub(crate) last_stats: RwLock<Option<CachedStats>>,
    #[cfg(test)]
    pub(crate) transport_allocations: std::sync::atomic::AtomicUsize,
}

impl Drop for ClientState {
    fn drop(&mut self) {
        let task = self
            .refresh_task
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Async client for the Infinity Bot List API.
///
/// Cloning is cheap and every clone shares the same session, rate-limit
/// state and cached stats. Prefer [`InfinityClient::with_session`] or
/// [`InfinityClient::session`] over pairing `start_session`/`close_session`
/// by hand.
#[derive(Clone)]
pub struct InfinityClient {
    pub(crate) state: Arc<ClientState>,
}

impl InfinityClient {
    /// Client with default settings and auto-refresh enabled
    pub fn new(token: impl Into<String>, bot_id: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::new(token, bot_id))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        info!(
            "🤖 Infinity client ready for bot {} (auto-refresh: {})",
            config.bot_id, config.auto_refresh
        );
        Self {
            state: Arc::new(ClientState {
                config,
                transport: RwLock::new(None),
                refresh_task: Mutex::new(None),
                rate_limit: RwLock::new(RateLimitState::default()),
                last_stats: RwLock::new(None),
                #[cfg(test)]
                transport_allocations: std::sync::atomic::AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.state.config
    }

    fn bot_id(&self) -> &str {
        &self.state.config.bot_id
    }

    /// Posts bot-wide statistics, retrying on rate limits.
    ///
    /// On success the stats become the payload the auto-refresh task replays.
    pub async fn post_bot_stats(&self, stats: BotStats) -> Result<Value> {
        let endpoint = format!("/bots/{}/stats", self.bot_id());
        let response = self
            .state
            .config
            .retry
            .execute(|| self.post(&endpoint, &stats))
            .await?;

        *write(&self.state.last_stats) = Some(CachedStats {
            stats,
            submitted_at: Utc::now(),
        });

        Ok(response)
    }

    /// Posts statistics for a single shard, retrying on rate limits.
    pub async fn post_shard_stats(
        &self,
        shard_id: ShardId,
        server_count: u64,
        user_count: Option<u64>,
    ) -> Result<Value> {
        let endpoint = format!("/bots/{}/shard/{}/stats", self.bot_id(), shard_id);
        let payload = ShardStatsPayload {
            shard_id,
            servers: server_count,
            users: user_count,
        };
        self.state
            .config
            .retry
            .execute(|| self.post(&endpoint, &payload))
            .await
    }

    /// Posts every shard in one request. Not retried on rate limits.
    pub async fn post_batch_shard_stats(&self, shard_stats: &ShardStatsMap) -> Result<Value> {
        let endpoint = format!("/bots/{}/stats/batch", self.bot_id());
        self.post(&endpoint, &BatchShardStatsPayload { shard_stats })
            .await
    }

    pub async fn get_bot_info(&self) -> Result<Value> {
        self.get(&format!("/bots/{}", self.bot_id())).await
    }

    pub async fn get_user_info(&self, user_id: &str) -> Result<Value> {
        self.get(&format!("/users/{}", user_id)).await
    }

    pub async fn get_shard_info(&self, shard_id: ShardId) -> Result<Value> {
        self.get(&format!("/bots/{}/shard/{}", self.bot_id(), shard_id))
            .await
    }

    pub async fn get_all_shard_info(&self) -> Result<Value> {
        self.get(&format!("/bots/{}/shards", self.bot_id())).await
    }

    pub fn get_rate_limit_info(&self) -> RateLimitInfo {
        let state = *read(&self.state.rate_limit);
        RateLimitInfo {
            remaining: state.remaining,
            reset_at: state.reset_at,
            reset_in_seconds: seconds_until(state.reset_at, Utc::now()),
        }
    }

    pub fn get_auto_refresh_info(&self) -> AutoRefreshInfo {
        let last_refresh = self.last_refresh();
        let next_refresh = last_refresh.and_then(|last| {
            chrono::Duration::from_std(self.state.config.refresh_interval)
                .ok()
                .and_then(|interval| last.checked_add_signed(interval))
        });

        AutoRefreshInfo {
            enabled: self.state.config.auto_refresh,
            last_refresh,
            next_refresh,
            seconds_until_next: seconds_until(next_refresh, Utc::now()),
            has_stats_cached: last_refresh.is_some(),
        }
    }

    /// Stats the auto-refresh task will replay next, if any
    pub fn cached_stats(&self) -> Option<BotStats> {
        read(&self.state.last_stats)
            .as_ref()
            .map(|cached| cached.stats.clone())
    }

    fn last_refresh(&self) -> Option<DateTime<Utc>> {
        read(&self.state.last_stats)
            .as_ref()
            .map(|cached| cached.submitted_at)
    }

    pub fn calculate_shard_stats(
        &self,
        total_servers: u64,
        total_users: u64,
        shard_ids: &[ShardId],
    ) -> ShardStatsMap {
        shards::calculate_shard_stats(total_servers, total_users, shard_ids)
    }

    pub fn analyze_shard_distribution(&self, shard_stats: &ShardStatsMap) -> DistributionAnalysis {
        shards::analyze_shard_distribution(shard_stats)
    }

    pub fn generate_shard_report(&self, shard_stats: &ShardStatsMap) -> String {
        shards::generate_shard_report(shard_stats)
    }
}

impl std::fmt::Debug for InfinityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfinityClient")
            .field("config", &self.state.config)
            .field("session_open", &self.is_session_open())
            .finish()
    }
}
