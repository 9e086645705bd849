use serde_json::Value;
use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime};

use super::client::InfinityClient;
use super::types::{AutoRefreshInfo, BotStats, RateLimitInfo};
use crate::config::ClientConfig;
use crate::error::{InfinityError, Result};
use crate::shards::{DistributionAnalysis, ShardId, ShardStatsMap};

/// Blocking wrapper around [`InfinityClient`].
///
/// Every network call opens a fresh session, runs the async operation and
/// closes the session again, all on one current-thread runtime owned by this
/// wrapper. Do not call it from inside an async context; doing so returns
/// [`InfinityError::RuntimeError`].
pub struct SyncInfinityClient {
    client: InfinityClient,
    runtime: Option<Runtime>,
}

impl SyncInfinityClient {
    pub fn new(token: impl Into<String>, bot_id: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(token, bot_id))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InfinityError::RuntimeError(format!("Failed to build runtime: {}", e)))?;

        Ok(Self {
            client: InfinityClient::with_config(config),
            runtime: Some(runtime),
        })
    }

    /// The async client driven by this wrapper
    pub fn client(&self) -> &InfinityClient {
        &self.client
    }

    fn run<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(InfinityClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if Handle::try_current().is_ok() {
            return Err(InfinityError::RuntimeError(
                "SyncInfinityClient cannot be used from within an async runtime; use InfinityClient"
                    .to_string(),
            ));
        }
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| InfinityError::RuntimeError("Runtime already shut down".to_string()))?;

        runtime.block_on(self.client.with_session(operation))
    }

    pub fn post_bot_stats(&self, stats: BotStats) -> Result<Value> {
        self.run(|client| async move { client.post_bot_stats(stats).await })
    }

    pub fn post_shard_stats(
        &self,
        shard_id: ShardId,
        server_count: u64,
        user_count: Option<u64>,
    ) -> Result<Value> {
        self.run(|client| async move {
            client
                .post_shard_stats(shard_id, server_count, user_count)
                .await
        })
    }

    pub fn post_batch_shard_stats(&self, shard_stats: &ShardStatsMap) -> Result<Value> {
        self.run(|client| async move { client.post_batch_shard_stats(shard_stats).await })
    }

    pub fn get_bot_info(&self) -> Result<Value> {
        self.run(|client| async move { client.get_bot_info().await })
    }

    pub fn get_user_info(&self, user_id: &str) -> Result<Value> {
        self.run(|client| async move { client.get_user_info(user_id).await })
    }

    pub fn get_shard_info(&self, shard_id: ShardId) -> Result<Value> {
        self.run(|client| async move { client.get_shard_info(shard_id).await })
    }

    pub fn get_all_shard_info(&self) -> Result<Value> {
        self.run(|client| async move { client.get_all_shard_info().await })
    }

    pub fn get_rate_limit_info(&self) -> RateLimitInfo {
        self.client.get_rate_limit_info()
    }

    pub fn get_auto_refresh_info(&self) -> AutoRefreshInfo {
        self.client.get_auto_refresh_info()
    }

    pub fn calculate_shard_stats(
        &self,
        total_servers: u64,
        total_users: u64,
        shard_ids: &[ShardId],
    ) -> ShardStatsMap {
        self.client
            .calculate_shard_stats(total_servers, total_users, shard_ids)
    }

    pub fn analyze_shard_distribution(&self, shard_stats: &ShardStatsMap) -> DistributionAnalysis {
        self.client.analyze_shard_distribution(shard_stats)
    }

    pub fn generate_shard_report(&self, shard_stats: &ShardStatsMap) -> String {
        self.client.generate_shard_report(shard_stats)
    }
}

impl Drop for SyncInfinityClient {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside another runtime.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
