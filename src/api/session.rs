//! Session lifecycle: the pooled HTTP transport and the auto-refresh task.
//!
//! A client is either closed (no transport) or open (transport live, plus a
//! refresh task when auto-refresh is enabled). Opening and closing are both
//! idempotent.

use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::client::{ClientState, InfinityClient};
use crate::config::ClientConfig;
use crate::error::{InfinityError, Result};

pub const CLIENT_USER_AGENT: &str = concat!(
    "infinity-stats/",
    env!("CARGO_PKG_VERSION"),
    " (Rust Bot API Wrapper; https://infinitybots.gg)"
);

const MAX_REDIRECTS: usize = 10;

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running auto-refresh loop
pub(crate) struct RefreshTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Stops the loop at its next suspension point and waits for it to exit.
    async fn stop(self) {
        let _ = self.shutdown.send(());
        match self.handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("⚠️ Auto-refresh task ended abnormally: {}", e),
        }
    }

    /// Synchronous teardown for drop paths that cannot await.
    pub(crate) fn abort(self) {
        self.handle.abort();
    }
}

fn build_transport(config: &ClientConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let mut token = HeaderValue::from_str(&config.token).map_err(|e| {
        InfinityError::ConfigError(format!("Bot token is not a valid header value: {}", e))
    })?;
    token.set_sensitive(true);
    headers.insert(AUTHORIZATION, token);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

impl InfinityClient {
    /// Opens the transport and, if enabled, the auto-refresh task.
    ///
    /// Calling this on an open session does nothing. Must run inside a tokio
    /// runtime when auto-refresh is enabled.
    pub async fn start_session(&self) -> Result<()> {
        self.open()
    }

    /// Cancels the auto-refresh task, waits for it to finish, then releases
    /// the transport. Calling this on a closed session does nothing.
    pub async fn close_session(&self) {
        let task = self
            .state
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.stop().await;
        }

        if write(&self.state.transport).take().is_some() {
            info!("🔌 Infinity API session closed");
        }
    }

    /// Opens the session and returns a guard that closes it again.
    ///
    /// Call [`SessionGuard::close`] for an orderly shutdown. If the guard is
    /// dropped instead (early return, panic, or the owning future being
    /// cancelled) the refresh task is aborted and the transport released
    /// immediately.
    pub async fn session(&self) -> Result<SessionGuard> {
        self.start_session().await?;
        Ok(SessionGuard {
            client: self.clone(),
            closed: false,
        })
    }

    /// Runs `operation` inside an open session, closing it afterwards whether
    /// the operation succeeded or not.
    pub async fn with_session<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(InfinityClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.session().await?;
        let result = operation(self.clone()).await;
        guard.close().await;
        result
    }

    pub fn is_session_open(&self) -> bool {
        read(&self.state.transport).is_some()
    }

    pub fn is_auto_refresh_running(&self) -> bool {
        self.state
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Live transport, opening the session first if needed.
    pub(crate) fn transport(&self) -> Result<reqwest::Client> {
        if let Some(transport) = read(&self.state.transport).as_ref() {
            return Ok(transport.clone());
        }
        self.open()?;
        read(&self.state.transport)
            .clone()
            .ok_or_else(|| InfinityError::Transport("Session closed while opening".into()))
    }

    fn open(&self) -> Result<()> {
        self.state.config.validate()?;
        {
            let mut transport = write(&self.state.transport);
            if transport.is_none() {
                *transport = Some(build_transport(&self.state.config)?);
                #[cfg(test)]
                self.state
                    .transport_allocations
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                info!(
                    "🔗 Infinity API session opened ({})",
                    self.state.config.base_url
                );
            }
        }

        if self.state.config.auto_refresh {
            let mut task = self
                .state
                .refresh_task
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if task.is_none() {
                let (shutdown, shutdown_rx) = oneshot::channel();
                let handle = tokio::spawn(refresh_loop(
                    Arc::downgrade(&self.state),
                    self.state.config.refresh_interval,
                    shutdown_rx,
                ));
                *task = Some(RefreshTask { shutdown, handle });
            }
        }

        Ok(())
    }

    /// Synchronous close used when a [`SessionGuard`] is dropped unclosed.
    fn release_now(&self) {
        let task = self
            .state
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        if write(&self.state.transport).take().is_some() {
            debug!("Infinity API session released without explicit close");
        }
    }
}

/// Replays the cached stats every `interval` until told to stop or until the
/// client itself is gone. Failed replays are logged and the loop carries on.
async fn refresh_loop(
    state: Weak<ClientState>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    debug!("Auto-refresh task started, interval {:?}", interval);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = sleep(interval) => {}
        }

        let Some(state) = state.upgrade() else {
            break;
        };
        let client = InfinityClient { state };
        let Some(stats) = client.cached_stats() else {
            continue;
        };

        info!("🔄 Auto-refreshing bot statistics (hourly)");
        tokio::select! {
            _ = &mut shutdown => break,
            result = client.post_bot_stats(stats) => match result {
                Ok(_) => info!("✅ Stats auto-refreshed successfully"),
                Err(e) => warn!("⚠️ Auto-refresh failed: {}", e),
            },
        }
    }

    info!("⏹️ Auto-refresh task stopped");
}

/// Keeps a session open for as long as it lives. See [`InfinityClient::session`].
pub struct SessionGuard {
    client: InfinityClient,
    closed: bool,
}

impl SessionGuard {
    pub async fn close(mut self) {
        self.closed = true;
        self.client.close_session().await;
    }
}

impl Deref for SessionGuard {
    type Target = InfinityClient;

    fn deref(&self) -> &InfinityClient {
        &self.client
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.closed {
            self.client.release_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn client(auto_refresh: bool) -> InfinityClient {
        InfinityClient::with_config(
            ClientConfig::new("test_token", "123456789")
                .with_base_url("http://127.0.0.1:9")
                .with_auto_refresh(auto_refresh),
        )
    }

    #[tokio::test]
    async fn test_start_session_is_idempotent() {
        let client = client(true);
        client.start_session().await.unwrap();
        client.start_session().await.unwrap();

        assert!(client.is_session_open());
        assert!(client.is_auto_refresh_running());
        assert_eq!(client.state.transport_allocations.load(Ordering::SeqCst), 1);

        client.close_session().await;
    }

    #[tokio::test]
    async fn test_close_session_is_idempotent() {
        let client = client(true);
        client.close_session().await;

        client.start_session().await.unwrap();
        client.close_session().await;
        client.close_session().await;

        assert!(!client.is_session_open());
        assert!(!client.is_auto_refresh_running());
    }

    #[tokio::test]
    async fn test_no_refresh_task_when_disabled() {
        let client = client(false);
        client.start_session().await.unwrap();
        assert!(client.is_session_open());
        assert!(!client.is_auto_refresh_running());
        client.close_session().await;
    }

    #[tokio::test]
    async fn test_reopen_allocates_fresh_transport() {
        let client = client(false);
        client.start_session().await.unwrap();
        client.close_session().await;
        client.start_session().await.unwrap();
        assert_eq!(client.state.transport_allocations.load(Ordering::SeqCst), 2);
        client.close_session().await;
    }

    #[tokio::test]
    async fn test_with_session_closes_on_error() {
        let client = client(true);
        let result: Result<()> = client
            .with_session(|c| async move {
                assert!(c.is_session_open());
                Err(InfinityError::api("Not Found", 404))
            })
            .await;

        assert_eq!(result.unwrap_err().status_code(), Some(404));
        assert!(!client.is_session_open());
        assert!(!client.is_auto_refresh_running());
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_session() {
        let client = client(true);
        {
            let guard = client.session().await.unwrap();
            assert!(guard.is_session_open());
        }
        assert!(!client.is_session_open());
        assert!(!client.is_auto_refresh_running());
    }

    #[tokio::test]
    async fn test_cancelled_scope_releases_session() {
        let client = client(true);
        let scoped = client.with_session(|_| std::future::pending::<Result<()>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(20), scoped).await;

        assert!(timed_out.is_err());
        assert!(!client.is_session_open());
        assert!(!client.is_auto_refresh_running());
    }

    #[tokio::test]
    async fn test_zero_refresh_interval_never_opens() {
        let client = InfinityClient::with_config(
            ClientConfig::new("test_token", "123456789")
                .with_base_url("http://127.0.0.1:9")
                .with_refresh_interval(Duration::ZERO),
        );

        let err = client.start_session().await.unwrap_err();
        assert!(matches!(err, InfinityError::ConfigError(_)));
        assert!(!client.is_session_open());
        assert!(!client.is_auto_refresh_running());
        assert_eq!(client.state.transport_allocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let config = ClientConfig::new("bad\ntoken", "1");
        let err = build_transport(&config).unwrap_err();
        assert!(matches!(err, InfinityError::ConfigError(_)));
    }
}
