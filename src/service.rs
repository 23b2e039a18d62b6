use std::sync::Arc;

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheSnapshot, QueryCache, QueryFetcher, QueryPolicy, ResourceKey};
use crate::channel::manager::ChannelManager;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::Transport;

/// Running background refresh for one watched resource. Dropping the handle
/// leaves the task running until client shutdown; call [`PollHandle::stop`]
/// to end it early.
pub struct PollHandle {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl PollHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }
}

/// Entry point for everything the dashboard reads or writes: HTTP transport,
/// query cache and the realtime push channel behind one explicitly
/// constructed object. Endpoint methods live in the `api` modules.
pub struct DashboardClient {
    config: ClientConfig,
    transport: Arc<Transport>,
    cache: Arc<QueryCache>,
    channel: ChannelManager,
    shutdown: CancellationToken,
}

impl DashboardClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = Arc::new(Transport::new(&config));
        let channel = ChannelManager::new(&config);
        Ok(Self {
            transport,
            cache: Arc::new(QueryCache::new()),
            channel,
            shutdown: CancellationToken::new(),
            config,
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn channel(&self) -> &ChannelManager {
        &self.channel
    }

    pub fn snapshot(&self, key: &ResourceKey) -> Option<CacheSnapshot> {
        self.cache.snapshot(key)
    }

    /// Stops every watcher spawned from this client, disconnects the push
    /// channel and drops all cached values.
    pub async fn shutdown(&self) {
        debug!("shutting down dashboard client");
        self.shutdown.cancel();
        self.channel.disconnect().await;
        self.cache.clear();
    }

    /// Direct access to the query cache, for manual invalidation or
    /// inspection beyond the typed endpoint methods.
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    fn get_fetcher(&self, path: String, params: Vec<(String, String)>) -> QueryFetcher {
        let transport = Arc::clone(&self.transport);
        Arc::new(move || {
            let transport = Arc::clone(&transport);
            let path = path.clone();
            let params = params.clone();
            async move { transport.get(&path, &params).await }.boxed()
        })
    }

    /// Cache-routed read of one endpoint, deserialized into the caller's type.
    pub(crate) async fn query<T: DeserializeOwned>(
        &self,
        key: ResourceKey,
        policy: QueryPolicy,
        path: String,
        params: Vec<(String, String)>,
    ) -> Result<T, ClientError> {
        let value = self
            .cache
            .read(key, policy, self.get_fetcher(path, params))
            .await?;
        Ok(serde_json::from_value(Value::clone(&value))?)
    }

    /// Cache-routed read that keeps the payload untyped.
    pub async fn query_value(
        &self,
        key: ResourceKey,
        policy: QueryPolicy,
        path: String,
        params: Vec<(String, String)>,
    ) -> Result<Arc<Value>, ClientError> {
        self.cache
            .read(key, policy, self.get_fetcher(path, params))
            .await
    }

    /// Forced network refresh of one endpoint, bypassing freshness (the
    /// manual pull-to-refresh path).
    pub async fn refresh_value(
        &self,
        key: ResourceKey,
        policy: QueryPolicy,
        path: String,
        params: Vec<(String, String)>,
    ) -> Result<Arc<Value>, ClientError> {
        self.cache
            .refetch(key, policy, self.get_fetcher(path, params))
            .await
    }

    /// Spawns the background poll for one resource as a child of the client
    /// lifetime, so `shutdown()` ends it.
    pub(crate) fn watch(
        &self,
        key: ResourceKey,
        policy: QueryPolicy,
        path: String,
        params: Vec<(String, String)>,
    ) -> PollHandle {
        let cancel = self.shutdown.child_token();
        let join = self
            .cache
            .spawn_poll(key, policy, self.get_fetcher(path, params), cancel.clone());
        PollHandle { cancel, join }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_config_without_http_scheme() {
        let config = ClientConfig {
            api_base_url: "ftp://localhost:5000".to_string(),
            ..ClientConfig::default()
        };
        assert!(DashboardClient::new(config).is_err());
    }

    #[tokio::test]
    async fn shutdown_is_safe_when_never_connected() {
        let client = DashboardClient::new(ClientConfig::default()).unwrap();
        client.shutdown().await;
        assert!(!client.channel().is_connected());
    }
}
