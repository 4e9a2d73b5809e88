//! Session manager.
//!
//! Owns the cache of live connections, one per `host_key`:
//!
//! ```text
//! absent --acquire--> connecting --ok--> live --close / transport error--> absent
//!                         |
//!                         +--failure--> absent (nothing cached)
//! ```
//!
//! # Concurrency
//!
//! Connect and close for one key run under that key's async mutex, and the
//! cache is re-checked after the lock is taken, so any number of concurrent
//! acquires for an unseen key produce exactly one connect. Cache hits never
//! touch the lock. Different keys never wait on each other.
//!
//! There is no health check: a dead connection is discovered when a command
//! fails on it, which evicts it so the next call reconnects.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::executor::RemoteExecutor;
use crate::registry::HostRegistry;
use crate::resolver::ConnectionResolver;
use crate::storage::{DashMapSessionStorage, SessionStorage};
use crate::transport::Connector;
use crate::types::{ExecutionResult, SessionInfo};

use super::Session;

pub struct SessionManager {
    registry: Arc<dyn HostRegistry>,
    resolver: ConnectionResolver,
    connector: Arc<dyn Connector>,
    storage: Arc<dyn SessionStorage>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    executor: RemoteExecutor,
}

impl SessionManager {
    pub fn new(
        registry: Arc<dyn HostRegistry>,
        resolver: ConnectionResolver,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self::with_storage(
            registry,
            resolver,
            connector,
            Arc::new(DashMapSessionStorage::new()),
        )
    }

    pub fn with_storage(
        registry: Arc<dyn HostRegistry>,
        resolver: ConnectionResolver,
        connector: Arc<dyn Connector>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            registry,
            resolver,
            connector,
            storage,
            locks: DashMap::new(),
            executor: RemoteExecutor::new(),
        }
    }

    fn key_lock(&self, host_key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(host_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return the cached session for `host_key`, connecting if there is none.
    ///
    /// A failed connect caches nothing, so the next call tries again.
    pub async fn acquire(&self, host_key: &str) -> Result<Arc<Session>, SessionError> {
        if let Some(session) = self.storage.get(host_key) {
            return Ok(session);
        }

        let lock = self.key_lock(host_key);
        let _guard = lock.lock().await;

        // Another task may have connected while we waited
        if let Some(session) = self.storage.get(host_key) {
            return Ok(session);
        }

        let descriptor = self
            .registry
            .resolve(host_key)
            .await
            .ok_or_else(|| SessionError::HostNotFound(host_key.to_string()))?;
        let auth = self.resolver.resolve_auth(host_key, &descriptor).await?;
        debug!("Connecting to {} with {} auth", host_key, auth.method());

        let connection = self
            .connector
            .connect(host_key, &descriptor, auth)
            .await
            .inspect_err(|e| error!("Failed to open session for {}: {}", host_key, e))?;

        let session = Arc::new(Session::new(host_key, &descriptor, connection));
        self.storage.insert(session.clone());
        info!(
            "Opened session {} for {} ({}@{})",
            session.id(),
            host_key,
            descriptor.username,
            descriptor.hostname
        );
        Ok(session)
    }

    /// Run a command on the host's session.
    ///
    /// A transport failure evicts the session it happened on; the call itself
    /// is not retried.
    pub async fn execute(
        &self,
        host_key: &str,
        command: &str,
    ) -> Result<ExecutionResult, SessionError> {
        let session = self.acquire(host_key).await?;

        match self.executor.run(&session, command).await {
            Err(e) if e.is_transport() => {
                self.evict(&session).await;
                Err(e)
            }
            result => result,
        }
    }

    async fn evict(&self, session: &Session) {
        // Only drop it if a concurrent reconnect has not already replaced it
        if let Some(stale) = self
            .storage
            .remove_if_same(session.host_key(), session.id())
        {
            warn!(
                "Evicted session {} for {} after transport failure",
                stale.id(),
                stale.host_key()
            );
            stale.connection().disconnect().await;
        }
    }

    /// Disconnect and forget the host's session. No-op when there is none.
    pub async fn close(&self, host_key: &str) {
        let lock = self.key_lock(host_key);
        let _guard = lock.lock().await;

        if let Some(session) = self.storage.remove(host_key) {
            session.connection().disconnect().await;
            info!("Closed session {} for {}", session.id(), host_key);
        }
    }

    /// Close every cached session concurrently.
    pub async fn close_all(&self) {
        let host_keys = self.storage.host_keys();
        if host_keys.is_empty() {
            return;
        }
        info!("Closing {} session(s)", host_keys.len());
        join_all(host_keys.iter().map(|key| self.close(key))).await;
    }

    /// Host keys with a cached session, sorted.
    pub fn list_open(&self) -> Vec<String> {
        self.storage.host_keys()
    }

    /// Metadata of every cached session.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.storage.list()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::config::test_env::{ENV_TEST_MUTEX, remove_env};
    use crate::registry::{HostDescriptor, StaticHostRegistry};
    use crate::transport::testing::{FakeConnection, FakeConnector};

    fn registry() -> Arc<StaticHostRegistry> {
        let registry = StaticHostRegistry::new();
        registry.insert("web-1", HostDescriptor::key("203.0.113.10", "/keys/web"));
        registry.insert("web-2", HostDescriptor::key("203.0.113.11", "/keys/web"));
        Arc::new(registry)
    }

    fn manager(connector: Arc<FakeConnector>) -> SessionManager {
        SessionManager::new(registry(), ConnectionResolver::new(), connector)
    }

    mod acquire {
        use super::*;

        #[tokio::test]
        async fn test_second_acquire_reuses_session() {
            let connector = Arc::new(FakeConnector::default());
            let manager = manager(connector.clone());

            let first = manager.acquire("web-1").await.unwrap();
            let second = manager.acquire("web-1").await.unwrap();

            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(connector.connect_count(), 1);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_concurrent_acquires_connect_once() {
            let connector = Arc::new(FakeConnector {
                delay: Some(Duration::from_millis(50)),
                ..Default::default()
            });
            let manager = Arc::new(manager(connector.clone()));

            let tasks: Vec<_> = (0..10)
                .map(|_| {
                    let manager = manager.clone();
                    tokio::spawn(async move { manager.acquire("web-1").await })
                })
                .collect();
            let sessions: Vec<Arc<Session>> = join_all(tasks)
                .await
                .into_iter()
                .map(|r| r.unwrap().unwrap())
                .collect();

            assert_eq!(connector.connect_count(), 1);
            assert!(sessions.iter().all(|s| s.id() == sessions[0].id()));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_different_keys_connect_independently() {
            let connector = Arc::new(FakeConnector {
                delay: Some(Duration::from_millis(20)),
                ..Default::default()
            });
            let manager = Arc::new(manager(connector.clone()));

            let (a, b) = tokio::join!(manager.acquire("web-1"), manager.acquire("web-2"));
            assert_ne!(a.unwrap().id(), b.unwrap().id());
            assert_eq!(connector.connect_count(), 2);
            assert_eq!(manager.list_open(), vec!["web-1", "web-2"]);
        }

        #[tokio::test]
        async fn test_unknown_host_never_connects() {
            let connector = Arc::new(FakeConnector::default());
            let manager = manager(connector.clone());

            let err = manager.execute("unknown-host", "ls").await.unwrap_err();

            assert!(matches!(err, SessionError::HostNotFound(ref h) if h == "unknown-host"));
            assert_eq!(connector.connect_count(), 0);
            assert!(manager.list_open().is_empty());
        }

        #[tokio::test]
        async fn test_missing_password_secret_caches_nothing() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env("MISSING_ENV");
            }
            let registry = StaticHostRegistry::new();
            registry.insert("db-1", HostDescriptor::password("db.example.com", "MISSING_ENV"));
            let connector = Arc::new(FakeConnector::default());
            let manager = SessionManager::new(
                Arc::new(registry),
                ConnectionResolver::new(),
                connector.clone(),
            );

            let err = manager.acquire("db-1").await.unwrap_err();

            assert!(matches!(err, SessionError::Configuration(_)));
            assert_eq!(connector.connect_count(), 0);
            assert!(manager.list_open().is_empty());
        }

        #[tokio::test]
        async fn test_auth_failure_is_not_cached() {
            let connector = Arc::new(FakeConnector::default());
            connector.reject_auth.store(true, Ordering::SeqCst);
            let manager = manager(connector.clone());

            let err = manager.acquire("web-1").await.unwrap_err();
            assert!(matches!(err, SessionError::AuthenticationFailed { .. }));
            assert!(manager.list_open().is_empty());

            connector.reject_auth.store(false, Ordering::SeqCst);
            manager.acquire("web-1").await.unwrap();
            assert_eq!(connector.connect_count(), 2);
        }
    }

    mod execute {
        use super::*;

        #[tokio::test]
        async fn test_execute_reuses_connection() {
            let connector = Arc::new(FakeConnector::with_connections(vec![FakeConnection::ok(
                "Filesystem\n/dev/sda1 50%\n",
                0,
            )]));
            let manager = manager(connector.clone());

            let first = manager.execute("web-1", "df -h").await.unwrap();
            let second = manager.execute("web-1", "uptime").await.unwrap();

            assert_eq!(first.output, vec!["Filesystem", "/dev/sda1 50%"]);
            assert_eq!(first.exit_code, Some(0));
            assert!(second.complete);
            assert_eq!(connector.connect_count(), 1);
            assert_eq!(connector.issued()[0].commands(), vec!["df -h", "uptime"]);
        }

        #[tokio::test]
        async fn test_nonzero_exit_keeps_session() {
            let connector = Arc::new(FakeConnector::with_connections(vec![FakeConnection::ok(
                "", 1,
            )]));
            let manager = manager(connector.clone());

            let result = manager.execute("web-1", "false").await.unwrap();
            assert_eq!(result.exit_code, Some(1));
            assert_eq!(manager.list_open(), vec!["web-1"]);
        }

        #[tokio::test]
        async fn test_transport_failure_evicts_then_reconnects() {
            let connector = Arc::new(FakeConnector::with_connections(vec![
                FakeConnection::broken("partial line\n", "connection reset by peer"),
                FakeConnection::ok("up 3 days\n", 0),
            ]));
            let manager = manager(connector.clone());

            let err = manager.execute("web-1", "uptime").await.unwrap_err();
            assert!(err.is_transport());
            assert_eq!(
                err.partial_output().map(|p| p.output.clone()),
                Some(vec!["partial line".to_string()])
            );
            assert!(manager.list_open().is_empty());
            assert_eq!(
                connector.issued()[0].disconnects.load(Ordering::SeqCst),
                1
            );

            let result = manager.execute("web-1", "uptime").await.unwrap();
            assert_eq!(result.output, vec!["up 3 days"]);
            assert_eq!(connector.connect_count(), 2);
        }

        #[tokio::test]
        async fn test_eviction_spares_replacement_session() {
            let connector = Arc::new(FakeConnector::with_connections(vec![
                FakeConnection::ok("", 0),
                FakeConnection::ok("", 0),
            ]));
            let manager = manager(connector.clone());

            let stale = manager.acquire("web-1").await.unwrap();
            manager.close("web-1").await;
            let fresh = manager.acquire("web-1").await.unwrap();

            manager.evict(&stale).await;

            assert_eq!(manager.acquire("web-1").await.unwrap().id(), fresh.id());
            assert_eq!(
                connector.issued()[1].disconnects.load(Ordering::SeqCst),
                0
            );
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_non_multiplexed_connection_serializes_commands() {
            let connector = Arc::new(FakeConnector::with_connections(vec![FakeConnection {
                delay: Some(Duration::from_millis(20)),
                not_multiplexed: true,
                exit_code: Some(0),
                ..Default::default()
            }]));
            let manager = Arc::new(manager(connector.clone()));
            manager.acquire("web-1").await.unwrap();

            let tasks: Vec<_> = (0..5)
                .map(|i| {
                    let manager = manager.clone();
                    tokio::spawn(async move { manager.execute("web-1", &format!("job {}", i)).await })
                })
                .collect();
            for result in join_all(tasks).await {
                result.unwrap().unwrap();
            }

            let connection = &connector.issued()[0];
            assert_eq!(connection.max_in_flight.load(Ordering::SeqCst), 1);
            assert_eq!(connection.commands().len(), 5);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_multiplexed_connection_runs_commands_concurrently() {
            let connector = Arc::new(FakeConnector::with_connections(vec![FakeConnection {
                delay: Some(Duration::from_millis(100)),
                exit_code: Some(0),
                ..Default::default()
            }]));
            let manager = Arc::new(manager(connector.clone()));
            manager.acquire("web-1").await.unwrap();

            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let manager = manager.clone();
                    tokio::spawn(async move { manager.execute("web-1", "sleep 0.1").await })
                })
                .collect();
            join_all(tasks).await;

            assert!(connector.issued()[0].max_in_flight.load(Ordering::SeqCst) > 1);
        }
    }

    mod close {
        use super::*;

        #[tokio::test]
        async fn test_close_is_idempotent() {
            let connector = Arc::new(FakeConnector::default());
            let manager = manager(connector.clone());
            manager.acquire("web-1").await.unwrap();

            manager.close("web-1").await;
            manager.close("web-1").await;
            manager.close("never-opened").await;

            assert!(manager.list_open().is_empty());
            assert_eq!(
                connector.issued()[0].disconnects.load(Ordering::SeqCst),
                1
            );
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_close_during_connect_waits_then_removes() {
            let connector = Arc::new(FakeConnector {
                delay: Some(Duration::from_millis(100)),
                ..Default::default()
            });
            let manager = Arc::new(manager(connector.clone()));

            let acquiring = {
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire("web-1").await })
            };
            // Let the connect start and take the key lock
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(connector.connect_count(), 1);

            manager.close("web-1").await;
            acquiring.await.unwrap().unwrap();

            assert!(manager.list_open().is_empty());
            assert_eq!(connector.connect_count(), 1);
            assert_eq!(
                connector.issued()[0].disconnects.load(Ordering::SeqCst),
                1
            );
        }

        #[tokio::test]
        async fn test_acquire_after_close_reconnects() {
            let connector = Arc::new(FakeConnector::default());
            let manager = manager(connector.clone());

            let first = manager.acquire("web-1").await.unwrap();
            manager.close("web-1").await;
            let second = manager.acquire("web-1").await.unwrap();

            assert_ne!(first.id(), second.id());
            assert_eq!(connector.connect_count(), 2);
        }

        #[tokio::test]
        async fn test_close_all_disconnects_everything() {
            let connector = Arc::new(FakeConnector::default());
            let manager = manager(connector.clone());
            manager.acquire("web-1").await.unwrap();
            manager.acquire("web-2").await.unwrap();

            manager.close_all().await;

            assert!(manager.list_open().is_empty());
            assert!(
                connector
                    .issued()
                    .iter()
                    .all(|c| c.disconnects.load(Ordering::SeqCst) == 1)
            );
        }

        #[tokio::test]
        async fn test_sessions_reports_metadata() {
            let connector = Arc::new(FakeConnector::default());
            let manager = manager(connector);
            let session = manager.acquire("web-1").await.unwrap();

            let infos = manager.sessions();
            assert_eq!(infos.len(), 1);
            assert_eq!(infos[0].session_id, session.id().to_string());
            assert_eq!(infos[0].hostname, "203.0.113.10");
            assert_eq!(infos[0].username, "root");
        }
    }
}
