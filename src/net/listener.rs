//! TCP listener bootstrap with bounded bind retries.
//!
//! # Responsibilities
//! - Resolve the configured host
//! - Bind, retrying transport errors with a fixed backoff
//! - Publish the bound port and the shared secret through the run file
//!
//! # Design Decisions
//! - Binding goes through the [`Binder`] seam so tests can inject failures
//! - The run file is written exactly once, after a successful bind

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;
use crate::error::ServiceError;
use crate::net::runfile::RunFile;
use crate::net::secret::SharedSecret;
use crate::observability::metrics;
use crate::resilience::{is_transport_bind_error, RetryBudget};

/// Opens a listening socket.
pub trait Binder: Send + Sync {
    fn bind(&self, addr: SocketAddr) -> BoxFuture<'_, io::Result<TcpListener>>;
}

/// Binds real TCP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpBinder;

impl Binder for TcpBinder {
    fn bind(&self, addr: SocketAddr) -> BoxFuture<'_, io::Result<TcpListener>> {
        TcpListener::bind(addr).boxed()
    }
}

/// The host and actual port the service listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A bound socket and where it is reachable.
#[derive(Debug)]
pub struct BoundListener {
    pub listener: TcpListener,
    pub endpoint: Endpoint,
    pub attempts: u32,
}

/// Binds the service listener and publishes the run file.
pub struct ListenerBootstrapper {
    config: ListenerConfig,
    binder: Arc<dyn Binder>,
    run_file: Option<(PathBuf, SharedSecret)>,
}

impl ListenerBootstrapper {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            binder: Arc::new(TcpBinder),
            run_file: None,
        }
    }

    pub fn with_binder(mut self, binder: Arc<dyn Binder>) -> Self {
        self.binder = binder;
        self
    }

    /// Write `{port, secret}` to `path` once the socket is bound.
    pub fn publish_to(mut self, path: impl Into<PathBuf>, secret: SharedSecret) -> Self {
        self.run_file = Some((path.into(), secret));
        self
    }

    /// Bind within the retry budget.
    pub async fn bind(&self) -> Result<BoundListener, ServiceError> {
        let requested = format!("{}:{}", self.config.host, self.config.port);
        let addr = resolve(&self.config.host, self.config.port)
            .await
            .map_err(|source| ServiceError::Listen {
                addr: requested.clone(),
                source,
            })?;

        let backoff = Duration::from_millis(self.config.backoff_ms);
        let mut budget = RetryBudget::new(self.config.retries);
        let mut last_error = None;

        while budget.try_consume() {
            match self.binder.bind(addr).await {
                Ok(listener) => {
                    metrics::record_bind_attempt(true);
                    return self.publish(listener, requested, budget.attempts()).await;
                }
                Err(source) if !is_transport_bind_error(&source) => {
                    metrics::record_bind_attempt(false);
                    return Err(ServiceError::Listen {
                        addr: requested,
                        source,
                    });
                }
                Err(source) => {
                    metrics::record_bind_attempt(false);
                    if budget.remaining() > 0 {
                        tracing::warn!(
                            address = %addr,
                            attempt = budget.attempts(),
                            remaining = budget.remaining(),
                            delay_ms = self.config.backoff_ms,
                            error = %source,
                            "Bind failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(source);
                }
            }
        }

        Err(ServiceError::ListenExhausted {
            addr: requested,
            attempts: budget.attempts(),
            source: last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrInUse)),
        })
    }

    async fn publish(
        &self,
        listener: TcpListener,
        requested: String,
        attempts: u32,
    ) -> Result<BoundListener, ServiceError> {
        let local = listener.local_addr().map_err(|source| ServiceError::Listen {
            addr: requested,
            source,
        })?;
        let endpoint = Endpoint {
            host: self.config.host.clone(),
            port: local.port(),
        };

        if let Some((path, secret)) = &self.run_file {
            let run_file = RunFile::new(endpoint.port, secret.expose());
            let target = path.clone();
            tokio::task::spawn_blocking(move || run_file.write(&target))
                .await
                .unwrap_or_else(|join| Err(io::Error::other(join)))
                .map_err(|source| ServiceError::RunFile {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(path = %path.display(), "Run file written");
        }

        tracing::info!(address = %local, attempts, "Listener bound");

        Ok(BoundListener {
            listener,
            endpoint,
            attempts,
        })
    }
}

async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("host `{host}` did not resolve to any address"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyBinder {
        failures: u32,
        kind: io::ErrorKind,
        calls: AtomicU32,
        watch: Option<PathBuf>,
        seen_run_file: AtomicU32,
    }

    impl FlakyBinder {
        fn new(failures: u32, kind: io::ErrorKind) -> Arc<Self> {
            Arc::new(Self::watching(failures, kind, None))
        }

        /// Also counts binds that found `path` already written.
        fn watching(failures: u32, kind: io::ErrorKind, watch: Option<PathBuf>) -> Self {
            Self {
                failures,
                kind,
                calls: AtomicU32::new(0),
                watch,
                seen_run_file: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Binder for FlakyBinder {
        fn bind(&self, addr: SocketAddr) -> BoxFuture<'_, io::Result<TcpListener>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.watch.as_deref().is_some_and(std::path::Path::exists) {
                self.seen_run_file.fetch_add(1, Ordering::SeqCst);
            }
            if call < self.failures {
                let kind = self.kind;
                async move { Err(io::Error::from(kind)) }.boxed()
            } else {
                TcpListener::bind(addr).boxed()
            }
        }
    }

    fn config(retries: u32) -> ListenerConfig {
        ListenerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            retries,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_port_and_writes_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.json");
        let secret = SharedSecret::from_value("abc123");

        let bound = ListenerBootstrapper::new(config(0))
            .publish_to(&path, secret)
            .bind()
            .await
            .unwrap();

        assert_ne!(bound.endpoint.port, 0);
        assert_eq!(bound.endpoint.to_string(), format!("127.0.0.1:{}", bound.endpoint.port));
        assert_eq!(RunFile::read(&path).unwrap(), RunFile::new(bound.endpoint.port, "abc123"));
    }

    #[tokio::test]
    async fn retries_transport_errors() {
        let binder = FlakyBinder::new(2, io::ErrorKind::AddrInUse);
        let bound = ListenerBootstrapper::new(config(3))
            .with_binder(binder.clone())
            .bind()
            .await
            .unwrap();
        assert_eq!(bound.attempts, 3);
        assert_eq!(binder.calls(), 3);
    }

    #[tokio::test]
    async fn run_file_is_written_once_after_retried_bind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.json");
        let binder = Arc::new(FlakyBinder::watching(
            2,
            io::ErrorKind::AddrInUse,
            Some(path.clone()),
        ));

        let bound = ListenerBootstrapper::new(config(3))
            .with_binder(binder.clone())
            .publish_to(&path, SharedSecret::from_value("s3cret"))
            .bind()
            .await
            .unwrap();

        assert_eq!(bound.attempts, 3);
        // Nothing was published while binds were still failing.
        assert_eq!(binder.seen_run_file.load(Ordering::SeqCst), 0);
        assert_eq!(RunFile::read(&path).unwrap(), RunFile::new(bound.endpoint.port, "s3cret"));

        // A single atomic write leaves no temp files behind.
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("companion.json")]);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.json");
        let binder = FlakyBinder::new(u32::MAX, io::ErrorKind::AddrInUse);

        let err = ListenerBootstrapper::new(config(2))
            .with_binder(binder.clone())
            .publish_to(&path, SharedSecret::generate(8))
            .bind()
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ListenExhausted { attempts: 3, .. }));
        assert_eq!(binder.calls(), 3);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn non_transport_errors_are_not_retried() {
        let binder = FlakyBinder::new(u32::MAX, io::ErrorKind::InvalidInput);
        let err = ListenerBootstrapper::new(config(5))
            .with_binder(binder.clone())
            .bind()
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Listen { .. }));
        assert_eq!(binder.calls(), 1);
    }
}
