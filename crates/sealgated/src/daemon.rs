//! Daemon lifecycle: startup, health checks, systemd notify, listeners

use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use sealgate_core::config::SealgateConfig;
use sealgate_gateway::{BackendResponder, Gateway, Responder};
use sealgate_storage::Backend;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::http::HttpState;
use crate::metrics::{HealthState, MeteredResponder, RequestMetrics};

/// Front-end mode: line protocol (plus optional REST) in front of a backend.
pub async fn run_frontend(config: SealgateConfig) -> Result<()> {
    info!(backend = ?config.backend.kind, "gateway starting");

    let backend =
        sealgate_storage::build_backend(&config.backend).context("building storage backend")?;
    probe_backend(backend.as_ref()).await;

    let gateway = Arc::new(
        Gateway::new(&config.crypto, backend.clone()).context("initialising gateway crypto")?,
    );
    info!(key_size = gateway.key_size(), "record keys configured");

    let shutdown = Shutdown::install()?;
    let metrics = start_metrics(&config, backend).await?;

    if let Some(addr) = config.daemon.http_listen.clone() {
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding REST listener {addr}"))?;
        info!(addr = %addr, "http: listening");
        let state = HttpState {
            gateway: gateway.clone(),
            metrics: metrics.clone(),
        };
        let stop = shutdown.signal();
        tokio::spawn(async move {
            if let Err(e) = crate::http::serve(listener, state, stop).await {
                error!("http server failed: {e}");
            }
        });
    }

    let responder = Arc::new(MeteredResponder::new(gateway, metrics));
    serve_lines(&config.daemon.listen, "gateway", responder, shutdown).await
}

/// Backend mode: the backend line protocol over a local OpenDAL store.
pub async fn run_backend(config: SealgateConfig) -> Result<()> {
    info!(backend = ?config.backend.kind, "backend server starting");

    let store: Arc<dyn Backend> = Arc::new(
        sealgate_storage::build_store(&config.backend).context("building backend store")?,
    );
    probe_backend(store.as_ref()).await;

    let shutdown = Shutdown::install()?;
    let metrics = start_metrics(&config, store.clone()).await?;
    let responder = Arc::new(MeteredResponder::new(
        Arc::new(BackendResponder::new(store)),
        metrics,
    ));
    serve_lines(&config.daemon.listen, "backend", responder, shutdown).await
}

async fn probe_backend(backend: &dyn Backend) {
    match sealgate_storage::check_health(backend).await {
        Ok(()) => info!(backend = backend.kind(), "backend: reachable"),
        Err(e) => warn!(backend = backend.kind(), "backend: {e:#}  (continuing)"),
    }
}

/// Register request metrics and, if configured, serve them.
///
/// The metrics listener is bound before returning so a port clash (for
/// example a gateway and a backend server on one host, both on the default
/// address) stops startup instead of leaving the daemon without metrics.
async fn start_metrics(
    config: &SealgateConfig,
    backend: Arc<dyn Backend>,
) -> Result<RequestMetrics> {
    let mut registry = Registry::default();
    let metrics = RequestMetrics::new(&mut registry);

    if let Some(addr) = config.daemon.metrics_addr.as_deref() {
        let listener = TcpListener::bind(addr).await.with_context(|| {
            format!("binding metrics listener {addr} (set daemon.metrics_addr to move it)")
        })?;
        info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");
        let state = HealthState {
            registry: Arc::new(registry),
            backend,
        };
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(listener, state).await {
                error!("metrics server failed: {e}");
            }
        });
    }
    Ok(metrics)
}

async fn serve_lines(
    addr: &str,
    role: &'static str,
    responder: Arc<dyn Responder>,
    shutdown: Shutdown,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {role} listener {addr}"))?;
    info!(addr = %addr, role, "line protocol: listening");

    notify_ready();

    sealgate_gateway::serve(listener, responder, shutdown.signal())
        .await
        .with_context(|| format!("{role} listener"))?;
    info!(role, "stopped");
    Ok(())
}

/// Fans SIGINT/SIGTERM out to every listener.
struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    fn install() -> Result<Self> {
        let mut sigterm = signal(SignalKind::terminate()).context("registering SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("registering SIGINT handler")?;
        let (tx, _) = broadcast::channel(1);
        let notify = tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = sigint.recv() => info!("received SIGINT"),
            }
            let _ = notify.send(());
        });
        Ok(Self { tx })
    }

    /// A future that resolves once shutdown has been requested.
    fn signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }
}

fn notify_ready() {
    // Send sd_notify(READY=1) to systemd if running as a service
    // Uses $NOTIFY_SOCKET env var; no-op if not set
    if let Ok(socket) = std::env::var("NOTIFY_SOCKET") {
        use std::os::unix::net::UnixDatagram;
        if let Ok(sock) = UnixDatagram::unbound() {
            let _ = sock.send_to(b"READY=1\n", &socket);
            tracing::debug!(notify_socket = %socket, "sent systemd READY=1");
        }
    }
}
