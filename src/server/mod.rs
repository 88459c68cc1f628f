//! Server setup and request routing
//!
//! One TCP listener carries both protocols: every request lands in the
//! router's fallback handler, which upgrades it when it is a WebSocket
//! handshake and serves the static surface otherwise.

pub mod dispatcher;
pub mod http;
pub mod registry;
pub mod session;
pub mod ws;

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::{TcpListener, TcpSocket};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::recognizer::Recognizer;
use dispatcher::Dispatcher;
use registry::ConnectionRegistry;

pub struct StreamingServer {
    config: ServerConfig,
    recognizer: Arc<dyn Recognizer>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
}

impl StreamingServer {
    /// Validate the configuration and wire up the server. Call from within
    /// the tokio runtime; fails before any socket is opened.
    pub fn new(config: ServerConfig, recognizer: Arc<dyn Recognizer>) -> Result<Arc<Self>> {
        config.validate()?;

        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone(), config.max_queue);

        Ok(Arc::new(Self {
            config,
            recognizer,
            registry,
            dispatcher,
        }))
    }

    /// Bind the configured port with `SO_REUSEADDR`. Port 0 picks a free
    /// port; read it back from the listener's local address.
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        Ok(socket.listen(1024)?)
    }

    /// Serve until a shutdown signal arrives.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let app = build_router(self.clone());
        let addr = listener.local_addr()?;
        info!("Listening on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }

    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Build the router for the service: Prometheus rendering plus the
/// WebSocket/static fallback.
pub fn build_router(server: Arc<StreamingServer>) -> Router {
    let recorder_handle = metrics_handle();
    Router::new()
        .route(
            "/metrics",
            get(move || {
                let handle = recorder_handle.clone();
                async move { handle.render() }
            }),
        )
        .fallback(dispatch_request)
        .with_state(server)
}

/// The Prometheus recorder is process-global; install it once and share the
/// handle across servers (tests spin up several).
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn dispatch_request(
    State(server): State<Arc<StreamingServer>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    uri: Uri,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    match upgrade {
        Some(upgrade) => handle_upgrade(server, upgrade, remote),
        None => http::serve_static(&server.config.doc_root, &uri).await,
    }
}

fn handle_upgrade(
    server: Arc<StreamingServer>,
    upgrade: WebSocketUpgrade,
    remote: SocketAddr,
) -> Response {
    let active = server.registry.len();
    if active >= server.config.max_active_connections {
        warn!(
            "Refusing connection from {}: {}/{} connections active",
            remote, active, server.config.max_active_connections
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [("hint", "The server is overloaded. Please retry later.")],
            "The server is busy. Please retry later.",
        )
            .into_response();
    }

    let ctx = ws::ConnectionContext {
        recognizer: server.recognizer.clone(),
        registry: server.registry.clone(),
        dispatcher: server.dispatcher.clone(),
        tail_padding_secs: server.config.tail_padding_secs,
    };

    upgrade
        .max_message_size(server.config.max_message_bytes)
        .on_upgrade(move |socket| ws::run_connection(socket, remote, ctx))
}

/// Wait for a shutdown signal.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
