use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use relay_enrich::{EnrichError, EnrichmentGateway, HttpClassifier};
use relay_settings::{EndpointSettings, EnrichmentSettings, HandshakeMode, RelaySettings};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::http;
use crate::lifecycle;
use crate::registry::ConnectionRegistry;
use crate::router::RelayRouter;
use crate::session::{self, SessionContext};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RelayRouter>,
    pub started_at: Instant,
    pub heartbeat_interval: Duration,
    pub shutdown: CancellationToken,
}

impl AppState {
    fn session_context(&self) -> SessionContext {
        SessionContext {
            router: Arc::clone(&self.router),
            heartbeat_interval: self.heartbeat_interval,
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Build the Axum router: one WebSocket route per configured endpoint plus
/// the HTTP surfaces. Unknown paths fall through to 404.
pub fn build_router(state: AppState, endpoints: &[EndpointSettings]) -> Router {
    let mut router = Router::new()
        .route("/", get(http::index_handler))
        .route("/health", get(http::health_handler))
        .route("/devices", get(http::devices_handler))
        .route("/led", get(http::led_handler));

    for endpoint in endpoints {
        let mode = endpoint.handshake;
        router = router.route(
            &endpoint.path,
            get(move |ws: WebSocketUpgrade, State(state): State<AppState>| {
                ws_handler(ws, state, mode)
            }),
        );
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn ws_handler(ws: WebSocketUpgrade, state: AppState, mode: HandshakeMode) -> impl IntoResponse {
    let ctx = state.session_context();
    ws.on_upgrade(move |socket| session::run_session(socket, mode, ctx))
}

/// The enrichment gateway described by `settings`; disabled when no URL is set.
pub fn build_gateway(settings: &EnrichmentSettings) -> Result<EnrichmentGateway, EnrichError> {
    match &settings.url {
        Some(url) => {
            let classifier = HttpClassifier::new(url.clone(), settings.timeout())?;
            info!(url = %url, timeout_ms = settings.timeout_ms, "enrichment enabled");
            Ok(EnrichmentGateway::new(Arc::new(classifier), settings.timeout()))
        }
        None => {
            info!("no enrichment url configured, telemetry is forwarded unenriched");
            Ok(EnrichmentGateway::disabled())
        }
    }
}

/// Bind, start serving and start the idle sweep. Returns a handle to shut
/// it all down.
pub async fn start(
    settings: &RelaySettings,
    gateway: EnrichmentGateway,
) -> Result<ServerHandle, std::io::Error> {
    let server = &settings.server;
    let registry = Arc::new(ConnectionRegistry::new(
        settings.devices.identity_prefix.clone(),
        server.max_send_queue,
    ));
    let router = Arc::new(RelayRouter::new(Arc::clone(&registry), gateway));
    let shutdown = CancellationToken::new();
    let heartbeat_interval = Duration::from_secs(server.heartbeat_interval_secs);

    let state = AppState {
        router,
        started_at: Instant::now(),
        heartbeat_interval,
        shutdown: shutdown.clone(),
    };
    let app = build_router(state, &server.endpoints);

    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port)).await?;
    let local_addr = listener.local_addr()?;

    let sweep = lifecycle::start_sweep_task(
        Arc::clone(&registry),
        heartbeat_interval,
        Duration::from_secs(server.client_timeout_secs),
        shutdown.clone(),
    );

    let serve_shutdown = shutdown.clone();
    let serve = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "server stopped with error");
        }
    });

    info!(
        addr = %local_addr,
        endpoints = ?server.endpoints.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(),
        "relay started"
    );

    Ok(ServerHandle {
        local_addr,
        registry,
        shutdown,
        tasks: vec![serve, sweep],
    })
}

/// Handle returned by [`start`]; keeps background tasks alive.
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Cancel every task and wait for them, up to a bounded timeout.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        info!(task_count = self.tasks.len(), "waiting for server tasks");
        let drain = futures::future::join_all(self.tasks);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!("shutdown timed out after {SHUTDOWN_TIMEOUT:?}");
        }
    }
}
