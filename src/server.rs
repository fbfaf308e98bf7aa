use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use std::future::{self, Future};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::connection::Connection;
use crate::greeting::GreetingService;
use crate::initializer;
use crate::pipeline::ReservationService;
use crate::reservation::Reservation;
use crate::store::Store;
use crate::Error;

/// Everything the request handlers share.
#[derive(Clone)]
pub struct AppState {
    pub reservations: ReservationService,
    pub greetings: GreetingService,
    /// Cancelled to stop the server. Open sockets are closed as well.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(store: Store, greetings: GreetingService, shutdown: CancellationToken) -> AppState {
        AppState {
            reservations: ReservationService::new(store),
            greetings,
            shutdown,
        }
    }
}

pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind(config.addr()).await?;
    let store = Store::open();
    let shutdown = CancellationToken::new();

    tokio::spawn(cancel_on_signal(signal::ctrl_c(), shutdown.clone()));

    let state = AppState::new(
        store.clone(),
        GreetingService::new(config.greeting_interval()),
        shutdown,
    );

    if !config.no_seed {
        initializer::spawn(state.reservations.clone());
    }

    let res = serve(listener, state).await;
    store.close();

    res
}

/// Cancels `shutdown` once `signal` fires. If listening for the signal fails the server keeps
/// running; it can then only be stopped through the token.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => {
            error!("Failed to listen for the shutdown signal: {}", e);
            future::pending::<()>().await;
        }
    }
}

/// Serves requests on `listener` until the shutdown token of `state` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), Error> {
    info!("Reservation service listening on {}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Reservation service stopped");
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reservations", get(reservations))
        .route("/ws/greetings", get(greetings))
        .with_state(state)
}

#[instrument(skip_all)]
async fn reservations(State(state): State<AppState>) -> Result<Json<Vec<Reservation>>, Error> {
    let reservations = state.reservations.find_all().await?;
    debug!(count = reservations.len(), "Listing reservations");

    Ok(Json(reservations))
}

async fn greetings(
    ws: WebSocketUpgrade,
    ConnectInfo(client_address): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    info!("Accepted connection from {:?}", client_address);

    ws.on_upgrade(move |socket| async move {
        let conn = Connection::new(
            socket,
            client_address,
            state.greetings.clone(),
            state.shutdown.child_token(),
        );

        if let Err(e) = conn.handle().await {
            error!("Connection from {} failed: {}", client_address, e);
        }
    })
}
