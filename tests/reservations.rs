use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use reservations::greeting::GreetingService;
use reservations::initializer::{self, SEED_NAMES};
use reservations::reservation::Reservation;
use reservations::server::{serve, AppState};
use reservations::store::Store;

async fn start_server() -> (SocketAddr, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let state = AppState::new(
        Store::open(),
        GreetingService::default(),
        CancellationToken::new(),
    );
    tokio::spawn(serve(listener, state.clone()));

    (addr, state)
}

async fn get_reservations(addr: SocketAddr) -> reqwest::Response {
    reqwest::get(format!("http://{}/reservations", addr))
        .await
        .unwrap()
}

async fn names(addr: SocketAddr) -> Vec<String> {
    let response = get_reservations(addr).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let reservations: Vec<Reservation> = response.json().await.unwrap();
    reservations.into_iter().map(|r| r.name).collect()
}

#[tokio::test]
async fn test_seeded_reservations_are_listed() {
    let (addr, state) = start_server().await;

    let seeded = initializer::reseed(&state.reservations, &SEED_NAMES)
        .await
        .unwrap();

    let response = get_reservations(addr).await;
    let listed: Vec<Reservation> = response.json().await.unwrap();

    assert_eq!(listed, seeded);
    assert_eq!(listed.len(), 8);
    assert!(listed.iter().all(|r| r.id.is_some()));
}

#[tokio::test]
async fn test_rejected_batch_is_not_listed() {
    let (addr, state) = start_server().await;
    state.reservations.save_all(["Josh", "Zen"]).await.unwrap();

    let res = state.reservations.save_all(["Fish", "levi"]).await;

    assert!(res.is_err());
    assert_eq!(names(addr).await, vec!["Josh", "Zen"]);
}

#[tokio::test]
async fn test_failed_reseed_keeps_previous_reservations() {
    let (addr, state) = start_server().await;
    state.reservations.save_all(["Samuel"]).await.unwrap();

    let res = initializer::reseed(&state.reservations, &["Matt", "sarah"]).await;

    assert!(res.is_err());
    assert_eq!(names(addr).await, vec!["Samuel"]);
}

#[tokio::test]
async fn test_store_failure_is_a_server_error() {
    let (addr, state) = start_server().await;
    state.reservations.store().close();

    let response = get_reservations(addr).await;

    assert!(response.status().is_server_error());
}
