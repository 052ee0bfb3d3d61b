//! Canteen self-ordering kiosk backend.
//!
//! Customers fetch the menu, preview a bill and submit orders; each
//! confirmed order gets a sequential token number for staff call-out.
//! Staff list active orders and mark them Prepared / Served / Deleted;
//! served orders move to an append-only history. All ledger mutation runs
//! through a single-writer FIFO queue over JSON files, and every mutation
//! is pushed to open views over a server-sent-events stream.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod error;
pub mod ledger;
pub mod menu;
pub mod order;
pub mod routes;
pub mod state;
pub mod store;

use routes::{
    bill_handler, clear_served_handler, delete_order_handler, events_handler, get_order_handler,
    list_orders_handler, menu_handler, prepare_handler, serve_handler, served_handler,
    submit_handler,
};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/menu", get(menu_handler))
        .route("/bill", post(bill_handler))
        .route("/order", post(submit_handler))
        .route("/orders", get(list_orders_handler))
        .route(
            "/orders/{id}",
            get(get_order_handler).delete(delete_order_handler),
        )
        .route("/orders/{id}/prepare", post(prepare_handler))
        .route("/orders/{id}/serve", post(serve_handler))
        .route("/served", get(served_handler).delete(clear_served_handler))
        .route("/events", get(events_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");
    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
