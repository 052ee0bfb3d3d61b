use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{
    error::AppError,
    ledger::Receipt,
    menu::{Bill, MenuItem, Selection},
    order::{Order, OrderRequest},
    state::AppState,
};

#[derive(Serialize)]
pub struct OkMsg {
    ok: bool,
}

impl OkMsg {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

pub async fn menu_handler(State(state): State<Arc<AppState>>) -> Json<Vec<MenuItem>> {
    Json(state.menu.clone())
}

#[derive(Deserialize)]
pub struct BillRequest {
    #[serde(default)]
    items: Vec<Selection>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    lines: Vec<String>,
    grand_total: String,
    total: u64,
}

/// Bill preview: computed and returned without touching the ledger.
pub async fn bill_handler(
    Json(payload): Json<BillRequest>,
) -> Result<Json<BillResponse>, AppError> {
    let bill = Bill::compute(&payload.items);
    if bill.lines.is_empty() {
        return Err(AppError::Validation(
            "at least one item with a positive quantity required".into(),
        ));
    }

    Ok(Json(BillResponse {
        lines: bill.formatted_lines(),
        grand_total: bill.grand_total_line(),
        total: bill.total,
    }))
}

pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Receipt>, AppError> {
    let receipt = state.ledger.submit(payload).await?;
    Ok(Json(receipt))
}

pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.ledger.active().await?))
}

pub async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.ledger.find(&id).await?))
}

pub async fn prepare_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.ledger.prepare(&id).await?;
    Ok(OkMsg::ok())
}

pub async fn serve_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.ledger.serve(&id).await?;
    Ok(OkMsg::ok())
}

pub async fn delete_order_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.ledger.remove(&id).await?;
    Ok(OkMsg::ok())
}

pub async fn served_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.ledger.served().await?))
}

pub async fn clear_served_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    state.ledger.clear_served().await?;
    Ok(OkMsg::ok())
}

/// Server-sent ledger events. Observers re-fetch the full snapshot on any
/// event; a lagged subscriber simply catches up on the next one.
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.ledger.subscribe()).filter_map(|event| match event {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok::<_, Infallible>(
                Event::default().event(event.kind()).data(data),
            ))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
