//! Transfer plan and purchase draft handlers

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::csv_attachment;
use super::inventory::{with_run, CellQuery};
use crate::error::AppResult;
use crate::services::query::{self, PurchaseDraft, StoreScope, TransferDraft};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TransferQuery {
    pub store: Option<String>,
    pub format: Option<String>,
}

/// Plan proposals touching the selected store
pub async fn list_transfers(State(state): State<AppState>, Query(params): Query<TransferQuery>) -> AppResult<Response> {
    let scope = StoreScope::parse(params.store.as_deref());
    with_run(&state, |run| {
        let proposals = query::transfers_for(&run.plan, &scope);
        if params.format.as_deref() == Some("csv") {
            csv_attachment("transfers.csv", &proposals)
        } else {
            Ok(Json(proposals).into_response())
        }
    })
    .await
}

/// Plan proposals grouped by origin store
pub async fn list_transfer_drafts(State(state): State<AppState>) -> AppResult<Json<Vec<TransferDraft>>> {
    with_run(&state, |run| Ok(Json(query::transfer_drafts(&run.plan, &state.catalog)))).await
}

/// Purchase suggestions grouped by supplier
pub async fn list_purchase_drafts(
    State(state): State<AppState>,
    Query(params): Query<CellQuery>,
) -> AppResult<Json<Vec<PurchaseDraft>>> {
    let filter = params.to_filter()?;
    with_run(&state, |run| {
        let cells = query::filter_cells(&run.cells, &filter);
        Ok(Json(query::purchase_drafts(&cells, &state.catalog)))
    })
    .await
}
