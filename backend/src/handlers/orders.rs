//! HTTP handlers for the order ledger

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::snapshot::refresh_session;
use super::{csv_attachment, split_list};
use crate::error::{AppError, AppResult};
use crate::models::{OrderFilter, OrderKind, OrderLineInput, OrderSelector, OrderState, OrderSummary};
use crate::services::EmittedOrder;
use crate::AppState;
use shared::types::DateRange;

#[derive(Debug, Deserialize)]
pub struct EmitOrderRequest {
    pub kind: OrderKind,
    pub lines: Vec<OrderLineInput>,
}

/// Append a new order; the session is re-analyzed so the lines count as in transit
pub async fn emit_order(
    State(state): State<AppState>,
    Json(input): Json<EmitOrderRequest>,
) -> AppResult<Json<EmittedOrder>> {
    let emitted = state.ledger.emit_orders(input.kind, input.lines).await?;
    refresh_session(&state).await;
    Ok(Json(emitted))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub state: Option<String>,
    pub kind: Option<String>,
    pub counterparty: Option<String>,
    pub destination: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub order_id: Option<String>,
    pub format: Option<String>,
}

impl OrderQuery {
    pub fn to_filter(&self) -> AppResult<OrderFilter> {
        let states = split_list(self.state.as_deref())
            .iter()
            .map(|v| {
                OrderState::parse(v).ok_or_else(|| AppError::Validation {
                    field: "state".to_string(),
                    message: format!("Unknown order state '{}'", v),
                    message_es: format!("Estado de orden desconocido '{}'", v),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        let kinds = split_list(self.kind.as_deref())
            .iter()
            .map(|v| {
                OrderKind::parse(v).ok_or_else(|| AppError::Validation {
                    field: "kind".to_string(),
                    message: format!("Unknown order kind '{}'", v),
                    message_es: format!("Tipo de orden desconocido '{}'", v),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AppError::Validation {
                    field: "from".to_string(),
                    message: "Start date must not be after end date".to_string(),
                    message_es: "La fecha inicial no puede ser posterior a la final".to_string(),
                });
            }
        }

        Ok(OrderFilter {
            states,
            kinds,
            counterparty: self.counterparty.clone().filter(|s| !s.trim().is_empty()),
            destination: self.destination.clone().filter(|s| !s.trim().is_empty()),
            emitted: DateRange::new(self.from, self.to),
            order_id: self.order_id.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Ledger rows matching the query
pub async fn list_orders(State(state): State<AppState>, Query(query): Query<OrderQuery>) -> AppResult<Response> {
    let filter = query.to_filter()?;
    let lines = state.ledger.history(&filter).await?;
    if query.format.as_deref() == Some("csv") {
        csv_attachment("orders.csv", &lines)
    } else {
        Ok(Json(lines).into_response())
    }
}

/// Orders rolled up from the matching rows
pub async fn list_order_summaries(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<Vec<OrderSummary>>> {
    let filter = query.to_filter()?;
    Ok(Json(state.ledger.orders(&filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStateRequest {
    pub selector: OrderSelector,
    pub state: OrderState,
}

#[derive(Debug, Serialize)]
pub struct UpdateStateResponse {
    pub changed: usize,
}

/// Move the selected rows to a new state, all or nothing
pub async fn update_order_states(
    State(state): State<AppState>,
    Json(input): Json<UpdateStateRequest>,
) -> AppResult<Json<UpdateStateResponse>> {
    let changed = state.ledger.update_states(&input.selector, input.state).await?;
    if changed > 0 {
        refresh_session(&state).await;
    }
    Ok(Json(UpdateStateResponse { changed }))
}
