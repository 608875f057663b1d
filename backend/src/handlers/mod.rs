//! HTTP handlers for the inventory planner API

pub mod health;
pub mod inventory;
pub mod orders;
pub mod planning;
pub mod snapshot;

pub use health::*;
pub use inventory::*;
pub use orders::*;
pub use planning::*;
pub use snapshot::*;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppResult;
use crate::services::export::export_to_csv;

/// Comma-separated query value as a list; blanks are dropped
pub(crate) fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// CSV attachment response
pub(crate) fn csv_attachment<T: Serialize>(filename: &str, data: &[T]) -> AppResult<Response> {
    let csv = export_to_csv(data)?;
    let disposition = format!("attachment; filename=\"{}\"", filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
