//! Order ledger models

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use super::CellKey;
use crate::types::{from_decimal, DateRange};

/// Timestamp layout embedded in order identifiers
pub const ORDER_ID_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Kind of emitted order; determines the identifier prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Purchase generated from engine suggestions
    PurchaseSuggested,
    /// Purchase entered by an operator
    PurchaseSpecial,
    /// Transfer generated from the transfer plan
    TransferAuto,
    /// Transfer entered by an operator
    TransferSpecial,
}

impl OrderKind {
    pub const ALL: [OrderKind; 4] = [
        OrderKind::PurchaseSuggested,
        OrderKind::PurchaseSpecial,
        OrderKind::TransferAuto,
        OrderKind::TransferSpecial,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            OrderKind::PurchaseSuggested => "OC",
            OrderKind::PurchaseSpecial => "OC-SP",
            OrderKind::TransferAuto => "TR",
            OrderKind::TransferSpecial => "TR-SP",
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, OrderKind::TransferAuto | OrderKind::TransferSpecial)
    }

    /// Recover the kind from an order or line identifier.
    ///
    /// Special prefixes are checked first since `OC-SP-` also starts with `OC-`.
    pub fn from_id(id: &str) -> Option<Self> {
        [
            OrderKind::PurchaseSpecial,
            OrderKind::TransferSpecial,
            OrderKind::PurchaseSuggested,
            OrderKind::TransferAuto,
        ]
        .into_iter()
        .find(|kind| {
            id.strip_prefix(kind.prefix())
                .is_some_and(|rest| rest.starts_with('-'))
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::PurchaseSuggested => "purchase_suggested",
            OrderKind::PurchaseSpecial => "purchase_special",
            OrderKind::TransferAuto => "transfer_auto",
            OrderKind::TransferSpecial => "transfer_special",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(value) || k.prefix().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an order line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Pending,
    Received,
    Cancelled,
}

impl OrderState {
    pub const ALL: [OrderState; 3] = [OrderState::Pending, OrderState::Received, OrderState::Cancelled];

    /// Value stored in the `Estado` column
    pub fn sheet_value(&self) -> &'static str {
        match self {
            OrderState::Pending => "Pendiente",
            OrderState::Received => "Recibido",
            OrderState::Cancelled => "Cancelado",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::Received => "received",
            OrderState::Cancelled => "cancelled",
        }
    }

    /// Accepts both the sheet value and the API name
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.sheet_value().eq_ignore_ascii_case(value) || s.as_str().eq_ignore_ascii_case(value))
    }

    /// Pending may close either way; a closed line may only reopen.
    /// Staying in the same state is always allowed and changes nothing.
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        match (self, next) {
            (a, b) if *a == b => true,
            (OrderState::Pending, OrderState::Received | OrderState::Cancelled) => true,
            (OrderState::Received | OrderState::Cancelled, OrderState::Pending) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change of a single line
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub line_id: String,
    pub from: OrderState,
    pub to: OrderState,
}

/// A persisted order line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub order_id: String,
    pub line_id: String,
    pub emitted_at: NaiveDateTime,
    pub kind: OrderKind,
    /// Supplier for purchases, origin store for transfers
    pub counterparty: String,
    pub sku: String,
    pub description: String,
    pub qty_requested: Decimal,
    pub destination_store: String,
    pub state: OrderState,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

impl OrderLine {
    pub fn transition(&mut self, next: OrderState) -> Result<bool, TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                line_id: self.line_id.clone(),
                from: self.state,
                to: next,
            });
        }
        let changed = self.state != next;
        self.state = next;
        Ok(changed)
    }
}

/// A line submitted for emission
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct OrderLineInput {
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, message = "Supplier or origin store is required"))]
    pub counterparty: String,
    #[validate(length(min = 1, message = "Destination store is required"))]
    pub destination_store: String,
    #[validate(custom = "crate::validation::validate_positive_quantity")]
    pub qty_requested: Decimal,
    #[validate(custom = "crate::validation::validate_non_negative_amount")]
    pub unit_cost: Decimal,
}

/// Build the identifier shared by every line of one emission
pub fn format_order_id(kind: OrderKind, emitted_at: NaiveDateTime) -> String {
    format!("{}-{}", kind.prefix(), emitted_at.format(ORDER_ID_TIMESTAMP_FORMAT))
}

pub fn format_line_id(order_id: &str, index: usize) -> String {
    format!("{}-{}", order_id, index)
}

/// Strip the zero-based line index from a line identifier
pub fn order_id_of(line_id: &str) -> Option<&str> {
    let (order_id, index) = line_id.rsplit_once('-')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    OrderKind::from_id(order_id)?;
    let stamp = order_id.get(order_id.len().checked_sub(15)?..)?;
    NaiveDateTime::parse_from_str(stamp, ORDER_ID_TIMESTAMP_FORMAT)
        .ok()
        .map(|_| order_id)
}

/// Predicate over ledger rows; empty sets and `None` match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderFilter {
    #[serde(default)]
    pub states: Vec<OrderState>,
    #[serde(default)]
    pub kinds: Vec<OrderKind>,
    pub counterparty: Option<String>,
    pub destination: Option<String>,
    #[serde(default)]
    pub emitted: DateRange,
    pub order_id: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, line: &OrderLine) -> bool {
        (self.states.is_empty() || self.states.contains(&line.state))
            && (self.kinds.is_empty() || self.kinds.contains(&line.kind))
            && self
                .counterparty
                .as_deref()
                .map_or(true, |c| c.eq_ignore_ascii_case(&line.counterparty))
            && self
                .destination
                .as_deref()
                .map_or(true, |d| d.eq_ignore_ascii_case(&line.destination_store))
            && self.emitted.contains(line.emitted_at.date())
            && self.order_id.as_deref().map_or(true, |id| id == line.order_id)
    }
}

/// Which rows a state update applies to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum OrderSelector {
    Order(String),
    Lines(Vec<String>),
    Filter(OrderFilter),
}

impl OrderSelector {
    pub fn matches(&self, line: &OrderLine) -> bool {
        match self {
            OrderSelector::Order(order_id) => &line.order_id == order_id,
            OrderSelector::Lines(line_ids) => line_ids.iter().any(|id| id == &line.line_id),
            OrderSelector::Filter(filter) => filter.matches(line),
        }
    }
}

/// One emitted order with its lines rolled up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub order_id: String,
    pub kind: OrderKind,
    pub counterparty: String,
    pub emitted_at: NaiveDateTime,
    pub line_count: usize,
    pub total_cost: Decimal,
    pub state: OrderState,
}

/// Group lines by order, keeping first-seen order.
///
/// An order is Pending while any line is Pending, then Received while any
/// line is Received, otherwise Cancelled.
pub fn summarize_orders(lines: &[OrderLine]) -> Vec<OrderSummary> {
    let mut summaries: Vec<OrderSummary> = Vec::new();
    for line in lines {
        match summaries.iter_mut().find(|s| s.order_id == line.order_id) {
            Some(summary) => {
                summary.line_count += 1;
                summary.total_cost += line.total_cost;
                summary.state = rollup_state(summary.state, line.state);
            }
            None => summaries.push(OrderSummary {
                order_id: line.order_id.clone(),
                kind: line.kind,
                counterparty: line.counterparty.clone(),
                emitted_at: line.emitted_at,
                line_count: 1,
                total_cost: line.total_cost,
                state: line.state,
            }),
        }
    }
    summaries
}

fn rollup_state(current: OrderState, line: OrderState) -> OrderState {
    use OrderState::*;
    match (current, line) {
        (Pending, _) | (_, Pending) => Pending,
        (Received, _) | (_, Received) => Received,
        _ => Cancelled,
    }
}

/// Pending quantities per (SKU, destination store name)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InTransit {
    quantities: BTreeMap<CellKey, f64>,
}

impl InTransit {
    /// Sum `qty_requested` over Pending lines
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a OrderLine>) -> Self {
        let mut quantities: BTreeMap<CellKey, f64> = BTreeMap::new();
        for line in lines.into_iter().filter(|l| l.state == OrderState::Pending) {
            *quantities
                .entry(CellKey::new(&line.sku, &line.destination_store))
                .or_insert(0.0) += from_decimal(line.qty_requested);
        }
        Self { quantities }
    }

    pub fn get(&self, sku: &str, store_name: &str) -> f64 {
        self.quantities
            .get(&CellKey::new(sku, store_name))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn insert(&mut self, sku: impl AsRef<str>, store_name: impl AsRef<str>, qty: f64) {
        *self.quantities.entry(CellKey::new(sku, store_name)).or_insert(0.0) += qty;
    }
}
