//! Order ledger tests
//!
//! Tests for the order lifecycle on the `Registro_Ordenes` worksheet:
//! - Emission, identifiers and validation
//! - In-transit quantities and history filters
//! - All-or-nothing, idempotent state updates
//! - Store failures and timeouts

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use shared::models::{OrderFilter, OrderKind, OrderLineInput, OrderSelector, OrderState};
use shared::types::DateRange;
use stockplan_backend::error::AppError;
use stockplan_backend::external::{CsvSheetStore, InMemorySheetStore, SheetStore};
use stockplan_backend::services::ledger::{OrderLedger, LEDGER_COLUMNS, LEDGER_SHEET};
use tokio::time::Instant;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn line(sku: &str, counterparty: &str, destination: &str, qty: &str, cost: &str) -> OrderLineInput {
    OrderLineInput {
        sku: sku.to_string(),
        description: format!("{} item", sku),
        counterparty: counterparty.to_string(),
        destination_store: destination.to_string(),
        qty_requested: dec(qty),
        unit_cost: dec(cost),
    }
}

fn soon() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

fn ledger() -> OrderLedger<InMemorySheetStore> {
    OrderLedger::new(Arc::new(InMemorySheetStore::new()), Duration::from_millis(500))
}

// ============================================================================
// Emission
// ============================================================================

#[cfg(test)]
mod emission_tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_then_history_round_trip() {
        let ledger = ledger();
        let emitted = ledger
            .emit_orders_at(
                OrderKind::PurchaseSuggested,
                vec![
                    line("S1", "Distribuidora Sur", "Centro", "18", "2.5"),
                    line("S2", "Distribuidora Sur", "Norte", "4.5", "10"),
                ],
                at(17, 9, 3, 7),
            )
            .await
            .unwrap();

        assert_eq!(emitted.order_id, "OC-20240517-090307");
        assert_eq!(
            emitted.line_ids,
            vec!["OC-20240517-090307-0", "OC-20240517-090307-1"]
        );
        assert_eq!(emitted.total_cost, dec("90"));

        let rows = ledger.history(&OrderFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].qty_requested, dec("18"));
        assert_eq!(rows[1].qty_requested, dec("4.5"));
        assert_eq!(rows[0].state, OrderState::Pending);
        assert_eq!(rows[0].kind, OrderKind::PurchaseSuggested);
        assert_eq!(rows[0].total_cost, dec("45"));
        assert_eq!(rows[1].emitted_at, at(17, 9, 3, 7));
    }

    #[tokio::test]
    async fn test_sheet_uses_ledger_columns_and_labels() {
        let ledger = ledger();
        ledger
            .emit_orders_at(
                OrderKind::TransferSpecial,
                vec![line("S1", "Centro", "Norte", "3", "1.25")],
                at(17, 9, 3, 7),
            )
            .await
            .unwrap();

        let sheet = ledger.store().snapshot(LEDGER_SHEET);
        assert_eq!(sheet.header, LEDGER_COLUMNS.to_vec());
        assert_eq!(
            sheet.rows[0],
            vec![
                "TR-SP-20240517-090307-0",
                "2024-05-17 09:03:07",
                "Centro",
                "S1",
                "S1 item",
                "3",
                "Norte",
                "Pendiente",
                "1.25",
                "3.75",
            ]
        );
    }

    #[tokio::test]
    async fn test_same_second_emissions_get_distinct_ids() {
        let ledger = ledger();
        let now = at(17, 9, 3, 7);
        let first = ledger
            .emit_orders_at(OrderKind::PurchaseSpecial, vec![line("S1", "Sur", "Centro", "1", "1")], now)
            .await
            .unwrap();
        let second = ledger
            .emit_orders_at(OrderKind::PurchaseSpecial, vec![line("S1", "Sur", "Centro", "1", "1")], now)
            .await
            .unwrap();

        assert_eq!(first.order_id, "OC-SP-20240517-090307");
        assert_eq!(second.order_id, "OC-SP-20240517-090308");
        assert_eq!(ledger.history(&OrderFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_lines_write_nothing() {
        let ledger = ledger();

        let empty = ledger.emit_orders_at(OrderKind::PurchaseSuggested, vec![], at(17, 9, 0, 0)).await;
        assert!(matches!(empty, Err(AppError::ValidationError(_))));

        let zero_qty = ledger
            .emit_orders_at(
                OrderKind::PurchaseSuggested,
                vec![line("S1", "Sur", "Centro", "1", "1"), line("S2", "Sur", "Centro", "0", "1")],
                at(17, 9, 0, 0),
            )
            .await;
        assert!(matches!(zero_qty, Err(AppError::Validation { .. })));

        let negative_cost = ledger
            .emit_orders_at(
                OrderKind::PurchaseSuggested,
                vec![line("S1", "Sur", "Centro", "1", "-1")],
                at(17, 9, 0, 0),
            )
            .await;
        assert!(matches!(negative_cost, Err(AppError::Validation { .. })));

        let no_destination = ledger
            .emit_orders_at(OrderKind::PurchaseSuggested, vec![line("S1", "Sur", "", "1", "1")], at(17, 9, 0, 0))
            .await;
        assert!(matches!(no_destination, Err(AppError::Validation { .. })));

        let loop_back = ledger
            .emit_orders_at(OrderKind::TransferAuto, vec![line("S1", "Centro", "centro", "1", "1")], at(17, 9, 0, 0))
            .await;
        assert!(matches!(loop_back, Err(AppError::ValidationError(_))));

        assert!(ledger.store().snapshot(LEDGER_SHEET).rows.is_empty());
    }
}

// ============================================================================
// Reads
// ============================================================================

#[cfg(test)]
mod read_tests {
    use super::*;

    async fn seeded() -> OrderLedger<InMemorySheetStore> {
        let ledger = ledger();
        ledger
            .emit_orders_at(
                OrderKind::PurchaseSuggested,
                vec![line("S1", "Sur", "Centro", "10", "2"), line("S1", "Sur", "Norte", "5", "2")],
                at(10, 8, 0, 0),
            )
            .await
            .unwrap();
        ledger
            .emit_orders_at(
                OrderKind::TransferAuto,
                vec![line("S1", "Norte", "Centro", "4", "2")],
                at(12, 8, 0, 0),
            )
            .await
            .unwrap();
        ledger
            .emit_orders_at(
                OrderKind::PurchaseSpecial,
                vec![line("S2", "Andes", "Centro", "7", "3")],
                at(14, 8, 0, 0),
            )
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_pending_in_transit_sums_per_destination() {
        let ledger = seeded().await;
        let in_transit = ledger.pending_in_transit().await.unwrap();
        assert_eq!(in_transit.get("S1", "Centro"), 14.0);
        assert_eq!(in_transit.get("S1", "Norte"), 5.0);
        assert_eq!(in_transit.get("S2", "Centro"), 7.0);
        assert_eq!(in_transit.get("S2", "Norte"), 0.0);
    }

    #[tokio::test]
    async fn test_destination_case_does_not_hide_in_transit() {
        let ledger = ledger();
        ledger
            .emit_orders_at(
                OrderKind::PurchaseSpecial,
                vec![line("S1", "Andes", "centro", "30", "2")],
                at(14, 8, 0, 0),
            )
            .await
            .unwrap();

        let history = ledger
            .history(&OrderFilter {
                destination: Some("Centro".to_string()),
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(history.len(), 1);

        let in_transit = ledger.pending_in_transit().await.unwrap();
        assert_eq!(in_transit.get("S1", "Centro"), 30.0);
    }

    #[tokio::test]
    async fn test_only_pending_rows_are_in_transit() {
        let ledger = seeded().await;
        ledger
            .update_states(&OrderSelector::Order("TR-20240512-080000".to_string()), OrderState::Received)
            .await
            .unwrap();
        let in_transit = ledger.pending_in_transit().await.unwrap();
        assert_eq!(in_transit.get("S1", "Centro"), 10.0);
    }

    #[tokio::test]
    async fn test_history_filters() {
        let ledger = seeded().await;

        let transfers = ledger
            .history(&OrderFilter {
                kinds: vec![OrderKind::TransferAuto],
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].counterparty, "Norte");

        let from_sur = ledger
            .history(&OrderFilter {
                counterparty: Some("sur".to_string()),
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(from_sur.len(), 2);

        let to_centro_in_range = ledger
            .history(&OrderFilter {
                destination: Some("Centro".to_string()),
                emitted: DateRange::new(NaiveDate::from_ymd_opt(2024, 5, 11), NaiveDate::from_ymd_opt(2024, 5, 14)),
                ..OrderFilter::default()
            })
            .await
            .unwrap();
        let skus: Vec<&str> = to_centro_in_range.iter().map(|l| l.sku.as_str()).collect();
        assert_eq!(skus, vec!["S1", "S2"]);
    }

    #[tokio::test]
    async fn test_order_summaries_roll_up() {
        let ledger = seeded().await;
        ledger
            .update_states(
                &OrderSelector::Lines(vec!["OC-20240510-080000-0".to_string()]),
                OrderState::Received,
            )
            .await
            .unwrap();

        let orders = ledger.orders(&OrderFilter::default()).await.unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].order_id, "OC-20240510-080000");
        assert_eq!(orders[0].line_count, 2);
        assert_eq!(orders[0].total_cost, dec("30"));
        assert_eq!(orders[0].state, OrderState::Pending);
    }

    #[tokio::test]
    async fn test_emission_onto_reordered_sheet() {
        let ledger = ledger();
        let mut reordered = LEDGER_COLUMNS.to_vec();
        reordered.reverse();
        ledger
            .store()
            .replace(LEDGER_SHEET, &reordered, Vec::new(), soon())
            .await
            .unwrap();

        ledger
            .emit_orders_at(
                OrderKind::PurchaseSuggested,
                vec![line("S1", "Sur", "Centro", "6", "2")],
                at(15, 9, 0, 0),
            )
            .await
            .unwrap();

        let sheet = ledger.store().snapshot(LEDGER_SHEET);
        assert_eq!(sheet.header, reordered);
        assert_eq!(sheet.rows[0][0], "12");
        assert_eq!(sheet.rows[0][9], "OC-20240515-090000-0");
        let in_transit = ledger.pending_in_transit().await.unwrap();
        assert_eq!(in_transit.get("S1", "Centro"), 6.0);
    }

    #[tokio::test]
    async fn test_read_all_skips_malformed_rows() {
        let ledger = seeded().await;
        ledger
            .store()
            .append(
                LEDGER_SHEET,
                &LEDGER_COLUMNS,
                vec![vec!["garbage".to_string(); LEDGER_COLUMNS.len()]],
                soon(),
            )
            .await
            .unwrap();
        assert_eq!(ledger.read_all().await.unwrap().len(), 4);
    }
}

// ============================================================================
// State Updates
// ============================================================================

#[cfg(test)]
mod state_tests {
    use super::*;

    async fn one_order() -> OrderLedger<InMemorySheetStore> {
        let ledger = ledger();
        ledger
            .emit_orders_at(
                OrderKind::PurchaseSuggested,
                vec![line("S1", "Sur", "Centro", "10", "2"), line("S2", "Sur", "Centro", "5", "2")],
                at(10, 8, 0, 0),
            )
            .await
            .unwrap();
        ledger
    }

    fn order() -> OrderSelector {
        OrderSelector::Order("OC-20240510-080000".to_string())
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let ledger = one_order().await;
        assert_eq!(ledger.update_states(&order(), OrderState::Received).await.unwrap(), 2);
        let after_first = ledger.store().snapshot(LEDGER_SHEET);

        assert_eq!(ledger.update_states(&order(), OrderState::Received).await.unwrap(), 0);
        assert_eq!(ledger.store().snapshot(LEDGER_SHEET), after_first);
    }

    #[tokio::test]
    async fn test_forbidden_transition_changes_nothing() {
        let ledger = one_order().await;
        ledger
            .update_states(
                &OrderSelector::Lines(vec!["OC-20240510-080000-0".to_string()]),
                OrderState::Received,
            )
            .await
            .unwrap();
        let before = ledger.store().snapshot(LEDGER_SHEET);

        let result = ledger.update_states(&order(), OrderState::Cancelled).await;
        assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));
        assert_eq!(ledger.store().snapshot(LEDGER_SHEET), before);

        let states: Vec<OrderState> = ledger
            .read_all()
            .await
            .unwrap()
            .iter()
            .map(|l| l.state)
            .collect();
        assert_eq!(states, vec![OrderState::Received, OrderState::Pending]);
    }

    #[tokio::test]
    async fn test_manual_correction_back_to_pending() {
        let ledger = one_order().await;
        ledger.update_states(&order(), OrderState::Cancelled).await.unwrap();
        assert_eq!(ledger.update_states(&order(), OrderState::Pending).await.unwrap(), 2);
        assert_eq!(ledger.pending_in_transit().await.unwrap().get("S1", "Centro"), 10.0);
    }

    #[tokio::test]
    async fn test_filter_selector() {
        let ledger = one_order().await;
        let selector = OrderSelector::Filter(OrderFilter {
            states: vec![OrderState::Pending],
            destination: Some("centro".to_string()),
            ..OrderFilter::default()
        });
        assert_eq!(ledger.update_states(&selector, OrderState::Cancelled).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_selector_matching_nothing_is_not_found() {
        let ledger = one_order().await;
        let result = ledger
            .update_states(&OrderSelector::Order("OC-20990101-000000".to_string()), OrderState::Received)
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rewrite_keeps_foreign_rows() {
        let ledger = one_order().await;
        let foreign = vec!["nota manual".to_string(); LEDGER_COLUMNS.len()];
        ledger
            .store()
            .append(LEDGER_SHEET, &LEDGER_COLUMNS, vec![foreign.clone()], soon())
            .await
            .unwrap();

        ledger.update_states(&order(), OrderState::Received).await.unwrap();
        let sheet = ledger.store().snapshot(LEDGER_SHEET);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[2], foreign);
        assert_eq!(sheet.rows[0][7], "Recibido");
    }
}

// ============================================================================
// Store Failures
// ============================================================================

#[cfg(test)]
mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_append_is_reported() {
        let ledger = ledger();
        ledger.store().set_fail_writes(true);
        let result = ledger
            .emit_orders_at(OrderKind::PurchaseSuggested, vec![line("S1", "Sur", "Centro", "1", "1")], at(1, 0, 0, 0))
            .await;
        assert!(matches!(result, Err(AppError::LedgerIo(_))));
        assert!(ledger.store().snapshot(LEDGER_SHEET).rows.is_empty());
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_states() {
        let ledger = ledger();
        ledger
            .emit_orders_at(OrderKind::PurchaseSuggested, vec![line("S1", "Sur", "Centro", "1", "1")], at(1, 0, 0, 0))
            .await
            .unwrap();
        ledger.store().set_fail_writes(true);
        let result = ledger
            .update_states(&OrderSelector::Order("OC-20240501-000000".to_string()), OrderState::Received)
            .await;
        assert!(matches!(result, Err(AppError::LedgerIo(_))));
        assert_eq!(ledger.store().snapshot(LEDGER_SHEET).rows[0][7], "Pendiente");
    }

    #[tokio::test]
    async fn test_slow_store_times_out_without_writing() {
        let store = Arc::new(InMemorySheetStore::new());
        let ledger = OrderLedger::new(store.clone(), Duration::from_millis(20));
        store.set_delay(Some(Duration::from_millis(200)));

        let result = ledger
            .emit_orders_at(OrderKind::PurchaseSuggested, vec![line("S1", "Sur", "Centro", "1", "1")], at(1, 0, 0, 0))
            .await;
        assert!(matches!(result, Err(AppError::LedgerTimeout(20))));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(store.snapshot(LEDGER_SHEET).rows.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_ledger_fails_reads() {
        let ledger = ledger();
        ledger.store().set_fail_reads(true);
        assert!(matches!(ledger.pending_in_transit().await, Err(AppError::LedgerIo(_))));
    }
}

// ============================================================================
// CSV-backed Ledger
// ============================================================================

#[cfg(test)]
mod csv_tests {
    use super::*;

    fn csv_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("stockplan-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_csv_emission_timeout_writes_nothing() {
        let dir = csv_dir("ledger-timeout");
        let store = Arc::new(CsvSheetStore::new(&dir));
        let ledger = OrderLedger::new(store.clone(), Duration::ZERO);

        let result = ledger
            .emit_orders_at(OrderKind::PurchaseSuggested, vec![line("S1", "Sur", "Centro", "1", "1")], at(1, 0, 0, 0))
            .await;
        assert!(matches!(result, Err(AppError::LedgerTimeout(0))));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let reader = OrderLedger::new(store, Duration::from_secs(5));
        assert!(reader.read_all().await.unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_csv_state_update_timeout_keeps_states() {
        let dir = csv_dir("ledger-update-timeout");
        let store = Arc::new(CsvSheetStore::new(&dir));
        let ledger = OrderLedger::new(store.clone(), Duration::from_secs(5));
        ledger
            .emit_orders_at(OrderKind::PurchaseSuggested, vec![line("S1", "Sur", "Centro", "1", "1")], at(1, 0, 0, 0))
            .await
            .unwrap();

        let hurried = OrderLedger::new(store.clone(), Duration::ZERO);
        let result = hurried
            .update_states(&OrderSelector::Order("OC-20240501-000000".to_string()), OrderState::Received)
            .await;
        assert!(matches!(result, Err(AppError::LedgerTimeout(_))));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let lines = ledger.read_all().await.unwrap();
        assert_eq!(lines[0].state, OrderState::Pending);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_csv_large_batch_lands_whole_or_not_at_all() {
        let dir = csv_dir("ledger-large-batch");
        let store = Arc::new(CsvSheetStore::new(&dir));
        let ledger = OrderLedger::new(store.clone(), Duration::from_millis(1));
        let lines: Vec<OrderLineInput> = (0..20_000)
            .map(|i| line(&format!("S{}", i), "Sur", "Centro", "1", "1"))
            .collect();

        let result = ledger
            .emit_orders_at(OrderKind::PurchaseSuggested, lines, at(2, 0, 0, 0))
            .await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        let reader = OrderLedger::new(store, Duration::from_secs(30));
        let written = reader.read_all().await.unwrap().len();
        match result {
            Ok(_) => assert_eq!(written, 20_000),
            Err(AppError::LedgerTimeout(1)) => assert_eq!(written, 0),
            Err(other) => panic!("unexpected error: {}", other),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_csv_ledger_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("stockplan-ledger-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        {
            let ledger = OrderLedger::new(Arc::new(CsvSheetStore::new(&dir)), Duration::from_secs(5));
            ledger
                .emit_orders_at(
                    OrderKind::PurchaseSuggested,
                    vec![line("S1", "Distribuidora, Sur", "Centro", "12.5", "3")],
                    at(20, 10, 0, 0),
                )
                .await
                .unwrap();
            ledger
                .update_states(&OrderSelector::Order("OC-20240520-100000".to_string()), OrderState::Received)
                .await
                .unwrap();
        }

        let reopened = OrderLedger::new(Arc::new(CsvSheetStore::new(&dir)), Duration::from_secs(5));
        let rows = reopened.history(&OrderFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].counterparty, "Distribuidora, Sur");
        assert_eq!(rows[0].qty_requested, dec("12.5"));
        assert_eq!(rows[0].state, OrderState::Received);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
