//! Snapshot ingestion and normalization
//!
//! Decodes the nightly `|`-separated Latin-1 snapshot into [`SkuCell`]s,
//! normalizing locale-formatted numbers and coded identifiers on the way.

use std::collections::HashMap;

use serde::Serialize;
use shared::models::{Catalog, SkuCell, FALLBACK_BRAND, FALLBACK_SUPPLIER};

use crate::error::{AppError, AppResult};

/// Snapshot fields, in record order
pub const SNAPSHOT_COLUMNS: [&str; 11] = [
    "department",
    "sku",
    "description",
    "brand_id",
    "unit_weight",
    "sales_units_60d",
    "stock_units",
    "unit_cost",
    "store_id",
    "lead_time_days",
    "sales_history",
];

/// Columns up to and including `store_id` are required
pub const REQUIRED_COLUMNS: usize = 9;

/// Row-level outcome counters for one load
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IngestDiagnostics {
    pub rows_read: usize,
    pub skipped_rows: usize,
    pub duplicate_rows: usize,
}

/// Cells produced from one snapshot, in first-seen order
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadedSnapshot {
    pub cells: Vec<SkuCell>,
    pub diagnostics: IngestDiagnostics,
}

/// Decode ISO-8859-1 bytes; every byte is the code point of the same value
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parse a number written with `.` thousands separators and `,` decimals.
///
/// Empty, unparseable or non-finite input yields 0.
pub fn parse_locale_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '.' && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Canonical form of a store or brand code.
///
/// Codes read with the same locale rule as [`parse_locale_number`]: `.`
/// groups thousands and `,` starts the fraction. Integral codes lose the
/// separators, leading zeros and any zero fraction (`"007"` and `"7,0"`
/// become `"7"`, `"1.001"` becomes `"1001"`); other codes are trimmed.
pub fn canonical_code(raw: &str) -> String {
    let code = raw.trim();
    let (int_part, frac_part) = match code.split_once(',') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (code, ""),
    };
    let digits: String = int_part.chars().filter(|c| *c != '.').collect();
    let is_integral = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c == '0');
    if !is_integral {
        return code.to_string();
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_negative(raw: &str) -> f64 {
    parse_locale_number(raw).max(0.0)
}

/// Parse a raw snapshot into cells.
///
/// Fails only when a required column is absent from every record; missing
/// values inside present columns fall back to empty/zero.
pub fn load_snapshot(bytes: &[u8], catalog: &Catalog) -> AppResult<LoadedSnapshot> {
    let text = decode_latin1(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut diagnostics = IngestDiagnostics::default();
    let mut records = Vec::new();
    let mut widest = 0usize;
    for result in reader.records() {
        diagnostics.rows_read += 1;
        match result {
            Ok(record) => {
                widest = widest.max(record.len());
                records.push(record);
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable snapshot row {}: {}", diagnostics.rows_read, e);
                diagnostics.skipped_rows += 1;
            }
        }
    }

    if !records.is_empty() && widest < REQUIRED_COLUMNS {
        return Err(AppError::Schema {
            column: SNAPSHOT_COLUMNS[widest].to_string(),
        });
    }

    let mut cells: Vec<SkuCell> = Vec::with_capacity(records.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for record in &records {
        let field = |i: usize| record.get(i).unwrap_or("");
        let sku = field(1).to_string();
        if sku.is_empty() {
            diagnostics.skipped_rows += 1;
            continue;
        }

        let store_id = canonical_code(field(8));
        let brand_id = canonical_code(field(3));
        let product = catalog.product(&sku);

        let mut cell = SkuCell::new(sku, store_id.clone(), catalog.store_name(&store_id));
        cell.department = field(0).to_string();
        cell.description = field(2).to_string();
        cell.brand_name = if brand_id.is_empty() {
            FALLBACK_BRAND.to_string()
        } else {
            catalog.brand_name(&brand_id)
        };
        cell.brand_id = brand_id;
        cell.unit_weight = non_negative(field(4));
        cell.sales_units_60d = non_negative(field(5));
        cell.stock_units = non_negative(field(6));
        cell.unit_cost = non_negative(field(7));
        cell.lead_time_days = non_negative(field(9));
        cell.sales_history = field(10).to_string();
        cell.supplier = product
            .map(|p| p.supplier.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_SUPPLIER.to_string());
        cell.supplier_sku = product.map(|p| p.supplier_sku.clone()).unwrap_or_default();
        cell.unit_price = product.and_then(|p| p.unit_price);

        let key = (cell.sku.clone(), cell.store_id.clone());
        match index.get(&key) {
            Some(&pos) => {
                diagnostics.duplicate_rows += 1;
                cells[pos] = cell;
            }
            None => {
                index.insert(key, cells.len());
                cells.push(cell);
            }
        }
    }

    tracing::info!(
        "Loaded snapshot: {} cells from {} rows ({} skipped, {} duplicates)",
        cells.len(),
        diagnostics.rows_read,
        diagnostics.skipped_rows,
        diagnostics.duplicate_rows
    );

    Ok(LoadedSnapshot { cells, diagnostics })
}

/// Load catalog lookups from JSON, canonicalizing store and brand codes
///
/// Store names key transfers and the ledger, so two codes sharing a name
/// are rejected.
pub fn load_catalog(json: &str) -> AppResult<Catalog> {
    let catalog = Catalog::from_json(json)
        .map(|c| c.canonicalize_keys(canonical_code))
        .map_err(|e| AppError::Configuration(format!("invalid catalog: {}", e)))?;

    let mut seen = std::collections::HashSet::new();
    for store in catalog.stores.values() {
        if !seen.insert(store.name.trim().to_lowercase()) {
            return Err(AppError::Configuration(format!(
                "store name '{}' is used by more than one store code",
                store.name
            )));
        }
    }
    Ok(catalog)
}
