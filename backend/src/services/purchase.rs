//! Purchase sizing: in-transit adjustment, transfer coverage and pack rounding

use shared::models::{CellKey, InTransit, PlanningConfig, SkuCell, TransferPlan};

/// Quantities within this distance of an integer snap to it before rounding
const SNAP: f64 = 1e-6;

/// Round a quantity up to a whole multiple of the pack size.
///
/// Never rounds down; `q <= 0` yields 0 and a pack of 0 is treated as 1.
pub fn round_to_pack(quantity: f64, pack: u32) -> u64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0;
    }
    let pack = u64::from(pack.max(1));
    let snapped = (quantity / SNAP).round() * SNAP;
    let units = snapped.ceil() as u64;
    units.div_ceil(pack) * pack
}

/// `adjusted_need = max(0, raw_need - in_transit)` for every cell
pub fn apply_in_transit(cells: &mut [SkuCell], in_transit: &InTransit) {
    for cell in cells.iter_mut() {
        cell.in_transit = in_transit.get(&cell.sku, &cell.store_name);
        cell.adjusted_need = (cell.raw_need - cell.in_transit).max(0.0);
    }
}

/// Units the plan sends to each cell
pub fn apply_transfer_coverage(cells: &mut [SkuCell], plan: &TransferPlan) {
    let coverage = plan.coverage();
    for cell in cells.iter_mut() {
        let units = coverage
            .get(&CellKey::new(&cell.sku, &cell.store_name))
            .copied()
            .unwrap_or(0);
        cell.covered_by_transfer = units as f64;
    }
}

/// Purchase need after transfers, and its pack-rounded suggestion
pub fn size_purchases(cells: &mut [SkuCell], config: &PlanningConfig) {
    for cell in cells.iter_mut() {
        cell.purchase_need = (cell.adjusted_need - cell.covered_by_transfer).max(0.0);
        cell.pack_size = config.pack_size_for(&cell.description);
        cell.purchase_suggestion = round_to_pack(cell.purchase_need, cell.pack_size);
    }

    let lines = cells.iter().filter(|c| c.purchase_suggestion > 0).count();
    tracing::debug!("Sized purchases: {} cells need buying", lines);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_pack() {
        assert_eq!(round_to_pack(10.0, 9), 18);
        assert_eq!(round_to_pack(5.0, 4), 8);
        assert_eq!(round_to_pack(7.0, 1), 7);
        assert_eq!(round_to_pack(9.0, 9), 9);
        assert_eq!(round_to_pack(0.0, 9), 0);
        assert_eq!(round_to_pack(-3.0, 4), 0);
    }

    #[test]
    fn test_fractional_need_rounds_to_whole_units() {
        assert_eq!(round_to_pack(2.3, 1), 3);
        assert_eq!(round_to_pack(35.000000001, 1), 35);
        assert_eq!(round_to_pack(0.5, 4), 4);
    }
}
