//! Inter-store transfer models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AbcSegment, CellKey};

/// A proposed movement of whole units of one SKU between two stores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferProposal {
    pub sku: String,
    pub description: String,
    pub origin_store: String,
    pub destination_store: String,
    pub units: u64,
    pub est_weight: f64,
    pub est_value: f64,
    pub unit_cost: f64,
    pub abc_segment: AbcSegment,
}

/// Ordered list of proposals produced by one planning run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransferPlan {
    pub proposals: Vec<TransferProposal>,
}

impl TransferPlan {
    pub fn new(proposals: Vec<TransferProposal>) -> Self {
        Self { proposals }
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn total_units(&self) -> u64 {
        self.proposals.iter().map(|p| p.units).sum()
    }

    /// Units the plan sends to each destination cell
    pub fn coverage(&self) -> BTreeMap<CellKey, u64> {
        let mut covered = BTreeMap::new();
        for p in &self.proposals {
            *covered
                .entry(CellKey::new(&p.sku, &p.destination_store))
                .or_insert(0) += p.units;
        }
        covered
    }
}
