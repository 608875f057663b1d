//! Planning policy configuration threaded through the decision engine

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AbcSegment;

/// Days of demand to hold as target stock, per ABC segment.
///
/// Every segment must be present; there is no per-field default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct TargetDays {
    #[validate(range(min = 1, message = "target_days.a must be at least 1"))]
    pub a: u32,
    #[validate(range(min = 1, message = "target_days.b must be at least 1"))]
    pub b: u32,
    #[validate(range(min = 1, message = "target_days.c must be at least 1"))]
    pub c: u32,
}

impl TargetDays {
    pub fn for_segment(&self, segment: AbcSegment) -> u32 {
        match segment {
            AbcSegment::A => self.a,
            AbcSegment::B => self.b,
            AbcSegment::C => self.c,
        }
    }
}

impl Default for TargetDays {
    fn default() -> Self {
        Self { a: 30, b: 45, c: 60 }
    }
}

/// Cumulative-share cutoffs for ABC segmentation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq)]
pub struct AbcThresholds {
    #[validate(range(min = 0.0, max = 1.0))]
    pub a: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub b: f64,
}

impl Default for AbcThresholds {
    fn default() -> Self {
        Self { a: 0.80, b: 0.95 }
    }
}

/// A product family recognized by tokens in the description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackRule {
    pub family: String,
    pub tokens: Vec<String>,
    pub pack: u32,
}

impl PackRule {
    pub fn new(family: &str, tokens: &[&str], pack: u32) -> Self {
        Self {
            family: family.to_string(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            pack,
        }
    }

    pub fn matches(&self, description: &str) -> bool {
        let description = description.to_lowercase();
        self.tokens
            .iter()
            .any(|token| !token.is_empty() && description.contains(&token.to_lowercase()))
    }
}

pub fn default_pack_rules() -> Vec<PackRule> {
    vec![
        PackRule::new("small", &["0.94", "0,94"], 9),
        PackRule::new("medium", &["3.7", "3,7"], 4),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct PlanningConfig {
    #[validate(range(min = 1, message = "safety_days must be at least 1"))]
    pub safety_days: u32,
    #[validate]
    pub target_days: TargetDays,
    /// Days of cover above which a selling cell is Surplus
    #[validate(range(min = 1))]
    pub surplus_days: u32,
    /// Sales older than this many days carry no demand weight
    #[validate(range(min = 1))]
    pub demand_window_days: u32,
    /// Boundary between the recent and prior halves of the seasonality delta
    #[validate(range(min = 1))]
    pub seasonality_split_days: u32,
    #[validate]
    pub abc: AbcThresholds,
    /// When false, any cell with no stock is a Stockout even without demand
    pub stockout_requires_demand: bool,
    #[validate(range(min = 0.0))]
    pub price_markup: f64,
    #[validate(range(min = 1))]
    pub loss_horizon_days: u32,
    pub pack_rules: Vec<PackRule>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            safety_days: 7,
            target_days: TargetDays::default(),
            surplus_days: 90,
            demand_window_days: 60,
            seasonality_split_days: 30,
            abc: AbcThresholds::default(),
            stockout_requires_demand: true,
            price_markup: 1.30,
            loss_horizon_days: 30,
            pack_rules: default_pack_rules(),
        }
    }
}

impl PlanningConfig {
    /// Pack size for a description; first matching rule wins, else 1
    pub fn pack_size_for(&self, description: &str) -> u32 {
        self.pack_rules
            .iter()
            .find(|rule| rule.matches(description))
            .map_or(1, |rule| rule.pack.max(1))
    }
}
