//! Cost telemetry: token heuristics, model rates and per-task summaries.

mod estimate;
pub mod pricing;

pub use estimate::{CostEstimate, CostSummary, estimate, estimate_tokens};
pub use pricing::{ModelPricing, PricingTable, PricingTableBuilder, global_pricing_table};
