//! Heuristic token and cost estimation.
//!
//! Token counts use a characters / 4 rule of thumb. The numbers are for
//! display only and will not match provider billing.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pricing::PricingTable;

/// Approximate token count: one token per four characters.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

/// Cost of one model call, or `Unavailable` when the model has no known price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CostEstimate {
    Estimated {
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: Decimal,
    },
    Unavailable,
}

impl CostEstimate {
    pub fn cost_usd(&self) -> Option<Decimal> {
        match self {
            Self::Estimated { cost_usd, .. } => Some(*cost_usd),
            Self::Unavailable => None,
        }
    }

    pub fn total_tokens(&self) -> Option<u64> {
        match self {
            Self::Estimated {
                input_tokens,
                output_tokens,
                ..
            } => Some(input_tokens + output_tokens),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Estimated { .. })
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Estimated {
                input_tokens,
                output_tokens,
                cost_usd,
            } => write!(
                f,
                "${:.6} (≈{} tokens)",
                cost_usd,
                input_tokens + output_tokens
            ),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Estimates the cost of sending `input` and receiving `output` on `model`.
pub fn estimate(table: &PricingTable, model: &str, input: &str, output: &str) -> CostEstimate {
    let Some(pricing) = table.get(model) else {
        return CostEstimate::Unavailable;
    };
    let input_tokens = estimate_tokens(input);
    let output_tokens = estimate_tokens(output);
    CostEstimate::Estimated {
        input_tokens,
        output_tokens,
        cost_usd: pricing.calculate(input_tokens, output_tokens),
    }
}

/// Sum of step estimates. `partial` is set when some steps had no price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_usd: Decimal,
    pub total_tokens: u64,
    pub estimated_steps: usize,
    pub unavailable_steps: usize,
    pub partial: bool,
}

impl CostSummary {
    pub fn from_estimates<'a>(estimates: impl IntoIterator<Item = &'a CostEstimate>) -> Self {
        let mut summary = Self::default();
        for estimate in estimates {
            summary.add(estimate);
        }
        summary
    }

    pub fn add(&mut self, estimate: &CostEstimate) {
        match estimate {
            CostEstimate::Estimated {
                input_tokens,
                output_tokens,
                cost_usd,
            } => {
                self.total_usd += *cost_usd;
                self.total_tokens += input_tokens + output_tokens;
                self.estimated_steps += 1;
            }
            CostEstimate::Unavailable => {
                self.unavailable_steps += 1;
                self.partial = true;
            }
        }
    }

    /// `None` when no step carried a price.
    pub fn into_option(self) -> Option<Self> {
        (self.estimated_steps > 0).then_some(self)
    }
}

impl fmt::Display for CostSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.6} (≈{} tokens)", self.total_usd, self.total_tokens)?;
        if self.partial {
            write!(f, " partial, {} step(s) unpriced", self.unavailable_steps)?;
        }
        Ok(())
    }
}
