//! Simulated data analysis.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use schemars::JsonSchema;
use serde::Deserialize;

use super::TypedTool;
use crate::types::ToolError;

const FINDINGS: &[&str] = &[
    "shows strong positive trends with 15% growth potential",
    "indicates moderate risk with stable long-term outlook",
    "demonstrates high innovation potential in emerging markets",
    "reveals significant opportunities for improvement and optimization",
    "suggests diversification strategies would be beneficial",
];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeDataInput {
    /// Data or findings to analyse
    pub data: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeDataTool;

#[async_trait]
impl TypedTool for AnalyzeDataTool {
    type Input = AnalyzeDataInput;
    const NAME: &'static str = "analyze_data";
    const DESCRIPTION: &'static str = "Analyze data and provide insights";

    async fn handle(&self, input: AnalyzeDataInput) -> Result<String, ToolError> {
        if input.data.trim().is_empty() {
            return Err(ToolError::invalid_arguments("no data to analyze"));
        }
        Ok(format!(
            "Analysis of the provided data: {}. Recommendation: \
             Consider strategic implementation with careful monitoring.",
            pick_finding()
        ))
    }
}

fn pick_finding() -> &'static str {
    FINDINGS.choose(&mut rand::rng()).copied().unwrap_or(FINDINGS[0])
}
