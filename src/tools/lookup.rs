//! Offline lookup tools: web search and market data.
//!
//! Both answer from fixed keyword tables so demos and tests run without
//! network access.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::TypedTool;
use crate::types::ToolError;

const SEARCH_RESULTS: &[(&str, &str)] = &[
    (
        "python",
        "Python is a high-level programming language created by Guido van Rossum in 1991. \
         It's known for its simplicity and readability.",
    ),
    (
        "weather",
        "Current weather data shows mixed conditions across different cities. \
         Temperature ranges from 15-30°C globally.",
    ),
    (
        "stock",
        "Stock markets are showing varied performance today. \
         Tech stocks are generally up while energy stocks are mixed.",
    ),
    (
        "news",
        "Latest news includes developments in AI technology, \
         climate initiatives, and global economic updates.",
    ),
    (
        "tokyo",
        "Tokyo is the capital of Japan, population ~14 million. \
         Known for technology, culture, and cuisine.",
    ),
    (
        "cooking",
        "Cooking tips: Start with fresh ingredients, \
         season properly, and don't overcook vegetables.",
    ),
];

const MARKET_DATA: &[(&str, &str)] = &[
    (
        "tech",
        "Tech sector showing 12% growth, driven by AI and cloud computing innovations",
    ),
    (
        "energy",
        "Renewable energy market expanding rapidly with 25% year-over-year growth",
    ),
    (
        "finance",
        "Financial markets showing stability with emerging fintech opportunities",
    ),
    (
        "healthcare",
        "Healthcare technology advancing with personalized medicine trends",
    ),
    (
        "education",
        "EdTech sector growing with increased demand for online learning solutions",
    ),
];

fn lookup(table: &'static [(&'static str, &'static str)], text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    table
        .iter()
        .find(|(key, _)| text.contains(key))
        .map(|(_, value)| *value)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchWebInput {
    /// Search query
    pub query: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchWebTool;

#[async_trait]
impl TypedTool for SearchWebTool {
    type Input = SearchWebInput;
    const NAME: &'static str = "search_web";
    const DESCRIPTION: &'static str = "Search the web for information on a topic";

    async fn handle(&self, input: SearchWebInput) -> Result<String, ToolError> {
        let summary = lookup(SEARCH_RESULTS, &input.query)
            .unwrap_or("Found general information about this topic.");
        Ok(format!("Search results for '{}': {}", input.query, summary))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarketDataInput {
    /// Market sector or topic, e.g. "tech" or "energy"
    pub topic: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketDataTool;

#[async_trait]
impl TypedTool for MarketDataTool {
    type Input = MarketDataInput;
    const NAME: &'static str = "get_market_data";
    const DESCRIPTION: &'static str = "Get market data and trends for a sector";

    async fn handle(&self, input: MarketDataInput) -> Result<String, ToolError> {
        let data = lookup(MARKET_DATA, &input.topic).unwrap_or(
            "Steady growth with emerging opportunities in digital transformation.",
        );
        Ok(format!("Market data for {}: {}", input.topic, data))
    }
}
