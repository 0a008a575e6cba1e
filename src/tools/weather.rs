//! Simulated weather lookup.

use async_trait::async_trait;
use rand::Rng;
use rand::seq::IndexedRandom;
use schemars::JsonSchema;
use serde::Deserialize;

use super::TypedTool;
use crate::types::ToolError;

const CONDITIONS: &[&str] = &["sunny", "cloudy", "rainy", "snowy", "partly cloudy"];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherInput {
    /// City name
    pub city: String,
}

/// Returns randomised but plausible weather for a city.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherTool;

#[async_trait]
impl TypedTool for WeatherTool {
    type Input = WeatherInput;
    const NAME: &'static str = "get_weather";
    const DESCRIPTION: &'static str = "Get the current weather for a city";

    async fn handle(&self, input: WeatherInput) -> Result<String, ToolError> {
        if input.city.trim().is_empty() {
            return Err(ToolError::invalid_arguments("city must not be empty"));
        }
        Ok(report(&input.city))
    }
}

fn report(city: &str) -> String {
    let mut rng = rand::rng();
    let condition = CONDITIONS.choose(&mut rng).copied().unwrap_or("sunny");
    let temperature = rng.random_range(10..=35);
    let humidity = rng.random_range(30..=80);
    format!(
        "Weather in {}: {}, {}°C, humidity {}%",
        city, condition, temperature, humidity
    )
}
