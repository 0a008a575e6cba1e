//! Per-model token rates for cost estimation.
//!
//! Rates are USD per million tokens. Defaults follow OpenAI's published list
//! prices and can be overridden through environment variables or the builder.

use std::collections::HashMap;
use std::sync::LazyLock;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TOKENS_PER_MTOK: Decimal = dec!(1_000_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPricing {
    pub input_per_mtok: Decimal,
    pub output_per_mtok: Decimal,
}

impl ModelPricing {
    pub const fn new(input_per_mtok: Decimal, output_per_mtok: Decimal) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    pub fn calculate(&self, input_tokens: u64, output_tokens: u64) -> Decimal {
        let input = Decimal::from(input_tokens) * self.input_per_mtok;
        let output = Decimal::from(output_tokens) * self.output_per_mtok;
        (input + output) / TOKENS_PER_MTOK
    }
}

/// Exact-name rate table. Unknown models have no price.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn builder() -> PricingTableBuilder {
        PricingTableBuilder::new()
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(&model.to_lowercase())
    }

    pub fn contains(&self, model: &str) -> bool {
        self.get(model).is_some()
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct PricingTableBuilder {
    models: HashMap<String, ModelPricing>,
}

impl PricingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(self) -> Self {
        self.model("gpt-4o-mini", dec!(0.15), dec!(0.60))
            .model("gpt-4o", dec!(2.50), dec!(10.00))
            .model("gpt-4.1", dec!(2.00), dec!(8.00))
            .model("gpt-4.1-mini", dec!(0.40), dec!(1.60))
    }

    pub fn model(mut self, name: impl Into<String>, input: Decimal, output: Decimal) -> Self {
        self.models
            .insert(name.into().to_lowercase(), ModelPricing::new(input, output));
        self
    }

    /// Defaults, then `AGENT_RELAY_PRICING_<MODEL>_INPUT` / `_OUTPUT` overrides.
    ///
    /// `<MODEL>` is the model name upper-cased with `-` and `.` replaced by `_`,
    /// e.g. `AGENT_RELAY_PRICING_GPT_4O_MINI_INPUT`.
    pub fn from_env(mut self) -> Self {
        self = self.with_defaults();

        let names: Vec<String> = self.models.keys().cloned().collect();
        for name in names {
            if let Some(pricing) = Self::parse_env_pricing(&env_model_key(&name)) {
                self.models.insert(name, pricing);
            }
        }

        self
    }

    fn parse_env_pricing(model: &str) -> Option<ModelPricing> {
        let input = std::env::var(format!("AGENT_RELAY_PRICING_{}_INPUT", model))
            .ok()?
            .parse::<Decimal>()
            .ok()?;
        let output = std::env::var(format!("AGENT_RELAY_PRICING_{}_OUTPUT", model))
            .ok()?
            .parse::<Decimal>()
            .ok()?;
        Some(ModelPricing::new(input, output))
    }

    pub fn build(self) -> PricingTable {
        PricingTable {
            models: self.models,
        }
    }
}

fn env_model_key(model: &str) -> String {
    model.to_uppercase().replace(['-', '.'], "_")
}

static GLOBAL_PRICING: LazyLock<PricingTable> =
    LazyLock::new(|| PricingTableBuilder::new().from_env().build());

pub fn global_pricing_table() -> &'static PricingTable {
    &GLOBAL_PRICING
}
