//! Price skill - current market price of a coin from CoinGecko

use super::{Skill, SkillContext, SkillOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

pub struct PriceSkill {
    base_url: String,
}

impl PriceSkill {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn coin_url(&self, coin_id: &str) -> String {
        format!(
            "{}/coins/{coin_id}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
            self.base_url
        )
    }
}

impl Default for PriceSkill {
    fn default() -> Self {
        Self::new(DEFAULT_COINGECKO_URL)
    }
}

#[derive(Debug, Deserialize)]
struct PriceInput {
    coin_id: String,
}

/// `market_data.current_price` of a coin document, keyed by currency
fn current_price(body: &Value) -> Option<Value> {
    body.get("market_data")?.get("current_price").cloned()
}

#[async_trait]
impl Skill for PriceSkill {
    fn name(&self) -> &'static str {
        "Price"
    }

    fn description(&self) -> String {
        "Use this skill to get the price of a cryptocurrency".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["coin_id"],
            "properties": {
                "coin_id": {
                    "type": "string",
                    "description": "CoinGecko coin id, e.g. bitcoin or ethereum"
                }
            }
        })
    }

    async fn process(&self, input: Value, ctx: SkillContext) -> SkillOutput {
        let input: PriceInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return SkillOutput::error(format!("Invalid input: {e}")),
        };
        let coin_id = input.coin_id.trim();
        if coin_id.is_empty() || coin_id.contains(|c: char| matches!(c, '/' | '?' | '#')) {
            return SkillOutput::error(format!("Invalid coin id: {:?}", input.coin_id));
        }

        let url = self.coin_url(coin_id);
        tracing::debug!(agent = %ctx.agent_name, coin_id = %coin_id, "Fetching price");

        let response = match ctx.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return SkillOutput::error(format!("Price request failed: {e}")),
        };
        let status = response.status();
        let body: Value = match response.json().await {
            Ok(b) => b,
            Err(e) => return SkillOutput::error(format!("Invalid price response: {e}")),
        };
        if !status.is_success() {
            return SkillOutput::error(format!("Price lookup for {coin_id} failed: HTTP {status}"));
        }

        match current_price(&body) {
            Some(price) => SkillOutput::ok(price),
            None => SkillOutput::error(format!("No market data for {coin_id}")),
        }
    }
}
