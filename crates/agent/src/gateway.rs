//! OpenAI-compatible chat completions gateway.

use std::time::Duration;

use async_trait::async_trait;
use pricelens_core::config::LlmConfig;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::extract::extract_json_object;
use crate::oracle::{Identification, OracleError, OracleQuote, OracleRequest, PricingOracle};

const RETRY_BACKOFF_MS: u64 = 250;

const PRICE_SYSTEM_PROMPT: &str = "You are a price research assistant for the Indian market. \
Respond ONLY with a JSON object of this shape: \
{\"priceHistory\": [{\"month\": string, \"priceINR\": number}], \
\"predictedPrices\": [{\"month\": string, \"priceINR\": number}], \
\"specifications\": {\"brand\": string, \"description\": string}}. \
Use exactly the months you are given and keep every price inside the stated range.";

const IDENTIFY_SYSTEM_PROMPT: &str = "You are a product identification expert. \
Analyze the image and respond ONLY with a JSON object of this shape: \
{\"productName\": string, \"category\": string, \"confidence\": number between 0 and 1, \
\"description\": string}. Include brand, model and variant when visible.";

pub struct GatewayOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
    max_retries: u32,
}

impl std::fmt::Debug for GatewayOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayOracle")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl GatewayOracle {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| OracleError::Transport("gateway api key is not configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| OracleError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.base_url),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete(&self, messages: Value) -> Result<String, OracleError> {
        let body = json!({ "model": self.model, "messages": messages });
        let mut attempt = 0;

        loop {
            let sent = self
                .client
                .post(&self.endpoint)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "oracle.gateway.retry",
                        attempt,
                        error = %error,
                        "gateway request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64))
                        .await;
                    continue;
                }
                Err(error) => return Err(OracleError::Transport(error.to_string())),
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(classify_status(status, &text));
            }

            let payload: ChatCompletion = response
                .json()
                .await
                .map_err(|error| OracleError::MalformedResponse(error.to_string()))?;
            debug!(event_name = "oracle.gateway.completed", model = %self.model, attempt);
            return first_message(payload);
        }
    }
}

#[async_trait]
impl PricingOracle for GatewayOracle {
    async fn quote(&self, request: &OracleRequest) -> Result<OracleQuote, OracleError> {
        let messages = json!([
            { "role": "system", "content": PRICE_SYSTEM_PROMPT },
            { "role": "user", "content": price_prompt(request) },
        ]);

        let content = self.complete(messages).await?;
        parse_content(&content)
    }

    async fn identify(&self, image: &str) -> Result<Identification, OracleError> {
        let messages = json!([
            { "role": "system", "content": IDENTIFY_SYSTEM_PROMPT },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": "Identify the product in this image:" },
                    { "type": "image_url", "image_url": { "url": image } },
                ],
            },
        ]);

        let content = self.complete(messages).await?;
        parse_content(&content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn classify_status(status: StatusCode, body: &str) -> OracleError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => OracleError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => OracleError::PaymentRequired,
        other => OracleError::Upstream {
            status: other.as_u16(),
            message: body.chars().take(200).collect(),
        },
    }
}

fn first_message(payload: ChatCompletion) -> Result<String, OracleError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| OracleError::MalformedResponse("completion had no content".to_string()))
}

fn parse_content<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, OracleError> {
    let value = extract_json_object(content)
        .ok_or_else(|| OracleError::MalformedResponse("no JSON object in reply".to_string()))?;
    serde_json::from_value(value).map_err(|error| OracleError::MalformedResponse(error.to_string()))
}

fn price_prompt(request: &OracleRequest) -> String {
    format!(
        "Find price information for \"{}\" in category \"{}\". \
The closest known product is \"{}\" at about INR {}; keep prices between INR {} and INR {}. \
History months: {}. Forecast months: {}.",
        request.product_name,
        request.category.as_deref().unwrap_or("general"),
        request.matched_key,
        request.reference_price,
        request.band.low,
        request.band.high,
        request.history_months.join(", "),
        request.forecast_months.join(", "),
    )
}
