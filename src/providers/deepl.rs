use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use super::retry::{
    DEFAULT_MAX_RETRIES, RETRY_BASE_DELAY, is_retryable, retry_after, wait_with_backoff,
};
use super::{Provider, ProviderFuture, TranslationRequest};

const FREE_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";
const PRO_ENDPOINT: &str = "https://api.deepl.com/v2/translate";

/// Free-plan keys carry a `:fx` suffix and must use the free host.
pub(crate) fn default_endpoint(key: &str) -> &'static str {
    if key.trim().ends_with(":fx") {
        FREE_ENDPOINT
    } else {
        PRO_ENDPOINT
    }
}

#[derive(Debug, Clone)]
pub struct DeepL {
    client: reqwest::Client,
    key: String,
    endpoint: String,
    max_retries: usize,
    base_delay: Duration,
}

impl DeepL {
    pub fn new(key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let key = key.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build http client")?;
        Ok(Self {
            endpoint: default_endpoint(&key).to_string(),
            client,
            key,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if !endpoint.trim().is_empty() {
            self.endpoint = endpoint;
        }
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Provider for DeepL {
    fn name(&self) -> &'static str {
        "DeepL"
    }

    fn translate(&self, request: TranslationRequest) -> ProviderFuture {
        let provider = self.clone();
        Box::pin(async move { call_translate(provider, request).await })
    }
}

pub(crate) fn request_body(request: &TranslationRequest) -> Value {
    let mut body = json!({
        "text": [request.text],
        "target_lang": request.target_lang.to_uppercase(),
    });
    if !request.detects_source() {
        body["source_lang"] = json!(request.source_lang.to_uppercase());
    }
    if request.preserve_markup {
        body["tag_handling"] = json!("html");
        body["preserve_formatting"] = json!(true);
    }
    body
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

pub(crate) fn extract_translation(body: &str) -> Result<String> {
    let response: TranslateResponse =
        serde_json::from_str(body).with_context(|| "failed to parse DeepL response")?;
    response
        .translations
        .into_iter()
        .next()
        .map(|translation| translation.text)
        .ok_or_else(|| anyhow!("DeepL response contained no translations"))
}

fn extract_error(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn call_translate(provider: DeepL, request: TranslationRequest) -> Result<String> {
    let body = request_body(&request);
    let mut attempt = 0usize;
    let mut delay = provider.base_delay;
    loop {
        attempt += 1;
        let sent = provider
            .client
            .post(&provider.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", provider.key))
            .json(&body)
            .send()
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(err) if attempt < provider.max_retries => {
                let reason = format!("request failed ({err})");
                delay = wait_with_backoff(
                    "DeepL",
                    &reason,
                    attempt,
                    provider.max_retries,
                    delay,
                    None,
                )
                .await;
                continue;
            }
            Err(err) => {
                return Err(anyhow!(
                    "DeepL request failed after {} attempts: {}",
                    attempt,
                    err
                ));
            }
        };

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return extract_translation(&text);
        }
        if is_retryable(status, &text) && attempt < provider.max_retries {
            let reason = format!("returned {status}");
            delay = wait_with_backoff(
                "DeepL",
                &reason,
                attempt,
                provider.max_retries,
                delay,
                retry_after,
            )
            .await;
            continue;
        }
        return Err(anyhow!(
            "DeepL API error ({}): {}",
            status,
            extract_error(&text).unwrap_or(text)
        ));
    }
}
