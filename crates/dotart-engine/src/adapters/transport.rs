use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::truncate_text;

/// Synchronous request/response call to a model, keyed by model id.
pub trait BedrockTransport: Send + Sync {
    fn invoke(&self, model_id: &str, body: &Value) -> Result<Value>;
}

/// `POST {api_base}/model/{model_id}/invoke` with a Bedrock API key.
pub struct HttpBedrockTransport {
    api_base: String,
    bearer_token: Option<String>,
    http: HttpClient,
}

impl HttpBedrockTransport {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed building Bedrock HTTP client")?;
        Ok(Self {
            api_base: config.runtime_api_base.clone(),
            bearer_token: config.bearer_token.clone(),
            http,
        })
    }

    fn invoke_endpoint(&self, model_id: &str) -> String {
        format!("{}/model/{}/invoke", self.api_base, model_id)
    }
}

impl BedrockTransport for HttpBedrockTransport {
    fn invoke(&self, model_id: &str, body: &Value) -> Result<Value> {
        let Some(token) = self.bearer_token.as_deref() else {
            bail!("AWS_BEARER_TOKEN_BEDROCK not set");
        };
        let endpoint = self.invoke_endpoint(model_id);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .with_context(|| format!("Bedrock request failed ({endpoint})"))?;
        response_json_or_error(model_id, response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundationModelSummary {
    pub model_id: String,
    pub model_name: String,
}

/// Lists the foundation models visible to the configured credentials.
pub fn list_foundation_models(config: &EngineConfig) -> Result<Vec<FoundationModelSummary>> {
    let Some(token) = config.bearer_token.as_deref() else {
        bail!("AWS_BEARER_TOKEN_BEDROCK not set");
    };
    let http = HttpClient::builder()
        .timeout(config.timeout)
        .build()
        .context("failed building Bedrock HTTP client")?;
    let endpoint = format!("{}/foundation-models", config.control_api_base);
    let response = http
        .get(&endpoint)
        .bearer_auth(token)
        .send()
        .with_context(|| format!("Bedrock request failed ({endpoint})"))?;
    let payload = response_json_or_error("Bedrock foundation-models", response)?;
    Ok(parse_model_summaries(&payload))
}

pub(crate) fn parse_model_summaries(payload: &Value) -> Vec<FoundationModelSummary> {
    payload
        .get("modelSummaries")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let model_id = row.get("modelId").and_then(Value::as_str)?.trim();
                    if model_id.is_empty() {
                        return None;
                    }
                    let model_name = row
                        .get("modelName")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    Some(FoundationModelSummary {
                        model_id: model_id.to_string(),
                        model_name,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use reqwest::blocking::Response as HttpResponse;

    use super::{
        parse_model_summaries, response_json_or_error, BedrockTransport, HttpBedrockTransport,
    };
    use crate::config::EngineConfig;

    #[test]
    fn http_transport_fails_fast_without_credentials() -> anyhow::Result<()> {
        let transport = HttpBedrockTransport::new(&EngineConfig::default())?;
        let err = transport
            .invoke("stability.stable-diffusion-xl-v1", &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("AWS_BEARER_TOKEN_BEDROCK"));
        Ok(())
    }

    #[test]
    fn invoke_endpoint_is_keyed_by_model_id() -> anyhow::Result<()> {
        let config = EngineConfig::from_lookup(|key| {
            (key == "BEDROCK_REGION").then(|| "ap-northeast-2".to_string())
        });
        let transport = HttpBedrockTransport::new(&config)?;
        assert_eq!(
            transport.invoke_endpoint("amazon.titan-image-generator-v1"),
            "https://bedrock-runtime.ap-northeast-2.amazonaws.com/model/amazon.titan-image-generator-v1/invoke"
        );
        Ok(())
    }

    #[test]
    fn model_summaries_skip_rows_without_ids() {
        let payload = json!({
            "modelSummaries": [
                {"modelId": "stability.stable-diffusion-xl-v1", "modelName": "SDXL 1.0"},
                {"modelName": "nameless"},
                {"modelId": "amazon.titan-image-generator-v1"},
            ]
        });
        let rows = parse_model_summaries(&payload);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].model_name, "SDXL 1.0");
        assert_eq!(rows[1].model_name, "");
        assert!(parse_model_summaries(&Value::Null).is_empty());
    }

    fn canned_response(status: u16, body: &str) -> anyhow::Result<HttpResponse> {
        let response = http::Response::builder()
            .status(status)
            .body(body.to_string())?;
        Ok(HttpResponse::from(response))
    }

    #[test]
    fn response_json_parses_successful_body() -> anyhow::Result<()> {
        let response = canned_response(200, r#"{"images": ["aGk="]}"#)?;
        let parsed = response_json_or_error("titan", response)?;
        assert_eq!(parsed, json!({"images": ["aGk="]}));
        Ok(())
    }

    #[test]
    fn response_json_reports_status_and_truncated_body() -> anyhow::Result<()> {
        let body = format!("ThrottlingException: {}", "x".repeat(2048));
        let err = response_json_or_error("sdxl", canned_response(429, &body)?).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("sdxl request failed (429): ThrottlingException"));
        assert!(message.len() < body.len());
        Ok(())
    }

    #[test]
    fn response_json_rejects_invalid_payload() -> anyhow::Result<()> {
        let err = response_json_or_error("sdxl", canned_response(200, "<html>gateway</html>")?)
            .unwrap_err();
        assert!(err.to_string().contains("sdxl returned invalid JSON payload"));
        Ok(())
    }
}
