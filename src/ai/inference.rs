use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;

use super::backend::ClassifyError;

pub const GENERATE_PATH: &str = "api/generate";
pub const TAGS_PATH: &str = "api/tags";

pub fn build_request<'a>(config: &'a BackendConfig, prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        model: &config.model,
        prompt,
        stream: false,
        format: "json",
        options: GenerateOptions {
            temperature: config.temperature,
            num_predict: config.max_tokens,
        },
    }
}

pub async fn parse_response(response: Response) -> Result<String, ClassifyError> {
    let body: GenerateResponse = response.json().await?;
    let text = body.response.trim();
    if text.is_empty() {
        return Err(ClassifyError::MalformedResponse(
            "backend returned an empty response".into(),
        ));
    }
    Ok(text.to_string())
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    pub format: &'a str,
    pub options: GenerateOptions,
}

#[derive(Debug, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_asks_for_deterministic_json() {
        let config = BackendConfig::default();
        let request = build_request(&config, "classify me");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["num_predict"], 150);
        assert!(json["options"]["temperature"].as_f64().unwrap() < 0.2);
    }
}
