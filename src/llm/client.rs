//! Gemini API client for classification and embeddings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DomainConfig, LlmSettings};

use super::prompt::{classification_prompt, parse_classification};
use super::{Classification, Classifier, Embedder, LlmError};

/// Client for the generative-language API.
pub struct GeminiClient {
    settings: LlmSettings,
    domain: Arc<DomainConfig>,
    client: Client,
}

/// generateContent request payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
    temperature: f32,
}

/// generateContent response payload (the parts we read).
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// embedContent request payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiClient {
    /// Create a new client for the configured domain.
    pub fn new(settings: LlmSettings, domain: Arc<DomainConfig>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            settings,
            domain,
            client,
        }
    }

    /// JSON schema constraining the classification response.
    fn classification_schema(&self) -> serde_json::Value {
        let ids: Vec<&str> = self
            .domain
            .categories
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "category": { "type": "STRING", "enum": ids },
                "document_title": { "type": "STRING" },
                "effective_date": { "type": "STRING" },
            },
            "required": ["category"],
        })
    }

    /// POST a payload and deserialize the response, mapping transport and
    /// status failures onto the error taxonomy.
    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        request: &Req,
    ) -> Result<Resp, LlmError> {
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.settings.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        resp.json::<Resp>()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))
    }

    /// Call generateContent and return the first candidate's text.
    async fn generate(&self, prompt: String, schema: serde_json::Value) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
                temperature: 0.0,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.endpoint, self.settings.model
        );
        let response: GenerateResponse = self.post_json(&url, &request).await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(LlmError::Parse("empty candidate response".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Classifier for GeminiClient {
    async fn classify(
        &self,
        file_name: &str,
        pages: &[String],
    ) -> Result<Classification, LlmError> {
        debug!("classifying {}", file_name);
        let prompt = classification_prompt(&self.domain, file_name, pages);
        let body = self.generate(prompt, self.classification_schema()).await?;
        parse_classification(&body, &self.domain)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed_pages(&self, pages: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.settings.endpoint, self.settings.embedding_model
        );

        let mut embeddings = Vec::with_capacity(pages.len());
        for page in pages {
            let request = EmbedRequest {
                model: format!("models/{}", self.settings.embedding_model),
                content: Content {
                    parts: vec![Part {
                        text: page.clone(),
                    }],
                },
                task_type: "RETRIEVAL_DOCUMENT".to_string(),
            };
            let response: EmbedResponse = self.post_json(&url, &request).await?;
            embeddings.push(response.embedding.values);
        }

        validate_embedding_shape(&embeddings)?;
        Ok(embeddings)
    }
}

/// Check the vectors share one fixed dimension.
fn validate_embedding_shape(embeddings: &[Vec<f32>]) -> Result<(), LlmError> {
    let Some(first) = embeddings.first() else {
        return Ok(());
    };
    if first.is_empty() {
        return Err(LlmError::Contract("empty embedding vector".to_string()));
    }
    for vec in embeddings {
        if vec.len() != first.len() {
            return Err(LlmError::Contract(format!(
                "embedding dimension mismatch: {} != {}",
                vec.len(),
                first.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_classification_schema_enumerates_categories() {
        let config = Config::starter_banking();
        let client = GeminiClient::new(config.llm, Arc::new(config.domain));
        let schema = client.classification_schema();
        let ids = schema["properties"]["category"]["enum"].as_array().unwrap();
        assert!(ids.iter().any(|v| v == "PriceList"));
        assert!(!ids.iter().any(|v| v == "Uncategorized"));
        assert_eq!(schema["required"][0], "category");
    }

    #[test]
    fn test_embedding_shape_validation() {
        assert!(validate_embedding_shape(&[]).is_ok());
        assert!(validate_embedding_shape(&[vec![0.1, 0.2], vec![0.3, 0.4]]).is_ok());
        assert!(validate_embedding_shape(&[vec![0.1, 0.2], vec![0.3]]).is_err());
        assert!(validate_embedding_shape(&[vec![]]).is_err());
    }
}
