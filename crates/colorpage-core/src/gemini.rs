//! Minimal client for the `generateContent` endpoint.
//!
//! Only the two calls the pipeline makes are modelled: a text completion used
//! to refine prompts, and an image generation seeded with a reference image.
//! Failures are reported as [`ServiceFailure`] values; callers decide on the
//! fallback.

use crate::config::Config;
use crate::outcome::ServiceFailure;
use crate::types::SynthesizedImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: RequestInlineData<'a> },
}

#[derive(Debug, Serialize)]
struct RequestInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    #[serde(rename = "mimeType", alias = "mime_type", default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or_default()
    }
}

/// Client for the generative text and image models.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    text_model: String,
    image_model: String,
}

impl GeminiClient {
    /// Build a client from the run configuration.
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.endpoints.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: config.credentials.gemini_api_key().map(str::to_string),
            text_model: config.models.text_model.clone(),
            image_model: config.models.image_model.clone(),
        }
    }

    /// Whether a key is configured.
    pub const fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Text of `candidates[0].content.parts[0].text`, verbatim.
    ///
    /// A missing or whitespace-only text is [`ServiceFailure::NoPayload`].
    #[instrument(level = "debug", skip(self, prompt), fields(model = %self.text_model))]
    pub async fn generate_text(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, ServiceFailure> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart::Text { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
        };
        let response = self.call(&self.text_model, &body, timeout).await?;

        response
            .parts()
            .first()
            .and_then(|part| part.text.as_deref())
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
            .ok_or(ServiceFailure::NoPayload)
    }

    /// First inline part whose MIME type starts with `image/`.
    #[instrument(level = "debug", skip(self, prompt, reference_base64), fields(model = %self.image_model))]
    pub async fn generate_image(
        &self,
        prompt: &str,
        reference_base64: &str,
        reference_mime: &str,
        timeout: Duration,
    ) -> Result<SynthesizedImage, ServiceFailure> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: prompt },
                    RequestPart::Inline {
                        inline_data: RequestInlineData {
                            mime_type: reference_mime,
                            data: reference_base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        };
        let response = self.call(&self.image_model, &body, timeout).await?;

        response
            .parts()
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|inline| inline.mime_type.starts_with("image/") && !inline.data.is_empty())
            .map(|inline| SynthesizedImage {
                mime_type: inline.mime_type.clone(),
                data_base64: inline.data.clone(),
            })
            .ok_or(ServiceFailure::NoPayload)
    }

    async fn call(
        &self,
        model: &str,
        body: &GenerateRequest<'_>,
        timeout: Duration,
    ) -> Result<GenerateResponse, ServiceFailure> {
        let Some(key) = &self.api_key else {
            return Err(ServiceFailure::NoCredential);
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .timeout(timeout)
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceFailure::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = %status, "generateContent rejected");
            return Err(ServiceFailure::from_status(status));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ServiceFailure::BadResponse(format!("unparseable generateContent body: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        let mut config = Config::default();
        config.endpoints.gemini_base_url = server.uri();
        config.credentials.gemini_api_key = Some("test-key".into());
        GeminiClient::new(build_client().unwrap(), &config)
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_request_shape() {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: "draw" },
                    RequestPart::Inline {
                        inline_data: RequestInlineData {
                            mime_type: "image/png",
                            data: "QUJD",
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "draw");
        assert_eq!(value["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(value["generationConfig"]["topK"], 40);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[tokio::test]
    async fn test_no_key_short_circuits() {
        let gemini = GeminiClient::new(build_client().unwrap(), &Config::default());
        assert!(!gemini.has_credential());
        assert_eq!(
            gemini.generate_text("hi", TIMEOUT).await,
            Err(ServiceFailure::NoCredential)
        );
    }

    #[tokio::test]
    async fn test_generate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "  refined\nprompt\n"}]}}]
            })))
            .mount(&server)
            .await;

        let text = client(&server).generate_text("raw", TIMEOUT).await.unwrap();
        assert_eq!(text, "  refined\nprompt\n");
    }

    #[tokio::test]
    async fn test_blank_text_is_no_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": " \n\t"}]}}]
            })))
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).generate_text("raw", TIMEOUT).await,
            Err(ServiceFailure::NoPayload)
        );
    }

    #[tokio::test]
    async fn test_generate_text_without_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"promptFeedback": {}})))
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).generate_text("raw", TIMEOUT).await,
            Err(ServiceFailure::NoPayload)
        );
    }

    #[tokio::test]
    async fn test_generate_image_skips_non_image_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{"parts": [{"text": "page"}, {"inline_data": {"mime_type": "image/png", "data": "UkVG"}}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"text": "Here is your page"},
                    {"inlineData": {"mimeType": "text/plain", "data": "bm9wZQ=="}},
                    {"inlineData": {"mimeType": "image/png", "data": "UE5H"}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let image = client(&server)
            .generate_image("page", "UkVG", "image/png", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data_base64, "UE5H");
    }

    #[tokio::test]
    async fn test_generate_image_no_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "I cannot draw that"}]}}]
            })))
            .mount(&server)
            .await;

        assert_eq!(
            client(&server)
                .generate_image("page", "UkVG", "image/png", TIMEOUT)
                .await,
            Err(ServiceFailure::NoPayload)
        );
    }

    #[tokio::test]
    async fn test_http_error_is_bad_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client(&server).generate_text("raw", TIMEOUT).await;
        assert!(matches!(result, Err(ServiceFailure::BadResponse(msg)) if msg.contains("429")));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let result = client(&server)
            .generate_image("page", "UkVG", "image/png", Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(ServiceFailure::TransportError(_))));
    }
}
