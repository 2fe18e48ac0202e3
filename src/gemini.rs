//! Gemini `generateContent` API client
//!
//! Implements the three AI contracts of the dashboard:
//! - Market analysis for a symbol (schema-constrained JSON + grounding sources)
//! - Curated market news (schema-constrained JSON array)
//! - Chat assistants (free text with a persona instruction)
//!
//! Every call returns a `Result`; substituting the fallback values is the
//! caller's decision.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::{PortalError, Result};
use crate::prompts::{analysis_prompt, analysis_schema, news_prompt, news_schema, strip_code_fences};
use crate::types::{Assistant, ChatMessage, ChatRole, GroundingSource, MarketAnalysis, NewsArticle};

/// Gemini API client
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    grounding: bool,
}

/// Request body of generateContent
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// Content turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Text part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

/// Structured output settings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

/// Response body of generateContent
#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One completion candidate
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

/// Search grounding attached to a candidate
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

/// Grounding chunk; only web chunks are used
#[derive(Debug, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<GroundingSource>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() { None } else { Some(text) }
    }

    /// Web sources of the first candidate
    pub fn sources(&self) -> Vec<GroundingSource> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| {
                m.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.clone())
                    .filter(|web| !web.uri.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse an analysis response into the contract shape
pub fn parse_analysis(response: &GenerateResponse) -> Result<MarketAnalysis> {
    let text = response
        .text()
        .ok_or_else(|| PortalError::AiApi("Empty response from AI".into()))?;
    let mut analysis: MarketAnalysis = serde_json::from_str(&strip_code_fences(&text))?;
    analysis.clamp_probabilities();
    analysis.sources = response.sources();
    Ok(analysis)
}

/// Parse a news response; empty text means no articles
pub fn parse_news(response: &GenerateResponse) -> Result<Vec<NewsArticle>> {
    match response.text() {
        Some(text) => Ok(serde_json::from_str(&strip_code_fences(&text))?),
        None => Ok(vec![]),
    }
}

/// Build the chat request for a persona, history and new message
pub fn chat_request(
    assistant: Assistant,
    symbol: Option<&str>,
    history: &[ChatMessage],
    message: &str,
) -> GenerateRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .filter(|m| !m.text.trim().is_empty())
        .map(|m| {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            Content::text(Some(role), &m.text)
        })
        .collect();
    contents.push(Content::text(Some("user"), message));

    GenerateRequest {
        contents,
        system_instruction: Some(Content::text(None, &assistant.system_instruction(symbol))),
        tools: vec![],
        generation_config: None,
    }
}

impl GeminiClient {
    /// Create client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| PortalError::Config("GEMINI_API_KEY secret not found".into()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: config.gemini_base_url.clone(),
            model: config.gemini_model.clone(),
            grounding: config.enable_grounding,
        })
    }

    fn structured_request(&self, prompt: &str, schema: Value) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: None,
            tools: if self.grounding {
                vec![serde_json::json!({ "googleSearch": {} })]
            } else {
                vec![]
            },
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            }),
        }
    }

    /// Technical analysis for one symbol
    pub async fn market_analysis(&self, symbol: &str) -> Result<MarketAnalysis> {
        let request = self.structured_request(&analysis_prompt(symbol), analysis_schema());
        let response = self.generate(&request).await?;
        parse_analysis(&response)
    }

    /// Recent news for a query
    pub async fn market_news(&self, query: &str, count: usize) -> Result<Vec<NewsArticle>> {
        let request = self.structured_request(&news_prompt(query, count), news_schema());
        let response = self.generate(&request).await?;
        parse_news(&response)
    }

    /// Chat reply from a persona
    pub async fn chat(
        &self,
        assistant: Assistant,
        symbol: Option<&str>,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String> {
        let request = chat_request(assistant, symbol, history, message);
        let response = self.generate(&request).await?;
        response
            .text()
            .ok_or_else(|| PortalError::AiApi("Empty chat response".into()))
    }

    /// POST generateContent
    async fn generate(&self, body: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response, checking for errors
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(PortalError::RateLimit(retry_after));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            return Err(PortalError::AiApi(format!("HTTP {status}: {error_text}")));
        }

        response.json().await.map_err(PortalError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewsCategory, Trend};

    fn response(json: &str) -> GenerateResponse {
        serde_json::from_str(json).expect("fixture should parse")
    }

    #[test]
    fn test_parse_analysis_with_fences_and_sources() {
        let resp = response(
            r#"{"candidates":[{
                "content":{"role":"model","parts":[{"text":"```json\n{\"bullishProb\":70,\"bearishProb\":30,\"trend\":\"UP\",\"signals\":{\"rsi\":\"41\",\"macd\":\"Bullish\",\"movingAverage\":\"Below 50 EMA\",\"volatility\":\"HIGH / VOLATILE\"},\"summary\":\"Below Force Index\"}\n```"}]},
                "groundingMetadata":{"groundingChunks":[
                    {"web":{"uri":"https://example.com/a","title":"A"}},
                    {"retrievedContext":{}},
                    {"web":{"uri":"","title":"empty"}}
                ]}
            }]}"#,
        );

        let analysis = parse_analysis(&resp).unwrap();
        assert_eq!(analysis.trend, Trend::Up);
        assert_eq!(analysis.bullish_prob, 70.0);
        assert_eq!(analysis.signals.volatility, "HIGH / VOLATILE");
        assert_eq!(analysis.sources.len(), 1);
        assert_eq!(analysis.sources[0].title, "A");
    }

    #[test]
    fn test_parse_analysis_empty_is_error() {
        let resp = response(r#"{"candidates":[]}"#);
        assert!(matches!(parse_analysis(&resp), Err(PortalError::AiApi(_))));

        let garbage = response(r#"{"candidates":[{"content":{"parts":[{"text":"not json"}]}}]}"#);
        assert!(matches!(parse_analysis(&garbage), Err(PortalError::Json(_))));
    }

    #[test]
    fn test_parse_news() {
        let resp = response(
            r#"{"candidates":[{"content":{"parts":[{"text":"[{\"title\":\"Gold hits record\",\"summary\":\"s\",\"url\":\"https://n.example\",\"source\":\"Reuters\",\"timestamp\":\"2h ago\",\"category\":\"Gold\"}]"}]}}]}"#,
        );
        let news = parse_news(&resp).unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].category, NewsCategory::Gold);

        assert!(parse_news(&GenerateResponse::default()).unwrap().is_empty());
    }

    #[test]
    fn test_chat_request_serialization() {
        let history = vec![
            ChatMessage { role: ChatRole::Model, text: "Hi, how can I help?".into() },
            ChatMessage { role: ChatRole::User, text: "   ".into() },
            ChatMessage { role: ChatRole::User, text: "What is RSI?".into() },
        ];
        let request = chat_request(Assistant::Analyst, Some("FX:EURUSD"), &history, "And MACD?");

        let json = serde_json::to_value(&request).expect("request serialization should succeed");
        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "And MACD?");
        assert!(json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("FX:EURUSD"));
        assert!(json.get("tools").is_none());
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_structured_request_shape() {
        let mut config = Config::from_lookup(|key| (key == "GEMINI_API_KEY").then(|| "k".to_string()));
        let client = GeminiClient::new(&config).unwrap();
        let json = serde_json::to_value(client.structured_request("p", news_schema())).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["tools"][0], serde_json::json!({ "googleSearch": {} }));

        config.gemini_api_key = None;
        assert!(matches!(GeminiClient::new(&config), Err(PortalError::Config(_))));
    }
}
