//! Prompt templates, response schemas and chat personas
//!
//! Everything the Gemini client sends besides transport details.

use serde_json::{Value, json};

use crate::types::Assistant;

/// Technical analysis prompt for one symbol
pub fn analysis_prompt(symbol: &str) -> String {
    format!(
        "Perform a real-time technical analysis for the financial asset {symbol}.
You MUST prioritize the Force Index logic for your probability calculation:
- If the current price is BELOW the Force Index level: Signal is BULLISH (probability of UP is higher).
- If the current price is ABOVE the Force Index level: Signal is BEARISH (probability of DOWN is higher).

Also evaluate the market volatility:
- If candles are moving rapidly and price swings are large, mark volatility as \"HIGH / VOLATILE\".
- If movement is slow, mark it as \"STABLE / LOW\".

Provide a probability percentage (0-100) for it going UP (bullish) or DOWN (bearish).
The sum of both probabilities should be 100.
Base this on the latest available market context from Google Search."
    )
}

/// JSON schema the analysis response must follow
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "bullishProb": { "type": "NUMBER" },
            "bearishProb": { "type": "NUMBER" },
            "trend": { "type": "STRING", "enum": ["UP", "DOWN", "NEUTRAL"] },
            "signals": {
                "type": "OBJECT",
                "properties": {
                    "rsi": { "type": "STRING" },
                    "macd": { "type": "STRING" },
                    "movingAverage": { "type": "STRING" },
                    "volatility": { "type": "STRING" }
                },
                "required": ["rsi", "macd", "movingAverage", "volatility"]
            },
            "summary": { "type": "STRING" }
        },
        "required": ["bullishProb", "bearishProb", "trend", "signals", "summary"]
    })
}

/// News curation prompt
pub fn news_prompt(query: &str, count: usize) -> String {
    format!(
        "Find the {count} most important and recent real news articles about {query} from today.
The news must be relevant to traders and come from reliable financial sources.
Categorize each as 'Forex', 'Crypto', 'Gold', or 'General'."
    )
}

/// JSON schema the news response must follow
pub fn news_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "summary": { "type": "STRING" },
                "url": { "type": "STRING" },
                "source": { "type": "STRING" },
                "timestamp": { "type": "STRING" },
                "category": { "type": "STRING", "enum": ["Forex", "Crypto", "Gold", "General"] }
            },
            "required": ["title", "summary", "url", "source", "timestamp", "category"]
        }
    })
}

impl Assistant {
    /// System instruction for this persona
    pub fn system_instruction(self, symbol: Option<&str>) -> String {
        match self {
            Assistant::Support => "You are the AXQ customer support agent.
Your goal is to help users with platform navigation, subscription plans and basic financial concepts.
STRICT RULES:
- Only answer questions about trading, finance, economics and using AXQ.
- Politely decline anything else.
- Never give personalised investment advice.
- Keep answers short and friendly."
                .to_string(),
            Assistant::Analyst => {
                let symbol = symbol.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("the selected asset");
                format!(
                    "You are the AXQ professional strategy analyst.
Your mission is to provide deep technical analysis, risk management suggestions and market explanations.
GOLDEN RULES:
- You are an expert in Force Index, RSI, MACD and price action.
- The user is currently watching {symbol}; relate your answers to it when relevant.
- Always include a risk management note (stop-loss, position sizing).
- Be concise and use bullet points for strategies."
                )
            }
        }
    }

    /// Greeting a client shows before the first message
    pub fn greeting(self, symbol: Option<&str>) -> String {
        match self {
            Assistant::Support => {
                "Welcome to AXQ Support. How can I help you with the platform or your general finance questions?"
                    .to_string()
            }
            Assistant::Analyst => format!(
                "AXQ Pro Analyst ready. I'm monitoring {}. Do you need a detailed strategy or an indicator breakdown for today?",
                symbol.unwrap_or("the market")
            ),
        }
    }

    /// Reply substituted when the AI call fails
    pub fn fallback_reply(self) -> &'static str {
        match self {
            Assistant::Support => "Connection error. Please check the platform configuration.",
            Assistant::Analyst => "Analysis engine failure. Please retry.",
        }
    }
}

/// What a news search field entry asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsQuery {
    /// The hidden admin command
    AdminShortcut,
    /// Free-text search (or the default topics)
    Search(String),
}

impl NewsQuery {
    /// Classify raw input; blank input searches the default topics
    pub fn parse(input: Option<&str>, admin_command: &str, default_query: &str) -> Self {
        let input = input.map(str::trim).unwrap_or_default();
        if !admin_command.is_empty() && input == admin_command {
            return NewsQuery::AdminShortcut;
        }
        if input.is_empty() {
            NewsQuery::Search(default_query.to_string())
        } else {
            NewsQuery::Search(input.to_string())
        }
    }
}

/// Strip markdown code fences the model sometimes wraps JSON in
///
/// Fences are removed wherever they appear (with or without a `json` tag,
/// any case), then any prose around the outermost JSON value is dropped.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 3..];
        if rest.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);

    let trimmed = out.trim();
    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if start < end => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_mention_inputs() {
        assert!(analysis_prompt("OANDA:XAUUSD").contains("OANDA:XAUUSD"));
        let news = news_prompt("Gold", 6);
        assert!(news.contains("6 most important"));
        assert!(news.contains("about Gold"));
    }

    #[test]
    fn test_schemas_require_contract_fields() {
        let analysis = analysis_schema();
        let required: Vec<&str> = analysis["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["bullishProb", "bearishProb", "trend", "signals", "summary"]);
        assert_eq!(news_schema()["items"]["properties"]["category"]["enum"][2], "Gold");
    }

    #[test]
    fn test_news_query_parsing() {
        let parse = |input| NewsQuery::parse(input, "/admin", "Forex, Crypto, Gold");
        assert_eq!(parse(Some(" /admin ")), NewsQuery::AdminShortcut);
        assert_eq!(parse(Some("/admin please")), NewsQuery::Search("/admin please".into()));
        assert_eq!(parse(Some("  ")), NewsQuery::Search("Forex, Crypto, Gold".into()));
        assert_eq!(parse(None), NewsQuery::Search("Forex, Crypto, Gold".into()));
        assert_eq!(parse(Some("bitcoin ETF")), NewsQuery::Search("bitcoin ETF".into()));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```JSON\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(
            strip_code_fences("Here you go:\n```json{\"a\":[1]}```\nGood luck."),
            "{\"a\":[1]}"
        );
        assert_eq!(strip_code_fences("no json here"), "no json here");
    }

    #[test]
    fn test_personas() {
        let analyst = Assistant::Analyst.system_instruction(Some("BINANCE:BTCUSDT"));
        assert!(analyst.contains("BINANCE:BTCUSDT"));
        assert!(Assistant::Analyst.system_instruction(None).contains("the selected asset"));
        assert!(Assistant::Support.system_instruction(None).contains("support agent"));
        assert_ne!(Assistant::Support.fallback_reply(), Assistant::Analyst.fallback_reply());
        assert!(Assistant::Analyst.greeting(Some("FX:EURUSD")).contains("FX:EURUSD"));
    }
}
