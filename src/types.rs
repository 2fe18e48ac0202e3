//! Common types for the portal
//!
//! All shared data structures used across modules: stored records,
//! AI contract payloads and request/response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Admin,
}

impl AccountStatus {
    /// Approved and admin accounts may use the market endpoints
    pub fn is_active(self) -> bool {
        matches!(self, AccountStatus::Approved | AccountStatus::Admin)
    }

    /// The view a client should show for this status
    pub fn view(self) -> AppView {
        match self {
            AccountStatus::Pending => AppView::Pending,
            AccountStatus::Approved => AppView::Dashboard,
            AccountStatus::Admin => AppView::Admin,
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Pending => write!(f, "pending"),
            AccountStatus::Approved => write!(f, "approved"),
            AccountStatus::Admin => write!(f, "admin"),
        }
    }
}

/// Client view derived from account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppView {
    Pending,
    Dashboard,
    Admin,
}

/// A stored account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: AccountStatus,
    pub joined_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_code: Option<String>,
    /// Argon2id PHC string
    pub password_hash: String,
}

impl Account {
    /// Client-facing projection without the password hash
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            status: self.status,
            joined_at: self.joined_at.clone(),
            request_code: self.request_code.clone(),
        }
    }

    /// Case-insensitive match over name, email and request code
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term)
            || self.email.to_lowercase().contains(&term)
            || self
                .request_code
                .as_deref()
                .is_some_and(|code| code.to_lowercase().contains(&term))
    }
}

/// Account as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: AccountStatus,
    pub joined_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_code: Option<String>,
}

/// Stored session: only a reference to the owning account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

/// Market trend reported by the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

/// Indicator readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signals {
    pub rsi: String,
    pub macd: String,
    pub moving_average: String,
    pub volatility: String,
}

/// Web source the model grounded its answer on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// AI market analysis for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub bullish_prob: f64,
    pub bearish_prob: f64,
    pub trend: Trend,
    pub signals: Signals,
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
}

impl MarketAnalysis {
    /// Fallback used whenever the AI call fails
    pub fn neutral() -> Self {
        Self {
            bullish_prob: 50.0,
            bearish_prob: 50.0,
            trend: Trend::Neutral,
            signals: Signals {
                rsi: "Neutral".to_string(),
                macd: "Consolidating".to_string(),
                moving_average: "At 50 EMA".to_string(),
                volatility: "Moderate".to_string(),
            },
            summary: "Analysis temporarily unavailable. Check your connection.".to_string(),
            sources: vec![],
        }
    }

    /// Clamp probabilities into 0-100 (NaN becomes 50)
    pub fn clamp_probabilities(&mut self) {
        let clamp = |p: f64| if p.is_nan() { 50.0 } else { p.clamp(0.0, 100.0) };
        self.bullish_prob = clamp(self.bullish_prob);
        self.bearish_prob = clamp(self.bearish_prob);
    }
}

/// News category; anything unrecognised is General
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum NewsCategory {
    Forex,
    Crypto,
    Gold,
    General,
}

impl From<String> for NewsCategory {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "forex" => NewsCategory::Forex,
            "crypto" => NewsCategory::Crypto,
            "gold" => NewsCategory::Gold,
            _ => NewsCategory::General,
        }
    }
}

/// AI-curated news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source: String,
    pub timestamp: String,
    pub category: NewsCategory,
}

/// Who said a chat line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One line of chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// Chat persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assistant {
    /// Platform support agent
    Support,
    /// Strategy analyst primed with the selected symbol
    Analyst,
}

/// Body of POST /api/register
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body of POST /api/activate
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub code: String,
}

/// Body of PUT /api/admin/license
#[derive(Debug, Deserialize)]
pub struct LicenseRequest {
    pub value: String,
}

/// Body of POST /api/chat
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub assistant: Assistant,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub message: String,
}

/// Response of register/status/activate
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub account: AccountProfile,
    pub view: AppView,
}

/// Admin console counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub admin: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: "1".to_string(),
            name: "Ana Trader".to_string(),
            email: "ana@x.com".to_string(),
            status: AccountStatus::Pending,
            joined_at: "2025-01-01T00:00:00Z".to_string(),
            request_code: Some("AXQ-4821".to_string()),
            password_hash: "$argon2id$secret".to_string(),
        }
    }

    #[test]
    fn test_status_views() {
        assert_eq!(AccountStatus::Pending.view(), AppView::Pending);
        assert_eq!(AccountStatus::Approved.view(), AppView::Dashboard);
        assert_eq!(AccountStatus::Admin.view(), AppView::Admin);
        assert!(!AccountStatus::Pending.is_active());
        assert!(AccountStatus::Approved.is_active());
    }

    #[test]
    fn test_profile_hides_password_hash() {
        let json = serde_json::to_string(&account().profile()).unwrap();
        assert!(json.contains("\"requestCode\":\"AXQ-4821\""));
        assert!(json.contains("\"status\":\"pending\""));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn test_account_search() {
        let acc = account();
        assert!(acc.matches_search("ANA"));
        assert!(acc.matches_search("x.com"));
        assert!(acc.matches_search("axq-48"));
        assert!(acc.matches_search("  "));
        assert!(!acc.matches_search("bob"));
    }

    #[test]
    fn test_news_category_fallback() {
        let article: NewsArticle = serde_json::from_str(
            r#"{"title":"t","summary":"s","url":"u","source":"src","timestamp":"now","category":"Stocks"}"#,
        )
        .unwrap();
        assert_eq!(article.category, NewsCategory::General);

        let gold: NewsCategory = serde_json::from_str("\"Gold\"").unwrap();
        assert_eq!(gold, NewsCategory::Gold);
        assert_eq!(serde_json::to_string(&gold).unwrap(), "\"Gold\"");
    }

    #[test]
    fn test_analysis_clamping() {
        let mut analysis = MarketAnalysis::neutral();
        analysis.bullish_prob = 140.0;
        analysis.bearish_prob = f64::NAN;
        analysis.clamp_probabilities();
        assert_eq!(analysis.bullish_prob, 100.0);
        assert_eq!(analysis.bearish_prob, 50.0);
    }

    #[test]
    fn test_analysis_wire_format() {
        let analysis: MarketAnalysis = serde_json::from_str(
            r#"{"bullishProb":62,"bearishProb":38,"trend":"UP",
                "signals":{"rsi":"58","macd":"Bullish cross","movingAverage":"Above 50 EMA","volatility":"STABLE / LOW"},
                "summary":"Buyers in control"}"#,
        )
        .unwrap();
        assert_eq!(analysis.trend, Trend::Up);
        assert_eq!(analysis.signals.moving_average, "Above 50 EMA");
        assert!(analysis.sources.is_empty());
    }
}
