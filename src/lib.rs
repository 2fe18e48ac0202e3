//! AXQ Portal Worker - trading dashboard backend for Cloudflare Workers
//!
//! Serves the account gating flow, the admin console and the AI market
//! endpoints of the AXQ dashboard as a JSON API.
//!
//! # Architecture
//! - Main entry point routes HTTP requests
//! - KV storage for accounts, sessions and the activation license
//! - Gemini API client for analysis, news and chat
//!
//! # Features
//! - Register/login, status reconciliation, license activation, logout
//! - Admin approval, deletion, license rotation, account search
//! - AI analysis/news/chat with fixed fallbacks on failure

#![allow(clippy::doc_markdown)] // Doc style flexibility
#![allow(clippy::needless_pass_by_value)] // Worker framework patterns
#![allow(clippy::map_unwrap_or)] // Explicit error handling preference

mod accounts;
mod admin;
mod config;
mod credentials;
mod error;
mod gemini;
mod license;
mod markets;
mod portal;
mod prompts;
mod session;
mod storage;
mod types;

use worker::{
    Context, Env, Headers, Method, Request, Response, RouteContext, Router, console_debug,
    console_error, console_log, console_warn, event,
};

pub use accounts::{AccountTable, normalize_email};
pub use admin::AdminConsole;
pub use config::Config;
pub use error::{PortalError, Result};
pub use gemini::GeminiClient;
pub use license::LicenseStore;
pub use markets::{ASSETS, Asset, AssetType, MarketSession, SESSIONS, SessionStatus};
pub use portal::{Activation, Login, Portal, PortalSettings, StatusCheck};
pub use prompts::NewsQuery;
pub use session::SessionStore;
pub use storage::{KeyValueStore, KvBackend, MemoryStore};
pub use types::*;

/// Result type alias for worker operations
type WResult<T> = std::result::Result<T, worker::Error>;

type Ctx = RouteContext<()>;

/// Main Worker entry point
#[event(fetch)]
async fn fetch(req: Request, env: Env, _ctx: Context) -> WResult<Response> {
    console_error_panic_hook::set_once();

    if req.method() == Method::Options {
        return with_cors(Response::empty()?.with_status(204));
    }

    let router = Router::new();

    let response = router
        // Health check
        .get_async("/health", |_req, ctx| async move {
            let config = match Config::from_env(&ctx.env) {
                Ok(c) => c,
                Err(e) => return Response::error(format!("Config error: {e}"), 500),
            };

            Response::from_json(&serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "environment": config.environment,
                "ai_configured": config.gemini_api_key.is_some(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }))
        })
        // Client settings
        .get_async("/api/config", |_req, ctx| async move {
            respond(client_config(&ctx).await)
        })
        .get("/api/assets", |_req, _ctx| Response::from_json(&ASSETS))
        .get("/api/sessions", |_req, _ctx| {
            Response::from_json(&markets::session_status(chrono::Utc::now()))
        })
        // Account lifecycle
        .post_async("/api/register", |req, ctx| async move {
            respond(register(req, &ctx).await)
        })
        .get_async("/api/status", |req, ctx| async move {
            respond(check_status(req, &ctx).await)
        })
        .post_async("/api/activate", |req, ctx| async move {
            respond(activate(req, &ctx).await)
        })
        .post_async("/api/logout", |req, ctx| async move {
            respond(logout(req, &ctx).await)
        })
        // AI market endpoints
        .get_async("/api/analysis/:symbol", |req, ctx| async move {
            respond(analysis(req, &ctx).await)
        })
        .get_async("/api/news", |req, ctx| async move {
            respond(news(req, &ctx).await)
        })
        .get_async("/api/overview/:symbol", |req, ctx| async move {
            respond(overview(req, &ctx).await)
        })
        .post_async("/api/chat", |req, ctx| async move {
            respond(chat(req, &ctx).await)
        })
        // Admin console
        .get_async("/api/admin/accounts", |req, ctx| async move {
            respond(admin_list(req, &ctx).await)
        })
        .get_async("/api/admin/stats", |req, ctx| async move {
            respond(admin_stats(req, &ctx).await)
        })
        .post_async("/api/admin/accounts/:id/approve", |req, ctx| async move {
            respond(admin_approve(req, &ctx).await)
        })
        .delete_async("/api/admin/accounts/:id", |req, ctx| async move {
            respond(admin_delete(req, &ctx).await)
        })
        .get_async("/api/admin/license", |req, ctx| async move {
            respond(admin_license(req, &ctx).await)
        })
        .put_async("/api/admin/license", |req, ctx| async move {
            respond(admin_set_license(req, &ctx).await)
        })
        .run(req, env)
        .await?;

    with_cors(response)
}

// ============================================================================
// Plumbing
// ============================================================================

/// Status code and JSON body for a failed request
fn error_body(err: &PortalError) -> (u16, serde_json::Value) {
    (
        err.status_code(),
        serde_json::json!({
            "error": true,
            "message": err.to_string(),
        }),
    )
}

/// Turn a handler result into a response, errors as JSON bodies
fn respond(result: Result<Response>) -> WResult<Response> {
    match result {
        Ok(response) => Ok(response),
        Err(e) => {
            let (status, body) = error_body(&e);
            if status >= 500 {
                console_error!("Request failed: {}", e);
            }
            Ok(Response::from_json(&body)?.with_status(status))
        }
    }
}

fn with_cors(mut response: Response) -> WResult<Response> {
    let headers: &mut Headers = response.headers_mut();
    headers.set("Access-Control-Allow-Origin", "*")?;
    headers.set("Access-Control-Allow-Methods", "GET,POST,PUT,DELETE,OPTIONS")?;
    headers.set("Access-Control-Allow-Headers", "Authorization,Content-Type")?;
    Ok(response)
}

fn portal(ctx: &Ctx) -> Result<(Config, Portal<KvBackend>)> {
    let config = Config::from_env(&ctx.env)?;
    let portal = Portal::new(KvBackend::from_env(&ctx.env)?, PortalSettings::from(&config));
    Ok((config, portal))
}

/// `Authorization: Bearer <token>`, or `Unauthenticated`
fn bearer_token(req: &Request) -> Result<String> {
    parse_bearer(&req.headers().get("Authorization")?.unwrap_or_default())
}

fn parse_bearer(header: &str) -> Result<String> {
    let Some((scheme, token)) = header.trim().split_once(' ') else {
        return Err(PortalError::Unauthenticated);
    };
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(PortalError::Unauthenticated);
    }
    Ok(token.to_string())
}

async fn json_body<T: serde::de::DeserializeOwned>(req: &mut Request) -> Result<T> {
    req.json::<T>()
        .await
        .map_err(|e| PortalError::Validation(format!("invalid request body: {e}")))
}

fn query_param(req: &Request, name: &str) -> Result<Option<String>> {
    Ok(req
        .url()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned()))
}

fn route_param(ctx: &Ctx, name: &str) -> Result<String> {
    ctx.param(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PortalError::Validation(format!("missing {name}")))
}

fn session_body(account: &Account) -> Result<Response> {
    Ok(Response::from_json(&SessionResponse {
        token: None,
        account: account.profile(),
        view: account.status.view(),
    })?)
}

// ============================================================================
// Account lifecycle
// ============================================================================

async fn client_config(ctx: &Ctx) -> Result<Response> {
    let config = Config::from_env(&ctx.env)?;
    Ok(Response::from_json(&serde_json::json!({
        "statusPollSeconds": config.status_poll_seconds,
        "newsDefaultQuery": config.news_default_query,
        "assets": ASSETS,
        "sessions": SESSIONS,
        "greetings": {
            "support": Assistant::Support.greeting(None),
            "analyst": Assistant::Analyst.greeting(None),
        },
    }))?)
}

async fn register(mut req: Request, ctx: &Ctx) -> Result<Response> {
    let body: RegisterRequest = json_body(&mut req).await?;
    let (config, portal) = portal(ctx)?;

    let login = portal.register(&body.name, &body.email, &body.password).await?;
    console_log!(
        "Signed in {} ({})",
        login.account.email,
        login.account.status
    );
    if config.debug_enabled() {
        console_debug!("Account id {}", login.account.id);
    }
    Ok(Response::from_json(&login.response())?)
}

async fn check_status(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (_, portal) = portal(ctx)?;

    match portal.check_status(&token).await? {
        StatusCheck::SignedIn(account) => session_body(&account),
        StatusCheck::LoggedOut => Err(PortalError::Unauthenticated),
    }
}

async fn activate(mut req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let body: ActivateRequest = json_body(&mut req).await?;
    let (_, portal) = portal(ctx)?;

    let (activated, account) = match portal.activate_with_license(&token, &body.code).await? {
        Activation::Activated(account) => {
            console_log!("License activation for {}", account.email);
            (true, Some(account))
        }
        Activation::AlreadyActive(account) => (true, Some(account)),
        Activation::InvalidCode => (false, None),
    };

    Ok(Response::from_json(&serde_json::json!({
        "activated": activated,
        "message": if activated { "Account active" } else { "Invalid code" },
        "account": account.as_ref().map(Account::profile),
        "view": account.as_ref().map(|a| a.status.view()),
    }))?)
}

async fn logout(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (_, portal) = portal(ctx)?;
    portal.logout(&token).await?;
    Ok(Response::from_json(&serde_json::json!({ "loggedOut": true }))?)
}

// ============================================================================
// AI market endpoints
// ============================================================================

/// Analysis, or the neutral fallback on any failure
async fn analysis_or_neutral(config: &Config, symbol: &str) -> MarketAnalysis {
    let result = match GeminiClient::new(config) {
        Ok(client) => client.market_analysis(symbol).await,
        Err(e) => Err(e),
    };
    result.unwrap_or_else(|e| {
        console_warn!("Analysis for {} failed, using neutral fallback: {}", symbol, e);
        MarketAnalysis::neutral()
    })
}

/// News, or no articles on any failure
async fn news_or_empty(config: &Config, query: &str) -> Vec<NewsArticle> {
    let result = match GeminiClient::new(config) {
        Ok(client) => client.market_news(query, config.news_article_count).await,
        Err(e) => Err(e),
    };
    result.unwrap_or_else(|e| {
        console_warn!("News for '{}' failed: {}", query, e);
        vec![]
    })
}

/// Chart symbol for an asset id, or the input as given
fn chart_symbol(raw: &str) -> String {
    markets::find_asset(raw).map_or_else(|| raw.to_string(), |a| a.symbol.to_string())
}

async fn analysis(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (config, portal) = portal(ctx)?;
    portal.require_active(&token).await?;

    let symbol = chart_symbol(&route_param(ctx, "symbol")?);
    Ok(Response::from_json(&analysis_or_neutral(&config, &symbol).await)?)
}

async fn news(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (config, portal) = portal(ctx)?;
    let caller = portal.require_active(&token).await?;

    let query = query_param(&req, "q")?;
    let query = NewsQuery::parse(query.as_deref(), &config.admin_command, &config.news_default_query);
    match news_action(&caller, query)? {
        NewsAction::OpenAdmin => Ok(Response::from_json(&serde_json::json!({ "navigate": "admin" }))?),
        NewsAction::Search(query) => Ok(Response::from_json(&news_or_empty(&config, &query).await)?),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum NewsAction {
    OpenAdmin,
    Search(String),
}

/// The hidden command opens the admin view for admins and is `Forbidden`
/// for everyone else; it is never sent to the AI
fn news_action(caller: &Account, query: NewsQuery) -> Result<NewsAction> {
    match query {
        NewsQuery::AdminShortcut if caller.status == AccountStatus::Admin => Ok(NewsAction::OpenAdmin),
        NewsQuery::AdminShortcut => Err(PortalError::Forbidden("admin access required".into())),
        NewsQuery::Search(query) => Ok(NewsAction::Search(query)),
    }
}

async fn overview(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (config, portal) = portal(ctx)?;
    portal.require_active(&token).await?;

    let raw = route_param(ctx, "symbol")?;
    let symbol = chart_symbol(&raw);
    let topic = markets::find_asset(&raw).map_or(raw.as_str(), |a| a.name);

    let (analysis, news) = futures::join!(
        analysis_or_neutral(&config, &symbol),
        news_or_empty(&config, topic)
    );

    Ok(Response::from_json(&serde_json::json!({
        "symbol": symbol,
        "analysis": analysis,
        "news": news,
        "sessions": markets::session_status(chrono::Utc::now()),
    }))?)
}

async fn chat(mut req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (config, portal) = portal(ctx)?;
    portal.require_active(&token).await?;

    let body: ChatRequest = json_body(&mut req).await?;
    if body.message.trim().is_empty() {
        return Err(PortalError::Validation("message must not be empty".into()));
    }

    let symbol = body.symbol.as_deref();
    let result = match GeminiClient::new(&config) {
        Ok(client) => client.chat(body.assistant, symbol, &body.history, &body.message).await,
        Err(e) => Err(e),
    };
    let reply = result.unwrap_or_else(|e| {
        console_warn!("Chat ({:?}) failed: {}", body.assistant, e);
        body.assistant.fallback_reply().to_string()
    });

    Ok(Response::from_json(&ChatMessage {
        role: ChatRole::Model,
        text: reply,
    })?)
}

// ============================================================================
// Admin console
// ============================================================================

async fn admin_list(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (_, portal) = portal(ctx)?;
    let console = portal.admin(&token).await?;

    let search = query_param(&req, "search")?.unwrap_or_default();
    Ok(Response::from_json(&console.list_accounts(&search).await?)?)
}

async fn admin_stats(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (_, portal) = portal(ctx)?;
    let console = portal.admin(&token).await?;
    Ok(Response::from_json(&console.stats().await?)?)
}

async fn admin_approve(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let id = route_param(ctx, "id")?;
    let (_, portal) = portal(ctx)?;
    let console = portal.admin(&token).await?;

    let account = console.approve_account(&id).await?;
    console_log!("{} approved {}", console.caller().email, account.email);
    Ok(Response::from_json(&account.profile())?)
}

async fn admin_delete(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let id = route_param(ctx, "id")?;
    let (_, portal) = portal(ctx)?;
    let console = portal.admin(&token).await?;

    let removed = console.delete_account(&id).await?;
    console_log!("{} deleted {}", console.caller().email, removed.email);
    Ok(Response::from_json(&serde_json::json!({
        "deleted": removed.profile(),
    }))?)
}

async fn admin_license(req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let (_, portal) = portal(ctx)?;
    let console = portal.admin(&token).await?;
    Ok(Response::from_json(&serde_json::json!({
        "license": console.license().await?,
    }))?)
}

async fn admin_set_license(mut req: Request, ctx: &Ctx) -> Result<Response> {
    let token = bearer_token(&req)?;
    let body: LicenseRequest = json_body(&mut req).await?;
    let (_, portal) = portal(ctx)?;
    let console = portal.admin(&token).await?;

    let license = console.set_license(&body.value).await?;
    console_log!("{} rotated the activation license", console.caller().email);
    Ok(Response::from_json(&serde_json::json!({ "license": license }))?)
}
