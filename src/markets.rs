//! Asset catalog and trading-session clock
//!
//! Static reference data the dashboard renders next to the charts.

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

/// Asset class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetType {
    Forex,
    Crypto,
    Commodities,
}

/// A tradable asset and the chart symbol it is shown under
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Asset {
    pub id: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub icon: &'static str,
}

/// Premium assets offered on the dashboard
pub const ASSETS: &[Asset] = &[
    Asset { id: "eurusd", name: "EUR/USD", symbol: "FX:EURUSD", asset_type: AssetType::Forex, icon: "🇪🇺" },
    Asset { id: "gbpusd", name: "GBP/USD", symbol: "FX:GBPUSD", asset_type: AssetType::Forex, icon: "🇬🇧" },
    Asset { id: "usdjpy", name: "USD/JPY", symbol: "FX:USDJPY", asset_type: AssetType::Forex, icon: "🇯🇵" },
    Asset { id: "btcusd", name: "BTC/USD", symbol: "BINANCE:BTCUSDT", asset_type: AssetType::Crypto, icon: "₿" },
    Asset { id: "ethusd", name: "ETH/USD", symbol: "BINANCE:ETHUSDT", asset_type: AssetType::Crypto, icon: "Ξ" },
    Asset { id: "solusd", name: "SOL/USD", symbol: "BINANCE:SOLUSDT", asset_type: AssetType::Crypto, icon: "☀️" },
    Asset { id: "xauusd", name: "Gold (XAU/USD)", symbol: "OANDA:XAUUSD", asset_type: AssetType::Commodities, icon: "🟡" },
];

/// Look up an asset by id or chart symbol (case-insensitive)
pub fn find_asset(key: &str) -> Option<&'static Asset> {
    let key = key.trim();
    ASSETS
        .iter()
        .find(|a| a.id.eq_ignore_ascii_case(key) || a.symbol.eq_ignore_ascii_case(key))
}

/// A trading session in UTC hours, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSession {
    pub name: &'static str,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl MarketSession {
    /// Whether the session is open at this UTC hour; handles overnight sessions
    pub fn is_open_at(&self, hour_utc: u32) -> bool {
        if self.start_hour < self.end_hour {
            hour_utc >= self.start_hour && hour_utc < self.end_hour
        } else {
            hour_utc >= self.start_hour || hour_utc < self.end_hour
        }
    }
}

pub const SESSIONS: &[MarketSession] = &[
    MarketSession { name: "Asia", start_hour: 0, end_hour: 9 },
    MarketSession { name: "London", start_hour: 8, end_hour: 17 },
    MarketSession { name: "New York", start_hour: 13, end_hour: 22 },
];

/// Session state at a moment in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    #[serde(flatten)]
    pub session: MarketSession,
    pub open: bool,
}

pub fn session_status(now: DateTime<Utc>) -> Vec<SessionStatus> {
    let hour = now.hour();
    SESSIONS
        .iter()
        .map(|session| SessionStatus {
            session: *session,
            open: session.is_open_at(hour),
        })
        .collect()
}
