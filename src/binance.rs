// ===============================
// src/binance.rs
// ===============================
use serde::Deserialize;

use crate::domain::{now_ms, Pair, Quote, Venue};
use crate::feed::{endpoint, get_json, parse_px, FeedError};

// ---- Minimal public REST models ----

/// `GET /api/v3/ticker/24hr?symbol=...` (only the fields we need)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub bid_price: String,
    pub ask_price: String,
    #[serde(default)]
    pub last_price: Option<String>,
}

impl Ticker24h {
    pub fn into_quote(self, pair: &Pair, ts_ms: i64) -> Result<Quote, FeedError> {
        let v = Venue::Binance;
        if self.symbol != pair.binance_symbol() {
            return Err(FeedError::Decode { venue: v, msg: format!("ticker for `{}`, asked `{}`", self.symbol, pair.binance_symbol()) });
        }
        let bid = parse_px(v, pair, &self.bid_price)?;
        let ask = parse_px(v, pair, &self.ask_price)?;
        let last = self.last_price.as_deref().and_then(|s| s.parse::<f64>().ok()).filter(|x| *x > 0.0);
        Ok(Quote::new(v, pair.clone(), ask, bid, last, ts_ms)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub status: String,       // TRADING, BREAK, ...
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub is_spot_trading_allowed: bool,
}

pub fn spot_pairs(info: &ExchangeInfo, quote_ccy: &str) -> Vec<Pair> {
    info.symbols
        .iter()
        .filter(|s| s.status == "TRADING" && s.is_spot_trading_allowed)
        .filter(|s| s.quote_asset.eq_ignore_ascii_case(quote_ccy))
        .map(|s| Pair::new(&s.base_asset, &s.quote_asset))
        .collect()
}

pub async fn fetch_quote(http: &reqwest::Client, base: &str, pair: &Pair) -> Result<Quote, FeedError> {
    let symbol = pair.binance_symbol();
    let url = endpoint(base, "/api/v3/ticker/24hr", &[("symbol", symbol.as_str())])?;
    let t: Ticker24h = get_json(http, Venue::Binance, url).await?;
    t.into_quote(pair, now_ms())
}

pub async fn fetch_spot_pairs(http: &reqwest::Client, base: &str, quote_ccy: &str) -> Result<Vec<Pair>, FeedError> {
    let url = endpoint(base, "/api/v3/exchangeInfo", &[])?;
    let info: ExchangeInfo = get_json(http, Venue::Binance, url).await?;
    Ok(spot_pairs(&info, quote_ccy))
}
