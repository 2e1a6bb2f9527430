// ===============================
// src/okx.rs
// ===============================
use serde::Deserialize;

use crate::domain::{now_ms, Pair, Quote, Venue};
use crate::feed::{endpoint, get_json, parse_px, FeedError};

/// OKX v5 wraps everything in `{code, msg, data: [...]}`; code "0" = ok.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<Vec<T>, FeedError> {
        if self.code != "0" {
            return Err(FeedError::Api { venue: Venue::Okx, code: self.code, msg: self.msg });
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub inst_id: String,
    pub ask_px: String,
    pub bid_px: String,
    #[serde(default)]
    pub last: Option<String>,
}

impl Ticker {
    pub fn into_quote(self, pair: &Pair, ts_ms: i64) -> Result<Quote, FeedError> {
        let v = Venue::Okx;
        if self.inst_id != pair.okx_inst_id() {
            return Err(FeedError::Decode { venue: v, msg: format!("ticker for `{}`, asked `{}`", self.inst_id, pair.okx_inst_id()) });
        }
        let ask = parse_px(v, pair, &self.ask_px)?;
        let bid = parse_px(v, pair, &self.bid_px)?;
        let last = self.last.as_deref().and_then(|s| s.parse::<f64>().ok()).filter(|x| *x > 0.0);
        Ok(Quote::new(v, pair.clone(), ask, bid, last, ts_ms)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub base_ccy: String,
    pub quote_ccy: String,
    pub state: String, // live, suspend, preopen, test
}

pub fn spot_pairs(instruments: &[Instrument], quote_ccy: &str) -> Vec<Pair> {
    instruments
        .iter()
        .filter(|i| i.state == "live" && i.quote_ccy.eq_ignore_ascii_case(quote_ccy))
        .map(|i| Pair::new(&i.base_ccy, &i.quote_ccy))
        .collect()
}

pub async fn fetch_quote(http: &reqwest::Client, base: &str, pair: &Pair) -> Result<Quote, FeedError> {
    let inst_id = pair.okx_inst_id();
    let url = endpoint(base, "/api/v5/market/ticker", &[("instId", inst_id.as_str())])?;
    let env: Envelope<Ticker> = get_json(http, Venue::Okx, url).await?;
    match env.into_data()?.into_iter().next() {
        Some(t) => t.into_quote(pair, now_ms()),
        None => Err(FeedError::EmptyBook { venue: Venue::Okx, pair: pair.to_string() }),
    }
}

pub async fn fetch_spot_pairs(http: &reqwest::Client, base: &str, quote_ccy: &str) -> Result<Vec<Pair>, FeedError> {
    let url = endpoint(base, "/api/v5/public/instruments", &[("instType", "SPOT")])?;
    let env: Envelope<Instrument> = get_json(http, Venue::Okx, url).await?;
    Ok(spot_pairs(&env.into_data()?, quote_ccy))
}
