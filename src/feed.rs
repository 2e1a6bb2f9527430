// ===============================
// src/feed.rs
// ===============================
//
// Quote sources (best bid/ask per venue per pair):
// - RestQuoteSource : Binance 24h ticker + OKX market ticker over REST
// - MockQuoteSource : anchored price + per-venue bias + random jitter
//
// Any FeedError means "quote unavailable" for that tick. Callers must skip
// the tick; there is no cache of previous quotes here on purpose.
//
use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::domain::{now_ms, Pair, Quote, QuoteError, Venue};
use crate::metrics::QUOTE_POLLS;
use crate::{binance, okx};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("{venue}: request failed: {source}")]
    Http { venue: Venue, source: reqwest::Error },
    #[error("{venue}: HTTP {status}: {body}")]
    Status { venue: Venue, status: u16, body: String },
    #[error("{venue}: api error {code}: {msg}")]
    Api { venue: Venue, code: String, msg: String },
    #[error("{venue}: decode error: {msg}")]
    Decode { venue: Venue, msg: String },
    #[error("{venue}: empty book for {pair}")]
    EmptyBook { venue: Venue, pair: String },
    #[error(transparent)]
    InvalidQuote(#[from] QuoteError),
    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn quote(&self, venue: Venue, pair: &Pair) -> Result<Quote, FeedError>;
}

/// Fetch both venues concurrently; succeeds only if both do.
pub async fn fetch_snapshot(
    src: &dyn QuoteSource,
    venue_a: Venue,
    venue_b: Venue,
    pair: &Pair,
) -> Result<(Quote, Quote), FeedError> {
    let (ra, rb) = tokio::join!(src.quote(venue_a, pair), src.quote(venue_b, pair));
    for (venue, ok) in [(venue_a, ra.is_ok()), (venue_b, rb.is_ok())] {
        let outcome = if ok { "ok" } else { "unavailable" };
        QUOTE_POLLS.with_label_values(&[venue.label(), outcome]).inc();
    }
    Ok((ra?, rb?))
}

// ---- shared REST helpers (used by binance.rs / okx.rs) ----

/// `base` may carry a path prefix (e.g. a proxy mount); `path` is appended to it.
pub(crate) fn endpoint(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, FeedError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    let mut url = base.join(path.trim_start_matches('/'))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    venue: Venue,
    url: Url,
) -> Result<T, FeedError> {
    let rsp = http.get(url).send().await.map_err(|source| FeedError::Http { venue, source })?;
    let status = rsp.status();
    let body = rsp.text().await.map_err(|source| FeedError::Http { venue, source })?;
    if !status.is_success() {
        return Err(FeedError::Status { venue, status: status.as_u16(), body });
    }
    serde_json::from_str(&body).map_err(|e| FeedError::Decode { venue, msg: e.to_string() })
}

/// Exchange prices arrive as decimal strings; "" or "0" means no liquidity on that side.
pub(crate) fn parse_px(venue: Venue, pair: &Pair, raw: &str) -> Result<f64, FeedError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FeedError::EmptyBook { venue, pair: pair.to_string() });
    }
    let px: f64 = raw
        .parse()
        .map_err(|_| FeedError::Decode { venue, msg: format!("bad price `{raw}`") })?;
    if px == 0.0 {
        return Err(FeedError::EmptyBook { venue, pair: pair.to_string() });
    }
    Ok(px)
}

// ---- REST ----

pub struct RestQuoteSource {
    http: reqwest::Client,
    binance_base: String,
    okx_base: String,
}

impl RestQuoteSource {
    pub fn new(binance_base: String, okx_base: String, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, binance_base, okx_base })
    }
}

#[async_trait]
impl QuoteSource for RestQuoteSource {
    fn name(&self) -> &'static str { "rest" }

    async fn quote(&self, venue: Venue, pair: &Pair) -> Result<Quote, FeedError> {
        match venue {
            Venue::Binance => binance::fetch_quote(&self.http, &self.binance_base, pair).await,
            Venue::Okx => okx::fetch_quote(&self.http, &self.okx_base, pair).await,
        }
    }
}

// ---- Mock ----

/// Offline source: `anchor * (1 + venue_bias + jitter)`, half-spread of 2 bps.
pub struct MockQuoteSource {
    anchors: HashMap<Pair, f64>,
    default_anchor: f64,
    bias: HashMap<Venue, f64>,
    jitter: f64,
}

impl MockQuoteSource {
    pub fn new(default_anchor: f64, jitter: f64) -> Self {
        let mut bias = HashMap::new();
        bias.insert(Venue::Binance, -0.0004);
        bias.insert(Venue::Okx, 0.0004);
        Self { anchors: HashMap::new(), default_anchor, bias, jitter: jitter.abs() }
    }

    pub fn with_anchor(mut self, pair: Pair, px: f64) -> Self {
        self.anchors.insert(pair, px);
        self
    }
}

impl Default for MockQuoteSource {
    fn default() -> Self { Self::new(0.1, 0.001) }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &'static str { "mock" }

    async fn quote(&self, venue: Venue, pair: &Pair) -> Result<Quote, FeedError> {
        let anchor = self.anchors.get(pair).copied().unwrap_or(self.default_anchor);
        let bias = self.bias.get(&venue).copied().unwrap_or(0.0);
        // jangan simpan ThreadRng melewati .await
        let noise = if self.jitter > 0.0 { rand::thread_rng().gen_range(-self.jitter..=self.jitter) } else { 0.0 };
        let mid = anchor * (1.0 + bias + noise);
        let half = mid * 0.0002;
        Ok(Quote::new(venue, pair.clone(), mid + half, mid - half, Some(mid), now_ms())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_builds_query() {
        let u = endpoint("https://api.binance.com", "/api/v3/ticker/24hr", &[("symbol", "DOGEUSDT")]).unwrap();
        assert_eq!(u.as_str(), "https://api.binance.com/api/v3/ticker/24hr?symbol=DOGEUSDT");
        assert!(endpoint("not a url", "/x", &[]).is_err());
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let want = "https://gw.example.com/okx/api/v5/market/ticker?instId=DOGE-USDT";
        for base in ["https://gw.example.com/okx", "https://gw.example.com/okx/"] {
            let u = endpoint(base, "/api/v5/market/ticker", &[("instId", "DOGE-USDT")]).unwrap();
            assert_eq!(u.as_str(), want);
        }
        let u = endpoint("https://www.okx.com/", "api/v5/public/instruments", &[]).unwrap();
        assert_eq!(u.as_str(), "https://www.okx.com/api/v5/public/instruments");
    }

    #[test]
    fn parse_px_maps_empty_side() {
        let p = Pair::new("DOGE", "USDT");
        assert_eq!(parse_px(Venue::Okx, &p, "0.1234").unwrap(), 0.1234);
        assert!(matches!(parse_px(Venue::Okx, &p, ""), Err(FeedError::EmptyBook { .. })));
        assert!(matches!(parse_px(Venue::Binance, &p, "0.00000000"), Err(FeedError::EmptyBook { .. })));
        assert!(matches!(parse_px(Venue::Binance, &p, "abc"), Err(FeedError::Decode { .. })));
    }

    #[tokio::test]
    async fn mock_source_biases_venues() {
        let pair = Pair::new("BTC", "USDT");
        let src = MockQuoteSource::new(0.1, 0.0).with_anchor(pair.clone(), 60_000.0);
        let (a, b) = fetch_snapshot(&src, Venue::Binance, Venue::Okx, &pair).await.unwrap();
        assert_eq!(a.venue, Venue::Binance);
        assert_eq!(b.venue, Venue::Okx);
        assert!(a.ask > a.bid && b.ask > b.bid);
        assert!(a.last.unwrap() < b.last.unwrap());
        assert!((a.last.unwrap() - 60_000.0 * 0.9996).abs() < 1e-6);
    }

    struct Flaky;

    #[async_trait]
    impl QuoteSource for Flaky {
        fn name(&self) -> &'static str { "flaky" }
        async fn quote(&self, venue: Venue, pair: &Pair) -> Result<Quote, FeedError> {
            match venue {
                Venue::Binance => Ok(Quote::new(venue, pair.clone(), 1.0, 1.0, None, 0)?),
                Venue::Okx => Err(FeedError::EmptyBook { venue, pair: pair.to_string() }),
            }
        }
    }

    #[tokio::test]
    async fn snapshot_fails_if_either_venue_fails() {
        let pair = Pair::new("DOGE", "USDT");
        let err = fetch_snapshot(&Flaky, Venue::Binance, Venue::Okx, &pair).await.unwrap_err();
        assert!(matches!(err, FeedError::EmptyBook { venue: Venue::Okx, .. }));
    }
}
