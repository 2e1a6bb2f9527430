// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue { Binance, Okx }

impl Venue {
    pub fn label(&self) -> &'static str {
        match self { Venue::Binance => "binance", Venue::Okx => "okx" }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Venue::Binance => f.write_str("Binance"), Venue::Okx => f.write_str("OKX") }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unknown venue `{0}`")]
    Venue(String),
    #[error("bad pair `{0}` (expected BASE/QUOTE)")]
    Pair(String),
}

impl FromStr for Venue {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Venue::Binance),
            "okx" | "okex" => Ok(Venue::Okx),
            other => Err(ParseError::Venue(other.to_string())),
        }
    }
}

/// Trading pair, canonical form `BASE/QUOTE` (uppercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair { pub base: String, pub quote: String }

impl Pair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self { base: base.trim().to_ascii_uppercase(), quote: quote.trim().to_ascii_uppercase() }
    }
    /// Binance symbol, e.g. `DOGEUSDT`
    pub fn binance_symbol(&self) -> String { format!("{}{}", self.base, self.quote) }
    /// OKX instId, e.g. `DOGE-USDT`
    pub fn okx_inst_id(&self) -> String { format!("{}-{}", self.base, self.quote) }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(|c| c == '/' || c == '-' || c == '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(b), Some(q), None) if !b.trim().is_empty() && !q.trim().is_empty() => Ok(Pair::new(b, q)),
            _ => Err(ParseError::Pair(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum QuoteError {
    #[error("{venue} {pair}: {field} must be positive and finite, got {value}")]
    NonPositive { venue: Venue, pair: String, field: &'static str, value: f64 },
}

/// Best bid/ask snapshot from one venue. Superseded, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub venue: Venue,
    pub pair: Pair,
    pub ask: f64,
    pub bid: f64,
    pub last: Option<f64>,
    pub ts_ms: i64,
    /// true once a demo adjuster touched the prices
    pub synthetic: bool,
}

impl Quote {
    pub fn new(venue: Venue, pair: Pair, ask: f64, bid: f64, last: Option<f64>, ts_ms: i64) -> Result<Self, QuoteError> {
        for (field, value) in [("ask", ask), ("bid", bid)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(QuoteError::NonPositive { venue, pair: pair.to_string(), field, value });
            }
        }
        Ok(Self { venue, pair, ask, bid, last, ts_ms, synthetic: false })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FeeError {
    #[error("taker fee rate must be in [0, 1), got {0}")]
    TakerRate(f64),
    #[error("withdrawal fee must be non-negative, got {0}")]
    Withdrawal(f64),
}

/// Trading friction: taker fee on both legs plus one fixed withdrawal cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFees")]
pub struct FeeSchedule {
    pub taker_fee_rate: f64,
    /// in quote currency (e.g. USDT)
    pub withdrawal_fee_quote: f64,
}

impl FeeSchedule {
    pub fn new(taker_fee_rate: f64, withdrawal_fee_quote: f64) -> Result<Self, FeeError> {
        let fees = Self { taker_fee_rate, withdrawal_fee_quote };
        fees.validate()?;
        Ok(fees)
    }

    /// Fields are public, so anything built by hand is re-checked here.
    pub fn validate(&self) -> Result<(), FeeError> {
        if !(self.taker_fee_rate.is_finite() && (0.0..1.0).contains(&self.taker_fee_rate)) {
            return Err(FeeError::TakerRate(self.taker_fee_rate));
        }
        if !(self.withdrawal_fee_quote.is_finite() && self.withdrawal_fee_quote >= 0.0) {
            return Err(FeeError::Withdrawal(self.withdrawal_fee_quote));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawFees {
    taker_fee_rate: f64,
    withdrawal_fee_quote: f64,
}

impl TryFrom<RawFees> for FeeSchedule {
    type Error = FeeError;
    fn try_from(raw: RawFees) -> Result<Self, Self::Error> {
        FeeSchedule::new(raw.taker_fee_rate, raw.withdrawal_fee_quote)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self { Self { taker_fee_rate: 0.001, withdrawal_fee_quote: 1.0 } }
}

/// Buy on `source`, transfer, sell on `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction { pub source: Venue, pub destination: Venue }

impl Direction {
    pub fn new(source: Venue, destination: Venue) -> Self { Self { source, destination } }
    pub fn reversed(&self) -> Self { Self { source: self.destination, destination: self.source } }
    pub fn label(&self) -> String { format!("{}_to_{}", self.source.label(), self.destination.label()) }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageResult {
    pub direction: Direction,
    pub buy_price: f64,
    pub sell_price: f64,
    pub input_amount: f64,
    pub coin_acquired: f64,
    pub withdrawal_fee_coin: f64,
    pub coin_after_withdrawal_fee: f64,
    pub proceeds: f64,
    pub net_profit: f64,
    pub return_pct: f64,
    pub infeasible: bool,
    // cost breakdown (both legs' taker fees, approx. in quote ccy)
    pub trading_fee_estimate: f64,
    pub withdrawal_fee_quote: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode { Live, Demo }

impl EvalMode {
    pub fn label(&self) -> &'static str {
        match self { EvalMode::Live => "live", EvalMode::Demo => "demo" }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEvaluation {
    pub pair: Pair,
    pub mode: EvalMode,
    pub a_to_b: ArbitrageResult,
    pub b_to_a: ArbitrageResult,
    pub threshold_pct: f64,
    /// Directions with return_pct >= threshold_pct on this tick only.
    pub flagged: Vec<Direction>,
    pub ts_ms: i64,
}

impl PairEvaluation {
    pub fn result_for(&self, d: Direction) -> Option<&ArbitrageResult> {
        [&self.a_to_b, &self.b_to_a].into_iter().find(|r| r.direction == d)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Evaluation(PairEvaluation),
    Alert { pair: Pair, mode: EvalMode, result: ArbitrageResult, ts_ms: i64 },
    Unavailable { pair: Pair, reason: String, ts_ms: i64 },
    Note(String),
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_schedule_deserialize_is_validated() {
        let ok: FeeSchedule = serde_json::from_str(r#"{"taker_fee_rate":0.001,"withdrawal_fee_quote":1.0}"#).unwrap();
        assert_eq!(ok, FeeSchedule::default());
        assert!(serde_json::from_str::<FeeSchedule>(r#"{"taker_fee_rate":1.5,"withdrawal_fee_quote":1.0}"#).is_err());
        assert!(serde_json::from_str::<FeeSchedule>(r#"{"taker_fee_rate":0.001,"withdrawal_fee_quote":-5}"#).is_err());
        let hand_built = FeeSchedule { taker_fee_rate: f64::NAN, withdrawal_fee_quote: 1.0 };
        assert!(matches!(hand_built.validate(), Err(FeeError::TakerRate(_))));
    }

    #[test]
    fn pair_parses_common_separators() {
        let want = Pair::new("DOGE", "USDT");
        assert_eq!("doge/usdt".parse::<Pair>().unwrap(), want);
        assert_eq!("DOGE-USDT".parse::<Pair>().unwrap(), want);
        assert_eq!(" DOGE_USDT ".parse::<Pair>().unwrap(), want);
        assert!("DOGEUSDT".parse::<Pair>().is_err());
        assert!("A/B/C".parse::<Pair>().is_err());
        assert!("/USDT".parse::<Pair>().is_err());
    }

    #[test]
    fn pair_venue_symbols() {
        let p = Pair::new("btc", "usdt");
        assert_eq!(p.to_string(), "BTC/USDT");
        assert_eq!(p.binance_symbol(), "BTCUSDT");
        assert_eq!(p.okx_inst_id(), "BTC-USDT");
    }

    #[test]
    fn venue_parse_and_display() {
        assert_eq!("OKX".parse::<Venue>().unwrap(), Venue::Okx);
        assert_eq!("binance".parse::<Venue>().unwrap(), Venue::Binance);
        assert!("kraken".parse::<Venue>().is_err());
        assert_eq!(Direction::new(Venue::Binance, Venue::Okx).to_string(), "Binance -> OKX");
        assert_eq!(Direction::new(Venue::Okx, Venue::Binance).label(), "okx_to_binance");
    }

    #[test]
    fn quote_rejects_non_positive_prices() {
        let p = Pair::new("DOGE", "USDT");
        assert!(Quote::new(Venue::Okx, p.clone(), 0.0, 1.0, None, 0).is_err());
        assert!(Quote::new(Venue::Okx, p.clone(), 1.0, -1.0, None, 0).is_err());
        assert!(Quote::new(Venue::Okx, p.clone(), f64::NAN, 1.0, None, 0).is_err());
        // crossed book on one venue is allowed
        let q = Quote::new(Venue::Okx, p, 1.0, 1.1, Some(1.05), 7).unwrap();
        assert!(!q.synthetic);
    }

    #[test]
    fn fee_schedule_bounds() {
        assert!(FeeSchedule::new(0.0, 0.0).is_ok());
        assert_eq!(FeeSchedule::new(1.0, 0.0), Err(FeeError::TakerRate(1.0)));
        assert_eq!(FeeSchedule::new(-0.1, 0.0), Err(FeeError::TakerRate(-0.1)));
        assert_eq!(FeeSchedule::new(0.001, -1.0), Err(FeeError::Withdrawal(-1.0)));
    }
}
