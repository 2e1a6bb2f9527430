// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : spread_watch: two-venue crypto arbitrage monitor in Rust
Module  : config.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
License : MIT (see LICENSE)

Summary : Polls best bid/ask on two exchanges (mock/Binance/OKX), evaluates
          buy -> withdraw -> sell in both directions net of taker and
          withdrawal fees, raises threshold alerts, exposes Prometheus
          metrics, and records JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use dotenvy::dotenv;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{FeeError, FeeSchedule, Pair, Venue};

/// Quote source mode
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuoteMode {
    Mock,
    Live,
}

impl QuoteMode {
    pub fn label(&self) -> &'static str {
        match self { QuoteMode::Mock => "mock", QuoteMode::Live => "live" }
    }
}

impl FromStr for QuoteMode {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(QuoteMode::Mock),
            "live" | "rest" => Ok(QuoteMode::Live),
            other => Err(ConfigError::Invalid { key: "QUOTE_MODE", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: `{value}`")]
    Invalid { key: &'static str, value: String },
    #[error("VENUE_A and VENUE_B must differ (both {0})")]
    SameVenue(Venue),
    #[error("no symbols configured")]
    NoSymbols,
    #[error(transparent)]
    Fees(#[from] FeeError),
}

#[derive(Clone, Debug)]
pub struct DemoCfg {
    pub venue: Venue,
    pub factor: f64,
}

#[derive(Clone, Debug)]
pub struct Args {
    pub symbols: Vec<Pair>,
    pub venue_a: Venue,
    pub venue_b: Venue,
    pub quote_mode: QuoteMode,

    // evaluation
    pub fees: FeeSchedule,
    pub input_amount: f64,
    pub alert_threshold_pct: f64,
    pub demo: Option<DemoCfg>,

    // cadence
    pub poll_interval: Duration,
    pub history_len: usize,
    pub http_timeout: Duration,

    // endpoints
    pub binance_rest_url: String,
    pub okx_rest_url: String,

    // files / metrics / alerts
    pub record_file: Option<String>,
    pub metrics_port: u16,
    pub alert_webhook_url: Option<String>,
}

/// Lookup for config keys; `std::env::var` in production, a map in tests.
pub trait Source {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct Env;

impl Source for Env {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

fn parse_or<T: FromStr>(src: &dyn Source, key: &'static str, default: T) -> Result<T, ConfigError> {
    match src.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_bool(src: &dyn Source, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match src.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: v }),
        },
    }
}

/// SYMBOLS=DOGE/USDT,BTC/USDT
pub fn parse_symbols(raw: &str) -> Result<Vec<Pair>, ConfigError> {
    let mut out: Vec<Pair> = Vec::new();
    for tok in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let pair: Pair = tok
            .parse()
            .map_err(|_| ConfigError::Invalid { key: "SYMBOLS", value: tok.to_string() })?;
        if !out.contains(&pair) {
            out.push(pair);
        }
    }
    if out.is_empty() {
        return Err(ConfigError::NoSymbols);
    }
    Ok(out)
}

pub fn load() -> Result<Args, ConfigError> {
    // .env first so RECORD_FILE, SYMBOLS, ... are visible
    let _ = dotenv();
    load_from(&Env)
}

pub fn load_from(src: &dyn Source) -> Result<Args, ConfigError> {
    // ===== Pairs & venues =====
    let symbols = parse_symbols(&src.get("SYMBOLS").unwrap_or_else(|| "DOGE/USDT".to_string()))?;
    let venue_a: Venue = parse_or(src, "VENUE_A", Venue::Binance)?;
    let venue_b: Venue = parse_or(src, "VENUE_B", Venue::Okx)?;
    if venue_a == venue_b {
        return Err(ConfigError::SameVenue(venue_a));
    }
    let quote_mode: QuoteMode = parse_or(src, "QUOTE_MODE", QuoteMode::Mock)?;

    // ===== Evaluation =====
    let defaults = FeeSchedule::default();
    let fees = FeeSchedule::new(
        parse_or(src, "TAKER_FEE_RATE", defaults.taker_fee_rate)?,
        parse_or(src, "WITHDRAWAL_FEE", defaults.withdrawal_fee_quote)?,
    )?;
    let input_amount: f64 = parse_or(src, "INPUT_AMOUNT", 1000.0)?;
    if !(input_amount.is_finite() && input_amount > 0.0) {
        return Err(ConfigError::Invalid { key: "INPUT_AMOUNT", value: input_amount.to_string() });
    }
    let alert_threshold_pct: f64 = parse_or(src, "ALERT_THRESHOLD_PCT", 0.5)?;
    if !alert_threshold_pct.is_finite() {
        return Err(ConfigError::Invalid { key: "ALERT_THRESHOLD_PCT", value: alert_threshold_pct.to_string() });
    }

    // ===== Demo =====
    let demo = if parse_bool(src, "DEMO_MODE", false)? {
        let venue: Venue = parse_or(src, "DEMO_VENUE", venue_a)?;
        let factor: f64 = parse_or(src, "DEMO_FACTOR", 0.93)?;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(ConfigError::Invalid { key: "DEMO_FACTOR", value: factor.to_string() });
        }
        Some(DemoCfg { venue, factor })
    } else {
        None
    };

    // ===== Cadence =====
    let poll_ms: u64 = parse_or(src, "POLL_INTERVAL_MS", 5_000)?;
    if poll_ms == 0 {
        return Err(ConfigError::Invalid { key: "POLL_INTERVAL_MS", value: "0".into() });
    }
    let history_len: usize = parse_or(src, "HISTORY_LEN", 120)?;
    if history_len == 0 {
        return Err(ConfigError::Invalid { key: "HISTORY_LEN", value: "0".into() });
    }
    let http_timeout_ms: u64 = parse_or(src, "HTTP_TIMEOUT_MS", 4_000)?;

    Ok(Args {
        symbols,
        venue_a,
        venue_b,
        quote_mode,
        fees,
        input_amount,
        alert_threshold_pct,
        demo,
        poll_interval: Duration::from_millis(poll_ms),
        history_len,
        http_timeout: Duration::from_millis(http_timeout_ms),
        binance_rest_url: src.get("BINANCE_REST_URL").unwrap_or_else(|| "https://api.binance.com".to_string()),
        okx_rest_url: src.get("OKX_REST_URL").unwrap_or_else(|| "https://www.okx.com".to_string()),
        record_file: src.get("RECORD_FILE"),
        metrics_port: parse_or(src, "METRICS_PORT", 9898)?,
        alert_webhook_url: src.get("ALERT_WEBHOOK_URL"),
    })
}
