// ===============================
// src/markets.rs
// ===============================
//
// Pairs listed on both venues for one quote currency (e.g. all */USDT).
//
use ahash::AHashSet as HashSet;

use crate::domain::Pair;
use crate::feed::FeedError;
use crate::{binance, okx};

pub fn intersect_pairs(a: &[Pair], b: &[Pair]) -> Vec<Pair> {
    let b: HashSet<&Pair> = b.iter().collect();
    let mut out: Vec<Pair> = a.iter().filter(|p| b.contains(p)).cloned().collect();
    out.sort();
    out.dedup();
    out
}

pub async fn common_pairs(
    http: &reqwest::Client,
    binance_base: &str,
    okx_base: &str,
    quote_ccy: &str,
) -> Result<Vec<Pair>, FeedError> {
    let (bin, okx) = tokio::try_join!(
        binance::fetch_spot_pairs(http, binance_base, quote_ccy),
        okx::fetch_spot_pairs(http, okx_base, quote_ccy),
    )?;
    tracing::info!(binance = bin.len(), okx = okx.len(), quote = %quote_ccy, "spot pairs loaded");
    Ok(intersect_pairs(&bin, &okx))
}
