// ===============================
// src/evaluator.rs
// ===============================
//
// Cross-venue arbitrage evaluator (pure, no I/O):
// - evaluate_direction : buy -> withdraw -> sell for one direction
// - evaluate_pair      : both directions for two venue quotes + threshold flags
//
// Fee order matters and is fixed:
//   1) taker fee on the acquired coin (buy leg)
//   2) fixed withdrawal fee, converted to coin at the destination sell price
//   3) taker fee on the proceeds (sell leg)
//
use thiserror::Error;

use crate::domain::{
    now_ms, ArbitrageResult, Direction, EvalMode, FeeError, FeeSchedule, PairEvaluation, Quote,
};

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("invalid input: {field} must be positive and finite, got {value}")]
    InvalidInput { field: &'static str, value: f64 },
    #[error("pair mismatch: {a} vs {b}")]
    PairMismatch { a: String, b: String },
    #[error(transparent)]
    InvalidFees(#[from] FeeError),
}

fn ensure_positive(field: &'static str, value: f64) -> Result<(), EvalError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EvalError::InvalidInput { field, value })
    }
}

pub fn evaluate_direction(
    direction: Direction,
    buy_price: f64,
    sell_price: f64,
    input_amount: f64,
    fees: &FeeSchedule,
) -> Result<ArbitrageResult, EvalError> {
    ensure_positive("buy_price", buy_price)?;
    ensure_positive("sell_price", sell_price)?;
    ensure_positive("input_amount", input_amount)?;
    fees.validate()?;

    let keep = 1.0 - fees.taker_fee_rate;
    let coin_acquired = (input_amount / buy_price) * keep;
    let withdrawal_fee_coin = fees.withdrawal_fee_quote / sell_price;
    let coin_after_withdrawal_fee = coin_acquired - withdrawal_fee_coin;

    let mut res = ArbitrageResult {
        direction,
        buy_price,
        sell_price,
        input_amount,
        coin_acquired,
        withdrawal_fee_coin,
        coin_after_withdrawal_fee,
        proceeds: 0.0,
        net_profit: -input_amount,
        return_pct: -100.0,
        infeasible: true,
        trading_fee_estimate: input_amount * fees.taker_fee_rate,
        withdrawal_fee_quote: fees.withdrawal_fee_quote,
    };

    // Position can't cover the withdrawal: modeled as a full write-off, no sell leg.
    if coin_after_withdrawal_fee <= 0.0 {
        return Ok(res);
    }

    let proceeds = (coin_after_withdrawal_fee * sell_price) * keep;
    let net_profit = proceeds - input_amount;
    res.proceeds = proceeds;
    res.net_profit = net_profit;
    res.return_pct = net_profit / input_amount * 100.0;
    res.infeasible = false;
    res.trading_fee_estimate = (input_amount + proceeds) * fees.taker_fee_rate;
    Ok(res)
}

/// A->B buys at `quote_a.ask` and sells at `quote_b.bid`; B->A is the mirror.
/// Flags are recomputed on every call, nothing carries over between ticks.
pub fn evaluate_pair(
    quote_a: &Quote,
    quote_b: &Quote,
    input_amount: f64,
    fees: &FeeSchedule,
    threshold_pct: f64,
) -> Result<PairEvaluation, EvalError> {
    if quote_a.pair != quote_b.pair {
        return Err(EvalError::PairMismatch { a: quote_a.pair.to_string(), b: quote_b.pair.to_string() });
    }

    let ab = Direction::new(quote_a.venue, quote_b.venue);
    let a_to_b = evaluate_direction(ab, quote_a.ask, quote_b.bid, input_amount, fees)?;
    let b_to_a = evaluate_direction(ab.reversed(), quote_b.ask, quote_a.bid, input_amount, fees)?;

    let flagged = [&a_to_b, &b_to_a]
        .into_iter()
        .filter(|r| r.return_pct >= threshold_pct)
        .map(|r| r.direction)
        .collect();

    let mode = if quote_a.synthetic || quote_b.synthetic { EvalMode::Demo } else { EvalMode::Live };

    Ok(PairEvaluation {
        pair: quote_a.pair.clone(),
        mode,
        a_to_b,
        b_to_a,
        threshold_pct,
        flagged,
        ts_ms: now_ms(),
    })
}
