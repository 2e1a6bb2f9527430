// ===============================
// src/history.rs
// ===============================
//
// Rolling spread window for one scanner (single writer, oldest evicted).
//
use serde::Serialize;
use std::collections::VecDeque;

use crate::domain::{EvalMode, PairEvaluation};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadPoint {
    pub ts_ms: i64,
    pub return_a_to_b: f64,
    pub return_b_to_a: f64,
    pub mode: EvalMode,
}

impl From<&PairEvaluation> for SpreadPoint {
    fn from(ev: &PairEvaluation) -> Self {
        Self {
            ts_ms: ev.ts_ms,
            return_a_to_b: ev.a_to_b.return_pct,
            return_b_to_a: ev.b_to_a.return_pct,
            mode: ev.mode,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub len: usize,
    pub best_a_to_b: f64,
    pub best_b_to_a: f64,
    pub mean_a_to_b: f64,
    pub mean_b_to_a: f64,
}

pub struct SpreadHistory {
    window: VecDeque<SpreadPoint>,
    cap: usize,
}

impl SpreadHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { window: VecDeque::with_capacity(cap), cap }
    }

    pub fn push(&mut self, p: SpreadPoint) {
        if self.window.len() == self.cap {
            self.window.pop_front();
        }
        self.window.push_back(p);
    }

    pub fn len(&self) -> usize { self.window.len() }
    pub fn is_empty(&self) -> bool { self.window.is_empty() }
    pub fn latest(&self) -> Option<&SpreadPoint> { self.window.back() }
    pub fn iter(&self) -> impl Iterator<Item = &SpreadPoint> { self.window.iter() }

    pub fn stats(&self) -> HistoryStats {
        let n = self.window.len();
        if n == 0 {
            return HistoryStats::default();
        }
        let (mut best_ab, mut best_ba) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        let (mut sum_ab, mut sum_ba) = (0.0, 0.0);
        for p in &self.window {
            best_ab = best_ab.max(p.return_a_to_b);
            best_ba = best_ba.max(p.return_b_to_a);
            sum_ab += p.return_a_to_b;
            sum_ba += p.return_b_to_a;
        }
        HistoryStats {
            len: n,
            best_a_to_b: best_ab,
            best_b_to_a: best_ba,
            mean_a_to_b: sum_ab / n as f64,
            mean_b_to_a: sum_ba / n as f64,
        }
    }
}
