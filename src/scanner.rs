// ===============================
// src/scanner.rs
// ===============================
//
// One scanner task per monitored pair. Each owns its timer and its spread
// history; nothing mutable is shared between scanners.
//
// Per tick:
//   fetch both quotes -> adjuster (demo) -> evaluate_pair
//   -> history push -> alerts -> recorder/metrics
//
// Stop: the `running` watch flips to false. No new tick is scheduled after
// that; a tick already in flight finishes and its result is dropped.
//
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::alerts::Alerter;
use crate::demo::QuoteAdjuster;
use crate::domain::{now_ms, Event, FeeSchedule, Pair, PairEvaluation, Venue};
use crate::evaluator::{evaluate_pair, EvalError};
use crate::feed::{fetch_snapshot, QuoteSource};
use crate::history::{SpreadHistory, SpreadPoint};
use crate::metrics::{EVALUATIONS, NET_PROFIT, RETURN_PCT, TICKS, TICKS_UNAVAILABLE};

#[derive(Debug, Clone)]
pub struct ScanCfg {
    pub pair: Pair,
    pub venue_a: Venue,
    pub venue_b: Venue,
    pub fees: FeeSchedule,
    pub input_amount: f64,
    pub threshold_pct: f64,
    pub poll_interval: Duration,
    pub history_len: usize,
    /// 0 = run until stopped
    pub max_ticks: u64,
}

#[derive(Debug)]
pub enum TickOutcome {
    Evaluated(PairEvaluation),
    Unavailable(String),
    Rejected(EvalError),
}

pub struct Scanner {
    cfg: ScanCfg,
    source: Arc<dyn QuoteSource>,
    adjuster: Arc<dyn QuoteAdjuster>,
    alerter: Arc<Alerter>,
    rec_tx: Option<mpsc::Sender<Event>>,
    history: SpreadHistory,
}

impl Scanner {
    pub fn new(
        cfg: ScanCfg,
        source: Arc<dyn QuoteSource>,
        adjuster: Arc<dyn QuoteAdjuster>,
        alerter: Arc<Alerter>,
        rec_tx: Option<mpsc::Sender<Event>>,
    ) -> Self {
        let history = SpreadHistory::new(cfg.history_len);
        Self { cfg, source, adjuster, alerter, rec_tx, history }
    }

    /// Fetch + evaluate only; no history, alerts or recording.
    pub async fn tick(&self) -> TickOutcome {
        TICKS.inc();
        let c = &self.cfg;
        let (qa, qb) = match fetch_snapshot(self.source.as_ref(), c.venue_a, c.venue_b, &c.pair).await {
            Ok(qs) => qs,
            Err(e) => return TickOutcome::Unavailable(e.to_string()),
        };
        let qa = self.adjuster.adjust(qa);
        let qb = self.adjuster.adjust(qb);
        match evaluate_pair(&qa, &qb, c.input_amount, &c.fees, c.threshold_pct) {
            Ok(ev) => TickOutcome::Evaluated(ev),
            Err(e) => TickOutcome::Rejected(e),
        }
    }

    /// Apply a completed tick: history, alerts, metrics, recorder.
    pub fn commit(&mut self, outcome: TickOutcome) {
        let pair = self.cfg.pair.to_string();
        match outcome {
            TickOutcome::Evaluated(ev) => {
                self.history.push(SpreadPoint::from(&ev));
                EVALUATIONS.with_label_values(&[&pair, ev.mode.label()]).inc();
                for r in [&ev.a_to_b, &ev.b_to_a] {
                    let d = r.direction.label();
                    RETURN_PCT.with_label_values(&[&pair, &d]).set(r.return_pct);
                    NET_PROFIT.with_label_values(&[&pair, &d]).set(r.net_profit);
                }

                let stats = self.history.stats();
                info!(
                    pair = %pair,
                    mode = ev.mode.label(),
                    a_to_b = format_args!("{:.3}%", ev.a_to_b.return_pct),
                    b_to_a = format_args!("{:.3}%", ev.b_to_a.return_pct),
                    infeasible_a_to_b = ev.a_to_b.infeasible,
                    infeasible_b_to_a = ev.b_to_a.infeasible,
                    best_a_to_b = format_args!("{:.3}%", stats.best_a_to_b),
                    best_b_to_a = format_args!("{:.3}%", stats.best_b_to_a),
                    window = stats.len,
                    "tick"
                );

                self.alerter.fire(&ev);
                self.record(Event::Evaluation(ev));
            }
            TickOutcome::Unavailable(reason) => {
                warn!(pair = %pair, %reason, "quote unavailable, tick skipped");
                TICKS_UNAVAILABLE.with_label_values(&[&pair]).inc();
                self.record(Event::Unavailable { pair: self.cfg.pair.clone(), reason, ts_ms: now_ms() });
            }
            TickOutcome::Rejected(e) => {
                // quotes are validated upstream, so this is a bug, not market data
                error!(pair = %pair, ?e, "evaluator rejected input, tick skipped");
            }
        }
    }

    fn record(&self, ev: Event) {
        if let Some(tx) = &self.rec_tx {
            if tx.try_send(ev).is_err() {
                debug!("recorder channel full or closed, event dropped");
            }
        }
    }

    pub async fn run(mut self, mut running: watch::Receiver<bool>) -> SpreadHistory {
        let mut iv = interval(self.cfg.poll_interval);
        iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut done: u64 = 0;
        info!(pair = %self.cfg.pair, source = self.source.name(), every_ms = self.cfg.poll_interval.as_millis() as u64, "scanner started");

        loop {
            if !*running.borrow() {
                break;
            }
            tokio::select! {
                _ = iv.tick() => {}
                changed = running.changed() => {
                    if changed.is_err() { break; }
                    continue;
                }
            }

            let outcome = self.tick().await;
            if !*running.borrow() {
                debug!(pair = %self.cfg.pair, "stopped during tick, result discarded");
                break;
            }
            self.commit(outcome);

            done += 1;
            if self.cfg.max_ticks > 0 && done >= self.cfg.max_ticks {
                break;
            }
        }
        info!(pair = %self.cfg.pair, ticks = done, "scanner stopped");
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{Passthrough, SpreadInjector};
    use crate::domain::{EvalMode, Quote};
    use crate::feed::FeedError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Per-tick books: None = venue A fails that tick.
    struct Scripted {
        books: Vec<Option<((f64, f64), (f64, f64))>>,
        a_calls: AtomicUsize,
        b_calls: AtomicUsize,
        stop_at: Option<(usize, watch::Sender<bool>)>,
    }

    impl Scripted {
        fn new(books: Vec<Option<((f64, f64), (f64, f64))>>) -> Self {
            Self { books, a_calls: AtomicUsize::new(0), b_calls: AtomicUsize::new(0), stop_at: None }
        }
    }

    #[async_trait]
    impl QuoteSource for Scripted {
        fn name(&self) -> &'static str { "scripted" }

        async fn quote(&self, venue: Venue, pair: &Pair) -> Result<Quote, FeedError> {
            let n = match venue {
                Venue::Binance => self.a_calls.fetch_add(1, Ordering::SeqCst),
                Venue::Okx => self.b_calls.fetch_add(1, Ordering::SeqCst),
            };
            if let Some((at, tx)) = &self.stop_at {
                if *at == n && venue == Venue::Binance {
                    let _ = tx.send(false);
                }
            }
            let book = self.books.get(n).copied().flatten();
            match (venue, book) {
                (Venue::Binance, Some(((ask, bid), _))) | (Venue::Okx, Some((_, (ask, bid)))) => {
                    Ok(Quote::new(venue, pair.clone(), ask, bid, None, now_ms())?)
                }
                _ => Err(FeedError::EmptyBook { venue, pair: pair.to_string() }),
            }
        }
    }

    fn cfg(max_ticks: u64) -> ScanCfg {
        ScanCfg {
            pair: Pair::new("DOGE", "USDT"),
            venue_a: Venue::Binance,
            venue_b: Venue::Okx,
            fees: FeeSchedule::default(),
            input_amount: 1000.0,
            threshold_pct: 0.5,
            poll_interval: Duration::from_millis(1),
            history_len: 10,
            max_ticks,
        }
    }

    fn scanner(src: Scripted, adj: Arc<dyn QuoteAdjuster>, rec: Option<mpsc::Sender<Event>>, max: u64) -> Scanner {
        Scanner::new(cfg(max), Arc::new(src), adj, Arc::new(Alerter::new(rec.clone(), None, Duration::from_secs(1)).unwrap()), rec)
    }

    #[tokio::test]
    async fn unavailable_tick_is_skipped() {
        let src = Scripted::new(vec![
            Some(((100.0, 99.9), (100.2, 100.1))),
            None,
            Some(((100.0, 99.9), (102.0, 101.0))),
        ]);
        let (rec_tx, mut rec_rx) = mpsc::channel(64);
        let (_run_tx, run_rx) = watch::channel(true);
        let hist = scanner(src, Arc::new(Passthrough), Some(rec_tx), 3).run(run_rx).await;

        assert_eq!(hist.len(), 2);
        let mut kinds = Vec::new();
        while let Ok(ev) = rec_rx.try_recv() {
            kinds.push(match ev {
                Event::Evaluation(_) => "eval",
                Event::Unavailable { .. } => "unavailable",
                Event::Alert { .. } => "alert",
                Event::Note(_) => "note",
            });
        }
        // third tick crosses the 0.5% threshold: alert is recorded before the evaluation
        assert_eq!(kinds, vec!["eval", "unavailable", "alert", "eval"]);
    }

    #[tokio::test]
    async fn stop_discards_in_flight_tick() {
        let (run_tx, run_rx) = watch::channel(true);
        let mut src = Scripted::new(vec![Some(((1.0, 1.0), (1.0, 1.0))); 5]);
        src.stop_at = Some((1, run_tx));
        let hist = scanner(src, Arc::new(Passthrough), None, 0).run(run_rx).await;
        assert_eq!(hist.len(), 1);
    }

    #[tokio::test]
    async fn not_running_means_no_ticks() {
        let (_run_tx, run_rx) = watch::channel(false);
        let src = Scripted::new(vec![Some(((1.0, 1.0), (1.0, 1.0)))]);
        let hist = scanner(src, Arc::new(Passthrough), None, 0).run(run_rx).await;
        assert!(hist.is_empty());
    }

    #[tokio::test]
    async fn demo_adjuster_creates_flagged_spread() {
        // flat books; 7% dip on venue A makes A->B profitable
        let src = Scripted::new(vec![Some(((0.2001, 0.2000), (0.2001, 0.2000)))]);
        let inj = SpreadInjector::new(Venue::Binance, 0.93).unwrap();
        let s = scanner(src, Arc::new(inj), None, 1);
        match s.tick().await {
            TickOutcome::Evaluated(ev) => {
                assert_eq!(ev.mode, EvalMode::Demo);
                assert!(ev.a_to_b.return_pct > 5.0);
                assert_eq!(ev.flagged, vec![ev.a_to_b.direction]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
