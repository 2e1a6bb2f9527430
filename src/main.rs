// ===============================
// src/main.rs
// ===============================
/*
 # one pair, mock quotes, demo spread, 10 ticks
 DEMO_MODE=true POLL_INTERVAL_MS=1000 cargo run -- --ticks 10

 # live Binance/OKX quotes
 QUOTE_MODE=live SYMBOLS=DOGE/USDT,SOL/USDT cargo run

 # pairs listed on both venues
 cargo run -- pairs --quote USDT

 curl -s localhost:9898/metrics | egrep '^(arb_return_pct|alerts_total)'
*/
/*
=============================================================================
Project : spread_watch: two-venue crypto arbitrage monitor in Rust
Module  : main.rs
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
mod alerts;
mod binance;
mod config;
mod demo;
mod domain;
mod evaluator;
mod feed;
mod history;
mod markets;
mod metrics;
mod okx;
mod recorder;
mod scanner;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::{
    select,
    sync::{mpsc, watch},
    task::JoinSet,
    time::{interval, Duration},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::demo::{Passthrough, QuoteAdjuster, SpreadInjector};
use crate::domain::Event;
use crate::feed::{MockQuoteSource, QuoteSource, RestQuoteSource};

#[derive(Parser, Debug)]
#[command(name = "spread_watch", version, about = "Two-venue crypto arbitrage monitor")]
struct Cli {
    /// Force demo spread injection (overrides DEMO_MODE)
    #[arg(long)]
    demo: bool,
    /// Comma separated pairs, e.g. DOGE/USDT,SOL/USDT (overrides SYMBOLS)
    #[arg(long)]
    symbols: Option<String>,
    /// Stop each scanner after N ticks (0 = run until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    ticks: u64,
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Poll, evaluate and alert (default)
    Monitor,
    /// List pairs traded on both Binance and OKX
    Pairs {
        #[arg(long, default_value = "USDT")]
        quote: String,
    },
}

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // ---- Load config + CLI overrides ----
    let mut args = match config::load() {
        Ok(a) => a,
        Err(e) => {
            error!(%e, "config error");
            std::process::exit(2);
        }
    };
    if let Some(raw) = cli.symbols.as_deref() {
        match config::parse_symbols(raw) {
            Ok(s) => args.symbols = s,
            Err(e) => {
                error!(%e, "bad --symbols");
                std::process::exit(2);
            }
        }
    }
    if cli.demo && args.demo.is_none() {
        args.demo = Some(config::DemoCfg { venue: args.venue_a, factor: SpreadInjector::DEFAULT_FACTOR });
    }

    match cli.cmd.unwrap_or(Cmd::Monitor) {
        Cmd::Pairs { quote } => list_pairs(&args, &quote).await,
        Cmd::Monitor => monitor(args, cli.ticks).await,
    }
}

async fn list_pairs(args: &config::Args, quote: &str) {
    let http = match reqwest::Client::builder().timeout(args.http_timeout).build() {
        Ok(c) => c,
        Err(e) => {
            error!(?e, "http client build failed");
            std::process::exit(1);
        }
    };
    match markets::common_pairs(&http, &args.binance_rest_url, &args.okx_rest_url, quote).await {
        Ok(pairs) => {
            info!(count = pairs.len(), "common pairs");
            for p in pairs {
                println!("{p}");
            }
        }
        Err(e) => {
            error!(%e, "could not load markets");
            std::process::exit(1);
        }
    }
}

async fn monitor(args: config::Args, max_ticks: u64) {
    // ---- Metrics ----
    metrics::init();
    metrics::serve_metrics(args.metrics_port);

    // ---- Startup info + export config to metrics ----
    info!(
        quote_mode = args.quote_mode.label(),
        venue_a = %args.venue_a,
        venue_b = %args.venue_b,
        symbols = ?args.symbols.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        taker_fee_rate = args.fees.taker_fee_rate,
        withdrawal_fee = args.fees.withdrawal_fee_quote,
        input_amount = args.input_amount,
        threshold_pct = args.alert_threshold_pct,
        poll_ms = args.poll_interval.as_millis() as u64,
        "startup config"
    );
    metrics::CONFIG_QUOTE_MODE.with_label_values(&[args.quote_mode.label()]).set(1);
    for p in &args.symbols {
        let s = p.to_string();
        metrics::CONFIG_SYMBOL.with_label_values(&[&s]).set(1);
        metrics::CONFIG_THRESHOLD.with_label_values(&[&s]).set(args.alert_threshold_pct);
    }

    // ---- Demo adjuster ----
    let adjuster: Arc<dyn QuoteAdjuster> = match args.demo.as_ref().and_then(|d| SpreadInjector::new(d.venue, d.factor)) {
        Some(inj) => {
            warn!(venue = %inj.venue, factor = inj.factor, "DEMO MODE: quotes are synthetically adjusted, not real market prices");
            metrics::CONFIG_DEMO.with_label_values(&[inj.venue.label()]).set(1);
            Arc::new(inj)
        }
        None => Arc::new(Passthrough),
    };

    // ---- Quote source ----
    let source: Arc<dyn QuoteSource> = match args.quote_mode {
        config::QuoteMode::Mock => Arc::new(MockQuoteSource::default()),
        config::QuoteMode::Live => {
            match RestQuoteSource::new(args.binance_rest_url.clone(), args.okx_rest_url.clone(), args.http_timeout) {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    error!(%e, "quote source init failed");
                    std::process::exit(1);
                }
            }
        }
    };

    // ---- Recorder (optional) ----
    let (rec_tx, rec_task) = match args.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<Event>(8192);
            (Some(tx), Some(tokio::spawn(recorder::run(rx, path))))
        }
        None => (None, None),
    };
    if let Some(tx) = &rec_tx {
        let _ = tx.try_send(Event::Note(format!("start mode={} demo={}", args.quote_mode.label(), args.demo.is_some())));
    }

    let alerter = match alerts::Alerter::new(rec_tx.clone(), args.alert_webhook_url.clone(), args.http_timeout) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            error!(%e, "alert webhook client init failed");
            std::process::exit(1);
        }
    };

    // ---- Scanners: one per pair ----
    let (run_tx, run_rx) = watch::channel(true);
    let mut tasks = JoinSet::new();
    for pair in args.symbols.iter().cloned() {
        let cfg = scanner::ScanCfg {
            pair,
            venue_a: args.venue_a,
            venue_b: args.venue_b,
            fees: args.fees,
            input_amount: args.input_amount,
            threshold_pct: args.alert_threshold_pct,
            poll_interval: args.poll_interval,
            history_len: args.history_len,
            max_ticks,
        };
        let s = scanner::Scanner::new(cfg, source.clone(), adjuster.clone(), alerter.clone(), rec_tx.clone());
        tasks.spawn(s.run(run_rx.clone()));
    }

    // ---- Heartbeat / shutdown ----
    let mut hb = interval(Duration::from_secs(30));
    let mut stopping = false;
    loop {
        select! {
            _ = tokio::signal::ctrl_c(), if !stopping => {
                info!("ctrl-c: stopping scanners (in-flight ticks are discarded)");
                let _ = run_tx.send(false);
                stopping = true;
            }
            joined = tasks.join_next() => match joined {
                Some(Ok(hist)) => {
                    let st = hist.stats();
                    info!(window = st.len, best_a_to_b = st.best_a_to_b, best_b_to_a = st.best_b_to_a, "scanner finished");
                }
                Some(Err(e)) => error!(?e, "scanner task failed"),
                None => break,
            },
            _ = hb.tick() => {
                info!(ticks = metrics::TICKS.get(), "heartbeat");
            }
        }
    }
    info!("all scanners stopped");

    // close the recorder channel so it flushes before exit
    drop(alerter);
    drop(rec_tx);
    if let Some(t) = rec_task {
        let _ = t.await;
    }
}
