// ===============================
// src/alerts.rs
// ===============================
//
// Opportunity alerts. Fires for every flagged direction on every tick:
// no debounce, no suppression window (a direction that stays above the
// threshold re-alerts each tick).
//
// Sinks: warn! log line, alerts_total counter, recorder Event::Alert,
// and an optional JSON webhook (POST {"content": "..."}). Webhook requests
// share one client with a request timeout, so a stalled endpoint cannot
// keep POST tasks alive past it.
//
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::domain::{ArbitrageResult, EvalMode, Event, PairEvaluation};
use crate::metrics::ALERTS;

#[derive(Serialize)]
struct WebhookMessage {
    content: String,
}

pub struct Alerter {
    rec_tx: Option<mpsc::Sender<Event>>,
    webhook: Option<(reqwest::Client, String)>,
}

impl Alerter {
    pub fn new(
        rec_tx: Option<mpsc::Sender<Event>>,
        webhook_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let webhook = match webhook_url {
            Some(u) => Some((reqwest::Client::builder().timeout(timeout).build()?, u)),
            None => None,
        };
        Ok(Self { rec_tx, webhook })
    }

    /// Returns how many alerts were raised for this evaluation.
    pub fn fire(&self, ev: &PairEvaluation) -> usize {
        let mut fired = 0;
        for d in &ev.flagged {
            let Some(res) = ev.result_for(*d) else { continue };
            fired += 1;

            warn!(
                pair = %ev.pair,
                direction = %d,
                return_pct = format_args!("{:.3}", res.return_pct),
                net_profit = format_args!("{:.2}", res.net_profit),
                threshold_pct = ev.threshold_pct,
                mode = ev.mode.label(),
                "arbitrage opportunity"
            );
            ALERTS.with_label_values(&[&ev.pair.to_string(), &d.label()]).inc();

            if let Some(tx) = &self.rec_tx {
                let rec = Event::Alert {
                    pair: ev.pair.clone(),
                    mode: ev.mode,
                    result: res.clone(),
                    ts_ms: ev.ts_ms,
                };
                if tx.try_send(rec).is_err() {
                    warn!(pair = %ev.pair, direction = %d, "recorder channel full or closed, alert record dropped");
                }
            }

            if let Some((http, url)) = &self.webhook {
                let http = http.clone();
                let url = url.clone();
                let msg = WebhookMessage { content: alert_text(&ev.pair.to_string(), ev.mode, res) };
                tokio::spawn(async move {
                    if let Err(e) = post_webhook(&http, &url, &msg).await {
                        error!(%e, timed_out = e.is_timeout(), "alert webhook failed");
                    }
                });
            }
        }
        fired
    }
}

async fn post_webhook(http: &reqwest::Client, url: &str, msg: &WebhookMessage) -> Result<(), reqwest::Error> {
    http.post(url).json(msg).send().await?.error_for_status()?;
    Ok(())
}

pub fn alert_text(pair: &str, mode: EvalMode, res: &ArbitrageResult) -> String {
    let tag = match mode {
        EvalMode::Live => "",
        EvalMode::Demo => "[DEMO] ",
    };
    format!(
        "{tag}Opportunity {pair} {}: est. profit {:.2} ({:.2}%) on {:.2} | buy {:.6} sell {:.6}",
        res.direction, res.net_profit, res.return_pct, res.input_amount, res.buy_price, res.sell_price
    )
}
