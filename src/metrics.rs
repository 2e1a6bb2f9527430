// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

// Idle clients must not hold the single accept thread
const CLIENT_IO_TIMEOUT: Duration = Duration::from_secs(2);

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Scanner / evaluator --------
pub static TICKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("scan_ticks_total", "scanner ticks started").unwrap());

pub static QUOTE_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("quote_polls_total", "quote fetches (labels: venue, outcome)"),
        &["venue", "outcome"],
    )
    .unwrap()
});

pub static EVALUATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("evaluations_total", "pair evaluations (labels: pair, mode)"),
        &["pair", "mode"],
    )
    .unwrap()
});

pub static TICKS_UNAVAILABLE: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticks_unavailable_total", "ticks skipped because a quote was unavailable"),
        &["pair"],
    )
    .unwrap()
});

pub static ALERTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("alerts_total", "threshold alerts fired (labels: pair, direction)"),
        &["pair", "direction"],
    )
    .unwrap()
});

pub static RETURN_PCT: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("arb_return_pct", "latest net return % per direction"),
        &["pair", "direction"],
    )
    .unwrap()
});

pub static NET_PROFIT: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("arb_net_profit", "latest net profit (quote ccy) per direction"),
        &["pair", "direction"],
    )
    .unwrap()
});

// ---- Config visibility ----
pub static CONFIG_QUOTE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_quote_mode", "quote source (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub static CONFIG_DEMO: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_demo_mode", "1 if demo spread injection is on (label: venue)"),
        &["venue"],
    )
    .unwrap()
});

pub static CONFIG_SYMBOL: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_symbol", "monitored pairs (label: symbol)"),
        &["symbol"],
    )
    .unwrap()
});

pub static CONFIG_THRESHOLD: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("config_alert_threshold_pct", "alert threshold (%)"),
        &["symbol"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(TICKS.clone())),
        REGISTRY.register(Box::new(QUOTE_POLLS.clone())),
        REGISTRY.register(Box::new(EVALUATIONS.clone())),
        REGISTRY.register(Box::new(TICKS_UNAVAILABLE.clone())),
        REGISTRY.register(Box::new(ALERTS.clone())),
        REGISTRY.register(Box::new(RETURN_PCT.clone())),
        REGISTRY.register(Box::new(NET_PROFIT.clone())),
        // Config visibility
        REGISTRY.register(Box::new(CONFIG_QUOTE_MODE.clone())),
        REGISTRY.register(Box::new(CONFIG_DEMO.clone())),
        REGISTRY.register(Box::new(CONFIG_SYMBOL.clone())),
        REGISTRY.register(Box::new(CONFIG_THRESHOLD.clone())),
    ] {
        if let Err(e) = m {
            tracing::warn!(?e, "metric registration failed");
        }
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics), tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    let _ = stream.set_read_timeout(Some(CLIENT_IO_TIMEOUT));
    let _ = stream.set_write_timeout(Some(CLIENT_IO_TIMEOUT));
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Metrics server on a dedicated OS thread (keeps the Tokio runtime clean)
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(?e, %addr, "metrics bind failed, endpoint disabled");
                return;
            }
        };
        tracing::info!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => tracing::warn!(?e, "metrics accept error"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_families() {
        init();
        ALERTS.with_label_values(&["DOGE/USDT", "binance_to_okx"]).inc();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("alerts_total"));
    }

    #[test]
    fn idle_client_does_not_stall_responder() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (conn, _) = listener.accept().unwrap();

        // client never sends a request line
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            handle_client(conn);
            let _ = done_tx.send(());
        });
        done_rx
            .recv_timeout(CLIENT_IO_TIMEOUT * 3)
            .expect("handle_client should give up on an idle client");

        let mut rsp = String::new();
        client.read_to_string(&mut rsp).unwrap();
        assert!(rsp.starts_with("HTTP/1.1 200 OK"));
    }
}
