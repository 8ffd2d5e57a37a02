//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed consensus metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Consensus-related Prometheus metrics (§6 "Metrics").
#[derive(Clone)]
pub struct ConsensusMetrics {
    pub blocks_committed_total: IntCounter,
    pub blocks_rejected_total: IntCounterVec,
    pub block_commit_seconds: Histogram,
    pub mempool_size: IntGauge,
    pub anchor_behind_blocks: Gauge,
    pub anchor_circuit_open: IntGauge,
    pub sync_mode: IntGauge,
}

impl ConsensusMetrics {
    /// Registers consensus metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_committed_total = IntCounter::with_opts(Opts::new(
            "blocks_committed_total",
            "Total number of blocks committed to the local chain",
        ))?;
        registry.register(Box::new(blocks_committed_total.clone()))?;

        let blocks_rejected_total = IntCounterVec::new(
            Opts::new(
                "blocks_rejected_total",
                "Total number of blocks rejected by the validator, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        let block_commit_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "block_commit_seconds",
                "Time to validate, execute, and persist a block, in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(block_commit_seconds.clone()))?;

        let mempool_size = IntGauge::with_opts(Opts::new(
            "mempool_size",
            "Number of transactions currently held in the mempool",
        ))?;
        registry.register(Box::new(mempool_size.clone()))?;

        let anchor_behind_blocks = Gauge::with_opts(Opts::new(
            "anchor_behind_blocks",
            "Anchor blocks between the latest known anchor head and the local anchor cursor",
        ))?;
        registry.register(Box::new(anchor_behind_blocks.clone()))?;

        let anchor_circuit_open = IntGauge::with_opts(Opts::new(
            "anchor_circuit_open",
            "1 if the anchor ingester's circuit breaker is currently open, else 0",
        ))?;
        registry.register(Box::new(anchor_circuit_open.clone()))?;

        let sync_mode = IntGauge::with_opts(Opts::new(
            "sync_mode",
            "1 if the node is currently in Syncing state, else 0",
        ))?;
        registry.register(Box::new(sync_mode.clone()))?;

        Ok(Self {
            blocks_committed_total,
            blocks_rejected_total,
            block_commit_seconds,
            mempool_size,
            anchor_behind_blocks,
            anchor_circuit_open,
            sync_mode,
        })
    }
}

/// Wrapper around a Prometheus registry and the consensus metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the consensus metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("sidechain".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        Ok(Self {
            registry,
            consensus,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
