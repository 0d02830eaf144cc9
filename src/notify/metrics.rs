//! Prometheus metrics exporter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{CounterVec, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use tracing::{error, info};

use crate::error::MetricsError;

fn prom_err(e: prometheus::Error) -> MetricsError {
    MetricsError::PrometheusFailed(e.to_string())
}

/// Prometheus metrics for the transcode worker.
pub struct Metrics {
    registry: Registry,
    /// Jobs by terminal outcome (`completed`, `errored`).
    pub jobs_total: CounterVec,
    /// Queue messages by handling result.
    pub messages_total: CounterVec,
    /// Wall-clock time of a job from first report to cleanup.
    pub job_duration_seconds: Histogram,
    /// 1 while a job is running.
    pub jobs_in_progress: IntGauge,
    /// Status updates the store did not accept.
    pub status_report_failures_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let jobs_total = CounterVec::new(
            Opts::new("transcode_jobs_total", "Total number of transcode jobs by outcome"),
            &["outcome"],
        )
        .map_err(prom_err)?;

        let messages_total = CounterVec::new(
            Opts::new("transcode_messages_total", "Total number of queue messages by result"),
            &["result"],
        )
        .map_err(prom_err)?;

        let job_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "transcode_job_duration_seconds",
                "Time taken to process a transcode job in seconds",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 180.0, 600.0, 1800.0, 3600.0]),
        )
        .map_err(prom_err)?;

        let jobs_in_progress = IntGauge::new(
            "transcode_jobs_in_progress",
            "Number of jobs currently being transcoded",
        )
        .map_err(prom_err)?;

        let status_report_failures_total = IntCounter::new(
            "status_report_failures_total",
            "Number of status updates that could not be delivered",
        )
        .map_err(prom_err)?;

        registry.register(Box::new(jobs_total.clone())).map_err(prom_err)?;
        registry.register(Box::new(messages_total.clone())).map_err(prom_err)?;
        registry.register(Box::new(job_duration_seconds.clone())).map_err(prom_err)?;
        registry.register(Box::new(jobs_in_progress.clone())).map_err(prom_err)?;
        registry
            .register(Box::new(status_report_failures_total.clone()))
            .map_err(prom_err)?;

        Ok(Self {
            registry,
            jobs_total,
            messages_total,
            job_duration_seconds,
            jobs_in_progress,
            status_report_failures_total,
        })
    }

    pub fn job_started(&self) {
        self.jobs_in_progress.inc();
    }

    /// Records a finished job. `outcome` is `completed` or `errored`.
    pub fn job_finished(&self, outcome: &str, elapsed: Duration) {
        self.jobs_in_progress.dec();
        self.jobs_total.with_label_values(&[outcome]).inc();
        self.job_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Records how a received message was handled.
    pub fn record_message(&self, result: &str) {
        self.messages_total.with_label_values(&[result]).inc();
    }

    pub fn record_report_failure(&self) {
        self.status_report_failures_total.inc();
    }

    /// Returns the metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, MetricsError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).map_err(prom_err)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::PrometheusFailed(e.to_string()))
    }
}

/// HTTP server for Prometheus metrics.
pub struct MetricsServer {
    metrics: Arc<Metrics>,
    port: u16,
}

impl MetricsServer {
    pub fn new(metrics: Arc<Metrics>, port: u16) -> Self {
        Self { metrics, port }
    }

    /// Serves `/metrics` until the task is dropped.
    pub async fn start(self) -> Result<(), MetricsError> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{body::Incoming, Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;

        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

        info!(port = self.port, "Starting Prometheus metrics server");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| MetricsError::PrometheusFailed(e.to_string()))?;

            let io = TokioIo::new(stream);
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| {
                    let metrics = metrics.clone();
                    async move {
                        let (status, body) = if req.uri().path() != "/metrics" {
                            (StatusCode::NOT_FOUND, "Not Found".to_string())
                        } else {
                            match metrics.gather() {
                                Ok(body) => (StatusCode::OK, body),
                                Err(e) => {
                                    error!(error = %e, "Failed to gather metrics");
                                    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                                }
                            }
                        };

                        let mut response = Response::new(Full::new(Bytes::from(body)));
                        *response.status_mut() = status;
                        Ok::<_, hyper::Error>(response)
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %e, "Error serving connection");
                }
            });
        }
    }
}
