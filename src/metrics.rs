use axum::{
    Extension,
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Counter, CounterVec, Gauge, GaugeVec, Histogram, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::container::AppContext;
use crate::modules::stats::ACTIVE_USER_SETS;
use crate::modules::storage::DataStore;

/// Hutao API Prometheus Metrics
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,

    // Request metrics
    pub requests_total: Counter,
    pub request_duration: Histogram,

    // 重定向与版本校验
    pub redirects_total: CounterVec,
    pub client_rejections_total: Counter,

    // 上游
    pub upstream_errors_total: CounterVec,
    pub patch_refresh_total: CounterVec,

    // 邮件
    pub emails_total: CounterVec,

    // 在 /metrics 请求时从存储读取
    pub active_devices: GaugeVec,
    pub censored_files: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let requests_total = Counter::new("hutao_requests_total", "Total number of HTTP requests")?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "hutao_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let redirects_total = CounterVec::new(
            Opts::new("hutao_redirects_total", "Redirect responses by rule kind"),
            &["rule"],
        )?;
        registry.register(Box::new(redirects_total.clone()))?;

        let client_rejections_total = Counter::new(
            "hutao_client_rejections_total",
            "Requests rejected because the client is outdated",
        )?;
        registry.register(Box::new(client_rejections_total.clone()))?;

        let upstream_errors_total = CounterVec::new(
            Opts::new("hutao_upstream_errors_total", "Upstream request failures"),
            &["source"],
        )?;
        registry.register(Box::new(upstream_errors_total.clone()))?;

        let patch_refresh_total = CounterVec::new(
            Opts::new("hutao_patch_refresh_total", "Patch metadata refreshes"),
            &["project", "result"],
        )?;
        registry.register(Box::new(patch_refresh_total.clone()))?;

        let emails_total = CounterVec::new(
            Opts::new("hutao_emails_total", "Emails handled by result"),
            &["result"],
        )?;
        registry.register(Box::new(emails_total.clone()))?;

        let active_devices = GaugeVec::new(
            Opts::new("hutao_active_devices", "Distinct devices seen today"),
            &["division"],
        )?;
        registry.register(Box::new(active_devices.clone()))?;

        let censored_files = Gauge::new(
            "hutao_censored_metadata_files",
            "Metadata files currently blocked on the China mirror",
        )?;
        registry.register(Box::new(censored_files.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            redirects_total,
            client_rejections_total,
            upstream_errors_total,
            patch_refresh_total,
            emails_total,
            active_devices,
            censored_files,
        })
    }

    pub fn record_request(&self, duration: f64) {
        self.requests_total.inc();
        self.request_duration.observe(duration);
    }

    pub fn record_redirect(&self, rule: &str) {
        self.redirects_total.with_label_values(&[rule]).inc();
    }

    pub fn record_client_rejection(&self) {
        self.client_rejections_total.inc();
    }

    pub fn record_upstream_error(&self, source: &str) {
        self.upstream_errors_total.with_label_values(&[source]).inc();
    }

    pub fn record_patch_refresh(&self, project: &str, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.patch_refresh_total
            .with_label_values(&[project, result])
            .inc();
    }

    pub fn record_email(&self, sent: bool) {
        let result = if sent { "sent" } else { "failed" };
        self.emails_total.with_label_values(&[result]).inc();
    }

    /// 从存储刷新设备数与屏蔽文件数
    pub async fn update_store_gauges(&self, store: &DataStore) {
        for (division, key) in ACTIVE_USER_SETS {
            if let Ok(count) = store.set_card(key).await {
                self.active_devices
                    .with_label_values(&[division])
                    .set(count as f64);
            }
        }

        if let Ok(Some(files)) = crate::modules::storage::get_json::<Vec<String>>(
            store.as_ref(),
            crate::modules::censor::CENSORED_FILES_KEY,
        )
        .await
        {
            self.censored_files.set(files.len() as f64);
        }
    }
}

/// 请求计数与耗时
pub async fn metrics_middleware(
    Extension(ctx): Extension<AppContext>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    ctx.metrics.record_request(start.elapsed().as_secs_f64());
    response
}

/// Handler for /mgnt/metrics endpoint
pub async fn metrics_handler(Extension(ctx): Extension<AppContext>) -> Response {
    ctx.metrics.update_store_gauges(&ctx.data_store).await;

    let encoder = TextEncoder::new();
    let metric_families = ctx.metrics.registry.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => {
            debug!("Metrics endpoint served successfully");
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                output,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_encode() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request(0.02);
        metrics.record_redirect("metadata");
        metrics.record_patch_refresh("snap-hutao", true);
        metrics.record_email(false);

        let output = TextEncoder::new()
            .encode_to_string(&metrics.registry.gather())
            .unwrap();
        assert!(output.contains("hutao_requests_total 1"));
        assert!(output.contains("hutao_redirects_total{rule=\"metadata\"} 1"));
        assert!(output.contains("result=\"failed\""));
    }
}
