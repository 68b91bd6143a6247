/// Prometheus metrics
///
/// Request counters and latency histograms per matched route, plus
/// connection-pool gauges. Each [`Metrics`] owns its registry so several
/// servers can live in one process.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::ContentType,
    web, Error, HttpResponse,
};
use futures::future::LocalBoxFuture;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use crate::error::AppError;

/// Label used for requests that matched no route, to bound cardinality
const UNMATCHED_ROUTE: &str = "unmatched";

pub struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    db_pool_connections: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["method", "path"],
        )?;
        let db_pool_connections = IntGaugeVec::new(
            Opts::new("db_pool_connections", "Database pool connections"),
            &["state"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(db_pool_connections.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            db_pool_connections,
        })
    }

    pub fn observe_request(&self, method: &str, path: &str, status: u16, elapsed_seconds: f64) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(elapsed_seconds);
    }

    pub fn observe_pool(&self, size: u32, idle: usize) {
        let idle = idle as i64;
        self.db_pool_connections
            .with_label_values(&["total"])
            .set(size as i64);
        self.db_pool_connections.with_label_values(&["idle"]).set(idle);
        self.db_pool_connections
            .with_label_values(&["in_use"])
            .set(size as i64 - idle);
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String, AppError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| AppError::Internal(format!("Metrics are not UTF-8: {}", e)))
    }
}

/// GET /api/v1/metrics
pub async fn metrics_endpoint(metrics: web::Data<Metrics>) -> Result<HttpResponse, AppError> {
    let body = metrics.render()?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(body))
}

/// Records count and latency of every request under its route pattern
pub struct MetricsMiddleware {
    metrics: Arc<Metrics>,
}

impl MetricsMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
    metrics: Arc<Metrics>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let service = self.service.clone();
        let metrics = self.metrics.clone();

        Box::pin(async move {
            let res = service.call(req).await?;

            // The pattern is only known once routing has happened
            let path = res
                .request()
                .match_pattern()
                .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
            metrics.observe_request(
                &method,
                &path,
                res.status().as_u16(),
                start_time.elapsed().as_secs_f64(),
            );

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[core::prelude::v1::test]
    fn test_registries_are_independent() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();

        first.observe_request("GET", "/health_check", 200, 0.01);

        assert!(first.render().unwrap().contains("http_requests_total"));
        assert!(!second.render().unwrap().contains("/health_check"));
    }

    #[core::prelude::v1::test]
    fn test_pool_gauges() {
        let metrics = Metrics::new().unwrap();
        metrics.observe_pool(10, 4);

        let text = metrics.render().unwrap();
        assert!(text.contains("db_pool_connections{state=\"total\"} 10"));
        assert!(text.contains("db_pool_connections{state=\"idle\"} 4"));
        assert!(text.contains("db_pool_connections{state=\"in_use\"} 6"));
    }

    #[actix_web::test]
    async fn test_requests_are_counted_by_route_pattern() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = test::init_service(
            App::new()
                .wrap(MetricsMiddleware::new(metrics.clone()))
                .route(
                    "/users/{id}",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        for uri in ["/users/1", "/users/2", "/nowhere"] {
            test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        }

        let text = metrics.render().unwrap();
        assert!(text.contains(
            "http_requests_total{method=\"GET\",path=\"/users/{id}\",status=\"200\"} 2"
        ));
        assert!(text.contains(
            "http_requests_total{method=\"GET\",path=\"unmatched\",status=\"404\"} 1"
        ));
    }
}
