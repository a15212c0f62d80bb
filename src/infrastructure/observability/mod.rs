//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_cache_lookup, record_cache_write,
    record_cache_write_attempt, record_http_request, record_llm_request, CacheLookupOutcome,
    CacheWriteOutcome, LlmRequestMetricParams, PrometheusMetrics,
};
