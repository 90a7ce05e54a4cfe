//! Metrics definitions for the credentials API.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Number of handled requests. Tagged with operation, status.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with operation.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const STORE_CALL_DURATION: MetricDef = MetricDef {
    name: "store.call.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single store call in seconds. Tagged with call.",
};

pub const STORE_CALL_FAILED: MetricDef = MetricDef {
    name: "store.call.failed",
    metric_type: MetricType::Counter,
    description: "Number of failed store calls. Tagged with call.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    STORE_CALL_DURATION,
    STORE_CALL_FAILED,
];
