//! Metrics definitions for the cart API client.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "cart_api.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a cart API request in seconds",
};

pub const REQUEST_RATE_LIMITED: MetricDef = MetricDef {
    name: "cart_api.request.rate_limited",
    metric_type: MetricType::Counter,
    description: "Number of cart API requests answered with HTTP 429",
};

pub const REQUEST_RETRY: MetricDef = MetricDef {
    name: "cart_api.request.retry",
    metric_type: MetricType::Counter,
    description: "Number of cart API requests retried after a rate limit",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUEST_DURATION, REQUEST_RATE_LIMITED, REQUEST_RETRY];
