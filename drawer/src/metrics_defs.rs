//! Metrics definitions for the drawer controller.

use shared::metrics_defs::{MetricDef, MetricType};

pub const DRAWER_OPEN: MetricDef = MetricDef {
    name: "drawer.open",
    metric_type: MetricType::Gauge,
    description: "Whether the drawer is currently open (0 or 1)",
};

pub const MUTATION_APPLIED: MetricDef = MetricDef {
    name: "drawer.mutation.applied",
    metric_type: MetricType::Counter,
    description: "Cart mutations that completed and synced the view",
};

pub const MUTATION_FAILED: MetricDef = MetricDef {
    name: "drawer.mutation.failed",
    metric_type: MetricType::Counter,
    description: "Cart mutations that ended in an error",
};

pub const MUTATION_DROPPED_BUSY: MetricDef = MetricDef {
    name: "drawer.mutation.dropped_busy",
    metric_type: MetricType::Counter,
    description: "Cart mutations dropped because another was in flight",
};

pub const SUBMIT_ACCEPTED: MetricDef = MetricDef {
    name: "drawer.submit.accepted",
    metric_type: MetricType::Counter,
    description: "Add-to-cart submissions accepted by the storefront",
};

pub const SUBMIT_DROPPED_LOCKED: MetricDef = MetricDef {
    name: "drawer.submit.dropped_locked",
    metric_type: MetricType::Counter,
    description: "Add-to-cart submissions dropped while the lock was held",
};

pub const UPSELL_PICKED: MetricDef = MetricDef {
    name: "drawer.upsell.picked",
    metric_type: MetricType::Counter,
    description: "Fresh upsell picks drawn from the pool",
};

pub const ALL_METRICS: &[MetricDef] = &[
    DRAWER_OPEN,
    MUTATION_APPLIED,
    MUTATION_FAILED,
    MUTATION_DROPPED_BUSY,
    SUBMIT_ACCEPTED,
    SUBMIT_DROPPED_LOCKED,
    UPSELL_PICKED,
];
