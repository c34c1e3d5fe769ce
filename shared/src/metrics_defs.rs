//! Common vocabulary for metric definitions.
//!
//! Each crate declares its metric families as consts and lists them in an
//! `ALL_METRICS` slice so the exporter can describe everything at startup.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

impl MetricDef {
    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match self.metric_type {
            MetricType::Counter => metrics::describe_counter!(self.name, self.description),
            MetricType::Gauge => metrics::describe_gauge!(self.name, self.description),
            MetricType::Histogram => metrics::describe_histogram!(self.name, self.description),
        }
    }
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

#[macro_export]
macro_rules! gauge {
    ($def:expr) => {
        metrics::gauge!($def.name)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}
