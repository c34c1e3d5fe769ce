pub mod html;
pub mod metrics_defs;
