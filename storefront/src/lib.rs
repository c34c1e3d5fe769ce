pub mod catalog;
pub mod client;
pub mod metrics_defs;
pub mod routes;
