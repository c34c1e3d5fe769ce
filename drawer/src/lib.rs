pub mod alert;
pub mod config;
pub mod controller;
pub mod metrics_defs;
pub mod upsell;
pub mod view;

#[cfg(test)]
mod testutils;
