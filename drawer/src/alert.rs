/// Destination for failure messages meant for the person driving the cart.
/// The controller formats the text; hosts decide presentation.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &str);
}

/// Default sink: alerts become warnings on the log stream.
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, message: &str) {
        tracing::warn!(message, "user alert");
    }
}
