//! Server metrics definitions
//!
//! OpenTelemetry instruments recorded by the dispatcher and the channel
//! bridge. They are exported through whatever meter provider
//! `pathrpc_core::init_observability` installed; without one they are no-ops.
//!
//! # Metrics Collected
//!
//! - **calls_total**: calls handled, by transport (`direct`/`envelope`), method and outcome
//! - **call_duration**: call latency in seconds, same attributes
//! - **errors_total**: failed calls by error kind
//! - **channels_active**: currently open channel sessions
//! - **channels_total**: channel sessions opened since startup
//!
//! # Examples
//!
//! ```rust,no_run
//! use pathrpc_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new("my-service");
//!
//! metrics.record_call("envelope", "echo", "success", 0.002);
//! metrics.record_error("method_not_found");
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
    KeyValue,
};

/// Server metrics for monitoring
///
/// All instruments are prefixed with `pathrpc.server.*`.
pub struct ServerMetrics {
    /// Calls handled
    pub calls_total: Counter<u64>,
    /// Call duration in seconds
    pub call_duration: Histogram<f64>,
    /// Failed calls
    pub errors_total: Counter<u64>,
    /// Open channel sessions
    pub channels_active: UpDownCounter<i64>,
    /// Channel sessions opened
    pub channels_total: Counter<u64>,
}

impl ServerMetrics {
    /// Instruments on the global meter named after the service
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Instruments on a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            calls_total: meter
                .u64_counter("pathrpc.server.calls.total")
                .with_description("Total number of calls handled")
                .build(),
            call_duration: meter
                .f64_histogram("pathrpc.server.call.duration")
                .with_description("Call processing duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("pathrpc.server.errors.total")
                .with_description("Total number of failed calls")
                .build(),
            channels_active: meter
                .i64_up_down_counter("pathrpc.server.channels.active")
                .with_description("Number of open channel sessions")
                .build(),
            channels_total: meter
                .u64_counter("pathrpc.server.channels.total")
                .with_description("Total number of channel sessions opened")
                .build(),
        }
    }

    /// Record a finished call
    pub fn record_call(&self, transport: &str, method: &str, outcome: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("transport", transport.to_string()),
            KeyValue::new("method", method.to_string()),
            KeyValue::new("outcome", outcome.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    /// Record a failed call
    pub fn record_error(&self, kind: &str) {
        let attributes = &[KeyValue::new("error_kind", kind.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a channel session starting
    pub fn channel_opened(&self) {
        self.channels_active.add(1, &[]);
        self.channels_total.add(1, &[]);
    }

    /// Record a channel session ending
    pub fn channel_closed(&self) {
        self.channels_active.add(-1, &[]);
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ServerMetrics::new("test-server");

        // No provider installed, recording must still be harmless
        metrics.record_call("direct", "echo", "success", 0.1);
        metrics.record_error("internal_error");
        metrics.channel_opened();
        metrics.channel_closed();
    }

    #[test]
    fn test_call_metrics() {
        let metrics = ServerMetrics::new("test-server-calls");

        metrics.record_call("envelope", "add", "success", 0.05);
        metrics.record_call("envelope", "divide", "error", 0.01);
        metrics.record_call("direct", "add", "success", 0.02);

        metrics.record_error("invalid_params");
        metrics.record_error("method_not_found");
    }
}
