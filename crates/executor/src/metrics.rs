use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives success/failure outcomes of steps and scripts.
pub trait MetricsSink: Send + Sync {
    fn record_success(&self, operation: &str);
    fn record_failure(&self, operation: &str);
}

impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    fn record_success(&self, operation: &str) {
        (**self).record_success(operation)
    }

    fn record_failure(&self, operation: &str) {
        (**self).record_failure(operation)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_success(&self, _operation: &str) {}
    fn record_failure(&self, _operation: &str) {}
}

/// In-process tallies, reported when a run finishes.
#[derive(Debug, Default)]
pub struct OperationCounts {
    successes: AtomicU64,
    failures: AtomicU64,
}

impl OperationCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl MetricsSink for OperationCounts {
    fn record_success(&self, _operation: &str) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, _operation: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

pub const OPERATIONS_TOTAL: &str = "predms_operations_total";

/// Forwards outcomes to the `metrics` facade, for whichever recorder is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsCounters;

impl MetricsCounters {
    pub fn describe() {
        metrics::describe_counter!(
            OPERATIONS_TOTAL,
            "SQL steps and scripts executed, by outcome"
        );
    }
}

impl MetricsSink for MetricsCounters {
    fn record_success(&self, _operation: &str) {
        metrics::counter!(OPERATIONS_TOTAL, "outcome" => "success").increment(1);
    }

    fn record_failure(&self, _operation: &str) {
        metrics::counter!(OPERATIONS_TOTAL, "outcome" => "failure").increment(1);
    }
}

/// Sends every outcome to each inner sink.
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl MetricsSink for Fanout {
    fn record_success(&self, operation: &str) {
        for sink in &self.sinks {
            sink.record_success(operation);
        }
    }

    fn record_failure(&self, operation: &str) {
        for sink in &self.sinks {
            sink.record_failure(operation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Fanout, MetricsSink, OperationCounts};
    use std::sync::Arc;

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(OperationCounts::new());
        let b = Arc::new(OperationCounts::new());
        let sink = Fanout::new().with(a.clone()).with(b.clone());

        sink.record_success("step");
        sink.record_failure("step");
        sink.record_success("step");

        assert_eq!((a.successes(), a.failures()), (2, 1));
        assert_eq!((b.successes(), b.failures()), (2, 1));
    }
}
