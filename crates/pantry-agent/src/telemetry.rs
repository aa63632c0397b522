use anyhow::Result;
use serde_json::Value;

/// Fire-and-forget event sink.
///
/// Posting is best effort: a failing sink is logged at debug level and
/// never changes the outcome of a turn.
pub trait TelemetrySink: Send + Sync {
    fn post(&self, event: &str, payload: Option<Value>) -> Result<()>;
}

/// Default sink that writes events to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn post(&self, event: &str, payload: Option<Value>) -> Result<()> {
        tracing::info!(event, payload = ?payload, "telemetry");
        Ok(())
    }
}

pub(crate) fn post_best_effort(sink: &dyn TelemetrySink, event: &str, payload: Option<Value>) {
    if let Err(err) = sink.post(event, payload) {
        tracing::debug!("Dropping telemetry event {}: {}", event, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink {
        attempts: AtomicUsize,
    }

    impl TelemetrySink for FailingSink {
        fn post(&self, _event: &str, _payload: Option<Value>) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("sink offline"))
        }
    }

    #[test]
    fn test_failures_are_swallowed() {
        let sink = FailingSink {
            attempts: AtomicUsize::new(0),
        };
        post_best_effort(&sink, "agent.request", Some(json!({"n": 1})));
        post_best_effort(&sink, "agent.retry", None);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tracing_sink_accepts_events() {
        assert!(TracingTelemetry.post("agent.request", None).is_ok());
    }
}
