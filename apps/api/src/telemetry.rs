//! Telemetry: the out-of-band channel for diagnostics.
//!
//! Services never report degraded quality through their return values; they push
//! structured events through an `EventSink` instead. Sinks are fire-and-forget:
//! the trait methods return nothing, so a sink can never fail or stall a request.

use serde_json::{Map, Value};
use tracing::info;

/// Event / metric properties. A JSON object so sinks can forward them verbatim.
pub type Properties = Map<String, Value>;

/// Fire-and-forget telemetry sink. Carried in services as `Arc<dyn EventSink>`.
pub trait EventSink: Send + Sync {
    fn track_event(&self, name: &str, properties: Properties);
    fn track_metric(&self, name: &str, value: f64, properties: Properties);
}

/// Default sink: emits every event as a structured `tracing` record under the
/// `telemetry` target, so log shipping picks it up without another exporter.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn track_event(&self, name: &str, properties: Properties) {
        let properties = Value::Object(properties);
        info!(
            target: "telemetry",
            event = name,
            properties = %properties,
            "event"
        );
    }

    fn track_metric(&self, name: &str, value: f64, properties: Properties) {
        let properties = Value::Object(properties);
        info!(
            target: "telemetry",
            metric = name,
            value,
            properties = %properties,
            "metric"
        );
    }
}

/// Builds a `Properties` map from `key => value` pairs.
///
/// ```ignore
/// let props = props! { "attempt" => 2, "language" => "en" };
/// ```
#[macro_export]
macro_rules! props {
    () => { $crate::telemetry::Properties::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::telemetry::Properties::new();
        $( map.insert(($key).to_string(), ::serde_json::json!($value)); )+
        map
    }};
}

#[cfg(test)]
pub mod testing {
    use parking_lot::Mutex;

    use super::{EventSink, Properties};

    /// A recorded event or metric.
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub name: String,
        pub value: Option<f64>,
        pub properties: Properties,
    }

    /// In-memory sink for assertions in service tests.
    #[derive(Default)]
    pub struct RecordingSink {
        pub records: Mutex<Vec<Recorded>>,
    }

    impl RecordingSink {
        pub fn events_named(&self, name: &str) -> Vec<Recorded> {
            self.records
                .lock()
                .iter()
                .filter(|r| r.name == name && r.value.is_none())
                .cloned()
                .collect()
        }

        pub fn metrics_named(&self, name: &str) -> Vec<Recorded> {
            self.records
                .lock()
                .iter()
                .filter(|r| r.name == name && r.value.is_some())
                .cloned()
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn track_event(&self, name: &str, properties: Properties) {
            self.records.lock().push(Recorded {
                name: name.to_string(),
                value: None,
                properties,
            });
        }

        fn track_metric(&self, name: &str, value: f64, properties: Properties) {
            self.records.lock().push(Recorded {
                name: name.to_string(),
                value: Some(value),
                properties,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_props_macro_builds_json_object() {
        let props = props! { "attempt" => 2, "language" => "en", "ok" => true };
        assert_eq!(props["attempt"], 2);
        assert_eq!(props["language"], "en");
        assert_eq!(props["ok"], true);
    }

    #[test]
    fn test_empty_props_macro() {
        let props = props! {};
        assert!(props.is_empty());
    }

    #[test]
    fn test_recording_sink_separates_events_and_metrics() {
        let sink = RecordingSink::default();
        sink.track_event("A", props! { "x" => 1 });
        sink.track_metric("A", 42.0, props! {});
        sink.track_event("B", props! {});

        assert_eq!(sink.events_named("A").len(), 1);
        assert_eq!(sink.metrics_named("A").len(), 1);
        assert_eq!(sink.metrics_named("A")[0].value, Some(42.0));
        assert_eq!(sink.events_named("B").len(), 1);
    }

    #[test]
    fn test_tracing_sink_does_not_panic_without_subscriber() {
        let sink = TracingEventSink;
        sink.track_event("Anything", props! { "k" => "v" });
        sink.track_metric("AnyMetric", 1.5, props! {});
    }
}
