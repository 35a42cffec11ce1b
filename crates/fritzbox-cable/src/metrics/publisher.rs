//! Prometheus registry holding everything the exporter exposes.

use std::collections::HashMap;
use std::time::Duration;

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::descriptors::{CHANNEL_DESCRIPTORS, INTERFACE_LABEL, MetricKind, NETWORK_METRICS};
use crate::channel::{Direction, Observation, Slot};
use crate::client::RequestObserver;
use crate::error::{Error, Result};

pub const DEFAULT_NAMESPACE: &str = "fritzCable";

enum ChannelVec {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

impl ChannelVec {
    fn reset(&self) {
        match self {
            ChannelVec::Gauge(vec) => vec.reset(),
            ChannelVec::Counter(vec) => vec.reset(),
        }
    }
}

/// Owns the registry and every metric family registered in it.
///
/// Channel families are cleared by [`begin_cycle`](Self::begin_cycle), so the
/// exposition only ever contains the channels of the latest cycle.
pub struct MetricsPublisher {
    registry: Registry,
    namespace: String,
    channels: HashMap<(Direction, Slot), ChannelVec>,
    up: Gauge,
    scrapes_total: IntCounter,
    parse_errors: IntCounterVec,
    client_requests: IntCounterVec,
    client_request_duration: HistogramVec,
}

impl MetricsPublisher {
    /// Create a publisher under the `fritzCable` namespace.
    pub fn new() -> Result<Self> {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let registry = Registry::new();

        let mut channels = HashMap::with_capacity(CHANNEL_DESCRIPTORS.len());
        for d in CHANNEL_DESCRIPTORS.iter() {
            let opts = Opts::new(d.name, d.help)
                .namespace(namespace.as_str())
                .subsystem(d.direction.as_str());
            let labels = d.label_names();
            let vec = match d.kind {
                MetricKind::Gauge => {
                    let vec = GaugeVec::new(opts, &labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    ChannelVec::Gauge(vec)
                }
                MetricKind::Counter => {
                    let vec = CounterVec::new(opts, &labels)?;
                    registry.register(Box::new(vec.clone()))?;
                    ChannelVec::Counter(vec)
                }
            };
            channels.insert((d.direction, d.slot), vec);
        }

        for (name, help) in NETWORK_METRICS {
            let opts = Opts::new(name, help)
                .namespace(namespace.as_str())
                .subsystem("network");
            registry.register(Box::new(CounterVec::new(opts, &[INTERFACE_LABEL])?))?;
        }

        let up = Gauge::with_opts(
            Opts::new("up", "Was the last scrape of Fritzbox successful.").namespace(namespace.as_str()),
        )?;
        registry.register(Box::new(up.clone()))?;

        let scrapes_total = IntCounter::with_opts(
            Opts::new("exporter_scrapes_total", "Current total Fritzbox Cable scrapes.")
                .namespace(namespace.as_str()),
        )?;
        registry.register(Box::new(scrapes_total.clone()))?;

        let parse_errors = IntCounterVec::new(
            Opts::new(
                "exporter_parse_errors_total",
                "Number of errors while parsing statistics.",
            )
            .namespace(namespace.as_str()),
            &["file"],
        )?;
        registry.register(Box::new(parse_errors.clone()))?;

        let client_requests = IntCounterVec::new(
            Opts::new("exporter_client_requests_total", "HTTP requests to Fritzbox Cable")
                .namespace(namespace.as_str()),
            &["code", "method"],
        )?;
        registry.register(Box::new(client_requests.clone()))?;

        let client_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "exporter_client_request_duration_seconds",
                "Histogram of Fritzbox Cable HTTP request latencies.",
            )
            .namespace(namespace.as_str()),
            &["code", "method"],
        )?;
        registry.register(Box::new(client_request_duration.clone()))?;

        let build_info = IntGaugeVec::new(
            Opts::new(
                "exporter_build_info",
                "Build information of the exporter, value is always 1.",
            )
            .namespace(namespace.as_str()),
            &["version"],
        )?;
        build_info
            .get_metric_with_label_values(&[env!("CARGO_PKG_VERSION")])?
            .set(1);
        registry.register(Box::new(build_info))?;

        Ok(Self {
            registry,
            namespace,
            channels,
            up,
            scrapes_total,
            parse_errors,
            client_requests,
            client_request_duration,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Count a new cycle and drop the channel metrics of the previous one.
    pub fn begin_cycle(&self) {
        self.scrapes_total.inc();
        for vec in self.channels.values() {
            vec.reset();
        }
    }

    /// Set the child of `observation`'s metric family to its value.
    ///
    /// Counter slots are set to the absolute value reported by the router; a
    /// negative value is rejected.
    pub fn publish(&self, observation: &Observation) -> Result<()> {
        let vec = self
            .channels
            .get(&(observation.direction, observation.slot))
            .ok_or_else(|| {
                Error::decode(
                    crate::fetch::DOC_INFO_PAGE,
                    format!(
                        "no {} metric for slot {}",
                        observation.direction, observation.slot
                    ),
                )
            })?;
        let labels = observation.label_values();

        match vec {
            ChannelVec::Gauge(vec) => {
                vec.get_metric_with_label_values(labels.as_slice())?
                    .set(observation.value);
            }
            ChannelVec::Counter(vec) => {
                if observation.value < 0.0 || observation.value.is_nan() {
                    return Err(Error::decode(
                        crate::fetch::DOC_INFO_PAGE,
                        format!(
                            "negative {} {} for channel {}: {}",
                            observation.direction,
                            observation.slot,
                            observation.channel,
                            observation.value
                        ),
                    ));
                }
                let counter = vec.get_metric_with_label_values(labels.as_slice())?;
                counter.reset();
                counter.inc_by(observation.value);
            }
        }
        Ok(())
    }

    /// Count one parse failure in `file`.
    pub fn record_parse_error(&self, file: &str) {
        self.parse_errors.with_label_values(&[file]).inc();
    }

    /// Record whether the last cycle reached the router and decoded its data.
    pub fn set_up(&self, up: bool) {
        self.up.set(if up { 1.0 } else { 0.0 });
    }

    pub fn scrapes_total(&self) -> u64 {
        self.scrapes_total.get()
    }

    pub fn is_up(&self) -> bool {
        self.up.get() >= 1.0
    }

    /// Render the registry in the Prometheus text format.
    ///
    /// Not serialized against a running cycle; use
    /// [`Exporter::collect`](crate::Exporter::collect) for a consistent view.
    pub fn encode(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .map_err(|e| Error::Encode {
                reason: e.to_string(),
            })?;

        String::from_utf8(buffer).map_err(|e| Error::Encode {
            reason: e.to_string(),
        })
    }
}

impl RequestObserver for MetricsPublisher {
    fn observe(&self, method: &Method, status: StatusCode, elapsed: Duration) {
        let code = status.as_str();
        let method = method.as_str().to_ascii_lowercase();
        let labels: &[&str] = &[code, method.as_str()];

        self.client_requests.with_label_values(labels).inc();
        self.client_request_duration
            .with_label_values(labels)
            .observe(elapsed.as_secs_f64());
        debug!(code, method = %method, elapsed_ms = elapsed.as_millis() as u64, "router request observed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(direction: Direction, slot: Slot, channel: &str, extra: &[&str], value: f64) -> Observation {
        Observation {
            direction,
            slot,
            channel: channel.to_string(),
            extra_labels: extra.iter().map(|s| s.to_string()).collect(),
            value,
        }
    }

    #[test]
    fn test_exposition_contains_published_channels() {
        let publisher = MetricsPublisher::new().unwrap();
        publisher.begin_cycle();
        publisher
            .publish(&observation(Direction::Downstream, Slot::CenterFrequency, "05", &[], 650_000_000.0))
            .unwrap();
        publisher
            .publish(&observation(Direction::Upstream, Slot::Modulation, "O01", &["4K"], 1.0))
            .unwrap();
        publisher
            .publish(&observation(Direction::Downstream, Slot::CodewordsCorrected, "05", &[], 120.0))
            .unwrap();
        publisher.set_up(true);

        let output = publisher.encode().unwrap();
        assert!(output.contains("fritzCable_downstream_center_frequency_hz{channel=\"05\"} 650000000"));
        assert!(output.contains("fritzCable_upstream_modulation{channel=\"O01\",modulation=\"4K\"} 1"));
        assert!(output.contains("# TYPE fritzCable_downstream_codewords_corrected_total counter"));
        assert!(output.contains("fritzCable_downstream_codewords_corrected_total{channel=\"05\"} 120"));
        assert!(output.contains("fritzCable_up 1"));
        assert!(output.contains("fritzCable_exporter_scrapes_total 1"));
        assert!(output.contains("fritzCable_exporter_build_info{version="));
    }

    #[test]
    fn test_begin_cycle_clears_channels() {
        let publisher = MetricsPublisher::new().unwrap();
        publisher.begin_cycle();
        publisher
            .publish(&observation(Direction::Upstream, Slot::PowerLevel, "03", &[], 44.0))
            .unwrap();
        assert!(publisher.encode().unwrap().contains("fritzCable_upstream_transmit_level_dbmv"));

        publisher.begin_cycle();
        let output = publisher.encode().unwrap();
        assert!(!output.contains("fritzCable_upstream_transmit_level_dbmv"));
        assert_eq!(publisher.scrapes_total(), 2);
    }

    #[test]
    fn test_counter_is_set_not_accumulated() {
        let publisher = MetricsPublisher::new().unwrap();
        let obs = observation(Direction::Downstream, Slot::CodewordsUncorrectable, "07", &[], 9.0);
        publisher.publish(&obs).unwrap();
        publisher.publish(&obs).unwrap();
        assert!(
            publisher
                .encode()
                .unwrap()
                .contains("fritzCable_downstream_codewords_uncorrectable_total{channel=\"07\"} 9")
        );
    }

    #[test]
    fn test_negative_counter_is_rejected() {
        let publisher = MetricsPublisher::new().unwrap();
        let obs = observation(Direction::Downstream, Slot::CodewordsCorrected, "07", &[], -1.0);
        assert!(matches!(publisher.publish(&obs), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_reserved_network_metrics_are_not_exposed() {
        let publisher = MetricsPublisher::new().unwrap();
        assert!(!publisher.encode().unwrap().contains("_network_"));
    }

    #[test]
    fn test_parse_errors_by_file() {
        let publisher = MetricsPublisher::new().unwrap();
        assert!(!publisher.encode().unwrap().contains("fritzCable_exporter_parse_errors_total{"));

        publisher.record_parse_error("docInfo");
        publisher.record_parse_error("docInfo");
        let output = publisher.encode().unwrap();
        assert!(output.contains("fritzCable_exporter_parse_errors_total{file=\"docInfo\"} 2"));
        assert!(!output.contains("file=\"login_sid.lua\""));
    }

    #[test]
    fn test_request_observer() {
        let publisher = MetricsPublisher::with_namespace("router").unwrap();
        publisher.observe(&Method::POST, StatusCode::OK, Duration::from_millis(20));

        let output = publisher.encode().unwrap();
        assert!(output.contains("router_exporter_client_requests_total{code=\"200\",method=\"post\"} 1"));
        assert!(output.contains("router_exporter_client_request_duration_seconds_count{code=\"200\",method=\"post\"} 1"));
    }
}
