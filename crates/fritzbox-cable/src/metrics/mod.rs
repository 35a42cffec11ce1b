//! Prometheus exposition of channel observations and exporter health.

mod descriptors;
mod publisher;

pub use descriptors::{
    CHANNEL_DESCRIPTORS, CHANNEL_LABEL, ChannelDescriptor, INTERFACE_LABEL, MetricKind,
    NETWORK_METRICS, descriptor,
};
pub use publisher::{DEFAULT_NAMESPACE, MetricsPublisher};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;
