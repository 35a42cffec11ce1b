//! Static description of every channel metric the exporter can emit.

use std::sync::LazyLock;

use crate::channel::{Direction, Slot};

/// Label carried by every channel metric.
pub const CHANNEL_LABEL: &str = "channel";

/// Label of the reserved network metrics.
pub const INTERFACE_LABEL: &str = "interface";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub direction: Direction,
    pub slot: Slot,
    /// Name below the direction subsystem, e.g. `center_frequency_hz`.
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// Label following `channel`, if any.
    pub extra_label: Option<&'static str>,
}

impl ChannelDescriptor {
    pub fn label_names(&self) -> Vec<&'static str> {
        std::iter::once(CHANNEL_LABEL).chain(self.extra_label).collect()
    }
}

const fn gauge(
    direction: Direction,
    slot: Slot,
    name: &'static str,
    help: &'static str,
) -> ChannelDescriptor {
    ChannelDescriptor {
        direction,
        slot,
        name,
        help,
        kind: MetricKind::Gauge,
        extra_label: None,
    }
}

const fn labeled(
    direction: Direction,
    slot: Slot,
    name: &'static str,
    help: &'static str,
    label: &'static str,
) -> ChannelDescriptor {
    ChannelDescriptor {
        extra_label: Some(label),
        ..gauge(direction, slot, name, help)
    }
}

const fn counter(
    direction: Direction,
    slot: Slot,
    name: &'static str,
    help: &'static str,
) -> ChannelDescriptor {
    ChannelDescriptor {
        kind: MetricKind::Counter,
        ..gauge(direction, slot, name, help)
    }
}

/// All channel descriptors, downstream first.
pub static CHANNEL_DESCRIPTORS: LazyLock<Vec<ChannelDescriptor>> = LazyLock::new(|| {
    use Direction::{Downstream as Down, Upstream as Up};

    vec![
        gauge(Down, Slot::Locked, "locked", "Downstream Lock Status"),
        labeled(Down, Slot::ChannelType, "channel_type", "Downstream Channel Type", "type"),
        gauge(Down, Slot::Bonded, "bonded", "Downstream Bonding Status"),
        gauge(Down, Slot::CenterFrequency, "center_frequency_hz", "Downstream Center Frequency"),
        gauge(Down, Slot::Width, "width_hz", "Downstream Width"),
        gauge(Down, Slot::SnrThreshold, "snr_threshold_db", "Downstream SNR/MER Threshold Value"),
        gauge(Down, Slot::PowerLevel, "receive_level_dbmv", "Downstream Receive Level"),
        labeled(Down, Slot::Modulation, "modulation", "Downstream Modulation/Profile ID", "modulation"),
        counter(Down, Slot::CodewordsUnerrored, "codewords_unerrored_total", "Downstream Unerrored Codewords"),
        counter(Down, Slot::CodewordsCorrected, "codewords_corrected_total", "Downstream Corrected Codewords"),
        counter(
            Down,
            Slot::CodewordsUncorrectable,
            "codewords_uncorrectable_total",
            "Downstream Uncorrectable Codewords",
        ),
        gauge(Down, Slot::Latency, "latency", "Downstream latency"),
        gauge(Down, Slot::ModulationClear, "modulation_clear", "Downstream Modulation in clear value"),
        gauge(Up, Slot::Locked, "locked", "Upstream Lock Status"),
        labeled(Up, Slot::ChannelType, "channel_type", "Upstream Channel Type", "type"),
        gauge(Up, Slot::Bonded, "bonded", "Upstream Bonding Status"),
        gauge(Up, Slot::CenterFrequency, "center_frequency_hz", "Upstream Center Frequency"),
        gauge(Up, Slot::Width, "width_hz", "Upstream Width"),
        gauge(Up, Slot::PowerLevel, "transmit_level_dbmv", "Upstream Transmit Level"),
        labeled(Up, Slot::Modulation, "modulation", "Upstream Modulation/Profile ID", "modulation"),
        gauge(Up, Slot::ModulationClear, "modulation_clear", "Upstream Modulation in clear value"),
    ]
});

/// Network interface counters. Registered for compatibility, never populated.
pub const NETWORK_METRICS: [(&str, &str); 8] = [
    ("receive_bytes_total", "Received bytes per interface"),
    ("receive_packets_total", "Received packets per interface"),
    ("receive_errs_total", "Receive errors per interface"),
    ("receive_drop_total", "Dropped received packets per interface"),
    ("transmit_bytes_total", "Transmitted bytes per interface"),
    ("transmit_packets_total", "Transmitted packets per interface"),
    ("transmit_errs_total", "Transmit errors per interface"),
    ("transmit_drop_total", "Dropped transmitted packets per interface"),
];

pub fn descriptor(direction: Direction, slot: Slot) -> Option<&'static ChannelDescriptor> {
    CHANNEL_DESCRIPTORS
        .iter()
        .find(|d| d.direction == direction && d.slot == slot)
}
