//! DOCSIS channel statistics: payload decoding and per-channel extraction.

mod models;
mod rules;

pub use models::{ChannelRecord, ChannelSet, FeatureVisibility, decode};
pub use rules::{
    FieldParseError, InvalidField, Observation, OnError, Reading, Slot, SlotRule, channel_label,
    extract_observations, modulation_clear, parse_center_frequency, rules,
};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Downstream,
    Upstream,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Downstream, Direction::Upstream];

    /// Metric subsystem name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Downstream => "downstream",
            Direction::Upstream => "upstream",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel class of a group in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// DOCSIS 3.0 downstream
    ScQam,
    /// DOCSIS 3.1, both directions
    Ofdm,
    /// DOCSIS 3.0 upstream
    Atdma,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::ScQam => "SC-QAM",
            ChannelType::Ofdm => "OFDM",
            ChannelType::Atdma => "ATDMA",
        }
    }

    pub fn is_ofdm(&self) -> bool {
        matches!(self, ChannelType::Ofdm)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
