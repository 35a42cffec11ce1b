//! Per-slot extraction rules.
//!
//! Every metric slot of a channel is described by a [`SlotRule`]: the function
//! reading the value from a [`ChannelRecord`] and what happens when the field
//! does not parse. The tables are the only place that knows which slots exist
//! for which direction.

use std::fmt;

use super::{ChannelRecord, ChannelType, Direction};

/// Factor from the MHz the router reports to Hz.
const HZ_PER_MHZ: f64 = 1_000_000.0;

/// OFDM channels report their frequency as `"<low> - <high>"`.
const RANGE_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Locked,
    ChannelType,
    Bonded,
    CenterFrequency,
    Width,
    SnrThreshold,
    PowerLevel,
    Modulation,
    CodewordsUnerrored,
    CodewordsCorrected,
    CodewordsUncorrectable,
    Latency,
    ModulationClear,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Locked => "locked",
            Slot::ChannelType => "channel_type",
            Slot::Bonded => "bonded",
            Slot::CenterFrequency => "center_frequency",
            Slot::Width => "width",
            Slot::SnrThreshold => "snr_threshold",
            Slot::PowerLevel => "power_level",
            Slot::Modulation => "modulation",
            Slot::CodewordsUnerrored => "codewords_unerrored",
            Slot::CodewordsCorrected => "codewords_corrected",
            Slot::CodewordsUncorrectable => "codewords_uncorrectable",
            Slot::Latency => "latency",
            Slot::ModulationClear => "modulation_clear",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a slot's field cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    /// Skip the slot and report a [`FieldParseError`].
    Report,
    /// OFDM channels emit 0 silently, all others report.
    ZeroForOfdm,
    /// Emit 0 silently.
    Zero,
}

/// Value read from a channel for one slot, plus its extra label if the slot has one.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub label: Option<String>,
}

impl Reading {
    fn value(value: f64) -> Self {
        Self { value, label: None }
    }

    fn labeled(label: impl Into<String>) -> Self {
        Self {
            value: 1.0,
            label: Some(label.into()),
        }
    }
}

/// A field that did not hold a number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} {value:?}")]
pub struct InvalidField {
    pub field: &'static str,
    pub value: String,
}

impl InvalidField {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_owned(),
        }
    }
}

type Extract = fn(ChannelType, &ChannelRecord) -> Result<Reading, InvalidField>;

pub struct SlotRule {
    pub slot: Slot,
    extract: Extract,
    pub on_error: OnError,
}

impl SlotRule {
    const fn new(slot: Slot, extract: Extract, on_error: OnError) -> Self {
        Self {
            slot,
            extract,
            on_error,
        }
    }

    pub fn read(&self, channel_type: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
        (self.extract)(channel_type, record)
    }
}

impl fmt::Debug for SlotRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotRule")
            .field("slot", &self.slot)
            .field("on_error", &self.on_error)
            .finish()
    }
}

const DOWNSTREAM_RULES: &[SlotRule] = &[
    SlotRule::new(Slot::Locked, constant_one, OnError::Report),
    SlotRule::new(Slot::ChannelType, channel_type_label, OnError::Report),
    SlotRule::new(Slot::Bonded, constant_one, OnError::Report),
    SlotRule::new(Slot::CenterFrequency, center_frequency, OnError::Report),
    SlotRule::new(Slot::Width, constant_zero, OnError::Report),
    SlotRule::new(Slot::SnrThreshold, mer, OnError::ZeroForOfdm),
    SlotRule::new(Slot::PowerLevel, power_level, OnError::Report),
    SlotRule::new(Slot::Modulation, modulation_label, OnError::Report),
    SlotRule::new(Slot::CodewordsUnerrored, constant_zero, OnError::Report),
    SlotRule::new(Slot::CodewordsCorrected, corrected_errors, OnError::Report),
    SlotRule::new(Slot::CodewordsUncorrectable, uncorrected_errors, OnError::Report),
    SlotRule::new(Slot::Latency, latency, OnError::Report),
    SlotRule::new(Slot::ModulationClear, modulation_clear_value, OnError::Zero),
];

const UPSTREAM_RULES: &[SlotRule] = &[
    SlotRule::new(Slot::Locked, constant_one, OnError::Report),
    SlotRule::new(Slot::ChannelType, channel_type_label, OnError::Report),
    SlotRule::new(Slot::Bonded, constant_one, OnError::Report),
    SlotRule::new(Slot::CenterFrequency, center_frequency, OnError::Report),
    SlotRule::new(Slot::Width, constant_zero, OnError::Report),
    SlotRule::new(Slot::PowerLevel, power_level, OnError::Report),
    SlotRule::new(Slot::Modulation, modulation_label, OnError::Report),
    SlotRule::new(Slot::ModulationClear, modulation_clear_value, OnError::Zero),
];

/// Extraction rules for `direction`, in emission order.
pub fn rules(direction: Direction) -> &'static [SlotRule] {
    match direction {
        Direction::Downstream => DOWNSTREAM_RULES,
        Direction::Upstream => UPSTREAM_RULES,
    }
}

// Lock and bonding state are not reported by the router.
fn constant_one(_: ChannelType, _: &ChannelRecord) -> Result<Reading, InvalidField> {
    Ok(Reading::value(1.0))
}

fn constant_zero(_: ChannelType, _: &ChannelRecord) -> Result<Reading, InvalidField> {
    Ok(Reading::value(0.0))
}

fn channel_type_label(channel_type: ChannelType, _: &ChannelRecord) -> Result<Reading, InvalidField> {
    Ok(Reading::labeled(channel_type.as_str()))
}

fn modulation_label(_: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    Ok(Reading::labeled(record.modulation.as_str()))
}

fn center_frequency(channel_type: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    parse_center_frequency(channel_type, &record.frequency).map(Reading::value)
}

fn mer(_: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    parse_number("mse", &record.mer).map(Reading::value)
}

fn power_level(_: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    parse_number("powerLevel", &record.power_level).map(Reading::value)
}

fn corrected_errors(_: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    Ok(Reading::value(record.corrected_errors as f64))
}

fn uncorrected_errors(_: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    Ok(Reading::value(record.uncorrected_errors as f64))
}

fn latency(_: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    Ok(Reading::value(record.latency_ms))
}

fn modulation_clear_value(_: ChannelType, record: &ChannelRecord) -> Result<Reading, InvalidField> {
    modulation_clear(&record.modulation).map(|v| Reading::value(v as f64))
}

/// Finite decimal number. `NaN` and infinities are rejected.
fn parse_number(field: &'static str, raw: &str) -> Result<f64, InvalidField> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| InvalidField::new(field, raw))
}

/// Label identifying a channel across all of its metrics: the index padded to
/// two digits, prefixed with `O` for OFDM channels.
pub fn channel_label(channel_type: ChannelType, channel_id: i64) -> String {
    if channel_type.is_ofdm() {
        format!("O{channel_id:02}")
    } else {
        format!("{channel_id:02}")
    }
}

/// Center frequency in Hz. OFDM channels use the lower bound of their range.
pub fn parse_center_frequency(channel_type: ChannelType, raw: &str) -> Result<f64, InvalidField> {
    let mhz = if channel_type.is_ofdm() {
        raw.split(RANGE_SEPARATOR).next().unwrap_or(raw)
    } else {
        raw
    };
    match parse_number("frequency", mhz) {
        Ok(mhz) if mhz >= 0.0 => Ok((mhz * HZ_PER_MHZ).round()),
        _ => Err(InvalidField::new("frequency", raw)),
    }
}

/// Numeric modulation order: `256QAM` is 256, `4K` / `4KQAM` is 4096.
pub fn modulation_clear(modulation: &str) -> Result<i64, InvalidField> {
    let token = modulation.replace("QAM", "");
    let (token, factor) = if token.contains('K') {
        (token.replace('K', ""), 1024)
    } else {
        (token, 1)
    };

    token
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|v| v.checked_mul(factor))
        .ok_or_else(|| InvalidField::new("type", modulation))
}

/// One value of one channel metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub direction: Direction,
    pub slot: Slot,
    pub channel: String,
    pub extra_labels: Vec<String>,
    pub value: f64,
}

impl Observation {
    /// Label values in descriptor order: channel first, then the extra labels.
    pub fn label_values(&self) -> Vec<&str> {
        std::iter::once(self.channel.as_str())
            .chain(self.extra_labels.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{direction} channel {channel}: cannot parse {slot} from {field}={value:?}")]
pub struct FieldParseError {
    pub direction: Direction,
    pub slot: Slot,
    pub channel: String,
    pub field: &'static str,
    pub value: String,
}

/// Apply every rule of `direction` to one channel.
///
/// Each slot stands alone: a field that fails to parse only affects its own
/// slot.
pub fn extract_observations(
    channel_type: ChannelType,
    direction: Direction,
    record: &ChannelRecord,
) -> Vec<Result<Observation, FieldParseError>> {
    let channel = channel_label(channel_type, record.channel_id);

    rules(direction)
        .iter()
        .map(|rule| {
            let reading = match rule.read(channel_type, record) {
                Ok(reading) => reading,
                Err(invalid) => match rule.on_error {
                    OnError::Zero => Reading::value(0.0),
                    OnError::ZeroForOfdm if channel_type.is_ofdm() => Reading::value(0.0),
                    OnError::Report | OnError::ZeroForOfdm => {
                        return Err(FieldParseError {
                            direction,
                            slot: rule.slot,
                            channel: channel.clone(),
                            field: invalid.field,
                            value: invalid.value,
                        });
                    }
                },
            };

            Ok(Observation {
                direction,
                slot: rule.slot,
                channel: channel.clone(),
                extra_labels: reading.label.into_iter().collect(),
                value: reading.value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sc_qam() -> ChannelRecord {
        ChannelRecord {
            channel_id: 5,
            position: 1,
            frequency: "650".into(),
            corrected_errors: 120,
            uncorrected_errors: 7,
            power_level: "3.4".into(),
            mer: "38.6".into(),
            modulation: "256QAM".into(),
            multiplex: String::new(),
            latency_ms: 0.32,
        }
    }

    fn find(observations: &[Result<Observation, FieldParseError>], slot: Slot) -> Option<&Observation> {
        observations
            .iter()
            .filter_map(|o| o.as_ref().ok())
            .find(|o| o.slot == slot)
    }

    #[rstest]
    #[case(ChannelType::ScQam, 5, "05")]
    #[case(ChannelType::Ofdm, 5, "O05")]
    #[case(ChannelType::Atdma, 12, "12")]
    #[case(ChannelType::Ofdm, 159, "O159")]
    fn test_channel_label(#[case] channel_type: ChannelType, #[case] id: i64, #[case] expected: &str) {
        assert_eq!(channel_label(channel_type, id), expected);
    }

    #[rstest]
    #[case(ChannelType::ScQam, "650", 650_000_000.0)]
    #[case(ChannelType::Atdma, " 51 ", 51_000_000.0)]
    #[case(ChannelType::Atdma, "30.8", 30_800_000.0)]
    #[case(ChannelType::Ofdm, "751 - 861", 751_000_000.0)]
    #[case(ChannelType::Ofdm, "500000000 - 600000000", 500_000_000_000_000.0)]
    fn test_center_frequency(#[case] channel_type: ChannelType, #[case] raw: &str, #[case] expected: f64) {
        assert_eq!(parse_center_frequency(channel_type, raw).unwrap(), expected);
    }

    #[rstest]
    #[case(ChannelType::ScQam, "751 - 861")]
    #[case(ChannelType::Ofdm, "")]
    #[case(ChannelType::ScQam, "NaN")]
    #[case(ChannelType::Atdma, "inf")]
    #[case(ChannelType::Ofdm, "-inf - 861")]
    #[case(ChannelType::ScQam, "-650")]
    fn test_center_frequency_invalid(#[case] channel_type: ChannelType, #[case] raw: &str) {
        let err = parse_center_frequency(channel_type, raw).unwrap_err();
        assert_eq!(err.field, "frequency");
        assert_eq!(err.value, raw);
    }

    #[test]
    fn test_non_finite_frequency_is_reported() {
        let record = ChannelRecord {
            frequency: "NaN".into(),
            power_level: "inf".into(),
            ..sc_qam()
        };
        let observations = extract_observations(ChannelType::ScQam, Direction::Downstream, &record);
        let failed: Vec<Slot> = observations
            .iter()
            .filter_map(|o| o.as_ref().err())
            .map(|e| e.slot)
            .collect();
        assert_eq!(failed, vec![Slot::CenterFrequency, Slot::PowerLevel]);
    }

    #[rstest]
    #[case("256QAM", 256)]
    #[case("64QAM", 64)]
    #[case("4KQAM", 4096)]
    #[case("4K", 4096)]
    #[case("16KQAM", 16384)]
    fn test_modulation_clear(#[case] modulation: &str, #[case] expected: i64) {
        assert_eq!(modulation_clear(modulation).unwrap(), expected);
    }

    #[rstest]
    #[case("OFDMA")]
    #[case("")]
    #[case("99999999999999999KQAM")]
    #[case("9223372036854775807K")]
    fn test_modulation_clear_unparseable(#[case] modulation: &str) {
        let err = modulation_clear(modulation).unwrap_err();
        assert_eq!(err.value, modulation);
    }

    #[test]
    fn test_overflowing_modulation_is_silently_zero() {
        let record = ChannelRecord {
            modulation: "99999999999999999KQAM".into(),
            ..sc_qam()
        };
        let observations = extract_observations(ChannelType::ScQam, Direction::Downstream, &record);
        assert!(observations.iter().all(Result::is_ok));
        assert_eq!(find(&observations, Slot::ModulationClear).unwrap().value, 0.0);
    }

    #[test]
    fn test_downstream_sc_qam_observations() {
        let observations = extract_observations(ChannelType::ScQam, Direction::Downstream, &sc_qam());
        assert_eq!(observations.len(), 13);
        assert!(observations.iter().all(Result::is_ok));

        let freq = find(&observations, Slot::CenterFrequency).unwrap();
        assert_eq!(freq.channel, "05");
        assert_eq!(freq.value, 650_000_000.0);

        let channel_type = find(&observations, Slot::ChannelType).unwrap();
        assert_eq!(channel_type.extra_labels, vec!["SC-QAM".to_string()]);
        assert_eq!(channel_type.label_values(), vec!["05", "SC-QAM"]);

        let modulation = find(&observations, Slot::Modulation).unwrap();
        assert_eq!(modulation.extra_labels, vec!["256QAM".to_string()]);
        assert_eq!(modulation.value, 1.0);

        assert_eq!(find(&observations, Slot::SnrThreshold).unwrap().value, 38.6);
        assert_eq!(find(&observations, Slot::PowerLevel).unwrap().value, 3.4);
        assert_eq!(find(&observations, Slot::CodewordsUnerrored).unwrap().value, 0.0);
        assert_eq!(find(&observations, Slot::CodewordsCorrected).unwrap().value, 120.0);
        assert_eq!(find(&observations, Slot::CodewordsUncorrectable).unwrap().value, 7.0);
        assert_eq!(find(&observations, Slot::Latency).unwrap().value, 0.32);
        assert_eq!(find(&observations, Slot::ModulationClear).unwrap().value, 256.0);
        assert_eq!(find(&observations, Slot::Locked).unwrap().value, 1.0);
        assert_eq!(find(&observations, Slot::Bonded).unwrap().value, 1.0);
        assert_eq!(find(&observations, Slot::Width).unwrap().value, 0.0);
    }

    #[test]
    fn test_upstream_has_no_downstream_only_slots() {
        let observations = extract_observations(ChannelType::Atdma, Direction::Upstream, &sc_qam());
        assert_eq!(observations.len(), 8);
        for slot in [
            Slot::SnrThreshold,
            Slot::CodewordsCorrected,
            Slot::CodewordsUncorrectable,
            Slot::CodewordsUnerrored,
            Slot::Latency,
        ] {
            assert!(find(&observations, slot).is_none(), "{slot} must not be upstream");
        }
        assert_eq!(find(&observations, Slot::PowerLevel).unwrap().value, 3.4);
    }

    #[test]
    fn test_ofdm_mer_failure_is_tolerated() {
        let record = ChannelRecord {
            mer: String::new(),
            frequency: "751 - 861".into(),
            modulation: "4K".into(),
            ..sc_qam()
        };
        let observations = extract_observations(ChannelType::Ofdm, Direction::Downstream, &record);
        assert!(observations.iter().all(Result::is_ok));

        let snr = find(&observations, Slot::SnrThreshold).unwrap();
        assert_eq!(snr.value, 0.0);
        assert_eq!(snr.channel, "O05");
        assert_eq!(find(&observations, Slot::ModulationClear).unwrap().value, 4096.0);
    }

    #[test]
    fn test_sc_qam_mer_failure_is_reported() {
        let record = ChannelRecord {
            mer: "n/a".into(),
            ..sc_qam()
        };
        let observations = extract_observations(ChannelType::ScQam, Direction::Downstream, &record);
        let errors: Vec<_> = observations.iter().filter_map(|o| o.as_ref().err()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].slot, Slot::SnrThreshold);
        assert_eq!(errors[0].field, "mse");
        assert_eq!(errors[0].value, "n/a");
        assert!(find(&observations, Slot::SnrThreshold).is_none());
        // Other slots of the same channel are unaffected.
        assert_eq!(observations.iter().filter(|o| o.is_ok()).count(), 12);
    }

    #[test]
    fn test_bad_frequency_and_power_are_reported_independently() {
        let record = ChannelRecord {
            frequency: "abc".into(),
            power_level: String::new(),
            ..sc_qam()
        };
        let observations = extract_observations(ChannelType::Atdma, Direction::Upstream, &record);
        let failed: Vec<Slot> = observations
            .iter()
            .filter_map(|o| o.as_ref().err())
            .map(|e| e.slot)
            .collect();
        assert_eq!(failed, vec![Slot::CenterFrequency, Slot::PowerLevel]);
        assert_eq!(observations.len(), 8);
    }

    #[test]
    fn test_unparseable_modulation_is_silently_zero() {
        let record = ChannelRecord {
            modulation: "OFDMA".into(),
            ..sc_qam()
        };
        let observations = extract_observations(ChannelType::Ofdm, Direction::Upstream, &record);
        assert!(observations.iter().all(Result::is_ok));
        assert_eq!(find(&observations, Slot::ModulationClear).unwrap().value, 0.0);
        assert_eq!(
            find(&observations, Slot::Modulation).unwrap().extra_labels,
            vec!["OFDMA".to_string()]
        );
    }

    #[test]
    fn test_field_parse_error_message() {
        let err = FieldParseError {
            direction: Direction::Downstream,
            slot: Slot::PowerLevel,
            channel: "O33".into(),
            field: "powerLevel",
            value: "-".into(),
        };
        assert_eq!(
            err.to_string(),
            "downstream channel O33: cannot parse power_level from powerLevel=\"-\""
        );
    }
}
