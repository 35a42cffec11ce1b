//! Wire model of the `docInfo` page.
//!
//! The router is loose with JSON types (numbers arrive as strings and the
//! other way round, arrays may be `null`), so the channel fields are decoded
//! leniently instead of failing the whole payload.

use serde::{Deserialize, Deserializer};

use super::{ChannelType, Direction};
use crate::error::{Error, Result};
use crate::fetch::DOC_INFO_PAGE;

/// One DOCSIS channel as reported by the router.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChannelRecord {
    /// Channel index used in labels.
    #[serde(rename = "channelID", deserialize_with = "deserialize_i64")]
    pub channel_id: i64,
    /// Position of the channel in the router's table.
    #[serde(rename = "channel", deserialize_with = "deserialize_i64")]
    pub position: i64,
    /// MHz, or `"<low> - <high>"` for OFDM channels.
    #[serde(deserialize_with = "deserialize_text")]
    pub frequency: String,
    #[serde(rename = "corrErrors", deserialize_with = "deserialize_i64")]
    pub corrected_errors: i64,
    #[serde(rename = "nonCorrErrors", deserialize_with = "deserialize_i64")]
    pub uncorrected_errors: i64,
    /// dBmV
    #[serde(rename = "powerLevel", deserialize_with = "deserialize_text")]
    pub power_level: String,
    /// Modulation error ratio in dB.
    #[serde(rename = "mse", deserialize_with = "deserialize_text")]
    pub mer: String,
    /// Modulation or profile, e.g. `256QAM` or `4K`.
    #[serde(rename = "type", deserialize_with = "deserialize_text")]
    pub modulation: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub multiplex: String,
    #[serde(rename = "latency", deserialize_with = "deserialize_f64")]
    pub latency_ms: f64,
}

/// Menu visibility flags the page carries along. Decoded but not exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureVisibility {
    pub chan: bool,
    pub dect_mail: bool,
    pub dect_moni: bool,
    pub dect_moni_ex: bool,
    pub dvb_set: bool,
    pub dvb_sig: bool,
    #[serde(rename = "dvbradio")]
    pub dvb_radio: bool,
    pub fax_set: bool,
    pub live_img: bool,
    pub live_tv: bool,
    pub mobile: bool,
    pub rss: bool,
    pub share_usb: bool,
    pub sso_set: bool,
    #[serde(rename = "tvhd")]
    pub tv_hd: bool,
    #[serde(rename = "tvsd")]
    pub tv_sd: bool,
    pub w_guest: bool,
    pub w_key: bool,
    #[serde(rename = "wlanmesh")]
    pub wlan_mesh: bool,
    pub wps: bool,
}

/// The decoded statistics payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSet {
    pub downstream_sc_qam: Vec<ChannelRecord>,
    pub downstream_ofdm: Vec<ChannelRecord>,
    pub upstream_atdma: Vec<ChannelRecord>,
    pub upstream_ofdm: Vec<ChannelRecord>,
    pub oem: String,
    pub pid: String,
    pub sid: String,
    pub hide: FeatureVisibility,
}

impl ChannelSet {
    /// Channel groups in publishing order.
    pub fn groups(&self) -> [(Direction, ChannelType, &[ChannelRecord]); 4] {
        [
            (
                Direction::Downstream,
                ChannelType::ScQam,
                self.downstream_sc_qam.as_slice(),
            ),
            (
                Direction::Downstream,
                ChannelType::Ofdm,
                self.downstream_ofdm.as_slice(),
            ),
            (
                Direction::Upstream,
                ChannelType::Atdma,
                self.upstream_atdma.as_slice(),
            ),
            (
                Direction::Upstream,
                ChannelType::Ofdm,
                self.upstream_ofdm.as_slice(),
            ),
        ]
    }

    pub fn channel_count(&self) -> usize {
        self.groups().iter().map(|(_, _, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channel_count() == 0
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocInfoPage {
    #[serde(deserialize_with = "null_as_default")]
    data: DocInfoData,
    #[serde(deserialize_with = "null_as_default")]
    hide: FeatureVisibility,
    #[serde(deserialize_with = "deserialize_text")]
    pid: String,
    #[serde(deserialize_with = "deserialize_text")]
    sid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocInfoData {
    #[serde(rename = "channelDs", deserialize_with = "null_as_default")]
    downstream: DocsisChannels,
    #[serde(rename = "channelUs", deserialize_with = "null_as_default")]
    upstream: DocsisChannels,
    #[serde(deserialize_with = "deserialize_text")]
    oem: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocsisChannels {
    #[serde(deserialize_with = "null_as_default")]
    docsis30: Vec<ChannelRecord>,
    #[serde(deserialize_with = "null_as_default")]
    docsis31: Vec<ChannelRecord>,
}

/// Decode a raw `docInfo` payload.
pub fn decode(payload: &[u8]) -> Result<ChannelSet> {
    let page: DocInfoPage =
        serde_json::from_slice(payload).map_err(|e| Error::decode(DOC_INFO_PAGE, e))?;

    let DocInfoPage {
        data,
        hide,
        pid,
        sid,
    } = page;

    Ok(ChannelSet {
        downstream_sc_qam: data.downstream.docsis30,
        downstream_ofdm: data.downstream.docsis31,
        upstream_atdma: data.upstream.docsis30,
        upstream_ofdm: data.upstream.docsis31,
        oem: data.oem,
        pid,
        sid,
        hide,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts strings, numbers, booleans and null; numbers are rendered as text.
fn deserialize_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string, number or null")
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_string<E>(self, v: String) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v)
        }

        fn visit_none<E>(self) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }

        fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }

        fn visit_bool<E>(self, v: bool) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(TextVisitor)
}

/// Accepts integers, integral floats, numeric strings and null (as 0).
fn deserialize_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct IntVisitor;

    impl<'de> Visitor<'de> for IntVisitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an integer or a numeric string")
        }

        fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v)
        }

        fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            i64::try_from(v).map_err(|_| E::custom(format!("integer {v} out of range")))
        }

        fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v.fract() == 0.0 && v.is_finite() {
                Ok(v as i64)
            } else {
                Err(E::custom(format!("expected an integer, got {v}")))
            }
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let v = v.trim();
            if v.is_empty() {
                return Ok(0);
            }
            v.parse()
                .map_err(|_| E::custom(format!("expected an integer, got {v:?}")))
        }

        fn visit_none<E>(self) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(0)
        }

        fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(0)
        }
    }

    deserializer.deserialize_any(IntVisitor)
}

/// Accepts numbers, numeric strings and null (as 0.0).
fn deserialize_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number or a numeric string")
        }

        fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v as f64)
        }

        fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(v as f64)
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let v = v.trim();
            if v.is_empty() {
                return Ok(0.0);
            }
            v.parse()
                .map_err(|_| E::custom(format!("expected a number, got {v:?}")))
        }

        fn visit_none<E>(self) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(0.0)
        }

        fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(FloatVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "pid": "docInfo",
        "hide": {"chan": false, "shareUsb": true, "liveTv": true, "dvbradio": true},
        "sid": "9a8b7c6d5e4f3a2b",
        "data": {
            "oem": "avm",
            "channelDs": {
                "docsis30": [
                    {"type": "256QAM", "corrErrors": 12, "mse": "-37.6", "powerLevel": "5.3",
                     "channel": 1, "nonCorrErrors": 3, "latency": 0.32, "channelID": 8, "frequency": "602"},
                    {"type": "256QAM", "corrErrors": "4", "mse": "-38.2", "powerLevel": 4.9,
                     "channel": 2, "nonCorrErrors": 0, "latency": "0.32", "channelID": 9, "frequency": 610}
                ],
                "docsis31": [
                    {"type": "4K", "powerLevel": "7.1", "channel": 1, "channelID": 33,
                     "frequency": "751 - 861", "corrErrors": 9001, "nonCorrErrors": 17, "latency": 0.2}
                ]
            },
            "channelUs": {
                "docsis30": [
                    {"type": "64QAM", "powerLevel": "44.0", "channel": 1, "channelID": 2,
                     "frequency": "51", "multiplex": "ATDMA"}
                ],
                "docsis31": null
            }
        }
    }"#;

    #[test]
    fn test_decode_full_payload() {
        let set = decode(PAYLOAD.as_bytes()).unwrap();
        assert_eq!(set.downstream_sc_qam.len(), 2);
        assert_eq!(set.downstream_ofdm.len(), 1);
        assert_eq!(set.upstream_atdma.len(), 1);
        assert!(set.upstream_ofdm.is_empty());
        assert_eq!(set.channel_count(), 4);
        assert_eq!(set.oem, "avm");
        assert_eq!(set.pid, "docInfo");
        assert!(set.hide.share_usb);
        assert!(set.hide.dvb_radio);
        assert!(!set.hide.wps);

        let first = &set.downstream_sc_qam[0];
        assert_eq!(first.channel_id, 8);
        assert_eq!(first.position, 1);
        assert_eq!(first.frequency, "602");
        assert_eq!(first.mer, "-37.6");
        assert_eq!(first.corrected_errors, 12);
        assert_eq!(first.uncorrected_errors, 3);
        assert_eq!(first.latency_ms, 0.32);
    }

    #[test]
    fn test_lenient_field_types() {
        let set = decode(PAYLOAD.as_bytes()).unwrap();
        let second = &set.downstream_sc_qam[1];
        assert_eq!(second.corrected_errors, 4);
        assert_eq!(second.power_level, "4.9");
        assert_eq!(second.frequency, "610");
        assert_eq!(second.latency_ms, 0.32);

        let ofdm = &set.downstream_ofdm[0];
        assert_eq!(ofdm.mer, "");
        assert_eq!(ofdm.modulation, "4K");
        assert_eq!(set.upstream_atdma[0].multiplex, "ATDMA");
    }

    #[test]
    fn test_decode_empty_object() {
        let set = decode(b"{}").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.hide, FeatureVisibility::default());
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode(b"<html>login required</html>").unwrap_err();
        assert!(matches!(err, Error::Decode { document: "docInfo", .. }));
    }

    #[test]
    fn test_non_numeric_counter_is_rejected() {
        let payload = r#"{"data": {"channelDs": {"docsis30": [{"channelID": 1, "corrErrors": "many"}]}}}"#;
        assert!(decode(payload.as_bytes()).is_err());
    }

    #[test]
    fn test_groups_order() {
        let set = decode(PAYLOAD.as_bytes()).unwrap();
        let order: Vec<_> = set.groups().iter().map(|(d, t, _)| (*d, *t)).collect();
        assert_eq!(
            order,
            vec![
                (Direction::Downstream, ChannelType::ScQam),
                (Direction::Downstream, ChannelType::Ofdm),
                (Direction::Upstream, ChannelType::Atdma),
                (Direction::Upstream, ChannelType::Ofdm),
            ]
        );
    }
}
