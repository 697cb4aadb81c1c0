use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AnalysisError;

// ---------------------------------------------------------------------------
// Channel – the closed set of signals a scan point carries
// ---------------------------------------------------------------------------

/// Signal kinds of one scan point: eight recorded channels plus three
/// vibration/reference transfer functions derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Disp,
    Vib,
    Acc,
    Ref1,
    Ref2,
    Ref3,
    H1VibRef1,
    H2VibRef1,
    VibRef1,
    VibRef2,
    VibRef3,
}

/// How a channel's linear graph is obtained from the recorded records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Position of the record within the 8 records of a scan point.
    Recorded(usize),
    Quotient { numerator: Channel, denominator: Channel },
}

struct ChannelSpec {
    channel: Channel,
    key: &'static str,
    description: &'static str,
    source: Source,
    squared_units: bool,
}

const fn recorded(
    channel: Channel,
    key: &'static str,
    description: &'static str,
    index: usize,
    squared_units: bool,
) -> ChannelSpec {
    ChannelSpec {
        channel,
        key,
        description,
        source: Source::Recorded(index),
        squared_units,
    }
}

const fn quotient(
    channel: Channel,
    key: &'static str,
    description: &'static str,
    numerator: Channel,
    denominator: Channel,
) -> ChannelSpec {
    ChannelSpec {
        channel,
        key,
        description,
        source: Source::Quotient {
            numerator,
            denominator,
        },
        squared_units: false,
    }
}

const CHANNEL_TABLE: [ChannelSpec; 11] = [
    recorded(Channel::Disp, "disp", "Vib Displacement", 0, false),
    recorded(Channel::Vib, "vib", "Vib Velocity", 1, false),
    recorded(Channel::Acc, "acc", "Vib Acceleration", 2, true),
    recorded(Channel::Ref1, "ref1", "Ref1 Sound Pressure", 3, false),
    recorded(Channel::Ref2, "ref2", "Ref2 Voltage", 4, false),
    recorded(Channel::Ref3, "ref3", "Ref3 Voltage", 5, false),
    recorded(Channel::H1VibRef1, "h1vibref1", "H1 Vib & Ref1", 6, false),
    recorded(Channel::H2VibRef1, "h2vibref1", "H2 Vib & Ref1", 7, false),
    quotient(Channel::VibRef1, "vibref1", "Vib / Ref1", Channel::Vib, Channel::Ref1),
    quotient(Channel::VibRef2, "vibref2", "Vib / Ref2", Channel::Vib, Channel::Ref2),
    quotient(Channel::VibRef3, "vibref3", "Vib / Ref3", Channel::Vib, Channel::Ref3),
];

/// Number of channel records that make up one scan point.
pub const RECORDS_PER_POINT: usize = 8;

impl Channel {
    pub const ALL: [Channel; 11] = [
        Channel::Disp,
        Channel::Vib,
        Channel::Acc,
        Channel::Ref1,
        Channel::Ref2,
        Channel::Ref3,
        Channel::H1VibRef1,
        Channel::H2VibRef1,
        Channel::VibRef1,
        Channel::VibRef2,
        Channel::VibRef3,
    ];

    /// Recorded channels in file order.
    pub const RECORDED: [Channel; RECORDS_PER_POINT] = [
        Channel::Disp,
        Channel::Vib,
        Channel::Acc,
        Channel::Ref1,
        Channel::Ref2,
        Channel::Ref3,
        Channel::H1VibRef1,
        Channel::H2VibRef1,
    ];

    fn spec(self) -> &'static ChannelSpec {
        &CHANNEL_TABLE[self.index()]
    }

    /// Position in [`Channel::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn description(self) -> &'static str {
        self.spec().description
    }

    pub fn source(self) -> Source {
        self.spec().source
    }

    /// Acceleration is a power-like quantity and uses `10·log10`.
    pub fn squared_units(self) -> bool {
        self.spec().squared_units
    }

    pub fn is_quotient(self) -> bool {
        matches!(self.source(), Source::Quotient { .. })
    }

    /// Transfer-function channel computed as `numerator / denominator`, if any.
    pub fn quotient_of(numerator: Channel, denominator: Channel) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| {
            c.source()
                == Source::Quotient {
                    numerator,
                    denominator,
                }
        })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Channel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Channel::ALL
            .into_iter()
            .find(|c| c.key() == wanted)
            .ok_or_else(|| AnalysisError::UnknownChannelKey(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Unit mode and the combined channel key
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    Linear,
    Decibel,
}

/// A channel together with its unit mode, written `vib` or `vib_db`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    pub channel: Channel,
    pub unit: Unit,
}

impl ChannelKey {
    pub const fn new(channel: Channel, unit: Unit) -> Self {
        Self { channel, unit }
    }

    pub const fn linear(channel: Channel) -> Self {
        Self::new(channel, Unit::Linear)
    }

    pub const fn decibel(channel: Channel) -> Self {
        Self::new(channel, Unit::Decibel)
    }

    /// All 22 keys: every channel in both unit modes.
    pub fn all() -> impl Iterator<Item = ChannelKey> {
        Channel::ALL.into_iter().flat_map(|c| {
            [ChannelKey::linear(c), ChannelKey::decibel(c)].into_iter()
        })
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Unit::Linear => write!(f, "{}", self.channel),
            Unit::Decibel => write!(f, "{}_db", self.channel),
        }
    }
}

impl FromStr for ChannelKey {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (base, unit) = match lowered.strip_suffix("_db") {
            Some(base) => (base, Unit::Decibel),
            None => (lowered.as_str(), Unit::Linear),
        };
        let channel = base
            .parse::<Channel>()
            .map_err(|_| AnalysisError::UnknownChannelKey(s.to_string()))?;
        Ok(ChannelKey::new(channel, unit))
    }
}

// ---------------------------------------------------------------------------
// Decibel references
// ---------------------------------------------------------------------------

/// 0 dB reference value per channel.
///
/// Defaults: 1 for most channels, 20 µPa for the ref1 microphone and 50000
/// for the vib/ref1 style transfer functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecibelReferences {
    pub disp: f64,
    pub vib: f64,
    pub acc: f64,
    pub ref1: f64,
    pub ref2: f64,
    pub ref3: f64,
    pub h1vibref1: f64,
    pub h2vibref1: f64,
    pub vibref1: f64,
    pub vibref2: f64,
    pub vibref3: f64,
}

impl Default for DecibelReferences {
    fn default() -> Self {
        Self {
            disp: 1.0,
            vib: 1.0,
            acc: 1.0,
            ref1: 0.00002,
            ref2: 1.0,
            ref3: 1.0,
            h1vibref1: 50000.0,
            h2vibref1: 50000.0,
            vibref1: 50000.0,
            vibref2: 1.0,
            vibref3: 1.0,
        }
    }
}

impl DecibelReferences {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Disp => self.disp,
            Channel::Vib => self.vib,
            Channel::Acc => self.acc,
            Channel::Ref1 => self.ref1,
            Channel::Ref2 => self.ref2,
            Channel::Ref3 => self.ref3,
            Channel::H1VibRef1 => self.h1vibref1,
            Channel::H2VibRef1 => self.h2vibref1,
            Channel::VibRef1 => self.vibref1,
            Channel::VibRef2 => self.vibref2,
            Channel::VibRef3 => self.vibref3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trips_through_display() {
        for key in ChannelKey::all() {
            let parsed: ChannelKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
        assert_eq!(ChannelKey::all().count(), 22);
    }

    #[test]
    fn test_key_parsing_ignores_case() {
        assert_eq!("VIB_DB".parse::<ChannelKey>().unwrap(), ChannelKey::decibel(Channel::Vib));
        assert_eq!(" Ref1 ".parse::<ChannelKey>().unwrap(), ChannelKey::linear(Channel::Ref1));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = "velocity_db".parse::<ChannelKey>().unwrap_err();
        assert_eq!(err, AnalysisError::UnknownChannelKey("velocity_db".into()));
        assert!("vib_dbx".parse::<ChannelKey>().is_err());
    }

    #[test]
    fn test_table_relationships() {
        assert_eq!(Channel::Vib.source(), Source::Recorded(1));
        assert_eq!(
            Channel::quotient_of(Channel::Vib, Channel::Ref3),
            Some(Channel::VibRef3)
        );
        assert_eq!(Channel::quotient_of(Channel::Acc, Channel::Ref1), None);
        assert!(Channel::Acc.squared_units());
        assert!(!Channel::Ref1.squared_units());
        for (i, c) in Channel::RECORDED.iter().enumerate() {
            assert_eq!(c.source(), Source::Recorded(i));
        }
    }

    #[test]
    fn test_default_references() {
        let refs = DecibelReferences::default();
        assert_eq!(refs.get(Channel::Ref1), 0.00002);
        assert_eq!(refs.get(Channel::VibRef1), 50000.0);
        assert_eq!(refs.get(Channel::VibRef3), 1.0);
    }
}
