use std::fmt;

use thiserror::Error;

use super::channel::ChannelKey;

// ---------------------------------------------------------------------------
// Failure taxonomy of the averaging engine
// ---------------------------------------------------------------------------

/// Errors raised by graph derivation, averaging and banding.
///
/// Every variant names the scan, channel or points that triggered it so an
/// operator can fix the exclusion set or re-scan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Graphs that must share an x-axis (or a full identity, for quotients) do not.
    #[error("shape mismatch in {context}: {detail}")]
    ShapeMismatch { context: String, detail: String },

    /// Every scan point of a plane is excluded for the requested channel.
    #[error(
        "all scan points in {plane} are excluded for {channel} (excluded: {})",
        join_points(.excluded)
    )]
    AllPointsExcluded {
        plane: String,
        channel: ChannelKey,
        excluded: Vec<u32>,
    },

    /// A scan point did not carry exactly the expected number of channel records.
    #[error("scan point {point} in {scan} has {found} channel record(s), expected {expected}")]
    IncompleteScanPoint {
        scan: String,
        point: u32,
        found: usize,
        expected: usize,
    },

    /// A proposed band violates the band invariants.
    #[error("band {band} in {plane} rejected: {}", join_violations(.violations))]
    InvalidBandDefinition {
        plane: String,
        band: usize,
        violations: Vec<BandViolation>,
    },

    /// A channel identifier outside the fixed channel table.
    #[error("unknown channel key '{0}'")]
    UnknownChannelKey(String),

    /// Ingestion produced no complete scan point at all.
    #[error("no complete scan points found in {scan}")]
    NoScanPoints { scan: String },

    /// None of the files handed to a device matched a surface type.
    #[error("no recognisable device surface among: {}", .files.join(", "))]
    NoSurfaces { files: Vec<String> },

    /// A comparison operation needs more measurement planes than it was given.
    #[error("{operation} needs {required} measurement(s), found {found}")]
    NotEnoughMeasurements {
        operation: &'static str,
        required: usize,
        found: usize,
    },
}

impl AnalysisError {
    pub(crate) fn shape(context: impl Into<String>, detail: impl Into<String>) -> Self {
        AnalysisError::ShapeMismatch {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

/// One reason a band definition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandViolation {
    Empty,
    OutOfRange(u32),
    Anomalous(u32),
    AlreadyAssigned(u32),
}

impl fmt::Display for BandViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandViolation::Empty => write!(f, "band has no points"),
            BandViolation::OutOfRange(p) => {
                write!(f, "point {p} does not exist in this measurement")
            }
            BandViolation::Anomalous(p) => write!(f, "point {p} is anomalous and cannot be used"),
            BandViolation::AlreadyAssigned(p) => {
                write!(f, "point {p} is already included in a previous band")
            }
        }
    }
}

/// Comma-separated point list, e.g. `2, 5, 7`.
pub fn join_points(points: &[u32]) -> String {
    points
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_violations(violations: &[BandViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
