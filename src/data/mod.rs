/// Data layer: channel graphs, scan points, planes and their averages.
///
/// Architecture:
/// ```text
///  .uff / .unv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  uff.rs → ChannelRecord × N, coordinates, header
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ MeasurementPlane  │  ScanPoint × N (8 graphs + cached dB / quotients)
///   └──────────────────┘
///        │  review.rs decides exclusions and bands
///        ▼
///   ┌──────────────┐
///   │ GraphAverage  │  per surface / per band
///   └──────────────┘
///        │
///        ▼
///   ┌────────────────────────┐
///   │ Device / Comparison     │  DeviceAverage, GraphChange, export bundle
///   └────────────────────────┘
/// ```

pub mod average;
pub mod channel;
pub mod comparison;
pub mod device;
pub mod error;
pub mod loader;
pub mod model;
pub mod plane;
pub mod review;
pub mod scan_point;
pub mod uff;

pub use average::{DeviceAverage, GraphAverage, SurfaceAverage};
pub use channel::{Channel, ChannelKey, DecibelReferences, Unit};
pub use comparison::{Comparison, GraphChange};
pub use device::{Device, SurfaceKind};
pub use error::{AnalysisError, BandViolation};
pub use model::{Curve, Graph};
pub use plane::MeasurementPlane;
pub use review::{AnomalyReviewer, BandPlanner, PrecomputedReviewer, PresetBandPlanner};
pub use scan_point::ScanPoint;
