//! Laser-vibrometer scan analysis.
//!
//! UFF scan files are read into [`data::MeasurementPlane`]s of eight-channel
//! scan points. Planes are averaged with anomalous points excluded, split into
//! bands, rolled up per [`data::Device`] or set side by side in a
//! [`data::Comparison`], and written out as HXML or PNG by [`export`].

pub mod color;
pub mod config;
pub mod data;
pub mod export;

pub use config::AnalysisConfig;
