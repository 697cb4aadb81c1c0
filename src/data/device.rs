use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use anyhow::Context;
use once_cell::sync::OnceCell;

use crate::config::AnalysisConfig;
use crate::export::ExportBundle;

use super::average::{device_name_from, DeviceAverage, GraphAverage, SurfaceAverage};
use super::channel::{Channel, ChannelKey, Unit};
use super::error::{AnalysisError, Result};
use super::plane::MeasurementPlane;
use super::review::AnomalyReviewer;

// ---------------------------------------------------------------------------
// Surface taxonomy
// ---------------------------------------------------------------------------

/// Physical surface of a device. Variant order is the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SurfaceKind {
    Top,
    TopUpper,
    TopLower,
    Left,
    Right,
    EarHookTop,
    EarHookLeft,
    EarHookRight,
}

/// Filename patterns, most specific first.
const CLASSIFICATION: [(&[&str], SurfaceKind); 8] = [
    (&["ear_hook_top", "ear hook top"], SurfaceKind::EarHookTop),
    (&["ear_hook_left", "ear hook left"], SurfaceKind::EarHookLeft),
    (&["ear_hook_right", "ear hook right"], SurfaceKind::EarHookRight),
    (&["top_upper", "top upper"], SurfaceKind::TopUpper),
    (&["top_lower", "top lower"], SurfaceKind::TopLower),
    (&["top"], SurfaceKind::Top),
    (&["left"], SurfaceKind::Left),
    (&["right"], SurfaceKind::Right),
];

impl SurfaceKind {
    pub const CANONICAL: [SurfaceKind; 8] = [
        SurfaceKind::Top,
        SurfaceKind::TopUpper,
        SurfaceKind::TopLower,
        SurfaceKind::Left,
        SurfaceKind::Right,
        SurfaceKind::EarHookTop,
        SurfaceKind::EarHookLeft,
        SurfaceKind::EarHookRight,
    ];

    /// Case-insensitive classification of a scan file name.
    pub fn classify(file_name: &str) -> Option<Self> {
        let lower = file_name.to_lowercase();
        CLASSIFICATION
            .iter()
            .find(|(patterns, _)| patterns.iter().any(|p| lower.contains(p)))
            .map(|&(_, kind)| kind)
    }

    pub fn key(self) -> &'static str {
        match self {
            SurfaceKind::Top => "top",
            SurfaceKind::TopUpper => "top_upper",
            SurfaceKind::TopLower => "top_lower",
            SurfaceKind::Left => "left",
            SurfaceKind::Right => "right",
            SurfaceKind::EarHookTop => "ear_hook_top",
            SurfaceKind::EarHookLeft => "ear_hook_left",
            SurfaceKind::EarHookRight => "ear_hook_right",
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// Channels exported per surface, in bundle order.
pub const EXPORT_CHANNELS: [ChannelKey; 3] = [
    ChannelKey::decibel(Channel::Vib),
    ChannelKey::decibel(Channel::VibRef1),
    ChannelKey::decibel(Channel::VibRef3),
];

/// The surfaces of one physical device, in canonical order.
#[derive(Debug)]
pub struct Device {
    device_name: String,
    surfaces: Vec<(SurfaceKind, MeasurementPlane)>,
    // ref1 linear, ref1 dB, ref3 linear, ref3 dB
    rollups: [OnceCell<DeviceAverage>; 4],
}

impl Device {
    /// Classify planes by file name and order them canonically.
    ///
    /// Unclassifiable planes are dropped; when two planes map to the same
    /// surface the later one wins.
    pub fn from_planes(planes: Vec<MeasurementPlane>) -> Result<Self> {
        let names: Vec<String> = planes.iter().map(|p| p.scan_name().to_string()).collect();
        let mut by_kind: BTreeMap<SurfaceKind, MeasurementPlane> = BTreeMap::new();
        for plane in planes {
            let Some(kind) = SurfaceKind::classify(plane.scan_name()) else {
                log::warn!("{}: no surface type in file name, ignored", plane.scan_name());
                continue;
            };
            if let Some(previous) = by_kind.insert(kind, plane) {
                log::warn!(
                    "{kind} surface given twice, {} replaced",
                    previous.scan_name()
                );
            }
        }

        let surfaces: Vec<(SurfaceKind, MeasurementPlane)> = by_kind.into_iter().collect();
        let Some((_, first)) = surfaces.first() else {
            return Err(AnalysisError::NoSurfaces { files: names });
        };
        let device_name = device_name_from(first.scan_name());
        log::info!(
            "device '{device_name}': {}",
            surfaces
                .iter()
                .map(|(k, p)| format!("{k}={}", p.scan_name()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Device {
            device_name,
            surfaces,
            rollups: Default::default(),
        })
    }

    pub fn load<P: AsRef<Path>>(paths: &[P], config: &AnalysisConfig) -> anyhow::Result<Self> {
        let planes = paths
            .iter()
            .map(|p| MeasurementPlane::load(p.as_ref(), config))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::from_planes(planes).context("assembling device")
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn surfaces(&self) -> impl Iterator<Item = (SurfaceKind, &MeasurementPlane)> {
        self.surfaces.iter().map(|(k, p)| (*k, p))
    }

    pub fn surface_kinds(&self) -> Vec<SurfaceKind> {
        self.surfaces.iter().map(|(k, _)| *k).collect()
    }

    pub fn surface(&self, kind: SurfaceKind) -> Option<&MeasurementPlane> {
        self.surfaces
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p)
    }

    pub fn surface_mut(&mut self, kind: SurfaceKind) -> Option<&mut MeasurementPlane> {
        self.surfaces
            .iter_mut()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p)
    }

    /// Device-wide average of `key` over every surface, no points excluded.
    ///
    /// Each surface contributes a [`GraphAverage`], even a single-point one.
    pub fn reference_average(&self, key: ChannelKey) -> Result<DeviceAverage> {
        let per_surface = self
            .surfaces
            .iter()
            .map(|(_, plane)| GraphAverage::new(&plane.graphs(key)?, &BTreeSet::new(), None))
            .collect::<Result<Vec<_>>>()?;
        DeviceAverage::new(&per_surface)
    }

    fn cached_rollup(&self, slot: usize, key: ChannelKey) -> Result<&DeviceAverage> {
        self.rollups[slot].get_or_try_init(|| self.reference_average(key))
    }

    /// Device average of ref1 (computed once per unit).
    pub fn ref1_average(&self, unit: Unit) -> Result<&DeviceAverage> {
        let slot = if unit == Unit::Decibel { 1 } else { 0 };
        self.cached_rollup(slot, ChannelKey::new(Channel::Ref1, unit))
    }

    /// Device average of ref3 (computed once per unit).
    pub fn ref3_average(&self, unit: Unit) -> Result<&DeviceAverage> {
        let slot = if unit == Unit::Decibel { 3 } else { 2 };
        self.cached_rollup(slot, ChannelKey::new(Channel::Ref3, unit))
    }

    /// Per-surface averages of `key`, each reviewed by `reviewer`.
    pub fn surface_averages(
        &mut self,
        key: ChannelKey,
        reviewer: &mut dyn AnomalyReviewer,
    ) -> Result<Vec<SurfaceAverage>> {
        self.surfaces
            .iter_mut()
            .map(|(_, plane)| plane.review_average(key, reviewer))
            .collect()
    }

    /// The fixed export bundle: ref1 and ref3 device averages (dB), then
    /// vib, vib/ref1 and vib/ref3 (dB) for each surface in canonical order.
    pub fn export(&mut self, reviewer: &mut dyn AnomalyReviewer) -> Result<ExportBundle> {
        let mut bundle = ExportBundle::with_remarks();
        bundle.push(self.ref1_average(Unit::Decibel)?);
        bundle.push(self.ref3_average(Unit::Decibel)?);
        for key in EXPORT_CHANNELS {
            for average in self.surface_averages(key, reviewer)? {
                bundle.push(&average);
            }
        }
        log::info!(
            "device '{}': export bundle of {} curves",
            self.device_name,
            bundle.len()
        );
        Ok(bundle)
    }
}
