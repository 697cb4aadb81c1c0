use std::collections::BTreeSet;
use std::path::PathBuf;

use vibroscan::data::device::EXPORT_CHANNELS;
use vibroscan::data::review::parse_band;
use vibroscan::data::{
    AnalysisError, Channel, ChannelKey, Comparison, Device, GraphChange, MeasurementPlane,
    PrecomputedReviewer, Unit,
};
use vibroscan::export::ExportBundle;
use vibroscan::AnalysisConfig;

// ---------------------------------------------------------------------------
// What the central panel shows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    ScanPoints,
    SurfaceAverage,
    Bands,
    Layout,
    Comparison,
    Change,
    Device,
}

impl View {
    pub const ALL: [View; 7] = [
        View::ScanPoints,
        View::SurfaceAverage,
        View::Bands,
        View::Layout,
        View::Comparison,
        View::Change,
        View::Device,
    ];

    pub fn label(self) -> &'static str {
        match self {
            View::ScanPoints => "Scan points",
            View::SurfaceAverage => "Surface average",
            View::Bands => "Band averages",
            View::Layout => "Point layout",
            View::Comparison => "Compare planes",
            View::Change => "Change (2nd − 1st)",
            View::Device => "Device bundle",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: AnalysisConfig,

    /// Loaded planes, one per file.
    pub planes: Vec<MeasurementPlane>,

    /// Index into `planes` of the plane being reviewed.
    pub selected: Option<usize>,

    pub channel: Channel,
    pub unit: Unit,

    /// Page of two scan points in the scan-point view.
    pub page: usize,

    pub view: View,

    /// Band being typed, `1-2-3` syntax.
    pub band_input: String,

    /// Curves currently on screen; also what the export buttons write.
    pub bundle: ExportBundle,

    pub status: Option<Status>,
}

impl AppState {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            planes: Vec::new(),
            selected: None,
            channel: Channel::Vib,
            unit: Unit::Decibel,
            page: 0,
            view: View::ScanPoints,
            band_input: String::new(),
            bundle: ExportBundle::new(),
            status: None,
        }
    }

    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.channel, self.unit)
    }

    pub fn plane(&self) -> Option<&MeasurementPlane> {
        self.selected.and_then(|i| self.planes.get(i))
    }

    fn plane_mut(&mut self) -> Option<&mut MeasurementPlane> {
        self.selected.and_then(|i| self.planes.get_mut(i))
    }

    pub fn info(&mut self, msg: impl Into<String>) {
        self.status = Some(Status::Info(msg.into()));
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::error!("{msg}");
        self.status = Some(Status::Error(msg));
    }

    // -----------------------------------------------------------------------
    // Planes
    // -----------------------------------------------------------------------

    /// Add a plane, replacing one with the same scan name, and select it.
    pub fn add_plane(&mut self, plane: MeasurementPlane) {
        let idx = match self
            .planes
            .iter()
            .position(|p| p.scan_name() == plane.scan_name())
        {
            Some(idx) => {
                self.planes[idx] = plane;
                idx
            }
            None => {
                self.planes.push(plane);
                self.planes.len() - 1
            }
        };
        self.select(idx);
    }

    pub fn load_paths(&mut self, paths: Vec<PathBuf>) {
        let mut loaded = 0;
        for path in paths {
            match MeasurementPlane::load(&path, &self.config) {
                Ok(plane) => {
                    self.add_plane(plane);
                    loaded += 1;
                }
                Err(e) => {
                    self.error(format!("Failed to load {}: {e:#}", path.display()));
                    return;
                }
            }
        }
        self.info(format!("{loaded} file(s) loaded"));
    }

    pub fn select(&mut self, idx: usize) {
        if idx < self.planes.len() {
            self.selected = Some(idx);
            self.page = 0;
            self.band_input.clear();
            self.refresh();
        }
    }

    pub fn remove_selected(&mut self) {
        if let Some(idx) = self.selected {
            if idx < self.planes.len() {
                self.planes.remove(idx);
            }
            self.selected = if self.planes.is_empty() {
                None
            } else {
                Some(idx.min(self.planes.len() - 1))
            };
            self.page = 0;
            self.refresh();
        }
    }

    // -----------------------------------------------------------------------
    // Paging and anomalies
    // -----------------------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.plane().map(|p| p.len().div_ceil(2)).unwrap_or(0)
    }

    /// Point numbers on the current page.
    pub fn page_points(&self) -> Vec<u32> {
        self.plane()
            .map(|p| {
                p.point_numbers()
                    .chunks(2)
                    .nth(self.page)
                    .map(|c| c.to_vec())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.min(self.page_count().saturating_sub(1));
        self.refresh();
    }

    pub fn set_anomalous(&mut self, point: u32, anomalous: bool) {
        if let Some(plane) = self.plane_mut() {
            let mut set: BTreeSet<u32> = plane.anomalous_points().clone();
            if anomalous {
                set.insert(point);
            } else {
                set.remove(&point);
            }
            plane.set_anomalous_points(set);
        }
        self.refresh();
    }

    pub fn clear_anomalies(&mut self) {
        if let Some(plane) = self.plane_mut() {
            plane.set_anomalous_points(BTreeSet::new());
        }
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Bands
    // -----------------------------------------------------------------------

    pub fn submit_band(&mut self) {
        let Some(points) = parse_band(&self.band_input) else {
            self.error("Band must be point numbers separated by a dash, e.g. 1-2-3");
            return;
        };
        let result = match self.plane_mut() {
            Some(plane) => plane.add_band(points),
            None => return,
        };
        match result {
            Ok(()) => {
                self.band_input.clear();
                self.view = View::Bands;
                self.refresh();
                self.info("Band added");
            }
            Err(e) => self.error(e.to_string()),
        }
    }

    pub fn clear_bands(&mut self) {
        if let Some(plane) = self.plane_mut() {
            plane.clear_bands();
        }
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Curves for the current view
    // -----------------------------------------------------------------------

    /// Rebuild `bundle` for the current view, plane and channel.
    pub fn refresh(&mut self) {
        match self.build_bundle() {
            Ok(bundle) => {
                if matches!(self.status, Some(Status::Error(_))) {
                    self.status = None;
                }
                self.bundle = bundle;
            }
            Err(e) => {
                self.bundle = ExportBundle::new();
                self.error(e.to_string());
            }
        }
    }

    fn build_bundle(&self) -> Result<ExportBundle, AnalysisError> {
        let key = self.key();
        let mut bundle = ExportBundle::with_remarks();
        match self.view {
            View::ScanPoints => {
                let Some(plane) = self.plane() else {
                    return Ok(bundle);
                };
                for number in self.page_points() {
                    if let Some(point) = plane.point(number) {
                        bundle.push(&point.graph(key)?);
                    }
                }
            }
            View::SurfaceAverage => {
                if let Some(plane) = self.plane() {
                    bundle.push(&plane.average(key, plane.anomalous_points())?);
                }
            }
            View::Bands => {
                if let Some(plane) = self.plane() {
                    for band in plane.band_averages(key)? {
                        bundle.push(&band);
                    }
                }
            }
            View::Layout => {}
            View::Comparison => {
                if !self.planes.is_empty() {
                    let comparison = Comparison::new(self.planes.clone())?;
                    for average in comparison.current_averages(key)? {
                        bundle.push(&average);
                    }
                }
            }
            View::Change => {
                let comparison = Comparison::new(self.planes.clone())?;
                let averages = comparison.current_averages(key)?;
                let [before, after] = &averages[..] else {
                    return Err(AnalysisError::NotEnoughMeasurements {
                        operation: "change",
                        required: 2,
                        found: averages.len(),
                    });
                };
                bundle.push(&GraphChange::new(before, after)?);
            }
            View::Device => return self.device_bundle(),
        }
        Ok(bundle)
    }

    /// Device bundle of all loaded planes, honouring each plane's current
    /// anomalous points.
    pub fn device_bundle(&self) -> Result<ExportBundle, AnalysisError> {
        let mut device = Device::from_planes(self.planes.clone())?;
        let mut reviewer = PrecomputedReviewer::none();
        for plane in &self.planes {
            for key in EXPORT_CHANNELS {
                reviewer = reviewer.with_override(
                    plane.scan_name(),
                    key,
                    plane.anomalous_points().iter().copied(),
                );
            }
        }
        device.export(&mut reviewer)
    }

    /// Default file name stem for exports of the current view.
    pub fn export_stem(&self) -> String {
        let plane = self
            .plane()
            .map(|p| vibroscan::data::model::scan_stem(p.scan_name()).to_string())
            .unwrap_or_else(|| "vibroscan".to_string());
        match self.view {
            View::Comparison | View::Change | View::Device => {
                format!("{} {}", self.view.label(), self.key())
            }
            _ => format!("{plane} {} {}", self.view.label(), self.key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vibroscan::data::channel::DecibelReferences;
    use vibroscan::data::model::{ChannelRecord, Samples};

    fn plane(scan: &str, points: u32) -> MeasurementPlane {
        let mut records = Vec::new();
        for point in 1..=points {
            for channel in Channel::RECORDED {
                records.push(ChannelRecord {
                    x: vec![100.0, 200.0],
                    data: Samples::Real(vec![point as f64, 1.0]),
                    abscissa_min: 100.0,
                    id4: scan.into(),
                    id2: channel.description().into(),
                    rsp_node: point,
                    abscissa_axis_lab: "Frequency".into(),
                    abscissa_axis_units_lab: "Hz".into(),
                    ordinate_axis_lab: "Velocity".into(),
                    ordinate_axis_units_lab: "m/s".into(),
                });
            }
        }
        let refs = DecibelReferences::default();
        MeasurementPlane::from_records(scan, records, BTreeMap::new(), &refs).unwrap()
    }

    #[test]
    fn test_paging_and_exclusion() {
        let mut state = AppState::new(AnalysisConfig::default());
        state.add_plane(plane("u top.uff", 3));
        assert_eq!(state.page_count(), 2);
        state.set_page(5);
        assert_eq!(state.page_points(), vec![3]);

        state.unit = Unit::Linear;
        state.view = View::SurfaceAverage;
        state.set_anomalous(3, true);
        assert_eq!(state.bundle.curves[0].y, vec![1.5, 1.0]);
        assert_eq!(state.bundle.remark(0), Some("Anomalous point(s) excluded: 3"));
    }

    #[test]
    fn test_band_input() {
        let mut state = AppState::new(AnalysisConfig::default());
        state.add_plane(plane("u top.uff", 3));
        state.band_input = "1-x".into();
        state.submit_band();
        assert!(matches!(state.status, Some(Status::Error(_))));

        state.band_input = "1-2".into();
        state.submit_band();
        assert_eq!(state.view, View::Bands);
        assert_eq!(state.bundle.len(), 1);
        assert_eq!(state.plane().unwrap().bands(), &[vec![1, 2]]);

        state.unit = Unit::Linear;
        state.set_anomalous(1, true);
        assert_eq!(state.plane().unwrap().bands(), &[vec![2]]);
        assert_eq!(state.bundle.curves[0].y, vec![2.0, 1.0]);
    }

    #[test]
    fn test_change_needs_two_planes() {
        let mut state = AppState::new(AnalysisConfig::default());
        state.add_plane(plane("u top.uff", 2));
        state.view = View::Change;
        state.refresh();
        assert!(matches!(state.status, Some(Status::Error(_))));
        assert!(state.bundle.is_empty());
    }
}
