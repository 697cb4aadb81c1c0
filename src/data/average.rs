use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::{join_points, AnalysisError, Result};
use super::model::{scan_stem, Curve, Graph};

// ---------------------------------------------------------------------------
// Shared averaging mechanics
// ---------------------------------------------------------------------------

/// Surface-type keywords; the device name is everything before the first one.
const SURFACE_KEYWORDS: [&str; 4] = ["top", "left", "right", "ear"];

/// Element-wise arithmetic mean of same-axis curves.
///
/// Every curve's x values must equal the first curve's, checked before any
/// arithmetic.
fn mean_of<C: Curve>(context: &str, curves: &[C]) -> Result<(Vec<f64>, Vec<f64>)> {
    let first = curves
        .first()
        .ok_or_else(|| AnalysisError::shape(context, "no graphs to average"))?;
    let x = first.x_data();

    for curve in &curves[1..] {
        if curve.x_data() != x {
            return Err(AnalysisError::shape(
                context,
                format!(
                    "x data of '{}' does not match '{}'",
                    curve.plot_title(),
                    first.plot_title()
                ),
            ));
        }
        if curve.y_data().len() != x.len() {
            return Err(AnalysisError::shape(
                context,
                format!(
                    "'{}' has {} y values for {} x values",
                    curve.plot_title(),
                    curve.y_data().len(),
                    x.len()
                ),
            ));
        }
    }

    let mut sum = vec![0.0; x.len()];
    for curve in curves {
        for (acc, &v) in sum.iter_mut().zip(curve.y_data()) {
            *acc += v;
        }
    }
    let n = curves.len() as f64;
    let y = sum.into_iter().map(|s| s / n).collect();
    Ok((x.to_vec(), y))
}

/// `"No anomalous points."` or `"Anomalous point(s) excluded: 2, 5"`.
pub fn exclusion_remarks(excluded: &BTreeSet<u32>) -> String {
    if excluded.is_empty() {
        "No anomalous points.".to_string()
    } else {
        let points: Vec<u32> = excluded.iter().copied().collect();
        format!("Anomalous point(s) excluded: {}", join_points(&points))
    }
}

/// Device name derived from a surface scan name: the text before the first
/// surface keyword, e.g. `"Unit 7 top.uff"` gives `"Unit 7"`.
pub fn device_name_from(scan_name: &str) -> String {
    let stem = scan_stem(scan_name);
    let lower = stem.to_ascii_lowercase();
    let found = SURFACE_KEYWORDS
        .iter()
        .filter_map(|k| lower.find(k))
        .min();
    match found {
        Some(idx) => stem[..idx]
            .trim_end_matches([' ', '_', '-'])
            .to_string(),
        None => stem.to_string(),
    }
}

// ---------------------------------------------------------------------------
// GraphAverage – mean over the scan points of one surface (or band)
// ---------------------------------------------------------------------------

/// Arithmetic mean of same-channel graphs of one measurement plane.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphAverage {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub x_min: f64,
    pub x_label: String,
    pub x_unit: String,
    pub y_label: String,
    pub y_unit: String,
    pub scan_name: String,
    pub channel_signal: String,
    pub plot_title: String,
    pub scan_point_numbers: Vec<u32>,
    pub excluded: BTreeSet<u32>,
    pub remarks: String,
}

impl GraphAverage {
    /// Average `graphs`; `excluded` only feeds the remark.
    ///
    /// With `name` set (bands), the average is titled `"<name>, <channel>, Average"`,
    /// otherwise `"<scan>, <channel>, Surface Average"`.
    pub fn new<C: Curve>(
        graphs: &[C],
        excluded: &BTreeSet<u32>,
        name: Option<&str>,
    ) -> Result<Self> {
        let context = match (name, graphs.first()) {
            (Some(n), _) => n.to_string(),
            (None, Some(g)) => format!("{} {}", g.scan_name(), g.channel_signal()),
            (None, None) => "surface average".to_string(),
        };
        let (x, y) = mean_of(&context, graphs)?;
        // non-empty: mean_of rejected an empty slice
        let first = &graphs[0];

        let channel_signal = first.channel_signal().to_string();
        let (scan_name, plot_title) = match name {
            Some(n) => (n.to_string(), format!("{n}, {channel_signal}, Average")),
            None => (
                first.scan_name().to_string(),
                format!("{}, {channel_signal}, Surface Average", scan_stem(first.scan_name())),
            ),
        };

        Ok(GraphAverage {
            x,
            y,
            x_min: first.x_min(),
            x_label: first.x_label().to_string(),
            x_unit: first.x_unit().to_string(),
            y_label: first.y_label().to_string(),
            y_unit: first.y_unit().to_string(),
            scan_name,
            channel_signal,
            plot_title,
            scan_point_numbers: graphs.iter().flat_map(|g| g.scan_point_numbers()).collect(),
            excluded: excluded.clone(),
            remarks: exclusion_remarks(excluded),
        })
    }

    /// Replace the remark, e.g. with a band description.
    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = remarks.into();
        self
    }
}

impl Curve for GraphAverage {
    fn plot_title(&self) -> &str {
        &self.plot_title
    }
    fn scan_name(&self) -> &str {
        &self.scan_name
    }
    fn channel_signal(&self) -> &str {
        &self.channel_signal
    }
    fn x_data(&self) -> &[f64] {
        &self.x
    }
    fn y_data(&self) -> &[f64] {
        &self.y
    }
    fn x_min(&self) -> f64 {
        self.x_min
    }
    fn x_label(&self) -> &str {
        &self.x_label
    }
    fn x_unit(&self) -> &str {
        &self.x_unit
    }
    fn y_label(&self) -> &str {
        &self.y_label
    }
    fn y_unit(&self) -> &str {
        &self.y_unit
    }
    fn scan_point_numbers(&self) -> Vec<u32> {
        self.scan_point_numbers.clone()
    }
    fn remarks(&self) -> Option<&str> {
        Some(&self.remarks)
    }
}

// ---------------------------------------------------------------------------
// SurfaceAverage – what a plane hands back for a channel
// ---------------------------------------------------------------------------

/// Result of averaging one plane: a single-point plane returns its point's
/// graph unchanged, anything larger a [`GraphAverage`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceAverage {
    Single(Arc<Graph>),
    Mean(GraphAverage),
}

impl SurfaceAverage {
    pub fn as_mean(&self) -> Option<&GraphAverage> {
        match self {
            SurfaceAverage::Mean(avg) => Some(avg),
            SurfaceAverage::Single(_) => None,
        }
    }

    pub fn as_single(&self) -> Option<&Arc<Graph>> {
        match self {
            SurfaceAverage::Single(g) => Some(g),
            SurfaceAverage::Mean(_) => None,
        }
    }

    fn curve(&self) -> &dyn Curve {
        match self {
            SurfaceAverage::Single(g) => g.as_ref() as &dyn Curve,
            SurfaceAverage::Mean(avg) => avg as &dyn Curve,
        }
    }
}

impl Curve for SurfaceAverage {
    fn plot_title(&self) -> &str {
        self.curve().plot_title()
    }
    fn scan_name(&self) -> &str {
        self.curve().scan_name()
    }
    fn channel_signal(&self) -> &str {
        self.curve().channel_signal()
    }
    fn x_data(&self) -> &[f64] {
        self.curve().x_data()
    }
    fn y_data(&self) -> &[f64] {
        self.curve().y_data()
    }
    fn x_min(&self) -> f64 {
        self.curve().x_min()
    }
    fn x_label(&self) -> &str {
        self.curve().x_label()
    }
    fn x_unit(&self) -> &str {
        self.curve().x_unit()
    }
    fn y_label(&self) -> &str {
        self.curve().y_label()
    }
    fn y_unit(&self) -> &str {
        self.curve().y_unit()
    }
    fn scan_point_numbers(&self) -> Vec<u32> {
        self.curve().scan_point_numbers()
    }
    fn remarks(&self) -> Option<&str> {
        self.curve().remarks()
    }
}

// ---------------------------------------------------------------------------
// DeviceAverage – mean of per-surface averages
// ---------------------------------------------------------------------------

/// Average of several surface averages (surface → device rollup).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceAverage {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub x_min: f64,
    pub x_label: String,
    pub x_unit: String,
    pub y_label: String,
    pub y_unit: String,
    pub device_name: String,
    pub channel_signal: String,
    pub plot_title: String,
    /// One list per contributing surface.
    pub scan_point_numbers: Vec<Vec<u32>>,
    pub remarks: String,
}

impl DeviceAverage {
    pub fn new<C: Curve>(contributors: &[C]) -> Result<Self> {
        let context = contributors
            .first()
            .map(|c| format!("device average of {}", c.channel_signal()))
            .unwrap_or_else(|| "device average".to_string());
        let (x, y) = mean_of(&context, contributors)?;
        let first = &contributors[0];

        let remarks = contributors
            .iter()
            .map(|c| {
                format!(
                    "{}: {}",
                    scan_stem(c.scan_name()),
                    c.remarks().unwrap_or("No remarks")
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        let device_name = device_name_from(first.scan_name());
        let channel_signal = first.channel_signal().to_string();
        Ok(DeviceAverage {
            x,
            y,
            x_min: first.x_min(),
            x_label: first.x_label().to_string(),
            x_unit: first.x_unit().to_string(),
            y_label: first.y_label().to_string(),
            y_unit: first.y_unit().to_string(),
            plot_title: format!("{device_name}, {channel_signal}, Average"),
            device_name,
            channel_signal,
            scan_point_numbers: contributors.iter().map(|c| c.scan_point_numbers()).collect(),
            remarks,
        })
    }
}

impl Curve for DeviceAverage {
    fn plot_title(&self) -> &str {
        &self.plot_title
    }
    fn scan_name(&self) -> &str {
        &self.device_name
    }
    fn channel_signal(&self) -> &str {
        &self.channel_signal
    }
    fn x_data(&self) -> &[f64] {
        &self.x
    }
    fn y_data(&self) -> &[f64] {
        &self.y
    }
    fn x_min(&self) -> f64 {
        self.x_min
    }
    fn x_label(&self) -> &str {
        &self.x_label
    }
    fn x_unit(&self) -> &str {
        &self.x_unit
    }
    fn y_label(&self) -> &str {
        &self.y_label
    }
    fn y_unit(&self) -> &str {
        &self.y_unit
    }
    fn scan_point_numbers(&self) -> Vec<u32> {
        self.scan_point_numbers.iter().flatten().copied().collect()
    }
    fn remarks(&self) -> Option<&str> {
        Some(&self.remarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;
    use approx::assert_relative_eq;

    fn graph(point: u32, y: &[f64]) -> Graph {
        Graph::from_record(record(point, "Vib", &[100.0, 200.0], y)).unwrap()
    }

    #[test]
    fn test_mean_and_remarks() {
        let graphs = vec![graph(1, &[1.0, 2.0]), graph(3, &[5.0, 6.0]), graph(4, &[7.0, 8.0])];
        let excluded: BTreeSet<u32> = [2].into_iter().collect();
        let avg = GraphAverage::new(&graphs, &excluded, None).unwrap();
        assert_relative_eq!(avg.y[0], 13.0 / 3.0, max_relative = 1e-12);
        assert_relative_eq!(avg.y[1], 16.0 / 3.0, max_relative = 1e-12);
        assert_eq!(avg.remarks, "Anomalous point(s) excluded: 2");
        assert_eq!(avg.scan_point_numbers, vec![1, 3, 4]);
        assert_eq!(avg.plot_title, "Unit 7 top, Vib, Surface Average");
        assert_eq!(avg.scan_name, "Unit 7 top.uff");
    }

    #[test]
    fn test_order_independence() {
        let graphs = vec![
            graph(1, &[0.1, 1e6]),
            graph(2, &[0.7, 3.3]),
            graph(3, &[1e-3, 42.0]),
            graph(4, &[9.9, 0.25]),
        ];
        let forward = GraphAverage::new(&graphs, &BTreeSet::new(), None).unwrap();
        let reversed: Vec<Graph> = graphs.iter().rev().cloned().collect();
        let backward = GraphAverage::new(&reversed, &BTreeSet::new(), None).unwrap();
        for (a, b) in forward.y.iter().zip(&backward.y) {
            assert_relative_eq!(a, b, max_relative = 1e-12);
        }
        assert_eq!(forward.remarks, "No anomalous points.");
    }

    #[test]
    fn test_mismatched_axes_fail() {
        let a = graph(1, &[1.0, 2.0]);
        let b = Graph::from_record(record(2, "Vib", &[100.0, 300.0], &[1.0, 2.0])).unwrap();
        let err = GraphAverage::new(&[a, b], &BTreeSet::new(), None).unwrap_err();
        assert!(matches!(err, AnalysisError::ShapeMismatch { .. }));
        let empty: [Graph; 0] = [];
        assert!(GraphAverage::new(&empty, &BTreeSet::new(), None).is_err());
    }

    #[test]
    fn test_named_average() {
        let avg = GraphAverage::new(&[graph(1, &[1.0, 1.0])], &BTreeSet::new(), Some("Band 2"))
            .unwrap()
            .with_remarks("Band colour: orange. Band points: 1");
        assert_eq!(avg.scan_name, "Band 2");
        assert_eq!(avg.plot_title, "Band 2, Vib, Average");
        assert_eq!(avg.remarks, "Band colour: orange. Band points: 1");
    }

    #[test]
    fn test_device_name() {
        assert_eq!(device_name_from("Unit 7 top.uff"), "Unit 7");
        assert_eq!(device_name_from("Proto_B_ear_hook_left.uff"), "Proto_B");
        assert_eq!(device_name_from("Proto B Left top.uff"), "Proto B");
        assert_eq!(device_name_from("bench.uff"), "bench");
    }

    #[test]
    fn test_device_average_concatenates_remarks() {
        let graphs = [graph(1, &[10.0, 10.0]), graph(2, &[10.0, 10.0])];
        let mut top = GraphAverage::new(&graphs, &BTreeSet::new(), None).unwrap();
        top.scan_name = "Unit 7 top.uff".into();
        let mut left_graphs = vec![graph(1, &[20.0, 30.0]), graph(2, &[20.0, 30.0])];
        for g in &mut left_graphs {
            g.scan_name = "Unit 7 left.uff".into();
        }
        let excluded: BTreeSet<u32> = [3].into_iter().collect();
        let left = GraphAverage::new(&left_graphs, &excluded, None).unwrap();

        let device = DeviceAverage::new(&[top, left]).unwrap();
        assert_eq!(device.y, vec![15.0, 20.0]);
        assert_eq!(device.device_name, "Unit 7");
        assert_eq!(device.plot_title, "Unit 7, Vib, Average");
        assert_eq!(device.scan_point_numbers, vec![vec![1, 2], vec![1, 2]]);
        assert_eq!(
            device.remarks,
            "Unit 7 top: No anomalous points. Unit 7 left: Anomalous point(s) excluded: 3"
        );
    }

    #[test]
    fn test_surface_average_single_has_no_remarks() {
        let single = SurfaceAverage::Single(Arc::new(graph(1, &[1.0, 2.0])));
        assert_eq!(single.remarks(), None);
        assert_eq!(single.scan_point_numbers(), vec![1]);
        assert!(single.as_mean().is_none());
    }
}
