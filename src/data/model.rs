use std::sync::Arc;

use num_complex::Complex64;

use super::error::{AnalysisError, Result};

// ---------------------------------------------------------------------------
// Samples – ordinate data exactly as a function record stores it
// ---------------------------------------------------------------------------

/// Ordinate values of a channel record, real or complex.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Real(v) => v.len(),
            Samples::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rectify to magnitudes. Real data is kept as recorded.
    pub fn into_magnitudes(self) -> Vec<f64> {
        match self {
            Samples::Real(v) => v,
            Samples::Complex(v) => v.iter().map(|c| c.norm()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelRecord – one function record handed over by the file reader
// ---------------------------------------------------------------------------

/// One channel of one scan point, as produced by the file reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRecord {
    pub x: Vec<f64>,
    pub data: Samples,
    pub abscissa_min: f64,
    /// Source file name.
    pub id4: String,
    /// Human channel description.
    pub id2: String,
    /// Scan point number.
    pub rsp_node: u32,
    pub abscissa_axis_lab: String,
    pub abscissa_axis_units_lab: String,
    pub ordinate_axis_lab: String,
    pub ordinate_axis_units_lab: String,
}

// ---------------------------------------------------------------------------
// Curve – what the exporter and the averaging engine need from any graph
// ---------------------------------------------------------------------------

/// Read access shared by every graph kind, from a single scan point's raw
/// channel up to a device-wide average.
pub trait Curve {
    fn plot_title(&self) -> &str;
    fn scan_name(&self) -> &str;
    fn channel_signal(&self) -> &str;
    fn x_data(&self) -> &[f64];
    fn y_data(&self) -> &[f64];
    fn x_min(&self) -> f64;
    fn x_label(&self) -> &str;
    fn x_unit(&self) -> &str;
    fn y_label(&self) -> &str;
    fn y_unit(&self) -> &str;

    /// Scan points that contributed to this curve.
    fn scan_point_numbers(&self) -> Vec<u32>;

    /// Exclusion remark; only averages carry one.
    fn remarks(&self) -> Option<&str> {
        None
    }

    fn x_label_with_unit(&self) -> String {
        format!("{} [{}]", self.x_label(), self.x_unit())
    }

    fn y_label_with_unit(&self) -> String {
        format!("{} [{}]", self.y_label(), self.y_unit())
    }
}

impl<C: Curve + ?Sized> Curve for Arc<C> {
    fn plot_title(&self) -> &str {
        (**self).plot_title()
    }
    fn scan_name(&self) -> &str {
        (**self).scan_name()
    }
    fn channel_signal(&self) -> &str {
        (**self).channel_signal()
    }
    fn x_data(&self) -> &[f64] {
        (**self).x_data()
    }
    fn y_data(&self) -> &[f64] {
        (**self).y_data()
    }
    fn x_min(&self) -> f64 {
        (**self).x_min()
    }
    fn x_label(&self) -> &str {
        (**self).x_label()
    }
    fn x_unit(&self) -> &str {
        (**self).x_unit()
    }
    fn y_label(&self) -> &str {
        (**self).y_label()
    }
    fn y_unit(&self) -> &str {
        (**self).y_unit()
    }
    fn scan_point_numbers(&self) -> Vec<u32> {
        (**self).scan_point_numbers()
    }
    fn remarks(&self) -> Option<&str> {
        (**self).remarks()
    }
}

/// Scan file name without its extension, as used in plot titles.
pub fn scan_stem(scan_name: &str) -> &str {
    match scan_name.rfind('.') {
        Some(idx) if idx > 0 => &scan_name[..idx],
        _ => scan_name,
    }
}

// ---------------------------------------------------------------------------
// Graph – a single scan point's channel, decibel or quotient graph
// ---------------------------------------------------------------------------

/// How a point graph was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraphKind {
    Raw,
    Decibel { reference: f64, squared_units: bool },
    Quotient,
}

/// One channel of one scan point. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub x: Vec<f64>,
    /// Magnitudes; complex records are rectified on ingestion.
    pub y: Vec<f64>,
    pub x_min: f64,
    pub x_label: String,
    pub x_unit: String,
    pub y_label: String,
    pub y_unit: String,
    pub scan_name: String,
    pub channel_signal: String,
    pub scan_point_number: u32,
    pub plot_title: String,
    pub kind: GraphKind,
}

fn point_title(scan_name: &str, channel_signal: &str, point: u32) -> String {
    format!("{}, {channel_signal}, Scan Point {point}", scan_stem(scan_name))
}

impl Graph {
    /// Build a raw channel graph from a file record.
    pub fn from_record(record: ChannelRecord) -> Result<Self> {
        if record.x.len() != record.data.len() {
            return Err(AnalysisError::shape(
                format!("{} scan point {}", record.id4, record.rsp_node),
                format!(
                    "channel '{}' has {} x values but {} y values",
                    record.id2,
                    record.x.len(),
                    record.data.len()
                ),
            ));
        }
        let plot_title = point_title(&record.id4, &record.id2, record.rsp_node);
        Ok(Graph {
            x: record.x,
            y: record.data.into_magnitudes(),
            x_min: record.abscissa_min,
            x_label: record.abscissa_axis_lab,
            x_unit: record.abscissa_axis_units_lab,
            y_label: record.ordinate_axis_lab,
            y_unit: record.ordinate_axis_units_lab,
            scan_name: record.id4,
            channel_signal: record.id2,
            scan_point_number: record.rsp_node,
            plot_title,
            kind: GraphKind::Raw,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

impl Curve for Graph {
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
        vec![self.scan_point_number]
    }
}

// ---------------------------------------------------------------------------
// Decibel transform
// ---------------------------------------------------------------------------

/// `20·log10(|m|/r)`, or `10·log10(|m|/r)` for squared units.
///
/// A zero magnitude yields `-inf`; it is propagated, not treated as an error.
pub fn decibel_value(magnitude: f64, reference: f64, squared_units: bool) -> f64 {
    let scale = if squared_units { 10.0 } else { 20.0 };
    scale * (magnitude.abs() / reference).log10()
}

/// Convert a graph's magnitudes to decibels relative to `reference`.
pub fn to_decibel(graph: &Graph, reference: f64, squared_units: bool) -> Graph {
    let channel_signal = format!("{} [dB]", graph.channel_signal);
    Graph {
        x: graph.x.clone(),
        y: graph
            .y
            .iter()
            .map(|&m| decibel_value(m, reference, squared_units))
            .collect(),
        x_min: graph.x_min,
        x_label: graph.x_label.clone(),
        x_unit: graph.x_unit.clone(),
        y_label: graph.y_label.clone(),
        y_unit: format!("0dB = {reference}{}", graph.y_unit),
        scan_name: graph.scan_name.clone(),
        plot_title: point_title(&graph.scan_name, &channel_signal, graph.scan_point_number),
        channel_signal,
        scan_point_number: graph.scan_point_number,
        kind: GraphKind::Decibel {
            reference,
            squared_units,
        },
    }
}

// ---------------------------------------------------------------------------
// Quotient transform
// ---------------------------------------------------------------------------

/// Element-wise `dividend / divisor` of two graphs from the same scan point.
///
/// Identity (x values, scan, point number, x label, x unit, x_min) is checked
/// before any arithmetic.
pub fn quotient(dividend: &Graph, divisor: &Graph) -> Result<Graph> {
    let context = format!(
        "{} / {} in {} scan point {}",
        dividend.channel_signal,
        divisor.channel_signal,
        dividend.scan_name,
        dividend.scan_point_number
    );
    let mismatch = |detail: String| Err(AnalysisError::shape(context.clone(), detail));

    if dividend.x != divisor.x {
        return mismatch("x values do not match".into());
    }
    if dividend.scan_name != divisor.scan_name {
        return mismatch(format!(
            "scan names differ ('{}' vs '{}')",
            dividend.scan_name, divisor.scan_name
        ));
    }
    if dividend.scan_point_number != divisor.scan_point_number {
        return mismatch(format!(
            "scan point numbers differ ({} vs {})",
            dividend.scan_point_number, divisor.scan_point_number
        ));
    }
    if dividend.x_label != divisor.x_label {
        return mismatch(format!(
            "x labels differ ('{}' vs '{}')",
            dividend.x_label, divisor.x_label
        ));
    }
    if dividend.x_unit != divisor.x_unit {
        return mismatch(format!(
            "x units differ ('{}' vs '{}')",
            dividend.x_unit, divisor.x_unit
        ));
    }
    if dividend.x_min != divisor.x_min {
        return mismatch(format!(
            "x_min differs ({} vs {})",
            dividend.x_min, divisor.x_min
        ));
    }

    let channel_signal = format!("{} and {}", dividend.channel_signal, divisor.channel_signal);
    Ok(Graph {
        x: dividend.x.clone(),
        y: dividend
            .y
            .iter()
            .zip(&divisor.y)
            .map(|(a, b)| a / b)
            .collect(),
        x_min: dividend.x_min,
        x_label: dividend.x_label.clone(),
        x_unit: dividend.x_unit.clone(),
        y_label: format!("{} per {}", dividend.y_label, divisor.y_label),
        y_unit: format!("{}{}", dividend.y_unit, divisor.y_unit),
        scan_name: dividend.scan_name.clone(),
        plot_title: point_title(&dividend.scan_name, &channel_signal, dividend.scan_point_number),
        channel_signal,
        scan_point_number: dividend.scan_point_number,
        kind: GraphKind::Quotient,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn record(point: u32, channel: &str, x: &[f64], y: &[f64]) -> ChannelRecord {
        ChannelRecord {
            x: x.to_vec(),
            data: Samples::Real(y.to_vec()),
            abscissa_min: x.first().copied().unwrap_or(0.0),
            id4: "Unit 7 top.uff".into(),
            id2: channel.into(),
            rsp_node: point,
            abscissa_axis_lab: "Frequency".into(),
            abscissa_axis_units_lab: "Hz".into(),
            ordinate_axis_lab: "Velocity".into(),
            ordinate_axis_units_lab: "m/s".into(),
        }
    }

    #[test]
    fn test_complex_records_are_rectified() {
        let mut rec = record(1, "Vib", &[100.0, 200.0], &[0.0, 0.0]);
        rec.data = Samples::Complex(vec![Complex64::new(3.0, 4.0), Complex64::new(0.0, -2.0)]);
        let graph = Graph::from_record(rec).unwrap();
        assert_eq!(graph.y, vec![5.0, 2.0]);
        assert_eq!(graph.plot_title, "Unit 7 top, Vib, Scan Point 1");
        assert_eq!(graph.kind, GraphKind::Raw);
    }

    #[test]
    fn test_record_length_mismatch_is_rejected() {
        let rec = record(3, "Vib", &[100.0, 200.0], &[1.0]);
        let err = Graph::from_record(rec).unwrap_err();
        assert!(matches!(err, AnalysisError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_decibel_scales() {
        for &(m, r) in &[(1.0f64, 1.0f64), (0.5, 2e-5), (123.4, 50000.0), (7.0, 0.3)] {
            let ratio = (m / r).log10();
            assert_relative_eq!(decibel_value(m, r, false), 20.0 * ratio, max_relative = 1e-9);
            assert_relative_eq!(decibel_value(m, r, true), 10.0 * ratio, max_relative = 1e-9);
        }
        assert_eq!(decibel_value(0.0, 1.0, false), f64::NEG_INFINITY);
    }

    #[test]
    fn test_to_decibel_rewrites_labels() {
        let graph = Graph::from_record(record(2, "Ref1", &[100.0], &[0.2])).unwrap();
        let db = to_decibel(&graph, 0.00002, false);
        assert_relative_eq!(db.y[0], 80.0, max_relative = 1e-9);
        assert_eq!(db.channel_signal, "Ref1 [dB]");
        assert_eq!(db.y_unit, "0dB = 0.00002m/s");
        assert_eq!(db.plot_title, "Unit 7 top, Ref1 [dB], Scan Point 2");
        assert_eq!(db.scan_point_number, 2);
    }

    #[test]
    fn test_quotient_divides_and_combines_labels() {
        let vib = Graph::from_record(record(4, "Vib", &[100.0, 200.0], &[2.0, 9.0])).unwrap();
        let mut ref1 = Graph::from_record(record(4, "Ref1", &[100.0, 200.0], &[4.0, 3.0])).unwrap();
        ref1.y_label = "Sound Pressure".into();
        ref1.y_unit = "Pa".into();
        let q = quotient(&vib, &ref1).unwrap();
        assert_eq!(q.y, vec![0.5, 3.0]);
        assert_eq!(q.y_label, "Velocity per Sound Pressure");
        assert_eq!(q.y_unit, "m/sPa");
        assert_eq!(q.channel_signal, "Vib and Ref1");
        assert_eq!(q.kind, GraphKind::Quotient);
    }

    #[test]
    fn test_quotient_checks_point_identity_first() {
        let vib = Graph::from_record(record(1, "Vib", &[100.0], &[2.0])).unwrap();
        let ref1 = Graph::from_record(record(2, "Ref1", &[100.0], &[4.0])).unwrap();
        let err = quotient(&vib, &ref1).unwrap_err();
        match err {
            AnalysisError::ShapeMismatch { detail, .. } => {
                assert!(detail.contains("scan point numbers differ"))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_quotient_rejects_different_axes() {
        let vib = Graph::from_record(record(1, "Vib", &[100.0, 200.0], &[2.0, 1.0])).unwrap();
        let ref1 = Graph::from_record(record(1, "Ref1", &[100.0, 250.0], &[4.0, 1.0])).unwrap();
        assert!(quotient(&vib, &ref1).is_err());

        let mut other_unit =
            Graph::from_record(record(1, "Ref1", &[100.0, 200.0], &[4.0, 1.0])).unwrap();
        other_unit.x_unit = "kHz".into();
        assert!(quotient(&vib, &other_unit).is_err());
    }

    #[test]
    fn test_scan_stem() {
        assert_eq!(scan_stem("Unit 7 top.uff"), "Unit 7 top");
        assert_eq!(scan_stem("noext"), "noext");
        assert_eq!(scan_stem(".hidden"), ".hidden");
    }
}
