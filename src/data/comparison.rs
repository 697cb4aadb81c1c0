use std::path::Path;

use crate::config::AnalysisConfig;
use crate::export::ExportBundle;

use super::average::SurfaceAverage;
use super::channel::ChannelKey;
use super::error::{AnalysisError, Result};
use super::model::{scan_stem, Curve};
use super::plane::MeasurementPlane;
use super::review::AnomalyReviewer;

// ---------------------------------------------------------------------------
// GraphChange – after minus before
// ---------------------------------------------------------------------------

/// Element-wise difference of two surface averages (`after - before`).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphChange {
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
    pub remarks: String,
}

impl GraphChange {
    /// Axis identity (x values, label, unit, x_min) is checked first.
    pub fn new<B: Curve + ?Sized, A: Curve + ?Sized>(before: &B, after: &A) -> Result<Self> {
        let context = format!(
            "change of {} from {}",
            scan_stem(after.scan_name()),
            scan_stem(before.scan_name())
        );
        let mismatch = |detail: &str| Err(AnalysisError::shape(context.clone(), detail));
        if before.x_data() != after.x_data() {
            return mismatch("x values do not match");
        }
        if before.x_label() != after.x_label() {
            return mismatch("x labels do not match");
        }
        if before.x_unit() != after.x_unit() {
            return mismatch("x units do not match");
        }
        if before.x_min() != after.x_min() {
            return mismatch("x_min does not match");
        }

        let remarks = format!(
            "{}; {}",
            before.remarks().unwrap_or("No remarks"),
            after.remarks().unwrap_or("No remarks")
        );
        let mut scan_point_numbers = before.scan_point_numbers();
        scan_point_numbers.extend(after.scan_point_numbers());

        Ok(GraphChange {
            x: before.x_data().to_vec(),
            y: after
                .y_data()
                .iter()
                .zip(before.y_data())
                .map(|(a, b)| a - b)
                .collect(),
            x_min: before.x_min(),
            x_label: before.x_label().to_string(),
            x_unit: before.x_unit().to_string(),
            y_label: "Change".to_string(),
            y_unit: before.y_unit().to_string(),
            scan_name: before.scan_name().to_string(),
            channel_signal: format!("{} Change", before.channel_signal()),
            plot_title: format!(
                "Change of {} from {}",
                scan_stem(after.scan_name()),
                scan_stem(before.scan_name())
            ),
            scan_point_numbers,
            remarks,
        })
    }
}

impl Curve for GraphChange {
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
// Comparison – several planes side by side
// ---------------------------------------------------------------------------

/// Planes from arbitrary files, compared channel by channel.
#[derive(Debug)]
pub struct Comparison {
    measurements: Vec<MeasurementPlane>,
}

impl Comparison {
    pub fn new(measurements: Vec<MeasurementPlane>) -> Result<Self> {
        if measurements.is_empty() {
            return Err(AnalysisError::NotEnoughMeasurements {
                operation: "comparison",
                required: 1,
                found: 0,
            });
        }
        Ok(Comparison { measurements })
    }

    pub fn load<P: AsRef<Path>>(paths: &[P], config: &AnalysisConfig) -> anyhow::Result<Self> {
        let planes = paths
            .iter()
            .map(|p| MeasurementPlane::load(p.as_ref(), config))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(planes)?)
    }

    pub fn measurements(&self) -> &[MeasurementPlane] {
        &self.measurements
    }

    pub fn measurements_mut(&mut self) -> &mut [MeasurementPlane] {
        &mut self.measurements
    }

    /// One reviewed average per measurement, in input order.
    pub fn averages(
        &mut self,
        key: ChannelKey,
        reviewer: &mut dyn AnomalyReviewer,
    ) -> Result<Vec<SurfaceAverage>> {
        self.measurements
            .iter_mut()
            .map(|plane| plane.review_average(key, reviewer))
            .collect()
    }

    /// Averages using each plane's current anomalous points.
    pub fn current_averages(&self, key: ChannelKey) -> Result<Vec<SurfaceAverage>> {
        self.measurements
            .iter()
            .map(|plane| plane.average(key, plane.anomalous_points()))
            .collect()
    }

    /// `after - before` of exactly two measurements (second minus first).
    pub fn change(
        &mut self,
        key: ChannelKey,
        reviewer: &mut dyn AnomalyReviewer,
    ) -> Result<GraphChange> {
        if self.measurements.len() != 2 {
            return Err(AnalysisError::NotEnoughMeasurements {
                operation: "change",
                required: 2,
                found: self.measurements.len(),
            });
        }
        let averages = self.averages(key, reviewer)?;
        GraphChange::new(&averages[0], &averages[1])
    }

    /// One curve per measurement with its exclusion remark.
    pub fn export(
        &mut self,
        key: ChannelKey,
        reviewer: &mut dyn AnomalyReviewer,
    ) -> Result<ExportBundle> {
        let mut bundle = ExportBundle::with_remarks();
        for average in self.averages(key, reviewer)? {
            bundle.push(&average);
        }
        Ok(bundle)
    }

    /// Short label for the compared files, e.g. for export file names.
    pub fn short_names(&self) -> String {
        self.measurements
            .iter()
            .map(|p| scan_stem(p.scan_name()))
            .collect::<Vec<_>>()
            .join(" vs ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::channel::Channel;
    use crate::data::plane::tests::plane_with;
    use crate::data::review::PrecomputedReviewer;

    const VIB: ChannelKey = ChannelKey::linear(Channel::Vib);

    #[test]
    fn test_change_is_after_minus_before() {
        let mut comparison = Comparison::new(vec![
            plane_with("before top.uff", &[[1.0, 2.0], [3.0, 4.0]]),
            plane_with("after top.uff", &[[5.0, 5.0], [7.0, 9.0]]),
        ])
        .unwrap();
        let mut reviewer = PrecomputedReviewer::none();
        let change = comparison.change(VIB, &mut reviewer).unwrap();
        assert_eq!(change.y, vec![4.0, 4.0]);
        assert_eq!(change.remarks, "No anomalous points.; No anomalous points.");
        assert_eq!(change.plot_title, "Change of after top from before top");
    }

    #[test]
    fn test_change_needs_two() {
        let mut comparison = Comparison::new(vec![plane_with("a top.uff", &[[1.0, 2.0]])]).unwrap();
        let err = comparison.change(VIB, &mut PrecomputedReviewer::none()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::NotEnoughMeasurements { operation: "change", required: 2, found: 1 }
        );
        assert!(Comparison::new(Vec::new()).is_err());
    }

    #[test]
    fn test_export_one_curve_per_measurement() {
        let mut comparison = Comparison::new(vec![
            plane_with("a top.uff", &[[1.0, 2.0], [3.0, 4.0]]),
            plane_with("b top.uff", &[[1.0, 2.0]]),
        ])
        .unwrap();
        let mut reviewer = PrecomputedReviewer::none().with_override("a top.uff", VIB, [1]);
        let bundle = comparison.export(VIB, &mut reviewer).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.curves[0].y, vec![3.0, 4.0]);
        assert_eq!(
            bundle.remarks.as_deref(),
            Some(&["Anomalous point(s) excluded: 1".to_string(), "No remarks".to_string()][..])
        );
        assert_eq!(comparison.short_names(), "a top vs b top");
        assert_eq!(comparison.measurements()[0].anomalous_points().len(), 1);
    }
}
