//! Writers on the export boundary: finished curves in, files out.
//!
//! ```text
//!  Device / Comparison / MeasurementPlane
//!        │  ExportBundle (curves + remarks)
//!        ├──► hxml.rs  – HXML interchange document
//!        ├──► png.rs   – rendered plot image
//!        └──◄ table.rs – CSV curve table import (→ ExportBundle)
//! ```

pub mod hxml;
pub mod png;
pub mod table;

use crate::data::model::Curve;

/// Owned snapshot of one curve as the writers need it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportCurve {
    pub plot_title: String,
    pub x_label: String,
    pub x_unit: String,
    pub x: Vec<f64>,
    pub y_label: String,
    pub y_unit: String,
    pub y: Vec<f64>,
    pub x_min: f64,
}

impl ExportCurve {
    pub fn from_curve<C: Curve + ?Sized>(curve: &C) -> Self {
        ExportCurve {
            plot_title: curve.plot_title().to_string(),
            x_label: curve.x_label().to_string(),
            x_unit: curve.x_unit().to_string(),
            x: curve.x_data().to_vec(),
            y_label: curve.y_label().to_string(),
            y_unit: curve.y_unit().to_string(),
            y: curve.y_data().to_vec(),
            x_min: curve.x_min(),
        }
    }

    pub fn x_label_with_unit(&self) -> String {
        format!("{} [{}]", self.x_label, self.x_unit)
    }

    pub fn y_label_with_unit(&self) -> String {
        format!("{} [{}]", self.y_label, self.y_unit)
    }
}

/// Ordered curves plus their remarks.
///
/// `remarks` is `None` in "no remarks" mode; otherwise it holds one entry per
/// curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportBundle {
    pub curves: Vec<ExportCurve>,
    pub remarks: Option<Vec<String>>,
}

/// Placeholder for curves that carry no remark.
pub const NO_REMARKS: &str = "No remarks";

impl ExportBundle {
    /// Bundle without remarks.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remarks() -> Self {
        ExportBundle {
            curves: Vec::new(),
            remarks: Some(Vec::new()),
        }
    }

    /// Append a curve; in remarks mode its own remark (or `No remarks`) goes along.
    pub fn push<C: Curve + ?Sized>(&mut self, curve: &C) {
        self.curves.push(ExportCurve::from_curve(curve));
        if let Some(remarks) = &mut self.remarks {
            remarks.push(curve.remarks().unwrap_or(NO_REMARKS).to_string());
        }
    }

    /// Append a curve with an explicit remark, switching to remarks mode if needed.
    pub fn push_with_remark(&mut self, curve: ExportCurve, remark: impl Into<String>) {
        let existing = self.curves.len();
        let remarks = self
            .remarks
            .get_or_insert_with(|| vec![NO_REMARKS.to_string(); existing]);
        remarks.push(remark.into());
        self.curves.push(curve);
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Remark for curve `index`, `None` in no-remarks mode.
    pub fn remark(&self, index: usize) -> Option<&str> {
        self.remarks
            .as_ref()
            .and_then(|r| r.get(index))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{tests::record, Graph};

    #[test]
    fn test_remarks_mode_follows_curves() {
        let graph = Graph::from_record(record(1, "Vib", &[100.0], &[1.0])).unwrap();

        let mut plain = ExportBundle::new();
        plain.push(&graph);
        assert_eq!(plain.remark(0), None);

        let mut with = ExportBundle::with_remarks();
        with.push(&graph);
        assert_eq!(with.remark(0), Some(NO_REMARKS));

        plain.push_with_remark(ExportCurve::from_curve(&graph), "late");
        assert_eq!(
            plain.remarks,
            Some(vec![NO_REMARKS.to_string(), "late".to_string()])
        );
        assert_eq!(plain.curves[0].x_label_with_unit(), "Frequency [Hz]");
    }
}
