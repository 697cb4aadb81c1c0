use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{ExportBundle, ExportCurve};

// ---------------------------------------------------------------------------
// CSV curve table → export bundle
// ---------------------------------------------------------------------------

/// One row of a curve table: `curvename,frequency,response_magnitude`.
#[derive(Debug, Deserialize)]
struct CurveRow {
    curvename: String,
    frequency: f64,
    response_magnitude: f64,
}

/// Read a curve table from a file. See [`read_curve_table`].
pub fn load_curve_table(path: &Path) -> Result<ExportBundle> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening curve table {}", path.display()))?;
    read_curve_table(file).with_context(|| format!("reading curve table {}", path.display()))
}

/// Group rows by curve name (first appearance order) into a bundle of
/// frequency responses in `dBSPL/V`, without remarks.
pub fn read_curve_table<R: Read>(input: R) -> Result<ExportBundle> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut bundle = ExportBundle::new();

    for (i, row) in reader.deserialize::<CurveRow>().enumerate() {
        // header is line 1
        let row = row.with_context(|| format!("row {}", i + 2))?;
        let idx = match bundle
            .curves
            .iter()
            .position(|c| c.plot_title == row.curvename)
        {
            Some(idx) => idx,
            None => {
                bundle.curves.push(ExportCurve {
                    plot_title: row.curvename.clone(),
                    x_label: "Frequency".into(),
                    x_unit: "Hz".into(),
                    x: Vec::new(),
                    y_label: "Response_Magnitude".into(),
                    y_unit: "dBSPL/V".into(),
                    y: Vec::new(),
                    x_min: row.frequency,
                });
                bundle.curves.len() - 1
            }
        };
        let curve = &mut bundle.curves[idx];
        curve.x.push(row.frequency);
        curve.y.push(row.response_magnitude);
        curve.x_min = curve.x_min.min(row.frequency);
    }

    if bundle.is_empty() {
        bail!("curve table has no rows");
    }
    log::info!("curve table: {} curve(s)", bundle.len());
    Ok(bundle)
}
