//! ASCII Universal File Format (UFF) reading and writing.
//!
//! Only the datasets a vibrometer scan export carries are understood:
//!
//! | type | content                               |
//! |------|---------------------------------------|
//! | 151  | header (model, application, dates)    |
//! | 164  | units                                 |
//! | 2411 | node coordinates                      |
//! | 58   | function at nodal DOF (channel data)  |
//!
//! Everything else, including binary `58b`, is skipped.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use num_complex::Complex64;

use super::model::{ChannelRecord, Samples};

const DELIMITER: &str = "-1";

// ---------------------------------------------------------------------------
// Reader output
// ---------------------------------------------------------------------------

/// File-level metadata from datasets 151 and 164.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UffHeader {
    pub model_name: String,
    pub description: String,
    pub db_app: String,
    pub date_db_created: String,
    pub time_db_created: String,
    pub units_code: Option<u32>,
    pub units_description: String,
}

/// Everything read from one file.
#[derive(Debug, Clone, Default)]
pub struct UffContents {
    pub header: UffHeader,
    pub coordinates: BTreeMap<u32, [f64; 3]>,
    pub records: Vec<ChannelRecord>,
    /// Dataset types that were present but not read.
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Fixed-width column `[start, start + width)` (0-based), trimmed.
fn col(line: &str, start: usize, width: usize) -> &str {
    let end = (start + width).min(line.len());
    line.get(start.min(end)..end).unwrap_or("").trim()
}

/// Float with optional Fortran `D` exponent.
fn parse_f64(token: &str) -> Result<f64> {
    let cleaned = token.trim().replace(['D', 'd'], "E");
    cleaned
        .parse::<f64>()
        .with_context(|| format!("'{token}' is not a number"))
}

fn parse_int<T: std::str::FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .trim()
        .parse::<T>()
        .ok()
        .with_context(|| format!("{what}: '{token}' is not an integer"))
}

fn numbers(lines: &[&str]) -> Result<Vec<f64>> {
    lines
        .iter()
        .flat_map(|l| l.split_whitespace())
        .map(parse_f64)
        .collect()
}

// ---------------------------------------------------------------------------
// Dataset splitting
// ---------------------------------------------------------------------------

/// Split file text into `(type, body lines)` blocks.
fn datasets(text: &str) -> Vec<(String, Vec<&str>)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut inside = false;

    for line in text.lines() {
        if line.trim() == DELIMITER {
            if inside {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            inside = !inside;
            continue;
        }
        if !inside {
            continue;
        }
        match &mut current {
            None => {
                let kind = line.split_whitespace().next().unwrap_or("").to_string();
                current = Some((kind, Vec::new()));
            }
            Some((_, body)) => body.push(line),
        }
    }
    // tolerate a missing final delimiter
    if let Some(block) = current {
        blocks.push(block);
    }
    blocks
}

// ---------------------------------------------------------------------------
// Dataset parsers
// ---------------------------------------------------------------------------

fn parse_151(body: &[&str], header: &mut UffHeader) {
    let line = |i: usize| body.get(i).map(|l| l.trim().to_string()).unwrap_or_default();
    header.model_name = line(0);
    header.description = line(1);
    header.db_app = line(2);
    if let Some(dates) = body.get(3) {
        header.date_db_created = col(dates, 0, 10).to_string();
        header.time_db_created = col(dates, 10, 10).to_string();
    }
}

fn parse_164(body: &[&str], header: &mut UffHeader) -> Result<()> {
    let first = body.first().context("empty units dataset")?;
    header.units_code = Some(parse_int(col(first, 0, 10), "units code")?);
    header.units_description = col(first, 10, 20).to_string();
    Ok(())
}

fn parse_2411(body: &[&str], coordinates: &mut BTreeMap<u32, [f64; 3]>) -> Result<()> {
    for pair in body.chunks(2) {
        let [label_line, coord_line] = pair else {
            bail!("node record without coordinates");
        };
        let node: u32 = parse_int(col(label_line, 0, 10), "node label")?;
        let values = numbers(&[*coord_line])?;
        let [x, y, z] = values[..] else {
            bail!("node {node}: expected 3 coordinates, found {}", values.len());
        };
        coordinates.insert(node, [x, y, z]);
    }
    Ok(())
}

/// Ordinate data type codes of record 7.
fn data_layout(code: u32) -> Result<(bool, bool)> {
    // (complex, double)
    match code {
        2 => Ok((false, false)),
        4 => Ok((false, true)),
        5 => Ok((true, false)),
        6 => Ok((true, true)),
        other => bail!("unsupported ordinate data type {other}"),
    }
}

fn parse_58(body: &[&str], source_name: &str) -> Result<ChannelRecord> {
    if body.len() < 11 {
        bail!("function dataset has only {} header lines", body.len());
    }
    let id2 = body[1].trim().to_string();

    let r6 = body[5];
    let rsp_node: u32 = parse_int(col(r6, 41, 10), "response node")?;

    let r7 = body[6];
    let (is_complex, _) = data_layout(parse_int(col(r7, 0, 10), "ordinate data type")?)?;
    let num_pts: usize = parse_int(col(r7, 10, 10), "number of points")?;
    let even = parse_int::<u32>(col(r7, 20, 10), "abscissa spacing")? == 1;
    let abscissa_min = parse_f64(col(r7, 30, 13))?;
    let abscissa_inc = parse_f64(col(r7, 43, 13))?;

    let axis = |line: &str| (col(line, 26, 20).to_string(), col(line, 47, 20).to_string());
    let (abscissa_axis_lab, abscissa_axis_units_lab) = axis(body[7]);
    let (ordinate_axis_lab, ordinate_axis_units_lab) = axis(body[8]);

    let values = numbers(&body[11..])?;
    let per_point = match (even, is_complex) {
        (true, false) => 1,
        (true, true) => 2,
        (false, false) => 2,
        (false, true) => 3,
    };
    if values.len() != num_pts * per_point {
        bail!(
            "node {rsp_node}: expected {} values for {num_pts} points, found {}",
            num_pts * per_point,
            values.len()
        );
    }

    let (x, data) = if even {
        let x: Vec<f64> = (0..num_pts)
            .map(|i| abscissa_min + i as f64 * abscissa_inc)
            .collect();
        let data = if is_complex {
            Samples::Complex(values.chunks(2).map(|c| Complex64::new(c[0], c[1])).collect())
        } else {
            Samples::Real(values)
        };
        (x, data)
    } else {
        let rows = values.chunks(per_point);
        let x: Vec<f64> = rows.clone().map(|r| r[0]).collect();
        let data = if is_complex {
            Samples::Complex(rows.map(|r| Complex64::new(r[1], r[2])).collect())
        } else {
            Samples::Real(rows.map(|r| r[1]).collect())
        };
        (x, data)
    };

    Ok(ChannelRecord {
        x,
        data,
        abscissa_min,
        id4: source_name.to_string(),
        id2,
        rsp_node,
        abscissa_axis_lab,
        abscissa_axis_units_lab,
        ordinate_axis_lab,
        ordinate_axis_units_lab,
    })
}

// ---------------------------------------------------------------------------
// Public reader
// ---------------------------------------------------------------------------

/// Parse UFF text. `source_name` becomes every record's `id4`.
///
/// A malformed dataset is logged and skipped; only a file without any
/// dataset is an error.
pub fn parse_uff(text: &str, source_name: &str) -> Result<UffContents> {
    let blocks = datasets(text);
    if blocks.is_empty() {
        bail!("no UFF datasets found in {source_name}");
    }

    let mut contents = UffContents::default();
    for (index, (kind, body)) in blocks.iter().enumerate() {
        let outcome = match kind.as_str() {
            "151" => {
                parse_151(body, &mut contents.header);
                Ok(())
            }
            "164" => parse_164(body, &mut contents.header),
            "2411" => parse_2411(body, &mut contents.coordinates),
            "58" => parse_58(body, source_name).map(|r| contents.records.push(r)),
            other => {
                if other.ends_with('b') {
                    log::warn!("{source_name}: binary dataset {other} not supported, skipped");
                } else {
                    log::debug!("{source_name}: dataset type {other} skipped");
                }
                contents.skipped.push(other.to_string());
                Ok(())
            }
        };
        if let Err(e) = outcome {
            log::warn!("{source_name}: dataset #{index} (type {kind}) skipped: {e:#}");
            contents.skipped.push(kind.clone());
        }
    }

    log::debug!(
        "{source_name}: {} function record(s), {} node(s)",
        contents.records.len(),
        contents.coordinates.len()
    );
    Ok(contents)
}

/// Read a UFF file; records are attributed to the file's base name.
pub fn read_uff(path: &Path) -> Result<UffContents> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let source_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    parse_uff(&text, source_name).with_context(|| format!("parsing {}", path.display()))
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

fn open(out: &mut String, kind: &str) {
    let _ = writeln!(out, "{DELIMITER:>6}\n{kind:>6}");
}

fn close(out: &mut String) {
    let _ = writeln!(out, "{DELIMITER:>6}");
}

/// Evenly spaced abscissa: `Some((min, increment))`.
fn even_spacing(x: &[f64]) -> Option<(f64, f64)> {
    let (&first, rest) = x.split_first()?;
    let inc = rest.first().map(|&s| s - first).unwrap_or(0.0);
    let even = x
        .iter()
        .enumerate()
        .all(|(i, &v)| (v - (first + i as f64 * inc)).abs() <= 1e-9 * v.abs().max(1.0));
    even.then_some((first, inc))
}

fn write_58(out: &mut String, record: &ChannelRecord) {
    open(out, "58");
    let _ = writeln!(out, "{}", record.id2);
    let _ = writeln!(out, "{}", record.id2);
    let _ = writeln!(out, "NONE");
    let _ = writeln!(out, "{}", record.id4);
    let _ = writeln!(out, "NONE");
    let _ = writeln!(
        out,
        "{:5}{:10}{:5}{:10} {:<10}{:10}{:4} {:<10}{:10}{:4}",
        1, 0, 0, 0, "NONE", record.rsp_node, 3, "NONE", 0, 0
    );

    let (code, per_line) = match record.data {
        Samples::Real(_) => (4, 4),
        Samples::Complex(_) => (6, 4),
    };
    let spacing = even_spacing(&record.x);
    let (min, inc) = spacing.unwrap_or((record.abscissa_min, 0.0));
    let _ = writeln!(
        out,
        "{:10}{:10}{:10}{:13.5e}{:13.5e}{:13.5e}",
        code,
        record.x.len(),
        u8::from(spacing.is_some()),
        min,
        inc,
        0.0
    );
    let axis = |out: &mut String, lab: &str, units: &str| {
        let _ = writeln!(out, "{:10}{:5}{:5}{:5} {:<20} {:<20}", 0, 0, 0, 0, lab, units);
    };
    axis(out, &record.abscissa_axis_lab, &record.abscissa_axis_units_lab);
    axis(out, &record.ordinate_axis_lab, &record.ordinate_axis_units_lab);
    axis(out, "NONE", "NONE");
    axis(out, "NONE", "NONE");

    let mut values: Vec<f64> = Vec::new();
    for i in 0..record.x.len() {
        if spacing.is_none() {
            values.push(record.x[i]);
        }
        match &record.data {
            Samples::Real(v) => values.push(v.get(i).copied().unwrap_or(0.0)),
            Samples::Complex(v) => {
                let c = v.get(i).copied().unwrap_or_default();
                values.push(c.re);
                values.push(c.im);
            }
        }
    }
    for line in values.chunks(per_line) {
        for v in line {
            let _ = write!(out, "{v:20.12e}");
        }
        out.push('\n');
    }
    close(out);
}

/// Render a complete UFF document.
pub fn render_uff(
    header: &UffHeader,
    coordinates: &BTreeMap<u32, [f64; 3]>,
    records: &[ChannelRecord],
) -> String {
    let mut out = String::new();

    open(&mut out, "151");
    let _ = writeln!(out, "{}", header.model_name);
    let _ = writeln!(out, "{}", header.description);
    let _ = writeln!(out, "{}", header.db_app);
    let _ = writeln!(
        out,
        "{:<10}{:<10}{:10}{:10}{:10}",
        header.date_db_created, header.time_db_created, 0, 0, 0
    );
    let _ = writeln!(out, "{:<10}{:<10}", header.date_db_created, header.time_db_created);
    let _ = writeln!(out, "vibroscan");
    let _ = writeln!(out, "{:<10}{:<10}", header.date_db_created, header.time_db_created);
    close(&mut out);

    open(&mut out, "164");
    let _ = writeln!(
        out,
        "{:10}{:<20}{:10}",
        header.units_code.unwrap_or(1),
        header.units_description,
        2
    );
    let _ = writeln!(out, "{:25.16e}{:25.16e}{:25.16e}", 1.0, 1.0, 1.0);
    let _ = writeln!(out, "{:25.16e}", 273.15);
    close(&mut out);

    if !coordinates.is_empty() {
        open(&mut out, "2411");
        for (node, [x, y, z]) in coordinates {
            let _ = writeln!(out, "{:10}{:10}{:10}{:10}", node, 1, 1, 11);
            let _ = writeln!(out, "{x:25.16e}{y:25.16e}{z:25.16e}");
        }
        close(&mut out);
    }

    for record in records {
        write_58(&mut out, record);
    }
    out
}

pub fn write_uff(
    path: &Path,
    header: &UffHeader,
    coordinates: &BTreeMap<u32, [f64; 3]>,
    records: &[ChannelRecord],
) -> Result<()> {
    std::fs::write(path, render_uff(header, coordinates, records))
        .with_context(|| format!("writing UFF file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::record;
    use approx::assert_relative_eq;

    fn header() -> UffHeader {
        UffHeader {
            model_name: "Unit 7".into(),
            description: "top surface".into(),
            db_app: "PSV 10.0".into(),
            date_db_created: "01-Mar-24".into(),
            time_db_created: "10:15:00".into(),
            units_code: Some(1),
            units_description: "SI".into(),
        }
    }

    #[test]
    fn test_round_trip_through_text() {
        let mut even = record(3, "Vib Velocity", &[100.0, 125.0, 150.0], &[1.5, -2.25e-7, 3.0]);
        even.ordinate_axis_lab = "Velocity".into();
        let mut uneven = record(3, "Ref1 Sound Pressure", &[100.0, 130.0, 200.0], &[0.0; 3]);
        uneven.data = Samples::Complex(vec![
            Complex64::new(1.0, -1.0),
            Complex64::new(0.5, 0.0),
            Complex64::new(-3.0, 4.0),
        ]);
        let coords: BTreeMap<u32, [f64; 3]> = [(3, [0.1, -0.2, 0.0])].into_iter().collect();

        let text = render_uff(&header(), &coords, &[even.clone(), uneven.clone()]);
        let contents = parse_uff(&text, "Unit 7 top.uff").unwrap();

        assert_eq!(contents.header, header());
        assert_eq!(contents.coordinates, coords);
        assert_eq!(contents.records.len(), 2);

        let read = &contents.records[0];
        assert_eq!(read.rsp_node, 3);
        assert_eq!(read.id2, "Vib Velocity");
        assert_eq!(read.id4, "Unit 7 top.uff");
        assert_eq!(read.abscissa_axis_lab, "Frequency");
        assert_eq!(read.abscissa_axis_units_lab, "Hz");
        assert_eq!(read.ordinate_axis_lab, "Velocity");
        assert_eq!(read.x, vec![100.0, 125.0, 150.0]);
        match &read.data {
            Samples::Real(v) => assert_relative_eq!(v[1], -2.25e-7, max_relative = 1e-9),
            other => panic!("expected real data, got {other:?}"),
        }

        let read = &contents.records[1];
        assert_eq!(read.x, vec![100.0, 130.0, 200.0]);
        assert_eq!(read.data, uneven.data);
    }

    #[test]
    fn test_fortran_exponents_and_unknown_datasets() {
        let text = concat!(
            "    -1\n  2411\n",
            "         5         1         1        11\n",
            "  1.0D+00  2.5D-01  0.0D+00\n",
            "    -1\n    -1\n    82\nwhatever\n    -1\n",
        );
        let contents = parse_uff(text, "x.uff").unwrap();
        assert_eq!(contents.coordinates[&5], [1.0, 0.25, 0.0]);
        assert_eq!(contents.skipped, vec!["82".to_string()]);
    }

    #[test]
    fn test_broken_function_dataset_is_skipped() {
        let good = record(1, "Vib Velocity", &[10.0, 20.0], &[1.0, 2.0]);
        let mut text = render_uff(&UffHeader::default(), &BTreeMap::new(), &[good]);
        text.push_str("    -1\n    58\nshort\n    -1\n");
        let contents = parse_uff(&text, "x.uff").unwrap();
        assert_eq!(contents.records.len(), 1);
        assert_eq!(contents.skipped, vec!["58".to_string()]);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        assert!(parse_uff("", "x.uff").is_err());
    }

    #[test]
    fn test_read_from_disk_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Proto left.uff");
        let rec = record(2, "Vib Velocity", &[10.0], &[1.0]);
        write_uff(&path, &UffHeader::default(), &BTreeMap::new(), &[rec]).unwrap();
        let contents = read_uff(&path).unwrap();
        assert_eq!(contents.records[0].id4, "Proto left.uff");
    }
}
