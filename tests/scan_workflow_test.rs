use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Result;
use approx::assert_relative_eq;
use tempfile::tempdir;
use vibroscan::data::model::{ChannelRecord, Samples};
use vibroscan::data::uff::{write_uff, UffHeader};
use vibroscan::data::{
    AnalysisError, Channel, ChannelKey, Curve, DecibelReferences, Device, MeasurementPlane,
    PrecomputedReviewer, PresetBandPlanner, Unit,
};
use vibroscan::export::hxml::write_hxml;
use vibroscan::AnalysisConfig;

/// All eight records of one point; every channel carries `y`.
fn point(scan: &str, number: u32, x: &[f64], y: &[f64]) -> Vec<ChannelRecord> {
    Channel::RECORDED
        .into_iter()
        .map(|channel| ChannelRecord {
            x: x.to_vec(),
            data: Samples::Real(y.to_vec()),
            abscissa_min: x[0],
            id4: scan.to_string(),
            id2: channel.description().to_string(),
            rsp_node: number,
            abscissa_axis_lab: "Frequency".into(),
            abscissa_axis_units_lab: "Hz".into(),
            ordinate_axis_lab: "Velocity".into(),
            ordinate_axis_units_lab: "m/s".into(),
        })
        .collect()
}

fn write_scan(dir: &Path, file_name: &str, ys: &[[f64; 2]]) -> Result<std::path::PathBuf> {
    let mut records = Vec::new();
    let mut coordinates = BTreeMap::new();
    for (i, y) in ys.iter().enumerate() {
        let n = i as u32 + 1;
        records.extend(point(file_name, n, &[100.0, 200.0], y));
        coordinates.insert(n, [i as f64 * 0.001, 0.0, 0.0]);
    }
    let header = UffHeader {
        model_name: file_name.to_string(),
        db_app: "scan_workflow_test".into(),
        ..Default::default()
    };
    let path = dir.join(file_name);
    write_uff(&path, &header, &coordinates, &records)?;
    Ok(path)
}

#[test]
fn test_average_excluding_a_point_from_file() -> Result<()> {
    let dir = tempdir()?;
    let path = write_scan(
        dir.path(),
        "Unit 3 top.uff",
        &[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]],
    )?;

    let plane = MeasurementPlane::load(&path, &AnalysisConfig::default())?;
    assert_eq!(plane.scan_name(), "Unit 3 top.uff");
    assert_eq!(plane.point_numbers(), vec![1, 2, 3, 4]);
    assert_eq!(plane.coordinates().len(), 4);

    let key: ChannelKey = "vib".parse()?;
    let avg = plane.average(key, &BTreeSet::from([2]))?;
    let y = avg.y_data();
    assert_relative_eq!(y[0], 13.0 / 3.0, epsilon = 1e-9);
    assert_relative_eq!(y[1], 16.0 / 3.0, epsilon = 1e-9);
    assert_eq!(avg.remarks(), Some("Anomalous point(s) excluded: 2"));
    Ok(())
}

#[test]
fn test_excluding_everything_fails() -> Result<()> {
    let dir = tempdir()?;
    let path = write_scan(dir.path(), "Unit 3 left.uff", &[[1.0, 2.0], [3.0, 4.0]])?;
    let plane = MeasurementPlane::load(&path, &AnalysisConfig::default())?;

    let err = plane
        .average(ChannelKey::linear(Channel::Vib), &BTreeSet::from([1, 2]))
        .unwrap_err();
    assert!(matches!(err, AnalysisError::AllPointsExcluded { .. }));
    Ok(())
}

#[test]
fn test_ref1_rollup_over_two_surfaces() {
    let refs = DecibelReferences::default();
    let top = MeasurementPlane::from_records(
        "Unit 9 top.uff",
        point("Unit 9 top.uff", 1, &[100.0], &[10.0]),
        BTreeMap::new(),
        &refs,
    )
    .unwrap();
    let left = MeasurementPlane::from_records(
        "Unit 9 left.uff",
        point("Unit 9 left.uff", 1, &[100.0], &[20.0]),
        BTreeMap::new(),
        &refs,
    )
    .unwrap();

    let device = Device::from_planes(vec![top, left]).unwrap();
    assert_eq!(device.device_name(), "Unit 9");
    let rollup = device.ref1_average(Unit::Linear).unwrap();
    assert_eq!(rollup.y, vec![15.0]);
}

#[test]
fn test_bands_stay_disjoint() -> Result<()> {
    let dir = tempdir()?;
    let path = write_scan(
        dir.path(),
        "Unit 3 right.uff",
        &[[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 5.0]],
    )?;
    let mut plane = MeasurementPlane::load(&path, &AnalysisConfig::default())?;
    let key = ChannelKey::linear(Channel::Vib);

    plane.determine_anomalies(key, &mut PrecomputedReviewer::new([5]))?;
    assert_eq!(plane.anomalous_points(), &BTreeSet::from([5]));

    // overlapping, anomalous and unknown proposals are all refused
    let mut planner = PresetBandPlanner::new([
        vec![1, 2],
        vec![2, 3],
        vec![5],
        vec![9],
        vec![3, 4],
    ]);
    let bands = plane.create_bands(key, &mut planner).to_vec();
    assert_eq!(bands, vec![vec![1, 2], vec![3, 4]]);

    let mut seen = BTreeSet::new();
    for band in &bands {
        for n in band {
            assert!(seen.insert(*n), "point {n} in two bands");
            assert!(!plane.anomalous_points().contains(n));
        }
    }

    let averages = plane.band_averages(key)?;
    assert_eq!(averages[0].y, vec![1.5, 1.5]);
    assert_eq!(averages[1].y, vec![3.5, 3.5]);
    Ok(())
}

#[test]
fn test_device_export_to_hxml() -> Result<()> {
    let dir = tempdir()?;
    let paths = vec![
        write_scan(dir.path(), "Unit 4 top.uff", &[[1.0, 2.0], [3.0, 4.0]])?,
        write_scan(dir.path(), "Unit 4 left.uff", &[[1.0, 2.0], [3.0, 4.0]])?,
        write_scan(dir.path(), "Unit 4 right.uff", &[[1.0, 2.0], [3.0, 4.0]])?,
    ];
    let mut device = Device::load(paths.as_slice(), &AnalysisConfig::default())?;
    let bundle = device.export(&mut PrecomputedReviewer::none())?;
    // ref1 + ref3 rollups, then three channels per surface
    assert_eq!(bundle.len(), 2 + 3 * 3);

    let out = dir.path().join("Unit 4.hxml");
    write_hxml(&out, &bundle)?;
    let text = std::fs::read_to_string(&out)?;
    assert!(text.starts_with("<?xml"));
    assert_eq!(text.matches("<curvedata ").count(), 11);
    assert!(text.contains("No anomalous points."));
    Ok(())
}
