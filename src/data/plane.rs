use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::config::AnalysisConfig;

use super::average::{GraphAverage, SurfaceAverage};
use super::channel::{ChannelKey, DecibelReferences, RECORDS_PER_POINT};
use super::error::{join_points, AnalysisError, BandViolation, Result};
use super::model::{scan_stem, ChannelRecord, Graph};
use super::review::{AnomalyReviewer, BandContext, BandPlanner, ReviewPage};
use super::scan_point::ScanPoint;
use super::uff::{UffContents, UffHeader};

/// Spatial location of a scan point.
pub type Coordinate = [f64; 3];

// ---------------------------------------------------------------------------
// Scan-point assembly
// ---------------------------------------------------------------------------

/// Group function records into scan points.
///
/// Records are grouped by scan point number in order of first appearance;
/// a group without exactly eight records is logged and dropped, the rest of
/// the file is still used.
pub fn assemble_scan_points(
    scan_name: &str,
    records: Vec<ChannelRecord>,
    references: &DecibelReferences,
) -> Vec<ScanPoint> {
    let mut order: Vec<u32> = Vec::new();
    let mut groups: BTreeMap<u32, Vec<ChannelRecord>> = BTreeMap::new();
    for record in records {
        let node = record.rsp_node;
        groups
            .entry(node)
            .or_insert_with(|| {
                order.push(node);
                Vec::with_capacity(RECORDS_PER_POINT)
            })
            .push(record);
    }

    let mut points = Vec::with_capacity(order.len());
    for node in order {
        let Some(group) = groups.remove(&node) else {
            continue;
        };
        match ScanPoint::new(group, *references) {
            Ok(point) => points.push(point),
            Err(AnalysisError::IncompleteScanPoint { point, found, expected, .. }) => {
                log::warn!(
                    "{scan_name}: scan point {point} has {found} of {expected} channel records, skipped"
                );
            }
            Err(e) => log::warn!("{scan_name}: scan point {node} skipped: {e}"),
        }
    }
    points
}

// ---------------------------------------------------------------------------
// MeasurementPlane – one scanned surface
// ---------------------------------------------------------------------------

/// Default band colour names, cycled when there are more bands.
pub const DEFAULT_BAND_COLOURS: [&str; 10] = [
    "blue", "orange", "green", "red", "purple", "brown", "pink", "olive", "cyan", "magenta",
];

/// All scan points read from one file plus the exclusion and band state
/// decided for them.
#[derive(Debug, Clone)]
pub struct MeasurementPlane {
    scan_name: String,
    header: UffHeader,
    scan_points: Vec<ScanPoint>,
    coordinates: BTreeMap<u32, Coordinate>,
    anomalous_points: BTreeSet<u32>,
    all_bands: Vec<Vec<u32>>,
    band_colours: Vec<String>,
}

impl MeasurementPlane {
    /// Build a plane from reader output; incomplete points are dropped.
    pub fn from_records(
        scan_name: impl Into<String>,
        records: Vec<ChannelRecord>,
        coordinates: BTreeMap<u32, Coordinate>,
        references: &DecibelReferences,
    ) -> Result<Self> {
        let scan_name = scan_name.into();
        let scan_points = assemble_scan_points(&scan_name, records, references);
        if scan_points.is_empty() {
            return Err(AnalysisError::NoScanPoints { scan: scan_name });
        }
        log::info!("{scan_name}: {} scan point(s) ingested", scan_points.len());
        Ok(MeasurementPlane {
            scan_name,
            header: UffHeader::default(),
            scan_points,
            coordinates,
            anomalous_points: BTreeSet::new(),
            all_bands: Vec::new(),
            band_colours: DEFAULT_BAND_COLOURS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn from_uff(
        scan_name: impl Into<String>,
        contents: UffContents,
        config: &AnalysisConfig,
    ) -> Result<Self> {
        let plane = Self::from_records(
            scan_name,
            contents.records,
            contents.coordinates,
            &config.decibel_references,
        )?;
        Ok(plane
            .with_header(contents.header)
            .with_band_colours(config.band_colours.clone()))
    }

    /// Read and ingest a measurement file.
    pub fn load(path: &Path, config: &AnalysisConfig) -> anyhow::Result<Self> {
        let contents = super::loader::load_file(path)?;
        let scan_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Self::from_uff(scan_name, contents, config)
            .with_context(|| format!("building measurement plane from {}", path.display()))
    }

    pub fn with_header(mut self, header: UffHeader) -> Self {
        self.header = header;
        self
    }

    pub fn with_band_colours(mut self, colours: Vec<String>) -> Self {
        if !colours.is_empty() {
            self.band_colours = colours;
        }
        self
    }

    pub fn scan_name(&self) -> &str {
        &self.scan_name
    }

    pub fn header(&self) -> &UffHeader {
        &self.header
    }

    pub fn scan_points(&self) -> &[ScanPoint] {
        &self.scan_points
    }

    pub fn len(&self) -> usize {
        self.scan_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scan_points.is_empty()
    }

    pub fn point(&self, number: u32) -> Option<&ScanPoint> {
        self.scan_points
            .iter()
            .find(|p| p.scan_point_number() == number)
    }

    pub fn point_numbers(&self) -> Vec<u32> {
        self.scan_points
            .iter()
            .map(|p| p.scan_point_number())
            .collect()
    }

    pub fn coordinates(&self) -> &BTreeMap<u32, Coordinate> {
        &self.coordinates
    }

    pub fn anomalous_points(&self) -> &BTreeSet<u32> {
        &self.anomalous_points
    }

    /// Replace the exclusion set, e.g. with checkboxes ticked in the viewer.
    pub fn set_anomalous_points(&mut self, points: BTreeSet<u32>) {
        self.anomalous_points = points;
        self.drop_anomalous_from_bands();
    }

    /// Remove anomalous points from existing bands; a band left empty goes too.
    fn drop_anomalous_from_bands(&mut self) {
        let anomalous = &self.anomalous_points;
        let scan_name = &self.scan_name;
        for (i, band) in self.all_bands.iter_mut().enumerate() {
            let dropped: Vec<u32> = band
                .iter()
                .copied()
                .filter(|n| anomalous.contains(n))
                .collect();
            if !dropped.is_empty() {
                log::warn!(
                    "{scan_name}: anomalous point(s) {} removed from band {}",
                    join_points(&dropped),
                    i + 1
                );
                band.retain(|n| !anomalous.contains(n));
            }
        }
        self.all_bands.retain(|band| !band.is_empty());
    }

    pub fn bands(&self) -> &[Vec<u32>] {
        &self.all_bands
    }

    pub fn band_colour(&self, index: usize) -> &str {
        if self.band_colours.is_empty() {
            return "grey";
        }
        &self.band_colours[index % self.band_colours.len()]
    }

    /// Every point's graph for `channel`, in ingestion order.
    pub fn graphs(&self, channel: ChannelKey) -> Result<Vec<Arc<Graph>>> {
        self.scan_points.iter().map(|p| p.graph(channel)).collect()
    }

    /// Coordinates split into (valid, anomalous) points.
    pub fn coordinates_partition(&self) -> (Vec<(u32, Coordinate)>, Vec<(u32, Coordinate)>) {
        self.coordinates
            .iter()
            .map(|(&n, &c)| (n, c))
            .partition(|(n, _)| !self.anomalous_points.contains(n))
    }

    // -----------------------------------------------------------------------
    // Anomaly exclusion and averaging
    // -----------------------------------------------------------------------

    /// Show every point's `channel` graph to `reviewer`, two at a time, and
    /// store the union of its answers as the plane's anomalous points.
    pub fn determine_anomalies(
        &mut self,
        channel: ChannelKey,
        reviewer: &mut dyn AnomalyReviewer,
    ) -> Result<BTreeSet<u32>> {
        let graphs = self.graphs(channel)?;
        let known: BTreeSet<u32> = self.point_numbers().into_iter().collect();
        let page_count = graphs.len().div_ceil(2);

        let mut excluded = BTreeSet::new();
        for (page, chunk) in graphs.chunks(2).enumerate() {
            let request = ReviewPage {
                plane: &self.scan_name,
                channel,
                graphs: chunk,
                page,
                page_count,
                total_points: graphs.len(),
            };
            for point in reviewer.review(&request) {
                if known.contains(&point) {
                    excluded.insert(point);
                } else {
                    log::warn!("{}: reviewer excluded unknown scan point {point}", self.scan_name);
                }
            }
        }

        if excluded.is_empty() {
            log::info!("No anomalous scan points for {} ({channel}).", scan_stem(&self.scan_name));
        } else {
            let points: Vec<u32> = excluded.iter().copied().collect();
            log::info!(
                "Anomalous scan points excluded for {} ({channel}): {}",
                scan_stem(&self.scan_name),
                join_points(&points)
            );
        }
        self.set_anomalous_points(excluded.clone());
        Ok(excluded)
    }

    /// Average `channel` over every point not in `excluded`.
    ///
    /// A plane of one point returns that point's graph itself. Excluding every
    /// point is an [`AnalysisError::AllPointsExcluded`] failure.
    pub fn average(&self, channel: ChannelKey, excluded: &BTreeSet<u32>) -> Result<SurfaceAverage> {
        let (kept, dropped): (Vec<&ScanPoint>, Vec<&ScanPoint>) = self
            .scan_points
            .iter()
            .partition(|p| !excluded.contains(&p.scan_point_number()));
        let dropped: BTreeSet<u32> = dropped.iter().map(|p| p.scan_point_number()).collect();

        if kept.is_empty() {
            let err = AnalysisError::AllPointsExcluded {
                plane: self.scan_name.clone(),
                channel,
                excluded: dropped.into_iter().collect(),
            };
            log::error!("{err}");
            return Err(err);
        }

        if self.scan_points.len() == 1 {
            return Ok(SurfaceAverage::Single(kept[0].graph(channel)?));
        }

        let graphs = kept
            .iter()
            .map(|p| p.graph(channel))
            .collect::<Result<Vec<_>>>()?;
        Ok(SurfaceAverage::Mean(GraphAverage::new(&graphs, &dropped, None)?))
    }

    /// Ask `reviewer` for the exclusion set, then average.
    pub fn review_average(
        &mut self,
        channel: ChannelKey,
        reviewer: &mut dyn AnomalyReviewer,
    ) -> Result<SurfaceAverage> {
        let excluded = self.determine_anomalies(channel, reviewer)?;
        self.average(channel, &excluded)
    }

    // -----------------------------------------------------------------------
    // Bands
    // -----------------------------------------------------------------------

    fn assigned(&self) -> BTreeSet<u32> {
        self.all_bands.iter().flatten().copied().collect()
    }

    /// Points neither anomalous nor already in a band.
    pub fn unassigned_points(&self) -> Vec<u32> {
        let assigned = self.assigned();
        self.point_numbers()
            .into_iter()
            .filter(|p| !assigned.contains(p) && !self.anomalous_points.contains(p))
            .collect()
    }

    /// Check a proposed band against the existing points, the anomalous set
    /// and earlier bands.
    pub fn validate_band(&self, points: &[u32]) -> Result<()> {
        let known: BTreeSet<u32> = self.point_numbers().into_iter().collect();
        let mut taken = self.assigned();
        let mut violations = Vec::new();

        if points.is_empty() {
            violations.push(BandViolation::Empty);
        }
        for &p in points {
            if !known.contains(&p) {
                violations.push(BandViolation::OutOfRange(p));
            } else if self.anomalous_points.contains(&p) {
                violations.push(BandViolation::Anomalous(p));
            } else if !taken.insert(p) {
                violations.push(BandViolation::AlreadyAssigned(p));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::InvalidBandDefinition {
                plane: self.scan_name.clone(),
                band: self.all_bands.len() + 1,
                violations,
            })
        }
    }

    /// Append one band after validation; the plane is unchanged on error.
    pub fn add_band(&mut self, points: Vec<u32>) -> Result<()> {
        self.validate_band(&points)?;
        self.all_bands.push(points);
        Ok(())
    }

    pub fn clear_bands(&mut self) {
        self.all_bands.clear();
    }

    fn band_context(&self, channel: ChannelKey) -> BandContext<'_> {
        BandContext {
            plane: &self.scan_name,
            channel,
            band_number: self.all_bands.len() + 1,
            anomalous: &self.anomalous_points,
            bands: &self.all_bands,
            unassigned: self.unassigned_points(),
        }
    }

    /// Partition the non-anomalous points into bands proposed by `planner`.
    ///
    /// Starts from no bands. A rejected proposal is reported back to the
    /// planner and asked for again; planning stops when every valid point is
    /// assigned or the planner returns `None`.
    pub fn create_bands(
        &mut self,
        channel: ChannelKey,
        planner: &mut dyn BandPlanner,
    ) -> &[Vec<u32>] {
        self.all_bands.clear();
        loop {
            let ctx = self.band_context(channel);
            if ctx.unassigned.is_empty() {
                break;
            }
            let Some(proposal) = planner.propose(&ctx) else {
                break;
            };
            if let Err(e) = self.validate_band(&proposal) {
                log::warn!("{e}");
                planner.rejected(&self.band_context(channel), &e);
                continue;
            }
            self.all_bands.push(proposal);
        }
        &self.all_bands
    }

    /// One average per declared band, named `Band 1`, `Band 2`, …
    pub fn band_averages(&self, channel: ChannelKey) -> Result<Vec<GraphAverage>> {
        self.all_bands
            .iter()
            .enumerate()
            .map(|(i, band)| {
                let graphs = band
                    .iter()
                    .map(|&n| {
                        self.point(n)
                            .ok_or(AnalysisError::InvalidBandDefinition {
                                plane: self.scan_name.clone(),
                                band: i + 1,
                                violations: vec![BandViolation::OutOfRange(n)],
                            })
                            .and_then(|p| p.graph(channel))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let name = format!("Band {}", i + 1);
                let average = GraphAverage::new(&graphs, &BTreeSet::new(), Some(&name))?;
                Ok(average.with_remarks(format!(
                    "Band colour: {}. Band points: {}",
                    self.band_colour(i),
                    join_points(band)
                )))
            })
            .collect()
    }

    /// Review anomalies, plan bands and average each band.
    pub fn review_band_averages(
        &mut self,
        channel: ChannelKey,
        reviewer: &mut dyn AnomalyReviewer,
        planner: &mut dyn BandPlanner,
    ) -> Result<Vec<GraphAverage>> {
        self.determine_anomalies(channel, reviewer)?;
        self.create_bands(channel, planner);
        self.band_averages(channel)
    }
}
