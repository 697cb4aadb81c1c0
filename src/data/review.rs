use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Write};
use std::sync::Arc;

use super::channel::ChannelKey;
use super::error::{join_points, AnalysisError};
use super::model::{scan_stem, Graph};

// ---------------------------------------------------------------------------
// Anomaly review
// ---------------------------------------------------------------------------

/// One page of scan-point graphs shown to a reviewer (one or two points).
#[derive(Debug, Clone)]
pub struct ReviewPage<'a> {
    pub plane: &'a str,
    pub channel: ChannelKey,
    pub graphs: &'a [Arc<Graph>],
    pub page: usize,
    pub page_count: usize,
    pub total_points: usize,
}

impl ReviewPage<'_> {
    pub fn point_numbers(&self) -> Vec<u32> {
        self.graphs.iter().map(|g| g.scan_point_number).collect()
    }
}

/// Decides which scan points are excluded from an average.
///
/// Called once per page; returns the point numbers to exclude. Blocking
/// implementations (console, dialogs) are fine, the engine waits.
pub trait AnomalyReviewer {
    fn review(&mut self, page: &ReviewPage<'_>) -> BTreeSet<u32>;
}

/// Batch strategy: answers from exclusion sets known in advance.
///
/// Overrides are keyed by plane (scan name) and channel; any other request
/// uses the default set. Only the points on the current page are returned.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedReviewer {
    default: BTreeSet<u32>,
    overrides: BTreeMap<(String, ChannelKey), BTreeSet<u32>>,
}

impl PrecomputedReviewer {
    pub fn new(default: impl IntoIterator<Item = u32>) -> Self {
        Self {
            default: default.into_iter().collect(),
            overrides: BTreeMap::new(),
        }
    }

    /// Accept every point.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_override(
        mut self,
        plane: impl Into<String>,
        channel: ChannelKey,
        excluded: impl IntoIterator<Item = u32>,
    ) -> Self {
        self.overrides
            .insert((plane.into(), channel), excluded.into_iter().collect());
        self
    }

    fn set_for(&self, plane: &str, channel: ChannelKey) -> &BTreeSet<u32> {
        self.overrides
            .get(&(plane.to_string(), channel))
            .unwrap_or(&self.default)
    }
}

impl AnomalyReviewer for PrecomputedReviewer {
    fn review(&mut self, page: &ReviewPage<'_>) -> BTreeSet<u32> {
        let wanted = self.set_for(page.plane, page.channel);
        page.point_numbers()
            .into_iter()
            .filter(|p| wanted.contains(p))
            .collect()
    }
}

/// Interactive strategy over any text stream (stdin/stdout in practice).
///
/// A single-point plane asks `Y/N`; a page of two accepts `both`, a point
/// number, or an empty line. Invalid input re-prompts.
pub struct ConsoleReviewer<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = write!(self.output, "{text}").and_then(|_| self.output.flush()) {
            log::debug!("console reviewer output failed: {e}");
        }
    }
}

impl<R: BufRead, W: Write> AnomalyReviewer for ConsoleReviewer<R, W> {
    fn review(&mut self, page: &ReviewPage<'_>) -> BTreeSet<u32> {
        let points = page.point_numbers();
        self.say(&format!(
            "\n{}, {} (page {}/{}), scan point(s): {}\n",
            scan_stem(page.plane),
            page.channel,
            page.page + 1,
            page.page_count,
            join_points(&points)
        ));

        if page.total_points == 1 {
            self.say("Note that there is only one scan point in this measurement.\n");
            loop {
                self.say("Is the scan point anomalous? Y or N: ");
                // end of input counts as "no"
                let Some(answer) = self.read_line() else {
                    return BTreeSet::new();
                };
                match answer.as_str() {
                    "Y" | "y" => return points.into_iter().collect(),
                    "" | "N" | "n" => return BTreeSet::new(),
                    _ => self.say("Invalid input. Please try again.\n"),
                }
            }
        }

        self.say("Type 'both', a single scan point number, or just enter for none.\n");
        loop {
            self.say("Scan points to exclude: ");
            let Some(answer) = self.read_line() else {
                return BTreeSet::new();
            };
            if answer.is_empty() {
                return BTreeSet::new();
            }
            if answer.eq_ignore_ascii_case("both") {
                return points.into_iter().collect();
            }
            match answer.parse::<u32>() {
                Ok(p) if points.contains(&p) => {
                    return [p].into_iter().collect();
                }
                Ok(_) => self.say(
                    "The scan point number does not exist in this measurement. Please try again.\n",
                ),
                Err(_) => self.say("Invalid input. Please try again.\n"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Band planning
// ---------------------------------------------------------------------------

/// State of band planning handed to a planner before each proposal.
#[derive(Debug, Clone)]
pub struct BandContext<'a> {
    pub plane: &'a str,
    pub channel: ChannelKey,
    /// 1-based number of the band being defined.
    pub band_number: usize,
    pub anomalous: &'a BTreeSet<u32>,
    pub bands: &'a [Vec<u32>],
    /// Points neither anomalous nor assigned yet.
    pub unassigned: Vec<u32>,
}

/// Proposes bands one at a time; `None` ends planning.
pub trait BandPlanner {
    fn propose(&mut self, ctx: &BandContext<'_>) -> Option<Vec<u32>>;

    /// The last proposal was refused; the next `propose` is a re-prompt.
    fn rejected(&mut self, _ctx: &BandContext<'_>, _error: &AnalysisError) {}
}

/// Batch strategy: hands out predefined bands in order.
#[derive(Debug, Clone, Default)]
pub struct PresetBandPlanner {
    bands: std::collections::VecDeque<Vec<u32>>,
}

impl PresetBandPlanner {
    pub fn new(bands: impl IntoIterator<Item = Vec<u32>>) -> Self {
        Self {
            bands: bands.into_iter().collect(),
        }
    }
}

impl BandPlanner for PresetBandPlanner {
    fn propose(&mut self, _ctx: &BandContext<'_>) -> Option<Vec<u32>> {
        self.bands.pop_front()
    }

    fn rejected(&mut self, ctx: &BandContext<'_>, error: &AnalysisError) {
        log::warn!("preset band {} skipped: {error}", ctx.band_number);
    }
}

/// Parse `1-2-3` band syntax.
pub fn parse_band(text: &str) -> Option<Vec<u32>> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.split('-').map(|t| t.parse::<u32>().ok()).collect()
}

/// Interactive strategy: `Band N: 1-2-3`; an empty line finishes.
pub struct ConsoleBandPlanner<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleBandPlanner<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = write!(self.output, "{text}").and_then(|_| self.output.flush()) {
            log::debug!("console planner output failed: {e}");
        }
    }
}

impl<R: BufRead, W: Write> BandPlanner for ConsoleBandPlanner<R, W> {
    fn propose(&mut self, ctx: &BandContext<'_>) -> Option<Vec<u32>> {
        if ctx.band_number == 1 && ctx.bands.is_empty() {
            self.say(
                "\nKey in point numbers to include in the band, separated by a dash (e.g. 1-2-3).\n\
                 Anomalous points cannot be chosen and no point may be in two bands.\n\
                 Press enter on an empty line to finish.\n",
            );
        }
        loop {
            self.say(&format!(
                "Unassigned: {}\nBand {}: ",
                join_points(&ctx.unassigned),
                ctx.band_number
            ));
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            if line.trim().is_empty() {
                return None;
            }
            match parse_band(&line) {
                Some(points) => return Some(points),
                None => self.say(
                    "Input must be integer point numbers separated by a dash. Please define this band again.\n",
                ),
            }
        }
    }

    fn rejected(&mut self, _ctx: &BandContext<'_>, error: &AnalysisError) {
        self.say(&format!("{error}\nPlease define this band again.\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::channel::Channel;
    use crate::data::model::tests::record;
    use std::io::Cursor;

    fn graphs(points: &[u32]) -> Vec<Arc<Graph>> {
        points
            .iter()
            .map(|&p| Arc::new(Graph::from_record(record(p, "Vib", &[1.0], &[1.0])).unwrap()))
            .collect()
    }

    fn page<'a>(graphs: &'a [Arc<Graph>], total: usize) -> ReviewPage<'a> {
        ReviewPage {
            plane: "a top.uff",
            channel: ChannelKey::decibel(Channel::Vib),
            graphs,
            page: 0,
            page_count: 1,
            total_points: total,
        }
    }

    #[test]
    fn test_precomputed_answers_only_page_points() {
        let g = graphs(&[3, 4]);
        let mut reviewer = PrecomputedReviewer::new([1, 4])
            .with_override("other.uff", ChannelKey::decibel(Channel::Vib), [3]);
        let got = reviewer.review(&page(&g, 6));
        assert_eq!(got, [4].into_iter().collect());
    }

    #[test]
    fn test_precomputed_override() {
        let g = graphs(&[3, 4]);
        let mut reviewer = PrecomputedReviewer::new([4])
            .with_override("a top.uff", ChannelKey::decibel(Channel::Vib), [3]);
        assert_eq!(reviewer.review(&page(&g, 6)), [3].into_iter().collect());
    }

    #[test]
    fn test_console_pair_protocol() {
        let g = graphs(&[1, 2]);
        let input = Cursor::new("what\n9\nboth\n");
        let mut reviewer = ConsoleReviewer::new(input, Vec::new());
        let got = reviewer.review(&page(&g, 4));
        assert_eq!(got, [1, 2].into_iter().collect());
        let (_, out) = reviewer.into_inner();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Invalid input"));
        assert!(text.contains("does not exist"));
    }

    #[test]
    fn test_console_accepts_page_node_numbers() {
        let g = graphs(&[101, 102]);
        let mut reviewer = ConsoleReviewer::new(Cursor::new("1\n102\n"), Vec::new());
        assert_eq!(reviewer.review(&page(&g, 2)), [102].into_iter().collect());
        let (_, out) = reviewer.into_inner();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("does not exist").count(), 1);
    }

    #[test]
    fn test_console_single_point() {
        let g = graphs(&[1]);
        let mut reviewer = ConsoleReviewer::new(Cursor::new("maybe\ny\n"), Vec::new());
        assert_eq!(reviewer.review(&page(&g, 1)), [1].into_iter().collect());

        let mut reviewer = ConsoleReviewer::new(Cursor::new("\n"), Vec::new());
        assert!(reviewer.review(&page(&g, 1)).is_empty());
    }

    #[test]
    fn test_parse_band() {
        assert_eq!(parse_band("1-2-3"), Some(vec![1, 2, 3]));
        assert_eq!(parse_band(" 4 - 5 "), Some(vec![4, 5]));
        assert_eq!(parse_band("1,2"), None);
        assert_eq!(parse_band(""), None);
    }
}
