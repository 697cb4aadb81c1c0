use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::channel::{Channel, ChannelKey, DecibelReferences, Source, Unit, RECORDS_PER_POINT};
use super::error::{AnalysisError, Result};
use super::model::{quotient, to_decibel, ChannelRecord, Graph};

// ---------------------------------------------------------------------------
// ScanPoint – the eight recorded channels of one measurement location
// ---------------------------------------------------------------------------

/// One spatial measurement location.
///
/// Quotient and decibel graphs are derived on first request and memoized;
/// later requests return the same `Arc`. Recorded graphs are never touched.
#[derive(Debug, Clone)]
pub struct ScanPoint {
    scan_point_number: u32,
    recorded: [Arc<Graph>; RECORDS_PER_POINT],
    references: DecibelReferences,
    // indexed by Channel::index(); recorded channels never fill their slot
    linear: [OnceCell<Arc<Graph>>; 11],
    decibel: [OnceCell<Arc<Graph>>; 11],
}

impl ScanPoint {
    /// Build a scan point from its records in channel order: displacement,
    /// velocity, acceleration, ref1, ref2, ref3, H1, H2.
    pub fn new(records: Vec<ChannelRecord>, references: DecibelReferences) -> Result<Self> {
        let Some(first) = records.first() else {
            return Err(AnalysisError::IncompleteScanPoint {
                scan: String::new(),
                point: 0,
                found: 0,
                expected: RECORDS_PER_POINT,
            });
        };
        let scan_point_number = first.rsp_node;
        if records.len() != RECORDS_PER_POINT {
            return Err(AnalysisError::IncompleteScanPoint {
                scan: first.id4.clone(),
                point: scan_point_number,
                found: records.len(),
                expected: RECORDS_PER_POINT,
            });
        }

        let graphs = records
            .into_iter()
            .map(|r| Graph::from_record(r).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let recorded: [Arc<Graph>; RECORDS_PER_POINT] = graphs
            .try_into()
            .map_err(|_| AnalysisError::shape("scan point assembly", "record count changed"))?;

        Ok(ScanPoint {
            scan_point_number,
            recorded,
            references,
            linear: Default::default(),
            decibel: Default::default(),
        })
    }

    pub fn scan_point_number(&self) -> u32 {
        self.scan_point_number
    }

    pub fn scan_name(&self) -> &str {
        &self.recorded[0].scan_name
    }

    pub fn references(&self) -> &DecibelReferences {
        &self.references
    }

    /// Recorded graph of a recorded channel; `None` for transfer functions.
    pub fn recorded(&self, channel: Channel) -> Option<&Arc<Graph>> {
        match channel.source() {
            Source::Recorded(idx) => self.recorded.get(idx),
            Source::Quotient { .. } => None,
        }
    }

    /// Transfer function `numerator / denominator`, one of the vib/ref pairs.
    pub fn quotient(&self, numerator: Channel, denominator: Channel) -> Result<Arc<Graph>> {
        let channel = Channel::quotient_of(numerator, denominator).ok_or_else(|| {
            AnalysisError::UnknownChannelKey(format!("{numerator}/{denominator}"))
        })?;
        self.linear(channel)
    }

    /// Linear graph of any channel: recorded, or the cached quotient.
    pub fn linear(&self, channel: Channel) -> Result<Arc<Graph>> {
        match channel.source() {
            Source::Recorded(idx) => Ok(Arc::clone(&self.recorded[idx])),
            Source::Quotient {
                numerator,
                denominator,
            } => self.linear[channel.index()]
                .get_or_try_init(|| {
                    let num = self.linear(numerator)?;
                    let den = self.linear(denominator)?;
                    quotient(&num, &den).map(Arc::new)
                })
                .cloned(),
        }
    }

    /// Decibel graph of any channel, using the configured reference.
    pub fn decibel(&self, channel: Channel) -> Result<Arc<Graph>> {
        self.decibel[channel.index()]
            .get_or_try_init(|| {
                let linear = self.linear(channel)?;
                Ok(Arc::new(to_decibel(
                    &linear,
                    self.references.get(channel),
                    channel.squared_units(),
                )))
            })
            .cloned()
    }

    pub fn graph(&self, key: ChannelKey) -> Result<Arc<Graph>> {
        match key.unit {
            Unit::Linear => self.linear(key.channel),
            Unit::Decibel => self.decibel(key.channel),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::model::tests::record;

    /// Eight records for `point`; every channel's y is `base + channel index`.
    pub(crate) fn point_records(
        scan: &str,
        point: u32,
        x: &[f64],
        base: &[f64],
    ) -> Vec<ChannelRecord> {
        Channel::RECORDED
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let y: Vec<f64> = base.iter().map(|b| b + i as f64).collect();
                let mut rec = record(point, c.description(), x, &y);
                rec.id4 = scan.to_string();
                rec
            })
            .collect()
    }

    #[test]
    fn test_derivations_are_memoized() {
        let point = ScanPoint::new(
            point_records("a top.uff", 5, &[100.0, 200.0], &[1.0, 2.0]),
            DecibelReferences::default(),
        )
        .unwrap();
        assert_eq!(point.scan_point_number(), 5);

        let q1 = point.quotient(Channel::Vib, Channel::Ref1).unwrap();
        let q2 = point.linear(Channel::VibRef1).unwrap();
        assert!(Arc::ptr_eq(&q1, &q2));
        // vib = base + 1, ref1 = base + 3
        assert_eq!(q1.y, vec![2.0 / 4.0, 3.0 / 5.0]);

        let d1 = point.decibel(Channel::VibRef1).unwrap();
        let d2 = point.graph(ChannelKey::decibel(Channel::VibRef1)).unwrap();
        assert!(Arc::ptr_eq(&d1, &d2));
        assert_eq!(d1.channel_signal, format!("{} [dB]", q1.channel_signal));

        let raw = point.recorded(Channel::Vib).unwrap();
        assert_eq!(raw.y, vec![2.0, 3.0]);
        assert!(point.recorded(Channel::VibRef2).is_none());
    }

    #[test]
    fn test_decibel_uses_channel_reference_and_scale() {
        let refs = DecibelReferences {
            acc: 2.0,
            ..Default::default()
        };
        let point = ScanPoint::new(point_records("s.uff", 1, &[10.0], &[6.0]), refs).unwrap();
        // acc = base + 2 = 8; squared units → 10·log10(8/2)
        let acc = point.decibel(Channel::Acc).unwrap();
        approx::assert_relative_eq!(acc.y[0], 10.0 * 4.0f64.log10(), max_relative = 1e-12);
    }

    #[test]
    fn test_incomplete_point_is_rejected() {
        let mut records = point_records("s.uff", 9, &[10.0], &[1.0]);
        records.truncate(6);
        let err = ScanPoint::new(records, DecibelReferences::default()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::IncompleteScanPoint {
                scan: "s.uff".into(),
                point: 9,
                found: 6,
                expected: 8
            }
        );
    }

    #[test]
    fn test_quotient_failure_is_not_cached() {
        let mut records = point_records("s.uff", 2, &[10.0, 20.0], &[1.0, 1.0]);
        records[3].rsp_node = 3; // ref1 claims another point
        let point = ScanPoint::new(records, DecibelReferences::default()).unwrap();
        assert!(matches!(
            point.linear(Channel::VibRef1),
            Err(AnalysisError::ShapeMismatch { .. })
        ));
        assert!(point.decibel(Channel::VibRef1).is_err());
        assert!(point.linear(Channel::VibRef2).is_ok());
    }

    #[test]
    fn test_unknown_quotient_pair() {
        let records = point_records("s.uff", 1, &[10.0], &[1.0]);
        let point = ScanPoint::new(records, DecibelReferences::default()).unwrap();
        assert!(matches!(
            point.quotient(Channel::Acc, Channel::Ref2),
            Err(AnalysisError::UnknownChannelKey(_))
        ));
    }
}
