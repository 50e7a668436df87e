//! Session-scoped dedup and the ordered result log.

use std::collections::{HashSet, VecDeque};

use crate::geometry::{bounding_region, BoundingRegion};
use crate::models::{CroppedImage, DecodedSymbol, ResultRecord};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Set of committed payloads plus the most-recent-first result log.
///
/// Check and insert happen inside one `&mut self` call with no await point,
/// so a payload can only ever be committed once per session.
#[derive(Debug, Default)]
pub struct ResultRegistry {
    seen: HashSet<String>,
    /// Front is the most recent record.
    records: VecDeque<ResultRecord>,
    oriented: bool,
    max_records: Option<usize>,
}

impl ResultRegistry {
    pub fn new(oriented: bool) -> Self {
        Self {
            oriented,
            ..Self::default()
        }
    }

    /// Cap the log. The oldest record and its payload are forgotten on overflow,
    /// so that payload counts as new if it shows up again.
    pub fn with_capacity_limit(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records.filter(|limit| *limit > 0);
        self
    }

    pub fn consider_detection(&mut self, symbol: DecodedSymbol) -> Option<ResultRecord> {
        self.consider_detection_with(symbol, |_| None)
    }

    /// Commit `symbol` if its payload is new this session.
    ///
    /// `crop` only runs for new payloads that have a bounding region; a crop
    /// that yields nothing leaves a text-only record.
    pub fn consider_detection_with<F>(
        &mut self,
        symbol: DecodedSymbol,
        crop: F,
    ) -> Option<ResultRecord>
    where
        F: FnOnce(&BoundingRegion) -> Option<CroppedImage>,
    {
        if self.seen.contains(&symbol.payload) {
            log_debug!("duplicate detection of {} ignored", symbol.payload);
            return None;
        }
        self.seen.insert(symbol.payload.clone());

        let region = bounding_region(&symbol.corner_points, self.oriented);
        let cropped = region.as_ref().and_then(crop);
        let record = ResultRecord::from_symbol(&symbol, region, cropped);

        self.records.push_front(record.clone());
        self.evict_overflow();

        log_info!(
            "new {} detection committed ({} total)",
            record.format,
            self.records.len()
        );
        Some(record)
    }

    fn evict_overflow(&mut self) {
        let Some(limit) = self.max_records else {
            return;
        };
        while self.records.len() > limit {
            if let Some(oldest) = self.records.pop_back() {
                self.seen.remove(&oldest.payload);
            }
        }
    }

    pub fn contains(&self, payload: &str) -> bool {
        self.seen.contains(payload)
    }

    /// Records, most recent first.
    pub fn records(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter()
    }

    /// Records in the order they were committed.
    pub fn commit_order(&self) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter().rev()
    }

    pub fn latest(&self) -> Option<&ResultRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PixelRect, Point};
    use crate::models::BarcodeFormat;

    fn symbol(payload: &str) -> DecodedSymbol {
        DecodedSymbol::new(payload, BarcodeFormat::Code128)
    }

    fn payloads<'a>(records: impl Iterator<Item = &'a ResultRecord>) -> Vec<&'a str> {
        records.map(|r| r.payload.as_str()).collect()
    }

    #[test]
    fn each_payload_commits_once() {
        let mut registry = ResultRegistry::new(false);
        let committed: Vec<_> = ["A", "B", "A", "A", "C"]
            .into_iter()
            .filter_map(|p| registry.consider_detection(symbol(p)))
            .collect();

        assert_eq!(committed.len(), 3);
        assert_eq!(payloads(registry.commit_order()), vec!["A", "B", "C"]);
        assert_eq!(payloads(registry.records()), vec!["C", "B", "A"]);
    }

    #[test]
    fn first_seen_data_is_kept() {
        let mut registry = ResultRegistry::new(false);
        let first = symbol("A").with_corners([Point::new(0.0, 0.0), Point::new(10.0, 5.0)]);
        let again = DecodedSymbol::new("A", BarcodeFormat::Ean13)
            .with_corners([Point::new(100.0, 100.0), Point::new(120.0, 110.0)]);

        let committed = registry.consider_detection(first).expect("first commit");
        assert!(registry.consider_detection(again).is_none());

        let stored = registry.latest().expect("record");
        assert_eq!(stored.id, committed.id);
        assert_eq!(stored.format, BarcodeFormat::Code128);
        assert_eq!(stored.bounding_region.map(|r| r.rect().x), Some(0.0));
    }

    #[test]
    fn clearing_makes_payloads_new_again() {
        let mut registry = ResultRegistry::new(false);
        assert!(registry.consider_detection(symbol("A")).is_some());
        registry.clear();
        assert!(!registry.contains("A"));
        assert!(registry.consider_detection(symbol("A")).is_some());
    }

    #[test]
    fn no_corners_means_no_region_and_no_crop() {
        let mut registry = ResultRegistry::new(true);
        let mut crop_called = false;
        let record = registry
            .consider_detection_with(symbol("A").with_corners([Point::new(1.0, 1.0)]), |_| {
                crop_called = true;
                None
            })
            .expect("commit");
        assert!(!crop_called);
        assert!(record.bounding_region.is_none());
        assert!(record.cropped_image.is_none());
    }

    #[test]
    fn crop_runs_only_for_new_payloads() {
        let mut registry = ResultRegistry::new(false);
        let corners = [Point::new(10.0, 10.0), Point::new(50.0, 30.0)];
        let mut crops = 0;
        for _ in 0..3 {
            registry.consider_detection_with(symbol("A").with_corners(corners), |_| {
                crops += 1;
                Some(CroppedImage::new(
                    PixelRect {
                        x: 0,
                        y: 0,
                        width: 1,
                        height: 1,
                    },
                    vec![0u8; 4],
                ))
            });
        }
        assert_eq!(crops, 1);
        assert!(registry.latest().map(|r| r.has_image()).unwrap_or(false));
    }

    #[test]
    fn capacity_limit_evicts_oldest() {
        let mut registry = ResultRegistry::new(false).with_capacity_limit(Some(2));
        for p in ["A", "B", "C"] {
            registry.consider_detection(symbol(p));
        }
        assert_eq!(payloads(registry.records()), vec!["C", "B"]);
        assert!(!registry.contains("A"));
        assert!(registry.consider_detection(symbol("A")).is_some());
    }
}
