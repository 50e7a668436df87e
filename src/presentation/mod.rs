//! Turns committed results into render-ready output: the result list entry,
//! the transient overlay and its expiry timer.

pub mod crop;
pub mod overlay;
pub mod sink;

pub use crop::{crop_snapshot, try_crop};
pub use overlay::{Overlay, OverlayLayer};
pub use sink::{ChannelSink, ControlState, LogSink, PresentationSink, ScanEvent};

use std::sync::Arc;
use tokio::time::{self, Duration, Instant};

use crate::models::ResultRecord;

#[derive(Clone)]
pub struct Presenter {
    sink: Arc<dyn PresentationSink>,
    overlays: Arc<OverlayLayer>,
    overlay_ttl: Duration,
}

impl Presenter {
    pub fn new(sink: Arc<dyn PresentationSink>, overlay_ttl: Duration) -> Self {
        Self {
            sink,
            overlays: Arc::new(OverlayLayer::new()),
            overlay_ttl,
        }
    }

    pub fn sink(&self) -> &Arc<dyn PresentationSink> {
        &self.sink
    }

    pub fn overlays(&self) -> &Arc<OverlayLayer> {
        &self.overlays
    }

    /// Take every overlay down now, telling the sink about each one. Their
    /// expiry timers then find nothing left to clear.
    pub fn clear_overlays(&self) {
        for overlay_id in self.overlays.clear() {
            self.sink.overlay_cleared(&overlay_id);
        }
    }

    /// Hand a fresh record to the UI and highlight it for the overlay TTL.
    /// Must run inside a tokio runtime; the overlay expiry is a spawned timer.
    pub fn present(&self, record: &ResultRecord) {
        self.sink.result_added(record);

        let Some(region) = record.bounding_region else {
            return;
        };

        let overlay = overlay::Overlay::new(&record.id, &record.payload, region, self.overlay_ttl);
        let overlay_id = overlay.id.clone();
        self.overlays.show(overlay.clone(), Instant::now());
        self.sink.overlay_shown(&overlay);

        let overlays = Arc::clone(&self.overlays);
        let sink = Arc::clone(&self.sink);
        let ttl = self.overlay_ttl;
        tokio::spawn(async move {
            time::sleep(ttl).await;
            if overlays.remove(&overlay_id) {
                sink.overlay_cleared(&overlay_id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::models::{BarcodeFormat, DecodedSymbol};

    fn record(with_corners: bool) -> ResultRecord {
        let mut symbol = DecodedSymbol::new("9780201379624", BarcodeFormat::Ean13);
        if with_corners {
            symbol = symbol.with_corners([
                Point::new(10.0, 10.0),
                Point::new(50.0, 10.0),
                Point::new(50.0, 30.0),
                Point::new(10.0, 30.0),
            ]);
        }
        let region = crate::geometry::bounding_region(&symbol.corner_points, false);
        ResultRecord::from_symbol(&symbol, region, None)
    }

    #[tokio::test(start_paused = true)]
    async fn overlay_is_cleared_after_ttl() {
        let (sink, mut rx) = ChannelSink::new();
        let presenter = Presenter::new(Arc::new(sink), Duration::from_millis(3000));
        presenter.present(&record(true));

        assert!(matches!(rx.recv().await, Some(ScanEvent::ResultAdded { .. })));
        let shown_id = match rx.recv().await {
            Some(ScanEvent::OverlayShown { overlay }) => overlay.id,
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(presenter.overlays().visible_now().len(), 1);

        time::sleep(Duration::from_millis(2999)).await;
        assert_eq!(presenter.overlays().visible_now().len(), 1);

        match rx.recv().await {
            Some(ScanEvent::OverlayCleared { overlay_id }) => assert_eq!(overlay_id, shown_id),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(presenter.overlays().visible_now().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn early_clear_tells_the_sink_once() {
        let (sink, mut rx) = ChannelSink::new();
        let presenter = Presenter::new(Arc::new(sink), Duration::from_millis(3000));
        presenter.present(&record(true));
        presenter.clear_overlays();
        time::sleep(Duration::from_millis(3100)).await;

        let mut shown = Vec::new();
        let mut cleared = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ScanEvent::OverlayShown { overlay } => shown.push(overlay.id),
                ScanEvent::OverlayCleared { overlay_id } => cleared.push(overlay_id),
                _ => {}
            }
        }
        assert_eq!(shown.len(), 1);
        assert_eq!(cleared, shown);
        assert!(presenter.overlays().visible_now().is_empty());
    }

    #[tokio::test]
    async fn record_without_region_draws_nothing() {
        let (sink, mut rx) = ChannelSink::new();
        let presenter = Presenter::new(Arc::new(sink), Duration::from_millis(3000));
        presenter.present(&record(false));

        assert!(matches!(rx.try_recv(), Ok(ScanEvent::ResultAdded { .. })));
        assert!(rx.try_recv().is_err());
        assert!(presenter.overlays().visible_now().is_empty());
    }
}
