use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::camera::{Frame, VideoStream};
use crate::decoder::{DecodeOutcome, SymbolDecoder};
use crate::error::{DecodeError, ScanError};
use crate::geometry::bounding_region;
use crate::models::{DecodedSymbol, ResultRecord};
use crate::notify::{notify_detection, Notifier};
use crate::presentation::{crop_snapshot, Presenter};
use crate::settings::{DecodeRegion, ScannerSettings};

use super::session::{lock_session, SharedSession};
use super::state::DriverState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Attempt counters for one scan session.
#[derive(Debug, Default)]
pub struct DriverStats {
    attempts: AtomicU64,
    found: AtomicU64,
    not_found: AtomicU64,
    errors: AtomicU64,
    committed: AtomicU64,
    frameless_ticks: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatsSnapshot {
    pub attempts: u64,
    pub found: u64,
    pub not_found: u64,
    pub errors: u64,
    pub committed: u64,
    pub frameless_ticks: u64,
}

impl DriverStats {
    pub fn snapshot(&self) -> DriverStatsSnapshot {
        DriverStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            frameless_ticks: self.frameless_ticks.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything one decode loop needs. The stream is borrowed from the
/// controller, which owns its teardown.
#[derive(Clone)]
pub struct DriverContext {
    pub stream: Arc<dyn VideoStream>,
    pub decoder: Arc<dyn SymbolDecoder>,
    pub session: SharedSession,
    pub presenter: Presenter,
    pub notifier: Arc<dyn Notifier>,
    pub settings: ScannerSettings,
    pub stats: Arc<DriverStats>,
}

/// A decode driver that has not been started yet.
pub struct DecodeDriver {
    ctx: DriverContext,
    state: Arc<Mutex<DriverState>>,
}

impl DecodeDriver {
    pub fn new(ctx: DriverContext) -> Self {
        Self {
            ctx,
            state: Arc::new(Mutex::new(DriverState::Idle)),
        }
    }

    pub fn state(&self) -> DriverState {
        read_state(&self.state)
    }

    /// Begin polling the stream. Must be called inside a tokio runtime.
    pub fn start(self) -> DriverHandle {
        lock_state(&self.state).activate();

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(decode_loop(
            self.ctx,
            cancel_token.clone(),
            Arc::clone(&self.state),
        ));

        DriverHandle {
            handle: Some(handle),
            cancel_token,
            state: self.state,
        }
    }
}

/// Control handle of a running decode loop. Dropping it cancels the loop.
pub struct DriverHandle {
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
    state: Arc<Mutex<DriverState>>,
}

impl DriverHandle {
    pub fn state(&self) -> DriverState {
        read_state(&self.state)
    }

    /// Mark the driver stopped and cancel the loop without waiting for it.
    /// No detection is committed after this returns.
    pub fn cancel(&self) {
        lock_state(&self.state).stop();
        self.cancel_token.cancel();
    }

    pub async fn stop(mut self) -> Result<()> {
        self.cancel();

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("decode loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock_state(state: &Mutex<DriverState>) -> std::sync::MutexGuard<'_, DriverState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_state(state: &Mutex<DriverState>) -> DriverState {
    *lock_state(state)
}

async fn decode_loop(
    ctx: DriverContext,
    cancel_token: CancellationToken,
    state: Arc<Mutex<DriverState>>,
) {
    let mut ticker = tokio::time::interval(ctx.settings.scan_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "decode loop started on {} every {}ms with {}",
        ctx.stream.device_id(),
        ctx.settings.scan_interval_ms,
        ctx.decoder.name()
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                break;
            }
            _ = ticker.tick() => {
                if !read_state(&state).is_active() {
                    break;
                }

                let Some(frame) = ctx.stream.current_frame() else {
                    DriverStats::bump(&ctx.stats.frameless_ticks);
                    log_debug!("no frame available on {}, waiting", ctx.stream.device_id());
                    continue;
                };

                DriverStats::bump(&ctx.stats.attempts);
                let outcome = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    outcome = attempt_decode(&ctx, frame.clone()) => outcome,
                };

                match outcome {
                    DecodeOutcome::Found(symbol) => {
                        DriverStats::bump(&ctx.stats.found);
                        commit_detection(&ctx, &cancel_token, &state, frame, symbol).await;
                    }
                    DecodeOutcome::NotFound => {
                        DriverStats::bump(&ctx.stats.not_found);
                        log_debug!("frame {} holds no symbol", frame.sequence);
                    }
                    DecodeOutcome::Error(err) => {
                        DriverStats::bump(&ctx.stats.errors);
                        let err = ScanError::from(err);
                        log_warn!("{err} on frame {}", frame.sequence);
                    }
                }
            }
        }
    }

    lock_state(&state).stop();
    log_info!("decode loop shutting down");
}

/// Run the decoder off the async thread. Symbols found in the center window
/// come back in full-frame coordinates.
async fn attempt_decode(ctx: &DriverContext, frame: Frame) -> DecodeOutcome {
    let decoder = Arc::clone(&ctx.decoder);
    let hints = ctx.settings.hints.clone();
    let region = ctx.settings.decode_region;

    let joined = tokio::task::spawn_blocking(move || {
        let result = match region {
            DecodeRegion::Full => decoder.decode(&frame.image, &hints),
            DecodeRegion::Center { margin_px } => {
                let window = frame.center_window(margin_px);
                let sub = frame.extract(window);
                decoder.decode(&sub, &hints).map(|found| {
                    found.map(|mut symbol| {
                        symbol.translate(window.x as f32, window.y as f32);
                        symbol
                    })
                })
            }
        };
        DecodeOutcome::from_result(result, &hints)
    })
    .await;

    match joined {
        Ok(outcome) => outcome,
        Err(err) => DecodeOutcome::Error(DecodeError::Failed(format!(
            "decode worker join failed: {err}"
        ))),
    }
}

/// Commit a found symbol unless the driver was stopped while it was being
/// decoded. Presentation and notification only happen for new payloads.
///
/// The snapshot is encoded on the blocking pool before the session lock is
/// taken; the registry decides again under the lock, so a payload committed
/// meanwhile still loses.
async fn commit_detection(
    ctx: &DriverContext,
    cancel_token: &CancellationToken,
    state: &Mutex<DriverState>,
    frame: Frame,
    symbol: DecodedSymbol,
) -> Option<ResultRecord> {
    if lock_session(&ctx.session).registry().contains(&symbol.payload) {
        log_debug!("duplicate detection of {} ignored", symbol.payload);
        return None;
    }

    let cropped = if ctx.settings.capture_crops {
        let region = bounding_region(&symbol.corner_points, ctx.settings.oriented_overlay);
        match region {
            Some(region) => {
                let padding = ctx.settings.crop_padding_px;
                let encode =
                    tokio::task::spawn_blocking(move || crop_snapshot(&frame, &region, padding));
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => return None,
                    joined = encode => joined.unwrap_or_else(|err| {
                        log_warn!("snapshot worker join failed: {err}");
                        None
                    }),
                }
            }
            None => None,
        }
    } else {
        None
    };

    let record = {
        let mut session = lock_session(&ctx.session);
        if cancel_token.is_cancelled() || !read_state(state).is_active() || session.is_ended() {
            log_debug!("discarding {} resolved after stop", symbol.payload);
            return None;
        }
        session
            .registry_mut()
            .consider_detection_with(symbol, move |_| cropped)?
    };

    DriverStats::bump(&ctx.stats.committed);
    ctx.presenter.present(&record);
    notify_detection(ctx.notifier.as_ref(), &ctx.settings.notification);
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{StreamConstraints, TrackInfo};
    use crate::decoder::DecodeHints;
    use crate::geometry::Point;
    use crate::models::BarcodeFormat;
    use crate::presentation::{ChannelSink, ScanEvent};
    use crate::scanner::session::ScanSession;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::mpsc;
    use std::time::Duration;

    struct StillStream {
        frame: Option<Frame>,
        live: AtomicBool,
    }

    impl StillStream {
        fn new(with_frame: bool) -> Self {
            let frame = with_frame.then(|| Frame::new(Arc::new(RgbaImage::new(320, 240)), 1));
            Self {
                frame,
                live: AtomicBool::new(true),
            }
        }
    }

    impl VideoStream for StillStream {
        fn device_id(&self) -> &str {
            "still"
        }

        fn tracks(&self) -> Vec<TrackInfo> {
            vec![TrackInfo {
                id: "still-video".into(),
                label: "still".into(),
                live: self.live.load(Ordering::SeqCst),
            }]
        }

        fn stop_tracks(&self) {
            self.live.store(false, Ordering::SeqCst);
        }

        fn current_frame(&self) -> Option<Frame> {
            self.frame.clone()
        }

        fn apply_constraints(&self, _constraints: &StreamConstraints) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct FixedDecoder {
        payload: &'static str,
    }

    impl SymbolDecoder for FixedDecoder {
        fn name(&self) -> &str {
            "fixed"
        }

        fn decode(
            &self,
            _frame: &RgbaImage,
            _hints: &DecodeHints,
        ) -> Result<Option<DecodedSymbol>, DecodeError> {
            Ok(Some(
                DecodedSymbol::new(self.payload, BarcodeFormat::Code128).with_corners([
                    Point::new(100.0, 100.0),
                    Point::new(200.0, 100.0),
                    Point::new(200.0, 140.0),
                    Point::new(100.0, 140.0),
                ]),
            ))
        }
    }

    /// Blocks inside the first decode call until released.
    struct GatedDecoder {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SymbolDecoder for GatedDecoder {
        fn name(&self) -> &str {
            "gated"
        }

        fn decode(
            &self,
            _frame: &RgbaImage,
            _hints: &DecodeHints,
        ) -> Result<Option<DecodedSymbol>, DecodeError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(Some(DecodedSymbol::new("LATE", BarcodeFormat::Ean8)))
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        beeps: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn beep(&self) -> Result<(), String> {
            self.beeps.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn context(
        stream: Arc<dyn VideoStream>,
        decoder: Arc<dyn SymbolDecoder>,
        notifier: Arc<dyn Notifier>,
    ) -> (DriverContext, tokio::sync::mpsc::UnboundedReceiver<ScanEvent>) {
        let settings = ScannerSettings {
            scan_interval_ms: 5,
            ..ScannerSettings::default()
        };
        let (sink, events) = ChannelSink::new();
        let ctx = DriverContext {
            stream,
            decoder,
            session: ScanSession::new(&settings).shared(),
            presenter: Presenter::new(Arc::new(sink), settings.overlay_ttl()),
            notifier,
            settings,
            stats: Arc::new(DriverStats::default()),
        };
        (ctx, events)
    }

    #[tokio::test]
    async fn repeated_payload_commits_and_beeps_once() {
        let notifier = Arc::new(CountingNotifier::default());
        let (ctx, _events) = context(
            Arc::new(StillStream::new(true)),
            Arc::new(FixedDecoder { payload: "A-1" }),
            notifier.clone(),
        );
        let session = ctx.session.clone();
        let stats = ctx.stats.clone();

        let handle = DecodeDriver::new(ctx).start();
        assert_eq!(handle.state(), DriverState::Active);
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.stop().await.expect("stop");

        let snapshot = stats.snapshot();
        assert!(snapshot.found >= 2, "expected repeated detections: {snapshot:?}");
        assert_eq!(snapshot.committed, 1);
        assert_eq!(notifier.beeps.load(Ordering::SeqCst), 1);

        let session = lock_session(&session);
        assert_eq!(session.registry().len(), 1);
        let record = session.registry().latest().expect("record");
        assert!(record.has_image());
    }

    #[tokio::test]
    async fn missing_frames_are_skipped_without_decoding() {
        let (ctx, _events) = context(
            Arc::new(StillStream::new(false)),
            Arc::new(FixedDecoder { payload: "never" }),
            Arc::new(CountingNotifier::default()),
        );
        let stats = ctx.stats.clone();

        let handle = DecodeDriver::new(ctx).start();
        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.stop().await.expect("stop");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.attempts, 0);
        assert!(snapshot.frameless_ticks >= 1);
    }

    #[tokio::test]
    async fn detection_resolving_after_stop_is_discarded() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let notifier = Arc::new(CountingNotifier::default());
        let (ctx, mut events) = context(
            Arc::new(StillStream::new(true)),
            Arc::new(GatedDecoder {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            }),
            notifier.clone(),
        );
        let session = ctx.session.clone();

        let handle = DecodeDriver::new(ctx).start();
        tokio::task::spawn_blocking(move || entered_rx.recv())
            .await
            .expect("join")
            .expect("decoder entered");

        handle.stop().await.expect("stop");
        release_tx.send(()).expect("release");
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(lock_session(&session).registry().is_empty());
        assert_eq!(notifier.beeps.load(Ordering::SeqCst), 0);
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, ScanEvent::ResultAdded { .. }),
                "late detection reached the sink"
            );
        }
    }

    fn found_symbol(payload: &str) -> DecodedSymbol {
        DecodedSymbol::new(payload, BarcodeFormat::Code128).with_corners([
            Point::new(100.0, 100.0),
            Point::new(200.0, 100.0),
            Point::new(200.0, 140.0),
            Point::new(100.0, 140.0),
        ])
    }

    #[tokio::test]
    async fn committed_snapshot_covers_the_padded_symbol() {
        let (ctx, _events) = context(
            Arc::new(StillStream::new(true)),
            Arc::new(FixedDecoder { payload: "unused" }),
            Arc::new(CountingNotifier::default()),
        );
        let state = Mutex::new(DriverState::Active);
        let token = CancellationToken::new();
        let frame = ctx.stream.current_frame().expect("frame");

        let record = commit_detection(&ctx, &token, &state, frame, found_symbol("P-1"))
            .await
            .expect("new payload commits");
        let cropped = record.cropped_image.expect("snapshot");
        assert_eq!(
            cropped.region,
            crate::geometry::PixelRect {
                x: 50,
                y: 50,
                width: 200,
                height: 140
            }
        );
        assert!(cropped.png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn known_payload_is_rejected_before_encoding() {
        let notifier = Arc::new(CountingNotifier::default());
        let (ctx, _events) = context(
            Arc::new(StillStream::new(true)),
            Arc::new(FixedDecoder { payload: "unused" }),
            notifier.clone(),
        );
        let state = Mutex::new(DriverState::Active);
        let token = CancellationToken::new();
        let frame = ctx.stream.current_frame().expect("frame");

        assert!(
            commit_detection(&ctx, &token, &state, frame.clone(), found_symbol("P-2"))
                .await
                .is_some()
        );
        assert!(
            commit_detection(&ctx, &token, &state, frame, found_symbol("P-2"))
                .await
                .is_none()
        );
        assert_eq!(ctx.stats.snapshot().committed, 1);
        assert_eq!(notifier.beeps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_driver_commits_nothing() {
        let (ctx, _events) = context(
            Arc::new(StillStream::new(true)),
            Arc::new(FixedDecoder { payload: "unused" }),
            Arc::new(CountingNotifier::default()),
        );
        let state = Mutex::new(DriverState::Active);
        let token = CancellationToken::new();
        token.cancel();
        let frame = ctx.stream.current_frame().expect("frame");

        assert!(commit_detection(&ctx, &token, &state, frame, found_symbol("P-3"))
            .await
            .is_none());
        assert!(lock_session(&ctx.session).registry().is_empty());
    }

    #[tokio::test]
    async fn center_region_reports_frame_coordinates() {
        let (mut ctx, _events) = context(
            Arc::new(StillStream::new(true)),
            Arc::new(FixedDecoder { payload: "C" }),
            Arc::new(CountingNotifier::default()),
        );
        ctx.settings.decode_region = DecodeRegion::Center { margin_px: 20 };
        let frame = ctx.stream.current_frame().expect("frame");

        match attempt_decode(&ctx, frame).await {
            DecodeOutcome::Found(symbol) => {
                assert_eq!(symbol.corner_points[0], Point::new(120.0, 120.0));
            }
            other => panic!("expected a symbol, got {other:?}"),
        }
    }
}
