//! Scheduling tests: the in-flight gate, the tick loop and stop semantics.

use autocapture::config::SessionConfig;
use autocapture::testing::synthetic_data::{card_frame, row_major_output, ReplayDetector};
use autocapture::{
    AutoCaptureConfig, BoundingBox, CaptureError, Detector, Frame, GeometryContext, ModelOutput,
    ScanLoop, ScanSession, SharedScanSession, Tensor, TickOutcome, VecSource,
};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const W: u32 = 1280;
const H: u32 = 720;

fn card() -> BoundingBox {
    BoundingBox::new(300.0, 150.0, 400.0, 252.0)
}

fn card_output() -> ModelOutput {
    let geometry = GeometryContext::letterbox(640, W, H);
    row_major_output(&[(card(), 0.9)], &geometry, 8)
}

/// Holds each prediction until the test releases it.
struct BlockingDetector {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
    output: ModelOutput,
}

impl Detector for BlockingDetector {
    fn predict(&mut self, _input: &Tensor) -> Result<ModelOutput, CaptureError> {
        let _ = self.entered.send(());
        let _ = self.release.recv_timeout(Duration::from_secs(5));
        Ok(self.output.clone())
    }
}

/// Always fails with an unrecoverable error.
struct BrokenSource;

impl autocapture::FrameSource for BrokenSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (0, 0)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        Err(CaptureError::Acquisition("device disconnected".to_string()))
    }

    fn release(&mut self) {}

    fn is_open(&self) -> bool {
        true
    }
}

fn wait_until_finished(scan: &ScanLoop) {
    let start = Instant::now();
    while scan.is_running() && start.elapsed() < Duration::from_secs(10) {
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_frame_offered_while_in_flight_is_dropped() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let detector = BlockingDetector {
        entered: entered_tx,
        release: release_rx,
        output: card_output(),
    };
    let mut session = ScanSession::new(detector, &AutoCaptureConfig::default());
    session.start();
    let shared = SharedScanSession::new(session);
    let frame = card_frame(W, H, &card());

    let worker = {
        let shared = shared.clone();
        let frame = frame.clone();
        std::thread::spawn(move || shared.offer_frame(&frame))
    };

    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(shared.gate().is_busy());
    assert_eq!(shared.offer_frame(&frame).unwrap(), TickOutcome::Dropped);
    assert_eq!(shared.offer_frame(&frame).unwrap(), TickOutcome::Dropped);

    release_tx.send(()).unwrap();
    let outcome = worker.join().unwrap().unwrap();
    assert!(matches!(outcome, TickOutcome::Observed(_)));
    assert!(!shared.gate().is_busy());

    let stats = shared.stats();
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.processed, 1);
    assert_eq!(shared.signals().consecutive_detections, 1);
}

#[test]
fn test_warmup_frames_are_not_ready() {
    let mut session = ScanSession::new(
        ReplayDetector::repeating(card_output()),
        &AutoCaptureConfig::default(),
    );
    session.start();
    let mut source = VecSource::new(vec![card_frame(W, H, &card())]).with_warmup(2);
    autocapture::FrameSource::open(&mut source).unwrap();

    assert_eq!(session.tick(&mut source).unwrap(), TickOutcome::NotReady);
    assert_eq!(session.tick(&mut source).unwrap(), TickOutcome::NotReady);
    assert!(matches!(
        session.tick(&mut source).unwrap(),
        TickOutcome::Observed(_)
    ));
    // drained
    assert_eq!(session.tick(&mut source).unwrap(), TickOutcome::NotReady);
    assert_eq!(session.detector().calls(), 1);
}

#[test]
fn test_detector_not_ready_skips_inference() {
    let mut session = ScanSession::new(ReplayDetector::not_ready(), &AutoCaptureConfig::default());
    session.start();
    let frame = card_frame(W, H, &card());

    assert_eq!(session.process_frame(&frame).unwrap(), TickOutcome::NotReady);
    assert_eq!(session.detector().calls(), 0);

    session.detector_mut().set_ready(true);
    assert_eq!(session.process_frame(&frame).unwrap(), TickOutcome::Skipped);
}

#[test]
fn test_stopped_session_ignores_frames() {
    let mut session = ScanSession::new(
        ReplayDetector::repeating(card_output()),
        &AutoCaptureConfig::default(),
    );
    let frame = card_frame(W, H, &card());
    assert_eq!(session.process_frame(&frame).unwrap(), TickOutcome::Stopped);

    session.start();
    session.process_frame(&frame).unwrap();
    assert_eq!(session.signals().consecutive_detections, 1);

    session.stop();
    assert!(!session.is_running());
    assert_eq!(session.signals().consecutive_detections, 0);
    assert_eq!(session.signals().status, "Camera stopped");
    assert!(session.last_detection().is_none());
    assert_eq!(session.process_frame(&frame).unwrap(), TickOutcome::Stopped);
}

#[test]
fn test_loop_captures_from_warming_source() {
    let mut session = ScanSession::new(
        ReplayDetector::repeating(card_output()),
        &AutoCaptureConfig::default(),
    );
    session.start();
    let shared = SharedScanSession::new(session);
    let frame = card_frame(W, H, &card());
    let config = SessionConfig {
        tick_interval_ms: 1,
        stop_timeout_ms: 5000,
    };

    let mut scan = ScanLoop::spawn(
        shared.clone(),
        move || Ok(VecSource::new(vec![frame]).repeat_last().with_warmup(3)),
        &config,
    )
    .unwrap();
    wait_until_finished(&scan);
    scan.stop().unwrap();

    let stats = shared.stats();
    assert!(stats.not_ready >= 3);
    assert_eq!(stats.captures, 1);
    let artifact = shared.take_artifact().unwrap();
    assert_eq!((artifact.width(), artifact.height()), (640, 404));
}

#[test]
fn test_fatal_source_error_ends_loop() {
    let session = ScanSession::new(
        ReplayDetector::repeating(card_output()),
        &AutoCaptureConfig::default(),
    );
    let shared = SharedScanSession::new(session);

    let mut scan = ScanLoop::spawn(shared.clone(), || Ok(BrokenSource), &SessionConfig::default())
        .unwrap();
    wait_until_finished(&scan);

    assert!(!scan.is_running());
    assert!(scan.last_error().unwrap().contains("device disconnected"));
    assert!(!shared.is_running());
    scan.stop().unwrap();
}

#[test]
fn test_drop_stops_loop() {
    let session = ScanSession::new(
        ReplayDetector::repeating(card_output()),
        &AutoCaptureConfig::default(),
    );
    let shared = SharedScanSession::new(session);
    {
        let _scan = ScanLoop::spawn(
            shared.clone(),
            || Ok(VecSource::new(Vec::new())),
            &SessionConfig::default(),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
    }
    assert!(!shared.is_running());
}
