//! Selfie guidance and delayed capture, driven by scripted face boxes.

use autocapture::config::SelfieConfig;
use autocapture::quality::SelfieGuidance;
use autocapture::session::SelfieTick;
use autocapture::testing::synthetic_data::{
    face_box_with_ratio, synthetic_video_frame, ScriptedFaceDetector,
};
use autocapture::{Frame, SelfieSession};
use std::time::{Duration, Instant};

const W: u32 = 640;
const H: u32 = 480;

fn guidance(tick: &SelfieTick) -> Option<SelfieGuidance> {
    match tick {
        SelfieTick::Observed(update) => Some(update.guidance),
        _ => None,
    }
}

#[test]
fn test_guidance_follows_face_distance() {
    let faces = vec![
        None,
        Some(face_box_with_ratio(W, H, 0.10)),
        Some(face_box_with_ratio(W, H, 0.70)),
        Some(face_box_with_ratio(W, H, 0.20)),
    ];
    let mut session = SelfieSession::new(ScriptedFaceDetector::new(faces), SelfieConfig::default());
    let frame = synthetic_video_frame(0, W, H);
    let t0 = Instant::now();

    let expected = [
        SelfieGuidance::NoFace,
        SelfieGuidance::MoveCloser,
        SelfieGuidance::MoveBack,
        SelfieGuidance::AlmostThere,
    ];
    for want in expected {
        let tick = session.process_frame_at(&frame, t0).unwrap();
        assert_eq!(guidance(&tick), Some(want));
    }
    // 0.20 * 300 = 60
    assert_eq!(session.status(), "Move closer (60% ideal)");
    assert!(!session.is_capture_pending());
}

#[test]
fn test_capture_waits_for_delay_then_latches() {
    let face = face_box_with_ratio(W, H, 0.40);
    let mut session =
        SelfieSession::new(ScriptedFaceDetector::new(vec![Some(face)]), SelfieConfig::default());
    let t0 = Instant::now();

    let tick = session
        .process_frame_at(&synthetic_video_frame(0, W, H), t0)
        .unwrap();
    assert_eq!(guidance(&tick), Some(SelfieGuidance::Capture));
    assert_eq!(session.status(), "Perfect! Capturing...");

    let early = t0 + Duration::from_millis(499);
    assert_eq!(
        session
            .process_frame_at(&synthetic_video_frame(1, W, H), early)
            .unwrap(),
        SelfieTick::Waiting
    );

    let due = t0 + Duration::from_millis(500);
    assert_eq!(
        session
            .process_frame_at(&synthetic_video_frame(2, W, H), due)
            .unwrap(),
        SelfieTick::Captured
    );
    let artifact = session.artifact().unwrap();
    assert_eq!((artifact.width(), artifact.height()), (W, H));

    assert_eq!(
        session
            .process_frame_at(&synthetic_video_frame(3, W, H), due)
            .unwrap(),
        SelfieTick::AlreadyCaptured
    );
}

#[test]
fn test_empty_frame_does_not_consume_deadline() {
    let face = face_box_with_ratio(W, H, 0.40);
    let mut session =
        SelfieSession::new(ScriptedFaceDetector::new(vec![Some(face)]), SelfieConfig::default());
    let t0 = Instant::now();
    session
        .process_frame_at(&synthetic_video_frame(0, W, H), t0)
        .unwrap();

    let late = t0 + Duration::from_secs(1);
    assert_eq!(
        session
            .process_frame_at(&Frame::new(0, 0, Vec::new()), late)
            .unwrap(),
        SelfieTick::NotReady
    );
    assert!(session.is_capture_pending());
    assert_eq!(
        session
            .process_frame_at(&synthetic_video_frame(1, W, H), late)
            .unwrap(),
        SelfieTick::Captured
    );
}

#[test]
fn test_retake_after_reset() {
    let face = face_box_with_ratio(W, H, 0.40);
    let mut session =
        SelfieSession::new(ScriptedFaceDetector::new(vec![Some(face)]), SelfieConfig::default());
    let t0 = Instant::now();
    let frame = synthetic_video_frame(0, W, H);

    session.process_frame_at(&frame, t0).unwrap();
    session
        .process_frame_at(&frame, t0 + Duration::from_millis(600))
        .unwrap();
    let first = session.take_artifact().unwrap();

    session.reset();
    assert_eq!(session.status(), "No face detected. Please center your face");
    let tick = session.process_frame_at(&frame, t0).unwrap();
    assert_eq!(guidance(&tick), Some(SelfieGuidance::Capture));
    session
        .process_frame_at(&frame, t0 + Duration::from_millis(500))
        .unwrap();
    let second = session.take_artifact().unwrap();
    assert_ne!(first.id(), second.id());
}
