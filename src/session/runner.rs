//! Scheduler tick loop
//!
//! Drives a [`SharedScanSession`] from a dedicated thread at a fixed
//! interval. The frame source is created and released on that thread.

use super::{SharedScanSession, TickOutcome};
use crate::config::SessionConfig;
use crate::errors::CaptureError;
use crate::inference::Detector;
use crate::source::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub struct ScanLoop {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    last_error: Arc<Mutex<Option<String>>>,
    stop_timeout: Duration,
    stop_session: Box<dyn Fn() -> bool + Send>,
}

impl ScanLoop {
    /// Start ticking `session` with frames from the source built by `open_source`.
    ///
    /// The loop ends on capture, on a fatal source error, or on [`ScanLoop::stop`].
    pub fn spawn<D, S, F>(
        session: SharedScanSession<D>,
        open_source: F,
        config: &SessionConfig,
    ) -> Result<Self, CaptureError>
    where
        D: Detector + Send + 'static,
        S: FrameSource + 'static,
        F: FnOnce() -> Result<S, CaptureError> + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let last_error = Arc::new(Mutex::new(None));
        let interval = Duration::from_millis(config.tick_interval_ms.max(1));

        let thread_flag = stop_flag.clone();
        let thread_error = last_error.clone();
        let thread_session = session.clone();
        let handle = std::thread::Builder::new()
            .name("autocapture-scan-loop".to_string())
            .spawn(move || {
                if let Err(e) = scan_loop(&thread_session, open_source, interval, &thread_flag) {
                    log::error!("Scan loop ended: {}", e);
                    *thread_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(e.to_string());
                }
                thread_session.stop();
            })
            .map_err(|e| CaptureError::Acquisition(format!("spawn failed: {e}")))?;

        Ok(Self {
            stop_flag,
            handle: Some(handle),
            last_error,
            stop_timeout: Duration::from_millis(config.stop_timeout_ms),
            stop_session: Box::new(move || session.try_stop()),
        })
    }

    /// `true` while the loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Error that ended the loop, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Halt the loop and wait for it, up to the configured timeout.
    ///
    /// On timeout the thread still releases the source and zeroes the
    /// session once its current frame completes.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        self.stop_flag.store(true, Ordering::Relaxed);

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let start = Instant::now();
        let mut handle = Some(handle);
        loop {
            let finished = handle.as_ref().is_some_and(|h| h.is_finished());
            if finished {
                if let Some(h) = handle.take() {
                    if h.join().is_err() {
                        log::error!("Scan loop thread panicked");
                    }
                }
                break;
            }
            if start.elapsed() >= self.stop_timeout {
                self.handle = handle.take();
                (self.stop_session)();
                return Err(CaptureError::Timeout(format!(
                    "scan loop did not stop within {:?}",
                    self.stop_timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        log::info!("Scan loop stopped");
        Ok(())
    }
}

impl Drop for ScanLoop {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Error stopping scan loop in drop: {}", e);
        }
    }
}

fn scan_loop<D, S, F>(
    session: &SharedScanSession<D>,
    open_source: F,
    interval: Duration,
    stop_flag: &AtomicBool,
) -> Result<(), CaptureError>
where
    D: Detector,
    S: FrameSource,
    F: FnOnce() -> Result<S, CaptureError>,
{
    let mut source = open_source()?;
    source.open()?;
    session.start();

    let result = run_ticks(session, &mut source, interval, stop_flag);
    source.release();
    result
}

fn run_ticks<D: Detector, S: FrameSource>(
    session: &SharedScanSession<D>,
    source: &mut S,
    interval: Duration,
    stop_flag: &AtomicBool,
) -> Result<(), CaptureError> {
    let mut next_tick = Instant::now();

    while !stop_flag.load(Ordering::Relaxed) {
        match session.tick(source)? {
            TickOutcome::Captured => {
                log::info!("Document captured, ending scan loop");
                return Ok(());
            }
            TickOutcome::Stopped => return Ok(()),
            _ => {}
        }

        next_tick += interval;
        let now = Instant::now();
        if now > next_tick {
            // ticks that fell due while the frame was processing
            let missed = (now - next_tick).as_nanos() / interval.as_nanos();
            if missed > 0 {
                session.record_dropped(missed as u64);
                next_tick += interval * missed as u32;
            }
        } else {
            std::thread::sleep(next_tick - now);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoCaptureConfig;
    use crate::session::ScanSession;
    use crate::source::VecSource;
    use crate::testing::synthetic_data::{card_frame, row_major_output, ReplayDetector};
    use crate::types::{BoundingBox, GeometryContext};

    fn shared_session() -> (SharedScanSession<ReplayDetector>, crate::types::Frame) {
        let card = BoundingBox::new(300.0, 150.0, 400.0, 252.0);
        let geometry = GeometryContext::letterbox(640, 1280, 720);
        let detector = ReplayDetector::repeating(row_major_output(&[(card, 0.9)], &geometry, 8));
        let session = ScanSession::new(detector, &AutoCaptureConfig::default());
        (SharedScanSession::new(session), card_frame(1280, 720, &card))
    }

    fn wait_until_finished(scan: &ScanLoop) {
        let start = Instant::now();
        while scan.is_running() && start.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_loop_captures_and_ends() {
        let (shared, frame) = shared_session();
        let config = SessionConfig {
            tick_interval_ms: 1,
            stop_timeout_ms: 5000,
        };
        let mut scan = ScanLoop::spawn(
            shared.clone(),
            move || Ok(VecSource::new(vec![frame]).repeat_last().with_warmup(2)),
            &config,
        )
        .unwrap();

        wait_until_finished(&scan);
        scan.stop().unwrap();

        assert!(shared.take_artifact().is_some());
        assert_eq!(shared.stats().captures, 1);
        assert!(!shared.is_running());
        assert!(scan.last_error().is_none());
    }

    #[test]
    fn test_open_failure_is_reported() {
        let (shared, _) = shared_session();
        let mut scan = ScanLoop::spawn(
            shared,
            || -> Result<VecSource, CaptureError> {
                Err(CaptureError::Acquisition("permission denied".to_string()))
            },
            &SessionConfig::default(),
        )
        .unwrap();

        wait_until_finished(&scan);
        scan.stop().unwrap();
        assert!(scan.last_error().unwrap().contains("permission denied"));
    }

    #[test]
    fn test_stop_zeroes_session() {
        let (shared, _) = shared_session();
        let mut scan = ScanLoop::spawn(
            shared.clone(),
            || Ok(VecSource::new(Vec::new())),
            &SessionConfig::default(),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        scan.stop().unwrap();
        assert!(!scan.is_running());
        assert!(!shared.is_running());
        assert_eq!(shared.signals().consecutive_detections, 0);
        assert!(shared.stats().not_ready > 0);
    }
}
