//! Capture effect executor
//!
//! Feeds events into the pure state machine and carries out the effects it
//! returns: camera lease, analysis on the blocking pool, bundle hand-off.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parcel_domain::service::quality_gate;
use parcel_infra::PhotoMetadata;
use parcel_types::{Error, PhotoAnalysis, PhotoCapture, PhotoRole, Result};
use parcel_vision::{front_quality, validate_photo};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::analysis::PhotoAnalyzer;
use super::machine::{
    step, CaptureBundle, CaptureEffect, CaptureEvent, CaptureMachine, CaptureState, Rejection,
};

/// Device the guided capture takes photos with
pub trait Camera: Send + Sync {
    /// Claim exclusive use of the device
    fn acquire(&self) -> Result<()>;

    fn release(&self);

    /// Take one shot and return the encoded image
    fn capture(&self, role: PhotoRole) -> Result<Vec<u8>>;
}

/// Held camera; released when dropped
pub struct CameraLease {
    camera: Arc<dyn Camera>,
}

impl CameraLease {
    pub fn acquire(camera: Arc<dyn Camera>) -> Result<Self> {
        camera.acquire()?;
        debug!("camera acquired");
        Ok(Self { camera })
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.camera.release();
        debug!("camera released");
    }
}

/// Drives one capture session
pub struct CaptureDriver {
    camera: Arc<dyn Camera>,
    analyzer: Arc<dyn PhotoAnalyzer>,
    machine: CaptureMachine,
    lease: Option<CameraLease>,
    bundle: Option<CaptureBundle>,
    cancel: CancellationToken,
}

impl CaptureDriver {
    /// Start a session at the front shot. When the camera cannot be acquired
    /// the session starts in `Error` and may be retried.
    pub async fn start(camera: Arc<dyn Camera>, analyzer: Arc<dyn PhotoAnalyzer>) -> Self {
        let (machine, effects) = CaptureMachine::start();
        let mut driver = Self {
            camera,
            analyzer,
            machine,
            lease: None,
            bundle: None,
            cancel: CancellationToken::new(),
        };
        let mut queue = VecDeque::new();
        driver.apply(effects, &mut queue).await;
        driver.drain(queue).await;
        driver
    }

    pub fn state(&self) -> CaptureState {
        self.machine.state()
    }

    pub fn analysis(&self) -> Option<&PhotoAnalysis> {
        self.machine.analysis()
    }

    pub fn camera_error(&self) -> Option<&str> {
        self.machine.camera_error()
    }

    pub fn analysis_error(&self) -> Option<&str> {
        self.machine.analysis_error()
    }

    pub fn holds_camera(&self) -> bool {
        self.lease.is_some()
    }

    /// Token that cancels the session from another task
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Take the next guided shot. The side shot runs the analysis before
    /// returning; when that fails the session is back at the side shot and
    /// the failure is returned.
    pub async fn shutter(&mut self) -> Result<CaptureState> {
        let role = match self.state() {
            CaptureState::Front => PhotoRole::Front,
            CaptureState::Side => PhotoRole::Side,
            state => {
                return Err(Error::InvalidStep(format!(
                    "cannot take a photo while {}",
                    state
                )))
            }
        };

        let bytes = match self.camera.capture(role) {
            Ok(bytes) => bytes,
            Err(e) => {
                let reason = e.to_string();
                self.dispatch(CaptureEvent::CameraFailed(reason.clone()))
                    .await;
                return Err(Error::CameraUnavailable(reason));
            }
        };

        // Undersized or unreadable shots are refused without a transition
        let (width, height) = validate_photo(&bytes)?;
        let captured_at = PhotoMetadata::captured_at_or(&bytes, Utc::now());
        debug!(%role, width, height, "photo taken");

        self.dispatch(CaptureEvent::Shutter(PhotoCapture::new(role, bytes, captured_at)))
            .await
            .map_or(Ok(()), |r| Err(rejection_error(r)))?;

        match self.state() {
            CaptureState::Cancelled => Err(Error::Cancelled),
            CaptureState::Side if role == PhotoRole::Side => Err(Error::VisionUnavailable(
                self.analysis_error()
                    .unwrap_or("analysis failed")
                    .to_string(),
            )),
            state => Ok(state),
        }
    }

    pub async fn retake_front(&mut self) -> Result<()> {
        self.send(CaptureEvent::RetakeFront).await
    }

    pub async fn retake_side(&mut self) -> Result<()> {
        self.send(CaptureEvent::RetakeSide).await
    }

    /// Finalize the capture. Refused while the quality gate fails.
    pub async fn confirm(&mut self) -> Result<CaptureBundle> {
        self.send(CaptureEvent::Confirm).await?;
        self.bundle.take().ok_or_else(|| {
            Error::InvalidStep("capture confirmed without photos".to_string())
        })
    }

    /// Re-acquire the camera after a fault
    pub async fn retry(&mut self) -> Result<CaptureState> {
        self.send(CaptureEvent::Retry).await?;
        match self.state() {
            CaptureState::Error => Err(Error::CameraUnavailable(
                self.camera_error().unwrap_or("camera unavailable").to_string(),
            )),
            state => Ok(state),
        }
    }

    /// Abandon the session; nothing is kept
    pub async fn cancel(&mut self) -> Result<()> {
        self.cancel.cancel();
        self.send(CaptureEvent::Cancel).await
    }

    async fn send(&mut self, event: CaptureEvent) -> Result<()> {
        match self.dispatch(event).await {
            Some(rejection) => Err(rejection_error(rejection)),
            None => Ok(()),
        }
    }

    /// Run an event and everything it triggers. Returns the first rejection.
    async fn dispatch(&mut self, event: CaptureEvent) -> Option<Rejection> {
        self.drain(VecDeque::from([event])).await
    }

    async fn drain(&mut self, mut queue: VecDeque<CaptureEvent>) -> Option<Rejection> {
        let mut first_rejection = None;
        while let Some(event) = queue.pop_front() {
            let from = self.machine.state();
            let name = event.name();
            let (machine, effects) = step(self.machine.clone(), event);
            self.machine = machine;
            debug!(event = name, from = %from, to = %self.machine.state(), "capture transition");

            if let Some(rejection) = self.apply(effects, &mut queue).await {
                first_rejection.get_or_insert(rejection);
            }
        }
        first_rejection
    }

    async fn apply(
        &mut self,
        effects: Vec<CaptureEffect>,
        queue: &mut VecDeque<CaptureEvent>,
    ) -> Option<Rejection> {
        let mut rejection = None;
        for effect in effects {
            match effect {
                CaptureEffect::AcquireCamera => {
                    match CameraLease::acquire(Arc::clone(&self.camera)) {
                        Ok(lease) => self.lease = Some(lease),
                        Err(e) => {
                            warn!(error = %e, "camera could not be acquired");
                            queue.push_back(CaptureEvent::CameraFailed(e.to_string()));
                        }
                    }
                }
                CaptureEffect::ReleaseCamera => {
                    self.lease = None;
                }
                CaptureEffect::StartAnalysis {
                    generation,
                    front,
                    side,
                } => match self.analyze(front, side).await {
                    Ok(analysis) => {
                        info!(
                            generation,
                            passed = analysis.quality.quality_passed,
                            length_mm = analysis.measurement.length_mm,
                            width_mm = analysis.measurement.width_mm,
                            height_mm = analysis.measurement.height_mm,
                            "photo pair analyzed"
                        );
                        queue.push_back(CaptureEvent::AnalysisCompleted {
                            generation,
                            analysis,
                        });
                    }
                    Err(Error::Cancelled) => queue.push_back(CaptureEvent::Cancel),
                    Err(e) => {
                        warn!(generation, error = %e, "analysis failed");
                        queue.push_back(CaptureEvent::AnalysisFailed {
                            generation,
                            reason: e.to_string(),
                        });
                    }
                },
                CaptureEffect::AbortAnalysis { generation } => {
                    debug!(generation, "analysis abandoned");
                }
                CaptureEffect::EmitBundle(bundle) => {
                    self.bundle = Some(bundle);
                }
                CaptureEffect::Rejected(r) => {
                    debug!(reason = %r, "capture event rejected");
                    rejection.get_or_insert(r);
                }
            }
        }
        rejection
    }

    /// Score and measure the pair as two blocking jobs, raced against the
    /// session's cancellation token
    async fn analyze(&self, front: PhotoCapture, side: PhotoCapture) -> Result<PhotoAnalysis> {
        let scoring = {
            let analyzer = Arc::clone(&self.analyzer);
            let (front, side) = (Arc::clone(&front.bytes), Arc::clone(&side.bytes));
            tokio::task::spawn_blocking(move || analyzer.score(&front, &side))
        };
        let measuring = {
            let analyzer = Arc::clone(&self.analyzer);
            let (front, side) = (Arc::clone(&front.bytes), Arc::clone(&side.bytes));
            tokio::task::spawn_blocking(move || analyzer.measure(&front, &side))
        };

        let joined = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            joined = async { tokio::try_join!(scoring, measuring) } => joined,
        };
        let ((front_scores, side_quality), output) = joined
            .map_err(|e| Error::VisionUnavailable(format!("analysis task failed: {}", e)))?;

        let front_quality = front_quality(front_scores, &output.ruler);
        let quality = quality_gate::evaluate(&front_quality, &side_quality);
        Ok(PhotoAnalysis {
            front: front_quality,
            side: side_quality,
            quality,
            ruler: output.ruler,
            measurement: output.measurement,
        })
    }
}

fn rejection_error(rejection: Rejection) -> Error {
    match rejection {
        Rejection::QualityGate(_) => Error::Validation(rejection.to_string()),
        Rejection::NotAllowed { .. } => Error::InvalidStep(rejection.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::analysis::VisionAnalyzer;
    use image::{GrayImage, ImageFormat, Luma};
    use parcel_types::{
        DimensionMeasurement, MeasurementSource, PhotoQuality, Point, RulerDetection,
    };
    use parcel_vision::{EngineOutput, MarkerSpec, VisionCapability};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn png(width: u32, height: u32, value: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        GrayImage::from_pixel(width, height, Luma([value]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[derive(Default)]
    struct FakeCamera {
        acquired: AtomicUsize,
        released: AtomicUsize,
        shots: AtomicUsize,
        /// Fail this many acquisitions before succeeding
        failing_acquires: AtomicUsize,
        /// Photo size handed out for every shot
        size: Mutex<(u32, u32)>,
        /// Cancelled when the side shot is taken
        cancel_on_side: Mutex<Option<CancellationToken>>,
    }

    impl FakeCamera {
        fn new() -> Arc<Self> {
            let camera = Self::default();
            *camera.size.lock().unwrap() = (640, 480);
            Arc::new(camera)
        }

        fn held(&self) -> usize {
            self.acquired.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
        }
    }

    impl Camera for FakeCamera {
        fn acquire(&self) -> Result<()> {
            let pending = self.failing_acquires.load(Ordering::SeqCst);
            if pending > 0 {
                self.failing_acquires.store(pending - 1, Ordering::SeqCst);
                return Err(Error::CameraUnavailable("device busy".to_string()));
            }
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn capture(&self, role: PhotoRole) -> Result<Vec<u8>> {
            let n = self.shots.fetch_add(1, Ordering::SeqCst);
            if role == PhotoRole::Side {
                if let Some(token) = self.cancel_on_side.lock().unwrap().as_ref() {
                    token.cancel();
                }
            }
            let (w, h) = *self.size.lock().unwrap();
            Ok(png(w, h, 100 + n as u8))
        }
    }

    /// Analyzer with fixed scores
    struct FixedAnalyzer {
        blur: f64,
    }

    impl PhotoAnalyzer for FixedAnalyzer {
        fn score(&self, _front: &[u8], _side: &[u8]) -> (PhotoQuality, PhotoQuality) {
            (
                PhotoQuality {
                    blur_score: self.blur,
                    exposure_score: 80.0,
                },
                PhotoQuality {
                    blur_score: self.blur,
                    exposure_score: 80.0,
                },
            )
        }

        fn measure(&self, _front: &[u8], _side: &[u8]) -> EngineOutput {
            EngineOutput {
                ruler: RulerDetection {
                    pixels_per_mm: 2.0,
                    corners: vec![
                        Point::new(10.0, 10.0),
                        Point::new(213.0, 10.0),
                        Point::new(213.0, 162.0),
                        Point::new(10.0, 162.0),
                    ],
                    perspective_corrected: false,
                    confidence: 0.9,
                },
                measurement: DimensionMeasurement {
                    length_mm: 200.0,
                    width_mm: 150.0,
                    height_mm: 80.0,
                    dim_weight_kg: 0.48,
                    confidence: 0.8,
                    area_consistency: 0.8,
                    source: MeasurementSource::Measured,
                },
            }
        }
    }

    fn sharp() -> Arc<dyn PhotoAnalyzer> {
        Arc::new(FixedAnalyzer { blur: 90.0 })
    }

    /// Measuring panics on the first pair, then behaves like `FixedAnalyzer`
    struct CrashOnceAnalyzer {
        inner: FixedAnalyzer,
        crashed: AtomicUsize,
    }

    impl PhotoAnalyzer for CrashOnceAnalyzer {
        fn score(&self, front: &[u8], side: &[u8]) -> (PhotoQuality, PhotoQuality) {
            self.inner.score(front, side)
        }

        fn measure(&self, front: &[u8], side: &[u8]) -> EngineOutput {
            if self.crashed.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("measurement worker crashed");
            }
            self.inner.measure(front, side)
        }
    }

    #[tokio::test]
    async fn test_full_capture_releases_camera() {
        let camera = FakeCamera::new();
        let mut driver = CaptureDriver::start(camera.clone(), sharp()).await;
        assert_eq!(driver.state(), CaptureState::Front);
        assert!(driver.holds_camera());

        assert_eq!(driver.shutter().await.unwrap(), CaptureState::Side);
        assert_eq!(driver.shutter().await.unwrap(), CaptureState::Analyzed);
        assert!(driver.analysis().unwrap().quality.quality_passed);

        let bundle = driver.confirm().await.unwrap();
        assert_eq!(bundle.front.role, PhotoRole::Front);
        assert_eq!(bundle.side.role, PhotoRole::Side);
        assert!((bundle.analysis.measurement.length_mm - 200.0).abs() < 1e-9);
        assert_eq!(driver.state(), CaptureState::Confirmed);
        assert_eq!(camera.held(), 0);
    }

    #[tokio::test]
    async fn test_low_resolution_shot_is_refused() {
        let camera = FakeCamera::new();
        *camera.size.lock().unwrap() = (320, 240);
        let mut driver = CaptureDriver::start(camera.clone(), sharp()).await;

        let err = driver.shutter().await.unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
        assert_eq!(driver.state(), CaptureState::Front);
        assert_eq!(camera.held(), 1);
    }

    #[tokio::test]
    async fn test_gate_failure_blocks_confirm() {
        let camera = FakeCamera::new();
        let mut driver =
            CaptureDriver::start(camera.clone(), Arc::new(FixedAnalyzer { blur: 10.0 })).await;
        driver.shutter().await.unwrap();
        driver.shutter().await.unwrap();

        let err = driver.confirm().await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("front blur too low")));
        assert_eq!(driver.state(), CaptureState::Analyzed);
        assert!(driver.holds_camera());
    }

    #[tokio::test]
    async fn test_blank_photos_fail_real_scoring() {
        let camera = FakeCamera::new();
        let analyzer = VisionAnalyzer::new(
            VisionCapability::unavailable("disabled"),
            MarkerSpec::default(),
        );
        let mut driver = CaptureDriver::start(camera.clone(), Arc::new(analyzer)).await;
        driver.shutter().await.unwrap();
        driver.shutter().await.unwrap();

        let analysis = driver.analysis().unwrap();
        assert!(!analysis.quality.quality_passed);
        assert!(!analysis.front.has_scale_reference);
        assert_eq!(analysis.measurement.source, MeasurementSource::Estimated);
        assert_eq!(analysis.front.ruler_confidence, analysis.ruler.confidence);
        assert!(analysis.measurement.confidence <= analysis.ruler.confidence);
        assert!(driver.confirm().await.is_err());
    }

    #[tokio::test]
    async fn test_analysis_failure_keeps_camera_and_front() {
        let camera = FakeCamera::new();
        let analyzer = Arc::new(CrashOnceAnalyzer {
            inner: FixedAnalyzer { blur: 90.0 },
            crashed: AtomicUsize::new(0),
        });
        let mut driver = CaptureDriver::start(camera.clone(), analyzer).await;
        driver.shutter().await.unwrap();

        let err = driver.shutter().await.unwrap_err();
        assert!(matches!(err, Error::VisionUnavailable(_)));
        assert_eq!(driver.state(), CaptureState::Side);
        assert!(driver.camera_error().is_none());
        assert!(driver.analysis_error().is_some());
        assert!(driver.holds_camera());
        assert_eq!(camera.held(), 1);

        // Only the side shot is retaken
        assert_eq!(driver.shutter().await.unwrap(), CaptureState::Analyzed);
        assert!(driver.analysis_error().is_none());
        assert_eq!(camera.shots.load(Ordering::SeqCst), 3);
        driver.confirm().await.unwrap();
        assert_eq!(camera.held(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_analysis_drops_everything() {
        let camera = FakeCamera::new();
        let mut driver = CaptureDriver::start(camera.clone(), sharp()).await;
        *camera.cancel_on_side.lock().unwrap() = Some(driver.cancel_token());

        driver.shutter().await.unwrap();
        let err = driver.shutter().await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(driver.state(), CaptureState::Cancelled);
        assert!(driver.analysis().is_none());
        assert_eq!(camera.held(), 0);
        assert!(driver.confirm().await.is_err());
    }

    #[tokio::test]
    async fn test_acquire_failure_then_retry() {
        let camera = FakeCamera::new();
        camera.failing_acquires.store(2, Ordering::SeqCst);
        let mut driver = CaptureDriver::start(camera.clone(), sharp()).await;
        assert_eq!(driver.state(), CaptureState::Error);
        assert_eq!(driver.camera_error(), Some("Camera unavailable: device busy"));
        assert!(matches!(driver.shutter().await, Err(Error::InvalidStep(_))));

        assert!(matches!(driver.retry().await, Err(Error::CameraUnavailable(_))));
        assert_eq!(driver.retry().await.unwrap(), CaptureState::Front);
        assert_eq!(camera.held(), 1);
    }

    #[tokio::test]
    async fn test_retake_side_reanalyzes() {
        let camera = FakeCamera::new();
        let mut driver = CaptureDriver::start(camera.clone(), sharp()).await;
        driver.shutter().await.unwrap();
        driver.shutter().await.unwrap();

        driver.retake_side().await.unwrap();
        assert_eq!(driver.state(), CaptureState::Side);
        assert!(driver.analysis().is_none());
        assert_eq!(driver.shutter().await.unwrap(), CaptureState::Analyzed);

        driver.retake_front().await.unwrap();
        assert_eq!(driver.state(), CaptureState::Front);
        assert!(driver.retake_front().await.is_err());
        assert_eq!(camera.shots.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_releases_camera() {
        let camera = FakeCamera::new();
        let mut driver = CaptureDriver::start(camera.clone(), sharp()).await;
        driver.shutter().await.unwrap();
        driver.cancel().await.unwrap();
        assert_eq!(driver.state(), CaptureState::Cancelled);
        assert_eq!(camera.held(), 0);
        assert!(driver.cancel().await.is_err());
    }
}
