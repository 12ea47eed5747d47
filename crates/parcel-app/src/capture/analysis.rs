//! Photo pair analysis run by the capture driver

use parcel_types::PhotoQuality;
use parcel_vision::{score_photo, EngineOutput, MarkerSpec, VisionCapability};
use tracing::warn;

/// The two halves of a capture analysis. Both are blocking and run on the
/// blocking pool side by side.
pub trait PhotoAnalyzer: Send + Sync {
    /// Blur/exposure scores of the front and side photos
    fn score(&self, front: &[u8], side: &[u8]) -> (PhotoQuality, PhotoQuality);

    /// Marker calibration and package dimensions, measured or estimated.
    /// The returned ruler is the pair's only marker detection.
    fn measure(&self, front: &[u8], side: &[u8]) -> EngineOutput;
}

/// Analyzer backed by the vision module
#[derive(Debug, Clone)]
pub struct VisionAnalyzer {
    vision: VisionCapability,
    marker: MarkerSpec,
}

impl VisionAnalyzer {
    pub fn new(vision: VisionCapability, marker: MarkerSpec) -> Self {
        Self { vision, marker }
    }

    pub fn vision(&self) -> &VisionCapability {
        &self.vision
    }
}

impl PhotoAnalyzer for VisionAnalyzer {
    fn score(&self, front: &[u8], side: &[u8]) -> (PhotoQuality, PhotoQuality) {
        // An undecodable photo scores zero and fails the gate
        let front_quality = score_photo(front).unwrap_or_else(|e| {
            warn!(error = %e, "front photo could not be scored");
            PhotoQuality::default()
        });
        let side_quality = score_photo(side).unwrap_or_else(|e| {
            warn!(error = %e, "side photo could not be scored");
            PhotoQuality::default()
        });
        (front_quality, side_quality)
    }

    fn measure(&self, front: &[u8], side: &[u8]) -> EngineOutput {
        self.vision.measure(front, side, &self.marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_types::MeasurementSource;

    #[test]
    fn test_unreadable_photos_score_zero() {
        let analyzer = VisionAnalyzer::new(
            VisionCapability::unavailable("disabled"),
            MarkerSpec::default(),
        );
        let (front, side) = analyzer.score(b"junk", b"junk");
        assert_eq!(front, PhotoQuality::default());
        assert_eq!(side, PhotoQuality::default());
        assert!(!analyzer.vision().is_ready());

        let out = analyzer.measure(b"junk", b"junk");
        assert_eq!(out.measurement.source, MeasurementSource::Estimated);
        assert!(!out.ruler.is_detected());
        assert!(out.measurement.confidence <= out.ruler.confidence);
    }
}
