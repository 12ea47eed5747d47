//! Vision module - marker calibration, package measurement, photo scoring
//! and arrival/handover change detection

pub mod comparison;
pub mod contour;
pub mod dimensions;
pub mod fallback;
pub mod quality;
pub mod raster;
pub mod ruler;
pub mod silhouette;

// Re-export main types for convenience
pub use comparison::{compare, suggest_tags, ViewPair, DEFAULT_CHANGE_THRESHOLD};
pub use dimensions::{DimensionEngine, EngineOutput};
pub use quality::{front_quality, score_photo};
pub use raster::validate_photo;
pub use ruler::MarkerSpec;

use parcel_types::ComparisonResult;
use std::sync::Arc;
use tracing::warn;

/// Whether the measurement engine can be used for this session.
///
/// Photo scoring works either way; only dimension measurement and change
/// detection depend on the engine.
#[derive(Debug, Clone)]
pub enum VisionCapability {
    Ready(Arc<DimensionEngine>),
    Unavailable { reason: String },
}

impl VisionCapability {
    pub fn ready(engine: DimensionEngine) -> Self {
        VisionCapability::Ready(Arc::new(engine))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        VisionCapability::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, VisionCapability::Ready(_))
    }

    /// Measure a photo pair, or estimate it when the engine is unavailable
    /// or fails on these photos.
    ///
    /// The marker is located once per pair: by the engine, or by `marker`
    /// ahead of an estimate. The returned ruler is that detection.
    pub fn measure(&self, front: &[u8], side: &[u8], marker: &MarkerSpec) -> EngineOutput {
        match self {
            VisionCapability::Ready(engine) => match engine.measure(front, side) {
                Ok(output) => output,
                Err(e) => {
                    warn!(error = %e, "measurement failed, using estimate");
                    fallback::estimate_measurement(front, side, ruler::locate(front, marker))
                }
            },
            VisionCapability::Unavailable { reason } => {
                warn!(reason = %reason, "vision unavailable, using estimate");
                fallback::estimate_measurement(front, side, ruler::locate(front, marker))
            }
        }
    }

    /// Compare arrival and handover photos, or produce the labelled
    /// placeholder when the engine is unavailable
    pub fn compare(
        &self,
        arrival_condition_id: &str,
        arrival: ViewPair<'_>,
        handover: ViewPair<'_>,
        change_threshold: f64,
    ) -> ComparisonResult {
        match self {
            VisionCapability::Ready(_) => {
                match comparison::compare(arrival_condition_id, arrival, handover, change_threshold)
                {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "comparison failed, using estimate");
                        fallback::estimate_comparison(arrival_condition_id, arrival, handover)
                    }
                }
            }
            VisionCapability::Unavailable { reason } => {
                warn!(reason = %reason, "vision unavailable, comparison estimated");
                fallback::estimate_comparison(arrival_condition_id, arrival, handover)
            }
        }
    }
}
