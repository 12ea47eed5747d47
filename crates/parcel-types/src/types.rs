//! Core types for parcel condition verification

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which of the two guided shots a photo is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoRole {
    /// Top/front view; must contain the calibration marker
    Front,
    /// Side profile; yields the package height
    Side,
}

impl fmt::Display for PhotoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoRole::Front => write!(f, "front"),
            PhotoRole::Side => write!(f, "side"),
        }
    }
}

/// A captured photo. The encoded bytes are shared so the analysis jobs and
/// the uploader can hold them without copying.
#[derive(Debug, Clone)]
pub struct PhotoCapture {
    pub role: PhotoRole,
    pub bytes: Arc<Vec<u8>>,
    pub captured_at: DateTime<Utc>,
}

impl PhotoCapture {
    pub fn new(role: PhotoRole, bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Self {
        Self {
            role,
            bytes: Arc::new(bytes),
            captured_at,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Sharpness and exposure scores for a single photo (0-100 each)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoQuality {
    pub blur_score: f64,
    pub exposure_score: f64,
}

/// Front photo quality, including calibration marker presence
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontQuality {
    pub blur_score: f64,
    pub exposure_score: f64,
    pub has_scale_reference: bool,
    /// Marker detection confidence (0.0 - 1.0)
    pub ruler_confidence: f64,
}

impl FrontQuality {
    pub fn photo(&self) -> PhotoQuality {
        PhotoQuality {
            blur_score: self.blur_score,
            exposure_score: self.exposure_score,
        }
    }
}

/// Pixel-space point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Scale calibration derived from the marker in the front photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulerDetection {
    pub pixels_per_mm: f64,
    /// Marker corners in original image pixels: empty, or exactly four
    pub corners: Vec<Point>,
    pub perspective_corrected: bool,
    pub confidence: f64,
}

impl RulerDetection {
    /// Whether a marker was actually found (as opposed to the default scale)
    pub fn is_detected(&self) -> bool {
        self.corners.len() == 4
    }
}

/// Whether a value came from the vision engine or from the fallback estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementSource {
    #[default]
    Measured,
    /// Non-authoritative fallback used when the vision backend is unavailable
    Estimated,
}

impl MeasurementSource {
    pub fn is_authoritative(&self) -> bool {
        matches!(self, MeasurementSource::Measured)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeasurementSource::Measured => "measured",
            MeasurementSource::Estimated => "estimated (non-authoritative)",
        }
    }
}

/// Physical package dimensions recovered from the photo pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionMeasurement {
    pub length_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub dim_weight_kg: f64,
    /// Confidence (0.0 - 1.0), never above the ruler confidence
    pub confidence: f64,
    /// Smaller / larger silhouette footprint across the two views
    #[serde(default)]
    pub area_consistency: f64,
    #[serde(default)]
    pub source: MeasurementSource,
}

/// A reason the quality gate reports against a photo pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Deficiency {
    #[serde(rename = "missing scale reference")]
    MissingScaleReference,
    #[serde(rename = "front blur too low")]
    FrontBlurTooLow,
    #[serde(rename = "side blur too low")]
    SideBlurTooLow,
    #[serde(rename = "front exposure too low")]
    FrontExposureTooLow,
    #[serde(rename = "side exposure too low")]
    SideExposureTooLow,
}

impl Deficiency {
    pub fn label(&self) -> &'static str {
        match self {
            Deficiency::MissingScaleReference => "missing scale reference",
            Deficiency::FrontBlurTooLow => "front blur too low",
            Deficiency::SideBlurTooLow => "side blur too low",
            Deficiency::FrontExposureTooLow => "front exposure too low",
            Deficiency::SideExposureTooLow => "side exposure too low",
        }
    }

    /// Whether this deficiency prevents finalizing the capture
    pub fn is_blocking(&self) -> bool {
        !matches!(
            self,
            Deficiency::FrontExposureTooLow | Deficiency::SideExposureTooLow
        )
    }
}

impl fmt::Display for Deficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Quality gate verdict
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub quality_passed: bool,
    pub deficiencies: Vec<Deficiency>,
}

/// Everything the capture step learned about a photo pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAnalysis {
    pub front: FrontQuality,
    pub side: PhotoQuality,
    pub quality: QualityReport,
    pub ruler: RulerDetection,
    pub measurement: DimensionMeasurement,
}

/// Warehouse checkpoint a condition record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Arrival,
    Handover,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Arrival => write!(f, "arrival"),
            EventType::Handover => write!(f, "handover"),
        }
    }
}

/// Human-chosen overall package condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallCondition {
    None,
    Minor,
    Major,
}

impl OverallCondition {
    pub fn label(&self) -> &'static str {
        match self {
            OverallCondition::None => "none",
            OverallCondition::Minor => "minor",
            OverallCondition::Major => "major",
        }
    }
}

/// Fixed damage tag vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageTag {
    Dent,
    Tear,
    WaterDamage,
    CrushedCorner,
    Scratches,
    Stains,
    BrokenSeal,
    Other,
}

impl DamageTag {
    pub fn label(&self) -> &'static str {
        match self {
            DamageTag::Dent => "dent",
            DamageTag::Tear => "tear",
            DamageTag::WaterDamage => "water damage",
            DamageTag::CrushedCorner => "crushed corner",
            DamageTag::Scratches => "scratches",
            DamageTag::Stains => "stains",
            DamageTag::BrokenSeal => "broken seal",
            DamageTag::Other => "other",
        }
    }
}

/// Advisory damage suggestion shown to the operator; never applied on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestedTag {
    #[serde(rename = "type")]
    pub kind: String,
    pub confidence: f64,
    #[serde(default)]
    pub area: String,
}

/// Damage assessment attached to a condition record after human confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageAssessment {
    #[serde(default)]
    pub ai_suggested_tags: Vec<AiSuggestedTag>,
    #[serde(default)]
    pub overall_ai_confidence: f64,
    pub flagged_for_review: bool,
    pub final_assessment: OverallCondition,
    #[serde(default)]
    pub confirmed_tags: Vec<DamageTag>,
    #[serde(default)]
    pub notes: Option<String>,
    pub confirmed_by: String,
    pub confirmed_at: DateTime<Utc>,
}

/// Kind of difference found between arrival and handover photos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Brightness/colour difference: stains, water marks, labels
    Surface,
    /// Structural difference: dents, crushed corners, tears
    Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedArea {
    /// "<view>:<region>", e.g. "front:top-left"
    pub area: String,
    pub change_type: ChangeType,
    pub confidence: f64,
}

/// Arrival-vs-handover change detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub arrival_condition_id: String,
    pub alignment_score: f64,
    pub ssim_score: f64,
    pub change_detected: bool,
    #[serde(default)]
    pub changed_areas: Vec<ChangedArea>,
    #[serde(default)]
    pub source: MeasurementSource,
    pub computed_at: DateTime<Utc>,
}

/// Outcome of reviewing a handover flagged by change detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    /// Differences are benign; release may proceed
    Cleared,
    /// Differences need follow-up with the courier or customer
    Escalated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResolution {
    pub outcome: ReviewOutcome,
    #[serde(default)]
    pub notes: Option<String>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

/// Persisted condition record; one per (order, event type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRecord {
    pub id: String,
    pub order_id: String,
    pub event_type: EventType,
    pub front_photo_ref: String,
    pub side_photo_ref: String,
    pub photo_analysis: PhotoAnalysis,
    #[serde(default)]
    pub dimension_measurement: Option<DimensionMeasurement>,
    #[serde(default)]
    pub actual_weight_kg: Option<f64>,
    #[serde(default)]
    pub courier: Option<String>,
    pub staff_id: String,
    pub warehouse_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub damage: Option<DamageAssessment>,
    #[serde(default)]
    pub comparison: Option<ComparisonResult>,
    #[serde(default)]
    pub flagged_for_review: bool,
    #[serde(default)]
    pub review: Option<ReviewResolution>,
}

impl ConditionRecord {
    pub fn new(
        order_id: String,
        event_type: EventType,
        front_photo_ref: String,
        side_photo_ref: String,
        photo_analysis: PhotoAnalysis,
        staff_id: String,
        warehouse_id: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order_id,
            event_type,
            front_photo_ref,
            side_photo_ref,
            photo_analysis,
            dimension_measurement: None,
            actual_weight_kg: None,
            courier: None,
            staff_id,
            warehouse_id,
            timestamp: Utc::now(),
            damage: None,
            comparison: None,
            flagged_for_review: false,
            review: None,
        }
    }

    pub fn with_actual_weight(mut self, weight_kg: f64) -> Self {
        self.actual_weight_kg = Some(weight_kg);
        self
    }

    pub fn with_courier(mut self, courier: String) -> Self {
        self.courier = Some(courier);
        self
    }

    /// Flagged and not yet resolved
    pub fn awaiting_review(&self) -> bool {
        self.flagged_for_review && self.review.is_none()
    }
}

/// Opaque identifier returned by blob storage for an uploaded photo
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(pub String);

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-shot upload target handed out by blob storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadUrl(pub String);

impl fmt::Display for UploadUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deficiency_serializes_as_label() {
        let json = serde_json::to_string(&Deficiency::MissingScaleReference).unwrap();
        assert_eq!(json, "\"missing scale reference\"");
    }

    #[test]
    fn test_exposure_deficiencies_are_not_blocking() {
        assert!(!Deficiency::FrontExposureTooLow.is_blocking());
        assert!(!Deficiency::SideExposureTooLow.is_blocking());
        assert!(Deficiency::FrontBlurTooLow.is_blocking());
        assert!(Deficiency::MissingScaleReference.is_blocking());
    }

    #[test]
    fn test_damage_tag_snake_case() {
        let json = serde_json::to_string(&DamageTag::CrushedCorner).unwrap();
        assert_eq!(json, "\"crushed_corner\"");
        assert_eq!(DamageTag::WaterDamage.label(), "water damage");
    }

    #[test]
    fn test_ruler_detection_requires_four_corners() {
        let ruler = RulerDetection {
            pixels_per_mm: 3.0,
            corners: Vec::new(),
            perspective_corrected: false,
            confidence: 0.3,
        };
        assert!(!ruler.is_detected());
    }

    #[test]
    fn test_ai_suggested_tag_uses_type_key() {
        let tag: AiSuggestedTag =
            serde_json::from_str(r#"{"type": "dent", "confidence": 0.8, "area": "top"}"#).unwrap();
        assert_eq!(tag.kind, "dent");
        assert!((tag.confidence - 0.8).abs() < f64::EPSILON);
    }
}
