//! Handover comparison and review resolution use cases

use parcel_domain::repository::{BlobStorage, ConditionRepository};
use parcel_domain::service::resolution_for;
use parcel_types::{
    ComparisonResult, ConditionRecord, Error, EventType, Result, ReviewOutcome, StorageId,
    StoreError,
};
use parcel_vision::{VisionCapability, ViewPair};
use tracing::info;

/// Compare a persisted handover record with its arrival record and attach
/// the result. A detected change flags the handover for review.
///
/// Blocking: fetches both arrival photos and runs the comparison.
pub fn compare_with_arrival(
    conditions: &dyn ConditionRepository,
    blobs: &dyn BlobStorage,
    vision: &VisionCapability,
    change_threshold: f64,
    handover: &ConditionRecord,
    arrival: &ConditionRecord,
    handover_photos: ViewPair<'_>,
) -> Result<ComparisonResult> {
    if handover.event_type != EventType::Handover || arrival.event_type != EventType::Arrival {
        return Err(Error::Validation(
            "comparison needs a handover record and its arrival record".to_string(),
        ));
    }
    if handover.order_id != arrival.order_id {
        return Err(Error::Validation(format!(
            "arrival {} belongs to order {}, not {}",
            arrival.id, arrival.order_id, handover.order_id
        )));
    }

    let arrival_front = blobs.fetch(&StorageId(arrival.front_photo_ref.clone()))?;
    let arrival_side = blobs.fetch(&StorageId(arrival.side_photo_ref.clone()))?;

    let comparison = vision.compare(
        &arrival.id,
        ViewPair::new(&arrival_front, &arrival_side),
        handover_photos,
        change_threshold,
    );
    conditions.attach_comparison(&handover.id, &comparison, comparison.change_detected)?;

    info!(
        order_id = %handover.order_id,
        ssim = comparison.ssim_score,
        changed_areas = comparison.changed_areas.len(),
        source = comparison.source.label(),
        "handover compared with arrival"
    );
    Ok(comparison)
}

/// Record the outcome of reviewing a flagged handover
pub fn resolve_review(
    conditions: &dyn ConditionRepository,
    record_id: &str,
    outcome: ReviewOutcome,
    notes: Option<String>,
    staff_id: &str,
) -> Result<ConditionRecord> {
    let record = conditions
        .get(record_id)?
        .ok_or_else(|| StoreError::NotFound(record_id.to_string()))?;
    let resolution = resolution_for(&record, outcome, notes, staff_id)?;
    conditions.resolve_review(record_id, &resolution)?;

    conditions
        .get(record_id)?
        .ok_or_else(|| StoreError::NotFound(record_id.to_string()).into())
}
