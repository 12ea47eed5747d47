//! Handover preconditions and review resolution rules

use chrono::Utc;
use parcel_types::{ConditionRecord, Error, Result, ReviewOutcome, ReviewResolution};

use crate::repository::ConditionRepository;

/// Fetch the arrival record a handover is compared against.
///
/// A handover without an arrival record is a precondition violation; callers
/// must check this before capturing or uploading anything.
pub fn require_arrival(
    repo: &dyn ConditionRepository,
    order_id: &str,
) -> Result<ConditionRecord> {
    repo.get_arrival_condition(order_id)?
        .ok_or_else(|| Error::PreconditionViolation {
            order_id: order_id.to_string(),
        })
}

/// Build the resolution for a flagged record.
///
/// Handovers are flagged by change detection, either event by a major or
/// overridden damage assessment. Only flagged, unresolved records accept one.
pub fn resolution_for(
    record: &ConditionRecord,
    outcome: ReviewOutcome,
    notes: Option<String>,
    staff_id: &str,
) -> Result<ReviewResolution> {
    if !record.flagged_for_review {
        return Err(Error::Validation(format!(
            "record {} is not flagged for review",
            record.id
        )));
    }
    if record.review.is_some() {
        return Err(Error::Validation(format!(
            "record {} has already been reviewed",
            record.id
        )));
    }

    Ok(ReviewResolution {
        outcome,
        notes: notes.filter(|n| !n.trim().is_empty()),
        resolved_by: staff_id.to_string(),
        resolved_at: Utc::now(),
    })
}
