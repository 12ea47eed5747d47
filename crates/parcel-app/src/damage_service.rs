//! Damage confirmation use case

use parcel_domain::repository::ConditionRepository;
use parcel_domain::service::DamageConfirmation;
use parcel_types::{AiSuggestedTag, ConditionRecord, DamageAssessment, Result, StoreError};
use parcel_vision::suggest_tags;

/// Advisory suggestions to show for a record. Only handover records with a
/// detected change have any.
pub fn suggestions_for(record: &ConditionRecord) -> Vec<AiSuggestedTag> {
    record
        .comparison
        .as_ref()
        .map(suggest_tags)
        .unwrap_or_default()
}

/// Form prefilled with the record's suggestions
pub fn form_for(record: &ConditionRecord) -> DamageConfirmation {
    DamageConfirmation::new(suggestions_for(record))
}

/// Validate the operator's input and attach it to the record.
///
/// Nothing is written when validation fails.
pub fn confirm(
    repo: &dyn ConditionRepository,
    record_id: &str,
    form: DamageConfirmation,
    staff_id: &str,
) -> Result<DamageAssessment> {
    if repo.get(record_id)?.is_none() {
        return Err(StoreError::NotFound(record_id.to_string()).into());
    }
    let assessment = form.confirm(staff_id)?;
    repo.confirm_damage(record_id, &assessment)?;
    Ok(assessment)
}
