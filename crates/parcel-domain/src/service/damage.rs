//! Damage assessment confirmation
//!
//! AI suggestions are carried as advisory display data only. Nothing becomes
//! part of the assessment until an operator picks an overall condition and
//! confirms.

use chrono::Utc;
use parcel_types::{
    AiSuggestedTag, DamageAssessment, DamageTag, Error, OverallCondition, Result,
};

/// A suggestion at or above this confidence that the operator overrides with
/// "none" sends the record to review.
pub const SUGGESTION_REVIEW_CONFIDENCE: f64 = 0.7;

/// Operator input collected before confirmation
#[derive(Debug, Clone, Default)]
pub struct DamageConfirmation {
    suggestions: Vec<AiSuggestedTag>,
    condition: Option<OverallCondition>,
    tags: Vec<DamageTag>,
    notes: String,
}

impl DamageConfirmation {
    pub fn new(suggestions: Vec<AiSuggestedTag>) -> Self {
        Self {
            suggestions,
            ..Default::default()
        }
    }

    pub fn suggestions(&self) -> &[AiSuggestedTag] {
        &self.suggestions
    }

    pub fn condition(&self) -> Option<OverallCondition> {
        self.condition
    }

    pub fn tags(&self) -> &[DamageTag] {
        &self.tags
    }

    pub fn select_condition(&mut self, condition: OverallCondition) {
        self.condition = Some(condition);
    }

    /// Add the tag if absent, remove it if present
    pub fn toggle_tag(&mut self, tag: DamageTag) {
        if let Some(pos) = self.tags.iter().position(|t| *t == tag) {
            self.tags.remove(pos);
        } else {
            self.tags.push(tag);
        }
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Highest suggestion confidence, 0 when there are none
    pub fn overall_ai_confidence(&self) -> f64 {
        self.suggestions
            .iter()
            .map(|s| s.confidence.clamp(0.0, 1.0))
            .fold(0.0, f64::max)
    }

    /// Validate and produce the assessment to persist.
    ///
    /// Tags and notes only carry meaning when damage was found, so they are
    /// dropped for a "none" condition.
    pub fn confirm(self, staff_id: &str) -> Result<DamageAssessment> {
        let condition = self.condition.ok_or_else(|| {
            Error::Validation("an overall condition must be selected".to_string())
        })?;

        let overall_ai_confidence = self.overall_ai_confidence();
        let strong_suggestion = self
            .suggestions
            .iter()
            .any(|s| s.confidence >= SUGGESTION_REVIEW_CONFIDENCE);

        let flagged_for_review = match condition {
            OverallCondition::Major => true,
            OverallCondition::None => strong_suggestion,
            OverallCondition::Minor => false,
        };

        let (confirmed_tags, notes) = if condition == OverallCondition::None {
            (Vec::new(), None)
        } else {
            let trimmed = self.notes.trim();
            let notes = (!trimmed.is_empty()).then(|| trimmed.to_string());
            (self.tags, notes)
        };

        Ok(DamageAssessment {
            ai_suggested_tags: self.suggestions,
            overall_ai_confidence,
            flagged_for_review,
            final_assessment: condition,
            confirmed_tags,
            notes,
            confirmed_by: staff_id.to_string(),
            confirmed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(kind: &str, confidence: f64) -> AiSuggestedTag {
        AiSuggestedTag {
            kind: kind.to_string(),
            confidence,
            area: "top".to_string(),
        }
    }

    #[test]
    fn test_confirm_without_condition_is_rejected() {
        let mut form = DamageConfirmation::new(vec![suggestion("dent", 0.9)]);
        form.toggle_tag(DamageTag::Dent);
        let err = form.confirm("staff-1").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_suggestions_are_never_auto_applied() {
        let mut form = DamageConfirmation::new(vec![suggestion("dent", 0.95)]);
        form.select_condition(OverallCondition::Minor);
        let assessment = form.confirm("staff-1").unwrap();
        assert!(assessment.confirmed_tags.is_empty());
        assert_eq!(assessment.ai_suggested_tags.len(), 1);
        assert!((assessment.overall_ai_confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_notes_and_tags_dropped_for_none() {
        let mut form = DamageConfirmation::new(Vec::new());
        form.select_condition(OverallCondition::None);
        form.toggle_tag(DamageTag::Stains);
        form.set_notes("looks fine");
        let assessment = form.confirm("staff-1").unwrap();
        assert_eq!(assessment.final_assessment, OverallCondition::None);
        assert!(assessment.notes.is_none());
        assert!(assessment.confirmed_tags.is_empty());
        assert!(!assessment.flagged_for_review);
    }

    #[test]
    fn test_minor_keeps_tags_and_trimmed_notes() {
        let mut form = DamageConfirmation::new(Vec::new());
        form.select_condition(OverallCondition::Minor);
        form.toggle_tag(DamageTag::Scratches);
        form.toggle_tag(DamageTag::Dent);
        form.toggle_tag(DamageTag::Scratches);
        form.set_notes("  corner dent  ");
        let assessment = form.confirm("staff-7").unwrap();
        assert_eq!(assessment.confirmed_tags, vec![DamageTag::Dent]);
        assert_eq!(assessment.notes.as_deref(), Some("corner dent"));
        assert_eq!(assessment.confirmed_by, "staff-7");
    }

    #[test]
    fn test_major_is_flagged() {
        let mut form = DamageConfirmation::new(Vec::new());
        form.select_condition(OverallCondition::Major);
        assert!(form.confirm("s").unwrap().flagged_for_review);
    }

    #[test]
    fn test_overriding_strong_suggestion_is_flagged() {
        let mut form = DamageConfirmation::new(vec![suggestion("tear", 0.7)]);
        form.select_condition(OverallCondition::None);
        assert!(form.confirm("s").unwrap().flagged_for_review);

        let mut weak = DamageConfirmation::new(vec![suggestion("tear", 0.4)]);
        weak.select_condition(OverallCondition::None);
        assert!(!weak.confirm("s").unwrap().flagged_for_review);
    }
}
