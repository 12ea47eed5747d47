//! File-based implementation of ConditionRepository

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use parcel_domain::repository::ConditionRepository;
use parcel_store::ConditionStore;
use parcel_types::{
    ComparisonResult, ConditionRecord, DamageAssessment, DimensionMeasurement, Error, EventType,
    ReviewResolution, StoreError,
};
use tracing::{debug, info};

/// Condition repository backed by the JSON condition store.
///
/// The store is the only shared mutable state across capture sessions, so
/// every access goes through one lock.
pub struct FileConditionRepository {
    store: Mutex<ConditionStore>,
}

impl FileConditionRepository {
    /// Create or load a repository under `store_dir`
    pub fn open(store_dir: PathBuf) -> Result<Self, Error> {
        Ok(Self::from_store(ConditionStore::open(store_dir)?))
    }

    /// Repository that is never written to disk
    pub fn in_memory() -> Self {
        Self::from_store(ConditionStore::in_memory())
    }

    pub fn from_store(store: ConditionStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConditionStore>, Error> {
        self.store
            .lock()
            .map_err(|_| StoreError::IoError("condition store lock poisoned".to_string()).into())
    }

    /// Run a read-only query against the underlying store
    pub fn with_store<T>(&self, query: impl FnOnce(&ConditionStore) -> T) -> Result<T, Error> {
        let store = self.lock()?;
        Ok(query(&store))
    }

    fn require(store: &ConditionStore, id: &str) -> Result<(), Error> {
        if store.get(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()).into());
        }
        Ok(())
    }
}

impl ConditionRepository for FileConditionRepository {
    fn create(&self, record: &ConditionRecord) -> Result<(), Error> {
        let mut store = self.lock()?;
        store.insert(record.clone())?;
        info!(
            id = %record.id,
            order_id = %record.order_id,
            event = %record.event_type,
            "condition record created"
        );
        Ok(())
    }

    fn attach_measurement(
        &self,
        id: &str,
        measurement: &DimensionMeasurement,
    ) -> Result<(), Error> {
        let mut store = self.lock()?;
        store.update(id, |r| r.dimension_measurement = Some(measurement.clone()))?;
        debug!(id, "measurement attached");
        Ok(())
    }

    fn confirm_damage(&self, id: &str, assessment: &DamageAssessment) -> Result<(), Error> {
        let mut store = self.lock()?;
        store.update(id, |r| {
            r.flagged_for_review |= assessment.flagged_for_review;
            r.damage = Some(assessment.clone());
        })?;
        info!(
            id,
            condition = assessment.final_assessment.label(),
            flagged = assessment.flagged_for_review,
            "damage confirmed"
        );
        Ok(())
    }

    fn get_arrival_condition(&self, order_id: &str) -> Result<Option<ConditionRecord>, Error> {
        let store = self.lock()?;
        Ok(store
            .get_by_order_event(order_id, EventType::Arrival)
            .cloned())
    }

    fn get(&self, id: &str) -> Result<Option<ConditionRecord>, Error> {
        let store = self.lock()?;
        Ok(store.get(id).cloned())
    }

    fn find_by_order(&self, order_id: &str) -> Result<Vec<ConditionRecord>, Error> {
        let store = self.lock()?;
        Ok(store.find_by_order(order_id).into_iter().cloned().collect())
    }

    fn attach_comparison(
        &self,
        id: &str,
        comparison: &ComparisonResult,
        flagged_for_review: bool,
    ) -> Result<(), Error> {
        let mut store = self.lock()?;
        Self::require(&store, id)?;
        if store.get(id).is_some_and(|r| r.comparison.is_some()) {
            return Err(Error::Validation(format!(
                "record {} already has a comparison",
                id
            )));
        }
        store.update(id, |r| {
            r.comparison = Some(comparison.clone());
            r.flagged_for_review |= flagged_for_review;
        })?;
        info!(
            id,
            change_detected = comparison.change_detected,
            flagged = flagged_for_review,
            "comparison attached"
        );
        Ok(())
    }

    fn resolve_review(&self, id: &str, resolution: &ReviewResolution) -> Result<(), Error> {
        let mut store = self.lock()?;
        store.update(id, |r| r.review = Some(resolution.clone()))?;
        info!(id, outcome = ?resolution.outcome, "review resolved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parcel_types::{
        FrontQuality, MeasurementSource, OverallCondition, PhotoAnalysis, PhotoQuality,
        QualityReport, ReviewOutcome, RulerDetection,
    };
    use tempfile::tempdir;

    fn measurement() -> DimensionMeasurement {
        DimensionMeasurement {
            length_mm: 200.0,
            width_mm: 150.0,
            height_mm: 80.0,
            dim_weight_kg: 0.48,
            confidence: 0.6,
            area_consistency: 0.7,
            source: MeasurementSource::Measured,
        }
    }

    fn record(order_id: &str, event: EventType) -> ConditionRecord {
        let analysis = PhotoAnalysis {
            front: FrontQuality::default(),
            side: PhotoQuality::default(),
            quality: QualityReport::default(),
            ruler: RulerDetection {
                pixels_per_mm: 2.0,
                corners: Vec::new(),
                perspective_corrected: false,
                confidence: 0.9,
            },
            measurement: measurement(),
        };
        ConditionRecord::new(
            order_id.to_string(),
            event,
            "front".to_string(),
            "side".to_string(),
            analysis,
            "staff-1".to_string(),
            "wh-1".to_string(),
        )
    }

    fn comparison(arrival_id: &str, changed: bool) -> ComparisonResult {
        ComparisonResult {
            arrival_condition_id: arrival_id.to_string(),
            alignment_score: 0.9,
            ssim_score: 0.8,
            change_detected: changed,
            changed_areas: Vec::new(),
            source: MeasurementSource::Measured,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_lookup_arrival() {
        let repo = FileConditionRepository::in_memory();
        let arrival = record("ORD-1", EventType::Arrival);
        repo.create(&arrival).unwrap();
        repo.attach_measurement(&arrival.id, &measurement()).unwrap();

        let found = repo.get_arrival_condition("ORD-1").unwrap().unwrap();
        assert_eq!(found.id, arrival.id);
        assert_eq!(found.dimension_measurement, Some(measurement()));
        assert!(repo.get_arrival_condition("ORD-2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_event_is_rejected() {
        let repo = FileConditionRepository::in_memory();
        repo.create(&record("ORD-1", EventType::Arrival)).unwrap();
        let err = repo.create(&record("ORD-1", EventType::Arrival)).unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::Duplicate { .. })));
    }

    #[test]
    fn test_damage_flag_is_sticky() {
        let repo = FileConditionRepository::in_memory();
        let r = record("ORD-1", EventType::Handover);
        repo.create(&r).unwrap();
        repo.attach_comparison(&r.id, &comparison("a", true), true)
            .unwrap();

        let assessment = DamageAssessment {
            ai_suggested_tags: Vec::new(),
            overall_ai_confidence: 0.0,
            flagged_for_review: false,
            final_assessment: OverallCondition::None,
            confirmed_tags: Vec::new(),
            notes: None,
            confirmed_by: "staff-1".to_string(),
            confirmed_at: Utc::now(),
        };
        repo.confirm_damage(&r.id, &assessment).unwrap();

        let stored = repo.get(&r.id).unwrap().unwrap();
        assert!(stored.flagged_for_review);
        assert!(stored.damage.is_some());
    }

    #[test]
    fn test_comparison_is_computed_once() {
        let repo = FileConditionRepository::in_memory();
        let r = record("ORD-1", EventType::Handover);
        repo.create(&r).unwrap();
        repo.attach_comparison(&r.id, &comparison("a", false), false)
            .unwrap();
        let err = repo
            .attach_comparison(&r.id, &comparison("a", true), true)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!repo.get(&r.id).unwrap().unwrap().flagged_for_review);
    }

    #[test]
    fn test_missing_record_errors() {
        let repo = FileConditionRepository::in_memory();
        assert!(repo.attach_measurement("nope", &measurement()).is_err());
        assert!(matches!(
            repo.attach_comparison("nope", &comparison("a", false), false),
            Err(Error::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_review_persists_across_open() {
        let dir = tempdir().unwrap();
        let id = {
            let repo = FileConditionRepository::open(dir.path().to_path_buf()).unwrap();
            let r = record("ORD-1", EventType::Handover);
            repo.create(&r).unwrap();
            repo.resolve_review(
                &r.id,
                &ReviewResolution {
                    outcome: ReviewOutcome::Cleared,
                    notes: None,
                    resolved_by: "lead-1".to_string(),
                    resolved_at: Utc::now(),
                },
            )
            .unwrap();
            r.id
        };

        let repo = FileConditionRepository::open(dir.path().to_path_buf()).unwrap();
        let stored = repo.get(&id).unwrap().unwrap();
        assert_eq!(stored.review.unwrap().outcome, ReviewOutcome::Cleared);
        assert_eq!(repo.find_by_order("ORD-1").unwrap().len(), 1);
        assert_eq!(repo.with_store(|s| s.count()).unwrap(), 1);
    }
}
