//! Repository trait definitions for external collaborators

use crate::model::OrderSummary;
use parcel_types::Error;
use parcel_types::{
    ComparisonResult, ConditionRecord, DamageAssessment, DimensionMeasurement, ReviewResolution,
    StorageId, UploadUrl,
};

/// Persistent store for condition records
pub trait ConditionRepository: Send + Sync {
    /// Insert a record. Fails with `StoreError::Duplicate` when the order
    /// already has a record for the same event type.
    fn create(&self, record: &ConditionRecord) -> Result<(), Error>;

    /// Attach the dimension measurement to an existing record
    fn attach_measurement(&self, id: &str, measurement: &DimensionMeasurement)
        -> Result<(), Error>;

    /// Attach a human-confirmed damage assessment
    fn confirm_damage(&self, id: &str, assessment: &DamageAssessment) -> Result<(), Error>;

    /// Find the arrival record for an order
    fn get_arrival_condition(&self, order_id: &str) -> Result<Option<ConditionRecord>, Error>;

    /// Find a record by id
    fn get(&self, id: &str) -> Result<Option<ConditionRecord>, Error>;

    /// All records of an order, arrival first
    fn find_by_order(&self, order_id: &str) -> Result<Vec<ConditionRecord>, Error>;

    /// Attach the handover comparison and set the review flag
    fn attach_comparison(
        &self,
        id: &str,
        comparison: &ComparisonResult,
        flagged_for_review: bool,
    ) -> Result<(), Error>;

    /// Record the outcome of a review on a flagged record
    fn resolve_review(&self, id: &str, resolution: &ReviewResolution) -> Result<(), Error>;
}

/// Photo blob storage
pub trait BlobStorage: Send + Sync {
    /// Hand out a one-shot upload target
    fn generate_upload_url(&self) -> Result<UploadUrl, Error>;

    /// Upload raw image bytes to a previously generated target
    fn upload(&self, url: &UploadUrl, bytes: &[u8]) -> Result<StorageId, Error>;

    /// Read back a stored blob
    fn fetch(&self, id: &StorageId) -> Result<Vec<u8>, Error>;
}

/// Read-only order service
pub trait OrderDirectory: Send + Sync {
    fn find_order(&self, order_id: &str) -> Result<Option<OrderSummary>, Error>;
}
