//! Condition event flow
//!
//! Wraps one capture session into the arrival/handover workflow:
//! order info, capture, metadata entry, persistence and analysis, then human
//! damage confirmation. Once a record is persisted the flow only moves
//! forward.

use std::fmt;
use std::sync::Arc;

use parcel_domain::model::{OrderSummary, StaffSession};
use parcel_domain::repository::{BlobStorage, ConditionRepository, OrderDirectory};
use parcel_domain::service::{require_arrival, DamageConfirmation};
use parcel_types::{ConditionRecord, Error, EventType, Result, StorageId, StoreError};
use parcel_vision::{ViewPair, VisionCapability};
use tracing::{info, warn};

use crate::capture::CaptureBundle;
use crate::{damage_service, handover_service};

/// Collaborators shared by every flow of a process
pub struct FlowServices {
    pub conditions: Arc<dyn ConditionRepository>,
    pub blobs: Arc<dyn BlobStorage>,
    pub orders: Arc<dyn OrderDirectory>,
    pub vision: VisionCapability,
    pub change_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Info,
    Camera,
    Metadata,
    Persisting,
    Confirmation,
    Completed,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStep::Info => "order info",
            FlowStep::Camera => "camera",
            FlowStep::Metadata => "metadata",
            FlowStep::Persisting => "persisting",
            FlowStep::Confirmation => "confirmation",
            FlowStep::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// One arrival or handover for one order
pub struct ConditionFlow {
    services: Arc<FlowServices>,
    session: StaffSession,
    event_type: EventType,
    step: FlowStep,
    order_id: Option<String>,
    order: Option<OrderSummary>,
    arrival: Option<ConditionRecord>,
    bundle: Option<CaptureBundle>,
    actual_weight_kg: Option<f64>,
    courier: Option<String>,
    photo_refs: Option<(StorageId, StorageId)>,
    record: Option<ConditionRecord>,
    damage: Option<DamageConfirmation>,
}

impl ConditionFlow {
    pub fn new(services: Arc<FlowServices>, session: StaffSession, event_type: EventType) -> Self {
        Self {
            services,
            session,
            event_type,
            step: FlowStep::Info,
            order_id: None,
            order: None,
            arrival: None,
            bundle: None,
            actual_weight_kg: None,
            courier: None,
            photo_refs: None,
            record: None,
            damage: None,
        }
    }

    pub fn step(&self) -> FlowStep {
        self.step
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn order(&self) -> Option<&OrderSummary> {
        self.order.as_ref()
    }

    /// Arrival record a handover is compared against
    pub fn arrival(&self) -> Option<&ConditionRecord> {
        self.arrival.as_ref()
    }

    /// The persisted record, once there is one
    pub fn record(&self) -> Option<&ConditionRecord> {
        self.record.as_ref()
    }

    pub fn courier(&self) -> Option<&str> {
        self.courier.as_deref()
    }

    fn expect_step(&self, expected: FlowStep, action: &str) -> Result<()> {
        if self.step != expected {
            return Err(Error::InvalidStep(format!(
                "cannot {} at the {} step",
                action, self.step
            )));
        }
        Ok(())
    }

    /// Look up the order. A handover stops here when the order has no
    /// arrival record, and an arrival when it already has one, before
    /// anything is captured or uploaded.
    pub fn begin(&mut self, order_id: &str) -> Result<()> {
        self.expect_step(FlowStep::Info, "start")?;
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(Error::Validation("order id is required".to_string()));
        }

        let order = self.services.orders.find_order(order_id)?;
        if order.is_none() {
            warn!(order_id, "order not in the order directory; continuing without metadata");
        }

        self.check_prior_arrival(order_id)?;
        if self.event_type == EventType::Handover {
            self.courier = order.as_ref().and_then(|o| o.assigned_courier.clone());
        }

        info!(order_id, event = %self.event_type, "condition flow started");
        self.order_id = Some(order_id.to_string());
        self.order = order;
        self.step = FlowStep::Camera;
        Ok(())
    }

    /// An arrival needs the order to have no arrival record yet; a handover
    /// needs one, and keeps it for the comparison.
    fn check_prior_arrival(&mut self, order_id: &str) -> Result<()> {
        match self.event_type {
            EventType::Arrival => {
                if self
                    .services
                    .conditions
                    .get_arrival_condition(order_id)?
                    .is_some()
                {
                    return Err(StoreError::Duplicate {
                        order_id: order_id.to_string(),
                        event: EventType::Arrival,
                    }
                    .into());
                }
            }
            EventType::Handover => {
                let arrival = require_arrival(self.services.conditions.as_ref(), order_id)?;
                self.arrival = Some(arrival);
            }
        }
        Ok(())
    }

    /// Hand over the confirmed capture
    pub fn attach_capture(&mut self, bundle: CaptureBundle) -> Result<()> {
        self.expect_step(FlowStep::Camera, "attach photos")?;
        if !bundle.analysis.quality.quality_passed {
            return Err(Error::Validation(
                "photos did not pass the quality gate".to_string(),
            ));
        }
        self.bundle = Some(bundle);
        self.photo_refs = None;
        self.step = FlowStep::Metadata;
        Ok(())
    }

    /// Weighed mass of the package (arrival only)
    pub fn set_actual_weight(&mut self, weight_kg: f64) -> Result<()> {
        self.expect_step(FlowStep::Metadata, "enter weight")?;
        if self.event_type != EventType::Arrival {
            return Err(Error::InvalidStep(
                "actual weight is only entered on arrival".to_string(),
            ));
        }
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(Error::Validation(format!(
                "actual weight must be a positive number of kg, got {}",
                weight_kg
            )));
        }
        self.actual_weight_kg = Some(weight_kg);
        Ok(())
    }

    /// Courier the package is released to (handover only)
    pub fn set_courier(&mut self, courier: &str) -> Result<()> {
        self.expect_step(FlowStep::Metadata, "enter courier")?;
        if self.event_type != EventType::Handover {
            return Err(Error::InvalidStep(
                "courier is only entered on handover".to_string(),
            ));
        }
        let courier = courier.trim();
        if courier.is_empty() {
            return Err(Error::Validation("courier is required".to_string()));
        }
        self.courier = Some(courier.to_string());
        Ok(())
    }

    /// Step back. Not possible once a record has been persisted.
    pub fn back(&mut self) -> Result<()> {
        if self.record.is_some() {
            return Err(Error::InvalidStep(
                "the condition record is already saved".to_string(),
            ));
        }
        self.step = match self.step {
            FlowStep::Camera => {
                self.order_id = None;
                self.order = None;
                self.arrival = None;
                self.courier = None;
                FlowStep::Info
            }
            FlowStep::Metadata => {
                self.bundle = None;
                self.photo_refs = None;
                FlowStep::Camera
            }
            FlowStep::Persisting => FlowStep::Metadata,
            step => {
                return Err(Error::InvalidStep(format!("cannot go back from {}", step)));
            }
        };
        Ok(())
    }

    /// Upload both photos, create the record and attach the measurement;
    /// for a handover, also compare with the arrival photos.
    ///
    /// A failure leaves the flow at `Persisting` with its photos kept, and
    /// calling `submit` again resumes where it stopped.
    pub async fn submit(&mut self) -> Result<&ConditionRecord> {
        if !matches!(self.step, FlowStep::Metadata | FlowStep::Persisting) {
            return Err(Error::InvalidStep(format!(
                "cannot save at the {} step",
                self.step
            )));
        }
        let order_id = self
            .order_id
            .clone()
            .ok_or_else(|| Error::InvalidStep("no order selected".to_string()))?;
        let bundle = self
            .bundle
            .clone()
            .ok_or_else(|| Error::InvalidStep("no photos captured".to_string()))?;

        match self.event_type {
            EventType::Arrival if self.actual_weight_kg.is_none() => {
                return Err(Error::Validation(
                    "actual weight is required for arrival".to_string(),
                ));
            }
            EventType::Handover if self.courier.is_none() => {
                return Err(Error::Validation(
                    "courier is required for handover".to_string(),
                ));
            }
            _ => {}
        }

        // The order may have changed since `begin`; check again before uploading
        if self.record.is_none() {
            self.check_prior_arrival(&order_id)?;
        }

        self.step = FlowStep::Persisting;

        let (front_ref, side_ref) = match self.photo_refs.clone() {
            Some(refs) => refs,
            None => {
                let refs = self.upload_photos(&bundle).await?;
                self.photo_refs = Some(refs.clone());
                refs
            }
        };

        if self.record.is_none() {
            let mut record = ConditionRecord::new(
                order_id.clone(),
                self.event_type,
                front_ref.0,
                side_ref.0,
                bundle.analysis.clone(),
                self.session.staff_id.clone(),
                self.session.warehouse_id.clone(),
            );
            if let Some(weight) = self.actual_weight_kg {
                record = record.with_actual_weight(weight);
            }
            if let (EventType::Handover, Some(courier)) = (self.event_type, &self.courier) {
                record = record.with_courier(courier.clone());
            }
            self.services.conditions.create(&record)?;
            self.record = Some(record);
        }

        self.attach_measurement(&bundle)?;
        if self.event_type == EventType::Handover {
            self.compare_with_arrival(&bundle).await?;
        }

        let record = self.load_record()?;
        self.damage = Some(damage_service::form_for(&record));
        self.step = FlowStep::Confirmation;
        info!(
            order_id = %order_id,
            event = %self.event_type,
            flagged = record.flagged_for_review,
            "condition record saved"
        );
        Ok(self.record.insert(record))
    }

    /// Damage form for the persisted record
    pub fn damage_form(&mut self) -> Result<&mut DamageConfirmation> {
        self.expect_step(FlowStep::Confirmation, "assess damage")?;
        self.damage
            .as_mut()
            .ok_or_else(|| Error::InvalidStep("no record to assess".to_string()))
    }

    /// Persist the operator's damage assessment and complete the flow.
    /// A rejected form stays editable.
    pub fn confirm_damage(&mut self) -> Result<&ConditionRecord> {
        self.expect_step(FlowStep::Confirmation, "confirm damage")?;
        let record_id = self
            .record
            .as_ref()
            .map(|r| r.id.clone())
            .ok_or_else(|| Error::InvalidStep("no record to assess".to_string()))?;
        let form = self
            .damage
            .clone()
            .ok_or_else(|| Error::InvalidStep("no record to assess".to_string()))?;

        damage_service::confirm(
            self.services.conditions.as_ref(),
            &record_id,
            form,
            &self.session.staff_id,
        )?;

        self.damage = None;
        self.bundle = None;
        self.step = FlowStep::Completed;
        let record = self.load_record()?;
        Ok(self.record.insert(record))
    }

    async fn upload_photos(&self, bundle: &CaptureBundle) -> Result<(StorageId, StorageId)> {
        let front = upload(
            Arc::clone(&self.services.blobs),
            Arc::clone(&bundle.front.bytes),
        );
        let side = upload(
            Arc::clone(&self.services.blobs),
            Arc::clone(&bundle.side.bytes),
        );
        let refs = tokio::try_join!(front, side)?;
        info!(front = %refs.0, side = %refs.1, "photos uploaded");
        Ok(refs)
    }

    fn attach_measurement(&mut self, bundle: &CaptureBundle) -> Result<()> {
        let Some(record) = self.record.as_mut() else {
            return Ok(());
        };
        if record.dimension_measurement.is_some() {
            return Ok(());
        }
        let measurement = &bundle.analysis.measurement;
        self.services
            .conditions
            .attach_measurement(&record.id, measurement)?;
        record.dimension_measurement = Some(measurement.clone());
        Ok(())
    }

    async fn compare_with_arrival(&mut self, bundle: &CaptureBundle) -> Result<()> {
        let (Some(record), Some(arrival)) = (self.record.clone(), self.arrival.clone()) else {
            return Ok(());
        };
        if record.comparison.is_some() {
            return Ok(());
        }

        let services = Arc::clone(&self.services);
        let (front, side) = (Arc::clone(&bundle.front.bytes), Arc::clone(&bundle.side.bytes));
        tokio::task::spawn_blocking(move || {
            handover_service::compare_with_arrival(
                services.conditions.as_ref(),
                services.blobs.as_ref(),
                &services.vision,
                services.change_threshold,
                &record,
                &arrival,
                ViewPair::new(&front, &side),
            )
        })
        .await
        .map_err(|e| Error::VisionUnavailable(format!("comparison task failed: {}", e)))??;
        Ok(())
    }

    /// Current stored state of this flow's record
    fn load_record(&self) -> Result<ConditionRecord> {
        let id = self
            .record
            .as_ref()
            .map(|r| r.id.as_str())
            .ok_or_else(|| Error::InvalidStep("no record saved".to_string()))?;
        self.services
            .conditions
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()).into())
    }
}

/// Upload one photo on the blocking pool
async fn upload(blobs: Arc<dyn BlobStorage>, bytes: Arc<Vec<u8>>) -> Result<StorageId> {
    tokio::task::spawn_blocking(move || {
        let url = blobs.generate_upload_url()?;
        blobs.upload(&url, &bytes)
    })
    .await
    .map_err(|e| Error::Upload(format!("upload task failed: {}", e)))?
}
