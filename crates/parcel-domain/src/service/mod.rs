//! Domain services

pub mod damage;
pub mod dim_weight;
pub mod handover;
pub mod quality_gate;

pub use damage::DamageConfirmation;
pub use dim_weight::dimensional_weight_kg;
pub use handover::{require_arrival, resolution_for};
