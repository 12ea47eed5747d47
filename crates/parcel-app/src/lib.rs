//! Application service layer - capture sessions, event flow, damage and
//! handover use cases, config and telemetry

pub mod capture;
pub mod config;
pub mod damage_service;
pub mod error;
pub mod flow;
pub mod handover_service;
pub mod readiness;
pub mod repository;
pub mod telemetry;

pub use error::FlowError;
