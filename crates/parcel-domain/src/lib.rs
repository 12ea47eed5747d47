//! Domain layer: order/staff models, repository traits and pure services

pub mod model;
pub mod repository;
pub mod service;
