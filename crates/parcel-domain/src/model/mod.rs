//! Domain model types

pub mod order;
pub mod staff;

pub use order::OrderSummary;
pub use staff::StaffSession;
