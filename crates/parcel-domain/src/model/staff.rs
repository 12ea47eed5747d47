use serde::{Deserialize, Serialize};

/// Identity of the operator running a capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffSession {
    pub staff_id: String,
    pub warehouse_id: String,
}

impl StaffSession {
    pub fn new(staff_id: impl Into<String>, warehouse_id: impl Into<String>) -> Self {
        Self {
            staff_id: staff_id.into(),
            warehouse_id: warehouse_id.into(),
        }
    }
}
