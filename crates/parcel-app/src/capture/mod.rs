//! Guided dual-photo capture: pure state machine plus its effect executor

pub mod analysis;
pub mod driver;
pub mod file_camera;
pub mod machine;

pub use analysis::{PhotoAnalyzer, VisionAnalyzer};
pub use driver::{Camera, CameraLease, CaptureDriver};
pub use file_camera::FileCamera;
pub use machine::{
    step, CaptureBundle, CaptureEffect, CaptureEvent, CaptureMachine, CaptureState, Rejection,
};
