//! Capture session state machine
//!
//! `step` is a pure transition function: it never touches the camera, the
//! vision engine or the clock. Side effects are returned as values and
//! carried out by the driver.

use parcel_types::{Deficiency, PhotoAnalysis, PhotoCapture};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the front (marker) shot
    Front,
    /// Waiting for the side shot
    Side,
    /// Both shots taken, analysis in flight
    Analyzing,
    /// Analysis available for review
    Analyzed,
    /// Camera fault; retry or cancel
    Error,
    Cancelled,
    Confirmed,
}

impl CaptureState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Cancelled | CaptureState::Confirmed)
    }

    /// States in which the camera is held
    fn holds_camera(&self) -> bool {
        matches!(
            self,
            CaptureState::Front
                | CaptureState::Side
                | CaptureState::Analyzing
                | CaptureState::Analyzed
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Front => "front",
            CaptureState::Side => "side",
            CaptureState::Analyzing => "analyzing",
            CaptureState::Analyzed => "analyzed",
            CaptureState::Error => "error",
            CaptureState::Cancelled => "cancelled",
            CaptureState::Confirmed => "confirmed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Shutter(PhotoCapture),
    AnalysisCompleted {
        generation: u64,
        analysis: PhotoAnalysis,
    },
    /// Analysis could not produce a result; the camera is still fine
    AnalysisFailed {
        generation: u64,
        reason: String,
    },
    RetakeFront,
    RetakeSide,
    Confirm,
    CameraFailed(String),
    Retry,
    Cancel,
}

impl CaptureEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureEvent::Shutter(_) => "shutter",
            CaptureEvent::AnalysisCompleted { .. } => "analysis completed",
            CaptureEvent::AnalysisFailed { .. } => "analysis failed",
            CaptureEvent::RetakeFront => "retake front",
            CaptureEvent::RetakeSide => "retake side",
            CaptureEvent::Confirm => "confirm",
            CaptureEvent::CameraFailed(_) => "camera failed",
            CaptureEvent::Retry => "retry",
            CaptureEvent::Cancel => "cancel",
        }
    }
}

/// Photos and analysis handed to the caller on confirmation
#[derive(Debug, Clone)]
pub struct CaptureBundle {
    pub front: PhotoCapture,
    pub side: PhotoCapture,
    pub analysis: PhotoAnalysis,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Confirm refused by the quality gate
    QualityGate(Vec<Deficiency>),
    /// Event not accepted in the current state
    NotAllowed {
        state: CaptureState,
        event: &'static str,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::QualityGate(deficiencies) => {
                let reasons: Vec<&str> = deficiencies
                    .iter()
                    .filter(|d| d.is_blocking())
                    .map(|d| d.label())
                    .collect();
                write!(f, "photo quality insufficient: {}", reasons.join(", "))
            }
            Rejection::NotAllowed { state, event } => {
                write!(f, "'{}' is not allowed while {}", event, state)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum CaptureEffect {
    StartAnalysis {
        generation: u64,
        front: PhotoCapture,
        side: PhotoCapture,
    },
    AbortAnalysis {
        generation: u64,
    },
    AcquireCamera,
    ReleaseCamera,
    EmitBundle(CaptureBundle),
    Rejected(Rejection),
}

/// One capture session
#[derive(Debug, Clone)]
pub struct CaptureMachine {
    state: CaptureState,
    front: Option<PhotoCapture>,
    side: Option<PhotoCapture>,
    analysis: Option<PhotoAnalysis>,
    generation: u64,
    camera_error: Option<String>,
    analysis_error: Option<String>,
}

impl CaptureMachine {
    /// New session at the front shot; the camera must be acquired first
    pub fn start() -> (Self, Vec<CaptureEffect>) {
        let machine = Self {
            state: CaptureState::Front,
            front: None,
            side: None,
            analysis: None,
            generation: 0,
            camera_error: None,
            analysis_error: None,
        };
        (machine, vec![CaptureEffect::AcquireCamera])
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn front(&self) -> Option<&PhotoCapture> {
        self.front.as_ref()
    }

    pub fn side(&self) -> Option<&PhotoCapture> {
        self.side.as_ref()
    }

    pub fn analysis(&self) -> Option<&PhotoAnalysis> {
        self.analysis.as_ref()
    }

    /// Generation of the most recently started analysis
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn camera_error(&self) -> Option<&str> {
        self.camera_error.as_deref()
    }

    /// Why the last side shot could not be analyzed
    pub fn analysis_error(&self) -> Option<&str> {
        self.analysis_error.as_deref()
    }

    fn drop_photos(&mut self) {
        self.front = None;
        self.side = None;
        self.analysis = None;
    }
}

fn reject(machine: CaptureMachine, event: &CaptureEvent) -> (CaptureMachine, Vec<CaptureEffect>) {
    let rejection = Rejection::NotAllowed {
        state: machine.state,
        event: event.name(),
    };
    (machine, vec![CaptureEffect::Rejected(rejection)])
}

/// Apply one event
pub fn step(
    mut machine: CaptureMachine,
    event: CaptureEvent,
) -> (CaptureMachine, Vec<CaptureEffect>) {
    use CaptureState as S;

    match (machine.state, event) {
        (S::Front, CaptureEvent::Shutter(photo)) => {
            machine.front = Some(photo);
            machine.state = S::Side;
            (machine, Vec::new())
        }

        (S::Side, CaptureEvent::Shutter(photo)) => {
            let Some(front) = machine.front.clone() else {
                // Side without front cannot happen through step; restart
                machine.state = S::Front;
                return (machine, Vec::new());
            };
            machine.side = Some(photo.clone());
            machine.analysis_error = None;
            machine.generation += 1;
            machine.state = S::Analyzing;
            let effect = CaptureEffect::StartAnalysis {
                generation: machine.generation,
                front,
                side: photo,
            };
            (machine, vec![effect])
        }

        (S::Analyzing, CaptureEvent::AnalysisCompleted { generation, analysis }) => {
            if generation != machine.generation {
                return (machine, Vec::new());
            }
            machine.analysis = Some(analysis);
            machine.state = S::Analyzed;
            (machine, Vec::new())
        }

        // Back to the side shot with the front kept
        (S::Analyzing, CaptureEvent::AnalysisFailed { generation, reason }) => {
            if generation != machine.generation {
                return (machine, Vec::new());
            }
            machine.side = None;
            machine.analysis_error = Some(reason);
            machine.state = S::Side;
            (machine, Vec::new())
        }

        // A late result from an analysis that was already superseded
        (_, CaptureEvent::AnalysisCompleted { .. } | CaptureEvent::AnalysisFailed { .. }) => {
            (machine, Vec::new())
        }

        (S::Analyzed, CaptureEvent::RetakeFront) => {
            machine.drop_photos();
            machine.state = S::Front;
            (machine, Vec::new())
        }

        (S::Analyzed, CaptureEvent::RetakeSide) => {
            machine.side = None;
            machine.analysis = None;
            machine.state = S::Side;
            (machine, Vec::new())
        }

        (S::Analyzed, CaptureEvent::Confirm) => {
            let passed = machine
                .analysis
                .as_ref()
                .is_some_and(|a| a.quality.quality_passed);
            if !passed {
                let deficiencies = machine
                    .analysis
                    .as_ref()
                    .map(|a| a.quality.deficiencies.clone())
                    .unwrap_or_default();
                return (
                    machine,
                    vec![CaptureEffect::Rejected(Rejection::QualityGate(deficiencies))],
                );
            }

            match (
                machine.front.take(),
                machine.side.take(),
                machine.analysis.take(),
            ) {
                (Some(front), Some(side), Some(analysis)) => {
                    machine.state = S::Confirmed;
                    let bundle = CaptureBundle {
                        front,
                        side,
                        analysis,
                    };
                    (
                        machine,
                        vec![CaptureEffect::EmitBundle(bundle), CaptureEffect::ReleaseCamera],
                    )
                }
                (front, side, analysis) => {
                    machine.front = front;
                    machine.side = side;
                    machine.analysis = analysis;
                    reject(machine, &CaptureEvent::Confirm)
                }
            }
        }

        (state, CaptureEvent::CameraFailed(reason)) if state.holds_camera() => {
            let mut effects = Vec::new();
            if state == S::Analyzing {
                effects.push(CaptureEffect::AbortAnalysis {
                    generation: machine.generation,
                });
            }
            effects.push(CaptureEffect::ReleaseCamera);
            machine.drop_photos();
            machine.camera_error = Some(reason);
            machine.state = S::Error;
            (machine, effects)
        }

        (S::Error, CaptureEvent::Retry) => {
            machine.camera_error = None;
            machine.state = S::Front;
            (machine, vec![CaptureEffect::AcquireCamera])
        }

        (state, CaptureEvent::Cancel) if !state.is_terminal() => {
            let mut effects = Vec::new();
            if state == S::Analyzing {
                effects.push(CaptureEffect::AbortAnalysis {
                    generation: machine.generation,
                });
            }
            if state.holds_camera() {
                effects.push(CaptureEffect::ReleaseCamera);
            }
            machine.drop_photos();
            machine.state = S::Cancelled;
            (machine, effects)
        }

        (_, event) => reject(machine, &event),
    }
}
