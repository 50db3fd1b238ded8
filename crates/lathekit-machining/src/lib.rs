//! # LatheKit Machining
//!
//! Lathe operations driven over the command channel.
//!
//! ## Operations
//!
//! - **Threading**: Multi-pass threading with depth regression and spring passes
//! - **Turning**: Straight turning with rough, intermediate and finish passes
//! - **Taper**: Cone turning with angle-compensated passes
//!
//! ## Supporting Components
//!
//! - **Spindle**: Run/stop sequencing with a two-phase stop, speed and direction
//! - **Machine Controls**: Feed-hold toggle, jogging, axis zeroing, file select
//! - **Control Loop**: The polling tick that drives everything above

pub mod continuation;
pub mod control_loop;
pub mod machine_control;
pub mod operation;
pub mod spindle;
pub mod taper;
pub mod threading;
pub mod turning;

// Re-export commonly used items
pub use continuation::{Continuation, PanelChannel};
pub use control_loop::{ControlLoop, ControlLoopConfig};
pub use machine_control::{HoldToggle, JogStep, JogWheel};
pub use operation::{
    CutPlan, MachineContext, NextCut, OperationEngine, OperationKind, Outstanding,
    FINISH_TOLERANCE,
};
pub use spindle::{SpindleSequencer, SpindleSettings, SpindleState};
pub use taper::{TaperEngine, TaperParams, TaperStage};
pub use threading::{depth_for_pitch, ThreadingEngine, ThreadingParams, ThreadingStage};
pub use turning::{TurningEngine, TurningParams, TurningStage};
