//! # LatheKit
//!
//! Control core for a touch-panel CNC lathe driven by a GRBL motion
//! controller:
//! - One command in flight at a time, with continuations resumed in order
//! - Multi-pass threading, straight turning and taper turning
//! - Two-phase spindle stop, feed hold, jogging and axis zeroing
//!
//! ## Architecture
//!
//! LatheKit is organized as a workspace with multiple crates:
//!
//! 1. **lathekit-core** - Errors, positions, axes and machine state
//! 2. **lathekit-communication** - Controller interface, command channel, GRBL vocabulary
//! 3. **lathekit-machining** - Spindle sequencer, operation engines, control loop
//! 4. **lathekit-settings** - Startup configuration
//! 5. **lathekit** - Headless binary that integrates all crates

pub use lathekit_communication::{
    command_creator, Command, CommandChannel, ControllerOutcome, Delivery, MotionController,
    Outcome, PositionFeed, RealtimeSignal, SimulatedController, SimulatedHandle,
};

pub use lathekit_core::{
    Axis, Error, GcodeError, LogicError, MachineState, ParameterError, Position,
    Result, SpindleDirection,
};

pub use lathekit_machining::{
    ControlLoop, ControlLoopConfig, HoldToggle, JogStep, OperationKind, SpindleSettings,
    SpindleState, TaperParams, ThreadingParams, TurningParams,
};

pub use lathekit_settings::{Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output
/// - RUST_LOG environment variable support, INFO when unset
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
