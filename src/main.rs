//! Headless LatheKit panel
//!
//! Loads the startup configuration (first argument, or the default file),
//! runs the configured turning cycle against the simulated controller and
//! exits once the cut is finished and the spindle has stopped. Ctrl-C
//! aborts the cycle and holds the feed.

use anyhow::Context;
use lathekit::{init_logging, Config, ControlLoop, SimulatedController, SpindleState};
use lathekit::{BUILD_DATE, VERSION};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Polls each simulated line stays busy
const SIMULATED_LINE_POLLS: u32 = 3;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("LatheKit {} (built {})", VERSION, BUILD_DATE);

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config =
        Config::load_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    let controller = SimulatedController::new(config.machine.steps_per_mm);
    let handle = controller.handle();
    handle.borrow_mut().completion_delay = SIMULATED_LINE_POLLS;

    let mut panel = ControlLoop::new(Box::new(controller), config.control_loop_config());
    panel.tick()?;

    if !panel.start_turning(config.turning)? {
        anyhow::bail!("Turning cycle was not admitted");
    }

    let mut interval = interval(Duration::from_millis(config.panel.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                tracing::warn!("Interrupted, aborting {:?}", panel.operation_stage());
                panel.abort_operation();
                panel.press_hold()?;
                break;
            }
        }

        if let Err(e) = panel.tick() {
            if e.is_logic_fault() {
                tracing::error!("Control loop stopped: {}", e);
                return Err(e.into());
            }
            tracing::warn!("{}", e);
        }

        if panel.active_operation().is_none() {
            match panel.spindle_state() {
                SpindleState::Stopped => break,
                SpindleState::Running => {
                    panel.stop_spindle()?;
                }
                _ => {}
            }
        }
    }

    tracing::info!(
        "Finished at {} after {} lines",
        panel.position(),
        handle.borrow().lines.len()
    );
    Ok(())
}
