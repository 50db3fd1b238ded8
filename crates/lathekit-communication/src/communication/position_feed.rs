//! Polling adapter from controller steps to work coordinates

use crate::communication::MotionController;
use lathekit_core::Position;

/// Cached tool position, refreshed once per tick
#[derive(Debug, Clone)]
pub struct PositionFeed {
    steps_per_mm: [f64; 3],
    position: Position,
}

impl PositionFeed {
    /// Create a feed converting steps with the given per-axis resolution
    pub fn new(steps_per_mm: [f64; 3]) -> Self {
        Self {
            steps_per_mm,
            position: Position::default(),
        }
    }

    /// Sample the controller and recompute the snapshot
    ///
    /// The position is the raw step count converted to mm, minus the active
    /// origin offset. An axis with a non-positive resolution, or whose
    /// computed value is not finite, keeps its previous value.
    pub fn refresh(&mut self, controller: &dyn MotionController) -> Position {
        let raw = controller.raw_position();
        let offset = controller.current_offset();

        let mut axes = [self.position.x, self.position.y, self.position.z];
        for (i, value) in axes.iter_mut().enumerate() {
            if self.steps_per_mm[i] <= 0.0 {
                continue;
            }
            let computed = raw[i] as f64 / self.steps_per_mm[i] - offset[i];
            if computed.is_finite() {
                *value = computed;
            }
        }

        self.position = Position::new(axes[0], axes[1], axes[2]);
        self.position
    }

    /// Last sampled position
    pub fn position(&self) -> Position {
        self.position
    }
}
