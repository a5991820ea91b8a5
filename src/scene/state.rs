//! Per-demo animation and selection state

use std::time::{Duration, Instant};

use glam::Mat4;

/// How the rotation advances each tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AnimationMode {
    /// Fixed step per idle tick; speed follows the tick rate
    #[default]
    PerTick,
    /// Wall-clock driven
    Elapsed { degrees_per_second: f64 },
}

/// Rotation angle plus the selected post effect
#[derive(Debug, Clone)]
pub struct SceneState {
    rotation_degrees: f64,
    step_degrees: f64,
    ticks: u64,
    post_effect: usize,
    mode: AnimationMode,
    last_tick: Option<Instant>,
}

impl SceneState {
    pub fn new(step_degrees: f64, mode: AnimationMode) -> Self {
        Self {
            rotation_degrees: 0.0,
            step_degrees,
            ticks: 0,
            post_effect: 0,
            mode,
            last_tick: None,
        }
    }

    /// Advance by one idle tick
    pub fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.duration_since(last));
        self.last_tick = Some(now);
        self.advance(elapsed);
    }

    /// Advance by one tick that took `elapsed`
    pub fn advance(&mut self, elapsed: Duration) {
        self.ticks += 1;
        self.rotation_degrees = match self.mode {
            // Derived from the tick count so it doesn't drift
            AnimationMode::PerTick => (self.ticks as f64 * self.step_degrees).rem_euclid(360.0),
            AnimationMode::Elapsed { degrees_per_second } => (self.rotation_degrees
                + degrees_per_second * elapsed.as_secs_f64())
            .rem_euclid(360.0),
        };
    }

    /// Rotation in degrees, in `[0, 360)`
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    pub fn rotation_radians(&self) -> f32 {
        self.rotation_degrees.to_radians() as f32
    }

    /// World rotation about Y applied to spinning draws
    pub fn rotation_matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.rotation_radians())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    pub fn post_effect(&self) -> usize {
        self.post_effect
    }

    /// Select post effect `index` if fewer than `available` exist.
    /// Returns whether the selection was applied.
    pub fn select_post_effect(&mut self, index: usize, available: usize) -> bool {
        if index < available {
            self.post_effect = index;
            true
        } else {
            false
        }
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new(0.4, AnimationMode::PerTick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_tick_rotation_wraps() {
        let mut scene = SceneState::default();
        assert_eq!(scene.mode(), AnimationMode::PerTick);
        for _ in 0..450 {
            scene.advance(Duration::from_millis(1));
        }
        assert!((scene.rotation_degrees() - 180.0).abs() < 1e-9);

        for _ in 0..450 {
            scene.advance(Duration::ZERO);
        }
        assert!(scene.rotation_degrees() < 1e-9 || scene.rotation_degrees() > 360.0 - 1e-9);
        assert!(scene.rotation_degrees() < 360.0);
        assert_eq!(scene.ticks(), 900);
    }

    #[test]
    fn elapsed_rotation_follows_time() {
        let mut scene = SceneState::new(
            0.4,
            AnimationMode::Elapsed {
                degrees_per_second: 90.0,
            },
        );
        scene.advance(Duration::from_secs(5));
        assert!((scene.rotation_degrees() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn post_effect_selection_is_bounded() {
        let mut scene = SceneState::default();
        assert!(scene.select_post_effect(2, 3));
        assert_eq!(scene.post_effect(), 2);
        assert!(!scene.select_post_effect(1, 0));
        assert_eq!(scene.post_effect(), 2);
    }
}
