// src/controls.rs
//! The three commands a control panel can issue, and a generator that fills
//! them with random parameters the way the sandbox's buttons do.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SpawnSphere { radius: f32, position: Vec3 },
    SpawnBox { width: f32, height: f32, depth: f32, position: Vec3 },
    Reset,
}

/// Random spawn parameters: spheres up to 0.5 radius, boxes up to 1 per side,
/// dropped from `drop_height` within ±`half_spread` of the origin.
#[derive(Debug, Clone)]
pub struct ControlSurface<R: Rng = StdRng> {
    rng: R,
    drop_height: f32,
    half_spread: f32,
}

impl ControlSurface<StdRng> {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ControlSurface<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng, drop_height: 3.0, half_spread: 1.5 }
    }

    pub fn with_drop_height(mut self, height: f32) -> Self {
        self.drop_height = height;
        self
    }

    fn drop_position(&mut self) -> Vec3 {
        Vec3::new(
            (self.rng.gen::<f32>() - 0.5) * 2.0 * self.half_spread,
            self.drop_height,
            (self.rng.gen::<f32>() - 0.5) * 2.0 * self.half_spread,
        )
    }

    /// Uniform in (0, max]; never zero.
    fn extent(&mut self, max: f32) -> f32 {
        max - self.rng.gen_range(0.0..max)
    }

    pub fn random_sphere(&mut self) -> Command {
        let radius = self.extent(0.5);
        Command::SpawnSphere { radius, position: self.drop_position() }
    }

    pub fn random_box(&mut self) -> Command {
        let (width, height, depth) = (self.extent(1.0), self.extent(1.0), self.extent(1.0));
        Command::SpawnBox { width, height, depth, position: self.drop_position() }
    }

    /// Sphere or box with equal odds.
    pub fn random_spawn(&mut self) -> Command {
        if self.rng.gen_bool(0.5) {
            self.random_sphere()
        } else {
            self.random_box()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_parameters_stay_in_range() {
        let mut controls = ControlSurface::seeded(42);
        for _ in 0..500 {
            match controls.random_spawn() {
                Command::SpawnSphere { radius, position } => {
                    assert!(radius > 0.0 && radius <= 0.5, "radius {radius}");
                    assert_eq!(position.y, 3.0);
                    assert!(position.x.abs() <= 1.5 && position.z.abs() <= 1.5);
                }
                Command::SpawnBox { width, height, depth, position } => {
                    for side in [width, height, depth] {
                        assert!(side > 0.0 && side <= 1.0, "side {side}");
                    }
                    assert!(position.x.abs() <= 1.5 && position.z.abs() <= 1.5);
                }
                Command::Reset => unreachable!(),
            }
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = ControlSurface::seeded(9);
        let mut b = ControlSurface::seeded(9);
        for _ in 0..10 {
            assert_eq!(a.random_spawn(), b.random_spawn());
        }
    }

    #[test]
    fn test_command_json() {
        let json = serde_json::to_string(&Command::Reset).unwrap();
        assert_eq!(json, r#"{"command":"reset"}"#);
        let parsed: Command =
            serde_json::from_str(r#"{"command":"spawn_sphere","radius":0.2,"position":[0.0,3.0,0.0]}"#).unwrap();
        assert_eq!(parsed, Command::SpawnSphere { radius: 0.2, position: Vec3::new(0.0, 3.0, 0.0) });
    }
}
