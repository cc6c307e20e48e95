// src/config.rs
//! Sandbox configuration.
//!
//! Every section has working defaults, so an empty JSON object (or no file at
//! all) gives the stock sandbox: gravity -9.82, SAP broadphase, friction 0.1,
//! restitution 0.7, 1/60 s steps with at most 3 catch-up substeps.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::broadphase::BroadphaseKind;
use crate::material::ContactRule;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    pub enabled: bool,
    /// Bodies slower than this (linear and angular) start getting sleepy.
    pub speed_limit: f32,
    /// Seconds a body must stay sleepy before it falls asleep.
    pub time_limit: f32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self { enabled: true, speed_limit: 0.1, time_limit: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: Vec3,
    pub broadphase: BroadphaseKind,
    pub solver_iterations: u32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub sleep: SleepConfig,
    /// Rule used for material pairs without an explicit entry.
    pub default_contact: ContactRule,
    /// Approach speeds below this are treated as resting contact (no bounce).
    pub restitution_threshold: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.82, 0.0),
            broadphase: BroadphaseKind::default(),
            solver_iterations: 10,
            linear_damping: 0.01,
            angular_damping: 0.01,
            sleep: SleepConfig::default(),
            default_contact: ContactRule::default(),
            restitution_threshold: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub fixed_dt: f32,
    pub max_substeps: u32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self { fixed_dt: 1.0 / 60.0, max_substeps: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Where new bodies are built before being moved to their target.
    pub drop_point: Vec3,
    pub mass: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self { drop_point: Vec3::new(0.0, 3.0, 0.0), mass: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitSoundConfig {
    /// Impacts at or below this speed stay silent.
    pub min_impact_speed: f32,
    pub volume_divisor: f32,
    /// Minimum seconds between two plays. 0 disables the cooldown.
    pub cooldown: f32,
    /// Playback voices. 1 keeps the single shared voice.
    pub voices: usize,
}

impl Default for HitSoundConfig {
    fn default() -> Self {
        Self { min_impact_speed: 2.0, volume_divisor: 10.0, cooldown: 0.0, voices: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPairConfig {
    pub a: String,
    pub b: String,
    pub friction: f32,
    pub restitution: f32,
}

/// Extra named materials and explicit contact rules between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialsConfig {
    pub names: Vec<String>,
    pub rules: Vec<MaterialPairConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorConfig {
    /// Edge length of the floor render proxy. The collision plane is infinite.
    pub size: f32,
    /// Surface material of the floor, `default` when unset.
    pub material: Option<String>,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self { size: 10.0, material: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub world: WorldConfig,
    pub step: StepConfig,
    pub spawn: SpawnConfig,
    pub hit_sound: HitSoundConfig,
    pub materials: MaterialsConfig,
    pub floor: FloorConfig,
}

fn positive(what: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{what} must be positive, got {value}")))
    }
}

fn non_negative(what: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{what} must be >= 0, got {value}")))
    }
}

impl SandboxConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::from(e).context(format!("reading {}", path.display())))?;
        Self::from_json_str(&text).map_err(|e| e.context(format!("loading {}", path.display())))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let world = &self.world;
        if !world.gravity.is_finite() {
            return Err(Error::config("gravity must be finite"));
        }
        if let BroadphaseKind::Grid { cell_size } = world.broadphase {
            positive("grid cell_size", cell_size)?;
        }
        if let BroadphaseKind::Sap { axis: Some(axis) } = world.broadphase {
            if axis > 2 {
                return Err(Error::config(format!("sap axis must be 0, 1 or 2, got {axis}")));
            }
        }
        if world.solver_iterations == 0 {
            return Err(Error::config("solver_iterations must be at least 1"));
        }
        non_negative("linear_damping", world.linear_damping)?;
        non_negative("angular_damping", world.angular_damping)?;
        if world.linear_damping > 1.0 || world.angular_damping > 1.0 {
            return Err(Error::config("damping must be within [0, 1]"));
        }
        non_negative("sleep speed_limit", world.sleep.speed_limit)?;
        non_negative("sleep time_limit", world.sleep.time_limit)?;
        non_negative("restitution_threshold", world.restitution_threshold)?;
        world.default_contact.validate()?;

        positive("fixed_dt", self.step.fixed_dt)?;
        if self.step.max_substeps == 0 {
            return Err(Error::config("max_substeps must be at least 1"));
        }

        if !self.spawn.drop_point.is_finite() {
            return Err(Error::config("drop_point must be finite"));
        }
        positive("spawn mass", self.spawn.mass)?;

        non_negative("min_impact_speed", self.hit_sound.min_impact_speed)?;
        positive("volume_divisor", self.hit_sound.volume_divisor)?;
        non_negative("cooldown", self.hit_sound.cooldown)?;
        if self.hit_sound.voices == 0 {
            return Err(Error::config("voices must be at least 1"));
        }

        for rule in &self.materials.rules {
            ContactRule::new(rule.friction, rule.restitution)
                .validate()
                .map_err(|e| e.context(format!("rule {} / {}", rule.a, rule.b)))?;
        }
        positive("floor size", self.floor.size)?;
        Ok(())
    }
}
