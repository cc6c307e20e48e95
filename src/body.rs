// src/body.rs
//! Rigid body state owned by the physics world.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::arena::Index;
use crate::material::MaterialId;
use crate::shape::{Aabb, BodyShape};
use crate::Result;

/// Handle to a body inside a [`crate::physics::PhysicsWorld`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub(crate) Index);

impl BodyHandle {
    #[inline(always)]
    pub fn slot(self) -> usize {
        self.0.slot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepState {
    Awake,
    /// Below the speed limit, waiting out the time limit.
    Sleepy,
    Sleeping,
}

/// How the solver and broadphase see a body this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Static,
    Sleeping,
    Awake,
}

#[derive(Debug, Clone)]
pub struct RigidBody {
    mass: f32,
    inv_mass: f32,
    inv_inertia_local: Vec3,
    shape: BodyShape,
    pub(crate) position: Vec3,
    pub(crate) orientation: Quat,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    pub(crate) force: Vec3,
    pub(crate) torque: Vec3,
    material: MaterialId,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub(crate) sleep_state: SleepState,
    pub(crate) sleepy_since: f64,
}

impl RigidBody {
    /// `mass == 0` makes the body static (infinite mass).
    pub fn new(mass: f32, shape: BodyShape, material: MaterialId) -> Result<Self> {
        shape.validate()?;
        if !(mass.is_finite() && mass >= 0.0) {
            return Err(crate::Error::InvalidDimension { what: "mass", value: mass });
        }
        let (inv_mass, inv_inertia_local) = if mass > 0.0 && shape.is_bounded() {
            let inertia = shape.principal_inertia(mass);
            (1.0 / mass, Vec3::ONE / inertia)
        } else {
            (0.0, Vec3::ZERO)
        };
        Ok(Self {
            mass: if inv_mass > 0.0 { mass } else { 0.0 },
            inv_mass,
            inv_inertia_local,
            shape,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            material,
            linear_damping: 0.01,
            angular_damping: 0.01,
            allow_sleep: true,
            sleep_state: SleepState::Awake,
            sleepy_since: 0.0,
        })
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation.normalize();
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    #[inline] pub fn mass(&self) -> f32 { self.mass }
    #[inline] pub fn inv_mass(&self) -> f32 { self.inv_mass }
    #[inline] pub fn shape(&self) -> &BodyShape { &self.shape }
    #[inline] pub fn material(&self) -> MaterialId { self.material }
    #[inline] pub fn position(&self) -> Vec3 { self.position }
    #[inline] pub fn orientation(&self) -> Quat { self.orientation }
    #[inline] pub fn linear_velocity(&self) -> Vec3 { self.linear_velocity }
    #[inline] pub fn angular_velocity(&self) -> Vec3 { self.angular_velocity }
    #[inline] pub fn sleep_state(&self) -> SleepState { self.sleep_state }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    #[inline]
    pub fn motion(&self) -> Motion {
        if self.is_static() {
            Motion::Static
        } else if self.is_sleeping() {
            Motion::Sleeping
        } else {
            Motion::Awake
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
    }

    pub fn set_material(&mut self, material: MaterialId) {
        self.material = material;
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.linear_velocity = velocity;
        self.wake_up();
    }

    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular_velocity = velocity;
        self.wake_up();
    }

    /// Force through the center of mass, accumulated until the next step.
    pub fn apply_force(&mut self, force: Vec3) {
        self.apply_force_at(force, self.position);
    }

    /// Force at a world-space point; off-center forces also produce torque.
    pub fn apply_force_at(&mut self, force: Vec3, world_point: Vec3) {
        if self.is_static() {
            return;
        }
        self.force += force;
        self.torque += (world_point - self.position).cross(force);
        self.wake_up();
    }

    /// Force given in body space, applied at a body-space point.
    pub fn apply_local_force(&mut self, local_force: Vec3, local_point: Vec3) {
        let force = self.orientation * local_force;
        let point = self.position + self.orientation * local_point;
        self.apply_force_at(force, point);
    }

    /// Instant velocity change at a world-space point.
    pub fn apply_impulse(&mut self, impulse: Vec3, world_point: Vec3) {
        if self.is_static() {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        let r = world_point - self.position;
        self.angular_velocity += self.inv_inertia_world() * r.cross(impulse);
        self.wake_up();
    }

    pub fn wake_up(&mut self) {
        if self.sleep_state != SleepState::Awake {
            log::trace!("body woke up at {:?}", self.position);
        }
        self.sleep_state = SleepState::Awake;
    }

    /// Forces the body asleep and zeroes its motion.
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    /// World inverse inertia tensor `R * I⁻¹ * Rᵀ`.
    pub fn inv_inertia_world(&self) -> Mat3 {
        if self.is_static() {
            return Mat3::ZERO;
        }
        let rot = Mat3::from_quat(self.orientation);
        rot * Mat3::from_diagonal(self.inv_inertia_local) * rot.transpose()
    }

    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.shape.aabb(self.position, self.orientation)
    }

    /// `|v|² + |ω|²`, the quantity the sleep limit is compared against.
    #[inline]
    pub fn speed_squared(&self) -> f32 {
        self.linear_velocity.length_squared() + self.angular_velocity.length_squared()
    }

    /// Velocity of the material point at `world_point`.
    #[inline]
    pub fn velocity_at(&self, world_point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(world_point - self.position)
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }
}
