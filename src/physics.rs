// src/physics.rs
//! The physics world: bodies, gravity, broadphase strategy, materials, and
//! the fixed-timestep stepping with bounded catch-up.

use std::collections::{HashMap, HashSet};
use std::f32::consts::FRAC_PI_2;

use crossbeam::channel::{unbounded, Receiver, Sender};
use glam::{Quat, Vec3};

use crate::arena::Arena;
use crate::body::{BodyHandle, Motion, RigidBody, SleepState};
use crate::broadphase::{Broadphase, BroadphaseKind, BroadphaseProxy};
use crate::config::{SleepConfig, WorldConfig};
use crate::events::{CollisionEvent, ListenerHandle, ListenerSet};
use crate::material::{MaterialId, MaterialRegistry};
use crate::narrowphase::{self, Manifold};
use crate::shape::BodyShape;
use crate::solver::{self, SolverBody, SolverContact, SolverParams};
use crate::time::plan_substeps;
use crate::Result;

/// What one call to [`PhysicsWorld::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    pub substeps: u32,
    /// Elapsed seconds dropped because of the substep cap.
    pub discarded: f64,
    /// Collision events raised across all substeps.
    pub events: usize,
}

#[inline(always)]
fn pair_key(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Orientation that turns the plane's local +Z normal into world +Y.
#[inline]
pub fn floor_orientation() -> Quat {
    Quat::from_axis_angle(Vec3::new(-1.0, 0.0, 0.0), FRAC_PI_2)
}

pub struct PhysicsWorld {
    gravity: Vec3,
    bodies: Arena<RigidBody>,
    floor: Option<BodyHandle>,
    broadphase: Box<dyn Broadphase>,
    materials: MaterialRegistry,
    sleep: SleepConfig,
    solver: SolverParams,
    listeners: ListenerSet,
    /// Pairs touching at the end of the previous internal step.
    touching: HashSet<(BodyHandle, BodyHandle)>,
    time: f64,
    steps: u64,

    // Event handling
    collision_events: (Sender<CollisionEvent>, Receiver<CollisionEvent>),

    // Scratch, reused every step
    handles: Vec<BodyHandle>,
    proxies: Vec<BroadphaseProxy>,
    pairs: Vec<(usize, usize)>,
}

impl PhysicsWorld {
    pub fn new(config: &WorldConfig) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            gravity: config.gravity,
            bodies: Arena::new(),
            floor: None,
            broadphase: config.broadphase.build(),
            materials: MaterialRegistry::new(config.default_contact),
            sleep: config.sleep,
            solver: SolverParams {
                iterations: config.solver_iterations.max(1),
                restitution_threshold: config.restitution_threshold,
                ..SolverParams::default()
            },
            listeners: ListenerSet::new(),
            touching: HashSet::new(),
            time: 0.0,
            steps: 0,
            collision_events: (sender, receiver),
            handles: Vec::new(),
            proxies: Vec::new(),
            pairs: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    #[inline] pub fn gravity(&self) -> Vec3 { self.gravity }
    #[inline] pub fn set_gravity(&mut self, gravity: Vec3) { self.gravity = gravity; }
    #[inline] pub fn time(&self) -> f64 { self.time }
    #[inline] pub fn steps_taken(&self) -> u64 { self.steps }
    #[inline] pub fn sleep_config(&self) -> SleepConfig { self.sleep }
    #[inline] pub fn materials(&self) -> &MaterialRegistry { &self.materials }
    #[inline] pub fn materials_mut(&mut self) -> &mut MaterialRegistry { &mut self.materials }

    pub fn broadphase_name(&self) -> &'static str {
        self.broadphase.name()
    }

    /// Swaps the pair-selection strategy. Takes effect on the next step.
    pub fn set_broadphase(&mut self, kind: BroadphaseKind) {
        self.broadphase = kind.build();
        log::debug!("broadphase set to {}", self.broadphase.name());
    }

    pub fn set_sleep_config(&mut self, sleep: SleepConfig) {
        self.sleep = sleep;
        if !sleep.enabled {
            for (_, body) in self.bodies.iter_mut() {
                body.wake_up();
            }
        }
    }

    // -------------------------------------------------------------------------
    // Body Management
    // -------------------------------------------------------------------------

    pub fn add_body(&mut self, body: RigidBody) -> BodyHandle {
        let handle = BodyHandle(self.bodies.insert(body));
        log::debug!("added body {:?} ({} total)", handle, self.bodies.len());
        handle
    }

    /// Removes the body and its listeners. Absent handles are a no-op.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        if self.bodies.remove(handle.0).is_none() {
            return false;
        }
        self.listeners.remove_body(handle);
        self.touching.retain(|&(a, b)| a != handle && b != handle);
        if self.floor == Some(handle) {
            self.floor = None;
        }
        log::debug!("removed body {:?} ({} left)", handle, self.bodies.len());
        true
    }

    /// Creates the static floor plane once; later calls return the same body.
    pub fn create_floor(&mut self, material: MaterialId) -> Result<BodyHandle> {
        if let Some(floor) = self.floor {
            return Ok(floor);
        }
        let body = RigidBody::new(0.0, BodyShape::Plane, material)?.with_orientation(floor_orientation());
        let handle = self.add_body(body);
        self.floor = Some(handle);
        Ok(handle)
    }

    #[inline] pub fn floor(&self) -> Option<BodyHandle> { self.floor }
    #[inline] pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> { self.bodies.get(handle.0) }
    #[inline] pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> { self.bodies.get_mut(handle.0) }
    #[inline] pub fn contains(&self, handle: BodyHandle) -> bool { self.bodies.contains(handle.0) }
    #[inline] pub fn body_count(&self) -> usize { self.bodies.len() }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.bodies.iter().map(|(index, body)| (BodyHandle(index), body))
    }

    /// Applies a force at the center of mass. Returns false for unknown handles.
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec3) -> bool {
        self.with_body(handle, |body| body.apply_force(force))
    }

    /// Applies a body-space force at a body-space point.
    pub fn apply_local_force(&mut self, handle: BodyHandle, local_force: Vec3, local_point: Vec3) -> bool {
        self.with_body(handle, |body| body.apply_local_force(local_force, local_point))
    }

    /// Instant velocity change at a world-space point.
    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3, world_point: Vec3) -> bool {
        self.with_body(handle, |body| body.apply_impulse(impulse, world_point))
    }

    fn with_body(&mut self, handle: BodyHandle, f: impl FnOnce(&mut RigidBody)) -> bool {
        match self.bodies.get_mut(handle.0) {
            Some(body) => {
                f(body);
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Listeners & Events
    // -------------------------------------------------------------------------

    /// Subscribes to collisions of `body`. `None` if the body is not in the world.
    pub fn subscribe(&mut self, body: BodyHandle) -> Option<ListenerHandle> {
        if !self.contains(body) {
            return None;
        }
        Some(self.listeners.subscribe(body))
    }

    /// Returns false if the handle was already unsubscribed.
    pub fn unsubscribe(&mut self, listener: ListenerHandle) -> bool {
        self.listeners.unsubscribe(listener)
    }

    #[inline]
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Drains collision events from the channel. Non-blocking.
    pub fn drain_events(&self) -> Vec<CollisionEvent> {
        self.collision_events.1.try_iter().collect()
    }

    // -------------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------------

    /// Advances by `ceil(elapsed / fixed_dt)` internal steps of `fixed_dt`,
    /// at most `max_substeps`. Time beyond the cap is discarded.
    pub fn step(&mut self, fixed_dt: f32, elapsed: f64, max_substeps: u32) -> StepReport {
        let plan = plan_substeps(fixed_dt as f64, elapsed, max_substeps);
        if plan.discarded > 1.0 {
            log::warn!("simulation fell behind, dropping {:.3}s", plan.discarded);
        } else if plan.discarded > 0.0 {
            log::debug!("dropping {:.4}s of catch-up time", plan.discarded);
        }

        let mut events = 0;
        for _ in 0..plan.substeps {
            events += self.internal_step(fixed_dt);
        }
        StepReport { substeps: plan.substeps, discarded: plan.discarded, events }
    }

    /// One fixed-size integration. Returns the number of events raised.
    fn internal_step(&mut self, dt: f32) -> usize {
        self.handles.clear();
        self.proxies.clear();
        for (index, body) in self.bodies.iter() {
            self.handles.push(BodyHandle(index));
            self.proxies.push(BroadphaseProxy { aabb: body.aabb(), motion: body.motion() });
        }

        // Broadphase
        self.broadphase.collect_pairs(&self.proxies, &mut self.pairs);

        // Narrowphase, new-contact detection, wake-ups
        let mut manifold = Manifold::new();
        let mut contacts: Vec<SolverContact> = Vec::new();
        let mut touching = HashSet::with_capacity(self.touching.len());
        let mut fresh: HashMap<(BodyHandle, BodyHandle), (f32, CollisionEvent)> = HashMap::new();
        let mut wake: Vec<BodyHandle> = Vec::new();
        let wake_speed_sq = 2.0 * self.sleep.speed_limit * self.sleep.speed_limit;

        for &(i, j) in &self.pairs {
            let (ha, hb) = (self.handles[i], self.handles[j]);
            let (Some(a), Some(b)) = (self.bodies.get(ha.0), self.bodies.get(hb.0)) else {
                continue;
            };
            narrowphase::collide(a, b, &mut manifold);
            if manifold.is_empty() {
                continue;
            }

            let key = pair_key(ha, hb);
            touching.insert(key);
            let rule = self.materials.resolve(a.material(), b.material());
            let is_new = !self.touching.contains(&key);

            for contact in &manifold {
                let relative_velocity = b.velocity_at(contact.point) - a.velocity_at(contact.point);
                let approach_speed = relative_velocity.dot(contact.normal);
                contacts.push(SolverContact { a: i, b: j, contact: *contact, rule, approach_speed });

                if is_new {
                    let event = CollisionEvent {
                        body_a: ha,
                        body_b: hb,
                        contact_normal: contact.normal,
                        contact_point: contact.point,
                        relative_velocity,
                    };
                    let entry = fresh.entry(key).or_insert((approach_speed, event));
                    if approach_speed < entry.0 {
                        *entry = (approach_speed, event);
                    }
                }
            }

            // A fast awake body knocks a sleeping one awake.
            if a.is_sleeping() && b.motion() == Motion::Awake && b.speed_squared() >= wake_speed_sq {
                wake.push(ha);
            }
            if b.is_sleeping() && a.motion() == Motion::Awake && a.speed_squared() >= wake_speed_sq {
                wake.push(hb);
            }
        }

        // Resting pairs nobody tested this step are still touching.
        for &(a, b) in &self.touching {
            let untested = |h: BodyHandle| {
                self.bodies.get(h.0).is_some_and(|body| body.motion() != Motion::Awake)
            };
            if untested(a) && untested(b) {
                touching.insert((a, b));
            }
        }

        for handle in wake {
            if let Some(body) = self.bodies.get_mut(handle.0) {
                body.wake_up();
            }
        }

        // Forces and gravity
        let gravity = self.gravity;
        for (_, body) in self.bodies.iter_mut() {
            if body.motion() != Motion::Awake {
                continue;
            }
            let linear = (gravity + body.force * body.inv_mass()) * dt;
            let angular = body.inv_inertia_world() * body.torque * dt;
            body.linear_velocity += linear;
            body.angular_velocity += angular;
        }

        // Contact response
        if !contacts.is_empty() {
            let mut solver_bodies: Vec<SolverBody> = self
                .handles
                .iter()
                .map(|&h| match self.bodies.get(h.0) {
                    Some(body) if body.motion() == Motion::Awake => SolverBody {
                        position: body.position(),
                        linear_velocity: body.linear_velocity(),
                        angular_velocity: body.angular_velocity(),
                        inv_mass: body.inv_mass(),
                        inv_inertia: body.inv_inertia_world(),
                    },
                    Some(body) => SolverBody { position: body.position(), ..SolverBody::FIXED },
                    None => SolverBody::FIXED,
                })
                .collect();
            solver::solve(&mut solver_bodies, &contacts, &self.solver, dt);

            for (solved, &h) in solver_bodies.iter().zip(&self.handles) {
                if let Some(body) = self.bodies.get_mut(h.0) {
                    if body.motion() == Motion::Awake {
                        body.linear_velocity = solved.linear_velocity;
                        body.angular_velocity = solved.angular_velocity;
                    }
                }
            }
        }

        // Damping and position integration
        for (_, body) in self.bodies.iter_mut() {
            if body.motion() == Motion::Awake {
                let linear_factor = (1.0 - body.linear_damping).powf(dt);
                let angular_factor = (1.0 - body.angular_damping).powf(dt);
                body.linear_velocity *= linear_factor;
                body.angular_velocity *= angular_factor;
                body.position += body.linear_velocity * dt;
                let w = body.angular_velocity;
                let spin = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * body.orientation;
                body.orientation = (body.orientation + spin * (0.5 * dt)).normalize();
            }
            body.clear_forces();
        }

        self.time += dt as f64;
        self.steps += 1;
        self.update_sleep();

        // Events
        self.touching = touching;
        let raised = fresh.len();
        let mut fresh: Vec<_> = fresh.into_iter().collect();
        fresh.sort_unstable_by_key(|(key, _)| *key);
        for (_, (_, event)) in fresh {
            if self.collision_events.0.send(event).is_err() {
                log::warn!("collision event channel closed");
            }
        }
        raised
    }

    fn update_sleep(&mut self) {
        if !self.sleep.enabled {
            return;
        }
        let limit_sq = self.sleep.speed_limit * self.sleep.speed_limit;
        let now = self.time;
        let time_limit = self.sleep.time_limit as f64;
        for (index, body) in self.bodies.iter_mut() {
            if !body.allow_sleep || body.motion() == Motion::Static {
                continue;
            }
            let speed_sq = body.speed_squared();
            match body.sleep_state {
                SleepState::Awake if speed_sq < limit_sq => {
                    body.sleep_state = SleepState::Sleepy;
                    body.sleepy_since = now;
                }
                SleepState::Sleepy if speed_sq > limit_sq => {
                    body.sleep_state = SleepState::Awake;
                }
                SleepState::Sleepy if now - body.sleepy_since > time_limit => {
                    body.sleep();
                    log::trace!("body {:?} fell asleep at {:?}", index, body.position());
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(&WorldConfig::default());
        let material = world.materials().default_material();
        world.create_floor(material).unwrap();
        world
    }

    fn sphere(world: &PhysicsWorld, radius: f32, position: Vec3) -> RigidBody {
        RigidBody::new(1.0, BodyShape::sphere(radius).unwrap(), world.materials().default_material())
            .unwrap()
            .with_position(position)
    }

    fn run(world: &mut PhysicsWorld, seconds: f32) {
        for _ in 0..(seconds / DT).round() as usize {
            world.step(DT, DT as f64, 3);
        }
    }

    #[test]
    fn test_step_caps_substeps_and_discards() {
        let mut world = world();
        let body = sphere(&world, 0.5, Vec3::new(0.0, 3.0, 0.0));
        let ball = world.add_body(body);
        let report = world.step(DT, 10.0, 3);
        assert_eq!(report.substeps, 3);
        assert_eq!(world.steps_taken(), 3);
        assert!(report.discarded > 9.9);

        // Three steps of free fall, not six hundred.
        let y = world.body(ball).unwrap().position().y;
        assert!(y > 2.9, "fell to {y}");
    }

    #[test]
    fn test_floor_is_created_once() {
        let mut world = world();
        let floor = world.floor().unwrap();
        let material = world.materials().default_material();
        assert_eq!(world.create_floor(material).unwrap(), floor);
        assert_eq!(world.body_count(), 1);
        assert!(world.body(floor).unwrap().is_static());
    }

    #[test]
    fn test_remove_absent_body_is_noop() {
        let mut world = world();
        let body = sphere(&world, 0.5, Vec3::new(0.0, 3.0, 0.0));
        let handle = world.add_body(body);
        let listener = world.subscribe(handle).unwrap();
        assert!(world.remove_body(handle));
        assert!(!world.remove_body(handle));
        assert!(!world.unsubscribe(listener));
        assert!(world.subscribe(handle).is_none());
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_dropped_sphere_bounces_then_sleeps() {
        let mut world = world();
        let body = sphere(&world, 0.5, Vec3::new(0.0, 3.0, 0.0));
        let ball = world.add_body(body);

        run(&mut world, 2.0);
        let events = world.drain_events();
        assert!(!events.is_empty());
        let first = events[0];
        assert!(first.involves(ball));
        assert_eq!(first.other(ball), world.floor());
        // Fell about 2.5 m before touching: roughly 7 m/s.
        assert!(first.impact_speed() > 6.0 && first.impact_speed() < 7.5, "{}", first.impact_speed());

        run(&mut world, 20.0);
        let body = world.body(ball).unwrap();
        assert!(body.is_sleeping(), "still {:?}", body.sleep_state());
        assert!((body.position().y - 0.5).abs() < 0.05, "rests at {}", body.position().y);
    }

    #[test]
    fn test_cube_rests_on_floor() {
        let mut world = world();
        let material = world.materials().default_material();
        let cube = RigidBody::new(1.0, BodyShape::from_extents(1.0, 1.0, 1.0).unwrap(), material)
            .unwrap()
            .with_position(Vec3::new(0.0, 1.5, 0.0));
        let cube = world.add_body(cube);
        run(&mut world, 5.0);
        let y = world.body(cube).unwrap().position().y;
        assert!((y - 0.5).abs() < 0.05, "cube rests at {y}");
    }

    #[test]
    fn test_new_contact_raises_one_event() {
        let mut config = WorldConfig::default();
        config.gravity = Vec3::ZERO;
        let mut world = PhysicsWorld::new(&config);
        let material = world.materials().default_material();
        world.create_floor(material).unwrap();

        let mut left = sphere(&world, 0.5, Vec3::new(-1.0, 1.0, 0.0));
        left.set_linear_velocity(Vec3::new(2.0, 0.0, 0.0));
        let mut right = sphere(&world, 0.5, Vec3::new(1.0, 1.0, 0.0));
        right.set_linear_velocity(Vec3::new(-2.0, 0.0, 0.0));
        let left = world.add_body(left);
        let right = world.add_body(right);

        run(&mut world, 2.0);
        let events = world.drain_events();
        assert_eq!(events.len(), 1, "{events:?}");
        let event = events[0];
        assert!(event.involves(left) && event.involves(right));
        assert!(event.impact_speed() > 3.5, "{}", event.impact_speed());

        // They bounced apart.
        assert!(world.body(left).unwrap().linear_velocity().x < 0.0);
        assert!(world.body(right).unwrap().linear_velocity().x > 0.0);
    }

    #[test]
    fn test_broadphase_choice_does_not_change_outcome() {
        let kinds = [
            BroadphaseKind::Naive,
            BroadphaseKind::Grid { cell_size: 1.0 },
            BroadphaseKind::Sap { axis: Some(0) },
            BroadphaseKind::Sap { axis: None },
        ];
        let mut finals = Vec::new();
        for kind in kinds {
            let mut world = world();
            world.set_broadphase(kind);
            for k in 0..6 {
                let x = (k as f32 - 2.5) * 0.3;
                let body = sphere(&world, 0.25, Vec3::new(x, 1.0 + k as f32 * 0.6, 0.1 * k as f32));
                world.add_body(body);
            }
            run(&mut world, 3.0);
            let positions: Vec<Vec3> = world.bodies().map(|(_, b)| b.position()).collect();
            finals.push(positions);
        }
        for other in &finals[1..] {
            assert_eq!(&finals[0], other);
        }
    }

    #[test]
    fn test_fast_body_wakes_sleeper() {
        let mut world = world();
        let sleeper = sphere(&world, 0.5, Vec3::new(0.0, 0.5, 0.0));
        let sleeper = world.add_body(sleeper);
        run(&mut world, 3.0);
        assert!(world.body(sleeper).unwrap().is_sleeping());

        let mut hammer = sphere(&world, 0.5, Vec3::new(0.0, 2.0, 0.0));
        hammer.set_linear_velocity(Vec3::new(0.0, -5.0, 0.0));
        world.add_body(hammer);
        run(&mut world, 0.5);
        assert!(!world.body(sleeper).unwrap().is_sleeping());
    }

    #[test]
    fn test_force_wakes_and_pushes() {
        let mut world = world();
        let body = sphere(&world, 0.5, Vec3::new(0.0, 0.5, 0.0));
        let ball = world.add_body(body);
        run(&mut world, 3.0);
        assert!(world.body(ball).unwrap().is_sleeping());

        assert!(world.apply_force(ball, Vec3::new(300.0, 0.0, 0.0)));
        world.internal_step(DT);
        let body = world.body(ball).unwrap();
        assert!(!body.is_sleeping());
        assert!(body.linear_velocity().x > 0.0);
    }
}
