// src/sandbox.rs
//! The sandbox: world, scene, paired registry, and hit sounds driven together.
//!
//! Everything here runs on one thread. Spawn and reset are plain `&mut self`
//! calls, so they can never overlap a tick or each other.

use std::sync::Arc;

use glam::Vec3;

use crate::audio::{AudioVoice, DispatchStats, HitSoundDispatcher};
use crate::body::BodyHandle;
use crate::config::SandboxConfig;
use crate::controls::Command;
use crate::physics::{floor_orientation, PhysicsWorld, StepReport};
use crate::registry::{PairId, PairedRegistry};
use crate::scene::{Geometry, ProxyHandle, RenderProxy, SceneGraph, SurfaceLook};
use crate::shape::ShapeKind;
use crate::spawner::Spawner;
use crate::time::{Clock, FrameTimer};
use crate::{Error, Result};

/// What one tick of the synchronization loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub delta: f64,
    pub step: StepReport,
    /// Listener notifications delivered to the hit-sound dispatcher.
    pub notifications: usize,
    pub sounds: usize,
    /// Proxies whose transform was copied from their body.
    pub synced: usize,
}

/// What one reset tore down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub pairs: usize,
    /// (unsubscribe, remove body, remove proxy) triples executed.
    pub triples: usize,
    pub listeners_removed: usize,
    pub bodies_removed: usize,
    pub proxies_removed: usize,
}

pub struct Sandbox<S: SceneGraph> {
    config: SandboxConfig,
    world: PhysicsWorld,
    scene: S,
    registry: PairedRegistry,
    spawner: Spawner,
    hit_sounds: HitSoundDispatcher,
    timer: FrameTimer,
    floor_body: BodyHandle,
    floor_proxy: ProxyHandle,
}

impl<S: SceneGraph> Sandbox<S> {
    /// Builds the world (materials, floor) and the floor proxy in `scene`.
    pub fn new(config: SandboxConfig, mut scene: S, hit_sounds: HitSoundDispatcher) -> Result<Self> {
        config.validate()?;
        let mut world = PhysicsWorld::new(&config.world);

        let materials = world.materials_mut();
        for name in &config.materials.names {
            materials.register(name);
        }
        for rule in &config.materials.rules {
            let a = materials.register(&rule.a);
            let b = materials.register(&rule.b);
            materials.add_rule(a, b, crate::material::ContactRule::new(rule.friction, rule.restitution))?;
        }
        let floor_material = match &config.floor.material {
            Some(name) => world
                .materials()
                .lookup(name)
                .ok_or_else(|| Error::config(format!("unknown floor material {name:?}")))?,
            None => world.materials().default_material(),
        };

        let floor_body = world.create_floor(floor_material)?;
        let floor_look = SurfaceLook::new("floor", Vec3::splat(0x77 as f32 / 255.0), 0.3, 0.4);
        let floor_proxy = scene.add_proxy(
            RenderProxy::new(Arc::new(Geometry::Plane { size: config.floor.size }), Arc::new(floor_look))
                .with_orientation(floor_orientation()),
        );

        let spawner = Spawner::new(config.spawn, &config.world);
        log::info!(
            "sandbox ready: {} broadphase, gravity {:?}, {} material(s)",
            world.broadphase_name(),
            world.gravity(),
            world.materials().len()
        );

        Ok(Self {
            config,
            world,
            scene,
            registry: PairedRegistry::new(),
            spawner,
            hit_sounds,
            timer: FrameTimer::new(),
            floor_body,
            floor_proxy,
        })
    }

    /// Single shared voice, as configured in `config.hit_sound`.
    pub fn with_voice(config: SandboxConfig, scene: S, voice: Box<dyn AudioVoice>) -> Result<Self> {
        let hit_sounds = HitSoundDispatcher::new(voice, config.hit_sound);
        Self::new(config, scene, hit_sounds)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn spawn(&mut self, kind: ShapeKind, position: Vec3) -> Result<PairId> {
        self.spawner.spawn(kind, position, &mut self.world, &mut self.scene, &mut self.registry)
    }

    pub fn spawn_sphere(&mut self, radius: f32, position: Vec3) -> Result<PairId> {
        self.spawn(ShapeKind::Sphere { radius }, position)
    }

    pub fn spawn_box(&mut self, width: f32, height: f32, depth: f32, position: Vec3) -> Result<PairId> {
        self.spawn(ShapeKind::Box { width, height, depth }, position)
    }

    /// Removes every paired object. The floor stays.
    pub fn reset(&mut self) -> TeardownReport {
        let pairs = self.registry.take_all();
        let mut report = TeardownReport { pairs: pairs.len(), ..TeardownReport::default() };
        for pair in pairs {
            report.listeners_removed += self.world.unsubscribe(pair.listener) as usize;
            report.bodies_removed += self.world.remove_body(pair.body) as usize;
            report.proxies_removed += self.scene.remove_proxy(pair.proxy) as usize;
            report.triples += 1;
        }
        if report.pairs > 0 {
            log::info!(
                "reset removed {} pair(s): {} listener(s), {} body(ies), {} proxy(ies)",
                report.pairs,
                report.listeners_removed,
                report.bodies_removed,
                report.proxies_removed
            );
        }
        report
    }

    pub fn apply(&mut self, command: Command) -> Result<Option<PairId>> {
        match command {
            Command::SpawnSphere { radius, position } => self.spawn_sphere(radius, position).map(Some),
            Command::SpawnBox { width, height, depth, position } => {
                self.spawn_box(width, height, depth, position).map(Some)
            }
            Command::Reset => {
                self.reset();
                Ok(None)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Synchronization loop
    // -------------------------------------------------------------------------

    /// One frame: step the world by the time since the last tick, play hit
    /// sounds, copy body transforms into their proxies.
    pub fn tick(&mut self, elapsed: f64) -> TickReport {
        let delta = self.timer.tick(elapsed);
        let step = self.world.step(self.config.step.fixed_dt, delta, self.config.step.max_substeps);

        let mut notifications = 0;
        let mut sounds = 0;
        let now = self.world.time();
        for event in self.world.drain_events() {
            for body in [event.body_a, event.body_b] {
                for _ in self.world.listeners().listeners_of(body) {
                    notifications += 1;
                    if self.hit_sounds.on_collision(&event, now).is_some() {
                        sounds += 1;
                    }
                }
            }
        }

        let mut synced = 0;
        for pair in &self.registry {
            let Some(body) = self.world.body(pair.body) else {
                log::warn!("{:?} lost its body", pair.id);
                continue;
            };
            if self.scene.set_transform(pair.proxy, body.position(), body.orientation()) {
                synced += 1;
            }
        }

        TickReport { delta, step, notifications, sounds, synced }
    }

    pub fn tick_clock<C: Clock + ?Sized>(&mut self, clock: &C) -> TickReport {
        self.tick(clock.elapsed_seconds())
    }

    /// True when every proxy holds exactly its body's transform.
    pub fn is_synchronized(&self) -> bool {
        self.registry.iter().all(|pair| {
            match (self.world.body(pair.body), self.scene.proxy(pair.proxy)) {
                (Some(body), Some(proxy)) => {
                    proxy.position == body.position() && proxy.orientation == body.orientation()
                }
                _ => false,
            }
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline] pub fn config(&self) -> &SandboxConfig { &self.config }
    #[inline] pub fn world(&self) -> &PhysicsWorld { &self.world }
    #[inline] pub fn world_mut(&mut self) -> &mut PhysicsWorld { &mut self.world }
    #[inline] pub fn scene(&self) -> &S { &self.scene }
    #[inline] pub fn registry(&self) -> &PairedRegistry { &self.registry }
    #[inline] pub fn floor_body(&self) -> BodyHandle { self.floor_body }
    #[inline] pub fn floor_proxy(&self) -> ProxyHandle { self.floor_proxy }
    #[inline] pub fn hit_sound_stats(&self) -> DispatchStats { self.hit_sounds.stats() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RecordingVoice;
    use crate::controls::ControlSurface;
    use crate::scene::HeadlessScene;

    const DT: f64 = 1.0 / 60.0;

    fn sandbox() -> (Sandbox<HeadlessScene>, RecordingVoice) {
        let voice = RecordingVoice::new();
        let sandbox =
            Sandbox::with_voice(SandboxConfig::default(), HeadlessScene::new(), Box::new(voice.clone())).unwrap();
        (sandbox, voice)
    }

    fn run(sandbox: &mut Sandbox<HeadlessScene>, from: f64, frames: usize) -> f64 {
        let mut t = from;
        for _ in 0..frames {
            t += DT;
            sandbox.tick(t);
            assert!(sandbox.is_synchronized());
        }
        t
    }

    #[test]
    fn test_new_has_only_floor() {
        let (sandbox, _) = sandbox();
        assert_eq!(sandbox.world().body_count(), 1);
        assert_eq!(sandbox.scene().proxy_count(), 1);
        assert!(sandbox.registry().is_empty());
        assert!(!sandbox.registry().contains_body(sandbox.floor_body()));
    }

    #[test]
    fn test_spawn_fidelity() {
        let (mut sandbox, _) = sandbox();
        let p = Vec3::new(-0.4, 3.0, 1.1);
        let id = sandbox.spawn_sphere(0.25, p).unwrap();
        let pair = *sandbox.registry().get(id).unwrap();
        assert_eq!(sandbox.world().body(pair.body).unwrap().position(), p);
        assert_eq!(sandbox.scene().proxy(pair.proxy).unwrap().position, p);
        assert!(sandbox.is_synchronized());
    }

    #[test]
    fn test_sync_follows_bodies() {
        let (mut sandbox, _) = sandbox();
        sandbox.spawn_box(0.5, 0.5, 0.5, Vec3::new(0.0, 3.0, 0.0)).unwrap();
        sandbox.spawn_sphere(0.5, Vec3::new(1.0, 3.0, 0.0)).unwrap();
        run(&mut sandbox, 0.0, 30);

        for pair in sandbox.registry() {
            let proxy = sandbox.scene().proxy(pair.proxy).unwrap();
            assert!(proxy.position.y < 3.0, "proxy did not fall: {:?}", proxy.position);
        }
    }

    #[test]
    fn test_sync_copies_orientation_of_tumbling_box() {
        let (mut sandbox, _) = sandbox();
        let id = sandbox.spawn_box(0.3, 0.3, 0.3, Vec3::new(0.0, 3.0, 0.0)).unwrap();
        let pair = *sandbox.registry().get(id).unwrap();
        sandbox.world_mut().body_mut(pair.body).unwrap().set_angular_velocity(Vec3::new(3.0, 1.0, 2.0));

        let mut t = 0.0;
        for _ in 0..240 {
            t += DT;
            sandbox.tick(t);
            assert!(sandbox.is_synchronized());
            let body = sandbox.world().body(pair.body).unwrap();
            let proxy = sandbox.scene().proxy(pair.proxy).unwrap();
            assert_eq!(proxy.orientation, body.orientation());
            assert_eq!(proxy.position, body.position());
            assert!(proxy.orientation.w.abs() < 1.0 - 1e-4, "proxy never rotated: {:?}", proxy.orientation);
        }
        assert!(sandbox.world().body(pair.body).unwrap().position().y < 0.5, "box did not land");
    }

    #[test]
    fn test_long_pause_runs_three_substeps() {
        let (mut sandbox, _) = sandbox();
        sandbox.spawn_sphere(0.5, Vec3::new(0.0, 3.0, 0.0)).unwrap();
        let report = sandbox.tick(10.0);
        assert_eq!(report.delta, 10.0);
        assert_eq!(report.step.substeps, 3);
        assert_eq!(report.synced, 1);
        assert!(sandbox.is_synchronized());
    }

    #[test]
    fn test_dropped_sphere_plays_one_hit() {
        let (mut sandbox, voice) = sandbox();
        sandbox.spawn_sphere(0.5, Vec3::new(0.0, 4.0, 0.0)).unwrap();
        // Falls 3.5 m and hits at about 8.3 m/s; the bounce is still in the air.
        run(&mut sandbox, 0.0, 70);
        let volumes = voice.volumes();
        assert_eq!(volumes.len(), 1, "{volumes:?}");
        assert_eq!(volumes[0], 0.8);
        assert_eq!(voice.rewind_count(), 1);
    }

    #[test]
    fn test_reset_leaves_only_floor() {
        let (mut sandbox, _) = sandbox();
        let mut controls = ControlSurface::seeded(7);
        for _ in 0..12 {
            let command = controls.random_spawn();
            sandbox.apply(command).unwrap();
        }
        let t = run(&mut sandbox, 0.0, 20);
        let before = sandbox.registry().len();
        assert_eq!(before, 12);

        let report = sandbox.reset();
        assert_eq!(report.triples, before);
        assert_eq!(report.pairs, before);
        assert_eq!(report.bodies_removed, before);
        assert_eq!(report.proxies_removed, before);
        assert_eq!(report.listeners_removed, before);
        assert!(sandbox.registry().is_empty());
        assert_eq!(sandbox.world().body_count(), 1);
        assert_eq!(sandbox.scene().proxy_count(), 1);
        assert!(sandbox.world().listeners().is_empty());
        assert!(sandbox.world().contains(sandbox.floor_body()));

        // Second reset is a no-op; the world keeps ticking.
        assert_eq!(sandbox.reset(), TeardownReport::default());
        run(&mut sandbox, t, 5);
    }

    #[test]
    fn test_reset_with_nothing_spawned() {
        let (mut sandbox, _) = sandbox();
        assert_eq!(sandbox.apply(Command::Reset).unwrap(), None);
        assert_eq!(sandbox.world().body_count(), 1);
        assert_eq!(sandbox.scene().proxy_count(), 1);
    }

    #[test]
    fn test_invalid_spawn_leaves_registry_unchanged() {
        let (mut sandbox, _) = sandbox();
        sandbox.spawn_sphere(0.3, Vec3::new(0.0, 3.0, 0.0)).unwrap();
        assert!(sandbox.spawn_box(1.0, -1.0, 1.0, Vec3::ZERO).unwrap_err().is_invalid_dimension());
        assert_eq!(sandbox.registry().len(), 1);
        assert_eq!(sandbox.world().body_count(), 2);
        assert_eq!(sandbox.scene().proxy_count(), 2);
    }

    #[test]
    fn test_audio_failure_does_not_stop_the_loop() {
        let mut sandbox = Sandbox::with_voice(
            SandboxConfig::default(),
            HeadlessScene::new(),
            Box::new(RecordingVoice::failing()),
        )
        .unwrap();
        sandbox.spawn_sphere(0.5, Vec3::new(0.0, 3.0, 0.0)).unwrap();
        run(&mut sandbox, 0.0, 120);
        let stats = sandbox.hit_sound_stats();
        assert!(stats.failed >= 1);
        assert_eq!(stats.played, 0);
    }

    #[test]
    fn test_unknown_floor_material_is_rejected() {
        let mut config = SandboxConfig::default();
        config.floor.material = Some("concrete".into());
        let err = Sandbox::with_voice(config, HeadlessScene::new(), Box::new(RecordingVoice::new()))
            .err()
            .unwrap();
        assert!(err.is_config());
    }
}
