// src/spawner.rs
//! Builds a rigid body and its render proxy as one paired object.

use std::sync::Arc;

use glam::Vec3;

use crate::body::RigidBody;
use crate::config::{SpawnConfig, WorldConfig};
use crate::physics::PhysicsWorld;
use crate::registry::{PairId, PairedRegistry};
use crate::scene::{Geometry, RenderProxy, SceneGraph, SurfaceLook};
use crate::shape::ShapeKind;
use crate::{Error, Result};

/// Holds the geometry and looks every spawned proxy shares.
#[derive(Debug, Clone)]
pub struct Spawner {
    sphere_geometry: Arc<Geometry>,
    box_geometry: Arc<Geometry>,
    sphere_look: Arc<SurfaceLook>,
    box_look: Arc<SurfaceLook>,
    config: SpawnConfig,
    linear_damping: f32,
    angular_damping: f32,
}

impl Spawner {
    pub fn new(config: SpawnConfig, world: &WorldConfig) -> Self {
        Self {
            sphere_geometry: Arc::new(Geometry::UnitSphere { width_segments: 20, height_segments: 20 }),
            box_geometry: Arc::new(Geometry::UnitBox),
            sphere_look: Arc::new(SurfaceLook::new("sphere", Vec3::ONE, 0.3, 0.4)),
            box_look: Arc::new(SurfaceLook::new("box", Vec3::ONE, 0.3, 0.4)),
            config,
            linear_damping: world.linear_damping,
            angular_damping: world.angular_damping,
        }
    }

    #[inline]
    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Spawns a dynamic body of `kind` at `position` with a matching proxy,
    /// a collision listener, and a registry entry.
    ///
    /// Bad dimensions fail before anything is created.
    pub fn spawn<S: SceneGraph + ?Sized>(
        &self,
        kind: ShapeKind,
        position: Vec3,
        world: &mut PhysicsWorld,
        scene: &mut S,
        registry: &mut PairedRegistry,
    ) -> Result<PairId> {
        let shape = kind.to_body_shape()?;
        for value in position.to_array() {
            if !value.is_finite() {
                return Err(Error::InvalidDimension { what: "position", value });
            }
        }

        // Built at the drop point, then moved to the target before anyone can step it.
        let mut body = RigidBody::new(self.config.mass, shape, world.materials().default_material())?
            .with_position(self.config.drop_point)
            .with_damping(self.linear_damping, self.angular_damping);
        body.set_position(position);

        let (geometry, look) = match kind {
            ShapeKind::Sphere { .. } => (&self.sphere_geometry, &self.sphere_look),
            ShapeKind::Box { .. } => (&self.box_geometry, &self.box_look),
        };
        let proxy = RenderProxy::new(geometry.clone(), look.clone())
            .with_scale(kind.render_scale())
            .with_position(body.position())
            .with_orientation(body.orientation());

        let body = world.add_body(body);
        let Some(listener) = world.subscribe(body) else {
            world.remove_body(body);
            return Err(Error::custom("spawned body vanished before its listener was registered"));
        };
        let proxy = scene.add_proxy(proxy);
        let id = registry.insert(kind, proxy, body, listener);
        log::debug!("spawned {:?} at {:?} as {:?}", kind, position, id);
        Ok(id)
    }
}
