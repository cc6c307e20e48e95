// src/scene.rs
// Render-side collaborator: proxies the physics bodies are mirrored into.
// The core only adds/removes proxies and writes their position/orientation.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::arena::{Arena, Index};

/// Proxy id (slot + generation)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyHandle(pub(crate) Index);

/// Immutable geometry shared by every proxy of the same kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Radius 1, scaled per proxy.
    UnitSphere { width_segments: u32, height_segments: u32 },
    /// 1×1×1, scaled per proxy.
    UnitBox,
    /// Square floor with the given edge length.
    Plane { size: f32 },
}

/// Shared surface look (what a standard PBR material would carry).
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLook {
    pub name: String,
    pub base_color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
}

impl SurfaceLook {
    pub fn new(name: impl Into<String>, base_color: Vec3, metalness: f32, roughness: f32) -> Self {
        Self { name: name.into(), base_color, metalness, roughness }
    }
}

#[derive(Debug, Clone)]
pub struct RenderProxy {
    pub geometry: Arc<Geometry>,
    pub look: Arc<SurfaceLook>,
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
}

impl RenderProxy {
    pub fn new(geometry: Arc<Geometry>, look: Arc<SurfaceLook>) -> Self {
        Self { geometry, look, position: Vec3::ZERO, orientation: Quat::IDENTITY, scale: Vec3::ONE }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix for the renderer.
    #[inline]
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }
}

/// The scene graph the sandbox drives. Implemented by the real renderer and
/// by [`HeadlessScene`].
pub trait SceneGraph {
    fn add_proxy(&mut self, proxy: RenderProxy) -> ProxyHandle;
    /// Removing an absent proxy is a no-op returning false.
    fn remove_proxy(&mut self, handle: ProxyHandle) -> bool;
    fn proxy(&self, handle: ProxyHandle) -> Option<&RenderProxy>;
    fn proxy_mut(&mut self, handle: ProxyHandle) -> Option<&mut RenderProxy>;
    fn proxy_count(&self) -> usize;

    /// Copies a transform into a proxy. False if the proxy is gone.
    fn set_transform(&mut self, handle: ProxyHandle, position: Vec3, orientation: Quat) -> bool {
        match self.proxy_mut(handle) {
            Some(proxy) => {
                proxy.position = position;
                proxy.orientation = orientation;
                true
            }
            None => false,
        }
    }
}

/// In-memory scene graph with no GPU behind it.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    proxies: Arena<RenderProxy>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProxyHandle, &RenderProxy)> {
        self.proxies.iter().map(|(index, proxy)| (ProxyHandle(index), proxy))
    }
}

impl SceneGraph for HeadlessScene {
    fn add_proxy(&mut self, proxy: RenderProxy) -> ProxyHandle {
        ProxyHandle(self.proxies.insert(proxy))
    }

    fn remove_proxy(&mut self, handle: ProxyHandle) -> bool {
        self.proxies.remove(handle.0).is_some()
    }

    fn proxy(&self, handle: ProxyHandle) -> Option<&RenderProxy> {
        self.proxies.get(handle.0)
    }

    fn proxy_mut(&mut self, handle: ProxyHandle) -> Option<&mut RenderProxy> {
        self.proxies.get_mut(handle.0)
    }

    fn proxy_count(&self) -> usize {
        self.proxies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look() -> Arc<SurfaceLook> {
        Arc::new(SurfaceLook::new("plastic", Vec3::ONE, 0.3, 0.4))
    }

    #[test]
    fn test_add_remove_proxy() {
        let mut scene = HeadlessScene::new();
        let geometry = Arc::new(Geometry::UnitBox);
        let a = scene.add_proxy(RenderProxy::new(geometry.clone(), look()));
        let b = scene.add_proxy(RenderProxy::new(geometry.clone(), look()));
        assert_eq!(scene.proxy_count(), 2);
        assert_eq!(Arc::strong_count(&geometry), 3);

        assert!(scene.remove_proxy(a));
        assert!(!scene.remove_proxy(a));
        assert_eq!(scene.proxy_count(), 1);
        assert!(scene.proxy(b).is_some());
    }

    #[test]
    fn test_set_transform_and_matrix() {
        let mut scene = HeadlessScene::new();
        let proxy = RenderProxy::new(Arc::new(Geometry::UnitBox), look()).with_scale(Vec3::splat(2.0));
        let handle = scene.add_proxy(proxy);
        let rot = Quat::from_rotation_y(1.0);
        assert!(scene.set_transform(handle, Vec3::new(1.0, 2.0, 3.0), rot));

        let proxy = scene.proxy(handle).unwrap();
        assert_eq!(proxy.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(proxy.orientation, rot);
        let origin = proxy.world_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);

        scene.remove_proxy(handle);
        assert!(!scene.set_transform(handle, Vec3::ZERO, Quat::IDENTITY));
    }
}
