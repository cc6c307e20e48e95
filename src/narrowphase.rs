// src/narrowphase.rs
//! Exact contact generation for candidate pairs.
//!
//! Floor (plane) contacts are computed here directly so a resting box gets
//! one point per submerged corner. Everything else goes through parry's
//! `query::contact`, which rapier re-exports.

use glam::{Quat, Vec3};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::parry::query;
use rapier3d::parry::shape::{Ball, Cuboid, Shape};
use smallvec::SmallVec;

use crate::body::RigidBody;
use crate::shape::BodyShape;

/// One contact point between bodies `a` and `b`. `normal` points from a to b.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub point: Vec3,
    pub normal: Vec3,
    pub depth: f32,
}

/// Box-vs-floor can touch with all eight corners.
pub type Manifold = SmallVec<[ContactPoint; 8]>;

#[inline]
fn to_isometry(position: Vec3, orientation: Quat) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::new_normalize(Quaternion::new(
            orientation.w,
            orientation.x,
            orientation.y,
            orientation.z,
        )),
    )
}

enum ParryShape {
    Ball(Ball),
    Cuboid(Cuboid),
}

impl ParryShape {
    fn from_body_shape(shape: &BodyShape) -> Option<Self> {
        match *shape {
            BodyShape::Sphere { radius } => Some(Self::Ball(Ball::new(radius))),
            BodyShape::Cuboid { half_extents: h } => {
                Some(Self::Cuboid(Cuboid::new(Vector3::new(h.x, h.y, h.z))))
            }
            BodyShape::Plane => None,
        }
    }

    fn as_dyn(&self) -> &dyn Shape {
        match self {
            Self::Ball(ball) => ball as &dyn Shape,
            Self::Cuboid(cuboid) => cuboid as &dyn Shape,
        }
    }
}

#[inline]
fn plane_frame(plane: &RigidBody) -> (Vec3, Vec3) {
    (plane.position(), plane.orientation() * Vec3::Z)
}

/// Contacts of a bounded body against a plane, normal pointing out of the plane.
fn plane_contacts(plane: &RigidBody, other: &RigidBody, out: &mut Manifold) {
    let (origin, normal) = plane_frame(plane);
    match *other.shape() {
        BodyShape::Sphere { radius } => {
            let center = other.position();
            let dist = (center - origin).dot(normal) - radius;
            if dist < 0.0 {
                out.push(ContactPoint { point: center - normal * radius, normal, depth: -dist });
            }
        }
        BodyShape::Cuboid { half_extents: h } => {
            for i in 0..8 {
                let sign = Vec3::new(
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                );
                let corner = other.position() + other.orientation() * (h * sign);
                let dist = (corner - origin).dot(normal);
                if dist < 0.0 {
                    out.push(ContactPoint { point: corner, normal, depth: -dist });
                }
            }
        }
        BodyShape::Plane => {}
    }
}

/// Fills `out` with the contacts between `a` and `b` (cleared first).
pub fn collide(a: &RigidBody, b: &RigidBody, out: &mut Manifold) {
    out.clear();
    match (a.shape(), b.shape()) {
        (BodyShape::Plane, BodyShape::Plane) => {}
        (BodyShape::Plane, _) => plane_contacts(a, b, out),
        (_, BodyShape::Plane) => {
            plane_contacts(b, a, out);
            for contact in out.iter_mut() {
                contact.normal = -contact.normal;
            }
        }
        (sa, sb) => {
            let (Some(shape_a), Some(shape_b)) =
                (ParryShape::from_body_shape(sa), ParryShape::from_body_shape(sb))
            else {
                return;
            };
            let pos_a = to_isometry(a.position(), a.orientation());
            let pos_b = to_isometry(b.position(), b.orientation());
            match query::contact(&pos_a, shape_a.as_dyn(), &pos_b, shape_b.as_dyn(), 0.0) {
                Ok(Some(contact)) if contact.dist <= 0.0 => {
                    let p1 = contact.point1;
                    let p2 = contact.point2;
                    let n = contact.normal1.into_inner();
                    out.push(ContactPoint {
                        point: Vec3::new(p1.x + p2.x, p1.y + p2.y, p1.z + p2.z) * 0.5,
                        normal: Vec3::new(n.x, n.y, n.z),
                        depth: -contact.dist,
                    });
                }
                Ok(_) => {}
                Err(unsupported) => {
                    log::warn!("no contact algorithm for {:?} vs {:?}: {:?}", sa, sb, unsupported);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialId;
    use std::f32::consts::FRAC_PI_2;

    fn floor() -> RigidBody {
        RigidBody::new(0.0, BodyShape::Plane, MaterialId(0))
            .unwrap()
            .with_orientation(Quat::from_axis_angle(Vec3::new(-1.0, 0.0, 0.0), FRAC_PI_2))
    }

    fn body(shape: BodyShape, position: Vec3) -> RigidBody {
        RigidBody::new(1.0, shape, MaterialId(0)).unwrap().with_position(position)
    }

    #[test]
    fn test_floor_normal_points_up() {
        let (_, normal) = plane_frame(&floor());
        assert!((normal - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_sphere_resting_in_floor() {
        let mut manifold = Manifold::new();
        let ball = body(BodyShape::sphere(0.5).unwrap(), Vec3::new(0.0, 0.45, 0.0));
        collide(&floor(), &ball, &mut manifold);
        assert_eq!(manifold.len(), 1);
        assert!((manifold[0].depth - 0.05).abs() < 1e-4);
        assert!(manifold[0].normal.y > 0.99);

        // Reversed order flips the normal.
        collide(&ball, &floor(), &mut manifold);
        assert!(manifold[0].normal.y < -0.99);
    }

    #[test]
    fn test_box_on_floor_touches_with_four_corners() {
        let mut manifold = Manifold::new();
        let crate_box = body(BodyShape::cuboid(Vec3::splat(0.5)).unwrap(), Vec3::new(0.0, 0.49, 0.0));
        collide(&floor(), &crate_box, &mut manifold);
        assert_eq!(manifold.len(), 4);
        assert!(manifold.iter().all(|c| (c.depth - 0.01).abs() < 1e-4));
    }

    #[test]
    fn test_sphere_pair_normal_points_from_a_to_b() {
        let mut manifold = Manifold::new();
        let a = body(BodyShape::sphere(0.5).unwrap(), Vec3::ZERO);
        let b = body(BodyShape::sphere(0.5).unwrap(), Vec3::new(0.9, 0.0, 0.0));
        collide(&a, &b, &mut manifold);
        assert_eq!(manifold.len(), 1);
        assert!(manifold[0].normal.x > 0.99);
        assert!((manifold[0].depth - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_separated_box_and_sphere() {
        let mut manifold = Manifold::new();
        let a = body(BodyShape::cuboid(Vec3::splat(0.5)).unwrap(), Vec3::ZERO);
        let b = body(BodyShape::sphere(0.25).unwrap(), Vec3::new(0.0, 2.0, 0.0));
        collide(&a, &b, &mut manifold);
        assert!(manifold.is_empty());

        let b = body(BodyShape::sphere(0.25).unwrap(), Vec3::new(0.0, 0.7, 0.0));
        collide(&a, &b, &mut manifold);
        assert_eq!(manifold.len(), 1);
        assert!(manifold[0].normal.y > 0.99);
    }
}
