// src/shape.rs
//! Collision shape descriptors: validation, bounds, and mass properties.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Reusable collision-shape descriptor.
///
/// `Plane` is the infinite static floor: local normal +Z, like the render
/// plane before it is rotated flat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BodyShape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    Plane,
}

/// What the control surface asks for; full extents for boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Sphere { radius: f32 },
    Box { width: f32, height: f32, depth: f32 },
}

#[inline]
fn check(what: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidDimension { what, value })
    }
}

impl BodyShape {
    pub fn sphere(radius: f32) -> Result<Self> {
        Ok(Self::Sphere { radius: check("radius", radius)? })
    }

    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        Ok(Self::Cuboid {
            half_extents: Vec3::new(
                check("half extent x", half_extents.x)?,
                check("half extent y", half_extents.y)?,
                check("half extent z", half_extents.z)?,
            ),
        })
    }

    /// Box from full width/height/depth.
    pub fn from_extents(width: f32, height: f32, depth: f32) -> Result<Self> {
        check("width", width)?;
        check("height", height)?;
        check("depth", depth)?;
        Self::cuboid(Vec3::new(width, height, depth) * 0.5)
    }

    /// Re-checks a descriptor built by hand (enum literals bypass the constructors).
    pub fn validate(&self) -> Result<()> {
        match *self {
            BodyShape::Sphere { radius } => check("radius", radius).map(|_| ()),
            BodyShape::Cuboid { half_extents } => Self::cuboid(half_extents).map(|_| ()),
            BodyShape::Plane => Ok(()),
        }
    }

    #[inline]
    pub fn is_bounded(&self) -> bool {
        !matches!(self, BodyShape::Plane)
    }

    /// World AABB at the given pose. Planes are unbounded.
    pub fn aabb(&self, position: Vec3, orientation: Quat) -> Aabb {
        match *self {
            BodyShape::Sphere { radius } => Aabb {
                min: position - Vec3::splat(radius),
                max: position + Vec3::splat(radius),
            },
            BodyShape::Cuboid { half_extents } => {
                let rot = Mat3::from_quat(orientation);
                let abs = Mat3::from_cols(rot.x_axis.abs(), rot.y_axis.abs(), rot.z_axis.abs());
                let reach = abs * half_extents;
                Aabb { min: position - reach, max: position + reach }
            }
            BodyShape::Plane => Aabb::EVERYTHING,
        }
    }

    /// Diagonal of the local inertia tensor for the given mass.
    pub fn principal_inertia(&self, mass: f32) -> Vec3 {
        match *self {
            BodyShape::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
            BodyShape::Cuboid { half_extents } => {
                let e = half_extents * 2.0;
                let k = mass / 12.0;
                Vec3::new(
                    k * (e.y * e.y + e.z * e.z),
                    k * (e.x * e.x + e.z * e.z),
                    k * (e.x * e.x + e.y * e.y),
                )
            }
            BodyShape::Plane => Vec3::ZERO,
        }
    }
}

impl ShapeKind {
    pub fn to_body_shape(self) -> Result<BodyShape> {
        match self {
            ShapeKind::Sphere { radius } => BodyShape::sphere(radius),
            ShapeKind::Box { width, height, depth } => BodyShape::from_extents(width, height, depth),
        }
    }

    /// Render scale applied to the unit geometry shared by every proxy of this kind.
    pub fn render_scale(self) -> Vec3 {
        match self {
            ShapeKind::Sphere { radius } => Vec3::splat(radius),
            ShapeKind::Box { width, height, depth } => Vec3::new(width, height, depth),
        }
    }
}

/// Axis-aligned bounding box. Infinite bounds are allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EVERYTHING: Aabb = Aabb {
        min: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        max: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
    };

    #[inline(always)]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}
