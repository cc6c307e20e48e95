// src/solver.rs
//! Sequential-impulse contact solver.
//!
//! Works on velocities only. Penetration is pushed out through a Baumgarte
//! bias on the target normal velocity; bounces come from the approach speed
//! measured before gravity was applied this step.

use glam::{Mat3, Vec3};

use crate::material::ContactRule;
use crate::narrowphase::ContactPoint;

/// Velocity state of one body while solving. Static and sleeping bodies get
/// zero inverse mass so contacts treat them as immovable.
#[derive(Debug, Clone, Copy)]
pub struct SolverBody {
    pub position: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub inv_mass: f32,
    pub inv_inertia: Mat3,
}

impl SolverBody {
    pub const FIXED: SolverBody = SolverBody {
        position: Vec3::ZERO,
        linear_velocity: Vec3::ZERO,
        angular_velocity: Vec3::ZERO,
        inv_mass: 0.0,
        inv_inertia: Mat3::ZERO,
    };

    #[inline(always)]
    fn velocity_at(&self, r: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(r)
    }

    #[inline(always)]
    fn apply(&mut self, impulse: Vec3, r: Vec3) {
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia * r.cross(impulse);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    pub iterations: u32,
    /// Fraction of penetration corrected per step.
    pub baumgarte: f32,
    /// Penetration tolerated without correction.
    pub slop: f32,
    /// Approach speeds below this do not bounce.
    pub restitution_threshold: f32,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self { iterations: 10, baumgarte: 0.2, slop: 0.005, restitution_threshold: 1.0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Constraint {
    a: usize,
    b: usize,
    normal: Vec3,
    tangents: [Vec3; 2],
    ra: Vec3,
    rb: Vec3,
    normal_mass: f32,
    tangent_mass: [f32; 2],
    target: f32,
    friction: f32,
    normal_impulse: f32,
    tangent_impulse: [f32; 2],
}

/// Two unit vectors orthogonal to `n` and to each other.
fn tangent_basis(n: Vec3) -> [Vec3; 2] {
    let helper = if n.x.abs() < 0.57 { Vec3::X } else { Vec3::Y };
    let t1 = n.cross(helper).normalize();
    let t2 = n.cross(t1);
    [t1, t2]
}

#[inline(always)]
fn effective_mass(a: &SolverBody, b: &SolverBody, ra: Vec3, rb: Vec3, dir: Vec3) -> f32 {
    let ka = (a.inv_inertia * ra.cross(dir)).cross(ra).dot(dir);
    let kb = (b.inv_inertia * rb.cross(dir)).cross(rb).dot(dir);
    let k = a.inv_mass + b.inv_mass + ka + kb;
    if k > f32::EPSILON { 1.0 / k } else { 0.0 }
}

/// Contact between solver bodies `a` and `b`, with the approach speed along
/// the normal measured before forces were integrated (negative = closing).
#[derive(Debug, Clone, Copy)]
pub struct SolverContact {
    pub a: usize,
    pub b: usize,
    pub contact: ContactPoint,
    pub rule: ContactRule,
    pub approach_speed: f32,
}

/// Solves all contacts in place on `bodies`.
pub fn solve(bodies: &mut [SolverBody], contacts: &[SolverContact], params: &SolverParams, dt: f32) {
    if contacts.is_empty() || dt <= 0.0 {
        return;
    }

    let mut constraints: Vec<Constraint> = contacts
        .iter()
        .map(|c| {
            let (ba, bb) = (&bodies[c.a], &bodies[c.b]);
            let n = c.contact.normal;
            let ra = c.contact.point - ba.position;
            let rb = c.contact.point - bb.position;
            let tangents = tangent_basis(n);

            let bounce = if -c.approach_speed > params.restitution_threshold {
                -c.rule.restitution * c.approach_speed
            } else {
                0.0
            };
            let push_out = params.baumgarte / dt * (c.contact.depth - params.slop).max(0.0);

            Constraint {
                a: c.a,
                b: c.b,
                normal: n,
                tangents,
                ra,
                rb,
                normal_mass: effective_mass(ba, bb, ra, rb, n),
                tangent_mass: [
                    effective_mass(ba, bb, ra, rb, tangents[0]),
                    effective_mass(ba, bb, ra, rb, tangents[1]),
                ],
                target: bounce.max(push_out),
                friction: c.rule.friction,
                normal_impulse: 0.0,
                tangent_impulse: [0.0; 2],
            }
        })
        .collect();

    for _ in 0..params.iterations {
        for c in constraints.iter_mut() {
            if c.a == c.b {
                continue;
            }
            let (ba, bb) = pair_mut(bodies, c.a, c.b);

            // Normal
            let dv = bb.velocity_at(c.rb) - ba.velocity_at(c.ra);
            let vn = dv.dot(c.normal);
            let lambda = c.normal_mass * (c.target - vn);
            let accumulated = (c.normal_impulse + lambda).max(0.0);
            let applied = accumulated - c.normal_impulse;
            c.normal_impulse = accumulated;
            let p = c.normal * applied;
            ba.apply(-p, c.ra);
            bb.apply(p, c.rb);

            // Friction, bounded by the Coulomb cone
            let limit = c.friction * c.normal_impulse;
            for k in 0..2 {
                let t = c.tangents[k];
                let dv = bb.velocity_at(c.rb) - ba.velocity_at(c.ra);
                let lambda = -c.tangent_mass[k] * dv.dot(t);
                let accumulated = (c.tangent_impulse[k] + lambda).clamp(-limit, limit);
                let applied = accumulated - c.tangent_impulse[k];
                c.tangent_impulse[k] = accumulated;
                let p = t * applied;
                ba.apply(-p, c.ra);
                bb.apply(p, c.rb);
            }
        }
    }
}

#[inline]
fn pair_mut(bodies: &mut [SolverBody], a: usize, b: usize) -> (&mut SolverBody, &mut SolverBody) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = bodies.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = bodies.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(position: Vec3, velocity: Vec3) -> SolverBody {
        let inertia = 0.4 * 0.25; // m = 1, r = 0.5
        SolverBody {
            position,
            linear_velocity: velocity,
            angular_velocity: Vec3::ZERO,
            inv_mass: 1.0,
            inv_inertia: Mat3::from_diagonal(Vec3::splat(1.0 / inertia)),
        }
    }

    fn floor_contact(b: usize, approach_speed: f32, rule: ContactRule) -> SolverContact {
        SolverContact {
            a: 0,
            b,
            contact: ContactPoint { point: Vec3::ZERO, normal: Vec3::Y, depth: 0.0 },
            rule,
            approach_speed,
        }
    }

    #[test]
    fn test_bounce_uses_restitution() {
        let mut bodies = vec![SolverBody::FIXED, ball(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, -5.0, 0.0))];
        let contacts = [floor_contact(1, -5.0, ContactRule::new(0.0, 0.7))];
        solve(&mut bodies, &contacts, &SolverParams::default(), 1.0 / 60.0);
        assert!((bodies[1].linear_velocity.y - 3.5).abs() < 1e-3);
        assert_eq!(bodies[0].linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_slow_contact_does_not_bounce() {
        let mut bodies = vec![SolverBody::FIXED, ball(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, -0.5, 0.0))];
        let contacts = [floor_contact(1, -0.5, ContactRule::new(0.0, 0.7))];
        solve(&mut bodies, &contacts, &SolverParams::default(), 1.0 / 60.0);
        assert!(bodies[1].linear_velocity.y.abs() < 1e-4);
    }

    #[test]
    fn test_friction_slows_sliding() {
        let mut bodies = vec![SolverBody::FIXED, ball(Vec3::new(0.0, 0.5, 0.0), Vec3::new(2.0, -1.0, 0.0))];
        let contacts = [floor_contact(1, -1.0, ContactRule::new(0.5, 0.0))];
        solve(&mut bodies, &contacts, &SolverParams::default(), 1.0 / 60.0);
        let v = bodies[1].linear_velocity;
        assert!(v.x < 2.0);
        assert!(v.x > 0.0);
        assert!(v.y.abs() < 1e-3);
    }

    #[test]
    fn test_momentum_is_conserved_between_dynamic_bodies() {
        let mut bodies = vec![
            ball(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)),
            ball(Vec3::new(0.95, 0.0, 0.0), Vec3::new(-2.0, 0.0, 0.0)),
        ];
        let contacts = [SolverContact {
            a: 0,
            b: 1,
            contact: ContactPoint { point: Vec3::new(0.475, 0.0, 0.0), normal: Vec3::X, depth: 0.05 },
            rule: ContactRule::new(0.1, 0.7),
            approach_speed: -4.0,
        }];
        solve(&mut bodies, &contacts, &SolverParams::default(), 1.0 / 60.0);
        let total = bodies[0].linear_velocity + bodies[1].linear_velocity;
        assert!(total.length() < 1e-4);
        assert!(bodies[0].linear_velocity.x < 0.0);
        assert!(bodies[1].linear_velocity.x > 0.0);
    }
}
