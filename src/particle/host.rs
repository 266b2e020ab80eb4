/*
    Copyright 2023 github.com/programaquatic

   Licensed under the Apache License, Version 2.0 (the "License");
   you may not use this file except in compliance with the License.
   You may obtain a copy of the License at

       http://www.apache.org/licenses/LICENSE-2.0

   Unless required by applicable law or agreed to in writing, software
   distributed under the License is distributed on an "AS IS" BASIS,
   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
   See the License for the specific language governing permissions and
   limitations under the License.
*/

//! The surrounding rigid-body world, expressed as a small capability trait
//! (§9 design note: "callback interfaces for queries ... no runtime type
//! reflection is needed"). The particle core never depends on a concrete
//! physics engine; [`crate::plugin`] supplies the bevy_rapier3d-backed
//! implementation used by the demo app, and tests supply a trivial stub.

use bevy::math::Vec2;

use crate::particle::group::Transform2D;

/// Axis-aligned bounding box in the particle system's 2-D plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Aabb { lower, upper }
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.lower.x && p.x <= self.upper.x && p.y >= self.lower.y && p.y <= self.upper.y
    }

    pub fn inflated(&self, margin: f32) -> Aabb {
        Aabb {
            lower: self.lower - Vec2::splat(margin),
            upper: self.upper + Vec2::splat(margin),
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    pub fn of_points<I: IntoIterator<Item = Vec2>>(points: I) -> Option<Aabb> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in it {
            aabb.lower = aabb.lower.min(p);
            aabb.upper = aabb.upper.max(p);
        }
        Some(aabb)
    }
}

/// The host's rigid-body world, fixtures and bodies (§6 Outbound). `Fixture`
/// and `Body` are opaque, `Copy` handles the host hands back out of its own
/// query; the core never interprets them beyond passing them back.
pub trait RigidBodyWorld {
    type Fixture: Copy;
    type Body: Copy;

    /// Broad-phase query: invoke `callback` for every fixture whose AABB
    /// overlaps `aabb`. Stop early if `callback` returns `false`.
    fn query_aabb(&self, aabb: Aabb, callback: &mut dyn FnMut(Self::Fixture) -> bool);

    fn fixture_aabb(&self, fixture: Self::Fixture) -> Aabb;
    fn fixture_is_sensor(&self, fixture: Self::Fixture) -> bool;
    fn body_of(&self, fixture: Self::Fixture) -> Self::Body;

    /// Signed distance from `point` to the fixture's shape and the surface
    /// normal at the closest point (pointing away from the shape).
    fn compute_distance(&self, fixture: Self::Fixture, point: Vec2) -> (f32, Vec2);

    /// Ray-casts the segment `p1 -> p2` (fraction in `[0,1]`) against one
    /// fixture. Returns the hit fraction and surface normal.
    fn ray_cast_fixture(&self, fixture: Self::Fixture, p1: Vec2, p2: Vec2) -> Option<(f32, Vec2)>;

    fn body_world_center(&self, body: Self::Body) -> Vec2;
    fn body_inv_mass(&self, body: Self::Body) -> f32;
    fn body_inv_inertia(&self, body: Self::Body) -> f32;
    fn body_linear_velocity_at_point(&self, body: Self::Body, point: Vec2) -> Vec2;
    fn apply_linear_impulse(&mut self, body: Self::Body, impulse: Vec2, point: Vec2, wake: bool);

    fn gravity(&self) -> Vec2;
}

/// A shape used to fill a freshly created group with particles or to select
/// particles for mass destruction (§6 Outbound `Shape`). Host-owned; the
/// core only calls through this capability, never interprets the shape's
/// own representation.
pub trait ParticleShape {
    /// Number of disjoint "children" the shape has (1 for anything but a
    /// compound/chain shape).
    fn child_count(&self) -> usize;

    /// Tight AABB of one child under `transform`, in world space.
    fn compute_aabb(&self, transform: &Transform2D, child: usize) -> Aabb;

    /// Whether world-space `point` lies inside the shape placed at `transform`.
    fn test_point(&self, transform: &Transform2D, point: Vec2) -> bool;
}

/// A disc, in the shape's own local frame (radius measured from `transform`'s
/// origin). Single-child.
#[derive(Clone, Copy, Debug)]
pub struct CircleShape {
    pub radius: f32,
}

impl ParticleShape for CircleShape {
    fn child_count(&self) -> usize {
        1
    }

    fn compute_aabb(&self, transform: &Transform2D, _child: usize) -> Aabb {
        let r = Vec2::splat(self.radius);
        Aabb::new(transform.position - r, transform.position + r)
    }

    fn test_point(&self, transform: &Transform2D, point: Vec2) -> bool {
        (point - transform.position).length_squared() <= self.radius * self.radius
    }
}

/// An axis-aligned box in the shape's own local frame, half-extents given in
/// that frame and then rotated/translated by `transform`. Single-child.
#[derive(Clone, Copy, Debug)]
pub struct BoxShape {
    pub half_extents: Vec2,
}

impl ParticleShape for BoxShape {
    fn child_count(&self) -> usize {
        1
    }

    fn compute_aabb(&self, transform: &Transform2D, _child: usize) -> Aabb {
        let corners = [
            Vec2::new(-self.half_extents.x, -self.half_extents.y),
            Vec2::new(self.half_extents.x, -self.half_extents.y),
            Vec2::new(self.half_extents.x, self.half_extents.y),
            Vec2::new(-self.half_extents.x, self.half_extents.y),
        ];
        Aabb::of_points(corners.iter().map(|&c| transform.apply(c)))
            .unwrap_or_else(|| Aabb::new(transform.position, transform.position))
    }

    fn test_point(&self, transform: &Transform2D, point: Vec2) -> bool {
        let (s, c) = transform.angle.sin_cos();
        let local = point - transform.position;
        let unrotated = Vec2::new(c * local.x + s * local.y, -s * local.x + c * local.y);
        unrotated.x.abs() <= self.half_extents.x && unrotated.y.abs() <= self.half_extents.y
    }
}

/// Minimal host used by unit tests and doctests: no fixtures, zero gravity.
#[derive(Default, Clone, Copy)]
pub struct NullWorld;

impl RigidBodyWorld for NullWorld {
    type Fixture = ();
    type Body = ();

    fn query_aabb(&self, _aabb: Aabb, _callback: &mut dyn FnMut(Self::Fixture) -> bool) {}
    fn fixture_aabb(&self, _fixture: Self::Fixture) -> Aabb {
        Aabb::new(Vec2::ZERO, Vec2::ZERO)
    }
    fn fixture_is_sensor(&self, _fixture: Self::Fixture) -> bool {
        false
    }
    fn body_of(&self, _fixture: Self::Fixture) -> Self::Body {}
    fn compute_distance(&self, _fixture: Self::Fixture, _point: Vec2) -> (f32, Vec2) {
        (f32::MAX, Vec2::Y)
    }
    fn ray_cast_fixture(&self, _fixture: Self::Fixture, _p1: Vec2, _p2: Vec2) -> Option<(f32, Vec2)> {
        None
    }
    fn body_world_center(&self, _body: Self::Body) -> Vec2 {
        Vec2::ZERO
    }
    fn body_inv_mass(&self, _body: Self::Body) -> f32 {
        0.0
    }
    fn body_inv_inertia(&self, _body: Self::Body) -> f32 {
        0.0
    }
    fn body_linear_velocity_at_point(&self, _body: Self::Body, _point: Vec2) -> Vec2 {
        Vec2::ZERO
    }
    fn apply_linear_impulse(&mut self, _body: Self::Body, _impulse: Vec2, _point: Vec2, _wake: bool) {}
    fn gravity(&self) -> Vec2 {
        Vec2::ZERO
    }
}
