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

//! Particle-body collision solver (§4.G step 5). Runs before position
//! integration: ray-casts each particle's *intended* motion this step
//! against nearby fixtures and, on a hit, clips the velocity so it doesn't
//! carry the particle through the surface, pushing back on the body with
//! the equal-and-opposite impulse. `diameter` must match the cell size
//! `proxies`' tags were last computed with (§4.B), same requirement as
//! [`crate::particle::query::query_aabb`].

use bevy::math::Vec2;

use crate::particle::host::{Aabb, RigidBodyWorld};
use crate::particle::proxy::{self, Proxy};
use crate::particle::system::Step;

pub fn solve<W: RigidBodyWorld>(
    world: &mut W,
    proxies: &[Proxy],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    particle_inv_mass: f32,
    diameter: f32,
    step: Step,
) {
    if particle_inv_mass <= 0.0 {
        return;
    }
    let swept = positions.iter().zip(velocities.iter()).flat_map(|(&p, &v)| [p, p + v * step.dt]);
    let Some(bounds) = Aabb::of_points(swept) else {
        return;
    };

    // Gather hits first: the host's query callback borrows `world`
    // immutably, but applying impulses needs `&mut`.
    let mut hits: Vec<(usize, W::Fixture, Vec2)> = Vec::new();
    world.query_aabb(bounds, &mut |fixture| {
        if world.fixture_is_sensor(fixture) {
            return true;
        }
        let fixture_aabb = world.fixture_aabb(fixture);
        let inv_d = 1.0 / diameter;
        let low = proxy::compute_tag(fixture_aabb.lower.x, fixture_aabb.lower.y, inv_d);
        let high = proxy::compute_tag(fixture_aabb.upper.x, fixture_aabb.upper.y, inv_d);
        let (lo, hi) = if low <= high { (low, high) } else { (high, low) };
        for p in &proxies[proxy::tag_range(proxies, lo, hi)] {
            let i = p.index;
            let p1 = positions[i];
            let p2 = p1 + velocities[i] * step.dt;
            if let Some((_t, n)) = world.ray_cast_fixture(fixture, p1, p2) {
                hits.push((i, fixture, n));
            }
        }
        true
    });

    for (i, fixture, n) in hits {
        let vn = velocities[i].dot(n);
        if vn >= 0.0 {
            continue;
        }
        let impulse = n * (-vn / particle_inv_mass);
        velocities[i] -= n * vn;
        let body = world.body_of(fixture);
        world.apply_linear_impulse(body, -impulse, positions[i], true);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::particle::host::RigidBodyWorld;

    #[derive(Clone, Copy)]
    struct FlatFloor;

    /// A single infinite floor fixture at y = 0, normal pointing up.
    struct FloorWorld {
        impulses: Vec<(Vec2, Vec2)>,
    }

    impl RigidBodyWorld for FloorWorld {
        type Fixture = FlatFloor;
        type Body = ();

        fn query_aabb(&self, _aabb: Aabb, callback: &mut dyn FnMut(Self::Fixture) -> bool) {
            callback(FlatFloor);
        }
        fn fixture_aabb(&self, _fixture: Self::Fixture) -> Aabb {
            Aabb::new(Vec2::new(-100.0, -1.0), Vec2::new(100.0, 0.0))
        }
        fn fixture_is_sensor(&self, _fixture: Self::Fixture) -> bool {
            false
        }
        fn body_of(&self, _fixture: Self::Fixture) -> Self::Body {}
        fn compute_distance(&self, _fixture: Self::Fixture, point: Vec2) -> (f32, Vec2) {
            (point.y.max(0.0), Vec2::Y)
        }
        fn ray_cast_fixture(&self, _fixture: Self::Fixture, p1: Vec2, p2: Vec2) -> Option<(f32, Vec2)> {
            if p1.y >= 0.0 && p2.y < 0.0 {
                let t = p1.y / (p1.y - p2.y);
                Some((t, Vec2::Y))
            } else {
                None
            }
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
        fn apply_linear_impulse(&mut self, _body: Self::Body, impulse: Vec2, point: Vec2, _wake: bool) {
            self.impulses.push((impulse, point));
        }
        fn gravity(&self) -> Vec2 {
            Vec2::ZERO
        }
    }

    #[test]
    fn falling_particle_is_clipped_at_the_floor() {
        let positions = vec![Vec2::new(0.0, 0.1)];
        let mut velocities = vec![Vec2::new(0.0, -10.0)];
        let proxies = vec![Proxy { index: 0, tag: 0 }];
        let mut world = FloorWorld { impulses: Vec::new() };
        let step = Step { dt: 1.0 / 60.0, inv_dt: 60.0 };
        solve(&mut world, &proxies, &positions, &mut velocities, 1.0, 1.0, step);
        assert!(velocities[0].y >= -1e-3, "expected downward velocity to be clipped, got {velocities:?}");
        assert_eq!(world.impulses.len(), 1);
    }

    #[test]
    fn particle_moving_away_from_floor_is_untouched() {
        let positions = vec![Vec2::new(0.0, 0.1)];
        let mut velocities = vec![Vec2::new(0.0, 10.0)];
        let proxies = vec![Proxy { index: 0, tag: 0 }];
        let mut world = FloorWorld { impulses: Vec::new() };
        let step = Step { dt: 1.0 / 60.0, inv_dt: 60.0 };
        solve(&mut world, &proxies, &positions, &mut velocities, 1.0, 1.0, step);
        assert_eq!(velocities[0].y, 10.0);
    }
}
