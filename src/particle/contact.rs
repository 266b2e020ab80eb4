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

//! Particle-particle and particle-body contact detection (§4.C).

use bevy::math::Vec2;

use crate::constants::DISTANCE_EPSILON_SQUARED;
use crate::flags::ParticleFlags;
use crate::particle::host::{Aabb, RigidBodyWorld};
use crate::particle::proxy::{self, Proxy};

#[derive(Clone, Copy, Debug)]
pub struct ParticleContact {
    pub index_a: usize,
    pub index_b: usize,
    pub flags: ParticleFlags,
    pub weight: f32,
    pub normal: Vec2,
}

#[derive(Clone, Copy, Debug)]
pub struct ParticleBodyContact<B: Copy> {
    pub index: usize,
    pub body: B,
    pub weight: f32,
    pub normal: Vec2,
    pub mass: f32,
}

/// Appends a contact between `a` and `b` if `|pos_a - pos_b|^2 < diameter^2`
/// (§3). Returns `true` if a contact was added.
pub fn add_contact(
    contacts: &mut Vec<ParticleContact>,
    positions: &[Vec2],
    flags: &[ParticleFlags],
    a: usize,
    b: usize,
    diameter: f32,
) -> bool {
    if a == b {
        return false;
    }
    let delta = positions[b] - positions[a];
    let d2 = delta.length_squared();
    if d2 >= diameter * diameter || d2 < DISTANCE_EPSILON_SQUARED {
        return false;
    }
    let d = d2.sqrt();
    contacts.push(ParticleContact {
        index_a: a,
        index_b: b,
        flags: flags[a] | flags[b],
        weight: 1.0 - d / diameter,
        normal: delta / d,
    });
    true
}

/// Refreshes every proxy's tag, re-sorts, and rebuilds the particle-particle
/// contact list from scratch (§4.C). When `except_zombie` is set, contacts
/// touching a zombie particle are filtered out of the result (the compactor
/// calls this right before it runs so nothing dangling reaches the solvers).
pub fn update_contacts(
    proxies: &mut [Proxy],
    positions: &[Vec2],
    flags: &[ParticleFlags],
    diameter: f32,
    except_zombie: bool,
) -> Vec<ParticleContact> {
    proxy::update_tags_and_sort(proxies, positions, 1.0 / diameter);

    let mut contacts = Vec::new();
    proxy::for_each_neighbor_pair(proxies, |a, b| {
        add_contact(&mut contacts, positions, flags, a, b, diameter);
    });

    if except_zombie {
        contacts.retain(|c| !c.flags.contains(ParticleFlags::ZOMBIE));
    }
    contacts
}

/// Rebuilds particle-body contacts against the host world (§4.C). Builds an
/// AABB enclosing every live particle inflated by one diameter, asks the
/// host which fixtures overlap it, then narrows to candidate proxies via a
/// tag-range scan per fixture before testing the host's shape distance.
pub fn update_body_contacts<W: RigidBodyWorld>(
    world: &W,
    proxies: &[Proxy],
    positions: &[Vec2],
    flags: &[ParticleFlags],
    inv_mass: f32,
    diameter: f32,
) -> Vec<ParticleBodyContact<W::Body>> {
    let Some(bounds) = Aabb::of_points(positions.iter().copied()) else {
        return Vec::new();
    };
    let query_aabb = bounds.inflated(diameter);

    let mut out = Vec::new();
    let inv_diameter = 1.0 / diameter;
    world.query_aabb(query_aabb, &mut |fixture| {
        if world.fixture_is_sensor(fixture) {
            return true;
        }
        let fixture_aabb = world.fixture_aabb(fixture).inflated(diameter);
        let low = crate::particle::proxy::compute_tag(
            fixture_aabb.lower.x,
            fixture_aabb.lower.y,
            inv_diameter,
        );
        let high = crate::particle::proxy::compute_tag(
            fixture_aabb.upper.x,
            fixture_aabb.upper.y,
            inv_diameter,
        );
        // the tag range is an approximation (rows outside the AABB share a
        // tag prefix with rows inside it); re-test each candidate against
        // the actual AABB before paying for compute_distance.
        let (lo, hi) = if low <= high { (low, high) } else { (high, low) };
        let range = proxy::tag_range(proxies, lo, hi);
        for p in &proxies[range] {
            let point = positions[p.index];
            if !fixture_aabb.contains_point(point) {
                continue;
            }
            let (d, n) = world.compute_distance(fixture, point);
            if d < diameter {
                let body = world.body_of(fixture);
                let body_center = world.body_world_center(body);
                let r = point - body_center;
                let r_cross_n = r.x * n.y - r.y * n.x;
                let inv_a = if flags[p.index].contains(ParticleFlags::WALL) {
                    0.0
                } else {
                    inv_mass
                };
                let denom = inv_a + world.body_inv_mass(body)
                    + world.body_inv_inertia(body) * r_cross_n * r_cross_n;
                let mass = if denom > 0.0 { 1.0 / denom } else { 0.0 };
                out.push(ParticleBodyContact {
                    index: p.index,
                    body,
                    weight: 1.0 - d / diameter,
                    normal: n,
                    mass,
                });
            }
        }
        true
    });
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn contact_weight_and_normal_match_spec_definitions() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let flags = vec![ParticleFlags::empty(); 2];
        let mut contacts = Vec::new();
        add_contact(&mut contacts, &positions, &flags, 0, 1, 1.0);
        assert_eq!(contacts.len(), 1);
        let c = contacts[0];
        assert!((c.weight - 0.5).abs() < 1e-6);
        assert!((c.normal - Vec2::new(1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn no_contact_beyond_diameter() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0)];
        let flags = vec![ParticleFlags::empty(); 2];
        let mut contacts = Vec::new();
        assert!(!add_contact(&mut contacts, &positions, &flags, 0, 1, 1.0));
        assert!(contacts.is_empty());
    }

    #[test]
    fn update_contacts_is_complete_and_sorted() {
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.5, 0.0),
            Vec2::new(10.0, 10.0),
        ];
        let flags = vec![ParticleFlags::empty(); 3];
        let mut proxies: Vec<Proxy> = (0..3).map(|i| Proxy { index: i, tag: 0 }).collect();
        let contacts = update_contacts(&mut proxies, &positions, &flags, 1.0, false);
        assert_eq!(contacts.len(), 1);
        assert!(proxies.windows(2).all(|w| w[0].tag <= w[1].tag));
    }

    #[test]
    fn update_contacts_drops_zombie_pairs_when_requested() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let flags = vec![ParticleFlags::ZOMBIE, ParticleFlags::empty()];
        let mut proxies: Vec<Proxy> = (0..2).map(|i| Proxy { index: i, tag: 0 }).collect();
        let contacts = update_contacts(&mut proxies, &positions, &flags, 1.0, true);
        assert!(contacts.is_empty());
    }
}
