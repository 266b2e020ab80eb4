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

//! Pair and triad construction (§4.D). Pairs come straight out of the
//! contact list; triads come from a Delaunay triangulation of one group's
//! particles, filtered to edges short enough to matter.

use bevy::math::Vec2;

use crate::constants::MAX_TRIAD_DISTANCE_SQUARED;
use crate::flags::ParticleFlags;
use crate::particle::contact::ParticleContact;
use crate::particle::group::GroupId;
use crate::particle::voronoi;

/// A persistent spring between two particles of the same group (§4.D).
/// `distance` is the rest length captured at creation time.
#[derive(Clone, Copy, Debug)]
pub struct Pair {
    pub index_a: usize,
    pub index_b: usize,
    pub flags: ParticleFlags,
    pub strength: f32,
    pub distance: f32,
}

/// A persistent elastic constraint between three particles of the same
/// group (§4.D), plus the precomputed shape-matching coefficients used by
/// the elastic solver each step.
#[derive(Clone, Copy, Debug)]
pub struct Triad {
    pub index_a: usize,
    pub index_b: usize,
    pub index_c: usize,
    pub flags: ParticleFlags,
    pub strength: f32,
    pub pa: Vec2,
    pub pb: Vec2,
    pub pc: Vec2,
    pub ka: f32,
    pub kb: f32,
    pub kc: f32,
    pub s: f32,
}

/// Builds one [`Pair`] for every contact whose OR'd flags intersect
/// [`ParticleFlags::PAIR_FLAGS`] and whose endpoints share a group (§4.D).
/// `group_of` maps a particle index to the group it belongs to, if any.
pub fn create_pairs(
    contacts: &[ParticleContact],
    positions: &[Vec2],
    strength: impl Fn(usize, usize) -> f32,
    group_of: impl Fn(usize) -> Option<GroupId>,
) -> Vec<Pair> {
    let mut pairs = Vec::new();
    for c in contacts {
        if !c.flags.intersects(ParticleFlags::PAIR_FLAGS) {
            continue;
        }
        let (ga, gb) = (group_of(c.index_a), group_of(c.index_b));
        if ga.is_none() || ga != gb {
            continue;
        }
        pairs.push(Pair {
            index_a: c.index_a,
            index_b: c.index_b,
            flags: c.flags,
            strength: strength(c.index_a, c.index_b),
            distance: (positions[c.index_b] - positions[c.index_a]).length(),
        });
    }
    pairs
}

/// Builds triads for one group by Delaunay-triangulating its member
/// particles and keeping triangles whose flags intersect
/// [`ParticleFlags::TRIAD_FLAGS`] and whose longest edge is short enough
/// (§4.D: `edge^2 < MAX_TRIAD_DISTANCE_SQUARED * diameter^2`).
///
/// `members` lists the particle indices that belong to the group; indices
/// into `positions`/`flags` are global.
pub fn create_triads(
    members: &[usize],
    positions: &[Vec2],
    flags: &[ParticleFlags],
    strength: impl Fn(usize, usize, usize) -> f32,
    diameter: f32,
) -> Vec<Triad> {
    let max_edge2 = MAX_TRIAD_DISTANCE_SQUARED * diameter * diameter;
    let points: Vec<(Vec2, usize)> = members.iter().map(|&i| (positions[i], i)).collect();

    let mut triads = Vec::new();
    voronoi::triangulate(&points, diameter * 0.1, |ia, ib, ic| {
        let triad_flags = flags[ia] | flags[ib] | flags[ic];
        if !triad_flags.intersects(ParticleFlags::TRIAD_FLAGS) {
            return;
        }
        let (pa, pb, pc) = (positions[ia], positions[ib], positions[ic]);
        let longest2 = (pb - pa).length_squared().max((pc - pb).length_squared()).max((pa - pc).length_squared());
        if longest2 >= max_edge2 {
            return;
        }
        if let Some(t) = build_triad(ia, ib, ic, pa, pb, pc, triad_flags, strength(ia, ib, ic)) {
            triads.push(t);
        }
    });
    triads
}

/// Precomputes the shape-matching coefficients used by the elastic solver.
/// These reproduce LiquidFun's `b2ParticleSystem::CreateTriad`: `ka`, `kb`,
/// `kc` weight each vertex's contribution to the rest-shape matrix and `s`
/// normalizes it, so that `solveElastic` can rebuild the rigid best-fit
/// rotation of the original triangle from the particles' current positions
/// without storing the full 2x2 matrix.
fn build_triad(
    ia: usize,
    ib: usize,
    ic: usize,
    pa: Vec2,
    pb: Vec2,
    pc: Vec2,
    flags: ParticleFlags,
    strength: f32,
) -> Option<Triad> {
    let centroid = (pa + pb + pc) / 3.0;
    let (a, b, c) = (pa - centroid, pb - centroid, pc - centroid);

    let sa = -(a.x * (b.y - c.y) + a.y * (c.x - b.x) + b.x * c.y - b.y * c.x);
    let det = sa * sa;
    if det < 1e-9 {
        return None;
    }

    Some(Triad {
        index_a: ia,
        index_b: ib,
        index_c: ic,
        flags,
        strength,
        pa: a,
        pb: b,
        pc: c,
        ka: a.length_squared(),
        kb: b.length_squared(),
        kc: c.length_squared(),
        s: 1.0 / sa,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pairs_only_form_within_a_shared_group() {
        let positions = vec![Vec2::ZERO, Vec2::new(0.5, 0.0), Vec2::new(0.5, 0.0)];
        let contacts = vec![
            ParticleContact {
                index_a: 0,
                index_b: 1,
                flags: ParticleFlags::SPRING,
                weight: 0.5,
                normal: Vec2::X,
            },
            ParticleContact {
                index_a: 0,
                index_b: 2,
                flags: ParticleFlags::SPRING,
                weight: 0.5,
                normal: Vec2::X,
            },
        ];
        let group_of = |i: usize| if i == 2 { Some(GroupId(1)) } else { Some(GroupId(0)) };
        let pairs = create_pairs(&contacts, &positions, |_, _| 1.0, group_of);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].index_a, 0);
        assert_eq!(pairs[0].index_b, 1);
        assert!((pairs[0].distance - 0.5).abs() < 1e-6);
    }

    #[test]
    fn pairs_require_pair_flag() {
        let positions = vec![Vec2::ZERO, Vec2::new(0.5, 0.0)];
        let contacts = vec![ParticleContact {
            index_a: 0,
            index_b: 1,
            flags: ParticleFlags::VISCOUS,
            weight: 0.5,
            normal: Vec2::X,
        }];
        let pairs = create_pairs(&contacts, &positions, |_, _| 1.0, |_| Some(GroupId(0)));
        assert!(pairs.is_empty());
    }

    #[test]
    fn triads_skip_edges_longer_than_threshold() {
        let members = vec![0usize, 1, 2];
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.1, 0.0), Vec2::new(0.0, 0.1)];
        let flags = vec![ParticleFlags::ELASTIC; 3];
        // diameter small enough that MAX_TRIAD_DISTANCE_SQUARED * d^2 rejects it.
        let triads = create_triads(&members, &positions, &flags, |_, _, _| 1.0, 0.01);
        assert!(triads.is_empty());
    }

    #[test]
    fn triads_require_triad_flag_and_three_members() {
        let members = vec![0usize, 1, 2];
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        let flags = vec![ParticleFlags::VISCOUS; 3];
        let triads = create_triads(&members, &positions, &flags, |_, _, _| 1.0, 1.0);
        assert!(triads.is_empty());

        let flags = vec![ParticleFlags::ELASTIC; 3];
        let triads = create_triads(&members, &positions, &flags, |_, _, _| 1.0, 1.0);
        assert_eq!(triads.len(), 1);
        assert!(triads[0].s.is_finite());
    }
}
