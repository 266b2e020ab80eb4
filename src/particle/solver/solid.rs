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

//! Solid-group ejection solver (§4.G). Pushes particles belonging to
//! different solid groups apart in proportion to how deep inside their
//! respective group's surface each one sits, so two solid blobs don't
//! interpenetrate.

use crate::particle::group::GroupRegistry;

use super::SolveContext;

/// Finds the group (if any) owning particle `index`. Groups have disjoint
/// ranges, so this is correct regardless of registry iteration order; the
/// registry is small enough in practice that a linear scan is fine.
fn group_of(groups: &GroupRegistry, index: usize) -> Option<crate::particle::group::GroupId> {
    groups.iter().find(|(_, g)| g.contains(index)).map(|(id, _)| id)
}

pub fn solve<W: crate::particle::host::RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let Some(depth) = ctx.depth else { return };
    let k = ctx.step.inv_dt * ctx.tunables.K_EJECTION;

    for c in ctx.contacts {
        let ga = group_of(ctx.groups, c.index_a);
        let gb = group_of(ctx.groups, c.index_b);
        let (Some(ga), Some(gb)) = (ga, gb) else { continue };
        if ga == gb {
            continue;
        }
        let d = depth[c.index_a] + depth[c.index_b];
        let f = c.normal * (k * d * c.weight);
        ctx.velocities[c.index_a] -= f;
        ctx.velocities[c.index_b] += f;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::Tunables;
    use crate::flags::{GroupFlags, ParticleFlags};
    use crate::particle::contact::ParticleContact;
    use crate::particle::group::{GroupRegistry, ParticleGroup, Transform2D};
    use crate::particle::host::NullWorld;
    use crate::particle::system::Step;
    use bevy::math::Vec2;

    fn group(first: usize, last: usize) -> ParticleGroup {
        ParticleGroup {
            first_index: first,
            last_index: last,
            flags: GroupFlags::SOLID,
            strength: 1.0,
            transform: Transform2D::default(),
            destroy_automatically: true,
            to_be_destroyed: false,
            to_be_split: false,
        }
    }

    #[test]
    fn ejects_particles_across_a_group_boundary() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let mut velocities = vec![Vec2::ZERO, Vec2::ZERO];
        let flags = vec![ParticleFlags::empty(); 2];
        let depth = vec![1.0f32, 1.0];
        let mut groups = GroupRegistry::default();
        groups.insert(group(0, 1));
        groups.insert(group(1, 2));
        let contacts = vec![ParticleContact {
            index_a: 0,
            index_b: 1,
            flags: ParticleFlags::empty(),
            weight: 0.5,
            normal: Vec2::X,
        }];
        let tunables = Tunables::default();
        let mut world = NullWorld;
        let mut ctx = SolveContext {
            world: &mut world,
            positions: &positions,
            velocities: &mut velocities,
            flags: &flags,
            depth: Some(&depth),
            groups: &groups,
            contacts: &contacts,
            body_contacts: &[],
            pairs: &[],
            triads: &[],
            tunables: &tunables,
            step: Step { dt: 1.0 / 60.0, inv_dt: 60.0 },
            all_particle_flags: ParticleFlags::empty(),
            all_group_flags: GroupFlags::SOLID,
        };
        solve(&mut ctx);
        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
    }

    #[test]
    fn same_group_contacts_are_untouched() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let mut velocities = vec![Vec2::ZERO, Vec2::ZERO];
        let flags = vec![ParticleFlags::empty(); 2];
        let depth = vec![1.0f32, 1.0];
        let mut groups = GroupRegistry::default();
        groups.insert(group(0, 2));
        let contacts = vec![ParticleContact {
            index_a: 0,
            index_b: 1,
            flags: ParticleFlags::empty(),
            weight: 0.5,
            normal: Vec2::X,
        }];
        let tunables = Tunables::default();
        let mut world = NullWorld;
        let mut ctx = SolveContext {
            world: &mut world,
            positions: &positions,
            velocities: &mut velocities,
            flags: &flags,
            depth: Some(&depth),
            groups: &groups,
            contacts: &contacts,
            body_contacts: &[],
            pairs: &[],
            triads: &[],
            tunables: &tunables,
            step: Step { dt: 1.0 / 60.0, inv_dt: 60.0 },
            all_particle_flags: ParticleFlags::empty(),
            all_group_flags: GroupFlags::SOLID,
        };
        solve(&mut ctx);
        assert_eq!(velocities[0], Vec2::ZERO);
        assert_eq!(velocities[1], Vec2::ZERO);
    }
}
