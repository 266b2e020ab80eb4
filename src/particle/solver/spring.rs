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

//! Spring pair solver (§4.G). Restores each pair toward its rest length
//! captured at creation.

use crate::particle::host::RigidBodyWorld;

use super::SolveContext;

pub fn solve<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let k = ctx.tunables.K_SPRING;
    for p in ctx.pairs {
        let d = ctx.positions[p.index_b] - ctx.positions[p.index_a];
        let r = d.length();
        if r <= f32::EPSILON {
            continue;
        }
        let f = d * (k * p.strength * (p.distance - r) / r);
        ctx.velocities[p.index_a] -= f;
        ctx.velocities[p.index_b] += f;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::Tunables;
    use crate::flags::ParticleFlags;
    use crate::particle::group::GroupRegistry;
    use crate::particle::host::NullWorld;
    use crate::particle::pair_triad::Pair;
    use crate::particle::system::Step;
    use bevy::math::Vec2;

    fn ctx_with_pair<'a>(
        positions: &'a [Vec2],
        velocities: &'a mut [Vec2],
        flags: &'a [ParticleFlags],
        groups: &'a GroupRegistry,
        pairs: &'a [Pair],
        tunables: &'a Tunables,
        world: &'a mut NullWorld,
    ) -> SolveContext<'a, NullWorld> {
        SolveContext {
            world,
            positions,
            velocities,
            flags,
            depth: None,
            groups,
            contacts: &[],
            body_contacts: &[],
            pairs,
            triads: &[],
            tunables,
            step: Step { dt: 1.0 / 60.0, inv_dt: 60.0 },
            all_particle_flags: ParticleFlags::SPRING,
            all_group_flags: crate::flags::GroupFlags::empty(),
        }
    }

    #[test]
    fn spring_pulls_stretched_pair_back_toward_rest_length() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.6, 0.0)];
        let mut velocities = vec![Vec2::ZERO, Vec2::ZERO];
        let flags = vec![ParticleFlags::SPRING; 2];
        let groups = GroupRegistry::default();
        let pairs = vec![Pair {
            index_a: 0,
            index_b: 1,
            flags: ParticleFlags::SPRING,
            strength: 1.0,
            distance: 0.5,
        }];
        let tunables = Tunables::default();
        let mut world = NullWorld;
        let mut ctx = ctx_with_pair(&positions, &mut velocities, &flags, &groups, &pairs, &tunables, &mut world);
        solve(&mut ctx);
        // stretched beyond rest length: spring should pull them toward each other.
        assert!(velocities[0].x > 0.0);
        assert!(velocities[1].x < 0.0);
    }

    #[test]
    fn spring_is_inert_at_rest_length() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let mut velocities = vec![Vec2::ZERO, Vec2::ZERO];
        let flags = vec![ParticleFlags::SPRING; 2];
        let groups = GroupRegistry::default();
        let pairs = vec![Pair {
            index_a: 0,
            index_b: 1,
            flags: ParticleFlags::SPRING,
            strength: 1.0,
            distance: 0.5,
        }];
        let tunables = Tunables::default();
        let mut world = NullWorld;
        let mut ctx = ctx_with_pair(&positions, &mut velocities, &flags, &groups, &pairs, &tunables, &mut world);
        solve(&mut ctx);
        assert!(velocities[0].length() < 1e-6);
        assert!(velocities[1].length() < 1e-6);
    }
}
