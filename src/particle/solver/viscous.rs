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

//! Viscous solver (§4.G): structurally [`super::damping`] without the
//! closing-velocity gate, gated instead on [`crate::flags::ParticleFlags::VISCOUS`].

use crate::flags::ParticleFlags;
use crate::particle::host::RigidBodyWorld;

use super::SolveContext;

fn pair_mass(particle_inv_mass: f32) -> f32 {
    if particle_inv_mass <= 0.0 {
        0.0
    } else {
        1.0 / (2.0 * particle_inv_mass)
    }
}

pub fn solve<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let m = pair_mass(ctx.tunables.particle_inv_mass());
    let k = ctx.tunables.K_VISCOUS;

    for c in ctx.contacts {
        if !c.flags.contains(ParticleFlags::VISCOUS) {
            continue;
        }
        let v_rel = ctx.velocities[c.index_b] - ctx.velocities[c.index_a];
        let vn = v_rel.dot(c.normal);
        let f = c.normal * (k * c.weight * m * vn);
        ctx.velocities[c.index_a] += f;
        ctx.velocities[c.index_b] -= f;
    }

    let particle_inv_mass = ctx.tunables.particle_inv_mass();
    for bc in ctx.body_contacts {
        if !ctx.flags[bc.index].contains(ParticleFlags::VISCOUS) {
            continue;
        }
        let body_v = ctx.world.body_linear_velocity_at_point(bc.body, ctx.positions[bc.index]);
        let v_rel = body_v - ctx.velocities[bc.index];
        let vn = v_rel.dot(bc.normal);
        let f = bc.normal * (k * bc.weight * bc.mass * vn);
        let inv_a = if ctx.flags[bc.index].contains(ParticleFlags::WALL) {
            0.0
        } else {
            particle_inv_mass
        };
        if inv_a > 0.0 {
            ctx.velocities[bc.index] -= f * inv_a;
        }
        let point = ctx.positions[bc.index];
        ctx.world.apply_linear_impulse(bc.body, f, point, true);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::Tunables;
    use crate::particle::contact::ParticleContact;
    use crate::particle::group::GroupRegistry;
    use crate::particle::host::NullWorld;
    use crate::particle::system::Step;
    use bevy::math::Vec2;

    #[test]
    fn viscous_acts_even_on_separating_velocity() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let mut velocities = vec![Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)];
        let flags = vec![ParticleFlags::VISCOUS; 2];
        let contacts = vec![ParticleContact {
            index_a: 0,
            index_b: 1,
            flags: ParticleFlags::VISCOUS,
            weight: 0.5,
            normal: Vec2::X,
        }];
        let groups = GroupRegistry::default();
        let tunables = Tunables::default();
        let mut world = NullWorld;
        let mut ctx = SolveContext {
            world: &mut world,
            positions: &positions,
            velocities: &mut velocities,
            flags: &flags,
            depth: None,
            groups: &groups,
            contacts: &contacts,
            body_contacts: &[],
            pairs: &[],
            triads: &[],
            tunables: &tunables,
            step: Step { dt: 1.0 / 60.0, inv_dt: 60.0 },
            all_particle_flags: ParticleFlags::VISCOUS,
            all_group_flags: crate::flags::GroupFlags::empty(),
        };
        solve(&mut ctx);
        assert_ne!(velocities[0].x, -1.0);
    }
}
