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

//! Damping solver (§4.G). Always runs, after pressure. Only resists
//! closing velocity (`v·n < 0`); see [`super::viscous`] for the
//! unconditional sibling.

use crate::flags::ParticleFlags;
use crate::particle::host::RigidBodyWorld;

use super::SolveContext;

/// Effective mass of a particle-particle contact, assuming both sides
/// share the same per-particle inverse mass (the contact struct only
/// carries a reduced mass for particle-body pairs, per §3).
fn pair_mass(particle_inv_mass: f32) -> f32 {
    if particle_inv_mass <= 0.0 {
        0.0
    } else {
        1.0 / (2.0 * particle_inv_mass)
    }
}

pub fn solve<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let m = pair_mass(ctx.tunables.particle_inv_mass());
    let k = ctx.tunables.K_DAMPING;

    for c in ctx.contacts {
        let v_rel = ctx.velocities[c.index_b] - ctx.velocities[c.index_a];
        let vn = v_rel.dot(c.normal);
        if vn >= 0.0 {
            continue;
        }
        let f = c.normal * (k * c.weight * m * vn);
        ctx.velocities[c.index_a] += f;
        ctx.velocities[c.index_b] -= f;
    }

    let particle_inv_mass = ctx.tunables.particle_inv_mass();
    for bc in ctx.body_contacts {
        let body_v = ctx.world.body_linear_velocity_at_point(bc.body, ctx.positions[bc.index]);
        let v_rel = body_v - ctx.velocities[bc.index];
        let vn = v_rel.dot(bc.normal);
        if vn >= 0.0 {
            continue;
        }
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
    fn damping_only_acts_on_closing_velocity() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let mut velocities = vec![Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0)];
        let flags = vec![ParticleFlags::empty(); 2];
        let contacts = vec![ParticleContact {
            index_a: 0,
            index_b: 1,
            flags: ParticleFlags::empty(),
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
            all_particle_flags: ParticleFlags::empty(),
            all_group_flags: crate::flags::GroupFlags::empty(),
        };
        solve(&mut ctx);
        // particles were closing (v·n < 0): damping should slow them down.
        assert!(velocities[0].x < 1.0);
        assert!(velocities[1].x > -1.0);
    }
}
