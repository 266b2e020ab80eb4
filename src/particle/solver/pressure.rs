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

//! Pressure solver (§4.G). Always runs, last in the pipeline.

use crate::constants::{MAX_PARTICLE_WEIGHT, MIN_PARTICLE_WEIGHT};
use crate::flags::ParticleFlags;
use crate::particle::host::RigidBodyWorld;

use super::SolveContext;

pub fn solve<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let n = ctx.positions.len();
    let mut density = vec![0.0f32; n];
    for c in ctx.contacts {
        density[c.index_a] += c.weight;
        density[c.index_b] += c.weight;
    }
    for bc in ctx.body_contacts {
        density[bc.index] += bc.weight;
    }
    for (i, f) in ctx.flags.iter().enumerate() {
        if f.contains(ParticleFlags::POWDER) {
            density[i] = 0.0;
        }
    }

    let diameter = ctx.tunables.diameter();
    let critical_pressure = ctx.tunables.critical_pressure(ctx.step.inv_dt);
    let k = ctx.tunables.K_PRESSURE;
    let pressure_of = |w: f32| -> f32 {
        k * critical_pressure * w.clamp(MIN_PARTICLE_WEIGHT, MAX_PARTICLE_WEIGHT) - MIN_PARTICLE_WEIGHT
    };

    let coeff = ctx.step.dt / (ctx.tunables.DENSITY * diameter);

    for c in ctx.contacts {
        let h = pressure_of(density[c.index_a]) + pressure_of(density[c.index_b]);
        let f = c.normal * (coeff * c.weight * h);
        ctx.velocities[c.index_a] -= f;
        ctx.velocities[c.index_b] += f;
    }

    let particle_inv_mass = ctx.tunables.particle_inv_mass();
    for bc in ctx.body_contacts {
        let ha = pressure_of(density[bc.index]);
        let f = bc.normal * (coeff * bc.weight * bc.mass * (ha + k * bc.weight));
        let inv_a = if ctx.flags[bc.index].contains(ParticleFlags::WALL) {
            0.0
        } else {
            particle_inv_mass
        };
        if inv_a > 0.0 {
            ctx.velocities[bc.index] += f * inv_a;
        }
        let point = ctx.positions[bc.index];
        ctx.world.apply_linear_impulse(bc.body, -f, point, true);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::Tunables;
    use crate::particle::group::GroupRegistry;
    use crate::particle::host::NullWorld;
    use crate::particle::system::Step;
    use bevy::math::Vec2;

    #[test]
    fn pressure_pushes_overlapping_particles_apart() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0)];
        let mut velocities = vec![Vec2::ZERO, Vec2::ZERO];
        let flags = vec![ParticleFlags::empty(); 2];
        let contacts = vec![crate::particle::contact::ParticleContact {
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
        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
    }
}
