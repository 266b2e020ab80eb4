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

//! The per-step force/velocity pipeline (§4.G). Every solver here mutates
//! the velocity buffer directly and, where it touches a body, applies an
//! equal-and-opposite impulse through [`crate::particle::host::RigidBodyWorld`].
//! [`run`] is the single entry point `ParticleSystem::solve` calls; it owns
//! the fixed step order and the `allParticleFlags`/`allGroupFlags` gating.

pub mod collision;
pub mod colormix;
pub mod damping;
pub mod depth;
pub mod elastic;
pub mod pressure;
pub mod rigid;
pub mod solid;
pub mod spring;
pub mod tensile;
pub mod viscous;
pub mod wall;

use bevy::math::Vec2;

use crate::constants::Tunables;
use crate::flags::{GroupFlags, ParticleFlags};
use crate::particle::contact::{ParticleBodyContact, ParticleContact};
use crate::particle::group::GroupRegistry;
use crate::particle::host::RigidBodyWorld;
use crate::particle::pair_triad::{Pair, Triad};
use crate::particle::system::Step;

/// Everything a per-step solver needs, gathered so `run` can hand one
/// struct to each stage instead of a long, easy-to-misorder argument list.
pub struct SolveContext<'a, W: RigidBodyWorld> {
    pub world: &'a mut W,
    pub positions: &'a [Vec2],
    pub velocities: &'a mut [Vec2],
    pub flags: &'a [ParticleFlags],
    pub depth: Option<&'a [f32]>,
    pub groups: &'a GroupRegistry,
    pub contacts: &'a [ParticleContact],
    pub body_contacts: &'a [ParticleBodyContact<W::Body>],
    pub pairs: &'a [Pair],
    pub triads: &'a [Triad],
    pub tunables: &'a Tunables,
    pub step: Step,
    pub all_particle_flags: ParticleFlags,
    pub all_group_flags: GroupFlags,
}

/// Runs steps 11-12 of §4.G in the exact documented order, skipping a
/// stage entirely when its gating bit is absent from the cached
/// `allParticleFlags`/`allGroupFlags` (the point of caching them: most
/// scenes never set most flags, so most solvers are a single branch).
pub fn run<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    if ctx.all_particle_flags.contains(ParticleFlags::VISCOUS) {
        viscous::solve(ctx);
    }
    if ctx.all_particle_flags.contains(ParticleFlags::POWDER) {
        powder_solve(ctx);
    }
    if ctx.all_particle_flags.contains(ParticleFlags::TENSILE) {
        tensile::solve(ctx);
    }
    if ctx.all_particle_flags.contains(ParticleFlags::ELASTIC) {
        elastic::solve(ctx);
    }
    if ctx.all_particle_flags.contains(ParticleFlags::SPRING) {
        spring::solve(ctx);
    }
    if ctx.all_group_flags.contains(GroupFlags::SOLID) {
        solid::solve(ctx);
    }
    // color mixing writes the color buffer, not velocity; ParticleSystem::solve
    // drives it directly after `run` returns (see colormix::solve).
    pressure::solve(ctx);
    damping::solve(ctx);
}

/// Powder is small enough that it doesn't earn its own file: a single
/// repulsive term over particle-contacts whose weight exceeds the packing
/// threshold (§4.G).
fn powder_solve<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let threshold = 1.0 - crate::constants::PARTICLE_STRIDE;
    let critical_velocity = ctx.tunables.critical_velocity(ctx.step.inv_dt);
    for c in ctx.contacts {
        if c.weight <= threshold {
            continue;
        }
        let f = c.normal * (ctx.tunables.K_POWDER * critical_velocity * (c.weight - crate::constants::MIN_PARTICLE_WEIGHT));
        ctx.velocities[c.index_a] -= f;
        ctx.velocities[c.index_b] += f;
    }
}
