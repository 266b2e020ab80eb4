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

//! Tensile (surface tension) solver (§4.G). Two passes over the contact
//! list: the first accumulates each particle's weight and a signed normal
//! sum, the second turns those into a per-contact force so that particles on
//! a free surface are drawn together along it.

use bevy::math::Vec2;

use crate::flags::ParticleFlags;
use crate::particle::host::RigidBodyWorld;

use super::SolveContext;

pub fn solve<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let n = ctx.positions.len();
    let mut weight = vec![0.0f32; n];
    let mut normal_sum = vec![Vec2::ZERO; n];

    for c in ctx.contacts {
        if !c.flags.contains(ParticleFlags::TENSILE) {
            continue;
        }
        weight[c.index_a] += c.weight;
        weight[c.index_b] += c.weight;
        let s = c.normal * ((1.0 - c.weight) * c.weight);
        normal_sum[c.index_a] -= s;
        normal_sum[c.index_b] += s;
    }

    let k_a = ctx.tunables.K_TENSILE_A;
    let k_b = ctx.tunables.K_TENSILE_B;
    for c in ctx.contacts {
        if !c.flags.contains(ParticleFlags::TENSILE) {
            continue;
        }
        let h = weight[c.index_a] + weight[c.index_b];
        let s = normal_sum[c.index_b] - normal_sum[c.index_a];
        let f = c.normal * ((k_a * (h - 2.0) + k_b * s.dot(c.normal)) * c.weight);
        ctx.velocities[c.index_a] -= f;
        ctx.velocities[c.index_b] += f;
    }
}
