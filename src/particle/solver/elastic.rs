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

//! Elastic triad solver (§4.G). Recovers the rigid rotation that best
//! matches the triad's current (velocity-projected) shape to its reference
//! shape at creation, then nudges each vertex's velocity toward the
//! rotated-and-recentered reference position.

use bevy::math::Vec2;

use crate::flags::ParticleFlags;
use crate::particle::host::RigidBodyWorld;

use super::SolveContext;

/// Rotates `v` by the unit complex number `(cos, sin)`.
fn rotate(v: Vec2, cos: f32, sin: f32) -> Vec2 {
    Vec2::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y)
}

pub fn solve<W: RigidBodyWorld>(ctx: &mut SolveContext<W>) {
    let strength = ctx.step.inv_dt * ctx.tunables.K_ELASTIC;

    for t in ctx.triads {
        if !t.flags.contains(ParticleFlags::ELASTIC) {
            continue;
        }
        // Project each vertex forward by its current velocity (the triad
        // solves against where the particle is *about to be*, matching the
        // other solvers' convention of writing directly into velocity ahead
        // of the position integration step) and recenter on the new centroid.
        let pa = ctx.positions[t.index_a] + ctx.velocities[t.index_a] * ctx.step.dt;
        let pb = ctx.positions[t.index_b] + ctx.velocities[t.index_b] * ctx.step.dt;
        let pc = ctx.positions[t.index_c] + ctx.velocities[t.index_c] * ctx.step.dt;
        let centroid = (pa + pb + pc) / 3.0;
        let (qa, qb, qc) = (pa - centroid, pb - centroid, pc - centroid);

        // best-fit rotation: each vertex's contribution is weighted by its
        // squared reference-offset length (ka/kb/kc), so vertices farther
        // from the centroid dominate the rotation estimate.
        let sin = t.ka * t.pa.perp_dot(qa) + t.kb * t.pb.perp_dot(qb) + t.kc * t.pc.perp_dot(qc);
        let cos = t.ka * t.pa.dot(qa) + t.kb * t.pb.dot(qb) + t.kc * t.pc.dot(qc);
        let mag = (sin * sin + cos * cos).sqrt();
        if mag <= f32::EPSILON {
            continue;
        }
        let (sin, cos) = (sin / mag, cos / mag);

        let k = strength * t.strength;
        ctx.velocities[t.index_a] += (rotate(t.pa, cos, sin) + centroid - pa) * k;
        ctx.velocities[t.index_b] += (rotate(t.pb, cos, sin) + centroid - pb) * k;
        ctx.velocities[t.index_c] += (rotate(t.pc, cos, sin) + centroid - pc) * k;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::Tunables;
    use crate::particle::group::GroupRegistry;
    use crate::particle::host::NullWorld;
    use crate::particle::pair_triad::Triad;
    use crate::particle::system::Step;

    fn reference_triad() -> Triad {
        // equilateral-ish triangle, reference offsets about its own centroid.
        let (pa, pb, pc) = (Vec2::new(0.0, 1.0), Vec2::new(-1.0, -1.0), Vec2::new(1.0, -1.0));
        Triad {
            index_a: 0,
            index_b: 1,
            index_c: 2,
            flags: ParticleFlags::ELASTIC,
            strength: 1.0,
            pa,
            pb,
            pc,
            ka: pa.length_squared(),
            kb: pb.length_squared(),
            kc: pc.length_squared(),
            s: 1.0,
        }
    }

    #[test]
    fn undeformed_triad_produces_no_correction() {
        let triad = reference_triad();
        let positions = vec![triad.pa, triad.pb, triad.pc];
        let mut velocities = vec![Vec2::ZERO; 3];
        let flags = vec![ParticleFlags::ELASTIC; 3];
        let groups = GroupRegistry::default();
        let triads = vec![triad];
        let tunables = Tunables::default();
        let mut world = NullWorld;
        let mut ctx = SolveContext {
            world: &mut world,
            positions: &positions,
            velocities: &mut velocities,
            flags: &flags,
            depth: None,
            groups: &groups,
            contacts: &[],
            body_contacts: &[],
            pairs: &[],
            triads: &triads,
            tunables: &tunables,
            step: Step { dt: 1.0 / 60.0, inv_dt: 60.0 },
            all_particle_flags: ParticleFlags::ELASTIC,
            all_group_flags: crate::flags::GroupFlags::empty(),
        };
        solve(&mut ctx);
        for v in &velocities {
            assert!(v.length() < 1e-4, "expected near-zero correction, got {v:?}");
        }
    }

    #[test]
    fn stretched_triad_gets_corrective_velocity() {
        let triad = reference_triad();
        // scale the triangle up by 1.5x: shape-matching should pull it back.
        let positions = vec![triad.pa * 1.5, triad.pb * 1.5, triad.pc * 1.5];
        let mut velocities = vec![Vec2::ZERO; 3];
        let flags = vec![ParticleFlags::ELASTIC; 3];
        let groups = GroupRegistry::default();
        let triads = vec![triad];
        let tunables = Tunables::default();
        let mut world = NullWorld;
        let mut ctx = SolveContext {
            world: &mut world,
            positions: &positions,
            velocities: &mut velocities,
            flags: &flags,
            depth: None,
            groups: &groups,
            contacts: &[],
            body_contacts: &[],
            pairs: &[],
            triads: &triads,
            tunables: &tunables,
            step: Step { dt: 1.0 / 60.0, inv_dt: 60.0 },
            all_particle_flags: ParticleFlags::ELASTIC,
            all_group_flags: crate::flags::GroupFlags::empty(),
        };
        solve(&mut ctx);
        // vertex a sits above the centroid; over-stretched, correction pulls it down.
        assert!(velocities[0].y < 0.0);
    }
}
