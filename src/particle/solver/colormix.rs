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

//! Color mixing solver (§4.G). Exchanges a fixed-point fraction of each RGBA
//! channel between the two ends of a contact where both are flagged
//! color-mixing. This mutates the (lazily materialized) color buffer rather
//! than velocity, so it is driven straight from [`crate::particle::system::ParticleSystem`]
//! rather than through [`super::SolveContext`] (which has no write access to color).

use crate::flags::ParticleFlags;
use crate::particle::contact::ParticleContact;

/// `k_mix` applied in fixed point (`>>8` after `*256*k_mix`, per §4.G) so the
/// exchange can't overshoot and flip which side is brighter.
pub fn solve(contacts: &[ParticleContact], flags: &[ParticleFlags], colors: &mut [[u8; 4]], k_mix: f32) {
    let scale = (256.0 * k_mix).round() as i32;
    for c in contacts {
        if !(flags[c.index_a].contains(ParticleFlags::COLOR_MIXING)
            && flags[c.index_b].contains(ParticleFlags::COLOR_MIXING))
        {
            continue;
        }
        for ch in 0..4 {
            let a = colors[c.index_a][ch] as i32;
            let b = colors[c.index_b][ch] as i32;
            let delta = ((b - a) * scale) >> 8;
            colors[c.index_a][ch] = (a + delta).clamp(0, 255) as u8;
            colors[c.index_b][ch] = (b - delta).clamp(0, 255) as u8;
        }
    }
}
