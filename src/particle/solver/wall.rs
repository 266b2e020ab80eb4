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

//! Wall particles (§4.G, step 7): infinitely massive and pinned, so their
//! velocity is zeroed right after gravity/collision and before the position
//! integration step picks it up.

use bevy::math::Vec2;

use crate::flags::ParticleFlags;

pub fn solve(flags: &[ParticleFlags], velocities: &mut [Vec2]) {
    for (f, v) in flags.iter().zip(velocities.iter_mut()) {
        if f.contains(ParticleFlags::WALL) {
            *v = Vec2::ZERO;
        }
    }
}
