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

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-particle bitset (§3). Any subset may be set simultaneously; the
    /// OR of every live particle's flags is cached each step as
    /// `allParticleFlags` so solvers can skip entirely when their bit is
    /// never set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ParticleFlags: u32 {
        const ZOMBIE               = 1 << 0;
        const DESTRUCTION_LISTENER  = 1 << 1;
        const WALL                 = 1 << 2;
        const SPRING                = 1 << 3;
        const ELASTIC                = 1 << 4;
        const VISCOUS                = 1 << 5;
        const POWDER                 = 1 << 6;
        const TENSILE                = 1 << 7;
        const COLOR_MIXING           = 1 << 8;
    }
}

bitflags! {
    /// Per-group bitset (§3). `groupFlags ⊇ {solid, rigid}`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct GroupFlags: u32 {
        const SOLID = 1 << 0;
        const RIGID = 1 << 1;
    }
}

impl ParticleFlags {
    /// Flags that cause a spring [`Pair`](crate::particle::pair_triad::Pair) to be created
    /// between two contacting particles (§4.D).
    pub const PAIR_FLAGS: ParticleFlags = ParticleFlags::SPRING;

    /// Flags that cause an elastic [`Triad`](crate::particle::pair_triad::Triad) to be
    /// considered for a group of particles (§4.D).
    pub const TRIAD_FLAGS: ParticleFlags = ParticleFlags::ELASTIC;
}
