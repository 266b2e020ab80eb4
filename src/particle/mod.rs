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

//! The particle simulation core (§2). Every submodule here is a plain,
//! engine-agnostic building block; [`system`] assembles them into the
//! public `ParticleSystem` facade and [`crate::plugin`] is the only place
//! that talks bevy or bevy_rapier3d.

pub mod buffer;
pub mod compact;
pub mod contact;
pub mod group;
pub mod host;
pub mod pair_triad;
pub mod proxy;
pub mod query;
pub mod solver;
pub mod system;
pub mod voronoi;
