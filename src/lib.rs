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

//! Core of a 2-D particle-based fluid/soft-body simulator that is embedded
//! inside a host rigid-body world. This crate owns the particle population,
//! the spatial-hash contact finder, the group/pair/triad bookkeeping and the
//! per-step solver pipeline; it never touches rigid bodies directly and only
//! talks to the host through [`host::RigidBodyWorld`].

pub mod config;
pub mod constants;
pub mod error;
pub mod flags;
pub mod particle;
pub mod plugin;

pub use config::read_json;
pub use constants::Tunables;
pub use error::ConfigError;
pub use flags::{GroupFlags, ParticleFlags};
pub use particle::{
    group::{GroupId, ParticleGroupDef},
    host::RigidBodyWorld,
    system::{ParticleDef, ParticleSystem, Step},
};
pub use plugin::ParticleSimPlugin;
