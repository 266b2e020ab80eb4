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

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::ConfigError;

/// Sentinel returned by `create_particle` when the system is at capacity.
pub const INVALID_PARTICLE_INDEX: i32 = -1;

/// Bit width of each half of the proxy tag (§6 fixes these).
pub const X_TRUNC_BITS: i32 = 12;
pub const Y_TRUNC_BITS: i32 = 12;

/// Growth policy starts doubling from this many particle slots.
pub const MIN_PARTICLE_BUFFER_CAPACITY: usize = 256;

/// Contact weight is clamped to this range before being turned into pressure.
pub const MAX_PARTICLE_WEIGHT: f32 = 2.0;
pub const MIN_PARTICLE_WEIGHT: f32 = 0.0;

/// Inter-particle spacing during group filling, as a fraction of diameter.
pub const PARTICLE_STRIDE: f32 = 0.75;

/// Triads are only formed for edges shorter than `sqrt(MAX_TRIAD_DISTANCE_SQUARED) * diameter`.
pub const MAX_TRIAD_DISTANCE_SQUARED: f32 = 4.0;

/// Smallest squared distance two particle centers may have before the
/// `1/sqrt` used to build a contact normal is considered degenerate.
pub const DISTANCE_EPSILON_SQUARED: f32 = 1.0e-9;

/// Per-step, per-solver tunables plus the handful of fixed geometric
/// parameters (particle radius, density) that size every other constant
/// below. Loaded the same way the host's own config (`Tank`, `Constants`)
/// is: from a commented JSON fixture via [`config::read_json`].
#[allow(non_snake_case)]
#[derive(Resource, Serialize, Deserialize, Debug, Clone, Copy)]
pub struct Tunables {
    pub PARTICLE_RADIUS: f32,
    pub DENSITY: f32,
    pub GRAVITY_SCALE: f32,
    pub MAX_COUNT: usize,

    pub K_PRESSURE: f32,
    pub CRITICAL_PRESSURE_MULTIPLIER: f32,
    pub K_DAMPING: f32,
    pub K_VISCOUS: f32,
    pub K_POWDER: f32,
    pub K_TENSILE_A: f32,
    pub K_TENSILE_B: f32,
    pub K_ELASTIC: f32,
    pub K_SPRING: f32,
    pub K_EJECTION: f32,
    pub K_COLOR_MIXING: f32,
}

impl Default for Tunables {
    fn default() -> Self {
        Tunables {
            PARTICLE_RADIUS: 0.5,
            DENSITY: 1.0,
            GRAVITY_SCALE: 1.0,
            MAX_COUNT: 0, // 0 == unbounded (besides usize::MAX / doubling growth)

            K_PRESSURE: 0.2,
            CRITICAL_PRESSURE_MULTIPLIER: 1.0,
            K_DAMPING: 1.0,
            K_VISCOUS: 0.25,
            K_POWDER: 0.5,
            K_TENSILE_A: 0.2,
            K_TENSILE_B: 0.2,
            K_ELASTIC: 0.25,
            K_SPRING: 10.0,
            K_EJECTION: 0.5,
            K_COLOR_MIXING: 0.5,
        }
    }
}

impl Tunables {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        config::read_json(path)
    }

    /// Particle diameter derived from the configured radius.
    #[inline]
    pub fn diameter(&self) -> f32 {
        self.PARTICLE_RADIUS * 2.0
    }

    /// `getParticleInvMass` (§6): fixed geometric factor for disc packing.
    #[inline]
    pub fn particle_inv_mass(&self) -> f32 {
        let d = self.diameter();
        1.777_777_7 * (1.0 / self.DENSITY) * (1.0 / (d * d))
    }

    /// Largest velocity consistent with moving at most one cell per step.
    #[inline]
    pub fn critical_velocity(&self, inv_dt: f32) -> f32 {
        self.diameter() * inv_dt
    }

    #[inline]
    pub fn critical_pressure(&self, inv_dt: f32) -> f32 {
        self.DENSITY * self.critical_velocity(inv_dt) * self.critical_velocity(inv_dt)
            * self.CRITICAL_PRESSURE_MULTIPLIER
    }
}

impl FromWorld for Tunables {
    fn from_world(_world: &mut World) -> Self {
        Tunables::from_file("assets/particle_tunables.json").unwrap_or_else(|err| {
            warn!("particle_tunables.json unavailable ({err}), using defaults");
            Tunables::default()
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn particle_inv_mass_matches_fixed_geometric_factor() {
        let t = Tunables {
            PARTICLE_RADIUS: 0.5,
            DENSITY: 1.0,
            ..Tunables::default()
        };
        // diameter == 1.0 -> inv_mass == 1.7777777
        assert!((t.particle_inv_mass() - 1.777_777_7).abs() < 1e-5);
    }

    #[test]
    fn critical_velocity_is_diameter_over_dt() {
        let t = Tunables {
            PARTICLE_RADIUS: 0.5,
            ..Tunables::default()
        };
        assert!((t.critical_velocity(60.0) - 60.0).abs() < 1e-5);
    }
}
