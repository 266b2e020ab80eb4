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

//! The parallel per-particle buffers (§4.A). `position`/`velocity`/`flags`/
//! `group` always exist; `color`, `user_data`, `depth` and `lifetime` are
//! materialized lazily on first write. Every buffer shares one capacity and
//! grows by the same doubling policy, clamped by whatever user-supplied caps
//! are active.

use bevy::math::Vec2;

use crate::constants::MIN_PARTICLE_BUFFER_CAPACITY;
use crate::flags::ParticleFlags;
use crate::particle::group::GroupId;

/// A column that is either freely growable or backed by a fixed-size,
/// user-supplied array that is never grown past its declared capacity.
enum Column<T: Clone> {
    Growable(Vec<T>),
    Fixed { data: Vec<T>, cap: usize },
}

impl<T: Clone> Column<T> {
    fn len_cap(&self) -> usize {
        match self {
            Column::Growable(v) => v.len(),
            Column::Fixed { cap, .. } => *cap,
        }
    }

    fn user_cap(&self) -> Option<usize> {
        match self {
            Column::Growable(_) => None,
            Column::Fixed { cap, .. } => Some(*cap),
        }
    }

    fn grow_to(&mut self, new_cap: usize, fill: T) {
        match self {
            Column::Growable(v) => {
                if new_cap > v.len() {
                    v.resize(new_cap, fill);
                }
            }
            Column::Fixed { .. } => {
                // user-supplied buffers never grow; capacity is the hard cap.
            }
        }
    }

    fn as_slice(&self) -> &[T] {
        match self {
            Column::Growable(v) => v,
            Column::Fixed { data, .. } => data,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Column::Growable(v) => v,
            Column::Fixed { data, .. } => data,
        }
    }
}

/// Owns every per-particle SoA column. `count` is the number of live slots
/// in use (including zombies, which still occupy a slot until the next
/// compaction pass); `capacity` is how many slots every column currently
/// provides.
pub struct ParticleBuffers {
    capacity: usize,
    count: usize,

    flags: Column<ParticleFlags>,
    position: Column<Vec2>,
    velocity: Column<Vec2>,
    group: Column<Option<GroupId>>,

    color: Option<Column<[u8; 4]>>,
    user_data: Option<Column<u64>>,
    depth: Option<Column<f32>>,
    /// Remaining lifetime in seconds, counted down each `solve`; `None`
    /// means the particle never expires on its own. Lazily materialized
    /// like `color`/`user_data`/`depth` since most scenes never use it.
    lifetime: Option<Column<f32>>,

    /// OR of every live particle's flags, recomputed once per step.
    pub all_particle_flags: ParticleFlags,
}

impl Default for ParticleBuffers {
    fn default() -> Self {
        ParticleBuffers {
            capacity: 0,
            count: 0,
            flags: Column::Growable(Vec::new()),
            position: Column::Growable(Vec::new()),
            velocity: Column::Growable(Vec::new()),
            group: Column::Growable(Vec::new()),
            color: None,
            user_data: None,
            depth: None,
            lifetime: None,
            all_particle_flags: ParticleFlags::empty(),
        }
    }
}

impl ParticleBuffers {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Supplies a fixed-capacity backing array for the position/velocity
    /// pair, or any lazily-materialized column, in place of the default
    /// growable `Vec`. Must be called before any particle is created.
    pub fn set_fixed_position_capacity(&mut self, cap: usize) {
        self.position = Column::Fixed {
            data: vec![Vec2::ZERO; cap],
            cap,
        };
    }

    pub fn set_fixed_velocity_capacity(&mut self, cap: usize) {
        self.velocity = Column::Fixed {
            data: vec![Vec2::ZERO; cap],
            cap,
        };
    }

    fn user_caps(&self) -> impl Iterator<Item = usize> + '_ {
        [
            self.flags.user_cap(),
            self.position.user_cap(),
            self.velocity.user_cap(),
            self.group.user_cap(),
            self.color.as_ref().and_then(Column::user_cap),
            self.user_data.as_ref().and_then(Column::user_cap),
            self.depth.as_ref().and_then(Column::user_cap),
            self.lifetime.as_ref().and_then(Column::user_cap),
        ]
        .into_iter()
        .flatten()
    }

    /// Ensures capacity for at least `needed` particles, following the
    /// doubling growth policy of §4.A. Returns `false` if `needed` exceeds
    /// the smallest user-supplied cap (a hard ceiling).
    pub fn ensure_capacity(&mut self, needed: usize) -> bool {
        if needed <= self.capacity {
            return true;
        }
        let min_user_cap = self.user_caps().min();
        if let Some(cap) = min_user_cap {
            if needed > cap {
                return false;
            }
        }
        let doubled = usize::max(self.capacity * 2, MIN_PARTICLE_BUFFER_CAPACITY);
        let new_cap = match min_user_cap {
            Some(cap) => usize::min(doubled, cap).max(needed),
            None => usize::max(doubled, needed),
        };

        self.flags.grow_to(new_cap, ParticleFlags::empty());
        self.position.grow_to(new_cap, Vec2::ZERO);
        self.velocity.grow_to(new_cap, Vec2::ZERO);
        self.group.grow_to(new_cap, None);
        if let Some(c) = &mut self.color {
            c.grow_to(new_cap, [0; 4]);
        }
        if let Some(c) = &mut self.user_data {
            c.grow_to(new_cap, 0);
        }
        if let Some(c) = &mut self.depth {
            c.grow_to(new_cap, 0.0);
        }
        if let Some(c) = &mut self.lifetime {
            c.grow_to(new_cap, f32::INFINITY);
        }
        self.capacity = new_cap;
        true
    }

    /// Allocates the next dense slot for a new particle. Returns `None` if
    /// capacity cannot be grown any further (caller maps this to
    /// `invalidParticleIndex`).
    pub fn allocate(&mut self) -> Option<usize> {
        if !self.ensure_capacity(self.count + 1) {
            return None;
        }
        let idx = self.count;
        self.count += 1;
        Some(idx)
    }

    pub fn flags(&self) -> &[ParticleFlags] {
        &self.flags.as_slice()[..self.count]
    }
    pub fn flags_mut(&mut self) -> &mut [ParticleFlags] {
        &mut self.flags.as_mut_slice()[..self.count]
    }
    pub fn position(&self) -> &[Vec2] {
        &self.position.as_slice()[..self.count]
    }
    pub fn position_mut(&mut self) -> &mut [Vec2] {
        &mut self.position.as_mut_slice()[..self.count]
    }
    pub fn velocity(&self) -> &[Vec2] {
        &self.velocity.as_slice()[..self.count]
    }
    pub fn velocity_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocity.as_mut_slice()[..self.count]
    }
    pub fn group(&self) -> &[Option<GroupId>] {
        &self.group.as_slice()[..self.count]
    }
    pub fn group_mut(&mut self) -> &mut [Option<GroupId>] {
        &mut self.group.as_mut_slice()[..self.count]
    }

    fn ensure_color(&mut self) {
        if self.color.is_none() {
            self.color = Some(Column::Growable(vec![[0; 4]; self.capacity]));
        }
    }
    fn ensure_user_data(&mut self) {
        if self.user_data.is_none() {
            self.user_data = Some(Column::Growable(vec![0; self.capacity]));
        }
    }
    fn ensure_depth(&mut self) {
        if self.depth.is_none() {
            self.depth = Some(Column::Growable(vec![0.0; self.capacity]));
        }
    }
    fn ensure_lifetime(&mut self) {
        if self.lifetime.is_none() {
            self.lifetime = Some(Column::Growable(vec![f32::INFINITY; self.capacity]));
        }
    }

    pub fn color_mut(&mut self) -> &mut [[u8; 4]] {
        self.ensure_color();
        &mut self.color.as_mut().unwrap().as_mut_slice()[..self.count]
    }
    pub fn color(&self) -> Option<&[[u8; 4]]> {
        self.color.as_ref().map(|c| &c.as_slice()[..self.count])
    }

    pub fn user_data_mut(&mut self) -> &mut [u64] {
        self.ensure_user_data();
        &mut self.user_data.as_mut().unwrap().as_mut_slice()[..self.count]
    }
    pub fn user_data(&self) -> Option<&[u64]> {
        self.user_data.as_ref().map(|c| &c.as_slice()[..self.count])
    }

    pub fn depth_mut(&mut self) -> &mut [f32] {
        self.ensure_depth();
        &mut self.depth.as_mut().unwrap().as_mut_slice()[..self.count]
    }
    pub fn depth(&self) -> Option<&[f32]> {
        self.depth.as_ref().map(|c| &c.as_slice()[..self.count])
    }

    pub fn lifetime_mut(&mut self) -> &mut [f32] {
        self.ensure_lifetime();
        &mut self.lifetime.as_mut().unwrap().as_mut_slice()[..self.count]
    }
    pub fn lifetime(&self) -> Option<&[f32]> {
        self.lifetime.as_ref().map(|c| &c.as_slice()[..self.count])
    }

    /// Borrows `position` and `velocity` at once. A plain `self.position()`
    /// next to `self.velocity_mut()` doesn't compile: each method call
    /// borrows all of `self.buffers`, not just its own field, even though the
    /// two columns never alias. Needed by every solver that reads position
    /// while writing velocity.
    pub fn position_velocity_mut(&mut self) -> (&[Vec2], &mut [Vec2]) {
        let count = self.count;
        (&self.position.as_slice()[..count], &mut self.velocity.as_mut_slice()[..count])
    }

    /// Same disjoint-borrow problem as [`Self::position_velocity_mut`], for
    /// the wall solver (reads flags, writes velocity).
    pub fn flags_velocity_mut(&mut self) -> (&[ParticleFlags], &mut [Vec2]) {
        let count = self.count;
        (&self.flags.as_slice()[..count], &mut self.velocity.as_mut_slice()[..count])
    }

    /// Everything a per-step solver stage needs out of the buffers at once:
    /// positions and flags to read, velocity to write, depth if a solid
    /// group has ever requested it.
    pub fn solve_views(&mut self) -> (&[Vec2], &mut [Vec2], &[ParticleFlags], Option<&[f32]>) {
        let count = self.count;
        (
            &self.position.as_slice()[..count],
            &mut self.velocity.as_mut_slice()[..count],
            &self.flags.as_slice()[..count],
            self.depth.as_ref().map(|c| &c.as_slice()[..count]),
        )
    }

    /// `v += dt * gravityScale * g`, then clamps `|v|` to `criticalVelocity`
    /// (§4.G step 4).
    pub fn integrate_gravity(&mut self, gravity: Vec2, dt: f32, gravity_scale: f32, critical_velocity: f32) {
        let delta = gravity * (dt * gravity_scale);
        for v in self.velocity_mut() {
            *v += delta;
            let len = v.length();
            if len > critical_velocity && len > f32::EPSILON {
                *v *= critical_velocity / len;
            }
        }
    }

    /// `p += dt * v` for every live particle (§4.G step 8).
    pub fn integrate_positions(&mut self, dt: f32) {
        let count = self.count;
        let positions = self.position.as_mut_slice();
        let velocities = self.velocity.as_slice();
        for i in 0..count {
            positions[i] += velocities[i] * dt;
        }
    }

    /// Counts down every particle's remaining lifetime by `dt` and zombies
    /// any particle whose lifetime has just crossed zero. A no-op until the
    /// first particle with a finite lifetime is created, since `lifetime`
    /// stays unmaterialized otherwise.
    pub fn tick_lifetimes(&mut self, dt: f32) {
        let Some(lifetime) = &mut self.lifetime else { return };
        let count = self.count;
        let lifetime = &mut lifetime.as_mut_slice()[..count];
        let flags = &mut self.flags.as_mut_slice()[..count];
        for i in 0..count {
            if lifetime[i].is_finite() {
                lifetime[i] -= dt;
                if lifetime[i] <= 0.0 {
                    flags[i].insert(ParticleFlags::ZOMBIE);
                }
            }
        }
    }

    /// Rotates every materialized column over `[start, end)`, moving the
    /// `[mid, end)` block to the front of the range (§4.F).
    pub fn rotate(&mut self, start: usize, mid: usize, end: usize) {
        if start >= mid || mid >= end {
            return;
        }
        let k = mid - start;
        self.flags.as_mut_slice()[start..end].rotate_left(k);
        self.position.as_mut_slice()[start..end].rotate_left(k);
        self.velocity.as_mut_slice()[start..end].rotate_left(k);
        self.group.as_mut_slice()[start..end].rotate_left(k);
        if let Some(c) = &mut self.color {
            c.as_mut_slice()[start..end].rotate_left(k);
        }
        if let Some(c) = &mut self.user_data {
            c.as_mut_slice()[start..end].rotate_left(k);
        }
        if let Some(c) = &mut self.depth {
            c.as_mut_slice()[start..end].rotate_left(k);
        }
        if let Some(c) = &mut self.lifetime {
            c.as_mut_slice()[start..end].rotate_left(k);
        }
    }

    /// Compacts every column down to the dense prefix described by
    /// `new_index` (`None` entries are dropped); `new_count` is the number
    /// of surviving particles.
    pub fn compact(&mut self, new_index: &[Option<usize>], new_count: usize) {
        fn compact_col<T: Clone>(col: &mut [T], new_index: &[Option<usize>]) {
            for (old, dest) in new_index.iter().enumerate() {
                if let Some(dest) = dest {
                    if *dest != old {
                        col[*dest] = col[old].clone();
                    }
                }
            }
        }
        compact_col(self.flags.as_mut_slice(), new_index);
        compact_col(self.position.as_mut_slice(), new_index);
        compact_col(self.velocity.as_mut_slice(), new_index);
        compact_col(self.group.as_mut_slice(), new_index);
        if let Some(c) = &mut self.color {
            compact_col(c.as_mut_slice(), new_index);
        }
        if let Some(c) = &mut self.user_data {
            compact_col(c.as_mut_slice(), new_index);
        }
        if let Some(c) = &mut self.depth {
            compact_col(c.as_mut_slice(), new_index);
        }
        if let Some(c) = &mut self.lifetime {
            compact_col(c.as_mut_slice(), new_index);
        }
        self.count = new_count;
    }
}
