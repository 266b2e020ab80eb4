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

//! The public facade (§5, §6, §7). `ParticleSystem` owns every buffer this
//! crate defines and wires them together into the fixed per-step pipeline
//! (§4.G); everything in `particle::*` besides this module is a building
//! block `ParticleSystem` assembles, never a caller-facing type on its own.

use bevy::log::warn;
use bevy::math::Vec2;

use crate::constants::{Tunables, INVALID_PARTICLE_INDEX};
use crate::flags::{GroupFlags, ParticleFlags};
use crate::particle::compact;
use crate::particle::contact::{self, ParticleBodyContact, ParticleContact};
use crate::particle::group::{self, GroupId, GroupRegistry, ParticleGroup, ParticleGroupDef, Transform2D};
use crate::particle::host::{Aabb, ParticleShape, RigidBodyWorld};
use crate::particle::pair_triad::{self, Pair, Triad};
use crate::particle::proxy::Proxy;
use crate::particle::query;
use crate::particle::solver::{self, SolveContext};
use crate::particle::buffer::ParticleBuffers;

/// One simulation tick, carried as both `dt` and its reciprocal since nearly
/// every solver needs `inv_dt` and computing it once avoids a division per
/// particle per stage.
#[derive(Clone, Copy, Debug)]
pub struct Step {
    pub dt: f32,
    pub inv_dt: f32,
}

impl Step {
    pub fn new(dt: f32) -> Self {
        Step { dt, inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 } }
    }
}

/// Parameters for `create_particle` (§6 `particleDef`). `lifetime` is this
/// crate's own addition (not in the original interface): `Some(seconds)`
/// zombies the particle automatically once it expires.
#[derive(Clone, Debug, Default)]
pub struct ParticleDef {
    pub flags: ParticleFlags,
    pub position: Vec2,
    pub velocity: Vec2,
    pub color: Option<[u8; 4]>,
    pub user_data: Option<u64>,
    pub lifetime: Option<f32>,
}

/// Owns the particle population and every derived structure (proxies,
/// contacts, pairs, triads, groups) and drives the fixed solver pipeline
/// each step. Generic over the host's [`RigidBodyWorld`] so the particle
/// core never names a concrete physics engine.
#[derive(bevy::prelude::Resource)]
pub struct ParticleSystem<W: RigidBodyWorld> {
    buffers: ParticleBuffers,
    proxies: Vec<Proxy>,
    contacts: Vec<ParticleContact>,
    body_contacts: Vec<ParticleBodyContact<W::Body>>,
    pairs: Vec<Pair>,
    triads: Vec<Triad>,
    groups: GroupRegistry,
    tunables: Tunables,
    all_group_flags: GroupFlags,
    timestamp: u64,
}

impl<W: RigidBodyWorld> ParticleSystem<W> {
    pub fn new(tunables: Tunables) -> Self {
        ParticleSystem {
            buffers: ParticleBuffers::default(),
            proxies: Vec::new(),
            contacts: Vec::new(),
            body_contacts: Vec::new(),
            pairs: Vec::new(),
            triads: Vec::new(),
            groups: GroupRegistry::default(),
            tunables,
            all_group_flags: GroupFlags::empty(),
            timestamp: 0,
        }
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn count(&self) -> usize {
        self.buffers.count()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn positions(&self) -> &[Vec2] {
        self.buffers.position()
    }

    pub fn velocities(&self) -> &[Vec2] {
        self.buffers.velocity()
    }

    pub fn flags(&self) -> &[ParticleFlags] {
        self.buffers.flags()
    }

    pub fn colors(&self) -> Option<&[[u8; 4]]> {
        self.buffers.color()
    }

    pub fn group_of(&self, index: usize) -> Option<GroupId> {
        self.buffers.group()[index]
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// `createParticle` (§6). Returns `invalidParticleIndex` if the system
    /// is already at its configured `MAX_COUNT`, or if buffer growth is
    /// otherwise exhausted (a fixed user-supplied capacity).
    pub fn create_particle(&mut self, def: ParticleDef) -> i32 {
        let max = self.tunables.MAX_COUNT;
        if max > 0 && self.buffers.count() >= max {
            return INVALID_PARTICLE_INDEX;
        }
        let Some(i) = self.buffers.allocate() else {
            return INVALID_PARTICLE_INDEX;
        };
        self.buffers.flags_mut()[i] = def.flags;
        self.buffers.position_mut()[i] = def.position;
        self.buffers.velocity_mut()[i] = def.velocity;
        self.buffers.group_mut()[i] = None;
        if let Some(c) = def.color {
            self.buffers.color_mut()[i] = c;
        }
        if let Some(u) = def.user_data {
            self.buffers.user_data_mut()[i] = u;
        }
        if let Some(l) = def.lifetime {
            self.buffers.lifetime_mut()[i] = l;
        }
        self.proxies.push(Proxy { index: i, tag: 0 });
        i as i32
    }

    /// `destroyParticle` (§6). Deferred: the particle stays live (index
    /// stable) until the next `solve` compacts it out.
    pub fn destroy_particle(&mut self, index: usize, call_destruction_listener: bool) {
        self.buffers.flags_mut()[index].insert(ParticleFlags::ZOMBIE);
        if call_destruction_listener {
            self.buffers.flags_mut()[index].insert(ParticleFlags::DESTRUCTION_LISTENER);
        }
    }

    /// `destroyParticlesInShape` (§6): broad-phases with our own proxy tag
    /// range (not the host world, since `ParticleShape` is a self-contained
    /// capability), then narrows with the shape's exact `test_point`.
    /// Returns the number of particles newly marked zombie.
    pub fn destroy_particles_in_shape<S: ParticleShape>(
        &mut self,
        shape: &S,
        transform: &Transform2D,
        call_destruction_listener: bool,
    ) -> usize {
        let positions = self.buffers.position().to_vec();
        let flags = self.buffers.flags().to_vec();
        let mut hits = Vec::new();
        for child in 0..shape.child_count() {
            let aabb = shape.compute_aabb(transform, child);
            query::query_aabb(&self.proxies, &positions, aabb, self.tunables.diameter(), |i| {
                if !flags[i].contains(ParticleFlags::ZOMBIE) && shape.test_point(transform, positions[i]) {
                    hits.push(i);
                }
                true
            });
        }
        for &i in &hits {
            self.destroy_particle(i, call_destruction_listener);
        }
        hits.len()
    }

    /// `createParticleGroup` (§6, §4.D). Fills `shape` with a grid of
    /// particles at `PARTICLE_STRIDE * diameter` spacing, registers the
    /// group, and builds whatever pairs/triads/depth that group's flags
    /// call for.
    pub fn create_particle_group<S: ParticleShape>(&mut self, def: &ParticleGroupDef, shape: &S) -> GroupId {
        let stride = crate::constants::PARTICLE_STRIDE * self.tunables.diameter();
        let first = self.buffers.count();

        for child in 0..shape.child_count() {
            let aabb = shape.compute_aabb(&def.transform, child);
            let mut y = aabb.lower.y;
            while y <= aabb.upper.y {
                let mut x = aabb.lower.x;
                while x <= aabb.upper.x {
                    let p = Vec2::new(x, y);
                    if shape.test_point(&def.transform, p) {
                        let r = p - def.transform.position;
                        let velocity = def.linear_velocity + Vec2::new(-def.angular_velocity * r.y, def.angular_velocity * r.x);
                        if self.create_particle(ParticleDef {
                            flags: def.flags,
                            position: p,
                            velocity,
                            color: def.color,
                            user_data: def.user_data,
                            lifetime: None,
                        }) == INVALID_PARTICLE_INDEX
                        {
                            warn!("createParticleGroup: particle capacity exhausted while filling shape");
                        }
                    }
                    x += stride;
                }
                y += stride;
            }
        }

        let last = self.buffers.count();
        let id = self.groups.insert(ParticleGroup {
            first_index: first,
            last_index: last,
            flags: def.group_flags,
            strength: def.strength,
            transform: def.transform,
            destroy_automatically: def.destroy_automatically,
            to_be_destroyed: false,
            to_be_split: false,
        });
        for i in first..last {
            self.buffers.group_mut()[i] = Some(id);
        }
        self.all_group_flags |= def.group_flags;

        self.build_group_constraints(id, first, last);
        id
    }

    /// Pairs/triads/depth for a freshly filled or freshly merged group,
    /// restricted to contacts whose both endpoints fall in `[first, last)`
    /// (§4.D). Shared by `create_particle_group` and `join_particle_groups`;
    /// the latter additionally filters to the straddling subset.
    fn build_group_constraints(&mut self, id: GroupId, first: usize, last: usize) {
        self.refresh_contacts();
        let group = self.groups.get(id).clone();
        let positions = self.buffers.position().to_vec();
        let flags = self.buffers.flags().to_vec();
        let strength = group.strength;
        let diameter = self.tunables.diameter();

        let local_contacts: Vec<ParticleContact> = self
            .contacts
            .iter()
            .filter(|c| c.index_a >= first && c.index_a < last && c.index_b >= first && c.index_b < last)
            .cloned()
            .collect();

        let new_pairs = pair_triad::create_pairs(&local_contacts, &positions, |_, _| strength, |_| Some(id));
        self.pairs.extend(new_pairs);

        if (first..last).any(|i| flags[i].contains(ParticleFlags::ELASTIC)) {
            let members: Vec<usize> = (first..last).collect();
            let new_triads = pair_triad::create_triads(&members, &positions, &flags, |_, _, _| strength, diameter);
            self.triads.extend(new_triads);
        }

        if group.flags.contains(GroupFlags::SOLID) {
            let mut depth_buf = self.buffers.depth_mut().to_vec();
            solver::depth::compute_for_group(&local_contacts, first, last, diameter, &mut depth_buf);
            self.buffers.depth_mut().copy_from_slice(&depth_buf);
        }
    }

    /// `destroyParticleGroup` (§6): zombies every current member and removes
    /// the group entry immediately, rather than waiting for the next
    /// compaction (nothing besides the zombie flag needs the group's range
    /// to stay meaningful in the meantime). Panics on an unknown id, per the
    /// source's "programmer error" assertion.
    pub fn destroy_particle_group(&mut self, id: GroupId) {
        let group = self.groups.remove(id).expect("destroyParticleGroup: unknown group");
        for i in group.first_index..group.last_index {
            self.buffers.flags_mut()[i].insert(ParticleFlags::ZOMBIE);
            self.buffers.group_mut()[i] = None;
        }
        self.recompute_all_group_flags();
    }

    /// `joinParticleGroups` (§4.F): rotates the live buffer so `a` and `b`
    /// become contiguous, merges `b`'s range and flags into `a`, and rebuilds
    /// constraints restricted to triples that straddle the old boundary.
    pub fn join_particle_groups(&mut self, a: GroupId, b: GroupId) -> GroupId {
        assert!(a != b, "joinParticleGroups requires distinct groups");

        let (mut keep, mut drop) = (a, b);
        if self.groups.get(keep).first_index > self.groups.get(drop).first_index {
            std::mem::swap(&mut keep, &mut drop);
        }

        let keep_range = {
            let g = self.groups.get(keep);
            (g.first_index, g.last_index)
        };
        let drop_range = {
            let g = self.groups.get(drop);
            (g.first_index, g.last_index)
        };

        if keep_range.1 != drop_range.0 {
            self.rotate_range(keep_range.1, drop_range.0, drop_range.1);
        }

        let boundary = keep_range.1; // particles >= boundary came from `drop` after rotation
        let merged_last = {
            let g = self.groups.get(drop);
            g.last_index
        };

        {
            let merged_flags = self.groups.get(drop).flags;
            let g = self.groups.get_mut(keep);
            g.last_index = merged_last;
            g.flags |= merged_flags;
        }
        for i in keep_range.0..merged_last {
            self.buffers.group_mut()[i] = Some(keep);
        }
        self.groups.remove(drop);
        self.recompute_all_group_flags();

        self.build_straddling_constraints(keep, keep_range.0, merged_last, boundary);
        keep
    }

    /// Like [`Self::build_group_constraints`] but restricted to pairs/triads
    /// that straddle `boundary` (§4.D Join: "the same two tests restricted
    /// to triples that straddle the boundary between group A and group B"),
    /// since non-straddling constraints already exist from each group's own
    /// creation and must not be duplicated.
    fn build_straddling_constraints(&mut self, id: GroupId, first: usize, last: usize, boundary: usize) {
        self.refresh_contacts();
        let group = self.groups.get(id).clone();
        let positions = self.buffers.position().to_vec();
        let flags = self.buffers.flags().to_vec();
        let strength = group.strength;
        let diameter = self.tunables.diameter();

        let local_contacts: Vec<ParticleContact> = self
            .contacts
            .iter()
            .filter(|c| c.index_a >= first && c.index_a < last && c.index_b >= first && c.index_b < last)
            .cloned()
            .collect();

        let straddling_contacts: Vec<ParticleContact> = local_contacts
            .iter()
            .filter(|c| (c.index_a < boundary) != (c.index_b < boundary))
            .cloned()
            .collect();
        let new_pairs = pair_triad::create_pairs(&straddling_contacts, &positions, |_, _| strength, |_| Some(id));
        self.pairs.extend(new_pairs);

        if (first..last).any(|i| flags[i].contains(ParticleFlags::ELASTIC)) {
            let members: Vec<usize> = (first..last).collect();
            let mut new_triads = pair_triad::create_triads(&members, &positions, &flags, |_, _, _| strength, diameter);
            new_triads.retain(|t| {
                let below = [t.index_a, t.index_b, t.index_c].iter().filter(|&&i| i < boundary).count();
                below == 1 || below == 2
            });
            self.triads.extend(new_triads);
        }

        if group.flags.contains(GroupFlags::SOLID) {
            let mut depth_buf = self.buffers.depth_mut().to_vec();
            solver::depth::compute_for_group(&local_contacts, first, last, diameter, &mut depth_buf);
            self.buffers.depth_mut().copy_from_slice(&depth_buf);
        }
    }

    /// Rotates the live buffer over `[start, end)`, moving `[mid, end)` to
    /// the front, and remaps every index-carrying structure through the same
    /// rotation (§4.F): proxies, both contact kinds, pairs, triads, and
    /// every group's `[first_index, last_index)`.
    fn rotate_range(&mut self, start: usize, mid: usize, end: usize) {
        if start >= mid || mid >= end {
            return;
        }
        self.buffers.rotate(start, mid, end);
        let remap = |i: usize| group::rotate_index(i, start, mid, end);

        for p in &mut self.proxies {
            p.index = remap(p.index);
        }
        for c in &mut self.contacts {
            c.index_a = remap(c.index_a);
            c.index_b = remap(c.index_b);
        }
        for bc in &mut self.body_contacts {
            bc.index = remap(bc.index);
        }
        for p in &mut self.pairs {
            p.index_a = remap(p.index_a);
            p.index_b = remap(p.index_b);
        }
        for t in &mut self.triads {
            t.index_a = remap(t.index_a);
            t.index_b = remap(t.index_b);
            t.index_c = remap(t.index_c);
        }
        for (_, g) in self.groups.iter_mut() {
            g.first_index = remap(g.first_index);
            g.last_index = remap(g.last_index);
        }
    }

    fn refresh_contacts(&mut self) {
        let diameter = self.tunables.diameter();
        let positions = self.buffers.position().to_vec();
        let flags = self.buffers.flags().to_vec();
        self.contacts = contact::update_contacts(&mut self.proxies, &positions, &flags, diameter, false);
    }

    fn recompute_all_particle_flags(&mut self) {
        let mut all = ParticleFlags::empty();
        for f in self.buffers.flags() {
            all |= *f;
        }
        self.buffers.all_particle_flags = all;
    }

    fn recompute_all_group_flags(&mut self) {
        let mut all = GroupFlags::empty();
        for (_, g) in self.groups.iter() {
            all |= g.flags;
        }
        self.all_group_flags = all;
    }

    /// Sweeps zombie particles out of every buffer and index-carrying
    /// structure (§4.H), destroying or shrinking groups as needed.
    fn compact(&mut self) {
        let (remap, new_count) = compact::build_remap(self.buffers.flags());
        self.buffers.compact(&remap, new_count);
        compact::remap_groups(&mut self.groups, &remap);
        compact::sweep_flagged_groups(&mut self.groups);

        self.proxies.retain_mut(|p| match compact::remap_index(&remap, p.index) {
            Some(i) => {
                p.index = i;
                true
            }
            None => false,
        });
        self.contacts.retain_mut(|c| {
            match (compact::remap_index(&remap, c.index_a), compact::remap_index(&remap, c.index_b)) {
                (Some(a), Some(b)) => {
                    c.index_a = a;
                    c.index_b = b;
                    true
                }
                _ => false,
            }
        });
        self.body_contacts.retain_mut(|bc| match compact::remap_index(&remap, bc.index) {
            Some(i) => {
                bc.index = i;
                true
            }
            None => false,
        });
        self.pairs.retain_mut(|p| {
            match (compact::remap_index(&remap, p.index_a), compact::remap_index(&remap, p.index_b)) {
                (Some(a), Some(b)) => {
                    p.index_a = a;
                    p.index_b = b;
                    true
                }
                _ => false,
            }
        });
        self.triads.retain_mut(|t| {
            match (
                compact::remap_index(&remap, t.index_a),
                compact::remap_index(&remap, t.index_b),
                compact::remap_index(&remap, t.index_c),
            ) {
                (Some(a), Some(b), Some(c)) => {
                    t.index_a = a;
                    t.index_b = b;
                    t.index_c = c;
                    true
                }
                _ => false,
            }
        });
        self.recompute_all_group_flags();
    }

    /// Advances the simulation by one step, running the fixed pipeline of
    /// §4.G in order. A no-op on an empty system.
    /// Runs one full tick (§4.G). Generic separately from the struct's own
    /// `W`: the struct only needs a fixed `Body` handle type to keep
    /// `body_contacts` nameable as a long-lived field, while the concrete
    /// world passed in here can carry a fresh borrow every call (the way
    /// `crate::plugin::RapierWorld` is rebuilt once per `Update` tick from
    /// that tick's system params).
    pub fn solve<H>(&mut self, world: &mut H, step: Step)
    where
        H: RigidBodyWorld<Body = W::Body>,
    {
        self.timestamp += 1;
        if self.buffers.count() == 0 {
            return;
        }

        self.buffers.tick_lifetimes(step.dt);
        self.recompute_all_particle_flags();
        if self.buffers.all_particle_flags.contains(ParticleFlags::ZOMBIE) {
            self.compact();
        }
        if self.buffers.count() == 0 {
            return;
        }
        self.recompute_all_particle_flags();

        let diameter = self.tunables.diameter();
        let gravity = world.gravity();
        let inv_dt = step.inv_dt;
        let critical_velocity = self.tunables.critical_velocity(inv_dt);
        self.buffers
            .integrate_gravity(gravity, step.dt, self.tunables.GRAVITY_SCALE, critical_velocity);

        let particle_inv_mass = self.tunables.particle_inv_mass();
        {
            let (positions, velocities) = self.buffers.position_velocity_mut();
            solver::collision::solve(world, &self.proxies, positions, velocities, particle_inv_mass, diameter, step);
        }

        if self.all_group_flags.contains(GroupFlags::RIGID) {
            let (positions, velocities) = self.buffers.position_velocity_mut();
            solver::rigid::solve(&mut self.groups, positions, velocities, step);
        }

        if self.buffers.all_particle_flags.contains(ParticleFlags::WALL) {
            let (flags, velocities) = self.buffers.flags_velocity_mut();
            solver::wall::solve(flags, velocities);
        }

        self.buffers.integrate_positions(step.dt);

        {
            let positions = self.buffers.position();
            let flags = self.buffers.flags();
            self.body_contacts = contact::update_body_contacts(world, &self.proxies, positions, flags, particle_inv_mass, diameter);
        }

        {
            let positions = self.buffers.position().to_vec();
            let flags = self.buffers.flags().to_vec();
            self.contacts = contact::update_contacts(&mut self.proxies, &positions, &flags, diameter, false);
        }

        {
            let all_particle_flags = self.buffers.all_particle_flags;
            let all_group_flags = self.all_group_flags;
            let (positions, velocities, flags, depth) = self.buffers.solve_views();
            let mut ctx = SolveContext {
                world,
                positions,
                velocities,
                flags,
                depth,
                groups: &self.groups,
                contacts: &self.contacts,
                body_contacts: &self.body_contacts,
                pairs: &self.pairs,
                triads: &self.triads,
                tunables: &self.tunables,
                step,
                all_particle_flags,
                all_group_flags,
            };
            solver::run(&mut ctx);
        }

        if self.buffers.all_particle_flags.contains(ParticleFlags::COLOR_MIXING) {
            let flags = self.buffers.flags().to_vec();
            let k_mix = self.tunables.K_COLOR_MIXING;
            let colors = self.buffers.color_mut();
            solver::colormix::solve(&self.contacts, &flags, colors, k_mix);
        }
    }

    /// `queryAABB` (§6 Outbound): invokes `callback(index)` for every live
    /// particle inside `aabb`.
    pub fn query_aabb(&self, aabb: Aabb, callback: impl FnMut(usize) -> bool) {
        query::query_aabb(&self.proxies, self.buffers.position(), aabb, self.tunables.diameter(), callback);
    }

    /// `raycast` (§6 Outbound): see [`query::ray_cast`] for the callback
    /// contract (return value tightens or stops the search window).
    pub fn ray_cast(&self, p1: Vec2, p2: Vec2, callback: impl FnMut(usize, Vec2, Vec2, f32) -> f32) {
        query::ray_cast(&self.proxies, self.buffers.position(), self.tunables.diameter(), p1, p2, callback);
    }

    /// `computeParticleCollisionEnergy` (§6 Outbound): `½ m Σ (v·n)²` summed
    /// over every particle-particle contact currently approaching each
    /// other, using the fixed per-particle mass.
    pub fn compute_particle_collision_energy(&self) -> f32 {
        let inv_mass = self.tunables.particle_inv_mass();
        if inv_mass <= 0.0 {
            return 0.0;
        }
        let mass = 1.0 / inv_mass;
        let velocities = self.buffers.velocity();
        let mut sum = 0.0f32;
        for c in &self.contacts {
            let v_rel = velocities[c.index_b] - velocities[c.index_a];
            let vn = v_rel.dot(c.normal);
            if vn < 0.0 {
                sum += vn * vn;
            }
        }
        0.5 * mass * sum
    }
}
