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

//! Group registry (§4.F). Groups are kept in a flat slab with a free list
//! rather than the source's intrusive doubly-linked list: §9 explicitly
//! allows either representation since `prev`/`next` are not observable.

use bevy::math::Vec2;

use crate::flags::GroupFlags;

/// Opaque handle into the group slab. Stable across compaction (the slab
/// slot doesn't move; only the `first_index..last_index` range it points at
/// does).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) usize);

/// A 2-D rigid transform `(position, angle)`, used both to place a freshly
/// filled group and as the frame a rigid group is advanced through each
/// step.
#[derive(Clone, Copy, Debug)]
pub struct Transform2D {
    pub position: Vec2,
    pub angle: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Transform2D {
            position: Vec2::ZERO,
            angle: 0.0,
        }
    }
}

impl Transform2D {
    pub fn apply(&self, local: Vec2) -> Vec2 {
        let (s, c) = self.angle.sin_cos();
        let rotated = Vec2::new(
            c * local.x - s * local.y,
            s * local.x + c * local.y,
        );
        rotated + self.position
    }
}

#[derive(Clone, Debug)]
pub struct ParticleGroup {
    pub first_index: usize,
    pub last_index: usize,
    pub flags: GroupFlags,
    pub strength: f32,
    pub transform: Transform2D,
    pub destroy_automatically: bool,
    pub to_be_destroyed: bool,
    pub to_be_split: bool,
}

impl ParticleGroup {
    pub fn count(&self) -> usize {
        self.last_index - self.first_index
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.first_index && index < self.last_index
    }
}

/// Parameters for `create_particle_group` (§6 `groupDef`). `shape` is passed
/// as a separate generic argument to the call rather than stored here, since
/// `ParticleShape` isn't object-safe-friendly in a way worth boxing for a
/// one-shot fill.
#[derive(Clone, Debug)]
pub struct ParticleGroupDef {
    pub flags: crate::flags::ParticleFlags,
    pub group_flags: GroupFlags,
    pub transform: Transform2D,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub strength: f32,
    pub color: Option<[u8; 4]>,
    pub user_data: Option<u64>,
    pub destroy_automatically: bool,
}

impl Default for ParticleGroupDef {
    fn default() -> Self {
        ParticleGroupDef {
            flags: crate::flags::ParticleFlags::empty(),
            group_flags: GroupFlags::empty(),
            transform: Transform2D::default(),
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            strength: 1.0,
            color: None,
            user_data: None,
            destroy_automatically: true,
        }
    }
}

#[derive(Default)]
pub struct GroupRegistry {
    slots: Vec<Option<ParticleGroup>>,
    free: Vec<usize>,
}

impl GroupRegistry {
    pub fn insert(&mut self, group: ParticleGroup) -> GroupId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(group);
            GroupId(slot)
        } else {
            self.slots.push(Some(group));
            GroupId(self.slots.len() - 1)
        }
    }

    pub fn remove(&mut self, id: GroupId) -> Option<ParticleGroup> {
        let g = self.slots[id.0].take();
        if g.is_some() {
            self.free.push(id.0);
        }
        g
    }

    pub fn get(&self, id: GroupId) -> &ParticleGroup {
        self.slots[id.0].as_ref().expect("dangling GroupId")
    }

    pub fn get_mut(&mut self, id: GroupId) -> &mut ParticleGroup {
        self.slots[id.0].as_mut().expect("dangling GroupId")
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &ParticleGroup)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.as_ref().map(|g| (GroupId(i), g)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (GroupId, &mut ParticleGroup)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, g)| g.as_mut().map(|g| (GroupId(i), g)))
    }

    pub fn ids(&self) -> Vec<GroupId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|g| g.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Maps index `i` through a rotation of `[start, end)` that moves the block
/// `[mid, end)` to the front of the range (§4.F). Indices outside the range
/// are unaffected.
pub fn rotate_index(i: usize, start: usize, mid: usize, end: usize) -> usize {
    if i < start || i >= end {
        i
    } else if i < mid {
        i + (end - mid)
    } else {
        i - (mid - start)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_group(first: usize, last: usize) -> ParticleGroup {
        ParticleGroup {
            first_index: first,
            last_index: last,
            flags: GroupFlags::empty(),
            strength: 1.0,
            transform: Transform2D::default(),
            destroy_automatically: true,
            to_be_destroyed: false,
            to_be_split: false,
        }
    }

    #[test]
    fn rotate_index_matches_spec_piecewise_definition() {
        let (start, mid, end) = (2, 5, 9);
        for i in 0..12 {
            let expected = if i < start || i >= end {
                i
            } else if i < mid {
                i + (end - mid)
            } else {
                i + start - mid
            };
            assert_eq!(rotate_index(i, start, mid, end), expected, "i={i}");
        }
    }

    #[test]
    fn rotate_then_inverse_rotate_is_identity() {
        let (start, mid, end) = (1, 4, 7);
        for i in 0..10 {
            let rotated = rotate_index(i, start, mid, end);
            // the inverse rotation swaps the roles of the two halves: the
            // moved block now occupies [start, start+(end-mid)).
            let new_mid = start + (end - mid);
            let restored = rotate_index(rotated, start, new_mid, end);
            assert_eq!(restored, i);
        }
    }

    #[test]
    fn registry_reuses_freed_slots() {
        let mut reg = GroupRegistry::default();
        let a = reg.insert(sample_group(0, 3));
        let b = reg.insert(sample_group(3, 5));
        reg.remove(a);
        let c = reg.insert(sample_group(0, 2));
        assert_eq!(c.0, a.0);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(b).first_index, 3);
    }
}
