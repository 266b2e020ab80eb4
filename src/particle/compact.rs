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

//! Zombie compaction (§4.H). Particles flagged for destruction are not
//! removed immediately (indices must stay stable for the rest of the step
//! that killed them); instead they accumulate the `ZOMBIE` flag and are
//! swept out in one dense pass at the end of the step.

use crate::flags::{GroupFlags, ParticleFlags};
use crate::particle::group::{GroupId, GroupRegistry};

/// Computes a dense `old -> new` index remap from a per-particle zombie
/// mask. Surviving particles keep their relative order; zombies map to
/// `None`. Returns the remap and the new live count.
pub fn build_remap(flags: &[ParticleFlags]) -> (Vec<Option<usize>>, usize) {
    let mut remap = Vec::with_capacity(flags.len());
    let mut next = 0usize;
    for f in flags {
        if f.contains(ParticleFlags::ZOMBIE) {
            remap.push(None);
        } else {
            remap.push(Some(next));
            next += 1;
        }
    }
    (remap, next)
}

/// Rewrites every group's `[first_index, last_index)` range through the
/// remap produced by [`build_remap`]. A group that loses every member
/// (both endpoints disappear) collapses to an empty range at its mapped
/// start; if `destroy_automatically` is set it is flagged `to_be_destroyed`.
/// A rigid group that shrank without emptying out is flagged `to_be_split`
/// (§4.H; §9 notes the actual split is left a no-op, matching the source).
pub fn remap_groups(groups: &mut GroupRegistry, remap: &[Option<usize>]) {
    let pre_counts: Vec<(GroupId, usize)> = groups.iter().map(|(id, g)| (id, g.count())).collect();

    for (_, group) in groups.iter_mut() {
        group.first_index = remap_lower(remap, group.first_index);
        group.last_index = remap_upper(remap, group.last_index);
        if group.last_index < group.first_index {
            group.last_index = group.first_index;
        }
    }

    for (id, old_count) in pre_counts {
        let group = groups.get_mut(id);
        let new_count = group.count();
        if new_count == old_count {
            continue;
        }
        if new_count == 0 {
            if group.destroy_automatically {
                group.to_be_destroyed = true;
            }
        } else if group.flags.contains(GroupFlags::RIGID) {
            group.to_be_split = true;
        }
    }
}

/// Removes every group flagged `to_be_destroyed` and clears `to_be_split`
/// on survivors, returning the ids that were destroyed. Splitting a rigid
/// group that lost members is left unimplemented (§9 Open Question): the
/// group just keeps its shrunken contiguous range.
pub fn sweep_flagged_groups(groups: &mut GroupRegistry) -> Vec<GroupId> {
    let flagged: Vec<GroupId> = groups
        .iter()
        .filter(|(_, g)| g.to_be_destroyed || g.to_be_split)
        .map(|(id, _)| id)
        .collect();

    let mut destroyed = Vec::new();
    for id in flagged {
        let was_destroyed = groups.get(id).to_be_destroyed;
        if was_destroyed {
            groups.remove(id);
            destroyed.push(id);
        } else {
            groups.get_mut(id).to_be_split = false;
        }
    }
    destroyed
}

/// Maps an (inclusive) start index forward to the first surviving slot at
/// or after it.
fn remap_lower(remap: &[Option<usize>], mut i: usize) -> usize {
    while i < remap.len() {
        if let Some(new) = remap[i] {
            return new;
        }
        i += 1;
    }
    remap.iter().rev().find_map(|r| *r).map_or(0, |n| n + 1)
}

/// Maps an (exclusive) end index to one past the last surviving slot
/// before it.
fn remap_upper(remap: &[Option<usize>], end: usize) -> usize {
    let mut i = end;
    while i > 0 {
        i -= 1;
        if let Some(new) = remap[i] {
            return new + 1;
        }
    }
    0
}

/// Rewrites a single particle index (e.g. a pair/triad endpoint or a
/// `user_data`-carried index) through the remap, dropping the entry if the
/// particle was zombied out.
pub fn remap_index(remap: &[Option<usize>], index: usize) -> Option<usize> {
    remap.get(index).copied().flatten()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::particle::group::{ParticleGroup, Transform2D};

    fn group(first: usize, last: usize) -> ParticleGroup {
        ParticleGroup {
            first_index: first,
            last_index: last,
            flags: crate::flags::GroupFlags::empty(),
            strength: 1.0,
            transform: Transform2D::default(),
            destroy_automatically: true,
            to_be_destroyed: false,
            to_be_split: false,
        }
    }

    #[test]
    fn remap_preserves_relative_order_of_survivors() {
        let flags = vec![
            ParticleFlags::empty(),
            ParticleFlags::ZOMBIE,
            ParticleFlags::empty(),
            ParticleFlags::ZOMBIE,
            ParticleFlags::empty(),
        ];
        let (remap, count) = build_remap(&flags);
        assert_eq!(remap, vec![Some(0), None, Some(1), None, Some(2)]);
        assert_eq!(count, 3);
    }

    #[test]
    fn group_range_shrinks_when_members_are_zombied() {
        let flags = vec![
            ParticleFlags::empty(),
            ParticleFlags::ZOMBIE,
            ParticleFlags::empty(),
            ParticleFlags::empty(),
        ];
        let (remap, _) = build_remap(&flags);
        let mut groups = GroupRegistry::default();
        let id = groups.insert(group(0, 4));
        remap_groups(&mut groups, &remap);
        let g = groups.get(id);
        assert_eq!(g.first_index, 0);
        assert_eq!(g.last_index, 3);
    }

    #[test]
    fn fully_zombied_group_collapses_to_empty_range() {
        let flags = vec![ParticleFlags::ZOMBIE, ParticleFlags::ZOMBIE];
        let (remap, _) = build_remap(&flags);
        let mut groups = GroupRegistry::default();
        let id = groups.insert(group(0, 2));
        remap_groups(&mut groups, &remap);
        let g = groups.get(id);
        assert_eq!(g.count(), 0);
    }

    #[test]
    fn emptied_destroy_automatically_group_is_flagged_and_swept() {
        let flags = vec![ParticleFlags::ZOMBIE, ParticleFlags::ZOMBIE];
        let (remap, _) = build_remap(&flags);
        let mut groups = GroupRegistry::default();
        let id = groups.insert(group(0, 2));
        remap_groups(&mut groups, &remap);
        assert!(groups.get(id).to_be_destroyed);
        let destroyed = sweep_flagged_groups(&mut groups);
        assert_eq!(destroyed, vec![id]);
        assert!(groups.is_empty());
    }

    #[test]
    fn shrunken_rigid_group_is_flagged_split_and_not_removed() {
        let flags = vec![ParticleFlags::empty(), ParticleFlags::ZOMBIE, ParticleFlags::empty()];
        let (remap, _) = build_remap(&flags);
        let mut groups = GroupRegistry::default();
        let mut rigid = group(0, 3);
        rigid.flags = crate::flags::GroupFlags::RIGID;
        let id = groups.insert(rigid);
        remap_groups(&mut groups, &remap);
        assert!(groups.get(id).to_be_split);
        let destroyed = sweep_flagged_groups(&mut groups);
        assert!(destroyed.is_empty());
        assert!(!groups.get(id).to_be_split);
        assert_eq!(groups.get(id).count(), 2);
    }

    #[test]
    fn remap_index_drops_zombied_endpoints() {
        let flags = vec![ParticleFlags::empty(), ParticleFlags::ZOMBIE, ParticleFlags::empty()];
        let (remap, _) = build_remap(&flags);
        assert_eq!(remap_index(&remap, 0), Some(0));
        assert_eq!(remap_index(&remap, 1), None);
        assert_eq!(remap_index(&remap, 2), Some(1));
    }
}
