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

//! Rigid-group solver (§4.G, step 6). Treats every particle in a
//! rigid-flagged group as if it were welded to one rigid body: derives the
//! group's instantaneous linear/angular velocity from its members' current
//! velocities, advances a frame by one step, then overwrites each member's
//! velocity with whatever constant velocity would carry it from its current
//! position to that frame's new position in one `dt`. This is run before
//! position integration, so the velocity it produces is what actually moves
//! the particles this step (§4.G step 8 reads it back).
//!
//! Mutates [`ParticleGroup::transform`][crate::particle::group::Transform2D]
//! so the group's frame stays available for anything else that wants to know
//! where a rigid group currently sits (debug draw, queries), even though
//! nothing in this solver itself reads it back.

use bevy::math::Vec2;

use crate::flags::GroupFlags;
use crate::particle::group::{GroupRegistry, Transform2D};
use crate::particle::system::Step;

pub fn solve(groups: &mut GroupRegistry, positions: &[Vec2], velocities: &mut [Vec2], step: Step) {
    for (_, group) in groups.iter_mut() {
        if !group.flags.contains(GroupFlags::RIGID) {
            continue;
        }
        let (first, last) = (group.first_index, group.last_index);
        let count = last - first;
        if count == 0 {
            continue;
        }
        let n = count as f32;

        let centroid: Vec2 = positions[first..last].iter().copied().sum::<Vec2>() / n;
        let lin_vel: Vec2 = velocities[first..last].iter().copied().sum::<Vec2>() / n;

        let mut numerator = 0.0f32;
        let mut denominator = 0.0f32;
        for i in first..last {
            let r = positions[i] - centroid;
            let v = velocities[i] - lin_vel;
            numerator += r.x * v.y - r.y * v.x;
            denominator += r.length_squared();
        }
        let ang_vel = if denominator > 1e-9 { numerator / denominator } else { 0.0 };

        let new_centroid = centroid + lin_vel * step.dt;
        let (sin, cos) = (ang_vel * step.dt).sin_cos();

        for i in first..last {
            let r = positions[i] - centroid;
            let rotated = Vec2::new(cos * r.x - sin * r.y, sin * r.x + cos * r.y);
            let target = new_centroid + rotated;
            velocities[i] = (target - positions[i]) * step.inv_dt;
        }

        group.transform = Transform2D {
            position: new_centroid,
            angle: group.transform.angle + ang_vel * step.dt,
        };
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::particle::group::ParticleGroup;

    fn rigid_group(first: usize, last: usize) -> ParticleGroup {
        ParticleGroup {
            first_index: first,
            last_index: last,
            flags: GroupFlags::RIGID,
            strength: 1.0,
            transform: Transform2D::default(),
            destroy_automatically: true,
            to_be_destroyed: false,
            to_be_split: false,
        }
    }

    #[test]
    fn pure_translation_carries_every_member_uniformly() {
        let mut groups = GroupRegistry::default();
        groups.insert(rigid_group(0, 2));
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        let mut velocities = vec![Vec2::new(2.0, 0.0), Vec2::new(2.0, 0.0)];
        let step = Step { dt: 1.0 / 60.0, inv_dt: 60.0 };
        solve(&mut groups, &positions, &mut velocities, step);
        assert!((velocities[0] - Vec2::new(2.0, 0.0)).length() < 1e-4);
        assert!((velocities[1] - Vec2::new(2.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn rotation_about_centroid_is_preserved() {
        let mut groups = GroupRegistry::default();
        groups.insert(rigid_group(0, 2));
        let positions = vec![Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)];
        // a rigid body spinning in place: opposite tangential velocities.
        let mut velocities = vec![Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0)];
        let step = Step { dt: 1.0 / 60.0, inv_dt: 60.0 };
        solve(&mut groups, &positions, &mut velocities, step);
        // still spinning, not flung apart: velocities stay roughly tangential.
        assert!(velocities[0].x.abs() < 0.1);
        assert!(velocities[1].x.abs() < 0.1);
    }

    #[test]
    fn non_rigid_groups_are_left_alone() {
        let mut groups = GroupRegistry::default();
        groups.insert(ParticleGroup {
            first_index: 0,
            last_index: 2,
            flags: GroupFlags::empty(),
            strength: 1.0,
            transform: Transform2D::default(),
            destroy_automatically: true,
            to_be_destroyed: false,
            to_be_split: false,
        });
        let positions = vec![Vec2::ZERO, Vec2::X];
        let mut velocities = vec![Vec2::new(5.0, 5.0), Vec2::new(-5.0, -5.0)];
        let before = velocities.clone();
        let step = Step { dt: 1.0 / 60.0, inv_dt: 60.0 };
        solve(&mut groups, &positions, &mut velocities, step);
        assert_eq!(velocities, before);
    }
}
