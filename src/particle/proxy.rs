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

//! Spatial-hash proxy index (§4.B). Every particle's position is packed
//! into a single `i32` tag so that integer order equals row-major grid-cell
//! order; sorting the proxy array by tag turns neighbor search into a
//! linear scan.

use bevy::math::Vec2;

use crate::constants::{X_TRUNC_BITS, Y_TRUNC_BITS};

const X_OFFSET: i32 = 1 << (X_TRUNC_BITS - 1);
const Y_OFFSET: i32 = 1 << (Y_TRUNC_BITS - 1);
const Y_SHIFT: i32 = X_TRUNC_BITS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Proxy {
    pub index: usize,
    pub tag: i32,
}

/// Packs a grid cell `(x/diameter, y/diameter)` into a tag whose ascending
/// integer order is row-major: high bits hold the y-cell, low bits the
/// x-cell, both signed-biased so they never go negative (§4.B).
pub fn compute_tag(x: f32, y: f32, inv_diameter: f32) -> i32 {
    let u = (x * inv_diameter).floor() as i32;
    let v = (y * inv_diameter).floor() as i32;
    ((v + Y_OFFSET) << Y_SHIFT) + (u + X_OFFSET)
}

/// Adjusts a tag by a whole number of cells `(dx, dy)` without recomputing
/// it from a position.
pub fn compute_relative_tag(tag: i32, dx: i32, dy: i32) -> i32 {
    tag + (dy << Y_SHIFT) + dx
}

fn right_tag(tag: i32) -> i32 {
    compute_relative_tag(tag, 1, 0)
}
fn bottom_left_tag(tag: i32) -> i32 {
    compute_relative_tag(tag, -1, 1)
}
fn bottom_right_tag(tag: i32) -> i32 {
    compute_relative_tag(tag, 1, 1)
}

/// Recomputes every proxy's tag from `positions` and sorts the array
/// ascending by tag. Proxy order after this call is unspecified beyond the
/// tag ordering (sort is not required to be stable, §5).
pub fn update_tags_and_sort(proxies: &mut [Proxy], positions: &[Vec2], inv_diameter: f32) {
    for p in proxies.iter_mut() {
        let pos = positions[p.index];
        p.tag = compute_tag(pos.x, pos.y, inv_diameter);
    }
    proxies.sort_unstable_by_key(|p| p.tag);
}

/// Visits every unordered pair of proxies whose cells are the same or
/// directly adjacent exactly once (§4.B), invoking `visit(a_index, b_index)`
/// for each. `proxies` must already be sorted by tag (see
/// [`update_tags_and_sort`]).
pub fn for_each_neighbor_pair(proxies: &[Proxy], mut visit: impl FnMut(usize, usize)) {
    let n = proxies.len();
    let mut c = 0usize;
    for i in 0..n {
        let a = proxies[i];
        let r_tag = right_tag(a.tag);

        // forward scan: same row, this cell and the one to the right.
        let mut j = i + 1;
        while j < n && proxies[j].tag <= r_tag {
            visit(a.index, proxies[j].index);
            j += 1;
        }

        // bottom-left..bottom-right strip on the row below. `c` only ever
        // advances: bl_tag grows monotonically with `a.tag`, which is
        // itself sorted ascending across the outer loop.
        let bl_tag = bottom_left_tag(a.tag);
        let br_tag = bottom_right_tag(a.tag);
        while c < n && proxies[c].tag < bl_tag {
            c += 1;
        }
        let mut b = c;
        while b < n && proxies[b].tag <= br_tag {
            visit(a.index, proxies[b].index);
            b += 1;
        }
    }
}

/// Binary-searches the sorted proxy array for the half-open slice of
/// proxies whose tag lies in `[low, high]` inclusive. Used by AABB queries
/// and ray casts (§4.I) to narrow a tag-range before testing candidates
/// individually.
pub fn tag_range(proxies: &[Proxy], low: i32, high: i32) -> std::ops::Range<usize> {
    let start = proxies.partition_point(|p| p.tag < low);
    let end = proxies.partition_point(|p| p.tag <= high);
    start..end
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relative_tag_matches_recomputed_tag_for_integer_cell_offsets() {
        let inv_d = 1.0;
        let base = compute_tag(10.0, 10.0, inv_d);
        let moved = compute_tag(10.0 + 3.0, 10.0 - 2.0, inv_d);
        assert_eq!(compute_relative_tag(base, 3, -2), moved);
    }

    #[test]
    fn sort_orders_tags_ascending() {
        let positions = vec![
            Vec2::new(5.0, 5.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 1.0),
        ];
        let mut proxies: Vec<Proxy> = (0..3).map(|i| Proxy { index: i, tag: 0 }).collect();
        update_tags_and_sort(&mut proxies, &positions, 1.0);
        assert!(proxies.windows(2).all(|w| w[0].tag <= w[1].tag));
    }

    #[test]
    fn neighbor_scan_finds_adjacent_cell_pair_once() {
        // two particles one cell apart horizontally, one far away.
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(100.0, 100.0),
        ];
        let mut proxies: Vec<Proxy> = (0..3).map(|i| Proxy { index: i, tag: 0 }).collect();
        update_tags_and_sort(&mut proxies, &positions, 1.0);

        let mut pairs = Vec::new();
        for_each_neighbor_pair(&proxies, |a, b| pairs.push((a.min(b), a.max(b))));
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn tag_range_selects_only_matching_proxies() {
        let positions = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(5.0, 5.0),
            Vec2::new(1.0, 1.0),
        ];
        let mut proxies: Vec<Proxy> = (0..3).map(|i| Proxy { index: i, tag: 0 }).collect();
        update_tags_and_sort(&mut proxies, &positions, 1.0);
        let low = compute_tag(0.0, 0.0, 1.0);
        let high = compute_tag(1.0, 1.0, 1.0);
        let range = tag_range(&proxies, low, high);
        let found: Vec<usize> = proxies[range].iter().map(|p| p.index).collect();
        assert_eq!(found.len(), 2);
        assert!(found.contains(&0) && found.contains(&2));
    }
}
