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

//! The query surface (§4.I): AABB query and ray cast against live particles,
//! both narrowed first by a tag-range binary search over the sorted proxy
//! array before paying for the exact per-particle test.

use bevy::math::Vec2;

use crate::particle::host::Aabb;
use crate::particle::proxy::{self, Proxy};

/// Invokes `callback(index)` for every particle whose position lies inside
/// `aabb`. Stops early if `callback` returns `false`. `diameter` must match
/// the cell size `proxies`' tags were last computed with (§4.B), or the
/// tag-range narrowing below will scan the wrong cells entirely.
pub fn query_aabb(proxies: &[Proxy], positions: &[Vec2], aabb: Aabb, diameter: f32, mut callback: impl FnMut(usize) -> bool) {
    let inv_d = 1.0 / diameter;
    let low = proxy::compute_tag(aabb.lower.x, aabb.lower.y, inv_d);
    let high = proxy::compute_tag(aabb.upper.x, aabb.upper.y, inv_d);
    let (lo, hi) = if low <= high { (low, high) } else { (high, low) };
    for p in &proxies[proxy::tag_range(proxies, lo, hi)] {
        if !aabb.contains_point(positions[p.index]) {
            continue;
        }
        if !callback(p.index) {
            return;
        }
    }
}

/// Ray-casts the segment `p1 -> p2` against every particle's disc (radius
/// `diameter/2`, §4.I). For each candidate, solves for the smallest
/// `t ∈ [0, fraction]` such that `|(1-t)*p1 + t*p2 - pos_i|^2 == (diameter/2)^2`,
/// invokes `callback(index, point, normal, t)`, and uses its return value
/// (clamped into `[0, fraction]`, or a negative value to stop immediately)
/// to tighten the remaining search window — so a caller looking for the
/// *closest* hit can shrink `fraction` every time one is found.
pub fn ray_cast(
    proxies: &[Proxy],
    positions: &[Vec2],
    diameter: f32,
    p1: Vec2,
    p2: Vec2,
    mut callback: impl FnMut(usize, Vec2, Vec2, f32) -> f32,
) {
    let mut fraction = 1.0f32;
    let radius = diameter * 0.5;
    let radius2 = radius * radius;

    let bounds = Aabb::of_points([p1, p2]).map(|b| b.inflated(diameter));
    let Some(bounds) = bounds else { return };

    let inv_d = 1.0 / diameter;
    let low = proxy::compute_tag(bounds.lower.x, bounds.lower.y, inv_d);
    let high = proxy::compute_tag(bounds.upper.x, bounds.upper.y, inv_d);
    let (lo, hi) = if low <= high { (low, high) } else { (high, low) };

    for p in &proxies[proxy::tag_range(proxies, lo, hi)] {
        let center = positions[p.index];
        if let Some(t) = solve_segment_circle(p1, p2, center, radius2, fraction) {
            let point = p1 + (p2 - p1) * t;
            let normal = (point - center).normalize_or_zero();
            let ret = callback(p.index, point, normal, t);
            if ret < 0.0 {
                return;
            }
            fraction = fraction.min(ret);
        }
    }
}

/// Smallest `t ∈ [0, max_fraction]` such that the point on segment
/// `p1 -> p2` at parameter `t` is exactly `sqrt(radius2)` from `center`, or
/// `None` if the segment never gets that close within the window.
fn solve_segment_circle(p1: Vec2, p2: Vec2, center: Vec2, radius2: f32, max_fraction: f32) -> Option<f32> {
    let d = p2 - p1;
    let f = p1 - center;
    let a = d.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * f.dot(d);
    let c = f.length_squared() - radius2;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t0 = (-b - sqrt_disc) / (2.0 * a);
    let t1 = (-b + sqrt_disc) / (2.0 * a);
    for t in [t0, t1] {
        if (0.0..=max_fraction).contains(&t) {
            return Some(t);
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    fn proxies_for(positions: &[Vec2], diameter: f32) -> Vec<Proxy> {
        let mut proxies: Vec<Proxy> = (0..positions.len()).map(|i| Proxy { index: i, tag: 0 }).collect();
        proxy::update_tags_and_sort(&mut proxies, positions, 1.0 / diameter);
        proxies
    }

    #[test]
    fn query_aabb_finds_only_particles_inside_rectangle() {
        let positions: Vec<Vec2> = (0..10)
            .flat_map(|x| (0..10).map(move |y| Vec2::new(x as f32, y as f32)))
            .collect();
        let proxies = proxies_for(&positions, 1.0);
        let aabb = Aabb::new(Vec2::ZERO, Vec2::new(1.0, 1.0));
        let mut found = Vec::new();
        query_aabb(&proxies, &positions, aabb, 1.0, |i| {
            found.push(i);
            true
        });
        for &i in &found {
            assert!(positions[i].x >= 0.0 && positions[i].x <= 1.0);
            assert!(positions[i].y >= 0.0 && positions[i].y <= 1.0);
        }
        assert_eq!(found.len(), 4); // (0,0) (0,1) (1,0) (1,1)
    }

    #[test]
    fn query_aabb_honors_early_stop() {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(0.1, 0.0), Vec2::new(0.2, 0.0)];
        let proxies = proxies_for(&positions, 1.0);
        let aabb = Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0));
        let mut count = 0;
        query_aabb(&proxies, &positions, aabb, 1.0, |_| {
            count += 1;
            false
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn ray_cast_hits_particle_on_segment() {
        let positions = vec![Vec2::new(5.0, 0.0)];
        let proxies = proxies_for(&positions, 1.0);
        let mut hit = None;
        ray_cast(&proxies, &positions, 1.0, Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), |i, point, normal, t| {
            hit = Some((i, point, normal, t));
            -1.0
        });
        let (i, _point, normal, t) = hit.expect("expected a hit");
        assert_eq!(i, 0);
        assert!(t > 0.0 && t < 1.0);
        assert!((normal - Vec2::new(-1.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn ray_cast_misses_particle_off_segment() {
        let positions = vec![Vec2::new(5.0, 10.0)];
        let proxies = proxies_for(&positions, 1.0);
        let mut hits = 0;
        ray_cast(&proxies, &positions, 1.0, Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), |_, _, _, _| {
            hits += 1;
            -1.0
        });
        assert_eq!(hits, 0);
    }
}
