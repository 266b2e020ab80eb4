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

//! Voronoi/Delaunay helper (§4.E). The diagram itself is explicitly out of
//! scope for this spec ("the diagram itself is outside this spec; the core
//! only assumes it yields every triangle at most once"), so this is a small
//! self-contained Bowyer-Watson triangulator rather than a pulled-in crate:
//! nothing else in the dependency stack offers 2-D Delaunay triangulation,
//! and the contract here is narrow enough not to need one.

use bevy::math::Vec2;

/// Builds the Delaunay triangulation of `points` (after merging points
/// within `merge_threshold` of each other into a single cluster
/// representative, per §4.E) and invokes `emit(ia, ib, ic)` once per
/// triangle with the *original* indices into `points`.
pub fn triangulate(points: &[(Vec2, usize)], merge_threshold: f32, mut emit: impl FnMut(usize, usize, usize)) {
    if points.len() < 3 {
        return;
    }

    // union-find merge of near-duplicate points.
    let mut parent: Vec<usize> = (0..points.len()).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    let threshold2 = merge_threshold * merge_threshold;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            if points[i].0.distance_squared(points[j].0) < threshold2 {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }
    let mut clusters: Vec<usize> = Vec::new();
    let mut seen = vec![false; points.len()];
    for i in 0..points.len() {
        let r = find(&mut parent, i);
        if !seen[r] {
            seen[r] = true;
            clusters.push(r);
        }
    }
    if clusters.len() < 3 {
        return;
    }

    let cluster_points: Vec<Vec2> = clusters.iter().map(|&c| points[c].0).collect();
    for tri in bowyer_watson(&cluster_points) {
        emit(
            points[clusters[tri[0]]].1,
            points[clusters[tri[1]]].1,
            points[clusters[tri[2]]].1,
        );
    }
}

/// Classic Bowyer-Watson incremental Delaunay triangulation. Returns
/// triangles as index triples into `points`. Degenerate (near-zero area)
/// triangles are skipped.
fn bowyer_watson(points: &[Vec2]) -> Vec<[usize; 3]> {
    let bounds = points.iter().fold(
        (points[0], points[0]),
        |(lo, hi), &p| (lo.min(p), hi.max(p)),
    );
    let size = (bounds.1 - bounds.0).max(Vec2::splat(1.0));
    let center = (bounds.0 + bounds.1) * 0.5;
    let d = size.x.max(size.y) * 20.0 + 10.0;

    // super-triangle indices follow the real points in a scratch array.
    let mut pts: Vec<Vec2> = points.to_vec();
    let super_a = pts.len();
    let super_b = super_a + 1;
    let super_c = super_a + 2;
    pts.push(center + Vec2::new(-d, -d));
    pts.push(center + Vec2::new(d, -d));
    pts.push(center + Vec2::new(0.0, d));

    let mut triangles: Vec<[usize; 3]> = vec![[super_a, super_b, super_c]];

    for i in 0..points.len() {
        let p = pts[i];
        let mut bad: Vec<usize> = Vec::new();
        for (ti, tri) in triangles.iter().enumerate() {
            if in_circumcircle(p, pts[tri[0]], pts[tri[1]], pts[tri[2]]) {
                bad.push(ti);
            }
        }
        // boundary edges of the bad-triangle cavity: edges not shared by two bad triangles.
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for &ti in &bad {
            let tri = triangles[ti];
            for (u, v) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let shared = bad.iter().any(|&oj| {
                    oj != ti
                        && {
                            let o = triangles[oj];
                            let has_u = o.contains(&u);
                            let has_v = o.contains(&v);
                            has_u && has_v
                        }
                });
                if !shared {
                    edges.push((u, v));
                }
            }
        }
        bad.sort_unstable_by(|a, b| b.cmp(a));
        for ti in bad {
            triangles.swap_remove(ti);
        }
        for (u, v) in edges {
            triangles.push([u, v, i]);
        }
    }

    triangles
        .into_iter()
        .filter(|t| !t.contains(&super_a) && !t.contains(&super_b) && !t.contains(&super_c))
        .filter(|t| triangle_area2(pts[t[0]], pts[t[1]], pts[t[2]]).abs() > 1e-9)
        .collect()
}

fn triangle_area2(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

fn in_circumcircle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    // standard incircle determinant test; assumes a,b,c wound consistently
    // is not required since we only compare against zero via abs area sign
    // normalization below.
    let area = triangle_area2(a, b, c);
    let (a, b, c) = if area < 0.0 { (a, c, b) } else { (a, b, c) };

    let ax = a.x - p.x;
    let ay = a.y - p.y;
    let bx = b.x - p.x;
    let by = b.y - p.y;
    let cx = c.x - p.x;
    let cy = c.y - p.y;

    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);
    det > 0.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn square_produces_two_triangles_covering_all_points() {
        let pts = vec![
            (Vec2::new(0.0, 0.0), 0),
            (Vec2::new(1.0, 0.0), 1),
            (Vec2::new(1.0, 1.0), 2),
            (Vec2::new(0.0, 1.0), 3),
        ];
        let mut triangles = Vec::new();
        triangulate(&pts, 0.01, |a, b, c| triangles.push([a, b, c]));
        assert_eq!(triangles.len(), 2);
        let mut touched = std::collections::HashSet::new();
        for t in &triangles {
            touched.insert(t[0]);
            touched.insert(t[1]);
            touched.insert(t[2]);
        }
        assert_eq!(touched.len(), 4);
    }

    #[test]
    fn near_duplicate_points_are_merged() {
        let pts = vec![
            (Vec2::new(0.0, 0.0), 0),
            (Vec2::new(0.001, 0.0), 1),
            (Vec2::new(1.0, 0.0), 2),
            (Vec2::new(0.0, 1.0), 3),
        ];
        let mut triangles = Vec::new();
        triangulate(&pts, 0.1, |a, b, c| triangles.push([a, b, c]));
        // one of the first two points vanishes into the other's cluster.
        for t in &triangles {
            assert!(!(t.contains(&0) && t.contains(&1)));
        }
    }

    #[test]
    fn fewer_than_three_points_emits_nothing() {
        let pts = vec![(Vec2::ZERO, 0), (Vec2::X, 1)];
        let mut count = 0;
        triangulate(&pts, 0.1, |_, _, _| count += 1);
        assert_eq!(count, 0);
    }
}
