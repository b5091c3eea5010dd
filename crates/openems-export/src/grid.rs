//! Rectilinear grid construction.
//!
//! Lines come from three sources: explicit line-marker edges, vertex-group
//! anchors and procedural anchors. All of them are fixed: smoothing inserts
//! lines between them but never moves or removes one.

use crate::error::SceneError;
use crate::geometry::Axis;
use crate::scene::{LineObject, Mesh, SceneObject};
use serde::{Deserialize, Serialize};

/// Inserts closer than this to an existing line are dropped
pub const LINE_TOLERANCE: f64 = 1e-5;

/// Ascending, duplicate-free line positions along one axis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineSet {
    lines: Vec<f64>,
}

impl LineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a line; returns false when it was dropped as a duplicate
    /// (or is not finite).
    pub fn insert(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let i = self.lines.partition_point(|&l| l < value);
        let near_prev = i > 0 && value - self.lines[i - 1] < LINE_TOLERANCE;
        let near_next = i < self.lines.len() && self.lines[i] - value < LINE_TOLERANCE;
        if near_prev || near_next {
            return false;
        }
        self.lines.insert(i, value);
        true
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.lines.iter()
    }

    pub fn first(&self) -> Option<f64> {
        self.lines.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.lines.last().copied()
    }

    /// Smoothed copy; see [`smooth_lines`]
    pub fn smoothed(&self, max_res: f64, ratio: f64) -> Self {
        Self {
            lines: smooth_lines(&self.lines, max_res, ratio),
        }
    }
}

impl FromIterator<f64> for LineSet {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut set = LineSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<f64> for LineSet {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

/// Attempts at designing a refinement before giving up on grading
const MAX_ATTEMPTS: usize = 200;
/// Cells per interval before a fill attempt is abandoned
const MAX_CELLS: usize = 1_000_000;
/// Target reduction per retry at a junction
const SHRINK_FACTOR: f64 = 1.5;

/// Acceptance tests shared by detection and construction
struct Bounds {
    max_res: f64,
    ratio: f64,
    growth: f64,
    /// Largest cell the construction may emit
    cap: f64,
    /// Absolute slack for coordinate rounding
    slack: f64,
}

impl Bounds {
    fn new(lines: &[f64], max_res: f64, ratio: f64) -> Self {
        let extent = lines.iter().fold(0.0f64, |m, x| m.max(x.abs()));
        Self {
            max_res,
            ratio,
            growth: ratio.sqrt(),
            cap: max_res * (1.0 - 1e-9) - 16.0 * f64::EPSILON * extent,
            slack: 64.0 * f64::EPSILON * extent,
        }
    }

    fn too_large(&self, gap: f64) -> bool {
        gap > self.max_res * (1.0 + 1e-9)
    }

    /// `a` is more than `ratio` times `b`
    fn exceeds(&self, a: f64, b: f64) -> bool {
        a > self.ratio * b * (1.0 + 1e-9) + self.slack
    }

    /// Intervals that break a bound (only the larger side of a ratio breach)
    fn violations(&self, gaps: &[f64]) -> Vec<bool> {
        let m = gaps.len();
        (0..m)
            .map(|k| {
                self.too_large(gaps[k])
                    || (k > 0 && self.exceeds(gaps[k], gaps[k - 1]))
                    || (k + 1 < m && self.exceeds(gaps[k], gaps[k + 1]))
            })
            .collect()
    }

    /// Fill an interval with cells growing by at most `growth` from both ends.
    ///
    /// End cells must land in their junction windows and no cell may exceed
    /// `cap`. Returns unscaled cells; they are stretched to `length` on
    /// placement.
    fn fill(&self, length: f64, a: Window, b: Window) -> Option<Vec<f64>> {
        if length <= self.cap && a.contains(length) && b.contains(length) {
            return Some(vec![length]);
        }

        let mut left = vec![a.target];
        let mut right = vec![b.target];
        let mut total = a.target + b.target;
        let min_scale = 1.0 / (self.ratio * self.ratio);

        while left.len() + right.len() <= MAX_CELLS {
            let scale = length / total;
            if scale * a.target < a.lo || scale * b.target < b.lo || scale < min_scale {
                return None;
            }

            let (fl, fr) = (left[left.len() - 1], right[right.len() - 1]);
            let frontier_ok = fl.max(fr) <= self.ratio * fl.min(fr);
            if a.contains(scale * a.target)
                && b.contains(scale * b.target)
                && frontier_ok
                && scale * fl.max(fr) <= self.cap
            {
                left.extend(right.into_iter().rev());
                return Some(left);
            }

            let next = if fl <= fr {
                let c = (fl * self.growth).min(self.cap);
                left.push(c);
                c
            } else {
                let c = (fr * self.growth).min(self.cap);
                right.push(c);
                c
            };
            total += next;
        }
        None
    }
}

/// Allowed end-cell size at a junction
#[derive(Debug, Clone, Copy)]
struct Window {
    target: f64,
    lo: f64,
    hi: f64,
}

impl Window {
    fn contains(&self, value: f64) -> bool {
        self.lo <= value && value <= self.hi
    }
}

#[derive(Debug, Clone, Copy)]
enum Junction {
    /// No refined interval touches it
    Untouched,
    /// Next to an interval that keeps its size
    Fixed(Window),
    /// Between refined intervals, or at the end of the line set
    Free { target: f64, boundary: bool },
}

impl Junction {
    fn target(&self) -> Option<f64> {
        match self {
            Junction::Untouched => None,
            Junction::Fixed(w) => Some(w.target),
            Junction::Free { target, .. } => Some(*target),
        }
    }
}

enum Retry {
    Refine(Vec<usize>),
    Shrink(Vec<usize>),
}

fn design(
    bounds: &Bounds,
    gaps: &[f64],
    refined: &[bool],
    shrink: &[i32],
) -> Result<Vec<Option<Vec<f64>>>, Retry> {
    let m = gaps.len();
    let g = bounds.growth;

    let mut junctions: Vec<Junction> = (0..=m)
        .map(|j| {
            let adjacent: Vec<usize> = [j.checked_sub(1), Some(j)]
                .into_iter()
                .flatten()
                .filter(|&k| k < m)
                .collect();
            if !adjacent.iter().any(|&k| refined[k]) {
                return Junction::Untouched;
            }
            match adjacent.iter().find(|&&k| !refined[k]) {
                Some(&k) => {
                    let n = gaps[k];
                    Junction::Fixed(Window {
                        target: n.min(bounds.cap),
                        lo: n / bounds.ratio,
                        hi: (n * bounds.ratio).min(bounds.cap),
                    })
                }
                None => {
                    let base = adjacent.iter().map(|&k| gaps[k]).fold(bounds.cap, f64::min);
                    Junction::Free {
                        target: base / SHRINK_FACTOR.powi(shrink[j]),
                        boundary: adjacent.len() == 1,
                    }
                }
            }
        })
        .collect();

    // neighbouring targets may differ by no more than a ramp can bridge
    let relax = |junctions: &mut [Junction], from: usize, to: usize, length: f64| {
        let source = junctions[from].target();
        if let (Some(source), Junction::Free { target, .. }) = (source, &mut junctions[to]) {
            *target = target.min(source + 0.5 * (g - 1.0) * length);
        }
    };
    for k in (0..m).filter(|&k| refined[k]) {
        relax(&mut junctions, k, k + 1, gaps[k]);
    }
    for k in (0..m).rev().filter(|&k| refined[k]) {
        relax(&mut junctions, k + 1, k, gaps[k]);
    }

    let window = |j: usize| match junctions[j] {
        Junction::Fixed(w) => w,
        Junction::Free { target, boundary: true } => Window { target, lo: 0.0, hi: bounds.cap },
        Junction::Free { target, boundary: false } => Window {
            target,
            lo: target / g,
            hi: (target * g).min(bounds.cap),
        },
        Junction::Untouched => Window { target: bounds.cap, lo: 0.0, hi: bounds.cap },
    };

    let mut cells = Vec::with_capacity(m);
    let mut failed = Vec::new();
    for k in 0..m {
        if !refined[k] {
            cells.push(None);
            continue;
        }
        let fill = bounds.fill(gaps[k], window(k), window(k + 1));
        if fill.is_none() {
            failed.push(k);
        }
        cells.push(fill);
    }

    if failed.is_empty() {
        return Ok(cells);
    }

    let mut cascade: Vec<usize> = failed
        .iter()
        .flat_map(|&k| [k.checked_sub(1), Some(k + 1)])
        .flatten()
        .filter(|&i| i < m && !refined[i])
        .collect();
    if !cascade.is_empty() {
        cascade.sort_unstable();
        cascade.dedup();
        return Err(Retry::Refine(cascade));
    }

    let mut junctions: Vec<usize> = failed.iter().flat_map(|&k| [k, k + 1]).collect();
    junctions.dedup();
    Err(Retry::Shrink(junctions))
}

fn place(lines: &[f64], cells: &[Option<Vec<f64>>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(lines.len());
    for (w, interval) in lines.windows(2).zip(cells) {
        out.push(w[0]);
        if let Some(cells) = interval {
            let total: f64 = cells.iter().sum();
            let length = w[1] - w[0];
            let mut acc = 0.0;
            for c in &cells[..cells.len() - 1] {
                acc += c;
                out.push(w[0] + length * acc / total);
            }
        }
    }
    out.extend(lines.last());
    out
}

/// Insert lines so that no gap exceeds `max_res` and consecutive gaps
/// differ by at most `ratio`.
///
/// Every input line is kept bit for bit. Lines already meeting both bounds
/// are returned unchanged, so smoothing a smoothed set is a no-op. Each
/// interval that breaks a bound is filled with cells grading geometrically
/// (by `√ratio`) away from its ends.
pub fn smooth_lines(lines: &[f64], max_res: f64, ratio: f64) -> Vec<f64> {
    if lines.len() < 2 || max_res.is_nan() || max_res <= 0.0 || ratio.is_nan() || ratio <= 1.0 {
        return lines.to_vec();
    }

    let bounds = Bounds::new(lines, max_res, ratio);
    if bounds.cap <= 0.0 {
        tracing::warn!("max_res {} is too small for lines around {:?}", max_res, lines.last());
        return lines.to_vec();
    }

    let gaps: Vec<f64> = lines.windows(2).map(|w| w[1] - w[0]).collect();
    let mut refined = bounds.violations(&gaps);
    if !refined.iter().any(|&r| r) {
        return lines.to_vec();
    }

    let mut shrink = vec![0i32; lines.len()];
    for _ in 0..MAX_ATTEMPTS {
        match design(&bounds, &gaps, &refined, &shrink) {
            Ok(cells) => return place(lines, &cells),
            Err(Retry::Refine(intervals)) => {
                for k in intervals {
                    refined[k] = true;
                }
            }
            Err(Retry::Shrink(junctions)) => {
                for j in junctions {
                    shrink[j] += 1;
                }
            }
        }
    }

    tracing::warn!(
        "Could not grade {} lines at ratio {}, falling back to uniform subdivision",
        lines.len(),
        ratio
    );
    let cells: Vec<Option<Vec<f64>>> = gaps
        .iter()
        .zip(&refined)
        .map(|(&gap, &r)| {
            r.then(|| {
                let n = (gap / bounds.cap).ceil().max(1.0) as usize;
                vec![gap / n as f64; n]
            })
        })
        .collect();
    place(lines, &cells)
}

/// Three line sets plus the unit they are expressed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub x: LineSet,
    pub y: LineSet,
    pub z: LineSet,
    /// Metres per scene unit
    pub delta_unit: f64,
}

impl Grid {
    pub fn axis(&self, axis: Axis) -> &LineSet {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        Axis::ALL
            .iter()
            .map(|&a| self.axis(a).len().saturating_sub(1))
            .product()
    }

    /// Wireframe of the grid lines on the three minimum faces of the
    /// domain: each line becomes two segments, one on each face that
    /// contains its direction.
    pub fn preview(&self) -> Mesh {
        let mut mesh = Mesh::default();
        if self.is_empty() {
            return mesh;
        }

        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for axis in Axis::ALL {
            let set = self.axis(axis);
            lo[axis.index()] = set.first().unwrap_or_default();
            hi[axis.index()] = set.last().unwrap_or_default();
        }

        for axis in Axis::ALL {
            let i = axis.index();
            let (u, v) = axis.plane_indices();
            for &pos in self.axis(axis).iter() {
                let mut base = lo;
                base[i] = pos;
                for spread in [u, v] {
                    let mut end = base;
                    end[spread] = hi[spread];
                    let start = mesh.vertices.len();
                    mesh.vertices.push(base);
                    mesh.vertices.push(end);
                    mesh.edges.push([start, start + 1]);
                }
            }
        }
        mesh
    }
}

/// Smoothing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smoothing {
    pub enabled: bool,
    /// Maximum line spacing, in scene units
    pub max_res: f64,
    /// Maximum ratio between neighbouring cells
    pub ratio: f64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            enabled: true,
            max_res: 3.0,
            ratio: 1.4,
        }
    }
}

/// Collects fixed lines from all sources
#[derive(Debug, Clone, Default)]
pub struct GridBuilder {
    lines: [LineSet; 3],
}

impl GridBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(&mut self, p: [f64; 3]) {
        for (set, value) in self.lines.iter_mut().zip(p) {
            set.insert(value);
        }
    }

    /// Explicit markers: each edge contributes its endpoints on every axis
    /// along which the endpoints differ.
    pub fn add_line_object(&mut self, object: &LineObject) -> Result<(), SceneError> {
        for edge in 0..object.mesh.edges.len() {
            let [a, b] = object.mesh.edge_points(edge)?;
            for axis in Axis::ALL {
                let i = axis.index();
                if a[i] != b[i] {
                    self.lines[i].insert(a[i]);
                    self.lines[i].insert(b[i]);
                }
            }
        }
        Ok(())
    }

    /// Vertices with non-zero weight in the named group. Returns how many
    /// vertices contributed; a group whose weights do not cover the mesh
    /// adds nothing.
    pub fn add_vertex_group(
        &mut self,
        object: &SceneObject,
        group: &str,
    ) -> Result<usize, SceneError> {
        let Some(group) = object.vertex_group(group) else {
            return Ok(0);
        };
        let vertices = &object.mesh().vertices;
        if group.weights.len() != vertices.len() {
            return Err(SceneError::GroupLength {
                group: group.name.clone(),
                expected: vertices.len(),
                found: group.weights.len(),
            });
        }
        let mut count = 0;
        for (vertex, &weight) in vertices.iter().zip(&group.weights) {
            if weight != 0.0 {
                self.add_point(*vertex);
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn add_anchors(&mut self, anchors: &[[f64; 3]]) {
        for &p in anchors {
            self.add_point(p);
        }
    }

    pub fn lines(&self, axis: Axis) -> &LineSet {
        &self.lines[axis.index()]
    }

    pub fn build(self, smoothing: &Smoothing, delta_unit: f64) -> Grid {
        let [x, y, z] = self.lines.map(|set| {
            if smoothing.enabled {
                set.smoothed(smoothing.max_res, smoothing.ratio)
            } else {
                set
            }
        });
        tracing::info!(
            "Grid: {} x {} x {} lines (smoothing {})",
            x.len(),
            y.len(),
            z.len(),
            if smoothing.enabled { "on" } else { "off" }
        );
        Grid { x, y, z, delta_unit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Role, VertexGroup};

    fn gaps(lines: &[f64]) -> Vec<f64> {
        lines.windows(2).map(|w| w[1] - w[0]).collect()
    }

    fn assert_bounds(lines: &[f64], max_res: f64, ratio: f64) {
        let gaps = gaps(lines);
        for g in &gaps {
            assert!(*g > 0.0, "lines not ascending: {:?}", lines);
            assert!(*g <= max_res * (1.0 + 1e-9), "gap {} exceeds {}", g, max_res);
        }
        for w in gaps.windows(2) {
            let r = w[0].max(w[1]) / w[0].min(w[1]);
            assert!(r <= ratio * (1.0 + 1e-6), "ratio {} between {} and {}", r, w[0], w[1]);
        }
    }

    const FIXED: [f64; 5] = [0.0, 1.0, 10.0, 10.5, 30.0];

    #[test]
    fn test_fixed_lines_preserved() {
        let out = smooth_lines(&FIXED, 2.0, 1.4);
        for x in FIXED {
            assert_eq!(out.iter().filter(|&&l| l == x).count(), 1, "line {} lost or duplicated", x);
        }
    }

    #[test]
    fn test_spacing_and_ratio_bounds() {
        assert_bounds(&smooth_lines(&FIXED, 2.0, 1.4), 2.0, 1.4);
        assert_bounds(&smooth_lines(&[0.0, 100.0], 3.0, 1.4), 3.0, 1.4);
        assert_bounds(&smooth_lines(&[-20.0, -19.99, 0.0, 0.5, 0.50002, 80.0], 3.0, 1.4), 3.0, 1.4);
        assert_bounds(&smooth_lines(&[5.0, 5.00003, 5.1, 200.0], 1.0, 1.2), 1.0, 1.2);
        assert_bounds(&smooth_lines(&[0.0, 0.001, 50.0], 3.0, 1.05), 3.0, 1.05);
    }

    #[test]
    fn test_smoothing_is_idempotent() {
        for (lines, max_res, ratio) in [
            (FIXED.to_vec(), 2.0, 1.4),
            (vec![0.0, 0.001, 50.0], 3.0, 1.3),
            (
                vec![
                    -72.65574, -21.77282, -17.76246, -0.92832, -0.15395, 0.07475, 0.21511,
                    20.50974,
                ],
                10.0,
                1.05,
            ),
        ] {
            let once = smooth_lines(&lines, max_res, ratio);
            let twice = smooth_lines(&once, max_res, ratio);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_conforming_lines_unchanged() {
        let lines = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(smooth_lines(&lines, 3.0, 1.4), lines.to_vec());
        assert_eq!(smooth_lines(&[4.0], 1.0, 1.4), vec![4.0]);
        assert!(smooth_lines(&[], 1.0, 1.4).is_empty());
    }

    #[test]
    fn test_uniform_interval() {
        // a single long interval between two points grades from both ends
        let out = smooth_lines(&[0.0, 100.0], 3.0, 1.4);
        assert_eq!(out.first(), Some(&0.0));
        assert_eq!(out.last(), Some(&100.0));
        assert!(out.len() >= 35);
    }

    #[test]
    fn test_line_set_dedup() {
        let mut set = LineSet::new();
        assert!(set.insert(1.0));
        assert!(!set.insert(1.000004));
        assert!(!set.insert(0.999996));
        assert!(set.insert(1.0001));
        assert!(set.insert(-3.0));
        assert!(!set.insert(f64::NAN));
        assert_eq!(set.as_slice(), &[-3.0, 1.0, 1.0001]);
    }

    #[test]
    fn test_line_object_skips_degenerate_axes() {
        let lines = LineObject {
            name: "lines".into(),
            mesh: Mesh {
                vertices: vec![[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 2.0, 1.0]],
                edges: vec![[0, 1], [1, 2]],
                faces: Vec::new(),
            },
        };
        let mut builder = GridBuilder::new();
        builder.add_line_object(&lines).unwrap();
        assert_eq!(builder.lines(Axis::X).as_slice(), &[0.0, 4.0]);
        assert_eq!(builder.lines(Axis::Y).as_slice(), &[0.0, 2.0]);
        assert_eq!(builder.lines(Axis::Z).as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn test_line_object_bad_edge() {
        let lines = LineObject {
            name: "lines".into(),
            mesh: Mesh {
                vertices: vec![[0.0; 3]],
                edges: vec![[0, 3]],
                faces: Vec::new(),
            },
        };
        assert!(GridBuilder::new().add_line_object(&lines).is_err());
    }

    #[test]
    fn test_vertex_group_anchors() {
        let mut obj = SceneObject::new(
            "patch",
            Role::MetalAaFaces,
            Mesh {
                vertices: vec![[1.0, 2.0, 3.0], [7.0, 8.0, 9.0], [1.0, 5.0, 3.0]],
                ..Default::default()
            },
        );
        obj.vertex_groups.push(VertexGroup {
            name: "anchor".into(),
            weights: vec![1.0, 0.0, 0.5],
        });

        let mut builder = GridBuilder::new();
        assert_eq!(builder.add_vertex_group(&obj, "anchor").unwrap(), 2);
        assert_eq!(builder.add_vertex_group(&obj, "other").unwrap(), 0);
        assert_eq!(builder.lines(Axis::X).as_slice(), &[1.0]);
        assert_eq!(builder.lines(Axis::Y).as_slice(), &[2.0, 5.0]);
    }

    #[test]
    fn test_vertex_group_length_mismatch() {
        let mut obj = SceneObject::new(
            "patch",
            Role::MetalAaFaces,
            Mesh {
                vertices: vec![[1.0, 2.0, 3.0], [7.0, 8.0, 9.0], [1.0, 5.0, 3.0]],
                ..Default::default()
            },
        );
        obj.vertex_groups.push(VertexGroup {
            name: "anchor".into(),
            weights: vec![1.0, 1.0],
        });

        let mut builder = GridBuilder::new();
        let err = builder.add_vertex_group(&obj, "anchor").unwrap_err();
        assert!(matches!(
            err,
            SceneError::GroupLength {
                expected: 3,
                found: 2,
                ..
            }
        ));
        assert!(builder.lines(Axis::X).is_empty());
    }

    #[test]
    fn test_build_keeps_fixed_lines() {
        let mut builder = GridBuilder::new();
        builder.add_anchors(&[[0.0, 0.0, 0.0], [10.0, 1.0, 0.5], [10.5, 1.0, 0.5]]);
        let grid = builder.build(&Smoothing::default(), 1e-3);

        for x in [0.0, 10.0, 10.5] {
            assert!(grid.x.as_slice().contains(&x));
        }
        assert_bounds(grid.x.as_slice(), 3.0, 1.4);
        assert_eq!(grid.delta_unit, 1e-3);

        let mut builder = GridBuilder::new();
        builder.add_anchors(&[[0.0, 0.0, 0.0], [10.0, 1.0, 0.5]]);
        let raw = builder.build(&Smoothing { enabled: false, ..Default::default() }, 1.0);
        assert_eq!(raw.x.as_slice(), &[0.0, 10.0]);
    }

    #[test]
    fn test_preview_wireframe() {
        let grid = Grid {
            x: [0.0, 1.0].into_iter().collect(),
            y: [0.0, 2.0].into_iter().collect(),
            z: [0.0, 3.0, 4.0].into_iter().collect(),
            delta_unit: 1.0,
        };
        let mesh = grid.preview();
        // two segments per line, 7 lines
        assert_eq!(mesh.edges.len(), 14);
        assert_eq!(mesh.vertices.len(), 28);
        // first x line spans y then z on the minimum faces
        assert_eq!(mesh.vertices[0], [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1], [0.0, 2.0, 0.0]);
        assert_eq!(mesh.vertices[3], [0.0, 0.0, 4.0]);
        assert_eq!(grid.cell_count(), 2);
    }
}
