// src/broadphase.rs
//! Broadphase strategies: cheap candidate-pair selection before exact contacts.
//!
//! Every strategy reports exactly the eligible pairs whose AABBs overlap, so
//! switching strategy changes cost, never which contacts get resolved.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::body::Motion;
use crate::shape::Aabb;

/// What the broadphase needs to know about one body this step.
#[derive(Debug, Clone, Copy)]
pub struct BroadphaseProxy {
    pub aabb: Aabb,
    pub motion: Motion,
}

/// A pair is worth testing only if at least one side can move this step.
#[inline(always)]
pub fn needs_test(a: Motion, b: Motion) -> bool {
    matches!(a, Motion::Awake) || matches!(b, Motion::Awake)
}

/// Candidate pairs as indices into the proxy slice, `i < j`, sorted.
pub trait Broadphase: Send {
    fn name(&self) -> &'static str;
    fn collect_pairs(&mut self, proxies: &[BroadphaseProxy], out: &mut Vec<(usize, usize)>);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BroadphaseKind {
    /// Every body against every other body. O(n²) baseline.
    Naive,
    /// Uniform spatial hash; bodies only meet bodies in shared cells.
    Grid { cell_size: f32 },
    /// Sweep and prune along one axis (0 = x, 1 = y, 2 = z, None = auto).
    Sap { axis: Option<usize> },
}

impl Default for BroadphaseKind {
    fn default() -> Self {
        BroadphaseKind::Sap { axis: Some(0) }
    }
}

impl BroadphaseKind {
    pub fn build(self) -> Box<dyn Broadphase> {
        match self {
            BroadphaseKind::Naive => Box::new(NaiveBroadphase),
            BroadphaseKind::Grid { cell_size } => Box::new(GridBroadphase::new(cell_size)),
            BroadphaseKind::Sap { axis } => Box::new(SapBroadphase::new(axis)),
        }
    }
}

#[inline(always)]
fn accept(proxies: &[BroadphaseProxy], i: usize, j: usize) -> bool {
    let (a, b) = (&proxies[i], &proxies[j]);
    needs_test(a.motion, b.motion) && a.aabb.overlaps(&b.aabb)
}

#[inline(always)]
fn ordered(i: usize, j: usize) -> (usize, usize) {
    if i < j { (i, j) } else { (j, i) }
}

// ---------------------------------------------------------------------------
// Naive
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveBroadphase;

impl Broadphase for NaiveBroadphase {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn collect_pairs(&mut self, proxies: &[BroadphaseProxy], out: &mut Vec<(usize, usize)>) {
        out.clear();
        for i in 0..proxies.len() {
            for j in (i + 1)..proxies.len() {
                if accept(proxies, i, j) {
                    out.push((i, j));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Bodies spanning more cells than this per axis skip the grid and are
/// tested against everyone, like unbounded planes.
const GRID_MAX_SPAN: i64 = 32;

#[derive(Debug, Clone)]
pub struct GridBroadphase {
    cell_size: f32,
    cells: HashMap<(i32, i32, i32), Vec<usize>>,
    oversized: Vec<usize>,
}

impl GridBroadphase {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
        Self { cell_size, cells: HashMap::new(), oversized: Vec::new() }
    }

    #[inline]
    fn cell_of(&self, v: f32) -> i64 {
        (v / self.cell_size).floor() as i64
    }
}

impl Broadphase for GridBroadphase {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn collect_pairs(&mut self, proxies: &[BroadphaseProxy], out: &mut Vec<(usize, usize)>) {
        out.clear();
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.oversized.clear();

        for (index, proxy) in proxies.iter().enumerate() {
            let aabb = &proxy.aabb;
            if !aabb.is_finite() {
                self.oversized.push(index);
                continue;
            }
            let (x0, x1) = (self.cell_of(aabb.min.x), self.cell_of(aabb.max.x));
            let (y0, y1) = (self.cell_of(aabb.min.y), self.cell_of(aabb.max.y));
            let (z0, z1) = (self.cell_of(aabb.min.z), self.cell_of(aabb.max.z));
            if x1 - x0 > GRID_MAX_SPAN || y1 - y0 > GRID_MAX_SPAN || z1 - z0 > GRID_MAX_SPAN {
                self.oversized.push(index);
                continue;
            }
            for x in x0..=x1 {
                for y in y0..=y1 {
                    for z in z0..=z1 {
                        self.cells
                            .entry((x as i32, y as i32, z as i32))
                            .or_default()
                            .push(index);
                    }
                }
            }
        }

        for bucket in self.cells.values() {
            for (n, &i) in bucket.iter().enumerate() {
                for &j in &bucket[n + 1..] {
                    if accept(proxies, i, j) {
                        out.push(ordered(i, j));
                    }
                }
            }
        }
        for &big in &self.oversized {
            for other in 0..proxies.len() {
                if other != big && accept(proxies, big, other) {
                    out.push(ordered(big, other));
                }
            }
        }

        // Shared cells and oversized-vs-oversized report the same pair more than once.
        out.sort_unstable();
        out.dedup();
        self.cells.retain(|_, bucket| !bucket.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Sweep and prune
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SapBroadphase {
    axis: Option<usize>,
    order: Vec<usize>,
    active: Vec<usize>,
}

impl SapBroadphase {
    pub fn new(axis: Option<usize>) -> Self {
        Self { axis: axis.map(|a| a.min(2)), order: Vec::new(), active: Vec::new() }
    }

    /// Axis with the largest spread of finite AABB centers.
    fn pick_axis(proxies: &[BroadphaseProxy]) -> usize {
        let mut sum = [0.0f64; 3];
        let mut sum_sq = [0.0f64; 3];
        let mut n = 0.0f64;
        for proxy in proxies.iter().filter(|p| p.aabb.is_finite()) {
            let c = proxy.aabb.center();
            for axis in 0..3 {
                let v = c[axis] as f64;
                sum[axis] += v;
                sum_sq[axis] += v * v;
            }
            n += 1.0;
        }
        if n < 2.0 {
            return 0;
        }
        let variance = |axis: usize| sum_sq[axis] / n - (sum[axis] / n).powi(2);
        (0..3)
            .max_by(|&a, &b| variance(a).total_cmp(&variance(b)))
            .unwrap_or(0)
    }
}

impl Broadphase for SapBroadphase {
    fn name(&self) -> &'static str {
        "sap"
    }

    fn collect_pairs(&mut self, proxies: &[BroadphaseProxy], out: &mut Vec<(usize, usize)>) {
        out.clear();
        let axis = self.axis.unwrap_or_else(|| Self::pick_axis(proxies));

        self.order.clear();
        self.order.extend(0..proxies.len());
        self.order
            .sort_unstable_by(|&a, &b| proxies[a].aabb.min[axis].total_cmp(&proxies[b].aabb.min[axis]));

        self.active.clear();
        for &i in &self.order {
            let min = proxies[i].aabb.min[axis];
            self.active.retain(|&j| proxies[j].aabb.max[axis] >= min);
            for &j in &self.active {
                if accept(proxies, i, j) {
                    out.push(ordered(i, j));
                }
            }
            self.active.push(i);
        }
        out.sort_unstable();
    }
}
