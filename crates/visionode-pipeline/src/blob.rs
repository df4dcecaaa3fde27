//! Blob detection: connected-component analysis of a binary mask.
//!
//! This module defines the [`BlobLabeler`] trait for labeling
//! strategies and the [`BlobLabelerKind`] enum for selecting one at
//! runtime. Both strategies find 4-connected regions of
//! [`FOREGROUND`] pixels and report the same blobs in the same order:
//! sorted by the row-major index of each component's first pixel.
//!
//! The mask is consumed. Every foreground pixel is cleared to
//! [`BACKGROUND`] as it is visited, including pixels of components that
//! are discarded for being smaller than `min_area`.
//!
//! Neither strategy recurses, so stack use is constant regardless of
//! blob size.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::threshold::{BACKGROUND, FOREGROUND};
use crate::types::{Blob, Dimensions, PipelineError};

/// Selects which labeling algorithm the blob stage uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlobLabelerKind {
    /// Breadth-first flood fill from each unvisited foreground pixel.
    ///
    /// The work queue is reserved up front for the worst case (one
    /// component covering the whole frame) and reused across frames.
    #[default]
    FloodFill,
    /// Single pass over horizontal runs, merging overlapping runs of
    /// adjacent rows with union-find.
    ///
    /// Scratch memory scales with the number of foreground runs rather
    /// than the number of pixels.
    RunLength,
}

impl BlobLabelerKind {
    /// Stable numeric tag, used by fixed-layout config encodings.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::FloodFill => 0,
            Self::RunLength => 1,
        }
    }

    /// Inverse of [`to_u8`](Self::to_u8).
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::FloodFill),
            1 => Some(Self::RunLength),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlobLabelerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FloodFill => f.write_str("FloodFill"),
            Self::RunLength => f.write_str("RunLength"),
        }
    }
}

/// Counts from one labeling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelStats {
    /// Connected components found, kept or not.
    pub components: usize,
    /// Components dropped for being smaller than `min_area`.
    pub discarded: usize,
    /// Area of the largest component (kept or not).
    pub largest_area: u32,
}

/// Trait for connected-component labeling strategies.
///
/// Input: a mask of `dims.pixel_count()` bytes where [`FOREGROUND`]
/// marks object pixels. Output: blobs with `area >= min_area` appended
/// to `out` in first-pixel order. The mask is cleared.
pub trait BlobLabeler {
    /// Label the mask and append qualifying blobs to `out`.
    fn label(
        &mut self,
        mask: &mut [u8],
        dims: Dimensions,
        min_area: u32,
        out: &mut Vec<Blob>,
    ) -> LabelStats;
}

/// Running statistics for one component.
#[derive(Debug, Clone, Copy)]
struct Component {
    /// Row-major index of the first pixel seen in scan order.
    first: usize,
    area: u64,
    sum_x: u64,
    sum_y: u64,
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
}

impl Component {
    fn at(first: usize, x: u32, y: u32) -> Self {
        Self {
            first,
            area: 0,
            sum_x: 0,
            sum_y: 0,
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    fn add_pixel(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.sum_x += u64::from(x);
        self.sum_y += u64::from(y);
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    /// Add the half-open run `[start, end)` on row `y`.
    fn add_run(&mut self, start: u32, end: u32, y: u32) {
        let len = u64::from(end - start);
        // Sum of start..end is len * (start + end - 1) / 2; the product
        // of two consecutive-parity terms is always even.
        self.area += len;
        self.sum_x += len * (u64::from(start) + u64::from(end) - 1) / 2;
        self.sum_y += len * u64::from(y);
        self.min_x = self.min_x.min(start);
        self.max_x = self.max_x.max(end - 1);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    fn merge(&mut self, other: &Self) {
        self.first = self.first.min(other.first);
        self.area += other.area;
        self.sum_x += other.sum_x;
        self.sum_y += other.sum_y;
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    fn area_u32(&self) -> u32 {
        u32::try_from(self.area).unwrap_or(u32::MAX)
    }

    // Means of coordinates that are themselves u32, so they fit.
    #[allow(clippy::cast_possible_truncation)]
    fn to_blob(&self) -> Blob {
        Blob {
            x: self.min_x,
            y: self.min_y,
            width: self.max_x - self.min_x + 1,
            height: self.max_y - self.min_y + 1,
            cx: (self.sum_x / self.area) as u32,
            cy: (self.sum_y / self.area) as u32,
            area: self.area_u32(),
        }
    }
}

/// Fold one finished component into the stats and, if large enough,
/// the output list.
fn emit(component: &Component, min_area: u32, stats: &mut LabelStats, out: &mut Vec<Blob>) {
    stats.components += 1;
    stats.largest_area = stats.largest_area.max(component.area_u32());
    if component.area >= u64::from(min_area) {
        out.push(component.to_blob());
    } else {
        stats.discarded += 1;
    }
}

/// Queue-based breadth-first flood fill.
///
/// The queue holds `u32` pixel indices and is sized for the worst case
/// (every pixel foreground) by a fallible [`reserve`](Self::reserve),
/// optionally bounded by an entry limit modelling scarce internal RAM.
#[derive(Debug)]
pub struct FloodFill {
    queue: VecDeque<u32>,
    limit: Option<usize>,
}

impl FloodFill {
    /// Create a labeler with an empty, unbounded queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            limit: None,
        }
    }

    /// Create a labeler whose queue may never hold more than `entries`.
    #[must_use]
    pub const fn with_queue_limit(entries: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            limit: Some(entries),
        }
    }

    /// Current queue capacity in entries.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Make room for labeling an image of `pixels` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AllocationFailure`] if the queue cannot
    /// hold `pixels` entries: indices past `u32::MAX`, a request over
    /// the queue limit, or a failed allocation. The queue is left as it
    /// was.
    pub fn reserve(&mut self, pixels: usize) -> Result<(), PipelineError> {
        let bytes = pixels.saturating_mul(size_of::<u32>());
        let fits = u32::try_from(pixels).is_ok() && self.limit.is_none_or(|limit| pixels <= limit);
        if !fits {
            return Err(PipelineError::AllocationFailure { bytes });
        }
        self.queue.clear();
        self.queue
            .try_reserve(pixels)
            .map_err(|_| PipelineError::AllocationFailure { bytes })
    }
}

impl Default for FloodFill {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobLabeler for FloodFill {
    fn label(
        &mut self,
        mask: &mut [u8],
        dims: Dimensions,
        min_area: u32,
        out: &mut Vec<Blob>,
    ) -> LabelStats {
        let mut stats = LabelStats::default();
        let len = dims.pixel_count();
        if len == 0 {
            return stats;
        }
        if u32::try_from(len).is_err() {
            tracing::error!(%dims, "image too large for flood fill indices, skipping");
            return stats;
        }
        let mask = &mut mask[..len];
        let width = dims.width as usize;
        let height = dims.height as usize;

        // Pixels are cleared when enqueued, so each is queued at most once
        // and a queue reserved for `len` entries never reallocates.
        if let Err(err) = self.reserve(len) {
            tracing::warn!(error = %err, "flood fill queue not reserved, growing on demand");
            self.queue.clear();
        }

        for start in 0..len {
            if mask[start] != FOREGROUND {
                continue;
            }
            mask[start] = BACKGROUND;
            self.queue.push_back(index(start));

            let mut component = Component::at(start, coord(start % width), coord(start / width));

            while let Some(idx) = self.queue.pop_front() {
                let idx = idx as usize;
                let (x, y) = (idx % width, idx / width);
                component.add_pixel(coord(x), coord(y));

                let mut visit = |n: usize| {
                    if mask[n] == FOREGROUND {
                        mask[n] = BACKGROUND;
                        self.queue.push_back(index(n));
                    }
                };
                if x + 1 < width {
                    visit(idx + 1);
                }
                if x > 0 {
                    visit(idx - 1);
                }
                if y + 1 < height {
                    visit(idx + width);
                }
                if y > 0 {
                    visit(idx - width);
                }
            }

            emit(&component, min_area, &mut stats, out);
        }

        stats
    }
}

/// Narrow a pixel index for the flood fill queue. [`FloodFill`] only
/// labels images of at most `u32::MAX` pixels.
#[allow(clippy::cast_possible_truncation)]
const fn index(i: usize) -> u32 {
    i as u32
}

/// Narrow a coordinate that came from a `u32` dimension.
#[allow(clippy::cast_possible_truncation)]
const fn coord(v: usize) -> u32 {
    v as u32
}

/// A horizontal run of foreground pixels, `[start, end)` on one row.
#[derive(Debug, Clone, Copy)]
struct Run {
    start: u32,
    end: u32,
    node: usize,
}

/// A union-find node: one per run, carrying stats while it is a root.
#[derive(Debug, Clone, Copy)]
struct Node {
    parent: usize,
    component: Component,
}

/// Run-length labeling with union-find over runs.
#[derive(Debug, Default)]
pub struct RunLength {
    nodes: Vec<Node>,
    prev: Vec<Run>,
    curr: Vec<Run>,
    roots: Vec<Component>,
}

impl RunLength {
    /// Create a labeler with empty scratch space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&mut self, mut n: usize) -> usize {
        let mut root = n;
        while self.nodes[root].parent != root {
            root = self.nodes[root].parent;
        }
        while self.nodes[n].parent != root {
            let next = self.nodes[n].parent;
            self.nodes[n].parent = root;
            n = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        // Keep the older node as root; its stats absorb the other's.
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        let absorbed = self.nodes[child].component;
        self.nodes[child].parent = root;
        self.nodes[root].component.merge(&absorbed);
    }
}

impl BlobLabeler for RunLength {
    fn label(
        &mut self,
        mask: &mut [u8],
        dims: Dimensions,
        min_area: u32,
        out: &mut Vec<Blob>,
    ) -> LabelStats {
        let mut stats = LabelStats::default();
        if dims.is_empty() {
            return stats;
        }
        let width = dims.width as usize;

        self.nodes.clear();
        self.prev.clear();
        self.curr.clear();

        for y in 0..dims.height {
            let row_start = y as usize * width;
            let row = &mut mask[row_start..row_start + width];

            let mut x = 0;
            while x < width {
                if row[x] != FOREGROUND {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < width && row[x] == FOREGROUND {
                    row[x] = BACKGROUND;
                    x += 1;
                }
                let (start, end) = (coord(start), coord(x));
                let node = self.nodes.len();
                let mut component = Component::at(row_start + start as usize, start, y);
                component.add_run(start, end, y);
                self.nodes.push(Node {
                    parent: node,
                    component,
                });
                self.curr.push(Run { start, end, node });
            }

            // Both run lists are sorted by start; sweep them together and
            // union every overlapping pair.
            let (mut i, mut j) = (0, 0);
            while i < self.prev.len() && j < self.curr.len() {
                let (p, c) = (self.prev[i], self.curr[j]);
                if p.start < c.end && c.start < p.end {
                    self.union(p.node, c.node);
                }
                if p.end < c.end {
                    i += 1;
                } else {
                    j += 1;
                }
            }

            std::mem::swap(&mut self.prev, &mut self.curr);
            self.curr.clear();
        }

        self.roots.clear();
        for n in 0..self.nodes.len() {
            if self.nodes[n].parent == n {
                self.roots.push(self.nodes[n].component);
            }
        }
        self.roots.sort_unstable_by_key(|c| c.first);
        for component in &self.roots {
            emit(component, min_area, &mut stats, out);
        }

        stats
    }
}

/// Owns the scratch space of every labeling strategy so it survives
/// between frames.
#[derive(Debug, Default)]
pub struct BlobDetector {
    flood_fill: FloodFill,
    run_length: RunLength,
}

impl BlobDetector {
    /// Create a detector with empty scratch space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector around a caller-built flood fill, e.g. one
    /// with a queue limit.
    #[must_use]
    pub fn with_flood_fill(flood_fill: FloodFill) -> Self {
        Self {
            flood_fill,
            run_length: RunLength::new(),
        }
    }

    /// Reserve the scratch space `kind` needs for an image of `pixels`
    /// pixels, so that [`detect`](Self::detect) does not allocate for it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AllocationFailure`] if the flood fill
    /// queue cannot be reserved. Run-length scratch grows with the
    /// number of runs and is not reserved ahead.
    pub fn prepare(&mut self, kind: BlobLabelerKind, pixels: usize) -> Result<(), PipelineError> {
        match kind {
            BlobLabelerKind::FloodFill => self.flood_fill.reserve(pixels),
            BlobLabelerKind::RunLength => Ok(()),
        }
    }

    /// Clear `out` and fill it with the blobs in `mask`.
    pub fn detect(
        &mut self,
        kind: BlobLabelerKind,
        mask: &mut [u8],
        dims: Dimensions,
        min_area: u32,
        out: &mut Vec<Blob>,
    ) -> LabelStats {
        out.clear();
        match kind {
            BlobLabelerKind::FloodFill => self.flood_fill.label(mask, dims, min_area, out),
            BlobLabelerKind::RunLength => self.run_length.label(mask, dims, min_area, out),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const KINDS: [BlobLabelerKind; 2] = [BlobLabelerKind::FloodFill, BlobLabelerKind::RunLength];

    /// Build a mask from ASCII art: `#` is foreground.
    fn mask_from(rows: &[&str]) -> (Vec<u8>, Dimensions) {
        let width = rows[0].len();
        let mask = rows
            .iter()
            .flat_map(|r| r.bytes())
            .map(|b| if b == b'#' { FOREGROUND } else { BACKGROUND })
            .collect();
        (
            mask,
            Dimensions::new(
                u32::try_from(width).unwrap(),
                u32::try_from(rows.len()).unwrap(),
            ),
        )
    }

    fn detect(kind: BlobLabelerKind, rows: &[&str], min_area: u32) -> (Vec<Blob>, LabelStats) {
        let (mut mask, dims) = mask_from(rows);
        let mut out = Vec::new();
        let stats = BlobDetector::new().detect(kind, &mut mask, dims, min_area, &mut out);
        assert!(mask.iter().all(|&p| p == BACKGROUND), "mask not consumed");
        (out, stats)
    }

    /// Deterministic pseudo-random mask (LCG), roughly `density`% foreground.
    fn noise_mask(dims: Dimensions, density: u32, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..dims.pixel_count())
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                if (state >> 16) % 100 < density {
                    FOREGROUND
                } else {
                    BACKGROUND
                }
            })
            .collect()
    }

    #[test]
    fn empty_mask_yields_no_blobs() {
        for kind in KINDS {
            let (blobs, stats) = detect(kind, &["....", "....", "...."], 1);
            assert!(blobs.is_empty());
            assert_eq!(stats, LabelStats::default());
        }
    }

    #[test]
    fn single_square_statistics() {
        for kind in KINDS {
            let (blobs, _) = detect(kind, &["......", ".###..", ".###..", ".###..", "......"], 1);
            assert_eq!(
                blobs,
                vec![Blob {
                    x: 1,
                    y: 1,
                    width: 3,
                    height: 3,
                    cx: 2,
                    cy: 2,
                    area: 9,
                }],
                "{kind}"
            );
        }
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        for kind in KINDS {
            let (blobs, stats) = detect(kind, &["#.", ".#"], 1);
            assert_eq!(blobs.len(), 2, "{kind}");
            assert_eq!(stats.components, 2);
        }
    }

    #[test]
    fn centroid_truncates() {
        // Pixels at x = 0, 1 on one row: mean x = 0.5 -> 0.
        for kind in KINDS {
            let (blobs, _) = detect(kind, &["##"], 1);
            assert_eq!(blobs[0].cx, 0, "{kind}");
            assert_eq!(blobs[0].cy, 0);
        }
    }

    #[test]
    fn small_components_are_filtered_but_consumed() {
        for kind in KINDS {
            let (blobs, stats) = detect(kind, &["#....", ".....", "..###", "..###"], 3);
            assert_eq!(blobs.len(), 1, "{kind}");
            assert_eq!(blobs[0].area, 6);
            assert_eq!(stats.components, 2);
            assert_eq!(stats.discarded, 1);
            assert_eq!(stats.largest_area, 6);
        }
    }

    #[test]
    fn area_equal_to_minimum_is_kept() {
        for kind in KINDS {
            let (blobs, _) = detect(kind, &["###"], 3);
            assert_eq!(blobs.len(), 1, "{kind}");
        }
    }

    #[test]
    fn blobs_ordered_by_first_pixel() {
        // The U-shape's first pixel (0,0) precedes the dot at (2,0),
        // even though the U's right arm starts further along row 0.
        for kind in KINDS {
            let (blobs, _) = detect(kind, &["#.#.#", "#...#", "#####"], 1);
            assert_eq!(blobs.len(), 2, "{kind}");
            assert_eq!((blobs[0].x, blobs[0].y), (0, 0));
            assert_eq!(blobs[0].area, 9);
            assert_eq!((blobs[1].x, blobs[1].y), (2, 0));
            assert_eq!(blobs[1].area, 1);
        }
    }

    #[test]
    fn u_shape_merges_late() {
        // Two arms only joined on the last row.
        for kind in KINDS {
            let (blobs, stats) = detect(kind, &["#..#", "#..#", "####"], 1);
            assert_eq!(stats.components, 1, "{kind}");
            assert_eq!(
                blobs[0],
                Blob {
                    x: 0,
                    y: 0,
                    width: 4,
                    height: 3,
                    cx: 1,
                    cy: 1,
                    area: 8,
                }
            );
        }
    }

    #[test]
    fn non_foreground_gray_values_are_ignored() {
        let dims = Dimensions::new(3, 1);
        for kind in KINDS {
            let mut mask = vec![254, FOREGROUND, 128];
            let mut out = Vec::new();
            BlobDetector::new().detect(kind, &mut mask, dims, 1, &mut out);
            assert_eq!(out.len(), 1, "{kind}");
            assert_eq!(out[0].x, 1);
        }
    }

    #[test]
    fn detect_clears_previous_results() {
        let mut detector = BlobDetector::new();
        let mut out = vec![Blob {
            x: 9,
            y: 9,
            width: 1,
            height: 1,
            cx: 9,
            cy: 9,
            area: 1,
        }];
        let (mut mask, dims) = mask_from(&["...", "..."]);
        detector.detect(BlobLabelerKind::FloodFill, &mut mask, dims, 1, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn frame_filling_blob() {
        let dims = Dimensions::new(64, 48);
        for kind in KINDS {
            let mut mask = vec![FOREGROUND; dims.pixel_count()];
            let mut out = Vec::new();
            BlobDetector::new().detect(kind, &mut mask, dims, 1, &mut out);
            assert_eq!(out.len(), 1, "{kind}");
            assert_eq!(out[0].area, 64 * 48);
            assert_eq!((out[0].width, out[0].height), (64, 48));
            // mean of 0..64 = 31.5 -> 31, mean of 0..48 = 23.5 -> 23
            assert_eq!((out[0].cx, out[0].cy), (31, 23));
        }
    }

    #[test]
    fn flood_fill_queue_reserved_for_worst_case() {
        let dims = Dimensions::new(16, 16);
        let mut labeler = FloodFill::new();
        let mut mask = vec![FOREGROUND; dims.pixel_count()];
        labeler.label(&mut mask, dims, 1, &mut Vec::new());
        assert!(labeler.queue_capacity() >= dims.pixel_count());
    }

    #[test]
    fn flood_fill_queue_is_four_bytes_per_pixel() {
        let dims = Dimensions::new(320, 240);
        let mut labeler = FloodFill::new();
        labeler.reserve(dims.pixel_count()).unwrap();
        let capacity = labeler.queue_capacity();
        assert!(capacity >= dims.pixel_count());
        // VecDeque rounds up, but never past twice the request.
        assert!(capacity * size_of::<u32>() < 2 * 4 * dims.pixel_count());
    }

    #[test]
    fn flood_fill_reserve_over_limit_fails() {
        let mut labeler = FloodFill::with_queue_limit(100);
        assert!(labeler.reserve(100).is_ok());
        assert_eq!(
            labeler.reserve(101),
            Err(PipelineError::AllocationFailure { bytes: 404 })
        );
    }

    #[test]
    fn flood_fill_reserve_past_index_range_fails() {
        let mut labeler = FloodFill::new();
        assert!(matches!(
            labeler.reserve(usize::MAX),
            Err(PipelineError::AllocationFailure { .. })
        ));
        assert_eq!(labeler.queue_capacity(), 0);
    }

    #[test]
    fn flood_fill_over_limit_still_labels() {
        let (mut mask, dims) = mask_from(&["##.", "#..", "..#"]);
        let mut out = Vec::new();
        let stats = FloodFill::with_queue_limit(2).label(&mut mask, dims, 1, &mut out);
        assert_eq!(stats.components, 2);
        assert_eq!(out[0].area, 3);
        assert_eq!(out[1].area, 1);
    }

    #[test]
    fn prepare_only_reserves_for_flood_fill() {
        let mut detector = BlobDetector::with_flood_fill(FloodFill::with_queue_limit(10));
        assert!(detector.prepare(BlobLabelerKind::RunLength, 1_000).is_ok());
        assert!(detector.prepare(BlobLabelerKind::FloodFill, 10).is_ok());
        assert!(detector.prepare(BlobLabelerKind::FloodFill, 11).is_err());
    }

    #[test]
    fn strategies_agree_on_noise() {
        let dims = Dimensions::new(37, 29);
        for (seed, density) in [(1, 30), (7, 50), (42, 65), (99, 80)] {
            let noise = noise_mask(dims, density, seed);

            let mut a = noise.clone();
            let mut b = noise;
            let mut blobs_a = Vec::new();
            let mut blobs_b = Vec::new();
            let mut detector = BlobDetector::new();
            let stats_a =
                detector.detect(BlobLabelerKind::FloodFill, &mut a, dims, 2, &mut blobs_a);
            let stats_b =
                detector.detect(BlobLabelerKind::RunLength, &mut b, dims, 2, &mut blobs_b);

            assert_eq!(blobs_a, blobs_b, "seed={seed} density={density}");
            assert_eq!(stats_a, stats_b);
        }
    }

    #[test]
    fn areas_match_imageproc_labelling() {
        use imageproc::region_labelling::{Connectivity, connected_components};

        let dims = Dimensions::new(40, 30);
        let noise = noise_mask(dims, 45, 1234);
        let image = image::GrayImage::from_raw(dims.width, dims.height, noise.clone()).unwrap();
        let labels = connected_components(&image, Connectivity::Four, image::Luma([BACKGROUND]));

        let mut expected: std::collections::BTreeMap<u32, u32> = std::collections::BTreeMap::new();
        for p in labels.pixels() {
            if p.0[0] != 0 {
                *expected.entry(p.0[0]).or_default() += 1;
            }
        }
        let mut expected_areas: Vec<u32> = expected.into_values().collect();
        expected_areas.sort_unstable();

        for kind in KINDS {
            let mut mask = noise.clone();
            let mut out = Vec::new();
            BlobDetector::new().detect(kind, &mut mask, dims, 0, &mut out);
            let mut areas: Vec<u32> = out.iter().map(|b| b.area).collect();
            areas.sort_unstable();
            assert_eq!(areas, expected_areas, "{kind}");
        }
    }

    #[test]
    fn labeler_kind_tag_round_trip() {
        for kind in KINDS {
            assert_eq!(BlobLabelerKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(BlobLabelerKind::from_u8(7), None);
    }
}
