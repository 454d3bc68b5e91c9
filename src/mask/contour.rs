//! Boundary tracing between foreground and background pixels.
//!
//! The tracer walks the pixel cracks (the unit edges separating a foreground
//! pixel from a background one), which is marching squares evaluated on the
//! pixel corner grid. Rings keep the foreground on their right hand side, so
//! outer rings have positive [`signed_area`](crate::geometry::signed_area) and
//! holes negative. Collinear crack steps are merged, leaving only corners.
//!
//! At a saddle corner (two foreground pixels touching diagonally) the walk
//! turns right, which keeps the two pixels apart and connects the background
//! through the corner. This matches 4-connectivity of the foreground. A region
//! joined only through such a one pixel pinch is therefore traced as two
//! separate pieces.

use std::collections::{HashMap, HashSet};

use emath::{pos2, Pos2};
use image::Luma;

use super::{LabelImage, Mask};
use crate::{error::RegionError, geometry::signed_area, Polygon};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Dir {
    Right,
    Down,
    Left,
    Up,
}

impl Dir {
    fn step(self, (x, y): (i32, i32)) -> (i32, i32) {
        match self {
            Dir::Right => (x + 1, y),
            Dir::Down => (x, y + 1),
            Dir::Left => (x - 1, y),
            Dir::Up => (x, y - 1),
        }
    }

    fn turn_right(self) -> Dir {
        match self {
            Dir::Right => Dir::Down,
            Dir::Down => Dir::Left,
            Dir::Left => Dir::Up,
            Dir::Up => Dir::Right,
        }
    }
}

/// Traces the outer boundary and the holes of the largest 4-connected
/// component of `mask`. Coordinates are absolute image coordinates of pixel
/// corners.
pub fn mask_to_polygon(mask: &Mask) -> Result<Polygon, RegionError> {
    let labels = mask.labels();
    let largest = largest_label(&labels).ok_or(RegionError::EmptyRegion)?;
    trace_component(&labels, largest, (mask.bbox().left, mask.bbox().top))
}

/// Label of the component with the most pixels; ties go to the lower label.
pub(crate) fn largest_label(labels: &LabelImage) -> Option<u32> {
    let mut sizes: Vec<u64> = Vec::new();
    for Luma([label]) in labels.pixels() {
        let idx = *label as usize;
        if sizes.len() <= idx {
            sizes.resize(idx + 1, 0);
        }
        sizes[idx] += 1;
    }
    sizes
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .max_by_key(|(_, size)| **size)
        .filter(|(_, size)| **size > 0)
        .map(|(label, _)| label as u32)
}

/// Polygon around the pixels of `labels` equal to `label`. `origin` places
/// the label image in image space.
pub(crate) fn trace_component(
    labels: &LabelImage,
    label: u32,
    (left, top): (i32, i32),
) -> Result<Polygon, RegionError> {
    let mut outer = None;
    let mut holes = Vec::new();
    for corners in trace_rings(labels, label) {
        let ring: Vec<Pos2> = corners
            .into_iter()
            .map(|(x, y)| pos2((x + left) as f32, (y + top) as f32))
            .collect();
        if signed_area(&ring) > 0.0 {
            outer = Some(ring);
        } else {
            holes.push(ring);
        }
    }

    let outer = outer.ok_or(RegionError::EmptyRegion)?;
    Ok(Polygon::new(outer, holes))
}

fn trace_rings(labels: &LabelImage, label: u32) -> Vec<Vec<(i32, i32)>> {
    let (width, height) = (labels.width() as i32, labels.height() as i32);
    let is_fg = |x: i32, y: i32| {
        x >= 0
            && y >= 0
            && x < width
            && y < height
            && labels.get_pixel(x as u32, y as u32)[0] == label
    };

    let mut cracks: Vec<((i32, i32), Dir)> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            if !is_fg(x, y) {
                continue;
            }
            if !is_fg(x, y - 1) {
                cracks.push(((x, y), Dir::Right));
            }
            if !is_fg(x + 1, y) {
                cracks.push(((x + 1, y), Dir::Down));
            }
            if !is_fg(x, y + 1) {
                cracks.push(((x + 1, y + 1), Dir::Left));
            }
            if !is_fg(x - 1, y) {
                cracks.push(((x, y + 1), Dir::Up));
            }
        }
    }

    let mut outgoing: HashMap<(i32, i32), Vec<Dir>> = HashMap::with_capacity(cracks.len());
    for (corner, dir) in &cracks {
        outgoing.entry(*corner).or_default().push(*dir);
    }

    let mut used: HashSet<((i32, i32), Dir)> = HashSet::with_capacity(cracks.len());
    let mut rings = Vec::new();
    for (start, start_dir) in cracks {
        if !used.insert((start, start_dir)) {
            continue;
        }
        let mut corners = Vec::new();
        let (mut corner, mut dir) = (start, start_dir);
        loop {
            corners.push((corner, dir));
            corner = dir.step(corner);
            let Some(next) = next_dir(&outgoing, corner, dir) else {
                break;
            };
            if (corner, next) == (start, start_dir) || !used.insert((corner, next)) {
                break;
            }
            dir = next;
        }

        rings.push(merge_collinear(&corners));
    }
    rings
}

/// Cracks leaving `corner`; a saddle corner has two and the walk turns right.
fn next_dir(
    outgoing: &HashMap<(i32, i32), Vec<Dir>>,
    corner: (i32, i32),
    incoming: Dir,
) -> Option<Dir> {
    match outgoing.get(&corner)?.as_slice() {
        [] => None,
        [only] => Some(*only),
        dirs => {
            let right = incoming.turn_right();
            dirs.iter().copied().find(|d| *d == right).or(dirs.first().copied())
        }
    }
}

fn merge_collinear(steps: &[((i32, i32), Dir)]) -> Vec<(i32, i32)> {
    let n = steps.len();
    (0..n)
        .filter(|&i| steps[(i + n - 1) % n].1 != steps[i].1)
        .map(|i| steps[i].0)
        .collect()
}
