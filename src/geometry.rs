use emath::{pos2, Pos2};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Axis aligned pixel box in image coordinates. `left`/`top` are inclusive,
/// `right()`/`bottom()` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(top: i32, left: i32, width: u32, height: u32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.left + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right() && y >= self.top && y < self.bottom()
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > left && bottom > top).then(|| {
            BoundingBox::new(top, left, (right - left) as u32, (bottom - top) as u32)
        })
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersection(other).is_some()
    }

    /// Overlapping or sharing at least one edge segment.
    pub fn touches(&self, other: &BoundingBox) -> bool {
        let horizontal = self.left <= other.right() && other.left <= self.right();
        let vertical = self.top <= other.bottom() && other.top <= self.bottom();
        let corner_only = (self.left == other.right() || other.left == self.right())
            && (self.top == other.bottom() || other.top == self.bottom());
        horizontal && vertical && !corner_only
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(top, left, (right - left) as u32, (bottom - top) as u32)
    }

    pub fn padded(&self, padding: u32) -> BoundingBox {
        BoundingBox::new(
            self.top - padding as i32,
            self.left - padding as i32,
            self.width + 2 * padding,
            self.height + 2 * padding,
        )
    }

    /// Restricts the box to `0..width` x `0..height`.
    pub fn clamped(&self, width: u32, height: u32) -> Option<BoundingBox> {
        self.intersection(&BoundingBox::new(0, 0, width, height))
    }

    /// Smallest box containing every pixel touched by `points`, grown by `padding`.
    pub fn from_points(points: impl IntoIterator<Item = Pos2>, padding: u32) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = points.into_iter().fold(
            None,
            |acc: Option<(f32, f32, f32, f32)>, p| {
                Some(match acc {
                    None => (p.x, p.y, p.x, p.y),
                    Some((a, b, c, d)) => (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
                })
            },
        )?;
        let left = min_x.floor() as i32;
        let top = min_y.floor() as i32;
        let right = max_x.floor() as i32 + 1;
        let bottom = max_y.floor() as i32 + 1;
        Some(
            BoundingBox::new(top, left, (right - left) as u32, (bottom - top) as u32)
                .padded(padding),
        )
    }

    /// `[top, left, width, height]`, the layout of persisted records.
    pub fn to_array(&self) -> [i32; 4] {
        [self.top, self.left, self.width as i32, self.height as i32]
    }
}

/// Outer boundary of a region plus its holes, in absolute image coordinates.
/// Rings are closed implicitly (the last vertex connects to the first).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub outer: Vec<Pos2>,
    pub holes: Vec<Vec<Pos2>>,
}

impl Polygon {
    pub fn new(outer: Vec<Pos2>, holes: Vec<Vec<Pos2>>) -> Self {
        Self { outer, holes }
    }

    pub fn from_ring(outer: Vec<Pos2>) -> Self {
        Self::new(outer, Vec::new())
    }

    pub fn rings(&self) -> impl Iterator<Item = &[Pos2]> + '_ {
        std::iter::once(self.outer.as_slice()).chain(self.holes.iter().map(Vec::as_slice))
    }

    /// Shoelace area of the outer ring minus the holes.
    pub fn area(&self) -> f64 {
        signed_area(&self.outer).abs()
            - self
                .holes
                .iter()
                .map(|h| signed_area(h).abs())
                .sum::<f64>()
    }

    /// Summed edge length of all rings.
    pub fn perimeter(&self) -> f64 {
        self.rings().map(|r| ring_length(r, true)).sum()
    }

    pub fn centroid(&self) -> Option<Pos2> {
        let (outer_area, outer_centroid) = ring_centroid(&self.outer)?;
        let (mut area, mut cx, mut cy) = (
            outer_area,
            outer_area * outer_centroid.0,
            outer_area * outer_centroid.1,
        );
        for (hole_area, (hx, hy)) in self.holes.iter().filter_map(|h| ring_centroid(h)) {
            area -= hole_area;
            cx -= hole_area * hx;
            cy -= hole_area * hy;
        }
        (area > 0.0).then(|| pos2((cx / area) as f32, (cy / area) as f32))
    }

    /// Pixels touched by the outer ring. Vertices are pixel corners, so the
    /// maximum coordinates are already exclusive.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let (min, max) = self
            .outer
            .iter()
            .fold(None, |acc: Option<(Pos2, Pos2)>, p| {
                Some(acc.map_or((*p, *p), |(min, max)| (min.min(*p), max.max(*p))))
            })?;
        let (left, top) = (min.x.floor() as i32, min.y.floor() as i32);
        let (right, bottom) = (max.x.ceil() as i32, max.y.ceil() as i32);
        Some(BoundingBox::new(
            top,
            left,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    pub fn is_degenerate(&self) -> bool {
        distinct_count(&self.outer) < 3 || signed_area(&self.outer) == 0.0
    }
}

/// Shoelace formula; positive for rings running clockwise on screen (y down).
pub fn signed_area(ring: &[Pos2]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    ring.iter()
        .circular_tuple_windows()
        .map(|(a, b)| a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64)
        .sum::<f64>()
        / 2.0
}

pub fn ring_length(points: &[Pos2], closed: bool) -> f64 {
    let open: f64 = points
        .iter()
        .tuple_windows()
        .map(|(a, b)| a.distance(*b) as f64)
        .sum();
    match (closed, points.first(), points.last()) {
        (true, Some(first), Some(last)) if points.len() > 2 => {
            open + first.distance(*last) as f64
        }
        _ => open,
    }
}

fn ring_centroid(ring: &[Pos2]) -> Option<(f64, (f64, f64))> {
    let area = signed_area(ring);
    if area == 0.0 {
        return None;
    }
    let (cx, cy) = ring
        .iter()
        .circular_tuple_windows()
        .fold((0.0, 0.0), |(cx, cy), (a, b)| {
            let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
            let cross = ax * by - bx * ay;
            (cx + (ax + bx) * cross, cy + (ay + by) * cross)
        });
    Some((area.abs(), (cx / (6.0 * area), cy / (6.0 * area))))
}

fn distinct_count(points: &[Pos2]) -> usize {
    points
        .iter()
        .map(|p| (p.x.to_bits(), p.y.to_bits()))
        .unique()
        .count()
}

/// A free-hand closed curve needs three distinct points and an end that snaps
/// back to its start.
pub fn is_valid_closed_curve(points: &[Pos2], snap_tolerance: f32) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => {
            distinct_count(points) >= 3 && first.distance(*last) <= snap_tolerance
        }
        _ => false,
    }
}

/// Drops every vertex closer than `min_distance` to the previously kept one.
pub fn prune_close_vertices(points: &[Pos2], min_distance: f32) -> Vec<Pos2> {
    let mut result: Vec<Pos2> = Vec::with_capacity(points.len());
    for p in points {
        match result.last() {
            Some(last) if last.distance(*p) < min_distance => {}
            _ => result.push(*p),
        }
    }
    result
}

/// Douglas-Peucker simplification of an open polyline.
pub fn simplify(points: &[Pos2], epsilon: f32) -> Vec<Pos2> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let (first, last) = (points[0], points[points.len() - 1]);
    let (index, distance) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1, segment_distance(*p, first, last)))
        .fold((0, 0.0f32), |acc, x| if x.1 > acc.1 { x } else { acc });

    if distance > epsilon {
        let mut left = simplify(&points[..=index], epsilon);
        let right = simplify(&points[index..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Distance from `p` to the segment `a`-`b`.
pub fn segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Inserts vertices so that no edge of the closed ring is longer than `step`.
pub fn densify_ring(ring: &[Pos2], step: f32) -> Vec<Pos2> {
    let mut result = Vec::with_capacity(ring.len());
    for (a, b) in ring.iter().circular_tuple_windows() {
        let n = (a.distance(*b) / step).ceil().max(1.0) as usize;
        result.extend((0..n).map(|i| a.lerp(*b, i as f32 / n as f32)));
    }
    result
}

pub fn nearest_vertex(ring: &[Pos2], p: Pos2) -> Option<(usize, f32)> {
    ring.iter()
        .enumerate()
        .map(|(i, v)| (i, v.distance(p)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(left: f32, top: f32, size: f32) -> Vec<Pos2> {
        vec![
            pos2(left, top),
            pos2(left + size, top),
            pos2(left + size, top + size),
            pos2(left, top + size),
        ]
    }

    #[test]
    fn area_and_perimeter_of_square_with_hole() {
        let mut hole = square(2.0, 2.0, 2.0);
        hole.reverse();
        let polygon = Polygon::new(square(0.0, 0.0, 6.0), vec![hole]);
        assert_eq!(polygon.area(), 32.0);
        assert_eq!(polygon.perimeter(), 24.0 + 8.0);
        assert_eq!(polygon.centroid(), Some(pos2(3.0, 3.0)));
    }

    #[test]
    fn clockwise_on_screen_is_positive() {
        assert_eq!(signed_area(&square(0.0, 0.0, 2.0)), 4.0);
    }

    #[test]
    fn closed_curve_must_snap() {
        let mut curve = square(0.0, 0.0, 10.0);
        curve.push(pos2(1.0, 1.0));
        assert!(is_valid_closed_curve(&curve, 2.0));
        curve.push(pos2(0.0, 8.0));
        assert!(!is_valid_closed_curve(&curve, 2.0));
        assert!(!is_valid_closed_curve(
            &[pos2(0.0, 0.0), pos2(1.0, 0.0), pos2(0.0, 0.0)],
            2.0
        ));
    }

    #[test]
    fn touching_boxes() {
        let a = BoundingBox::new(0, 0, 2, 2);
        assert!(a.touches(&BoundingBox::new(0, 2, 2, 2)));
        assert!(!a.touches(&BoundingBox::new(2, 2, 2, 2)));
        assert!(!a.touches(&BoundingBox::new(0, 3, 2, 2)));
        assert!(!a.intersects(&BoundingBox::new(0, 2, 2, 2)));
    }

    #[test]
    fn box_from_points_covers_pixels() {
        let b = BoundingBox::from_points([pos2(1.5, 2.2), pos2(4.0, 3.9)], 1).unwrap();
        assert_eq!(b, BoundingBox::new(1, 0, 6, 4));
    }

    #[test]
    fn polygon_box_uses_corner_coordinates() {
        let square = Polygon::from_ring(vec![
            pos2(0.0, 0.0),
            pos2(2.0, 0.0),
            pos2(2.0, 2.0),
            pos2(0.0, 2.0),
        ]);
        assert_eq!(square.bounding_box(), Some(BoundingBox::new(0, 0, 2, 2)));
        let curve = Polygon::from_ring(vec![pos2(1.5, 2.2), pos2(4.0, 2.5), pos2(3.0, 3.9)]);
        assert_eq!(curve.bounding_box(), Some(BoundingBox::new(2, 1, 3, 2)));
        assert_eq!(Polygon::default().bounding_box(), None);
    }

    #[test]
    fn simplify_drops_collinear_points() {
        let line = [pos2(0.0, 0.0), pos2(1.0, 0.01), pos2(2.0, 0.0), pos2(2.0, 5.0)];
        assert_eq!(
            simplify(&line, 0.1),
            vec![pos2(0.0, 0.0), pos2(2.0, 0.0), pos2(2.0, 5.0)]
        );
    }

    #[test]
    fn prune_keeps_distant_vertices() {
        let points = [pos2(0.0, 0.0), pos2(0.2, 0.0), pos2(1.5, 0.0)];
        assert_eq!(
            prune_close_vertices(&points, 1.0),
            vec![pos2(0.0, 0.0), pos2(1.5, 0.0)]
        );
    }
}
