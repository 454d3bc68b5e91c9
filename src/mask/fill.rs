use emath::Pos2;
use itertools::Itertools;

use super::Mask;
use crate::{error::RegionError, BoundingBox, Polygon};

/// Rasterizes `polygon` into a mask covering `bbox`. The outer ring is filled
/// with the nonzero rule, so self intersecting free-hand curves collapse to
/// their covered area; every hole is then cleared the same way.
pub fn polygon_to_mask(polygon: &Polygon, bbox: BoundingBox) -> Result<Mask, RegionError> {
    if polygon.is_degenerate() {
        return Err(RegionError::invalid(format!(
            "polygon with {} vertices has no area",
            polygon.outer.len()
        )));
    }
    if bbox.is_empty() {
        return Err(RegionError::invalid("target box is empty"));
    }

    let mut mask = Mask::empty(bbox);
    fill_ring(&mut mask, &polygon.outer, true);
    for hole in &polygon.holes {
        fill_ring(&mut mask, hole, false);
    }
    Ok(mask)
}

/// Sets every pixel of `mask` whose centre lies inside `ring` (nonzero
/// winding) to `value`.
pub fn fill_ring(mask: &mut Mask, ring: &[Pos2], value: bool) {
    if ring.len() < 3 {
        return;
    }
    let bbox = mask.bbox();
    let mut crossings: Vec<(f32, i32)> = Vec::new();

    for y in bbox.top..bbox.bottom() {
        let yc = y as f32 + 0.5;
        crossings.clear();
        for (a, b) in ring.iter().circular_tuple_windows() {
            let winding = if a.y <= yc && b.y > yc {
                1
            } else if b.y <= yc && a.y > yc {
                -1
            } else {
                continue;
            };
            let t = (yc - a.y) / (b.y - a.y);
            crossings.push((a.x + t * (b.x - a.x), winding));
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for ((x0, w), (x1, _)) in crossings.iter().tuple_windows() {
            winding += w;
            if winding == 0 {
                continue;
            }
            // Pixel centres x + 0.5 in [x0, x1).
            let start = (x0 - 0.5).ceil() as i32;
            let end = (x1 - 0.5).ceil() as i32;
            for x in start.max(bbox.left)..end.min(bbox.right()) {
                mask.set(x, y, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use emath::pos2;

    use super::*;

    #[test]
    fn fills_pixel_centres_inside() {
        let polygon = Polygon::from_ring(vec![
            pos2(1.0, 1.0),
            pos2(4.0, 1.0),
            pos2(4.0, 3.0),
            pos2(1.0, 3.0),
        ]);
        let mask = polygon_to_mask(&polygon, BoundingBox::new(0, 0, 6, 6)).unwrap();
        assert_eq!(mask.count(), 6);
        assert!(mask.get(1, 1));
        assert!(mask.get(3, 2));
        assert!(!mask.get(4, 2));
        assert!(!mask.get(1, 3));
    }

    #[test]
    fn orientation_does_not_matter() {
        let mut ring = vec![
            pos2(0.0, 0.0),
            pos2(3.0, 0.0),
            pos2(3.0, 3.0),
            pos2(0.0, 3.0),
        ];
        let bbox = BoundingBox::new(0, 0, 3, 3);
        let clockwise = polygon_to_mask(&Polygon::from_ring(ring.clone()), bbox).unwrap();
        ring.reverse();
        let counter = polygon_to_mask(&Polygon::from_ring(ring), bbox).unwrap();
        assert_eq!(clockwise, counter);
        assert_eq!(clockwise.count(), 9);
    }

    #[test]
    fn self_intersecting_curve_uses_nonzero_rule() {
        // A square traversed twice winds 2 everywhere inside.
        let square = [
            pos2(0.0, 0.0),
            pos2(4.0, 0.0),
            pos2(4.0, 4.0),
            pos2(0.0, 4.0),
        ];
        let twice = square.iter().chain(square.iter()).copied().collect();
        let mask = polygon_to_mask(&Polygon::from_ring(twice), BoundingBox::new(0, 0, 4, 4))
            .unwrap();
        assert_eq!(mask.count(), 16);
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        let line = Polygon::from_ring(vec![pos2(0.0, 0.0), pos2(5.0, 5.0), pos2(10.0, 10.0)]);
        assert!(matches!(
            polygon_to_mask(&line, BoundingBox::new(0, 0, 10, 10)),
            Err(RegionError::InvalidGeometry(_))
        ));
    }
}
