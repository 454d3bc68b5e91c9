use emath::Pos2;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, Canvas};
use itertools::Itertools;

/// Draws the open polyline `points` (image coordinates) onto `canvas`, whose
/// pixel (0, 0) sits at image position `origin`. A `width` of 0 or 1 gives an
/// 8-connected one pixel line, wider strokes stamp discs along the path.
pub(crate) fn stroke_polyline<C: Canvas>(
    canvas: &mut C,
    points: &[Pos2],
    origin: (i32, i32),
    width: u32,
    color: C::Pixel,
) {
    let local = |p: &Pos2| {
        (
            (p.x - origin.0 as f32).floor(),
            (p.y - origin.1 as f32).floor(),
        )
    };
    let radius = (width / 2) as i32;

    if let [single] = points {
        let (x, y) = local(single);
        draw_filled_circle_mut(canvas, (x as i32, y as i32), radius, color);
        return;
    }

    for (a, b) in points.iter().map(local).tuple_windows() {
        draw_line_segment_mut(canvas, a, b, color);
        if width > 1 {
            let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs()).max(1.0) as i32;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                let center = (
                    (a.0 + t * (b.0 - a.0)).round() as i32,
                    (a.1 + t * (b.1 - a.1)).round() as i32,
                );
                draw_filled_circle_mut(canvas, center, radius, color);
            }
        }
    }
}
