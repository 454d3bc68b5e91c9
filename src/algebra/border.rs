use emath::Pos2;
use image::{GrayImage, RgbImage};
use log::debug;

use crate::{
    blob::Blob,
    error::{ExternalError, RegionError},
    geometry::{densify_ring, nearest_vertex, ring_length, signed_area},
    image_utils::crop_padded,
    mask::{fill_ring, polygon_to_mask, Mask},
    BoundingBox, Polygon,
};

/// Boundary snapping done outside of this crate, typically a graph cut.
///
/// Receives the image crop, the padded mask (0/1, same size as the crop) and
/// two weights, and returns the refined mask in the same frame.
pub trait BorderRefiner {
    fn refine(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
        weight_low: f32,
        weight_high: f32,
    ) -> Result<GrayImage, ExternalError>;
}

impl<F> BorderRefiner for F
where
    F: Fn(&RgbImage, &GrayImage, f32, f32) -> Result<GrayImage, ExternalError>,
{
    fn refine(
        &self,
        image: &RgbImage,
        mask: &GrayImage,
        weight_low: f32,
        weight_high: f32,
    ) -> Result<GrayImage, ExternalError> {
        self(image, mask, weight_low, weight_high)
    }
}

/// Replaces the part of the outer border between the two ends of `curve`.
///
/// Both ends must lie within `snap_distance` of the border. Of the two border
/// arcs between them the longer one is kept and the curve takes the place of
/// the shorter one. When both ends snap to the same spot, the curve is a loop
/// which is cut out of the blob if it starts inside, and added otherwise.
pub fn edit_border(blob: &mut Blob, curve: &[Pos2], snap_distance: f32) -> Result<(), RegionError> {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return Err(RegionError::invalid("empty border curve"));
    };
    if curve.len() < 2 {
        return Err(RegionError::invalid("border curve needs two points"));
    }

    let outer = densify_ring(&blob.contour().outer, 1.0);
    let (Some((start, start_distance)), Some((end, end_distance))) =
        (nearest_vertex(&outer, *first), nearest_vertex(&outer, *last))
    else {
        return Err(RegionError::EmptyRegion);
    };
    if start_distance > snap_distance || end_distance > snap_distance {
        return Err(RegionError::invalid(format!(
            "curve ends are {start_distance:.1} and {end_distance:.1} pixels from the border"
        )));
    }

    let frame = BoundingBox::from_points(curve.iter().copied(), 1)
        .map_or(blob.bbox(), |b| b.union(&blob.bbox()));
    let mut mask = blob.mask().reframe(frame);

    if start == end {
        let mut lobe = Mask::empty(frame);
        fill_ring(&mut lobe, curve, true);
        if lobe.is_empty() {
            return Err(RegionError::invalid("border loop encloses no pixels"));
        }
        let inside = Polygon::from_ring(curve.to_vec())
            .centroid()
            .is_some_and(|c| blob.contains(c.x.floor() as i32, c.y.floor() as i32));
        debug!("Border loop of blob {}, inside: {inside}", blob.id());
        if inside {
            mask.and_not_assign(&lobe);
        } else {
            mask.or_assign(&lobe);
        }
        return blob.update_from_mask(mask);
    }

    let forward = arc(&outer, start, end);
    let backward = arc(&outer, end, start);
    // The curve runs start -> end, so it closes with an arc from end to start.
    let kept = if ring_length(&forward, false) > ring_length(&backward, false) {
        forward.into_iter().rev().collect()
    } else {
        backward
    };
    let ring: Vec<Pos2> = curve.iter().copied().chain(kept).collect();
    if signed_area(&ring) == 0.0 {
        return Err(RegionError::invalid("edited border has no area"));
    }

    let polygon = Polygon::new(ring, blob.contour().holes.clone());
    mask = polygon_to_mask(&polygon, frame)?;
    blob.update_from_mask(mask)
}

/// Vertices of the closed `ring` from `from` to `to` inclusive, walking forward.
fn arc(ring: &[Pos2], from: usize, to: usize) -> Vec<Pos2> {
    let n = ring.len();
    let len = (to + n - from) % n + 1;
    ring.iter().cycle().skip(from).take(len).copied().collect()
}

/// Lets `refiner` snap the border of `blob` to image edges. The mask is padded
/// by `padding` pixels first; the image crop is zero filled where the padding
/// leaves the image.
pub fn refine_border(
    blob: &mut Blob,
    image: &RgbImage,
    padding: u32,
    weights: [f32; 2],
    refiner: &dyn BorderRefiner,
) -> Result<(), RegionError> {
    let padded = blob.mask().padded(padding);
    let bbox = padded.bbox();
    let crop = crop_padded(image, bbox);

    let refined = refiner
        .refine(&crop, padded.image(), weights[0], weights[1])
        .map_err(RegionError::ExternalRefinerFailure)?;
    if refined.dimensions() != (bbox.width, bbox.height) {
        return Err(RegionError::invalid(format!(
            "refined mask is {:?}, expected {:?}",
            refined.dimensions(),
            (bbox.width, bbox.height)
        )));
    }

    let mut mask = Mask::from_image(bbox.left, bbox.top, refined);
    if let Some(inside) = bbox.clamped(image.width(), image.height()) {
        if inside != bbox {
            mask = mask.reframe(inside);
        }
    }
    blob.update_from_mask(mask)
}
