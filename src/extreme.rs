use emath::Pos2;
use image::{GrayImage, RgbImage};
use log::info;

use crate::{
    algebra::blobs_from_mask,
    blob::{Blob, BlobId},
    error::{ExternalError, RegionError},
    image_utils::crop_padded,
    mask::Mask,
    BoundingBox,
};

/// Network that segments the object outlined by four extreme points
/// (leftmost, topmost, rightmost, bottommost). Points are given in crop
/// coordinates; the returned mask must have the size of the crop.
pub trait ExtremePointSegmenter {
    fn segment(&self, crop: &RgbImage, points: &[Pos2; 4]) -> Result<GrayImage, ExternalError>;
}

impl<F> ExtremePointSegmenter for F
where
    F: Fn(&RgbImage, &[Pos2; 4]) -> Result<GrayImage, ExternalError>,
{
    fn segment(&self, crop: &RgbImage, points: &[Pos2; 4]) -> Result<GrayImage, ExternalError> {
        self(crop, points)
    }
}

/// Runs `segmenter` on the image around `points`, padded by `padding` pixels,
/// and returns one blob per component larger than `area_ratio` times the area
/// of the box spanned by the points.
pub fn segment_from_extreme_points(
    image: &RgbImage,
    points: [Pos2; 4],
    padding: u32,
    area_ratio: f32,
    segmenter: &dyn ExtremePointSegmenter,
    first_id: BlobId,
) -> Result<Vec<Blob>, RegionError> {
    let bounds = BoundingBox::from_points(points, 0)
        .ok_or_else(|| RegionError::invalid("no extreme points"))?;
    let frame = bounds
        .padded(padding)
        .clamped(image.width(), image.height())
        .ok_or_else(|| RegionError::invalid("extreme points lie outside of the image"))?;

    let crop = crop_padded(image, frame);
    let local = points.map(|p| Pos2::new(p.x - frame.left as f32, p.y - frame.top as f32));
    let output = segmenter
        .segment(&crop, &local)
        .map_err(RegionError::ExternalSegmenterFailure)?;
    if output.dimensions() != crop.dimensions() {
        return Err(RegionError::invalid(format!(
            "segmenter returned {:?} for a crop of {:?}",
            output.dimensions(),
            crop.dimensions()
        )));
    }

    let min_area = (bounds.area() as f32 * area_ratio).ceil() as u64;
    let mask = Mask::from_image(frame.left, frame.top, output);
    let mut blobs = blobs_from_mask(&mask, min_area.max(1), first_id);
    for blob in &mut blobs {
        blob.deep_extreme_points = Some(points);
    }
    info!("Extreme points gave {} blobs", blobs.len());
    Ok(blobs)
}
