use image::{imageops, RgbImage};

use crate::BoundingBox;

pub fn load_image(bytes: &[u8]) -> std::io::Result<RgbImage> {
    Ok(image::load_from_memory(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        .into_rgb8())
}

/// Copies the part of `image` covered by `bbox`. Pixels of `bbox` outside the
/// image stay black.
pub fn crop_padded(image: &RgbImage, bbox: BoundingBox) -> RgbImage {
    let mut crop = RgbImage::new(bbox.width, bbox.height);
    imageops::replace(&mut crop, image, -(bbox.left as i64), -(bbox.top as i64));
    crop
}
