use emath::Pos2;
use image::Luma;
use log::debug;

use crate::{
    blob::{Blob, BlobId},
    error::RegionError,
    mask::stroke_polyline,
};

/// Splits `blob` along `strokes`. Every stroke is drawn `width` pixels wide as
/// background into a copy of the mask, so several partial strokes can separate
/// together. Each remaining component of at least `min_area` pixels becomes a
/// new blob. Ids are handed out from `first_id` upwards; pieces inherit class
/// and note.
pub fn cut(
    blob: &Blob,
    strokes: &[Vec<Pos2>],
    width: u32,
    min_area: u64,
    first_id: BlobId,
) -> Result<Vec<Blob>, RegionError> {
    if strokes.iter().all(|stroke| stroke.len() < 2) {
        return Err(RegionError::invalid("cut needs a stroke of at least two points"));
    }

    let mut mask = blob.mask().clone();
    let bbox = mask.bbox();
    for stroke in strokes {
        stroke_polyline(
            mask.image_mut(),
            stroke,
            (bbox.left, bbox.top),
            width,
            Luma([0]),
        );
    }

    let pieces: Vec<_> = mask
        .components()
        .into_iter()
        .filter(|piece| piece.count() >= min_area)
        .collect();
    if pieces.len() < 2 {
        debug!(
            "Cut of blob {} left {} pieces of at least {min_area} pixels",
            blob.id(),
            pieces.len()
        );
        return Err(RegionError::CutDidNotSeparate);
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut result = Blob::from_mask(piece, BlobId(first_id.0 + i as u32))?;
            result.set_class(blob.class_name());
            result.note.clone_from(&blob.note);
            Ok(result)
        })
        .collect()
}
