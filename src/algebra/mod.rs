//! Boolean operations between blobs, evaluated on their masks.
//!
//! Operations that change a blob take it by `&mut` and either succeed
//! completely or return an error with the blob untouched. Callers that need
//! the previous state keep a clone.

use log::debug;

use crate::{
    blob::Blob,
    error::RegionError,
    mask::{polygon_to_mask, Mask},
    Polygon,
};

mod border;
mod cut;
mod import;

pub use border::{edit_border, refine_border, BorderRefiner};
pub use cut::cut;
pub use import::{blobs_from_label_image, blobs_from_mask, import_label_map, label_regions};

/// Merges `blobs` into one. The result keeps the id, class and note of the
/// first blob. The union has to form a single 4-connected region.
pub fn union(blobs: &[&Blob]) -> Result<Blob, RegionError> {
    let (first, rest) = blobs.split_first().ok_or(RegionError::EmptyRegion)?;
    let frame = rest
        .iter()
        .fold(first.bbox(), |acc, blob| acc.union(&blob.bbox()));

    let mut mask = Mask::empty(frame);
    for blob in blobs {
        mask.or_assign(blob.mask());
    }
    if !mask.is_connected() {
        debug!("Union of {} blobs is not connected", blobs.len());
        return Err(RegionError::Disjoint);
    }

    let mut result = (*first).clone();
    result.update_from_mask(mask)?;
    Ok(result)
}

/// Removes `b` from `a`. If `a` falls apart, only its largest piece is kept.
pub fn subtract(a: &mut Blob, b: &Blob) -> Result<(), RegionError> {
    if !intersects(a, b) {
        return Err(RegionError::NoIntersection);
    }
    let mut mask = a.mask().clone();
    mask.and_not_assign(b.mask());
    if mask.is_empty() {
        return Err(RegionError::EmptyRegion);
    }
    a.update_from_mask(mask)
}

/// Removes the footprint of `a` from `b`, leaving `a` as it is.
pub fn divide(a: &Blob, b: &mut Blob) -> Result<(), RegionError> {
    subtract(b, a)
}

/// True if the two blobs share at least one pixel.
pub fn intersects(a: &Blob, b: &Blob) -> bool {
    a.mask().overlaps(b.mask())
}

/// Fills every hole of `blob`. Returns false if there was nothing to fill.
pub fn remove_holes(blob: &mut Blob) -> Result<bool, RegionError> {
    if blob.contour().holes.is_empty() {
        return Ok(false);
    }
    let outer = Polygon::from_ring(blob.contour().outer.clone());
    let mask = polygon_to_mask(&outer, blob.bbox())?;
    blob.update_from_mask(mask)?;
    Ok(true)
}
