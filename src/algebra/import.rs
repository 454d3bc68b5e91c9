use std::collections::HashMap;

use image::{Luma, Rgb, RgbImage};
use log::{debug, info};

use crate::{
    blob::{Blob, BlobId, Region, EMPTY_CLASS},
    error::RegionError,
    mask::{split_labels, LabelImage, Mask},
};

/// Every 4-connected component of every non zero label, ordered by label.
pub fn label_regions(labels: &LabelImage) -> Vec<Region> {
    split_labels(labels, 0, 0)
        .into_iter()
        .flat_map(|(label, mask)| {
            mask.components()
                .into_iter()
                .map(move |mask| Region { label, mask })
        })
        .collect()
}

/// One blob per connected component of `labels`, whose top left pixel sits at
/// `origin` in the image. Components below `min_area` pixels are skipped
/// without using up an id. `class_of` names the class of each label.
pub fn blobs_from_label_image(
    labels: &LabelImage,
    origin: (i32, i32),
    min_area: u64,
    first_id: BlobId,
    class_of: impl Fn(u32) -> String,
) -> Vec<Blob> {
    let mut next_id = first_id.0;
    let mut blobs = Vec::new();
    for region in label_regions(labels) {
        let label = region.label;
        match Blob::from_labeled_region(region, origin, BlobId(next_id), min_area) {
            Ok(mut blob) => {
                blob.set_class(class_of(label));
                blobs.push(blob);
                next_id += 1;
            }
            Err(RegionError::RegionTooSmall { area, .. }) => {
                debug!("Skipping region of label {label} with {area} pixels");
            }
            Err(e) => debug!("Skipping region of label {label}: {e}"),
        }
    }
    blobs
}

/// Turns an RGB class map into blobs. Black is background; every other colour
/// is looked up in `palette` and unknown colours give unclassified blobs.
pub fn import_label_map(
    map: &RgbImage,
    palette: &[(String, [u8; 3])],
    min_area: u64,
    first_id: BlobId,
) -> Vec<Blob> {
    let mut colors: Vec<[u8; 3]> = Vec::new();
    let mut index: HashMap<[u8; 3], u32> = HashMap::new();
    let labels = LabelImage::from_fn(map.width(), map.height(), |x, y| {
        let Rgb(color) = *map.get_pixel(x, y);
        if color == [0, 0, 0] {
            return Luma([0]);
        }
        let label = *index.entry(color).or_insert_with(|| {
            colors.push(color);
            colors.len() as u32
        });
        Luma([label])
    });

    let class_of = |label: u32| {
        let color = colors[label as usize - 1];
        palette
            .iter()
            .find(|(_, c)| *c == color)
            .map_or_else(|| EMPTY_CLASS.to_string(), |(name, _)| name.clone())
    };
    let blobs = blobs_from_label_image(&labels, (0, 0), min_area, first_id, class_of);
    info!(
        "Imported {} blobs from {} colours",
        blobs.len(),
        colors.len()
    );
    blobs
}

/// One blob per connected component of `mask` with at least `min_area` pixels.
pub fn blobs_from_mask(mask: &Mask, min_area: u64, first_id: BlobId) -> Vec<Blob> {
    let mut next_id = first_id.0;
    mask.components()
        .into_iter()
        .filter(|piece| piece.count() >= min_area)
        .filter_map(|piece| {
            let blob = Blob::from_mask(piece, BlobId(next_id)).ok()?;
            next_id += 1;
            Some(blob)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    #[test]
    fn each_colour_component_becomes_a_blob() {
        let map = RgbImage::from_fn(12, 6, |x, y| match (x, y) {
            (0..=3, 0..=3) => Rgb([255, 0, 0]),
            (8..=11, 0..=3) => Rgb([255, 0, 0]),
            (5..=6, 4..=5) => Rgb([0, 0, 255]),
            _ => Rgb([0, 0, 0]),
        });
        let palette = vec![("sand".to_string(), [255, 0, 0])];
        let blobs = import_label_map(&map, &palette, 2, BlobId(5));
        assert_eq!(blobs.len(), 3);
        let ids: Vec<_> = blobs.iter().map(Blob::id).collect();
        assert_eq!(ids, vec![BlobId(5), BlobId(6), BlobId(7)]);
        let sand = blobs.iter().filter(|b| b.class_name() == "sand").count();
        assert_eq!(sand, 2);
        let other = blobs.iter().find(|b| b.class_name() == EMPTY_CLASS).unwrap();
        assert_eq!(other.bbox(), BoundingBox::new(4, 5, 2, 2));
    }

    #[test]
    fn single_pixel_speck() {
        let map = RgbImage::from_fn(10, 10, |x, y| match (x, y) {
            (0..=4, 0..=4) => Rgb([255, 0, 0]),
            (8, 1) => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 0]),
        });
        let palette = vec![
            ("sand".to_string(), [255, 0, 0]),
            ("algae".to_string(), [0, 255, 0]),
        ];
        let blobs = import_label_map(&map, &palette, 10, BlobId(1));
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].class_name(), "sand");

        let blobs = import_label_map(&map, &palette, 1, BlobId(1));
        assert_eq!(blobs.len(), 2);
        let speck = blobs.iter().find(|b| b.class_name() == "algae").unwrap();
        assert_eq!(speck.bbox(), BoundingBox::new(1, 8, 1, 1));
        assert_eq!(speck.area(), 1.0);
    }

    #[test]
    fn small_components_do_not_use_ids() {
        let mut labels = LabelImage::new(10, 10);
        labels.put_pixel(0, 0, Luma([1]));
        for x in 3..8 {
            labels.put_pixel(x, 5, Luma([2]));
        }
        let blobs = blobs_from_label_image(&labels, (100, 0), 3, BlobId(1), |l| format!("c{l}"));
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].id(), BlobId(1));
        assert_eq!(blobs[0].class_name(), "c2");
        assert_eq!(blobs[0].bbox(), BoundingBox::new(5, 103, 5, 1));
    }
}
