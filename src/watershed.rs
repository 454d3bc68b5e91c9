//! Seeded region growing from user scribbles.
//!
//! Scribbles are drawn into a marker image, one label per scribble colour,
//! and flooded over the image crop with a priority queue: the pixel whose
//! colour is closest to an already labelled neighbour is taken next, ties in
//! insertion order. Pixels reached by two labels at once become a boundary and
//! belong to no region.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use emath::Pos2;
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    algebra::blobs_from_label_image,
    blob::{Blob, BlobId},
    error::RegionError,
    image_utils::crop_padded,
    mask::{stroke_polyline, LabelImage},
    BoundingBox,
};

type MarkerImage = ImageBuffer<Luma<i32>, Vec<i32>>;

const UNKNOWN: i32 = 0;
const BOUNDARY: i32 = -1;
const IN_QUEUE: i32 = -2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scribble {
    pub points: Vec<Pos2>,
    pub class_name: String,
    pub color: [u8; 3],
    pub width: u32,
}

/// Grows one region per scribble colour over `image` and returns a blob for
/// every connected piece of at least `min_area` pixels, classified after the
/// scribble that flooded it.
pub fn segment(
    image: &RgbImage,
    scribbles: &[Scribble],
    min_area: u64,
    first_id: BlobId,
) -> Result<Vec<Blob>, RegionError> {
    let working_area = scribbles
        .iter()
        .filter_map(|s| BoundingBox::from_points(s.points.iter().copied(), s.width / 2))
        .reduce(|a, b| a.union(&b))
        .ok_or_else(|| RegionError::invalid("no scribbles to grow from"))?
        .clamped(image.width(), image.height())
        .ok_or_else(|| RegionError::invalid("scribbles lie outside of the image"))?;
    let origin = (working_area.left, working_area.top);

    let mut labels_by_color: HashMap<[u8; 3], i32> = HashMap::new();
    let mut classes: Vec<String> = Vec::new();
    let mut markers = MarkerImage::new(working_area.width, working_area.height);
    for scribble in scribbles {
        let label = *labels_by_color.entry(scribble.color).or_insert_with(|| {
            classes.push(scribble.class_name.clone());
            classes.len() as i32
        });
        stroke_polyline(
            &mut markers,
            &scribble.points,
            origin,
            scribble.width,
            Luma([label]),
        );
    }
    debug!(
        "Watershed over {working_area:?} with {} labels",
        classes.len()
    );

    let crop = crop_padded(image, working_area);
    flood(&crop, &mut markers);

    let labels = LabelImage::from_fn(markers.width(), markers.height(), |x, y| {
        Luma([markers.get_pixel(x, y)[0].max(0) as u32])
    });
    let blobs = blobs_from_label_image(&labels, origin, min_area, first_id, |label| {
        classes
            .get(label as usize - 1)
            .cloned()
            .unwrap_or_default()
    });
    info!("Watershed produced {} blobs", blobs.len());
    Ok(blobs)
}

fn color_distance(a: &Rgb<u8>, b: &Rgb<u8>) -> u8 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(a, b)| a.abs_diff(*b))
        .max()
        .unwrap_or(0)
}

fn neighbours(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    [
        (x.checked_sub(1), Some(y)),
        (Some(x + 1).filter(|x| *x < width), Some(y)),
        (Some(x), y.checked_sub(1)),
        (Some(x), Some(y + 1).filter(|y| *y < height)),
    ]
    .into_iter()
    .filter_map(|(x, y)| Some((x?, y?)))
}

/// Labels every unknown pixel of `markers`. Afterwards each pixel holds a
/// positive label or [`BOUNDARY`].
fn flood(image: &RgbImage, markers: &mut MarkerImage) {
    let (width, height) = markers.dimensions();
    let mut queue = BinaryHeap::new();
    let mut sequence = 0u64;
    let mut push = |queue: &mut BinaryHeap<_>, priority: u8, x: u32, y: u32| {
        queue.push(Reverse((priority, sequence, x, y)));
        sequence += 1;
    };

    for y in 0..height {
        for x in 0..width {
            if markers.get_pixel(x, y)[0] != UNKNOWN {
                continue;
            }
            let pixel = image.get_pixel(x, y);
            let priority = neighbours(x, y, width, height)
                .filter(|(nx, ny)| markers.get_pixel(*nx, *ny)[0] > 0)
                .map(|(nx, ny)| color_distance(pixel, image.get_pixel(nx, ny)))
                .min();
            if let Some(priority) = priority {
                markers.put_pixel(x, y, Luma([IN_QUEUE]));
                push(&mut queue, priority, x, y);
            }
        }
    }

    while let Some(Reverse((_, _, x, y))) = queue.pop() {
        let mut label = UNKNOWN;
        for (nx, ny) in neighbours(x, y, width, height) {
            let neighbour = markers.get_pixel(nx, ny)[0];
            if neighbour <= 0 {
                continue;
            }
            if label == UNKNOWN {
                label = neighbour;
            } else if label != neighbour {
                label = BOUNDARY;
            }
        }
        markers.put_pixel(x, y, Luma([label]));
        if label == BOUNDARY {
            continue;
        }

        let pixel = *image.get_pixel(x, y);
        for (nx, ny) in neighbours(x, y, width, height) {
            if markers.get_pixel(nx, ny)[0] == UNKNOWN {
                markers.put_pixel(nx, ny, Luma([IN_QUEUE]));
                push(
                    &mut queue,
                    color_distance(&pixel, image.get_pixel(nx, ny)),
                    nx,
                    ny,
                );
            }
        }
    }
}
