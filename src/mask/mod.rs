use image::{imageops, GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::BoundingBox;

mod contour;
mod draw;
mod fill;
mod rle;

pub use contour::mask_to_polygon;
pub(crate) use contour::{largest_label, trace_component};
pub(crate) use draw::stroke_polyline;
pub use fill::{fill_ring, polygon_to_mask};
pub use rle::MaskRle;

pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

const FOREGROUND: Luma<u8> = Luma([1]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// Binary raster placed in image space. Pixel `(x, y)` of `pixels` covers image
/// pixel `(bbox.left + x, bbox.top + y)`; stored values are 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    bbox: BoundingBox,
    pixels: GrayImage,
}

impl Mask {
    pub fn empty(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            pixels: GrayImage::new(bbox.width, bbox.height),
        }
    }

    /// Places `image` with its top left corner at (`left`, `top`). Every non zero
    /// value is foreground.
    pub fn from_image(left: i32, top: i32, mut image: GrayImage) -> Self {
        image
            .pixels_mut()
            .for_each(|p| *p = if p.0[0] != 0 { FOREGROUND } else { BACKGROUND });
        Self {
            bbox: BoundingBox::new(top, left, image.width(), image.height()),
            pixels: image,
        }
    }

    /// `f` receives image coordinates.
    pub fn from_fn(bbox: BoundingBox, f: impl Fn(i32, i32) -> bool) -> Self {
        let pixels = GrayImage::from_fn(bbox.width, bbox.height, |x, y| {
            if f(bbox.left + x as i32, bbox.top + y as i32) {
                FOREGROUND
            } else {
                BACKGROUND
            }
        });
        Self { bbox, pixels }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn width(&self) -> u32 {
        self.bbox.width
    }

    pub fn height(&self) -> u32 {
        self.bbox.height
    }

    pub fn image(&self) -> &GrayImage {
        &self.pixels
    }

    pub(crate) fn image_mut(&mut self) -> &mut GrayImage {
        &mut self.pixels
    }

    pub fn into_image(self) -> GrayImage {
        self.pixels
    }

    pub fn get(&self, x: i32, y: i32) -> bool {
        self.bbox.contains(x, y)
            && self.pixels.get_pixel(
                (x - self.bbox.left) as u32,
                (y - self.bbox.top) as u32,
            )[0]
                != 0
    }

    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if self.bbox.contains(x, y) {
            self.pixels.put_pixel(
                (x - self.bbox.left) as u32,
                (y - self.bbox.top) as u32,
                if value { FOREGROUND } else { BACKGROUND },
            );
        }
    }

    pub fn count(&self) -> u64 {
        self.pixels.pixels().filter(|p| p.0[0] != 0).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.pixels().all(|p| p.0[0] == 0)
    }

    /// Foreground pixels in image coordinates, row by row.
    pub fn foreground(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (left, top) = (self.bbox.left, self.bbox.top);
        self.pixels
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] != 0)
            .map(move |(x, y, _)| (left + x as i32, top + y as i32))
    }

    pub fn translated(mut self, dx: i32, dy: i32) -> Self {
        self.bbox.left += dx;
        self.bbox.top += dy;
        self
    }

    /// Copies the mask into another frame; pixels outside `bbox` are lost.
    pub fn reframe(&self, bbox: BoundingBox) -> Mask {
        let mut result = Mask::empty(bbox);
        result.or_assign(self);
        result
    }

    pub fn padded(&self, padding: u32) -> Mask {
        self.reframe(self.bbox.padded(padding))
    }

    /// Pixelwise OR, restricted to this mask's frame.
    pub fn or_assign(&mut self, other: &Mask) {
        for (x, y) in other.foreground() {
            self.set(x, y, true);
        }
    }

    /// Pixelwise AND NOT, restricted to this mask's frame.
    pub fn and_not_assign(&mut self, other: &Mask) {
        for (x, y) in other.foreground() {
            self.set(x, y, false);
        }
    }

    pub fn overlaps(&self, other: &Mask) -> bool {
        self.bbox.intersects(&other.bbox) && other.foreground().any(|(x, y)| self.get(x, y))
    }

    pub fn overlap_count(&self, other: &Mask) -> u64 {
        if !self.bbox.intersects(&other.bbox) {
            return 0;
        }
        other.foreground().filter(|(x, y)| self.get(*x, *y)).count() as u64
    }

    /// Crops to the tight bounding box of the foreground.
    pub fn tight(&self) -> Option<Mask> {
        let tight = BoundingBox::from_points(
            self.foreground()
                .map(|(x, y)| emath::pos2(x as f32, y as f32)),
            0,
        )?;
        Some(if tight == self.bbox {
            self.clone()
        } else {
            self.reframe(tight)
        })
    }

    /// 4-connected component labels, 0 is background.
    pub(crate) fn labels(&self) -> LabelImage {
        if self.width() > 1 && self.height() > 1 {
            return connected_components(&self.pixels, Connectivity::Four, BACKGROUND);
        }
        // imageproc's union find asserts on single pixel images; the background
        // border doesn't change the labels.
        let padded = self.padded(1);
        let labels = connected_components(&padded.pixels, Connectivity::Four, BACKGROUND);
        imageops::crop_imm(&labels, 1, 1, self.width(), self.height()).to_image()
    }

    /// Every 4-connected component as its own tight mask, in raster order of
    /// their first pixel.
    pub fn components(&self) -> Vec<Mask> {
        split_labels(&self.labels(), self.bbox.left, self.bbox.top)
            .into_iter()
            .map(|(_, mask)| mask)
            .collect()
    }

    pub fn largest_component(&self) -> Option<Mask> {
        self.components()
            .into_iter()
            .rev()
            .max_by_key(Mask::count)
    }

    pub fn is_connected(&self) -> bool {
        self.labels().pixels().all(|p| p.0[0] <= 1) && !self.is_empty()
    }
}

/// Splits a label image into one tight mask per distinct non zero label,
/// ordered by label. `left`/`top` place the label image in image space.
pub(crate) fn split_labels(labels: &LabelImage, left: i32, top: i32) -> Vec<(u32, Mask)> {
    let mut boxes: Vec<Option<(u32, u32, u32, u32)>> = Vec::new();
    for (x, y, Luma([label])) in labels.enumerate_pixels() {
        if *label == 0 {
            continue;
        }
        let idx = *label as usize;
        if boxes.len() <= idx {
            boxes.resize(idx + 1, None);
        }
        boxes[idx] = Some(match boxes[idx] {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    let mut masks: Vec<Option<Mask>> = boxes
        .iter()
        .map(|b| {
            b.map(|(x0, y0, x1, y1)| {
                Mask::empty(BoundingBox::new(
                    top + y0 as i32,
                    left + x0 as i32,
                    x1 - x0 + 1,
                    y1 - y0 + 1,
                ))
            })
        })
        .collect();

    for (x, y, Luma([label])) in labels.enumerate_pixels() {
        if let Some(Some(mask)) = masks.get_mut(*label as usize) {
            mask.set(left + x as i32, top + y as i32, true);
        }
    }

    masks
        .into_iter()
        .enumerate()
        .filter_map(|(label, mask)| Some((label as u32, mask?)))
        .collect()
}
