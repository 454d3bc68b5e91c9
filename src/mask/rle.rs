use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::Mask;
use crate::BoundingBox;

/// Run lengths of a mask in row major order. Runs alternate between background
/// and foreground and always start with background, so a mask whose first
/// pixel is set starts with a zero run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskRle {
    pub counts: Vec<u32>,
}

impl MaskRle {
    pub fn encode(mask: &Mask) -> Self {
        let mut counts = Vec::new();
        let mut expect_foreground = false;
        for (foreground, run) in &mask.image().pixels().chunk_by(|p| p.0[0] != 0) {
            if foreground != expect_foreground {
                counts.push(0);
            }
            counts.push(run.count() as u32);
            expect_foreground = !foreground;
        }
        Self { counts }
    }

    pub fn pixel_count(&self) -> u64 {
        self.counts.iter().map(|c| *c as u64).sum()
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> u64 {
        self.counts.iter().skip(1).step_by(2).map(|c| *c as u64).sum()
    }

    /// Rebuilds the mask placed at `bbox`. `None` if the runs don't cover the
    /// box exactly.
    pub fn decode(&self, bbox: BoundingBox) -> Option<Mask> {
        if self.pixel_count() != bbox.area() {
            return None;
        }
        let mut mask = Mask::empty(bbox);
        let mut pixels = mask.image_mut().pixels_mut();
        for (i, count) in self.counts.iter().enumerate() {
            let value = (i % 2) as u8;
            for p in pixels.by_ref().take(*count as usize) {
                p.0[0] = value;
            }
        }
        Some(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_start_with_background() {
        let bbox = BoundingBox::new(5, 5, 3, 2);
        let mask = Mask::from_fn(bbox, |x, y| x == 5 && y == 5 || y == 6 && x > 5);
        let rle = MaskRle::encode(&mask);
        assert_eq!(rle.counts, vec![0, 1, 3, 2]);
        assert_eq!(rle.area(), 3);
        assert_eq!(rle.decode(bbox), Some(mask));
    }

    #[test]
    fn decode_rejects_wrong_size() {
        let rle = MaskRle {
            counts: vec![2, 2],
        };
        assert_eq!(rle.decode(BoundingBox::new(0, 0, 2, 3)), None);
    }
}
