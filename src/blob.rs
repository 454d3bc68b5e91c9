use std::fmt;

use emath::Pos2;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::RegionError,
    geometry::{is_valid_closed_curve, prune_close_vertices, simplify},
    mask::{largest_label, polygon_to_mask, split_labels, trace_component, Mask},
    store::GroupId,
    BoundingBox, Polygon,
};

/// Class of a blob nobody has classified yet.
pub const EMPTY_CLASS: &str = "Empty";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub u32);

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One connected component of a label image, still in the frame of the image
/// it was labelled in.
#[derive(Debug, Clone)]
pub struct Region {
    pub label: u32,
    pub mask: Mask,
}

/// A single annotated region: a 4-connected mask plus the polygon and the
/// measures derived from it.
///
/// The derived fields are private and recomputed by every geometric mutation,
/// so they always describe the current mask. Cloning copies everything,
/// including the id; give the copy a fresh one with [`Blob::with_id`] before
/// storing it next to the original.
#[derive(Debug, Clone)]
pub struct Blob {
    id: BlobId,
    pub instance_name: String,
    class_name: String,
    pub note: String,
    pub(crate) group: Option<GroupId>,
    pub deep_extreme_points: Option<[Pos2; 4]>,
    mask: Mask,
    contour: Polygon,
    area: f64,
    perimeter: f64,
    centroid: Pos2,
    version: u32,
}

impl Blob {
    /// Builds a blob from the largest 4-connected component of `mask`.
    pub fn from_mask(mask: Mask, id: BlobId) -> Result<Self, RegionError> {
        let (mask, contour) = single_component(mask)?;
        let (area, perimeter) = (contour.area(), contour.perimeter());
        let centroid = contour.centroid().ok_or(RegionError::EmptyRegion)?;
        Ok(Self {
            id,
            instance_name: instance_name(id),
            class_name: EMPTY_CLASS.to_string(),
            note: String::new(),
            group: None,
            deep_extreme_points: None,
            mask,
            contour,
            area,
            perimeter,
            centroid,
            version: 0,
        })
    }

    /// Rasterizes a free-hand closed curve. Vertices closer than
    /// `min_vertex_distance` to their predecessor are dropped first.
    pub fn from_closed_curve(
        points: &[Pos2],
        id: BlobId,
        snap_tolerance: f32,
        min_vertex_distance: f32,
    ) -> Result<Self, RegionError> {
        if !is_valid_closed_curve(points, snap_tolerance) {
            return Err(RegionError::invalid(format!(
                "curve of {} points is not closed",
                points.len()
            )));
        }
        let ring = prune_close_vertices(points, min_vertex_distance);
        let polygon = Polygon::from_ring(ring);
        let bbox = polygon
            .bounding_box()
            .ok_or_else(|| RegionError::invalid("curve has no points"))?;
        Self::from_mask(polygon_to_mask(&polygon, bbox)?, id)
    }

    /// Builds a blob from a labelled component found in an image whose top
    /// left corner sits at `origin`.
    pub fn from_labeled_region(
        region: Region,
        origin: (i32, i32),
        id: BlobId,
        min_area: u64,
    ) -> Result<Self, RegionError> {
        let area = region.mask.count();
        if area < min_area {
            return Err(RegionError::RegionTooSmall { area, min_area });
        }
        Self::from_mask(region.mask.translated(origin.0, origin.1), id)
    }

    /// Replaces the geometry with `mask`. Nothing changes if `mask` has no
    /// foreground.
    pub fn update_from_mask(&mut self, mask: Mask) -> Result<(), RegionError> {
        let (mask, contour) = single_component(mask)?;
        let centroid = contour.centroid().ok_or(RegionError::EmptyRegion)?;
        self.area = contour.area();
        self.perimeter = contour.perimeter();
        self.centroid = centroid;
        self.mask = mask;
        self.contour = contour;
        self.version += 1;
        Ok(())
    }

    pub fn with_id(mut self, id: BlobId) -> Self {
        self.set_id(id);
        self
    }

    pub fn set_id(&mut self, id: BlobId) {
        self.id = id;
        self.instance_name = instance_name(id);
    }

    pub fn set_class(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
        self.version += 1;
    }

    pub fn id(&self) -> BlobId {
        self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn bbox(&self) -> BoundingBox {
        self.mask.bbox()
    }

    pub fn contour(&self) -> &Polygon {
        &self.contour
    }

    /// Contour with every ring reduced by Douglas-Peucker, for drawing.
    pub fn simplified_contour(&self, epsilon: f32) -> Polygon {
        let reduce = |ring: &[Pos2]| {
            let Some(first) = ring.first() else {
                return Vec::new();
            };
            let closed: Vec<Pos2> = ring.iter().chain(Some(first)).copied().collect();
            let mut reduced = simplify(&closed, epsilon);
            reduced.pop();
            reduced
        };
        Polygon::new(
            reduce(&self.contour.outer),
            self.contour.holes.iter().map(|h| reduce(h)).collect(),
        )
    }

    /// Contour area, which can differ slightly from the pixel count.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    pub fn centroid(&self) -> Pos2 {
        self.centroid
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.mask.get(x, y)
    }
}

fn instance_name(id: BlobId) -> String {
    format!("region{id}")
}

/// Keeps the largest 4-connected component of `mask` and traces it, labelling
/// the mask only once.
fn single_component(mask: Mask) -> Result<(Mask, Polygon), RegionError> {
    let bbox = mask.bbox();
    let labels = mask.labels();
    let largest = largest_label(&labels).ok_or(RegionError::EmptyRegion)?;
    let contour = trace_component(&labels, largest, (bbox.left, bbox.top))?;

    let mut components = split_labels(&labels, bbox.left, bbox.top);
    let total = components.len();
    let index = components
        .iter()
        .position(|(label, _)| *label == largest)
        .ok_or(RegionError::EmptyRegion)?;
    let (_, component) = components.swap_remove(index);
    if total > 1 {
        debug!(
            "Dropped {} fragments, kept {} pixels",
            total - 1,
            component.count()
        );
    }
    Ok((component, contour))
}

#[cfg(test)]
mod tests {
    use emath::pos2;

    use super::*;
    use crate::mask::tests::rect_mask;

    #[test]
    fn measures_follow_the_contour() {
        let blob = Blob::from_mask(rect_mask(3, 3, 4, 4), BlobId(7)).unwrap();
        assert_eq!(blob.instance_name, "region7");
        assert_eq!(blob.class_name(), EMPTY_CLASS);
        assert_eq!(blob.area(), 16.0);
        assert_eq!(blob.perimeter(), 16.0);
        assert_eq!(blob.centroid(), pos2(5.0, 5.0));
        assert_eq!(blob.bbox(), BoundingBox::new(3, 3, 4, 4));
    }

    #[test]
    fn copy_keeps_measures() {
        let blob = Blob::from_mask(rect_mask(0, 0, 5, 3), BlobId(1)).unwrap();
        let copy = blob.clone().with_id(BlobId(2));
        assert_eq!(copy.area(), blob.area());
        assert_eq!(copy.perimeter(), blob.perimeter());
        assert_eq!(copy.mask(), blob.mask());
        assert_eq!(copy.instance_name, "region2");
    }

    #[test]
    fn simplified_contour_drops_staircase_steps() {
        let mask = Mask::from_fn(BoundingBox::new(0, 0, 20, 20), |x, y| x + y < 20);
        let blob = Blob::from_mask(mask, BlobId(1)).unwrap();
        assert!(blob.contour().outer.len() > 20);
        let simplified = blob.simplified_contour(1.0);
        assert!(simplified.outer.len() <= 4);
        assert!((simplified.area() - blob.area()).abs() < 20.0);
    }

    #[test]
    fn single_pixel_blob() {
        let blob = Blob::from_mask(rect_mask(5, 5, 1, 1), BlobId(1)).unwrap();
        assert_eq!(blob.area(), 1.0);
        assert_eq!(blob.perimeter(), 4.0);
        assert_eq!(blob.centroid(), pos2(5.5, 5.5));
        assert_eq!(blob.bbox(), BoundingBox::new(5, 5, 1, 1));
    }

    #[test]
    fn mask_is_cropped_to_largest_component() {
        let mut mask = Mask::empty(BoundingBox::new(0, 0, 10, 10));
        mask.or_assign(&rect_mask(1, 1, 3, 3));
        mask.set(8, 8, true);
        let blob = Blob::from_mask(mask, BlobId(1)).unwrap();
        assert_eq!(blob.bbox(), BoundingBox::new(1, 1, 3, 3));
        assert!(!blob.contains(8, 8));
    }

    #[test]
    fn closed_curve_is_rasterized() {
        let curve = [
            pos2(10.0, 10.0),
            pos2(20.0, 10.0),
            pos2(20.0, 20.0),
            pos2(10.0, 20.0),
            pos2(10.0, 11.0),
        ];
        let blob = Blob::from_closed_curve(&curve, BlobId(3), 12.0, 1.0).unwrap();
        assert_eq!(blob.mask().count(), 100);
        assert!(blob.contains(15, 15));
    }

    #[test]
    fn open_curve_is_rejected() {
        let curve = [pos2(0.0, 0.0), pos2(50.0, 0.0), pos2(50.0, 50.0)];
        assert!(matches!(
            Blob::from_closed_curve(&curve, BlobId(3), 12.0, 1.0),
            Err(RegionError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn small_regions_are_skipped() {
        let region = Region {
            label: 1,
            mask: rect_mask(0, 0, 2, 2),
        };
        assert!(matches!(
            Blob::from_labeled_region(region.clone(), (0, 0), BlobId(1), 5),
            Err(RegionError::RegionTooSmall { area: 4, min_area: 5 })
        ));
        let blob = Blob::from_labeled_region(region, (100, 50), BlobId(1), 4).unwrap();
        assert_eq!(blob.bbox(), BoundingBox::new(50, 100, 2, 2));
    }

    #[test]
    fn update_bumps_version_and_fails_atomically() {
        let mut blob = Blob::from_mask(rect_mask(0, 0, 4, 4), BlobId(1)).unwrap();
        blob.update_from_mask(rect_mask(0, 0, 2, 2)).unwrap();
        assert_eq!(blob.version(), 1);
        assert_eq!(blob.area(), 4.0);

        let before = blob.mask().clone();
        assert!(blob
            .update_from_mask(Mask::empty(BoundingBox::new(0, 0, 3, 3)))
            .is_err());
        assert_eq!(blob.mask(), &before);
        assert_eq!(blob.version(), 1);
    }
}
