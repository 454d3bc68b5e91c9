//! Serializable form of the annotations of one map.

use std::io::{self, ErrorKind};

use emath::Pos2;
use serde::{Deserialize, Serialize};

use crate::{
    blob::{Blob, BlobId},
    mask::MaskRle,
    store::{AnnotationStore, GroupId},
    BoundingBox,
};

pub mod file;

const PREAMBLE: [u8; 7] = [b'r', b'e', b'g', b'i', b'o', b'n', b's'];
const VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    pub id: BlobId,
    pub instance_name: String,
    pub class_name: String,
    /// `[top, left, width, height]`
    pub bbox: [i32; 4],
    pub mask: MaskRle,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub group: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_extreme_points: Option<[Pos2; 4]>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(rename = "Project Name", default)]
    pub project_name: String,
    #[serde(rename = "Map File")]
    pub map_file: String,
    #[serde(rename = "Acquisition Date", default)]
    pub acquisition_date: String,
    #[serde(rename = "Map Scale", default = "default_scale")]
    pub map_px_to_mm_factor: f64,
    #[serde(rename = "Segmentation Data", default)]
    pub segmentation_data: Vec<BlobRecord>,
}

fn default_scale() -> f64 {
    1.0
}

impl From<&Blob> for BlobRecord {
    fn from(blob: &Blob) -> Self {
        Self {
            id: blob.id(),
            instance_name: blob.instance_name.clone(),
            class_name: blob.class_name().to_string(),
            bbox: blob.bbox().to_array(),
            mask: MaskRle::encode(blob.mask()),
            note: blob.note.clone(),
            group: blob.group(),
            deep_extreme_points: blob.deep_extreme_points,
        }
    }
}

impl BlobRecord {
    /// Rebuilds the blob; its geometry is derived again from the mask. The
    /// group id is returned separately since only a store can resolve it.
    pub fn into_blob(self) -> io::Result<(Blob, Option<GroupId>)> {
        let [top, left, width, height] = self.bbox;
        let size = |v: i32| {
            u32::try_from(v).map_err(|_| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("blob {}: negative box size {v}", self.id),
                )
            })
        };
        let bbox = BoundingBox::new(top, left, size(width)?, size(height)?);
        let mask = self.mask.decode(bbox).ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "blob {}: mask of {} pixels doesn't fit {bbox:?}",
                    self.id,
                    self.mask.pixel_count()
                ),
            )
        })?;

        let mut blob = Blob::from_mask(mask, self.id)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, format!("blob {}: {e}", self.id)))?;
        blob.instance_name = self.instance_name;
        blob.set_class(self.class_name);
        blob.note = self.note;
        blob.deep_extreme_points = self.deep_extreme_points;
        Ok((blob, self.group))
    }
}

impl AnnotationStore {
    pub fn from_records(records: Vec<BlobRecord>) -> io::Result<Self> {
        let blobs = records
            .into_iter()
            .map(BlobRecord::into_blob)
            .collect::<io::Result<Vec<_>>>()?;
        Self::from_blobs(blobs).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }

    /// Records in drawing order.
    pub fn to_records(&self) -> Vec<BlobRecord> {
        self.iter().map(BlobRecord::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::Mask;

    fn ring_blob(id: u32) -> Blob {
        let mask = Mask::from_fn(BoundingBox::new(4, 6, 5, 5), |x, y| !(x == 8 && y == 6));
        let mut blob = Blob::from_mask(mask, BlobId(id)).unwrap();
        blob.set_class("coral");
        blob.note = "bleached".into();
        blob
    }

    #[test]
    fn blob_survives_a_record() {
        let blob = ring_blob(3);
        let (restored, group) = BlobRecord::from(&blob).into_blob().unwrap();
        assert_eq!(group, None);
        assert_eq!(restored.mask(), blob.mask());
        assert_eq!(restored.class_name(), "coral");
        assert_eq!(restored.note, "bleached");
        assert_eq!(restored.area(), 24.0);
    }

    #[test]
    fn store_restores_groups() {
        let mut store = AnnotationStore::new();
        store.add_blob(ring_blob(1)).unwrap();
        store.add_blob(ring_blob(2)).unwrap();
        let group = store.add_group(&[BlobId(1), BlobId(2)]);

        let restored = AnnotationStore::from_records(store.to_records()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(BlobId(2)).unwrap().group(), Some(group));
        assert_eq!(
            restored.group(group).unwrap().members,
            vec![BlobId(1), BlobId(2)]
        );
        assert_eq!(restored.get_free_id(), BlobId(3));
    }

    #[test]
    fn broken_mask_is_invalid_data() {
        let mut record = BlobRecord::from(&ring_blob(1));
        record.bbox[2] = 7;
        let err = record.into_blob().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn project_keys() {
        let project = ProjectRecord {
            project_name: "reef".into(),
            map_file: "plot.png".into(),
            acquisition_date: "2019-06-01".into(),
            map_px_to_mm_factor: 0.5,
            segmentation_data: vec![BlobRecord::from(&ring_blob(1))],
        };
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["Project Name"], "reef");
        assert_eq!(json["Map Scale"], 0.5);
        assert_eq!(json["Segmentation Data"][0]["bbox"], serde_json::json!([4, 6, 5, 5]));
        let back: ProjectRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, project);
    }
}
