use std::collections::{BTreeMap, HashMap};

use emath::Pos2;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    blob::{Blob, BlobId},
    error::RegionError,
    BoundingBox,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

/// Blobs selected and highlighted together. Owns only the membership list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub members: Vec<BlobId>,
}

/// All blobs annotated on one image.
///
/// Blobs are kept in drawing order; later blobs are drawn on top of earlier
/// ones and win hit tests.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    blobs: HashMap<BlobId, Blob>,
    order: Vec<BlobId>,
    groups: BTreeMap<GroupId, Group>,
    highest_id: u32,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Stores `blob` on top of all others. A group reference of the blob is
    /// restored if that group still exists and dropped otherwise.
    pub fn add_blob(&mut self, mut blob: Blob) -> Result<(), RegionError> {
        let id = blob.id();
        if self.blobs.contains_key(&id) {
            return Err(RegionError::DuplicateId(id));
        }
        if let Some(group_id) = blob.group {
            match self.groups.get_mut(&group_id) {
                Some(group) => {
                    if !group.members.contains(&id) {
                        group.members.push(id);
                    }
                }
                None => blob.group = None,
            }
        }
        self.highest_id = self.highest_id.max(id.0);
        self.order.push(id);
        self.blobs.insert(id, blob);
        Ok(())
    }

    /// Removes the blob with `id`, if present. The blob keeps its group
    /// reference so that re-adding it restores the membership.
    pub fn remove_blob(&mut self, id: BlobId) -> Option<Blob> {
        let blob = self.blobs.remove(&id)?;
        self.order.retain(|other| *other != id);
        if let Some(group) = blob.group.and_then(|g| self.groups.get_mut(&g)) {
            group.members.retain(|member| *member != id);
        }
        Some(blob)
    }

    pub fn get(&self, id: BlobId) -> Option<&Blob> {
        self.blobs.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BlobId) -> Option<&mut Blob> {
        self.blobs.get_mut(&id)
    }

    pub fn contains(&self, id: BlobId) -> bool {
        self.blobs.contains_key(&id)
    }

    /// Blobs in drawing order, bottom first.
    pub fn iter(&self) -> impl Iterator<Item = &Blob> + '_ {
        self.order.iter().filter_map(|id| self.blobs.get(id))
    }

    /// Topmost blob covering pixel (`x`, `y`). Holes don't count as covered.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<&Blob> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.blobs.get(id))
            .find(|blob| blob.contains(x, y))
    }

    /// Blobs lying completely inside `rect`, in drawing order.
    pub fn blobs_in_rect(&self, rect: BoundingBox) -> Vec<BlobId> {
        self.iter()
            .filter(|blob| rect.contains_box(&blob.bbox()))
            .map(Blob::id)
            .collect()
    }

    /// Next id to hand out. Ids of removed blobs are never given out again
    /// until the store is cleared.
    pub fn get_free_id(&self) -> BlobId {
        BlobId(self.highest_id + 1)
    }

    pub fn set_class(&mut self, id: BlobId, class_name: &str) -> Result<String, RegionError> {
        let blob = self.blobs.get_mut(&id).ok_or(RegionError::UnknownBlob(id))?;
        let previous = blob.class_name().to_string();
        blob.set_class(class_name);
        Ok(previous)
    }

    /// Puts `members` into a new group, taking them out of any group they
    /// belonged to. Unknown ids are ignored.
    pub fn add_group(&mut self, members: &[BlobId]) -> GroupId {
        let id = GroupId(
            self.groups
                .keys()
                .next_back()
                .map_or(1, |GroupId(last)| last + 1),
        );
        let mut group = Group {
            id,
            members: Vec::with_capacity(members.len()),
        };
        for member in members {
            let Some(blob) = self.blobs.get_mut(member) else {
                continue;
            };
            if let Some(previous) = blob.group.and_then(|g| self.groups.get_mut(&g)) {
                previous.members.retain(|m| m != member);
            }
            blob.group = Some(id);
            group.members.push(*member);
        }
        debug!("Group {} with {} blobs", id.0, group.members.len());
        self.groups.insert(id, group);
        id
    }

    /// Dissolves the group; its blobs stay.
    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let group = self.groups.remove(&id)?;
        for member in &group.members {
            if let Some(blob) = self.blobs.get_mut(member) {
                blob.group = None;
            }
        }
        Some(group)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.groups.values()
    }

    pub fn clear(&mut self) {
        info!("Clear {} blobs", self.blobs.len());
        *self = Self::default();
    }

    /// Length of the segment `p1`-`p2` in millimetres. If the two points hit
    /// two different blobs, the distance between their centroids is measured
    /// instead.
    pub fn measure(&self, p1: Pos2, p2: Pos2, px_to_mm: f64) -> f64 {
        let hit = |p: Pos2| self.hit_test(p.x.floor() as i32, p.y.floor() as i32);
        let (a, b) = match (hit(p1), hit(p2)) {
            (Some(a), Some(b)) if a.id() != b.id() => (a.centroid(), b.centroid()),
            _ => (p1, p2),
        };
        a.distance(b) as f64 * px_to_mm
    }

    /// Rebuilds a store from loaded blobs, recreating groups from the group
    /// id each blob carries.
    pub fn from_blobs(blobs: Vec<(Blob, Option<GroupId>)>) -> Result<Self, RegionError> {
        let mut store = Self::new();
        let mut groups: BTreeMap<GroupId, Vec<BlobId>> = BTreeMap::new();
        for (mut blob, group) in blobs {
            blob.group = None;
            if let Some(group) = group {
                groups.entry(group).or_default().push(blob.id());
            }
            store.add_blob(blob)?;
        }
        for (id, members) in groups {
            for member in &members {
                if let Some(blob) = store.blobs.get_mut(member) {
                    blob.group = Some(id);
                }
            }
            store.groups.insert(id, Group { id, members });
        }
        Ok(store)
    }
}
