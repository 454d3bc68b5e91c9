use emath::Pos2;
use image::RgbImage;
use log::{info, warn};

use crate::{
    algebra::{self, BorderRefiner},
    blob::{Blob, BlobId},
    config::Config,
    error::RegionError,
    extreme::{segment_from_extreme_points, ExtremePointSegmenter},
    history::UndoLog,
    store::{AnnotationStore, GroupId},
    watershed::{self, Scribble},
};

/// Blobs the user currently works on, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<BlobId>,
}

impl Selection {
    pub fn new(ids: impl IntoIterator<Item = BlobId>) -> Self {
        let mut selection = Self::default();
        ids.into_iter().for_each(|id| selection.add(id));
        selection
    }

    pub fn add(&mut self, id: BlobId) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: BlobId) {
        self.ids.retain(|other| *other != id);
    }

    pub fn toggle(&mut self, id: BlobId) {
        if self.contains(id) {
            self.remove(id);
        } else {
            self.add(id);
        }
    }

    pub fn contains(&self, id: BlobId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> &[BlobId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A user operation together with its input. Operations working on existing
/// blobs take them from the [`Selection`] passed to [`Session::apply`].
pub enum Operation<'a> {
    /// Merges two or more selected blobs.
    Union,
    /// Removes the second selected blob from the first; the second is deleted.
    Subtract,
    /// Removes the first selected blob from the second; both stay.
    Divide,
    /// Pen strokes drawn before confirming are applied as one operation.
    Cut {
        strokes: &'a [Vec<Pos2>],
    },
    /// Each stroke reshapes the border in turn.
    EditBorder {
        strokes: &'a [Vec<Pos2>],
    },
    RefineBorder {
        image: &'a RgbImage,
        refiner: &'a dyn BorderRefiner,
    },
    /// The strokes are joined into one closed curve.
    CreateFromCurve {
        strokes: &'a [Vec<Pos2>],
    },
    Watershed {
        image: &'a RgbImage,
        scribbles: &'a [Scribble],
    },
    DeepExtreme {
        image: &'a RgbImage,
        points: [Pos2; 4],
        segmenter: &'a dyn ExtremePointSegmenter,
    },
    RemoveHoles,
    AssignClass {
        class_name: &'a str,
    },
    Delete,
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Union => "UNION",
            Operation::Subtract => "SUBTRACT",
            Operation::Divide => "DIVIDE",
            Operation::Cut { .. } => "CUT",
            Operation::EditBorder { .. } => "EDITBORDER",
            Operation::RefineBorder { .. } => "REFINEBORDER",
            Operation::CreateFromCurve { .. } => "FREEHAND",
            Operation::Watershed { .. } => "WATERSHED",
            Operation::DeepExtreme { .. } => "DEEPEXTREME",
            Operation::RemoveHoles => "FILL",
            Operation::AssignClass { .. } => "ASSIGN",
            Operation::Delete => "DELETE",
        }
    }
}

/// The annotations of one image with their undo history.
///
/// Every change of the store goes through the session so that it ends up in
/// the pending undo transaction. [`Session::apply`] commits that transaction
/// when an operation succeeds.
pub struct Session {
    store: AnnotationStore,
    undo: UndoLog,
    config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self::with_store(AnnotationStore::new(), config)
    }

    pub fn with_store(store: AnnotationStore, config: Config) -> Self {
        Self {
            store,
            undo: UndoLog::new(config.max_undo),
            config,
        }
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn undo_log_mut(&mut self) -> &mut UndoLog {
        &mut self.undo
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_store(self) -> AnnotationStore {
        self.store
    }

    pub fn add_blob(&mut self, blob: Blob) -> Result<(), RegionError> {
        if self.store.contains(blob.id()) {
            return Err(RegionError::DuplicateId(blob.id()));
        }
        self.undo.record_added(&blob);
        self.store.add_blob(blob)
    }

    pub fn remove_blob(&mut self, id: BlobId) -> Option<Blob> {
        let blob = self.store.remove_blob(id)?;
        self.undo.record_removed(&blob);
        Some(blob)
    }

    /// Swaps `old` for `new` within the pending transaction. `new` may reuse
    /// the id of `old`.
    pub fn replace_blob(&mut self, old: BlobId, new: Blob) -> Result<(), RegionError> {
        if !self.store.contains(old) {
            return Err(RegionError::UnknownBlob(old));
        }
        if new.id() != old && self.store.contains(new.id()) {
            return Err(RegionError::DuplicateId(new.id()));
        }
        self.remove_blob(old);
        self.add_blob(new)
    }

    pub fn set_blob_class(&mut self, id: BlobId, class_name: &str) -> Result<(), RegionError> {
        let blob = self.store.get(id).ok_or(RegionError::UnknownBlob(id))?;
        if blob.class_name() == class_name {
            return Ok(());
        }
        let previous = self.store.set_class(id, class_name)?;
        self.undo
            .record_class_change(id, previous, class_name.to_string());
        Ok(())
    }

    pub fn set_note(&mut self, id: BlobId, note: impl Into<String>) -> Result<(), RegionError> {
        let blob = self.store.get_mut(id).ok_or(RegionError::UnknownBlob(id))?;
        blob.note = note.into();
        Ok(())
    }

    /// Commits the pending transaction.
    pub fn save_undo(&mut self) -> bool {
        self.undo.commit()
    }

    pub fn undo(&mut self) -> bool {
        self.undo.commit();
        self.undo.undo(&mut self.store)
    }

    pub fn redo(&mut self) -> bool {
        self.undo.redo(&mut self.store)
    }

    pub fn group_selection(&mut self, selection: &Selection) -> Option<GroupId> {
        if selection.len() < 2 {
            return None;
        }
        Some(self.store.add_group(selection.ids()))
    }

    pub fn ungroup(&mut self, group: GroupId) -> bool {
        self.store.remove_group(group).is_some()
    }

    /// Runs `operation` and commits it as one undo step. On success the
    /// selection holds the blobs the operation produced or changed and their
    /// ids are returned. On failure nothing changes.
    pub fn apply(
        &mut self,
        operation: Operation<'_>,
        selection: &mut Selection,
    ) -> Result<Vec<BlobId>, RegionError> {
        let name = operation.name();
        info!("[{name}] begins with {} selected blobs", selection.len());
        match self.run(operation, selection) {
            Ok(ids) => {
                self.save_undo();
                info!("[{name}] done, {} blobs", ids.len());
                *selection = Selection::new(ids.iter().copied());
                Ok(ids)
            }
            Err(e) => {
                warn!("[{name}] failed: {e}");
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        operation: Operation<'_>,
        selection: &Selection,
    ) -> Result<Vec<BlobId>, RegionError> {
        let config = self.config.clone();
        match operation {
            Operation::Union => {
                let blobs = self.selected(selection, 2, "at least 2")?;
                let merged = algebra::union(&blobs)?;
                let id = merged.id();
                self.remove_all(selection);
                self.add_blob(merged)?;
                Ok(vec![id])
            }
            Operation::Subtract => {
                let [a, b] = self.selected_pair(selection)?;
                let mut result = a.clone();
                algebra::subtract(&mut result, b)?;
                let (a, b) = (a.id(), b.id());
                self.replace_blob(a, result)?;
                self.remove_blob(b);
                Ok(vec![a])
            }
            Operation::Divide => {
                let [a, b] = self.selected_pair(selection)?;
                let mut result = b.clone();
                algebra::divide(a, &mut result)?;
                let (a, b) = (a.id(), b.id());
                self.replace_blob(b, result)?;
                Ok(vec![a, b])
            }
            Operation::Cut { strokes } => {
                let blob = self.selected_one(selection)?;
                let pieces = algebra::cut(
                    blob,
                    strokes,
                    config.cut_width,
                    config.min_region_area,
                    self.store.get_free_id(),
                )?;
                let id = blob.id();
                self.remove_blob(id);
                self.add_all(pieces)
            }
            Operation::EditBorder { strokes } => {
                let mut blob = self.selected_one(selection)?.clone();
                for stroke in strokes {
                    algebra::edit_border(&mut blob, stroke, config.edit_snap_distance)?;
                }
                let id = blob.id();
                self.replace_blob(id, blob)?;
                Ok(vec![id])
            }
            Operation::RefineBorder { image, refiner } => {
                let mut blob = self.selected_one(selection)?.clone();
                algebra::refine_border(
                    &mut blob,
                    image,
                    config.refine_padding,
                    config.refine_weights,
                    refiner,
                )?;
                let id = blob.id();
                self.replace_blob(id, blob)?;
                Ok(vec![id])
            }
            Operation::CreateFromCurve { strokes } => {
                let curve = strokes.concat();
                let blob = Blob::from_closed_curve(
                    &curve,
                    self.store.get_free_id(),
                    config.snap_tolerance,
                    config.min_vertex_distance,
                )?;
                self.add_all(vec![blob])
            }
            Operation::Watershed { image, scribbles } => {
                let blobs = watershed::segment(
                    image,
                    scribbles,
                    config.min_region_area,
                    self.store.get_free_id(),
                )?;
                self.add_all(blobs)
            }
            Operation::DeepExtreme {
                image,
                points,
                segmenter,
            } => {
                let blobs = segment_from_extreme_points(
                    image,
                    points,
                    config.extreme_padding,
                    config.extreme_area_ratio,
                    segmenter,
                    self.store.get_free_id(),
                )?;
                self.add_all(blobs)
            }
            Operation::RemoveHoles => {
                let blobs = self.selected(selection, 1, "at least 1")?;
                let mut filled = Vec::new();
                for blob in blobs {
                    let mut blob = blob.clone();
                    if algebra::remove_holes(&mut blob)? {
                        filled.push(blob);
                    }
                }
                for blob in filled {
                    self.replace_blob(blob.id(), blob)?;
                }
                Ok(selection.ids().to_vec())
            }
            Operation::AssignClass { class_name } => {
                self.selected(selection, 1, "at least 1")?;
                for id in selection.ids() {
                    self.set_blob_class(*id, class_name)?;
                }
                Ok(selection.ids().to_vec())
            }
            Operation::Delete => {
                self.selected(selection, 1, "at least 1")?;
                self.remove_all(selection);
                Ok(Vec::new())
            }
        }
    }

    fn selected(
        &self,
        selection: &Selection,
        min: usize,
        expected: &'static str,
    ) -> Result<Vec<&Blob>, RegionError> {
        if selection.len() < min {
            return Err(RegionError::InvalidSelection {
                expected,
                actual: selection.len(),
            });
        }
        selection
            .ids()
            .iter()
            .map(|id| self.store.get(*id).ok_or(RegionError::UnknownBlob(*id)))
            .collect()
    }

    fn selected_one(&self, selection: &Selection) -> Result<&Blob, RegionError> {
        match self.selected(selection, 1, "exactly 1")?.as_slice() {
            [blob] => Ok(*blob),
            blobs => Err(RegionError::InvalidSelection {
                expected: "exactly 1",
                actual: blobs.len(),
            }),
        }
    }

    fn selected_pair(&self, selection: &Selection) -> Result<[&Blob; 2], RegionError> {
        match self.selected(selection, 2, "exactly 2")?.as_slice() {
            [a, b] => Ok([*a, *b]),
            blobs => Err(RegionError::InvalidSelection {
                expected: "exactly 2",
                actual: blobs.len(),
            }),
        }
    }

    fn remove_all(&mut self, selection: &Selection) {
        for id in selection.ids() {
            self.remove_blob(*id);
        }
    }

    fn add_all(&mut self, blobs: Vec<Blob>) -> Result<Vec<BlobId>, RegionError> {
        let ids = blobs.iter().map(Blob::id).collect();
        for blob in blobs {
            self.add_blob(blob)?;
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use emath::pos2;

    use super::*;
    use crate::mask::tests::rect_mask;

    fn session_with(squares: &[(u32, i32, i32, u32)]) -> Session {
        let mut session = Session::new(Config::default());
        for (id, left, top, size) in squares {
            let blob = Blob::from_mask(rect_mask(*left, *top, *size, *size), BlobId(*id)).unwrap();
            session.add_blob(blob).unwrap();
        }
        session.save_undo();
        session
    }

    #[test]
    fn union_replaces_selection_and_undoes() {
        let mut session = session_with(&[(1, 0, 0, 5), (2, 2, 0, 5)]);
        let mut selection = Selection::new([BlobId(1), BlobId(2)]);
        let ids = session.apply(Operation::Union, &mut selection).unwrap();
        assert_eq!(ids, vec![BlobId(1)]);
        assert_eq!(selection.ids(), &[BlobId(1)]);
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().get(BlobId(1)).unwrap().mask().count(), 35);

        assert!(session.undo());
        assert_eq!(session.store().len(), 2);
        assert_eq!(session.store().get(BlobId(1)).unwrap().mask().count(), 25);
        assert!(session.redo());
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn failed_operation_changes_nothing() {
        let mut session = session_with(&[(1, 0, 0, 5), (2, 20, 20, 5)]);
        let mut selection = Selection::new([BlobId(1), BlobId(2)]);
        assert!(matches!(
            session.apply(Operation::Union, &mut selection),
            Err(RegionError::Disjoint)
        ));
        assert_eq!(session.store().len(), 2);
        assert_eq!(selection.len(), 2);
        assert_eq!(session.undo_log().len(), 1);
    }

    #[test]
    fn subtract_deletes_the_subtrahend() {
        let mut session = session_with(&[(1, 0, 0, 6), (2, 3, 0, 6)]);
        let mut selection = Selection::new([BlobId(1), BlobId(2)]);
        session.apply(Operation::Subtract, &mut selection).unwrap();
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().get(BlobId(1)).unwrap().mask().count(), 18);
    }

    #[test]
    fn divide_keeps_both() {
        let mut session = session_with(&[(1, 0, 0, 6), (2, 3, 0, 6)]);
        let mut selection = Selection::new([BlobId(1), BlobId(2)]);
        session.apply(Operation::Divide, &mut selection).unwrap();
        assert_eq!(session.store().get(BlobId(1)).unwrap().mask().count(), 36);
        assert_eq!(session.store().get(BlobId(2)).unwrap().mask().count(), 18);
    }

    #[test]
    fn cut_uses_fresh_ids() {
        let mut session = session_with(&[(1, 0, 0, 10)]);
        let mut selection = Selection::new([BlobId(1)]);
        let strokes = [vec![pos2(4.5, -2.0), pos2(4.5, 12.0)]];
        let ids = session
            .apply(Operation::Cut { strokes: &strokes }, &mut selection)
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.0 >= 2));
        assert!(!session.store().contains(BlobId(1)));
    }

    #[test]
    fn wrong_selection_is_rejected() {
        let mut session = session_with(&[(1, 0, 0, 5)]);
        let mut selection = Selection::new([BlobId(1)]);
        assert!(matches!(
            session.apply(Operation::Subtract, &mut selection),
            Err(RegionError::InvalidSelection { actual: 1, .. })
        ));
        let mut stale = Selection::new([BlobId(9)]);
        assert!(matches!(
            session.apply(Operation::Delete, &mut stale),
            Err(RegionError::UnknownBlob(BlobId(9)))
        ));
    }

    #[test]
    fn class_assignment_is_undoable() {
        let mut session = session_with(&[(1, 0, 0, 5), (2, 10, 0, 5)]);
        let mut selection = Selection::new([BlobId(1), BlobId(2)]);
        session
            .apply(
                Operation::AssignClass {
                    class_name: "coral",
                },
                &mut selection,
            )
            .unwrap();
        assert_eq!(session.store().get(BlobId(2)).unwrap().class_name(), "coral");
        session.undo();
        assert_eq!(session.store().get(BlobId(2)).unwrap().class_name(), "Empty");
    }

    #[test]
    fn unchanged_class_records_nothing() {
        let mut session = session_with(&[(1, 0, 0, 5)]);
        session.set_blob_class(BlobId(1), "Empty").unwrap();
        assert!(!session.save_undo());
    }

    #[test]
    fn freehand_curve_creates_a_blob() {
        let mut session = session_with(&[(4, 0, 0, 5)]);
        let mut selection = Selection::default();
        let strokes = [
            vec![pos2(20.0, 20.0), pos2(30.0, 20.0), pos2(30.0, 30.0)],
            vec![pos2(20.0, 30.0), pos2(20.0, 21.0)],
        ];
        let ids = session
            .apply(Operation::CreateFromCurve { strokes: &strokes }, &mut selection)
            .unwrap();
        assert_eq!(ids, vec![BlobId(5)]);
        let blob = session.store().hit_test(25, 25).unwrap();
        assert_eq!(blob.id(), BlobId(5));
        assert_eq!(blob.mask().count(), 100);
    }

    #[test]
    fn two_strokes_cut_in_one_step() {
        let mut session = session_with(&[(1, 0, 0, 10)]);
        let mut selection = Selection::new([BlobId(1)]);
        let half = [vec![pos2(4.5, -2.0), pos2(4.5, 5.0)]];
        assert!(matches!(
            session.apply(Operation::Cut { strokes: &half }, &mut selection),
            Err(RegionError::CutDidNotSeparate)
        ));

        let strokes = [
            vec![pos2(4.5, -2.0), pos2(4.5, 5.0)],
            vec![pos2(4.5, 4.0), pos2(4.5, 12.0)],
        ];
        let ids = session
            .apply(Operation::Cut { strokes: &strokes }, &mut selection)
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(session.undo_log().len(), 2);
        assert!(session.undo());
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().get(BlobId(1)).unwrap().mask().count(), 100);
    }

    #[test]
    fn border_strokes_are_one_undo_step() {
        let mut session = session_with(&[(1, 10, 10, 10)]);
        let mut selection = Selection::new([BlobId(1)]);
        let strokes = [
            vec![
                pos2(20.0, 12.0),
                pos2(25.0, 12.0),
                pos2(25.0, 18.0),
                pos2(20.0, 18.0),
            ],
            vec![
                pos2(10.0, 12.0),
                pos2(13.0, 12.0),
                pos2(13.0, 18.0),
                pos2(10.0, 18.0),
            ],
        ];
        session
            .apply(Operation::EditBorder { strokes: &strokes }, &mut selection)
            .unwrap();
        let blob = session.store().get(BlobId(1)).unwrap();
        assert!(blob.contains(24, 15));
        assert!(!blob.contains(11, 15));
        assert_eq!(blob.mask().count(), 100 + 30 - 18);

        assert!(session.undo());
        assert_eq!(session.store().get(BlobId(1)).unwrap().mask().count(), 100);
    }

    #[test]
    fn delete_then_undo_restores() {
        let mut session = session_with(&[(1, 0, 0, 5)]);
        let mut selection = Selection::new([BlobId(1)]);
        session.apply(Operation::Delete, &mut selection).unwrap();
        assert!(session.store().is_empty());
        assert!(selection.is_empty());
        session.undo();
        assert!(session.store().contains(BlobId(1)));
    }
}
