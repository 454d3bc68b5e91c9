use std::collections::VecDeque;

use log::{info, warn};

use crate::{
    blob::{Blob, BlobId},
    store::AnnotationStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassChange {
    pub blob: BlobId,
    pub previous: String,
    pub current: String,
}

/// Everything one user operation changed in the store.
#[derive(Debug, Clone, Default)]
pub struct UndoTransaction {
    pub added: Vec<Blob>,
    pub removed: Vec<Blob>,
    pub class_changes: Vec<ClassChange>,
}

impl UndoTransaction {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.class_changes.is_empty()
    }

    fn revert(&self, store: &mut AnnotationStore) {
        for blob in &self.added {
            info!("[UNDO][REMOVE] BLOBID={} VERSION={}", blob.id(), blob.version());
            store.remove_blob(blob.id());
        }
        for blob in &self.removed {
            info!("[UNDO][ADD] BLOBID={} VERSION={}", blob.id(), blob.version());
            if let Err(e) = store.add_blob(blob.clone()) {
                warn!("Couldn't restore blob {}: {e}", blob.id());
            }
        }
        for change in self.class_changes.iter().rev() {
            if let Err(e) = store.set_class(change.blob, &change.previous) {
                warn!("Couldn't restore class of {}: {e}", change.blob);
            }
        }
    }

    fn reapply(&self, store: &mut AnnotationStore) {
        for blob in &self.removed {
            info!("[REDO][REMOVE] BLOBID={} VERSION={}", blob.id(), blob.version());
            store.remove_blob(blob.id());
        }
        for blob in &self.added {
            info!("[REDO][ADD] BLOBID={} VERSION={}", blob.id(), blob.version());
            if let Err(e) = store.add_blob(blob.clone()) {
                warn!("Couldn't re-add blob {}: {e}", blob.id());
            }
        }
        for change in &self.class_changes {
            if let Err(e) = store.set_class(change.blob, &change.current) {
                warn!("Couldn't reapply class of {}: {e}", change.blob);
            }
        }
    }
}

/// Bounded list of committed transactions plus the one being recorded.
///
/// `end` separates the transactions that can be undone from those that can be
/// redone. Committing drops everything after `end`, and the oldest entries once
/// `capacity` is exceeded.
pub struct UndoLog {
    transactions: VecDeque<UndoTransaction>,
    end: usize,
    pending: UndoTransaction,
    capacity: usize,
    not_dirty_pos: Option<usize>,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(20)
    }
}

impl UndoLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            transactions: VecDeque::with_capacity(capacity),
            end: 0,
            pending: UndoTransaction::default(),
            capacity,
            not_dirty_pos: Some(0),
        }
    }

    /// Committed transactions that can still be undone, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &'_ UndoTransaction> {
        self.transactions.iter().take(self.end)
    }

    pub fn len(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn pending(&self) -> &UndoTransaction {
        &self.pending
    }

    pub fn record_added(&mut self, blob: &Blob) {
        self.pending.added.push(blob.clone());
    }

    pub fn record_removed(&mut self, blob: &Blob) {
        self.pending.removed.push(blob.clone());
    }

    pub fn record_class_change(&mut self, blob: BlobId, previous: String, current: String) {
        self.pending.class_changes.push(ClassChange {
            blob,
            previous,
            current,
        });
    }

    /// Closes the pending transaction. Returns false if it was empty, in which
    /// case nothing is recorded.
    pub fn commit(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let transaction = std::mem::take(&mut self.pending);

        match self.not_dirty_pos {
            Some(pos) if pos > self.end => self.not_dirty_pos = None,
            _ => (),
        }
        self.transactions.truncate(self.end);
        self.transactions.push_back(transaction);
        if self.transactions.len() > self.capacity {
            self.transactions.pop_front();
            self.not_dirty_pos = self.not_dirty_pos.and_then(|pos| pos.checked_sub(1));
        }
        self.end = self.transactions.len();
        true
    }

    /// Throws away the pending transaction without touching the store.
    pub fn discard_pending(&mut self) {
        self.pending = UndoTransaction::default();
    }

    pub fn undo(&mut self, store: &mut AnnotationStore) -> bool {
        let Some(transaction) = self
            .end
            .checked_sub(1)
            .and_then(|i| self.transactions.get(i))
        else {
            return false;
        };
        transaction.revert(store);
        self.end -= 1;
        true
    }

    pub fn redo(&mut self, store: &mut AnnotationStore) -> bool {
        let Some(transaction) = self.transactions.get(self.end) else {
            return false;
        };
        transaction.reapply(store);
        self.end += 1;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.not_dirty_pos != Some(self.end)
    }

    pub fn mark_not_dirty(&mut self) {
        self.not_dirty_pos = Some(self.end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::tests::rect_mask;

    fn blob(id: u32) -> Blob {
        Blob::from_mask(rect_mask(id as i32 * 10, 0, 3, 3), BlobId(id)).unwrap()
    }

    fn add(log: &mut UndoLog, store: &mut AnnotationStore, id: u32) {
        let blob = blob(id);
        log.record_added(&blob);
        store.add_blob(blob).unwrap();
        log.commit();
    }

    #[test]
    fn undo_empty_returns_false() {
        let mut log = UndoLog::default();
        assert!(!log.undo(&mut AnnotationStore::new()));
    }

    #[test]
    fn empty_commit_is_not_recorded() {
        let mut log = UndoLog::default();
        assert!(!log.commit());
        assert!(log.is_empty());
    }

    #[test]
    fn insert_undo_and_redo() {
        let mut log = UndoLog::default();
        let mut store = AnnotationStore::new();
        add(&mut log, &mut store, 1);
        assert!(log.undo(&mut store));
        assert!(store.is_empty());
        assert!(!log.undo(&mut store));
        assert!(log.redo(&mut store));
        assert!(store.contains(BlobId(1)));
    }

    #[test]
    fn commit_after_undo_drops_redo() {
        let mut log = UndoLog::default();
        let mut store = AnnotationStore::new();
        add(&mut log, &mut store, 1);
        assert!(log.undo(&mut store));
        add(&mut log, &mut store, 2);
        assert!(!log.redo(&mut store));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn oldest_transaction_is_evicted() {
        let mut log = UndoLog::new(3);
        let mut store = AnnotationStore::new();
        for id in 1..=4 {
            add(&mut log, &mut store, id);
        }
        assert_eq!(log.len(), 3);
        while log.undo(&mut store) {}
        assert_eq!(store.len(), 1);
        assert!(store.contains(BlobId(1)));
    }

    #[test]
    fn class_changes_are_reverted() {
        let mut log = UndoLog::default();
        let mut store = AnnotationStore::new();
        store.add_blob(blob(1)).unwrap();
        let previous = store.set_class(BlobId(1), "coral").unwrap();
        log.record_class_change(BlobId(1), previous, "coral".into());
        log.commit();

        log.undo(&mut store);
        assert_eq!(store.get(BlobId(1)).unwrap().class_name(), "Empty");
        log.redo(&mut store);
        assert_eq!(store.get(BlobId(1)).unwrap().class_name(), "coral");
    }

    #[test]
    fn dirty_tracking() {
        let mut log = UndoLog::default();
        let mut store = AnnotationStore::new();
        assert!(!log.is_dirty());
        add(&mut log, &mut store, 1);
        assert!(log.is_dirty());
        log.mark_not_dirty();
        assert!(!log.is_dirty());
        log.undo(&mut store);
        assert!(log.is_dirty());
        log.redo(&mut store);
        assert!(!log.is_dirty());
    }
}
