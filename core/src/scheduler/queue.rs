//! FIFO queue plus bounded active set.

use std::collections::{HashSet, VecDeque};

use crate::models::UploadId;

/// Pending ids waiting for a slot, and the ids currently holding one.
///
/// An id is never in both at once and the active set never grows past
/// `limit`.
#[derive(Debug, Clone)]
pub struct UploadQueue {
    queue: VecDeque<UploadId>,
    active: HashSet<UploadId>,
    limit: usize,
}

impl UploadQueue {
    /// `limit` is clamped to at least 1.
    pub fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            active: HashSet::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append to the tail. Ignored (returns `false`) for ids already queued or active.
    pub fn enqueue(&mut self, id: UploadId) -> bool {
        if self.active.contains(&id) || self.queue.contains(&id) {
            return false;
        }
        self.queue.push_back(id);
        true
    }

    pub fn has_capacity(&self) -> bool {
        self.active.len() < self.limit
    }

    /// Move the first startable head id into the active set.
    ///
    /// Ids at the head for which `startable` returns `false` are dropped
    /// from the queue. Returns `None` when the active set is full or the
    /// queue runs dry.
    pub fn admit_next(&mut self, mut startable: impl FnMut(UploadId) -> bool) -> Option<UploadId> {
        while self.has_capacity() {
            let id = self.queue.pop_front()?;
            if self.active.contains(&id) || !startable(id) {
                log::debug!("Dropping stale queue entry {}", id);
                continue;
            }
            self.active.insert(id);
            return Some(id);
        }
        None
    }

    /// Move a specific id straight into the active set, bypassing order.
    ///
    /// Returns `false` when no slot is free or it is already active.
    pub fn admit(&mut self, id: UploadId) -> bool {
        if !self.has_capacity() || self.active.contains(&id) {
            return false;
        }
        self.queue.retain(|queued| *queued != id);
        self.active.insert(id);
        true
    }

    /// Release the slot held by `id`.
    pub fn finish(&mut self, id: UploadId) -> bool {
        self.active.remove(&id)
    }

    /// Drop `id` from the queue (not from the active set).
    pub fn remove(&mut self, id: UploadId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|queued| *queued != id);
        before != self.queue.len()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub fn is_queued(&self, id: UploadId) -> bool {
        self.queue.contains(&id)
    }

    pub fn is_active(&self, id: UploadId) -> bool {
        self.active.contains(&id)
    }

    /// Queued ids, head first.
    pub fn queued(&self) -> Vec<UploadId> {
        self.queue.iter().copied().collect()
    }

    pub fn active(&self) -> Vec<UploadId> {
        self.active.iter().copied().collect()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<UploadId> {
        (0..n).map(|_| UploadId::new()).collect()
    }

    #[test]
    fn test_fifo_admission_respects_limit() {
        let ids = ids(3);
        let mut queue = UploadQueue::new(1);
        for id in &ids {
            assert!(queue.enqueue(*id));
        }

        assert_eq!(queue.admit_next(|_| true), Some(ids[0]));
        assert_eq!(queue.admit_next(|_| true), None);
        assert_eq!(queue.active_len(), 1);

        queue.finish(ids[0]);
        assert_eq!(queue.admit_next(|_| true), Some(ids[1]));
        queue.finish(ids[1]);
        assert_eq!(queue.admit_next(|_| true), Some(ids[2]));
        assert!(queue.queued().is_empty());
    }

    #[test]
    fn test_higher_limit_admits_in_order() {
        let ids = ids(3);
        let mut queue = UploadQueue::new(2);
        ids.iter().for_each(|id| {
            queue.enqueue(*id);
        });

        assert_eq!(queue.admit_next(|_| true), Some(ids[0]));
        assert_eq!(queue.admit_next(|_| true), Some(ids[1]));
        assert_eq!(queue.admit_next(|_| true), None);
        assert_eq!(queue.queued(), vec![ids[2]]);
    }

    #[test]
    fn test_no_duplicates() {
        let id = UploadId::new();
        let mut queue = UploadQueue::new(1);
        assert!(queue.enqueue(id));
        assert!(!queue.enqueue(id));

        queue.admit_next(|_| true);
        assert!(!queue.enqueue(id), "active ids cannot be re-queued");
    }

    #[test]
    fn test_unstartable_heads_are_dropped() {
        let ids = ids(3);
        let mut queue = UploadQueue::new(1);
        ids.iter().for_each(|id| {
            queue.enqueue(*id);
        });

        let admitted = queue.admit_next(|id| id == ids[2]);
        assert_eq!(admitted, Some(ids[2]));
        assert!(queue.queued().is_empty());
    }

    #[test]
    fn test_manual_admit_bypasses_order_but_not_limit() {
        let ids = ids(3);
        let mut queue = UploadQueue::new(1);
        ids.iter().for_each(|id| {
            queue.enqueue(*id);
        });

        assert!(queue.admit(ids[2]));
        assert!(!queue.is_queued(ids[2]));
        assert!(!queue.admit(ids[1]));
        assert_eq!(queue.queued(), vec![ids[0], ids[1]]);
    }

    #[test]
    fn test_remove_only_touches_queue() {
        let ids = ids(2);
        let mut queue = UploadQueue::new(1);
        queue.enqueue(ids[0]);
        queue.enqueue(ids[1]);
        queue.admit_next(|_| true);

        assert!(!queue.remove(ids[0]));
        assert!(queue.is_active(ids[0]));
        assert!(queue.remove(ids[1]));
        assert!(!queue.remove(ids[1]));
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(UploadQueue::new(0).limit(), 1);
    }
}
