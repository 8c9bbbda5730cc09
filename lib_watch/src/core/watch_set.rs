//! # Watched-Id Set
//!
//! Bounded, insertion-ordered set of question ids plus the subset of those
//! ids still flagged as new. Insertion order doubles as the eviction order:
//! the front of the set is the oldest confirmed member.
//!
//! Invariants kept by every method:
//! - `len() <= limit()` after `evict_excess`
//! - every new marker is also a member

use indexmap::IndexSet;

use crate::stackexchange::MAX_BATCH;

#[derive(Debug, Clone)]
pub struct WatchSet {
    limit: usize,
    ids: IndexSet<i64>,
    new_ids: IndexSet<i64>,
}

impl WatchSet {
    /// # Panics
    /// When `limit` is outside `1..=100`; the API caps a by-id batch at 100.
    pub fn new(limit: usize) -> Self {
        assert!((1..=MAX_BATCH).contains(&limit), "limit {} outside 1..={}", limit, MAX_BATCH);
        Self {
            limit,
            ids: IndexSet::new(),
            new_ids: IndexSet::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Members, oldest first.
    pub fn ids(&self) -> Vec<i64> {
        self.ids.iter().copied().collect()
    }

    /// Appends `id` as the newest member. False if it was already a member.
    pub fn push(&mut self, id: i64) -> bool {
        self.ids.insert(id)
    }

    /// Adds a newest-first result list so that its oldest entry lands first.
    /// Existing members keep their position.
    pub fn add_oldest_first(&mut self, newest_first: &[i64]) {
        for id in newest_first.iter().rev() {
            self.ids.insert(*id);
        }
    }

    /// Removes the oldest members until the set fits its limit. Returns the
    /// evicted ids, oldest first.
    pub fn evict_excess(&mut self) -> Vec<i64> {
        let mut evicted = Vec::new();
        while self.ids.len() > self.limit {
            match self.ids.shift_remove_index(0) {
                Some(id) => evicted.push(id),
                None => break,
            }
        }
        if !evicted.is_empty() {
            log::debug!("Dropping {} watched question(s): {:?}", evicted.len(), evicted);
        }
        let ids = &self.ids;
        self.new_ids.retain(|id| ids.contains(id));
        evicted
    }

    pub fn remove(&mut self, id: i64) -> bool {
        self.new_ids.shift_remove(&id);
        self.ids.shift_remove(&id)
    }

    /// Flags a member as new. Ignored for non-members.
    pub fn mark_new(&mut self, id: i64) -> bool {
        if self.ids.contains(&id) {
            self.new_ids.insert(id)
        } else {
            false
        }
    }

    pub fn mark_seen(&mut self, id: i64) -> bool {
        self.new_ids.shift_remove(&id)
    }

    pub fn mark_all_seen(&mut self) {
        self.new_ids.clear();
    }

    pub fn is_new(&self, id: i64) -> bool {
        self.new_ids.contains(&id)
    }

    pub fn new_count(&self) -> usize {
        self.new_ids.len()
    }

    pub fn new_ids(&self) -> Vec<i64> {
        self.new_ids.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers_are_members(set: &WatchSet) -> bool {
        set.new_ids().iter().all(|id| set.contains(*id))
    }

    #[test]
    fn evicts_oldest_first() {
        let mut set = WatchSet::new(2);
        set.push(10);
        set.push(11);
        set.push(12);
        assert_eq!(set.evict_excess(), vec![10]);
        assert_eq!(set.ids(), vec![11, 12]);
    }

    #[test]
    fn newest_first_results_are_inserted_oldest_first() {
        let mut set = WatchSet::new(2);
        set.push(10);
        set.push(11);
        set.add_oldest_first(&[12, 11, 10]);
        set.mark_new(12);
        set.evict_excess();
        assert_eq!(set.ids(), vec![11, 12]);
        assert_eq!(set.new_ids(), vec![12]);
    }

    #[test]
    fn existing_members_keep_their_position() {
        let mut set = WatchSet::new(5);
        set.push(3);
        set.push(1);
        set.add_oldest_first(&[4, 3, 2]);
        assert_eq!(set.ids(), vec![3, 1, 2, 4]);
    }

    #[test]
    fn eviction_drops_markers_of_evicted_ids() {
        let mut set = WatchSet::new(1);
        set.push(1);
        set.mark_new(1);
        set.push(2);
        set.mark_new(2);
        set.evict_excess();
        assert_eq!(set.new_ids(), vec![2]);
        assert!(markers_are_members(&set));
    }

    #[test]
    fn markers_need_membership() {
        let mut set = WatchSet::new(3);
        assert!(!set.mark_new(5));
        set.push(5);
        assert!(set.mark_new(5));
        assert!(!set.mark_new(5));
        set.remove(5);
        assert!(!set.is_new(5));
        assert!(markers_are_members(&set));
    }

    #[test]
    fn seen_markers() {
        let mut set = WatchSet::new(3);
        for id in [1, 2, 3] {
            set.push(id);
            set.mark_new(id);
        }
        assert!(set.mark_seen(2));
        assert!(!set.mark_seen(2));
        assert_eq!(set.new_count(), 2);
        set.mark_all_seen();
        assert_eq!(set.new_count(), 0);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn size_never_exceeds_limit_after_eviction() {
        let mut set = WatchSet::new(7);
        for round in 0..20i64 {
            let batch: Vec<i64> = (round * 3..round * 3 + 5).rev().collect();
            set.add_oldest_first(&batch);
            set.mark_new(round * 3 + 4);
            set.evict_excess();
            assert!(set.len() <= set.limit());
            assert!(markers_are_members(&set));
        }
    }

    #[test]
    #[should_panic]
    fn limit_above_batch_cap_is_rejected() {
        WatchSet::new(101);
    }
}
