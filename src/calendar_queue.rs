//! Bucketed priority queue giving amortized O(1) push/pop when bucket
//! width tracks the average separation between consecutive priorities.
//! Every [`crate::model::coupled::Coupled`] coordinator keeps one of
//! these, keyed on the index of its children in
//! `Coupled::comps_vec`-equivalent storage, to find its imminent set
//! without scanning every child on every step.
//!
//! Entries with `time_next == f64::INFINITY` (passive models) are kept
//! out of the bucket array entirely — the bucket index a finite width
//! would compute for them is undefined — and tracked in a small side set
//! instead; they only surface from [`CalendarQueue::pop`] once nothing
//! finite remains.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

const MIN_BUCKETS: usize = 2;
const DEFAULT_WIDTH: f64 = 1.0;

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    time_next: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Bucket(usize),
    Infinite,
}

/// A calendar queue keyed on an opaque, cloneable, hashable `K`.
///
/// Ties (two entries with equal `time_next`) are broken **LIFO**: the
/// later-inserted entry pops first. [`CalendarQueue::push`] achieves this
/// by inserting new entries immediately after the run of existing
/// entries with the same or greater priority in their bucket's
/// descending vector, which places it closer to the tail (the pop side)
/// than anything already scheduled at that instant. This is documented
/// behavior, not an accident of implementation, and downstream CDEVS/
/// PDEVS determinism depends on callers knowing about it.
#[derive(Debug)]
pub struct CalendarQueue<K> {
    buckets: Vec<Vec<Entry<K>>>,
    infinite: HashSet<K>,
    locations: HashMap<K, Slot>,
    width: f64,
    last_bucket: usize,
    bucket_top: f64,
    last_priority: f64,
    size: usize,
    resize_enabled: bool,
}

impl<K: Eq + Hash + Clone> Default for CalendarQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> CalendarQueue<K> {
    pub fn new() -> Self {
        Self {
            buckets: (0..MIN_BUCKETS).map(|_| Vec::new()).collect(),
            infinite: HashSet::new(),
            locations: HashMap::new(),
            width: DEFAULT_WIDTH,
            last_bucket: 0,
            bucket_top: DEFAULT_WIDTH,
            last_priority: f64::NEG_INFINITY,
            size: 0,
            resize_enabled: true,
        }
    }

    /// Disables automatic resizing. Used by tests that want to exercise
    /// the fixed-bucket-count / direct-search code paths deterministically.
    pub fn with_resize_enabled(mut self, enabled: bool) -> Self {
        self.resize_enabled = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        self.locations.contains_key(key)
    }

    /// Schedules `key` at `time_next`. Panics if `key` is already
    /// scheduled — callers that want to change a key's priority must
    /// [`CalendarQueue::remove`] it first, or use [`CalendarQueue::reschedule`].
    pub fn push(&mut self, key: K, time_next: f64) {
        assert!(
            !self.locations.contains_key(&key),
            "calendar queue already contains this key; remove it before rescheduling"
        );
        self.push_internal(key, time_next);
        self.maybe_expand();
    }

    /// Convenience for the coordinator's "delete old position, reinsert
    /// under new time_next" step.
    pub fn reschedule(&mut self, key: K, new_time_next: f64) {
        self.remove(&key);
        self.push(key, new_time_next);
    }

    /// Removes `key` if present. Returns whether it was found.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.locations.remove(key) {
            Some(Slot::Infinite) => {
                self.infinite.remove(key);
                self.size -= 1;
                true
            }
            Some(Slot::Bucket(i)) => {
                let bucket = &mut self.buckets[i];
                let pos = bucket
                    .iter()
                    .position(|e| &e.key == key)
                    .expect("location map desynchronized from bucket contents");
                bucket.remove(pos);
                self.size -= 1;
                self.maybe_shrink();
                true
            }
            None => false,
        }
    }

    /// Returns the priority of the next item to pop, without removing it.
    pub fn peek_priority(&mut self) -> Option<f64> {
        match self.sweep_min_bucket() {
            Some(i) => Some(self.buckets[i].last().expect("swept bucket is nonempty").time_next),
            None if self.infinite.is_empty() => None,
            None => Some(f64::INFINITY),
        }
    }

    /// Removes and returns the (key, time_next) pair with the smallest
    /// `time_next` currently scheduled.
    pub fn pop(&mut self) -> Option<(K, f64)> {
        match self.sweep_min_bucket() {
            Some(i) => {
                let entry = self.buckets[i].pop().expect("swept bucket is nonempty");
                self.locations.remove(&entry.key);
                self.size -= 1;
                self.last_priority = entry.time_next;
                self.maybe_shrink();
                Some((entry.key, entry.time_next))
            }
            None => {
                let key = self.infinite.iter().next().cloned()?;
                self.infinite.remove(&key);
                self.locations.remove(&key);
                self.size -= 1;
                self.last_priority = f64::INFINITY;
                Some((key, f64::INFINITY))
            }
        }
    }

    fn push_internal(&mut self, key: K, time_next: f64) {
        if time_next.is_infinite() && time_next.is_sign_positive() {
            self.infinite.insert(key.clone());
            self.locations.insert(key, Slot::Infinite);
        } else {
            let i = self.bucket_index(time_next);
            let bucket = &mut self.buckets[i];
            // Scan from the tail: find the point after every existing
            // entry whose time_next is >= this one, so same-priority
            // entries inserted earlier stay further from the tail.
            let mut pos = bucket.len();
            while pos > 0 && bucket[pos - 1].time_next < time_next {
                pos -= 1;
            }
            bucket.insert(pos, Entry { key: key.clone(), time_next });
            self.locations.insert(key, Slot::Bucket(i));
        }
        self.size += 1;
    }

    fn bucket_index(&self, time_next: f64) -> usize {
        debug_assert!(time_next.is_finite());
        let n = self.buckets.len() as f64;
        (time_next / self.width).floor().rem_euclid(n) as usize
    }

    /// Sweeps starting at `last_bucket`, advancing `bucket_top` by
    /// `width` each step, until a bucket's tail priority falls under the
    /// current `bucket_top`. Falls back to a full linear scan
    /// ("direct search") if a whole revolution finds nothing, which can
    /// only happen if `width` badly underestimates event density.
    fn sweep_min_bucket(&mut self) -> Option<usize> {
        if self.size == self.infinite.len() {
            return None;
        }
        let n = self.buckets.len();
        let mut i = self.last_bucket;
        for _ in 0..n {
            if let Some(tail) = self.buckets[i].last() {
                if tail.time_next < self.bucket_top {
                    self.last_bucket = i;
                    return Some(i);
                }
            }
            i = (i + 1) % n;
            self.bucket_top += self.width;
        }
        let mut best: Option<(usize, f64)> = None;
        for (idx, bucket) in self.buckets.iter().enumerate() {
            if let Some(tail) = bucket.last() {
                let replace = match best {
                    Some((_, best_t)) => tail.time_next < best_t,
                    None => true,
                };
                if replace {
                    best = Some((idx, tail.time_next));
                }
            }
        }
        let (idx, min_t) = best.expect("size accounting says a finite entry exists");
        self.last_bucket = idx;
        self.bucket_top = ((min_t / self.width).floor() + 1.5) * self.width;
        Some(idx)
    }

    fn expand_threshold(&self) -> usize {
        2 * self.buckets.len()
    }

    fn shrink_threshold(&self) -> usize {
        (self.buckets.len() / 2).saturating_sub(2)
    }

    fn maybe_expand(&mut self) {
        if self.resize_enabled && self.size > self.expand_threshold() {
            self.resize(self.buckets.len() * 2);
        }
    }

    fn maybe_shrink(&mut self) {
        if self.resize_enabled
            && self.buckets.len() > MIN_BUCKETS
            && self.size < self.shrink_threshold()
        {
            self.resize((self.buckets.len() / 2).max(MIN_BUCKETS));
        }
    }

    /// Samples up to `clamp(size, 5, 25)` successive pops (with resizing
    /// disabled for the duration), measures their mean separation `mu`,
    /// then refines it to `mu'` over just the separations under `2*mu`
    /// to discount outlier gaps, and returns `3*mu'` as the new bucket
    /// width. Every sampled entry is restored before returning.
    fn new_width(&mut self) -> f64 {
        let n = self.size.clamp(5, 25).min(self.size);
        if n < 2 {
            return self.width;
        }
        let was_enabled = self.resize_enabled;
        self.resize_enabled = false;
        let mut sample = Vec::with_capacity(n);
        for _ in 0..n {
            match self.pop() {
                Some(e) => sample.push(e),
                None => break,
            }
        }
        let separations: Vec<f64> = sample
            .windows(2)
            .map(|w| w[1].1 - w[0].1)
            .filter(|d| d.is_finite() && *d > 0.0)
            .collect();
        let new_width = if separations.is_empty() {
            self.width
        } else {
            let mu = separations.iter().sum::<f64>() / separations.len() as f64;
            let refined: Vec<f64> = separations.iter().copied().filter(|&d| d < 2.0 * mu).collect();
            let mu_prime = if refined.is_empty() {
                mu
            } else {
                refined.iter().sum::<f64>() / refined.len() as f64
            };
            3.0 * mu_prime
        };
        for (key, time_next) in sample {
            self.push_internal(key, time_next);
        }
        self.resize_enabled = was_enabled;
        if new_width.is_finite() && new_width > 0.0 {
            new_width
        } else {
            self.width
        }
    }

    fn resize(&mut self, new_count: usize) {
        if !self.resize_enabled {
            return;
        }
        let new_count = new_count.max(MIN_BUCKETS);
        let new_width = self.new_width();
        tracing::warn!(
            old_buckets = self.buckets.len(),
            new_buckets = new_count,
            new_width,
            "calendar queue resize"
        );

        let mut all: Vec<Entry<K>> = Vec::with_capacity(self.size);
        for bucket in self.buckets.drain(..) {
            all.extend(bucket);
        }
        for key in self.infinite.drain() {
            all.push(Entry { key, time_next: f64::INFINITY });
        }
        self.locations.clear();
        self.buckets = (0..new_count).map(|_| Vec::new()).collect();
        self.width = new_width;
        self.size = 0;

        for entry in all {
            self.push_internal(entry.key, entry.time_next);
        }
        self.last_bucket = 0;
        self.bucket_top = self.width;
        self.last_priority = f64::NEG_INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_has_no_priority() {
        let mut q: CalendarQueue<usize> = CalendarQueue::new();
        assert_eq!(q.peek_priority(), None);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn round_trip_ascending_order() {
        let mut q = CalendarQueue::new();
        let times = [5.0, 1.0, 3.0, 2.0, 4.0];
        for (i, &t) in times.iter().enumerate() {
            q.push(i, t);
        }
        let mut popped = Vec::new();
        while let Some((_, t)) = q.pop() {
            popped.push(t);
        }
        assert_eq!(popped, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn ties_pop_lifo() {
        let mut q = CalendarQueue::new();
        q.push("a", 1.0);
        q.push("b", 1.0);
        q.push("c", 1.0);
        assert_eq!(q.pop(), Some(("c", 1.0)));
        assert_eq!(q.pop(), Some(("b", 1.0)));
        assert_eq!(q.pop(), Some(("a", 1.0)));
    }

    #[test]
    fn remove_before_pop() {
        let mut q = CalendarQueue::new();
        q.push(1, 10.0);
        q.push(2, 5.0);
        assert!(q.remove(&1));
        assert!(!q.remove(&1));
        assert_eq!(q.pop(), Some((2, 5.0)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn reschedule_moves_priority() {
        let mut q = CalendarQueue::new();
        q.push("x", 1.0);
        q.push("y", 2.0);
        q.reschedule("x", 5.0);
        assert_eq!(q.pop(), Some(("y", 2.0)));
        assert_eq!(q.pop(), Some(("x", 5.0)));
    }

    #[test]
    fn infinite_priorities_pop_last() {
        let mut q = CalendarQueue::new();
        q.push("passive", f64::INFINITY);
        q.push("active", 1.0);
        assert_eq!(q.peek_priority(), Some(1.0));
        assert_eq!(q.pop(), Some(("active", 1.0)));
        assert_eq!(q.peek_priority(), Some(f64::INFINITY));
        assert_eq!(q.pop(), Some(("passive", f64::INFINITY)));
    }

    #[test]
    fn survives_forced_resize() {
        let mut q = CalendarQueue::new();
        for i in 0..200usize {
            q.push(i, i as f64 * 0.37);
        }
        assert_eq!(q.len(), 200);
        let mut last = f64::NEG_INFINITY;
        let mut count = 0;
        while let Some((_, t)) = q.pop() {
            assert!(t >= last);
            last = t;
            count += 1;
        }
        assert_eq!(count, 200);
    }

    #[test]
    fn resize_disabled_still_correct() {
        let mut q: CalendarQueue<usize> = CalendarQueue::new().with_resize_enabled(false);
        for i in 0..100usize {
            q.push(i, (99 - i) as f64);
        }
        let mut last = f64::NEG_INFINITY;
        while let Some((_, t)) = q.pop() {
            assert!(t >= last);
            last = t;
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip_is_sorted(mut times in proptest::collection::vec(-1000.0f64..1000.0, 0..200)) {
            // Deduplicate so each key maps to a distinct, unambiguous priority.
            times.dedup_by(|a, b| a == b);
            let mut q = CalendarQueue::new();
            for (i, &t) in times.iter().enumerate() {
                q.push(i, t);
            }
            let initial_len = q.len();
            proptest::prop_assert_eq!(initial_len, times.len());
            let mut last = f64::NEG_INFINITY;
            let mut popped = 0;
            while let Some((_, t)) = q.pop() {
                proptest::prop_assert!(t >= last);
                last = t;
                popped += 1;
            }
            proptest::prop_assert_eq!(popped, times.len());
        }

        #[test]
        fn prop_size_matches_net_inserts(ops in proptest::collection::vec((0usize..50, -500.0f64..500.0, proptest::bool::ANY), 0..300)) {
            let mut q = CalendarQueue::new();
            let mut present = std::collections::HashSet::new();
            for (key, time_next, insert) in ops {
                if insert {
                    if present.insert(key) {
                        q.push(key, time_next);
                    }
                } else if present.remove(&key) {
                    q.remove(&key);
                }
            }
            proptest::prop_assert_eq!(q.len(), present.len());
        }
    }
}
