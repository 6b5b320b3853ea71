use std::collections::btree_map::{self, BTreeMap};
use std::ops::Bound;

use crate::shared::time_stamp::{SeekMode, TimeStamp};

/// Ordered map keyed by [`TimeStamp`] with mode-aware seeking.
///
/// Keys are unique; inserting at an existing timestamp is rejected rather
/// than overwriting, so the first value written for a time always wins.
/// Keys must be uniformly timed or uniformly frame-only, since mixed keys
/// have no consistent order; the first key fixes the kind.
#[derive(Clone, Debug)]
pub struct TimeIndexedMap<T> {
    entries: BTreeMap<TimeStamp, T>,
}

impl<T> TimeIndexedMap<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `value` at `key`. Returns `false` and leaves the map untouched
    /// when the key is invalid, already present or of the other kind.
    pub fn insert(&mut self, key: TimeStamp, value: T) -> bool {
        if !key.is_valid() {
            return false;
        }
        if !self.matches_key_kind(&key) {
            return false;
        }
        match self.entries.entry(key) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Whether `key` is timed exactly when the existing keys are.
    pub fn matches_key_kind(&self, key: &TimeStamp) -> bool {
        self.entries
            .first_key_value()
            .map_or(true, |(first, _)| first.time().is_some() == key.time().is_some())
    }

    pub fn contains_key(&self, key: &TimeStamp) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &TimeStamp) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn first(&self) -> Option<(&TimeStamp, &T)> {
        self.entries.first_key_value()
    }

    pub fn last(&self) -> Option<(&TimeStamp, &T)> {
        self.entries.last_key_value()
    }

    /// First entry strictly after `key`.
    pub fn next_after(&self, key: &TimeStamp) -> Option<(&TimeStamp, &T)> {
        self.entries
            .range((Bound::Excluded(*key), Bound::Unbounded))
            .next()
    }

    /// Last entry strictly before `key`.
    pub fn prev_before(&self, key: &TimeStamp) -> Option<(&TimeStamp, &T)> {
        self.entries
            .range((Bound::Unbounded, Bound::Excluded(*key)))
            .next_back()
    }

    /// Looks up `key` according to `mode`:
    ///
    /// - `Exact`: the entry at `key`.
    /// - `LowerBound`: smallest key `>= key`.
    /// - `UpperBound`: largest key `<= key`.
    /// - `Nearest`: key at minimal distance; the earlier key wins a tie.
    pub fn seek(&self, key: &TimeStamp, mode: SeekMode) -> Option<(&TimeStamp, &T)> {
        if !key.is_valid() {
            return None;
        }
        match mode {
            SeekMode::Exact => self.entries.get_key_value(key),
            SeekMode::LowerBound => self.entries.range(key..).next(),
            SeekMode::UpperBound => self.entries.range(..=key).next_back(),
            SeekMode::Nearest => {
                let floor = self.entries.range(..=key).next_back();
                let ceiling = self.entries.range(key..).next();
                match (floor, ceiling) {
                    (Some(f), Some(c)) => {
                        let df = key.distance(f.0).unwrap_or(f64::INFINITY);
                        let dc = key.distance(c.0).unwrap_or(f64::INFINITY);
                        if dc < df {
                            Some(c)
                        } else {
                            Some(f)
                        }
                    }
                    (f, c) => f.or(c),
                }
            }
        }
    }

    /// Entries with keys in `[start, end]`, in order.
    pub fn range_inclusive(
        &self,
        start: TimeStamp,
        end: TimeStamp,
    ) -> impl DoubleEndedIterator<Item = (&TimeStamp, &T)> {
        let bounds = if start <= end {
            (Bound::Included(start), Bound::Included(end))
        } else {
            (Bound::Included(start), Bound::Excluded(start))
        };
        self.entries.range(bounds)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, TimeStamp, T> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, TimeStamp, T> {
        self.entries.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, TimeStamp, T> {
        self.entries.values()
    }
}

impl<T: Clone> TimeIndexedMap<T> {
    /// Copy of the entries whose keys fall in `[start, end]`.
    pub fn subset(&self, start: TimeStamp, end: TimeStamp) -> Self {
        self.range_inclusive(start, end)
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }
}

impl<T> Default for TimeIndexedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(TimeStamp, T)> for TimeIndexedMap<T> {
    fn from_iter<I: IntoIterator<Item = (TimeStamp, T)>>(iter: I) -> Self {
        let mut map = TimeIndexedMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<'a, T> IntoIterator for &'a TimeIndexedMap<T> {
    type Item = (&'a TimeStamp, &'a T);
    type IntoIter = btree_map::Iter<'a, TimeStamp, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const T0: f64 = 1000.0;

    fn five_frames() -> TimeIndexedMap<u32> {
        (0..5u32)
            .map(|i| (TimeStamp::from_time(T0 + f64::from(i)), i))
            .collect()
    }

    fn seek_time(map: &TimeIndexedMap<u32>, t: f64, mode: SeekMode) -> Option<f64> {
        map.seek(&TimeStamp::from_time(t), mode)
            .and_then(|(k, _)| k.time())
    }

    #[rstest]
    #[case::nearest_rounds_down(T0 + 0.4, SeekMode::Nearest, Some(T0))]
    #[case::nearest_rounds_up(T0 + 0.6, SeekMode::Nearest, Some(T0 + 1.0))]
    #[case::exact_miss(T0 + 0.4, SeekMode::Exact, None)]
    #[case::exact_hit(T0 + 2.0, SeekMode::Exact, Some(T0 + 2.0))]
    #[case::lower_bound_before_start(T0 - 1.0, SeekMode::LowerBound, Some(T0))]
    #[case::upper_bound_before_start(T0 - 1.0, SeekMode::UpperBound, None)]
    #[case::lower_bound_past_end(T0 * 99.0, SeekMode::LowerBound, None)]
    #[case::upper_bound_past_end(T0 * 99.0, SeekMode::UpperBound, Some(T0 + 4.0))]
    #[case::lower_bound_between(T0 + 1.5, SeekMode::LowerBound, Some(T0 + 2.0))]
    #[case::upper_bound_between(T0 + 1.5, SeekMode::UpperBound, Some(T0 + 1.0))]
    #[case::nearest_before_start(T0 - 50.0, SeekMode::Nearest, Some(T0))]
    #[case::nearest_past_end(T0 + 50.0, SeekMode::Nearest, Some(T0 + 4.0))]
    #[case::nearest_tie_prefers_earlier(T0 + 2.5, SeekMode::Nearest, Some(T0 + 2.0))]
    fn test_seek_vectors(#[case] target: f64, #[case] mode: SeekMode, #[case] expected: Option<f64>) {
        assert_eq!(seek_time(&five_frames(), target, mode), expected);
    }

    #[test]
    fn test_every_key_seeks_exactly_to_itself() {
        let map = five_frames();
        for key in map.keys() {
            for mode in [
                SeekMode::Exact,
                SeekMode::Nearest,
                SeekMode::LowerBound,
                SeekMode::UpperBound,
            ] {
                assert_eq!(map.seek(key, mode).map(|(k, _)| *k), Some(*key));
            }
        }
    }

    #[test]
    fn test_seek_on_empty_map() {
        let map: TimeIndexedMap<u32> = TimeIndexedMap::new();
        assert!(map.seek(&TimeStamp::from_time(1.0), SeekMode::Nearest).is_none());
        assert!(map.first().is_none());
    }

    #[test]
    fn test_seek_with_invalid_key() {
        let map = five_frames();
        assert!(map.seek(&TimeStamp::INVALID, SeekMode::Nearest).is_none());
    }

    #[test]
    fn test_insert_rejects_duplicate_and_keeps_first() {
        let mut map = TimeIndexedMap::new();
        assert!(map.insert(TimeStamp::from_time(1.0), "first"));
        assert!(!map.insert(TimeStamp::from_time(1.0), "second"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&TimeStamp::from_time(1.0)), Some(&"first"));
    }

    #[test]
    fn test_insert_rejects_invalid_key() {
        let mut map = TimeIndexedMap::new();
        assert!(!map.insert(TimeStamp::INVALID, 1));
        assert!(map.is_empty());
    }

    #[test]
    fn test_insert_rejects_mixed_key_kinds() {
        let mut timed = TimeIndexedMap::new();
        assert!(timed.insert(TimeStamp::new(Some(1.0), Some(10)), "a"));
        assert!(timed.insert(TimeStamp::new(Some(2.0), Some(5)), "b"));
        assert!(!timed.insert(TimeStamp::from_frame(7), "c"));
        assert_eq!(timed.len(), 2);

        let mut frames = TimeIndexedMap::new();
        assert!(frames.insert(TimeStamp::from_frame(7), "a"));
        assert!(!frames.insert(TimeStamp::from_time(1.0), "b"));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_neighbours() {
        let map = five_frames();
        let mid = TimeStamp::from_time(T0 + 2.0);
        assert_eq!(map.next_after(&mid).map(|(_, v)| *v), Some(3));
        assert_eq!(map.prev_before(&mid).map(|(_, v)| *v), Some(1));
        assert!(map.next_after(&TimeStamp::from_time(T0 + 4.0)).is_none());
        assert!(map.prev_before(&TimeStamp::from_time(T0)).is_none());
    }

    #[test]
    fn test_subset_is_inclusive() {
        let map = five_frames();
        let sub = map.subset(TimeStamp::from_time(T0 + 1.0), TimeStamp::from_time(T0 + 3.0));
        assert_eq!(sub.values().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_subset_with_reversed_bounds_is_empty() {
        let map = five_frames();
        let sub = map.subset(TimeStamp::from_time(T0 + 3.0), TimeStamp::from_time(T0 + 1.0));
        assert!(sub.is_empty());
    }

    #[test]
    fn test_frame_number_keys() {
        let map: TimeIndexedMap<&str> = [
            (TimeStamp::from_frame(10), "a"),
            (TimeStamp::from_frame(20), "b"),
        ]
        .into_iter()
        .collect();
        let hit = map.seek(&TimeStamp::from_frame(16), SeekMode::Nearest);
        assert_eq!(hit.map(|(_, v)| *v), Some("b"));
    }
}
