//! Stream compaction with an old-to-new index remap.

use super::parallel;
use super::scan::exclusive_scan;

/// The plan for removing the invalid elements of an array in place.
///
/// Given validity flags for `n` elements, `m` of them valid, the compacted array occupies the
/// index range `[0, m)`:
/// - valid elements already below `m` keep their index,
/// - the invalid slots below `m` form the *free slots* list,
/// - the valid elements at or above `m` form the *movers* list.
///
/// Both lists have the same length and the `i`-th mover is relocated to the `i`-th free slot.
/// Movers are only ever read from `[m, n)` while only `[0, m)` is written, so relocation is a
/// single parallel pass that never overwrites data not read yet.
///
/// This is independent from what the elements are. Elements that store indices of other
/// elements can be patched with [`StreamCompaction::new_index`] during the relocation.
#[derive(Clone, Debug, Default)]
pub struct StreamCompaction {
    len: usize,
    rank: Vec<u32>,
    remap: Vec<u32>,
    free_slots: Vec<u32>,
    movers: Vec<u32>,
}

impl StreamCompaction {
    /// Marker of removed elements in [`Self::remap`].
    pub const REMOVED: u32 = u32::MAX;

    /// Computes the compaction plan for the given validity flags.
    ///
    /// Panics if there are `u32::MAX` elements or more.
    pub fn new(valid: &[bool]) -> Self {
        assert!(valid.len() < u32::MAX as usize);

        let flags = parallel::map(valid.len(), |i| valid[i] as u32);
        let (rank, total) = exclusive_scan(&flags);
        let len = total as usize;

        let free_slots = parallel::filter_indices(len, |i| !valid[i]);
        let movers = parallel::filter_indices(valid.len(), |i| i >= len && valid[i]);
        debug_assert_eq!(free_slots.len(), movers.len());

        let valid_in_place = (len - free_slots.len()) as u32;
        let remap = parallel::map(valid.len(), |i| {
            if !valid[i] {
                Self::REMOVED
            } else if i < len {
                i as u32
            } else {
                // `rank[i] - valid_in_place` is the number of movers before `i`.
                free_slots[(rank[i] - valid_in_place) as usize]
            }
        });

        Self {
            len,
            rank,
            remap,
            free_slots,
            movers,
        }
    }

    /// The number of elements remaining after compaction.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Does the compacted array contain no element?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of elements before compaction.
    #[inline]
    pub fn original_len(&self) -> usize {
        self.remap.len()
    }

    /// The number of elements removed by the compaction.
    #[inline]
    pub fn removed_count(&self) -> usize {
        self.remap.len() - self.len
    }

    /// The old-to-new index table. Removed elements map to [`Self::REMOVED`].
    #[inline]
    pub fn remap(&self) -> &[u32] {
        &self.remap
    }

    /// The slots below [`Self::len`] that receive a relocated element, in increasing order.
    #[inline]
    pub fn free_slots(&self) -> &[u32] {
        &self.free_slots
    }

    /// The new index of the element that had the index `old` before compaction.
    ///
    /// Returns `None` if that element is removed (or out of bounds).
    #[inline]
    pub fn new_index(&self, old: u32) -> Option<u32> {
        self.remap
            .get(old as usize)
            .copied()
            .filter(|id| *id != Self::REMOVED)
    }

    /// Moves the valid elements of `data` to their compacted location, then calls `relink` on
    /// each element of the compacted range `data[..self.len()]`.
    ///
    /// Elements beyond `self.len()` are left untouched. They still hold stale data and must not
    /// be read anymore; truncating `data` afterward is up to the caller.
    ///
    /// Panics if `data` doesn’t have the length of the validity flags given to
    /// [`StreamCompaction::new`].
    pub fn relocate<T: Copy + Send + Sync>(
        &self,
        data: &mut [T],
        relink: impl Fn(&mut T) + Sync + Send,
    ) {
        assert_eq!(data.len(), self.remap.len());

        let (head, tail) = data.split_at_mut(self.len);
        let tail: &[T] = tail;

        parallel::for_each_mut(head, |i, elt| {
            if self.remap[i] == Self::REMOVED {
                // `i - rank[i]` is the number of free slots before `i`.
                let mover = self.movers[i - self.rank[i] as usize] as usize;
                *elt = tail[mover - self.len];
            }

            relink(elt);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::StreamCompaction;

    #[test]
    fn remap_fills_free_slots_with_tail_elements() {
        //           0     1      2     3      4     5     6      7
        let valid = [true, false, true, false, true, true, false, true];
        let compaction = StreamCompaction::new(&valid);

        assert_eq!(compaction.len(), 5);
        assert_eq!(compaction.removed_count(), 3);
        assert_eq!(compaction.free_slots(), &[1, 3]);
        let r = StreamCompaction::REMOVED;
        assert_eq!(compaction.remap(), &[0, r, 2, r, 4, 1, r, 3]);
        assert_eq!(compaction.new_index(7), Some(3));
        assert_eq!(compaction.new_index(6), None);
        assert_eq!(compaction.new_index(42), None);
    }

    #[test]
    fn relocation_keeps_every_valid_element_once() {
        let valid: Vec<bool> = (0..1000).map(|i| i % 3 != 1 && i % 7 != 0).collect();
        let compaction = StreamCompaction::new(&valid);

        // Each element stores its own index, plus the index of its successor to be relinked.
        let mut data: Vec<(u32, u32)> = (0..1000u32).map(|i| (i, (i + 1) % 1000)).collect();
        compaction.relocate(&mut data, |elt| {
            elt.1 = compaction
                .new_index(elt.1)
                .unwrap_or(StreamCompaction::REMOVED)
        });

        let kept = valid.iter().filter(|v| **v).count();
        assert_eq!(compaction.len(), kept);

        let mut seen = vec![false; 1000];
        for (new_id, (old_id, successor)) in data[..kept].iter().enumerate() {
            assert!(valid[*old_id as usize]);
            assert!(!seen[*old_id as usize]);
            seen[*old_id as usize] = true;
            assert_eq!(compaction.remap()[*old_id as usize], new_id as u32);
            assert_eq!(
                *successor,
                compaction
                    .new_index((old_id + 1) % 1000)
                    .unwrap_or(StreamCompaction::REMOVED)
            );
        }

        // The tail is untouched.
        for (i, elt) in data.iter().enumerate().skip(kept) {
            assert_eq!(elt.0, i as u32);
        }
    }

    #[test]
    fn all_or_nothing() {
        let all = StreamCompaction::new(&[true; 10]);
        assert_eq!(all.len(), 10);
        assert!(all.free_slots().is_empty());
        assert_eq!(all.remap(), &(0..10).collect::<Vec<u32>>()[..]);

        let nothing = StreamCompaction::new(&[false; 10]);
        assert!(nothing.is_empty());
        assert_eq!(nothing.original_len(), 10);
        assert_eq!(nothing.new_index(3), None);
    }
}
