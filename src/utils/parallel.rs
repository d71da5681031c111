//! "Apply this per-element function over N elements" building blocks.
//!
//! With the `parallel` feature, every function here runs on the `rayon` thread pool. Without it,
//! the same closures run sequentially, in index order. Either way, returning from any of these
//! functions is a full barrier: every write performed by the per-element closures is visible to
//! the caller.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Calls `f(i)` for every `i` in `0..len`.
#[inline]
pub fn for_each_index(len: usize, f: impl Fn(usize) + Sync + Send) {
    #[cfg(feature = "parallel")]
    (0..len).into_par_iter().for_each(f);
    #[cfg(not(feature = "parallel"))]
    (0..len).for_each(f);
}

/// Calls `f(i, &mut data[i])` for every element of `data`.
#[inline]
pub fn for_each_mut<T: Send>(data: &mut [T], f: impl Fn(usize, &mut T) + Sync + Send) {
    #[cfg(feature = "parallel")]
    data.par_iter_mut()
        .enumerate()
        .for_each(|(i, elt)| f(i, elt));
    #[cfg(not(feature = "parallel"))]
    data.iter_mut().enumerate().for_each(|(i, elt)| f(i, elt));
}

/// Collects `f(i)` for every `i` in `0..len`, in index order.
#[inline]
pub fn map<T: Send>(len: usize, f: impl Fn(usize) -> T + Sync + Send) -> Vec<T> {
    #[cfg(feature = "parallel")]
    return (0..len).into_par_iter().map(f).collect();
    #[cfg(not(feature = "parallel"))]
    return (0..len).map(f).collect();
}

/// Reduces `f(0), f(1), …, f(len - 1)` with the associative operator `op`.
///
/// `identity` must be a neutral element of `op`. It is returned if `len == 0`.
#[inline]
pub fn reduce<T: Copy + Send + Sync>(
    len: usize,
    identity: T,
    f: impl Fn(usize) -> T + Sync + Send,
    op: impl Fn(T, T) -> T + Sync + Send,
) -> T {
    #[cfg(feature = "parallel")]
    return (0..len).into_par_iter().map(f).reduce(|| identity, op);
    #[cfg(not(feature = "parallel"))]
    return (0..len).map(f).fold(identity, op);
}

/// The indices `i` in `0..len` such that `pred(i)` holds, in increasing order.
#[inline]
pub fn filter_indices(len: usize, pred: impl Fn(usize) -> bool + Sync + Send) -> Vec<u32> {
    #[cfg(feature = "parallel")]
    return (0..len)
        .into_par_iter()
        .filter(|i| pred(*i))
        .map(|i| i as u32)
        .collect();
    #[cfg(not(feature = "parallel"))]
    return (0..len).filter(|i| pred(*i)).map(|i| i as u32).collect();
}

/// The smallest index `i` in `0..len` such that `pred(i)` holds.
#[inline]
pub fn find_first(len: usize, pred: impl Fn(usize) -> bool + Sync + Send) -> Option<usize> {
    #[cfg(feature = "parallel")]
    return (0..len).into_par_iter().find_first(|i| pred(*i));
    #[cfg(not(feature = "parallel"))]
    return (0..len).find(|i| pred(*i));
}

/// Sorts `data` by the given key.
///
/// The sort is stable: elements with equal keys keep their relative order.
#[inline]
pub fn sort_by_key<T: Send, K: Ord + Send>(data: &mut [T], key: impl Fn(&T) -> K + Sync) {
    #[cfg(feature = "parallel")]
    data.par_sort_by_key(key);
    #[cfg(not(feature = "parallel"))]
    data.sort_by_key(key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_index_is_visited_once() {
        let sum = AtomicUsize::new(0);
        for_each_index(1000, |i| {
            let _ = sum.fetch_add(i, Ordering::Relaxed);
        });
        assert_eq!(sum.into_inner(), 999 * 1000 / 2);

        let mut data = vec![0usize; 1000];
        for_each_mut(&mut data, |i, elt| *elt = i * 2);
        assert!(data.iter().enumerate().all(|(i, elt)| *elt == i * 2));
    }

    #[test]
    fn ordered_outputs() {
        assert_eq!(map(5, |i| i * i), vec![0, 1, 4, 9, 16]);
        assert_eq!(filter_indices(10, |i| i % 3 == 0), vec![0, 3, 6, 9]);
        assert_eq!(find_first(100, |i| i > 41 && i % 2 == 0), Some(42));
        assert_eq!(find_first(100, |_| false), None);
        assert_eq!(reduce(101, 0, |i| i, |a, b| a + b), 5050);
        assert_eq!(reduce(0, 7, |i| i, |a, b| a.max(b)), 7);
    }

    #[test]
    fn sort_is_stable() {
        let mut data: Vec<(u32, usize)> = (0..1000).map(|i| ((i % 7) as u32, i)).collect();
        sort_by_key(&mut data, |elt| elt.0);
        for pair in data.windows(2) {
            assert!(pair[0].0 < pair[1].0 || (pair[0].0 == pair[1].0 && pair[0].1 < pair[1].1));
        }
    }
}
