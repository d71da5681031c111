//! Prefix sums.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The number of elements scanned sequentially by a single task.
const SECTION_SIZE: usize = 4 * 1024;

/// Exclusive prefix sum of `values`.
///
/// Returns the scanned values (`result[i]` is the sum of `values[..i]`) and the total sum.
///
/// The scan is computed in three phases: every section of [`SECTION_SIZE`] elements is scanned
/// independently, the section totals are scanned, and the scanned totals are added back to every
/// element of their section. The first and last phases run in parallel.
pub fn exclusive_scan(values: &[u32]) -> (Vec<u32>, u32) {
    let mut result = vec![0; values.len()];

    // Phase 1: local exclusive scans, one per section.
    let scan_section = |(out, input): (&mut [u32], &[u32])| {
        let mut acc = 0u32;
        for (o, v) in out.iter_mut().zip(input.iter()) {
            *o = acc;
            acc += *v;
        }
        acc
    };

    #[cfg(feature = "parallel")]
    let mut section_sums: Vec<u32> = result
        .par_chunks_mut(SECTION_SIZE)
        .zip(values.par_chunks(SECTION_SIZE))
        .map(scan_section)
        .collect();
    #[cfg(not(feature = "parallel"))]
    let mut section_sums: Vec<u32> = result
        .chunks_mut(SECTION_SIZE)
        .zip(values.chunks(SECTION_SIZE))
        .map(scan_section)
        .collect();

    // Phase 2: exclusive scan of the section totals.
    let mut total = 0u32;
    for sum in section_sums.iter_mut() {
        let section_total = *sum;
        *sum = total;
        total += section_total;
    }

    // Phase 3: offset every section by the sum of the sections before it.
    let add_offset = |(out, offset): (&mut [u32], &u32)| {
        if *offset != 0 {
            out.iter_mut().for_each(|o| *o += *offset);
        }
    };

    #[cfg(feature = "parallel")]
    result
        .par_chunks_mut(SECTION_SIZE)
        .zip(section_sums.par_iter())
        .for_each(add_offset);
    #[cfg(not(feature = "parallel"))]
    result
        .chunks_mut(SECTION_SIZE)
        .zip(section_sums.iter())
        .for_each(add_offset);

    (result, total)
}
