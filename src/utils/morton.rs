//! Morton encoding of points normalized to the unit square/cube.

// The 3D bit spreading is from https://github.com/DGriffin91/obvhs/tree/main/src/ploc/morton.rs
// MIT/Apache 2 license.

use crate::math::Vector;

/// The number of bits of a Morton code dedicated to each axis.
#[cfg(feature = "dim3")]
pub const MORTON_BITS_PER_AXIS: u32 = 21;

/// The number of bits of a Morton code dedicated to each axis.
#[cfg(feature = "dim2")]
pub const MORTON_BITS_PER_AXIS: u32 = 32;

//---------------------------------------------------
// --- 21 bit resolution per channel morton curve ---
//---------------------------------------------------

#[cfg(feature = "dim3")]
#[inline]
fn split_by_3_u64(a: u32) -> u64 {
    let mut x = a as u64 & 0x1fffff; // we only look at the first 21 bits
    x = (x | x << 32) & 0x1f00000000ffff;
    x = (x | x << 16) & 0x1f0000ff0000ff;
    x = (x | x << 8) & 0x100f00f00f00f00f;
    x = (x | x << 4) & 0x10c30c30c30c30c3;
    x = (x | x << 2) & 0x1249249249249249;
    x
}

//---------------------------------------------------
// --- 32 bit resolution per channel morton curve ---
//---------------------------------------------------

#[cfg(feature = "dim2")]
#[inline]
fn split_by_2_u64(a: u32) -> u64 {
    let mut x = a as u64;
    x = (x | x << 16) & 0x0000_ffff_0000_ffff;
    x = (x | x << 8) & 0x00ff_00ff_00ff_00ff;
    x = (x | x << 4) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | x << 2) & 0x3333_3333_3333_3333;
    x = (x | x << 1) & 0x5555_5555_5555_5555;
    x
}

/// Converts a value in `[0, 1]` into a cell index of the Morton grid.
///
/// Out-of-range inputs saturate to the first or last cell. NaN maps to the first cell.
#[inline]
fn quantize_unorm(x: f64) -> u32 {
    let cells = (1u64 << MORTON_BITS_PER_AXIS) as f64;
    (x * cells).clamp(0.0, cells - 1.0) as u32
}

/// Encode integer grid coordinates into a u64 morton value.
///
/// Each input should be smaller than `1 << MORTON_BITS_PER_AXIS`.
#[cfg(feature = "dim3")]
#[inline]
pub fn morton_encode_u64(x: u32, y: u32, z: u32) -> u64 {
    split_by_3_u64(x) | split_by_3_u64(y) << 1 | split_by_3_u64(z) << 2
}

/// Encode integer grid coordinates into a u64 morton value.
#[cfg(feature = "dim2")]
#[inline]
pub fn morton_encode_u64(x: u32, y: u32) -> u64 {
    split_by_2_u64(x) | split_by_2_u64(y) << 1
}

/// Encode a position normalized to the unit square/cube into a u64 morton value.
///
/// Coordinates are expected in `0.0..=1.0` and are clamped to that range.
#[inline]
pub fn morton_encode_u64_unorm(p: Vector<f64>) -> u64 {
    #[cfg(feature = "dim2")]
    return morton_encode_u64(quantize_unorm(p.x), quantize_unorm(p.y));
    #[cfg(feature = "dim3")]
    return morton_encode_u64(
        quantize_unorm(p.x),
        quantize_unorm(p.y),
        quantize_unorm(p.z),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_cube_corners() {
        assert_eq!(morton_encode_u64_unorm(Vector::zeros()), 0);

        let used_bits = MORTON_BITS_PER_AXIS * crate::math::DIM as u32;
        let all_ones = u64::MAX >> (64 - used_bits);
        assert_eq!(morton_encode_u64_unorm(Vector::repeat(1.0)), all_ones);
        // Out-of-range coordinates saturate.
        assert_eq!(morton_encode_u64_unorm(Vector::repeat(2.0)), all_ones);
        assert_eq!(morton_encode_u64_unorm(Vector::repeat(-1.0)), 0);
    }

    #[test]
    fn first_split_is_on_the_last_axis() {
        let used_bits = MORTON_BITS_PER_AXIS * crate::math::DIM as u32;
        let mut p = Vector::zeros();
        p.x = 0.5;
        let x_half = morton_encode_u64_unorm(p);
        p.x = 0.0;
        p.y = 0.5;
        let y_half = morton_encode_u64_unorm(p);

        assert_eq!(y_half, 1u64 << (used_bits - crate::math::DIM as u32 + 1));
        assert_eq!(x_half, 1u64 << (used_bits - crate::math::DIM as u32));
        assert!(x_half < y_half);
    }

    #[cfg(feature = "dim3")]
    #[test]
    fn interleaves_three_axes() {
        assert_eq!(morton_encode_u64(0b1, 0, 0), 0b001);
        assert_eq!(morton_encode_u64(0, 0b1, 0), 0b010);
        assert_eq!(morton_encode_u64(0, 0, 0b1), 0b100);
        assert_eq!(morton_encode_u64(0b11, 0b01, 0b10), 0b101_011);
        assert_eq!(split_by_3_u64(0x1fffff), 0x1249249249249249);
    }

    #[cfg(feature = "dim2")]
    #[test]
    fn interleaves_two_axes() {
        assert_eq!(morton_encode_u64(0b1, 0), 0b01);
        assert_eq!(morton_encode_u64(0, 0b1), 0b10);
        assert_eq!(morton_encode_u64(0b11, 0b01), 0b0111);
        assert_eq!(split_by_2_u64(u32::MAX), 0x5555_5555_5555_5555);
    }
}
