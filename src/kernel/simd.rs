//! Lane engines: the short-vector operations the banded kernel is generic
//! over.
//!
//! One candidate sequence occupies one lane, so every operation here acts
//! lane-wise on unsigned saturating integers. Two element widths are
//! provided: 8-bit lanes (16 candidates per 128-bit vector) for small cost
//! bounds and 16-bit lanes (8 candidates) when more headroom is needed.
//!
//! On x86_64 the engines map straight onto SSE2, which is part of the
//! baseline instruction set there, so the wrappers stay safe to call. Other
//! architectures use the portable per-lane engines below.

/// Unsigned element of a lane. The all-ones value doubles as the kernel's
/// "unreachable cell" sentinel; saturating arithmetic keeps it absorbing.
pub trait LaneElem: Copy + Default + PartialOrd {
    const MAX: Self;
    fn from_u8(v: u8) -> Self;
    /// Clamp a cost to the representable range. Anything at or above the
    /// sentinel is dead anyway.
    fn sat_from_u64(v: u64) -> Self;
    fn to_u64(self) -> u64;
}

impl LaneElem for u8 {
    const MAX: Self = u8::MAX;

    #[inline(always)]
    fn from_u8(v: u8) -> Self {
        v
    }

    #[inline(always)]
    fn sat_from_u64(v: u64) -> Self {
        v.min(u64::from(u8::MAX)) as u8
    }

    #[inline(always)]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl LaneElem for u16 {
    const MAX: Self = u16::MAX;

    #[inline(always)]
    fn from_u8(v: u8) -> Self {
        u16::from(v)
    }

    #[inline(always)]
    fn sat_from_u64(v: u64) -> Self {
        v.min(u64::from(u16::MAX)) as u16
    }

    #[inline(always)]
    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

/// Vector operations over `LANES` independent lanes.
///
/// `cmpeq` produces all-ones/all-zeros lane masks; `select` consumes them.
pub trait LaneOps {
    const LANES: usize;
    type Elem: LaneElem;
    type Vec: Copy;

    fn splat(v: Self::Elem) -> Self::Vec;
    fn load(src: &[Self::Elem]) -> Self::Vec;
    fn store(v: Self::Vec, dst: &mut [Self::Elem]);
    /// Unsigned saturating addition.
    fn adds(a: Self::Vec, b: Self::Vec) -> Self::Vec;
    /// Unsigned minimum.
    fn min(a: Self::Vec, b: Self::Vec) -> Self::Vec;
    /// Lane mask: all-ones where equal.
    fn cmpeq(a: Self::Vec, b: Self::Vec) -> Self::Vec;
    /// Per-lane `mask ? t : f`; mask lanes must be all-ones or all-zeros.
    fn select(mask: Self::Vec, t: Self::Vec, f: Self::Vec) -> Self::Vec;
}

// ---------------------------------------------------------------------------
// SSE2 engines (x86_64 baseline)
// ---------------------------------------------------------------------------

#[cfg(target_arch = "x86_64")]
pub use sse2::{Sse2B16, Sse2B8};

#[cfg(target_arch = "x86_64")]
mod sse2 {
    use super::{LaneElem, LaneOps};
    use std::arch::x86_64::*;

    /// 16 lanes of u8 in one 128-bit vector.
    pub struct Sse2B8;

    impl LaneOps for Sse2B8 {
        const LANES: usize = 16;
        type Elem = u8;
        type Vec = __m128i;

        #[inline(always)]
        fn splat(v: u8) -> __m128i {
            unsafe { _mm_set1_epi8(v as i8) }
        }

        #[inline(always)]
        fn load(src: &[u8]) -> __m128i {
            assert!(src.len() >= Self::LANES);
            unsafe { _mm_loadu_si128(src.as_ptr().cast()) }
        }

        #[inline(always)]
        fn store(v: __m128i, dst: &mut [u8]) {
            assert!(dst.len() >= Self::LANES);
            unsafe { _mm_storeu_si128(dst.as_mut_ptr().cast(), v) }
        }

        #[inline(always)]
        fn adds(a: __m128i, b: __m128i) -> __m128i {
            unsafe { _mm_adds_epu8(a, b) }
        }

        #[inline(always)]
        fn min(a: __m128i, b: __m128i) -> __m128i {
            unsafe { _mm_min_epu8(a, b) }
        }

        #[inline(always)]
        fn cmpeq(a: __m128i, b: __m128i) -> __m128i {
            unsafe { _mm_cmpeq_epi8(a, b) }
        }

        #[inline(always)]
        fn select(mask: __m128i, t: __m128i, f: __m128i) -> __m128i {
            unsafe { _mm_or_si128(_mm_and_si128(mask, t), _mm_andnot_si128(mask, f)) }
        }
    }

    /// 8 lanes of u16 in one 128-bit vector.
    pub struct Sse2B16;

    impl LaneOps for Sse2B16 {
        const LANES: usize = 8;
        type Elem = u16;
        type Vec = __m128i;

        #[inline(always)]
        fn splat(v: u16) -> __m128i {
            unsafe { _mm_set1_epi16(v as i16) }
        }

        #[inline(always)]
        fn load(src: &[u16]) -> __m128i {
            assert!(src.len() >= Self::LANES);
            unsafe { _mm_loadu_si128(src.as_ptr().cast()) }
        }

        #[inline(always)]
        fn store(v: __m128i, dst: &mut [u16]) {
            assert!(dst.len() >= Self::LANES);
            unsafe { _mm_storeu_si128(dst.as_mut_ptr().cast(), v) }
        }

        #[inline(always)]
        fn adds(a: __m128i, b: __m128i) -> __m128i {
            unsafe { _mm_adds_epu16(a, b) }
        }

        #[inline(always)]
        fn min(a: __m128i, b: __m128i) -> __m128i {
            // SSE2 has no _mm_min_epu16; a - max(a - b, 0) selects the
            // smaller unsigned value without a compare.
            unsafe { _mm_sub_epi16(a, _mm_subs_epu16(a, b)) }
        }

        #[inline(always)]
        fn cmpeq(a: __m128i, b: __m128i) -> __m128i {
            unsafe { _mm_cmpeq_epi16(a, b) }
        }

        #[inline(always)]
        fn select(mask: __m128i, t: __m128i, f: __m128i) -> __m128i {
            unsafe { _mm_or_si128(_mm_and_si128(mask, t), _mm_andnot_si128(mask, f)) }
        }
    }
}

// ---------------------------------------------------------------------------
// Portable engines
// ---------------------------------------------------------------------------

/// 16 lanes of u8, plain arrays. Default on non-x86_64 targets and the
/// reference the SSE2 engines are checked against.
pub struct PortableB8;

impl LaneOps for PortableB8 {
    const LANES: usize = 16;
    type Elem = u8;
    type Vec = [u8; 16];

    #[inline(always)]
    fn splat(v: u8) -> [u8; 16] {
        [v; 16]
    }

    #[inline(always)]
    fn load(src: &[u8]) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&src[..16]);
        out
    }

    #[inline(always)]
    fn store(v: [u8; 16], dst: &mut [u8]) {
        dst[..16].copy_from_slice(&v);
    }

    #[inline(always)]
    fn adds(a: [u8; 16], b: [u8; 16]) -> [u8; 16] {
        std::array::from_fn(|i| a[i].saturating_add(b[i]))
    }

    #[inline(always)]
    fn min(a: [u8; 16], b: [u8; 16]) -> [u8; 16] {
        std::array::from_fn(|i| a[i].min(b[i]))
    }

    #[inline(always)]
    fn cmpeq(a: [u8; 16], b: [u8; 16]) -> [u8; 16] {
        std::array::from_fn(|i| if a[i] == b[i] { u8::MAX } else { 0 })
    }

    #[inline(always)]
    fn select(mask: [u8; 16], t: [u8; 16], f: [u8; 16]) -> [u8; 16] {
        std::array::from_fn(|i| (mask[i] & t[i]) | (!mask[i] & f[i]))
    }
}

/// 8 lanes of u16, plain arrays.
pub struct PortableB16;

impl LaneOps for PortableB16 {
    const LANES: usize = 8;
    type Elem = u16;
    type Vec = [u16; 8];

    #[inline(always)]
    fn splat(v: u16) -> [u16; 8] {
        [v; 8]
    }

    #[inline(always)]
    fn load(src: &[u16]) -> [u16; 8] {
        let mut out = [0u16; 8];
        out.copy_from_slice(&src[..8]);
        out
    }

    #[inline(always)]
    fn store(v: [u16; 8], dst: &mut [u16]) {
        dst[..8].copy_from_slice(&v);
    }

    #[inline(always)]
    fn adds(a: [u16; 8], b: [u16; 8]) -> [u16; 8] {
        std::array::from_fn(|i| a[i].saturating_add(b[i]))
    }

    #[inline(always)]
    fn min(a: [u16; 8], b: [u16; 8]) -> [u16; 8] {
        std::array::from_fn(|i| a[i].min(b[i]))
    }

    #[inline(always)]
    fn cmpeq(a: [u16; 8], b: [u16; 8]) -> [u16; 8] {
        std::array::from_fn(|i| if a[i] == b[i] { u16::MAX } else { 0 })
    }

    #[inline(always)]
    fn select(mask: [u16; 8], t: [u16; 8], f: [u16; 8]) -> [u16; 8] {
        std::array::from_fn(|i| (mask[i] & t[i]) | (!mask[i] & f[i]))
    }
}
