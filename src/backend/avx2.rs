//! AVX2 emitter, 256-bit registers.
//!
//! AVX2 has no 64-bit integer min/max, those are built from a 64-bit compare and a byte blend.
//! Unsigned 64-bit compares flip the sign bit of both operands first.

use crate::backend::VectorOps;
use crate::isa::{ElementType, VectorIsa};

pub struct Avx2Backend {
    ty: ElementType,
}

impl Avx2Backend {
    pub const ISA: VectorIsa = VectorIsa::Avx2;
    pub const VECTOR_SIZE: usize = 32;
    pub const MAX_BITONIC_SORT_VECTORS: usize = 16;
    pub const SUPPORTED_TYPES: &'static [ElementType] = &ElementType::ALL;

    pub fn new(ty: ElementType) -> Self {
        Self { ty }
    }

    fn is_wide(&self) -> bool {
        self.ty.byte_size() == 8
    }

    fn cmpgt_epi64(&self, a: &str, b: &str) -> String {
        if self.ty.is_unsigned() {
            let sign = "_mm256_set1_epi64x(INT64_MIN)";
            format!(
                "_mm256_cmpgt_epi64(_mm256_xor_si256({a}, {sign}), _mm256_xor_si256({b}, {sign}))"
            )
        } else {
            format!("_mm256_cmpgt_epi64({a}, {b})")
        }
    }
}

simd_sort_backend_impl!(Avx2Backend);

/// Immediate for a four element permute where element `i` takes element `i ^ distance`.
fn xor_permute_imm4(distance: usize) -> usize {
    (0..4).map(|i| (i ^ distance) << (2 * i)).sum()
}

/// Spreads a per 64-bit lane blend mask over the two 32-bit halves of each lane.
fn widen_mask(mask: u64) -> u64 {
    (0..4u32)
        .filter(|&lane| mask & (1u64 << lane) != 0)
        .map(|lane| 0b11u64 << (2 * lane))
        .sum()
}

impl VectorOps for Avx2Backend {
    fn isa(&self) -> VectorIsa {
        Self::ISA
    }

    fn ty(&self) -> ElementType {
        self.ty
    }

    fn vector_type(&self) -> &'static str {
        match self.ty {
            ElementType::F32 => "__m256",
            ElementType::F64 => "__m256d",
            _ => "__m256i",
        }
    }

    fn lanes(&self) -> usize {
        Self::VECTOR_SIZE / self.ty.byte_size()
    }

    fn target(&self) -> &'static str {
        "avx2"
    }

    fn min(&self, a: &str, b: &str) -> String {
        match self.ty {
            ElementType::I32 => format!("_mm256_min_epi32({a}, {b})"),
            ElementType::U32 => format!("_mm256_min_epu32({a}, {b})"),
            ElementType::F32 => format!("_mm256_min_ps({a}, {b})"),
            ElementType::F64 => format!("_mm256_min_pd({a}, {b})"),
            ElementType::I64 | ElementType::U64 => {
                format!("_mm256_blendv_epi8({a}, {b}, {})", self.cmpgt_epi64(a, b))
            }
        }
    }

    fn max(&self, a: &str, b: &str) -> String {
        match self.ty {
            ElementType::I32 => format!("_mm256_max_epi32({a}, {b})"),
            ElementType::U32 => format!("_mm256_max_epu32({a}, {b})"),
            ElementType::F32 => format!("_mm256_max_ps({a}, {b})"),
            ElementType::F64 => format!("_mm256_max_pd({a}, {b})"),
            ElementType::I64 | ElementType::U64 => {
                format!("_mm256_blendv_epi8({b}, {a}, {})", self.cmpgt_epi64(a, b))
            }
        }
    }

    fn swap_lanes(&self, v: &str, distance: usize) -> String {
        if self.is_wide() {
            let imm = xor_permute_imm4(distance);
            return match self.ty {
                ElementType::F64 => format!("_mm256_permute4x64_pd({v}, 0x{imm:02X})"),
                _ => format!("_mm256_permute4x64_epi64({v}, 0x{imm:02X})"),
            };
        }

        // 32-bit lanes: in-lane shuffles for neighbours, a 128-bit swap for the far half.
        match (distance, self.ty) {
            (4, ElementType::F32) => format!("_mm256_permute2f128_ps({v}, {v}, 0x01)"),
            (4, _) => format!("_mm256_permute2x128_si256({v}, {v}, 0x01)"),
            (_, ElementType::F32) => {
                let imm = xor_permute_imm4(distance);
                format!("_mm256_shuffle_ps({v}, {v}, 0x{imm:02X})")
            }
            _ => {
                let imm = xor_permute_imm4(distance);
                format!("_mm256_shuffle_epi32({v}, 0x{imm:02X})")
            }
        }
    }

    fn blend(&self, mins: &str, maxes: &str, max_lanes: u64) -> String {
        match self.ty {
            ElementType::F32 => format!("_mm256_blend_ps({mins}, {maxes}, 0x{max_lanes:02X})"),
            ElementType::F64 => format!("_mm256_blend_pd({mins}, {maxes}, 0x{max_lanes:X})"),
            ElementType::I64 | ElementType::U64 => format!(
                "_mm256_blend_epi32({mins}, {maxes}, 0x{:02X})",
                widen_mask(max_lanes)
            ),
            ElementType::I32 | ElementType::U32 => {
                format!("_mm256_blend_epi32({mins}, {maxes}, 0x{max_lanes:02X})")
            }
        }
    }

    fn load(&self, ptr: &str) -> String {
        match self.ty {
            ElementType::F32 => format!("_mm256_loadu_ps({ptr})"),
            ElementType::F64 => format!("_mm256_loadu_pd({ptr})"),
            _ => format!("_mm256_loadu_si256((const __m256i *) ({ptr}))"),
        }
    }

    fn store(&self, ptr: &str, v: &str) -> String {
        match self.ty {
            ElementType::F32 => format!("_mm256_storeu_ps({ptr}, {v})"),
            ElementType::F64 => format!("_mm256_storeu_pd({ptr}, {v})"),
            _ => format!("_mm256_storeu_si256((__m256i *) ({ptr}), {v})"),
        }
    }

    fn declare_remainder_mask(&self, remainder: &str) -> String {
        let count = format!("{remainder} == 0 ? N : {remainder}");
        if self.is_wide() {
            format!(
                "const __m256i mask = _mm256_cmpgt_epi64(_mm256_set1_epi64x({count}), _mm256_setr_epi64x(0, 1, 2, 3))"
            )
        } else {
            format!(
                "const __m256i mask = _mm256_cmpgt_epi32(_mm256_set1_epi32({count}), _mm256_setr_epi32(0, 1, 2, 3, 4, 5, 6, 7))"
            )
        }
    }

    fn load_masked(&self, ptr: &str, mask: &str) -> String {
        let signed = self.ty.signed_c_name();
        match self.ty {
            ElementType::F32 => format!(
                "_mm256_blendv_ps(_mm256_set1_ps(MAX), _mm256_maskload_ps({ptr}, {mask}), _mm256_castsi256_ps({mask}))"
            ),
            ElementType::F64 => format!(
                "_mm256_blendv_pd(_mm256_set1_pd(MAX), _mm256_maskload_pd({ptr}, {mask}), _mm256_castsi256_pd({mask}))"
            ),
            ElementType::I64 | ElementType::U64 => format!(
                "_mm256_blendv_epi8(_mm256_set1_epi64x(({signed}) MAX), _mm256_maskload_epi64((const long long *) ({ptr}), {mask}), {mask})"
            ),
            ElementType::I32 | ElementType::U32 => format!(
                "_mm256_blendv_epi8(_mm256_set1_epi32(({signed}) MAX), _mm256_maskload_epi32((const int *) ({ptr}), {mask}), {mask})"
            ),
        }
    }

    fn store_masked(&self, ptr: &str, mask: &str, v: &str) -> String {
        match self.ty {
            ElementType::F32 => format!("_mm256_maskstore_ps({ptr}, {mask}, {v})"),
            ElementType::F64 => format!("_mm256_maskstore_pd({ptr}, {mask}, {v})"),
            ElementType::I64 | ElementType::U64 => {
                format!("_mm256_maskstore_epi64((long long *) ({ptr}), {mask}, {v})")
            }
            ElementType::I32 | ElementType::U32 => {
                format!("_mm256_maskstore_epi32((int *) ({ptr}), {mask}, {v})")
            }
        }
    }
}
