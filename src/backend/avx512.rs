//! AVX512 emitter, 512-bit registers with mask registers for blends and partial loads.

use crate::backend::VectorOps;
use crate::isa::{ElementType, VectorIsa};

pub struct Avx512Backend {
    ty: ElementType,
}

impl Avx512Backend {
    pub const ISA: VectorIsa = VectorIsa::Avx512;
    pub const VECTOR_SIZE: usize = 64;
    pub const MAX_BITONIC_SORT_VECTORS: usize = 16;
    pub const SUPPORTED_TYPES: &'static [ElementType] = &ElementType::ALL;

    pub fn new(ty: ElementType) -> Self {
        Self { ty }
    }

    /// Suffix of the arithmetic intrinsics, signedness matters here.
    fn suffix(&self) -> &'static str {
        match self.ty {
            ElementType::I32 => "epi32",
            ElementType::U32 => "epu32",
            ElementType::F32 => "ps",
            ElementType::I64 => "epi64",
            ElementType::U64 => "epu64",
            ElementType::F64 => "pd",
        }
    }

    /// Suffix of the data movement intrinsics, only the lane width matters.
    fn move_suffix(&self) -> &'static str {
        match self.ty {
            ElementType::I32 | ElementType::U32 => "epi32",
            ElementType::I64 | ElementType::U64 => "epi64",
            ElementType::F32 => "ps",
            ElementType::F64 => "pd",
        }
    }

    fn mask_type(&self) -> &'static str {
        match self.ty.byte_size() {
            4 => "__mmask16",
            _ => "__mmask8",
        }
    }

    fn full_mask(&self) -> &'static str {
        match self.ty.byte_size() {
            4 => "0xFFFF",
            _ => "0xFF",
        }
    }

    fn broadcast_max(&self) -> String {
        match self.ty {
            ElementType::F32 => "_mm512_set1_ps(MAX)".to_string(),
            ElementType::F64 => "_mm512_set1_pd(MAX)".to_string(),
            ElementType::I32 | ElementType::U32 | ElementType::I64 | ElementType::U64 => format!(
                "_mm512_set1_{}(({}) MAX)",
                self.move_suffix(),
                self.ty.signed_c_name()
            ),
        }
    }
}

simd_sort_backend_impl!(Avx512Backend);

impl VectorOps for Avx512Backend {
    fn isa(&self) -> VectorIsa {
        Self::ISA
    }

    fn ty(&self) -> ElementType {
        self.ty
    }

    fn vector_type(&self) -> &'static str {
        match self.ty {
            ElementType::F32 => "__m512",
            ElementType::F64 => "__m512d",
            _ => "__m512i",
        }
    }

    fn lanes(&self) -> usize {
        Self::VECTOR_SIZE / self.ty.byte_size()
    }

    fn target(&self) -> &'static str {
        "avx512f"
    }

    fn min(&self, a: &str, b: &str) -> String {
        format!("_mm512_min_{}({a}, {b})", self.suffix())
    }

    fn max(&self, a: &str, b: &str) -> String {
        format!("_mm512_max_{}({a}, {b})", self.suffix())
    }

    fn swap_lanes(&self, v: &str, distance: usize) -> String {
        let lanes = VectorOps::lanes(self);
        let indices = (0..lanes)
            .map(|lane| (lane ^ distance).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let index_width = self.ty.byte_size() * 8;

        format!(
            "_mm512_permutexvar_{}(_mm512_setr_epi{index_width}({indices}), {v})",
            self.move_suffix()
        )
    }

    fn blend(&self, mins: &str, maxes: &str, max_lanes: u64) -> String {
        format!(
            "_mm512_mask_blend_{}(({}) 0x{max_lanes:04X}, {mins}, {maxes})",
            self.move_suffix(),
            self.mask_type()
        )
    }

    fn load(&self, ptr: &str) -> String {
        match self.ty {
            ElementType::F32 => format!("_mm512_loadu_ps({ptr})"),
            ElementType::F64 => format!("_mm512_loadu_pd({ptr})"),
            _ => format!("_mm512_loadu_si512((const void *) ({ptr}))"),
        }
    }

    fn store(&self, ptr: &str, v: &str) -> String {
        match self.ty {
            ElementType::F32 => format!("_mm512_storeu_ps({ptr}, {v})"),
            ElementType::F64 => format!("_mm512_storeu_pd({ptr}, {v})"),
            _ => format!("_mm512_storeu_si512((void *) ({ptr}), {v})"),
        }
    }

    fn declare_remainder_mask(&self, remainder: &str) -> String {
        // A zero remainder shifts by zero and keeps every lane.
        format!(
            "const {mask_type} mask = ({mask_type}) ({full} >> ((N - {remainder}) & (N - 1)))",
            mask_type = self.mask_type(),
            full = self.full_mask()
        )
    }

    fn load_masked(&self, ptr: &str, mask: &str) -> String {
        format!(
            "_mm512_mask_loadu_{}({}, {mask}, {ptr})",
            self.move_suffix(),
            self.broadcast_max()
        )
    }

    fn store_masked(&self, ptr: &str, mask: &str, v: &str) -> String {
        format!("_mm512_mask_storeu_{}({ptr}, {mask}, {v})", self.move_suffix())
    }
}
