//! The capability contract every instruction set backend implements, and the factory that picks
//! one for an (ISA, element type) pair.

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::isa::{ElementType, VectorIsa};
use crate::network::{self, Order};

// Implements the contract for a backend type in terms of its `VectorOps` vocabulary. The backend
// has to provide `ISA`, `VECTOR_SIZE`, `MAX_BITONIC_SORT_VECTORS` and `SUPPORTED_TYPES` constants
// and a `ty` field.
macro_rules! simd_sort_backend_impl {
    ($backend:ty) => {
        impl crate::backend::SimdSortBackend for $backend {
            fn supported_types() -> &'static [crate::isa::ElementType] {
                Self::SUPPORTED_TYPES
            }

            fn isa(&self) -> crate::isa::VectorIsa {
                Self::ISA
            }

            fn element_type(&self) -> crate::isa::ElementType {
                self.ty
            }

            fn vector_size(&self) -> usize {
                Self::VECTOR_SIZE
            }

            fn vector_type(&self) -> &'static str {
                crate::backend::VectorOps::vector_type(self)
            }

            fn max_bitonic_sort_vectors(&self) -> usize {
                Self::MAX_BITONIC_SORT_VECTORS
            }

            fn generate_prologue(&self, f: &mut dyn std::fmt::Write) -> crate::error::Result<()> {
                crate::backend::emit::prologue(f, self, Self::MAX_BITONIC_SORT_VECTORS)
            }

            fn generate_epilogue(&self, f: &mut dyn std::fmt::Write) -> crate::error::Result<()> {
                crate::backend::emit::epilogue(f)
            }

            fn generate_1v_basic_sorters(
                &self,
                f: &mut dyn std::fmt::Write,
                order: crate::network::Order,
            ) -> crate::error::Result<()> {
                crate::backend::emit::one_vector_sorter(f, self, order)
            }

            fn generate_1v_merge_sorters(
                &self,
                f: &mut dyn std::fmt::Write,
                order: crate::network::Order,
            ) -> crate::error::Result<()> {
                crate::backend::emit::one_vector_merger(f, self, order)
            }

            fn generate_compounded_sorter(
                &self,
                f: &mut dyn std::fmt::Write,
                width: usize,
                order: crate::network::Order,
                inline: bool,
            ) -> crate::error::Result<()> {
                let net = crate::network::CompoundedNetwork::sorter(width, order);
                crate::backend::emit::compounded(f, self, &net, inline)
            }

            fn generate_compounded_merger(
                &self,
                f: &mut dyn std::fmt::Write,
                width: usize,
                order: crate::network::Order,
                inline: bool,
            ) -> crate::error::Result<()> {
                let net = crate::network::CompoundedNetwork::merger(width, order);
                crate::backend::emit::compounded(f, self, &net, inline)
            }

            fn generate_entry_points(&self, f: &mut dyn std::fmt::Write) -> crate::error::Result<()> {
                crate::backend::emit::entry_points(f, self, Self::MAX_BITONIC_SORT_VECTORS)
            }

            fn generate_master_entry_point(
                &self,
                header: &mut dyn std::fmt::Write,
                source: &mut dyn std::fmt::Write,
            ) -> crate::error::Result<()> {
                crate::backend::emit::master_entry_point(
                    header,
                    source,
                    self,
                    Self::MAX_BITONIC_SORT_VECTORS,
                )
            }
        }
    };
}

pub mod avx2;
pub mod avx512;
mod emit;

pub use avx2::Avx2Backend;
pub use avx512::Avx512Backend;

/// Everything ISA and element type specific the generator needs.
///
/// The generator decides which networks exist and in what order they are emitted, a backend
/// decides what they look like.
pub trait SimdSortBackend {
    /// Element types this backend can generate networks for.
    fn supported_types() -> &'static [ElementType]
    where
        Self: Sized;

    fn isa(&self) -> VectorIsa;

    fn element_type(&self) -> ElementType;

    /// Vector register width in bytes.
    fn vector_size(&self) -> usize;

    /// C++ type of one vector register.
    fn vector_type(&self) -> &'static str;

    /// Widest network, in vectors.
    fn max_bitonic_sort_vectors(&self) -> usize;

    fn elements_per_vector(&self) -> usize {
        self.vector_size() / self.element_type().byte_size()
    }

    fn largest_merge_variant_needed(&self) -> usize {
        network::largest_merge_variant_needed(self.max_bitonic_sort_vectors())
    }

    fn generate_prologue(&self, f: &mut dyn Write) -> Result<()>;

    fn generate_epilogue(&self, f: &mut dyn Write) -> Result<()>;

    /// In-register sort of a single vector.
    fn generate_1v_basic_sorters(&self, f: &mut dyn Write, order: Order) -> Result<()>;

    /// In-register merge of a single bitonic vector.
    fn generate_1v_merge_sorters(&self, f: &mut dyn Write, order: Order) -> Result<()>;

    fn generate_compounded_sorter(
        &self,
        f: &mut dyn Write,
        width: usize,
        order: Order,
        inline: bool,
    ) -> Result<()>;

    fn generate_compounded_merger(
        &self,
        f: &mut dyn Write,
        width: usize,
        order: Order,
        inline: bool,
    ) -> Result<()>;

    /// One entry point per width, taking a pointer and the fill of the last vector.
    fn generate_entry_points(&self, f: &mut dyn Write) -> Result<()>;

    /// The single externally callable `sort(ptr, length)`, declared in the header and defined in
    /// the source file.
    fn generate_master_entry_point(
        &self,
        header: &mut dyn Write,
        source: &mut dyn Write,
    ) -> Result<()>;
}

/// The intrinsic vocabulary of one (ISA, element type) pair.
///
/// Operands are C++ expressions, usually plain variable names, and every method returns an
/// expression. Operands may be evaluated more than once.
pub(crate) trait VectorOps {
    fn isa(&self) -> VectorIsa;

    fn ty(&self) -> ElementType;

    fn vector_type(&self) -> &'static str;

    fn lanes(&self) -> usize;

    /// Compiler target name for the function attributes, e.g. `avx2`.
    fn target(&self) -> &'static str;

    fn min(&self, a: &str, b: &str) -> String;

    fn max(&self, a: &str, b: &str) -> String;

    /// Lane `i` of the result is lane `i ^ distance` of `v`.
    fn swap_lanes(&self, v: &str, distance: usize) -> String;

    /// Lane `i` of the result comes from `maxes` if bit `i` of `max_lanes` is set, from `mins`
    /// otherwise.
    fn blend(&self, mins: &str, maxes: &str, max_lanes: u64) -> String;

    fn load(&self, ptr: &str) -> String;

    fn store(&self, ptr: &str, v: &str) -> String;

    /// Declaration of a variable named `mask` selecting the first `remainder` lanes, all of them
    /// when `remainder` is zero.
    fn declare_remainder_mask(&self, remainder: &str) -> String;

    /// Loads the lanes selected by `mask`, the others are filled with `MAX`.
    fn load_masked(&self, ptr: &str, mask: &str) -> String;

    fn store_masked(&self, ptr: &str, mask: &str, v: &str) -> String;
}

/// Element types `isa` can generate networks for, or why it can't.
pub fn supported_types(isa: VectorIsa) -> Result<&'static [ElementType]> {
    match isa {
        VectorIsa::Avx2 => Ok(Avx2Backend::supported_types()),
        VectorIsa::Avx512 => Ok(Avx512Backend::supported_types()),
        // Reserved: report every type as unsupported until a backend exists.
        VectorIsa::Sve => Ok(&[]),
    }
}

pub fn is_supported(isa: VectorIsa, ty: ElementType) -> bool {
    supported_types(isa).map_or(false, |types| types.contains(&ty))
}

/// Instantiates the backend for `(isa, ty)`.
///
/// This is the only place an unsupported pair is rejected, generation itself has no failure path
/// for it.
pub fn make_backend(isa: VectorIsa, ty: ElementType) -> Result<Box<dyn SimdSortBackend>> {
    if !is_supported(isa, ty) {
        return Err(Error::UnsupportedConfiguration { isa, ty });
    }

    let backend: Box<dyn SimdSortBackend> = match isa {
        VectorIsa::Avx2 => Box::new(Avx2Backend::new(ty)),
        VectorIsa::Avx512 => Box::new(Avx512Backend::new(ty)),
        VectorIsa::Sve => return Err(Error::UnsupportedConfiguration { isa, ty }),
    };

    Ok(backend)
}
