//! Build-time generator of bitonic sorting networks over SIMD registers.
//!
//! For every supported (ISA, element type) pair a C++ header and source file are emitted that
//! sort up to `max_bitonic_sort_vectors` vectors worth of elements. They serve as the small-array
//! base case of a vectorized quicksort.

pub mod backend;
pub mod cli;
pub mod error;
pub mod generator;
pub mod isa;
pub mod network;
pub mod patterns;

pub use backend::{make_backend, supported_types, SimdSortBackend};
pub use error::{Error, Result};
pub use generator::{generate, generate_all, GeneratedArtifact, GeneratorConfig};
pub use isa::{ElementType, VectorIsa};
pub use network::{InlineBudget, Order};
