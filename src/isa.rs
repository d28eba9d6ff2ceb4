//! The closed sets of instruction sets and element types networks are generated for, with their
//! C++ spellings.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Instruction set a family of networks is generated for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VectorIsa {
    Avx2,
    Avx512,
    /// Reserved, there is no backend for it yet.
    Sve,
}

impl VectorIsa {
    pub const ALL: [VectorIsa; 3] = [VectorIsa::Avx2, VectorIsa::Avx512, VectorIsa::Sve];

    /// The ISAs selected by `all` on the command line, i.e. the ones with a backend.
    pub fn implemented() -> Vec<VectorIsa> {
        Self::ALL
            .into_iter()
            .filter(|isa| isa.has_backend())
            .collect()
    }

    pub fn has_backend(self) -> bool {
        match self {
            VectorIsa::Avx2 | VectorIsa::Avx512 => true,
            VectorIsa::Sve => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VectorIsa::Avx2 => "AVX2",
            VectorIsa::Avx512 => "AVX512",
            VectorIsa::Sve => "SVE",
        }
    }
}

impl fmt::Display for VectorIsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VectorIsa {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|isa| isa.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::Argument(format!(
                    "unknown vector ISA '{s}', expected one of: all, {}",
                    Self::ALL.map(VectorIsa::name).join(", ")
                ))
            })
    }
}

/// Native element type a network sorts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    I32,
    U32,
    F32,
    I64,
    U64,
    F64,
}

impl ElementType {
    pub const ALL: [ElementType; 6] = [
        ElementType::I32,
        ElementType::U32,
        ElementType::F32,
        ElementType::I64,
        ElementType::U64,
        ElementType::F64,
    ];

    pub fn byte_size(self) -> usize {
        match self {
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// Spelling of the type in generated C++, also used in artifact file names.
    pub fn c_name(self) -> &'static str {
        match self {
            ElementType::I32 => "int32_t",
            ElementType::U32 => "uint32_t",
            ElementType::F32 => "float",
            ElementType::I64 => "int64_t",
            ElementType::U64 => "uint64_t",
            ElementType::F64 => "double",
        }
    }

    /// Signed integer type of the same width, used for intrinsics that only take signed lanes.
    pub fn signed_c_name(self) -> &'static str {
        match self.byte_size() {
            4 => "int32_t",
            _ => "int64_t",
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, ElementType::U32 | ElementType::U64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the C spelling as well as the Rust one, `int32_t` and `i32` name the same type.
        let rust_name = |ty: ElementType| match ty {
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::F32 => "f32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
            ElementType::F64 => "f64",
        };

        Self::ALL
            .into_iter()
            .find(|ty| ty.c_name() == s || rust_name(*ty).eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::Argument(format!(
                    "unknown element type '{s}', expected one of: {}",
                    Self::ALL.map(ElementType::c_name).join(", ")
                ))
            })
    }
}
