//! Renders network plans as C++ using the intrinsic vocabulary of a backend.

use std::fmt::Write;

use crate::backend::VectorOps;
use crate::error::Result;
use crate::generator::artifact_stem;
use crate::network::{
    lane_merge_stages, lane_sort_stages, CompoundedNetwork, LaneStage, NetworkKind, Order, Step,
};

pub(crate) fn network_name(kind: NetworkKind, width: usize, order: Order) -> String {
    match kind {
        NetworkKind::Sorter => format!("sort_{width:02}v_{order}"),
        NetworkKind::Merger => format!("sort_{width:02}v_merge_{order}"),
    }
}

pub(crate) fn entry_point_name(width: usize) -> String {
    format!("sort_{width:02}v_alt")
}

fn register(index: usize) -> String {
    format!("d{:02}", index + 1)
}

/// `TV& d01, TV& d02, ...` for `width` registers starting at zero based `first`.
fn param_def_list(first: usize, width: usize) -> String {
    (first..first + width)
        .map(|i| format!("TV& {}", register(i)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn param_list(first: usize, width: usize) -> String {
    (first..first + width)
        .map(register)
        .collect::<Vec<_>>()
        .join(", ")
}

fn inline_keyword(inline: bool) -> &'static str {
    if inline {
        "INLINE"
    } else {
        "NOINLINE"
    }
}

fn specialization(ops: &dyn VectorOps) -> String {
    format!("bitonic<{}, vector_machine::{}>", ops.ty(), ops.isa())
}

fn write_target_push(f: &mut dyn Write, ops: &dyn VectorOps) -> Result<()> {
    let target = ops.target();
    writeln!(f, "#ifdef __GNUC__")?;
    writeln!(f, "#ifdef __clang__")?;
    writeln!(
        f,
        "#pragma clang attribute push (__attribute__((target(\"{target}\"))), apply_to = any(function))"
    )?;
    writeln!(f, "#else")?;
    writeln!(f, "#pragma GCC push_options")?;
    writeln!(f, "#pragma GCC target(\"{target}\")")?;
    writeln!(f, "#endif")?;
    writeln!(f, "#endif")?;

    Ok(())
}

fn write_target_pop(f: &mut dyn Write) -> Result<()> {
    writeln!(f, "#ifdef __GNUC__")?;
    writeln!(f, "#ifdef __clang__")?;
    writeln!(f, "#pragma clang attribute pop")?;
    writeln!(f, "#else")?;
    writeln!(f, "#pragma GCC pop_options")?;
    writeln!(f, "#endif")?;
    writeln!(f, "#endif")?;

    Ok(())
}

fn include_guard(ops: &dyn VectorOps) -> String {
    format!("BITONIC_SORT_{}_{}_H", ops.isa(), ops.ty()).to_uppercase()
}

pub(crate) fn prologue(f: &mut dyn Write, ops: &dyn VectorOps, max_vectors: usize) -> Result<()> {
    let ty = ops.ty();
    let guard = include_guard(ops);

    writeln!(f, "// Auto-generated by bitonic_gen, do not edit.")?;
    writeln!(
        f,
        "// Bitonic sorting networks for {ty} on {}, {} elements per vector.",
        ops.isa(),
        ops.lanes()
    )?;
    writeln!(f)?;
    writeln!(f, "#ifndef {guard}")?;
    writeln!(f, "#define {guard}")?;
    writeln!(f)?;
    writeln!(f, "#include <immintrin.h>")?;
    writeln!(f, "#include <cstddef>")?;
    writeln!(f, "#include <cstdint>")?;
    writeln!(f, "#include <limits>")?;
    writeln!(f)?;
    writeln!(f, "#include \"bitonic_sort.h\"")?;
    writeln!(f)?;
    write_target_push(f, ops)?;
    writeln!(f)?;
    writeln!(f, "#if defined(_MSC_VER)")?;
    writeln!(f, "#define INLINE __forceinline")?;
    writeln!(f, "#define NOINLINE __declspec(noinline)")?;
    writeln!(f, "#else")?;
    writeln!(f, "#define INLINE inline __attribute__((always_inline))")?;
    writeln!(f, "#define NOINLINE __attribute__((noinline))")?;
    writeln!(f, "#endif")?;
    writeln!(f)?;
    writeln!(f, "namespace vxsort {{")?;
    writeln!(f, "namespace smallsort {{")?;
    writeln!(f)?;
    writeln!(f, "template<> struct {} {{", specialization(ops))?;
    writeln!(f, "    static const int N = {};", ops.lanes())?;
    writeln!(f, "    static const int MAX_BITONIC_SORT_VECTORS = {max_vectors};")?;
    writeln!(
        f,
        "    static const int SMALL_SORT_THRESHOLD_ELEMENTS = MAX_BITONIC_SORT_VECTORS * N;"
    )?;
    writeln!(
        f,
        "    static constexpr {ty} MAX = std::numeric_limits<{ty}>::max();"
    )?;
    writeln!(f, "public:")?;
    writeln!(f, "    typedef {} TV;", ops.vector_type())?;
    writeln!(f)?;

    Ok(())
}

pub(crate) fn epilogue(f: &mut dyn Write) -> Result<()> {
    writeln!(f, "}};")?;
    writeln!(f, "}}")?;
    writeln!(f, "}}")?;
    writeln!(f)?;
    writeln!(f, "#undef INLINE")?;
    writeln!(f, "#undef NOINLINE")?;
    writeln!(f)?;
    write_target_pop(f)?;
    writeln!(f)?;
    writeln!(f, "#endif")?;

    Ok(())
}

fn write_lane_stages(f: &mut dyn Write, ops: &dyn VectorOps, stages: &[LaneStage]) -> Result<()> {
    writeln!(f, "        TV lo, hi, s;")?;

    for stage in stages {
        writeln!(f)?;
        writeln!(f, "        s = {};", ops.swap_lanes("d01", stage.distance))?;
        writeln!(f, "        lo = {};", ops.min("s", "d01"))?;
        writeln!(f, "        hi = {};", ops.max("s", "d01"))?;
        writeln!(f, "        d01 = {};", ops.blend("lo", "hi", stage.max_lanes))?;
    }

    Ok(())
}

fn one_vector(
    f: &mut dyn Write,
    ops: &dyn VectorOps,
    kind: NetworkKind,
    order: Order,
) -> Result<()> {
    let stages = match kind {
        NetworkKind::Sorter => lane_sort_stages(ops.lanes(), order),
        NetworkKind::Merger => lane_merge_stages(ops.lanes(), order),
    };

    writeln!(
        f,
        "    static INLINE void {}({}) {{",
        network_name(kind, 1, order),
        param_def_list(0, 1)
    )?;
    write_lane_stages(f, ops, &stages)?;
    writeln!(f, "    }}")?;

    Ok(())
}

pub(crate) fn one_vector_sorter(f: &mut dyn Write, ops: &dyn VectorOps, order: Order) -> Result<()> {
    one_vector(f, ops, NetworkKind::Sorter, order)
}

pub(crate) fn one_vector_merger(f: &mut dyn Write, ops: &dyn VectorOps, order: Order) -> Result<()> {
    one_vector(f, ops, NetworkKind::Merger, order)
}

pub(crate) fn compounded(
    f: &mut dyn Write,
    ops: &dyn VectorOps,
    net: &CompoundedNetwork,
    inline: bool,
) -> Result<()> {
    writeln!(
        f,
        "    static {} void {}({}) {{",
        inline_keyword(inline),
        network_name(net.kind, net.width, net.order),
        param_def_list(0, net.width)
    )?;
    writeln!(f, "        TV tmp;")?;

    let mut after_exchange = false;
    let mut first = true;
    for step in &net.steps {
        match *step {
            Step::Call {
                kind,
                width,
                order,
                first: start,
            } => {
                if first || after_exchange {
                    writeln!(f)?;
                }
                writeln!(
                    f,
                    "        {}({});",
                    network_name(kind, width, order),
                    param_list(start, width)
                )?;
                after_exchange = false;
            }
            Step::Exchange { low, high } => {
                let (low, high) = (register(low), register(high));
                // `low` ends up with the min for ascending networks.
                let (to_high, to_low) = match net.order {
                    Order::Ascending => (ops.max(&low, &high), ops.min(&low, "tmp")),
                    Order::Descending => (ops.min(&low, &high), ops.max(&low, "tmp")),
                };
                writeln!(f)?;
                writeln!(f, "        tmp = {high};")?;
                writeln!(f, "        {high} = {to_high};")?;
                writeln!(f, "        {low} = {to_low};")?;
                after_exchange = true;
            }
        }
        first = false;
    }

    writeln!(f, "    }}")?;

    Ok(())
}

pub(crate) fn entry_points(f: &mut dyn Write, ops: &dyn VectorOps, max_vectors: usize) -> Result<()> {
    let ty = ops.ty();
    let lanes = ops.lanes();

    for width in 1..=max_vectors {
        let last = width - 1;

        writeln!(
            f,
            "    static NOINLINE void {}({ty} *ptr, int remainder) {{",
            entry_point_name(width)
        )?;
        writeln!(f, "        {};", ops.declare_remainder_mask("remainder"))?;
        writeln!(f)?;
        for i in 0..last {
            let ptr = format!("ptr + {}", i * lanes);
            writeln!(f, "        TV {} = {};", register(i), ops.load(&ptr))?;
        }
        let last_ptr = format!("ptr + {}", last * lanes);
        writeln!(
            f,
            "        TV {} = {};",
            register(last),
            ops.load_masked(&last_ptr, "mask")
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "        {}({});",
            network_name(NetworkKind::Sorter, width, Order::Ascending),
            param_list(0, width)
        )?;
        writeln!(f)?;
        for i in 0..last {
            let ptr = format!("ptr + {}", i * lanes);
            writeln!(f, "        {};", ops.store(&ptr, &register(i)))?;
        }
        writeln!(
            f,
            "        {};",
            ops.store_masked(&last_ptr, "mask", &register(last))
        )?;
        writeln!(f, "    }}")?;
        writeln!(f)?;
    }

    Ok(())
}

pub(crate) fn master_entry_point(
    header: &mut dyn Write,
    source: &mut dyn Write,
    ops: &dyn VectorOps,
    max_vectors: usize,
) -> Result<()> {
    let ty = ops.ty();

    writeln!(header, "    static NOINLINE void sort({ty} *ptr, size_t length);")?;

    writeln!(source, "// Auto-generated by bitonic_gen, do not edit.")?;
    writeln!(source)?;
    writeln!(
        source,
        "#include \"{}.h\"",
        artifact_stem(ops.isa(), ops.ty())
    )?;
    writeln!(source)?;
    write_target_push(source, ops)?;
    writeln!(source)?;
    writeln!(source, "using namespace vxsort;")?;
    writeln!(source)?;
    writeln!(
        source,
        "void vxsort::smallsort::{}::sort({ty} *ptr, size_t length) {{",
        specialization(ops)
    )?;
    writeln!(source, "    const auto fullvlength = length / N;")?;
    writeln!(
        source,
        "    const int remainder = (int) (length - fullvlength * N);"
    )?;
    writeln!(
        source,
        "    const auto v = fullvlength + ((remainder > 0) ? 1 : 0);"
    )?;
    writeln!(source, "    switch(v) {{")?;
    for width in 1..=max_vectors {
        writeln!(
            source,
            "        case {width}: {}(ptr, remainder); break;",
            entry_point_name(width)
        )?;
    }
    writeln!(source, "    }}")?;
    writeln!(source, "}}")?;
    writeln!(source)?;
    write_target_pop(source)?;

    Ok(())
}
