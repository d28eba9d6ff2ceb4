use std::cell::RefCell;
use std::collections::HashSet;
use std::env;
use std::fmt::Write;
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

use vxsort_codegen::network::{
    lane_merge_stages, lane_sort_stages, largest_merge_variant_needed, CompoundedNetwork,
    Dispatch, LaneStage, NetworkKind, Step,
};
use vxsort_codegen::{
    generate, generate_all, make_backend, patterns, supported_types, ElementType, Error,
    GeneratedArtifact, GeneratorConfig, InlineBudget, Order, Result, SimdSortBackend, VectorIsa,
};

fn get_or_init_random_seed() -> u64 {
    static SEED_WRITTEN: Mutex<bool> = Mutex::new(false);
    let seed = patterns::random_init_seed();

    let mut seed_writer = SEED_WRITTEN.lock().unwrap();
    if !*seed_writer {
        // Always write the seed before doing anything to ensure reproducibility of failures.
        io::stdout()
            .write_all(format!("\nSeed: {seed}\n\n").as_bytes())
            .unwrap();
        io::stdout().flush().unwrap();

        *seed_writer = true;
    }

    seed
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("vxsort_codegen_{}_{name}", process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

// --- Generation order, recorded through a backend that only logs calls ---

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Event {
    Prologue,
    BasicSorter(Order),
    BasicMerger(Order),
    Compounded {
        kind: NetworkKind,
        width: usize,
        order: Order,
        inline: bool,
    },
    EntryPoints,
    MasterEntryPoint,
    Epilogue,
}

struct RecordingBackend {
    max_vectors: usize,
    events: RefCell<Vec<Event>>,
}

impl RecordingBackend {
    fn new(max_vectors: usize) -> Self {
        Self {
            max_vectors,
            events: RefCell::new(Vec::new()),
        }
    }

    fn record(&self, event: Event) -> Result<()> {
        self.events.borrow_mut().push(event);
        Ok(())
    }
}

impl SimdSortBackend for RecordingBackend {
    fn supported_types() -> &'static [ElementType] {
        &[ElementType::I32]
    }

    fn isa(&self) -> VectorIsa {
        VectorIsa::Avx2
    }

    fn element_type(&self) -> ElementType {
        ElementType::I32
    }

    fn vector_size(&self) -> usize {
        32
    }

    fn vector_type(&self) -> &'static str {
        "__m256i"
    }

    fn max_bitonic_sort_vectors(&self) -> usize {
        self.max_vectors
    }

    fn generate_prologue(&self, _f: &mut dyn Write) -> Result<()> {
        self.record(Event::Prologue)
    }

    fn generate_epilogue(&self, _f: &mut dyn Write) -> Result<()> {
        self.record(Event::Epilogue)
    }

    fn generate_1v_basic_sorters(&self, _f: &mut dyn Write, order: Order) -> Result<()> {
        self.record(Event::BasicSorter(order))
    }

    fn generate_1v_merge_sorters(&self, _f: &mut dyn Write, order: Order) -> Result<()> {
        self.record(Event::BasicMerger(order))
    }

    fn generate_compounded_sorter(
        &self,
        _f: &mut dyn Write,
        width: usize,
        order: Order,
        inline: bool,
    ) -> Result<()> {
        self.record(Event::Compounded {
            kind: NetworkKind::Sorter,
            width,
            order,
            inline,
        })
    }

    fn generate_compounded_merger(
        &self,
        _f: &mut dyn Write,
        width: usize,
        order: Order,
        inline: bool,
    ) -> Result<()> {
        self.record(Event::Compounded {
            kind: NetworkKind::Merger,
            width,
            order,
            inline,
        })
    }

    fn generate_entry_points(&self, _f: &mut dyn Write) -> Result<()> {
        self.record(Event::EntryPoints)
    }

    fn generate_master_entry_point(
        &self,
        _header: &mut dyn Write,
        _source: &mut dyn Write,
    ) -> Result<()> {
        self.record(Event::MasterEntryPoint)
    }
}

fn record_generation(max_vectors: usize, break_inline: usize) -> Vec<Event> {
    let backend = RecordingBackend::new(max_vectors);
    let mut header = String::new();
    let mut source = String::new();

    generate(
        &mut header,
        &mut source,
        &backend,
        InlineBudget::new(break_inline),
    )
    .unwrap();

    backend.events.into_inner()
}

#[test]
fn generation_order() {
    for max_vectors in 1..=20 {
        for break_inline in 0..=5 {
            let events = record_generation(max_vectors, break_inline);
            let len = events.len();

            assert_eq!(events[0], Event::Prologue);
            assert_eq!(events[len - 3], Event::EntryPoints);
            assert_eq!(events[len - 2], Event::MasterEntryPoint);
            assert_eq!(events[len - 1], Event::Epilogue);

            let mut emitted = HashSet::new();
            let mut last_width = 1;
            for event in &events[1..len - 3] {
                match *event {
                    Event::BasicSorter(order) => {
                        assert!(emitted.insert((NetworkKind::Sorter, 1, order)));
                    }
                    Event::BasicMerger(order) => {
                        assert!(emitted.insert((NetworkKind::Merger, 1, order)));
                    }
                    Event::Compounded {
                        kind,
                        width,
                        order,
                        inline,
                    } => {
                        assert!(width >= 2, "width 1 is never compounded");
                        assert!(width >= last_width, "widths must not decrease");
                        last_width = width;

                        let expected_inline = break_inline == 0 || width % break_inline != 0;
                        assert_eq!(inline, expected_inline);

                        let net = match kind {
                            NetworkKind::Sorter => CompoundedNetwork::sorter(width, order),
                            NetworkKind::Merger => CompoundedNetwork::merger(width, order),
                        };
                        for callee in net.callees() {
                            assert!(callee.1 < width);
                            assert!(
                                emitted.contains(&callee),
                                "{kind:?} {width} {order} calls {callee:?} before it exists"
                            );
                        }

                        assert!(emitted.insert((kind, width, order)), "emitted twice");
                    }
                    other => panic!("unexpected {other:?} between prologue and entry points"),
                }
            }

            let largest_merger = largest_merge_variant_needed(max_vectors).max(1);
            for order in Order::BOTH {
                for width in 1..=max_vectors {
                    assert!(emitted.contains(&(NetworkKind::Sorter, width, order)));
                    assert_eq!(
                        emitted.contains(&(NetworkKind::Merger, width, order)),
                        width <= largest_merger
                    );
                }
            }
            assert_eq!(emitted.len(), 2 * (max_vectors + largest_merger));
        }
    }
}

#[test]
fn mergers_stop_at_half_the_widest_power_of_two() {
    let events = record_generation(8, 0);
    let merger_widths = events
        .iter()
        .filter_map(|event| match *event {
            Event::Compounded {
                kind: NetworkKind::Merger,
                width,
                order: Order::Ascending,
                ..
            } => Some(width),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(merger_widths, vec![2, 3, 4]);
}

// --- Network plans, interpreted lane by lane ---

fn apply_lane_stage(v: &mut [i64], stage: &LaneStage) {
    let swapped = (0..v.len())
        .map(|lane| v[stage.partner(lane)])
        .collect::<Vec<_>>();

    for (lane, val) in v.iter_mut().enumerate() {
        let (lo, hi) = ((*val).min(swapped[lane]), (*val).max(swapped[lane]));
        *val = if stage.keeps_max(lane) { hi } else { lo };
    }
}

fn run_network(vectors: &mut [Vec<i64>], kind: NetworkKind, width: usize, order: Order) {
    assert_eq!(vectors.len(), width);

    if width == 1 {
        let lanes = vectors[0].len();
        let stages = match kind {
            NetworkKind::Sorter => lane_sort_stages(lanes, order),
            NetworkKind::Merger => lane_merge_stages(lanes, order),
        };
        for stage in &stages {
            apply_lane_stage(&mut vectors[0], stage);
        }
        return;
    }

    let net = match kind {
        NetworkKind::Sorter => CompoundedNetwork::sorter(width, order),
        NetworkKind::Merger => CompoundedNetwork::merger(width, order),
    };

    for step in &net.steps {
        match *step {
            Step::Call {
                kind,
                width,
                order,
                first,
            } => run_network(&mut vectors[first..first + width], kind, width, order),
            Step::Exchange { low, high } => {
                for lane in 0..vectors[low].len() {
                    let (a, b) = (vectors[low][lane], vectors[high][lane]);
                    let (lo, hi) = (a.min(b), a.max(b));
                    let (to_low, to_high) = match net.order {
                        Order::Ascending => (lo, hi),
                        Order::Descending => (hi, lo),
                    };
                    vectors[low][lane] = to_low;
                    vectors[high][lane] = to_high;
                }
            }
        }
    }
}

fn sort_with_network(values: &[i64], lanes: usize, order: Order) -> Vec<i64> {
    assert_eq!(values.len() % lanes, 0);

    let mut vectors = values
        .chunks(lanes)
        .map(|chunk| chunk.to_vec())
        .collect::<Vec<_>>();
    let width = vectors.len();
    run_network(&mut vectors, NetworkKind::Sorter, width, order);

    vectors.concat()
}

fn expected_sorted(values: &[i64], order: Order) -> Vec<i64> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    if order == Order::Descending {
        sorted.reverse();
    }
    sorted
}

#[test]
fn sorter_plans_sort_every_pattern() {
    let _seed = get_or_init_random_seed();

    for lanes in [1, 2, 4, 8, 16] {
        for width in 1..=16 {
            for order in Order::BOTH {
                for (pattern_name, pattern) in patterns::all() {
                    let values = pattern(width * lanes);
                    let sorted = sort_with_network(&values, lanes, order);

                    assert_eq!(
                        sorted,
                        expected_sorted(&values, order),
                        "{pattern_name}: {width} vectors of {lanes} lanes, {order}"
                    );
                }
            }
        }
    }
}

#[test]
fn sorter_plans_sort_binary_inputs() {
    let _seed = get_or_init_random_seed();

    for lanes in [4, 8, 16] {
        for width in 1..=16 {
            for _ in 0..20 {
                let values = patterns::random_binary(width * lanes);
                for order in Order::BOTH {
                    assert_eq!(
                        sort_with_network(&values, lanes, order),
                        expected_sorted(&values, order)
                    );
                }
            }
        }
    }
}

#[test]
fn exhaustive_binary_small_networks() {
    // Zero-one principle: all 2^n inputs for the narrow cases.
    for (lanes, max_width) in [(1, 16), (2, 8), (4, 4)] {
        for width in 1..=max_width {
            let len = width * lanes;
            for bits in 0u32..(1 << len) {
                let values = (0..len)
                    .map(|i| ((bits >> i) & 1) as i64)
                    .collect::<Vec<_>>();
                for order in Order::BOTH {
                    assert_eq!(
                        sort_with_network(&values, lanes, order),
                        expected_sorted(&values, order),
                        "{values:?}"
                    );
                }
            }
        }
    }
}

// --- Dispatch ---

#[test]
fn dispatch_covers_every_length_once() {
    for isa in VectorIsa::implemented() {
        for &ty in supported_types(isa).unwrap() {
            let backend = make_backend(isa, ty).unwrap();
            let lanes = backend.elements_per_vector();
            let max = backend.max_bitonic_sort_vectors();

            let mut seen = HashSet::new();
            for len in 1..=max * lanes {
                let dispatch = Dispatch::for_len(len, lanes, max).unwrap();
                assert!(dispatch.vectors >= 1 && dispatch.vectors <= max);
                assert!(dispatch.remainder < lanes);
                assert_eq!(dispatch.len(lanes), len);
                assert!(seen.insert((dispatch.vectors, dispatch.remainder)));
            }

            assert_eq!(Dispatch::for_len(0, lanes, max), None);
            assert_eq!(Dispatch::for_len(max * lanes + 1, lanes, max), None);
        }
    }
}

#[test]
fn padded_dispatch_sorts_random_lengths() {
    let _seed = get_or_init_random_seed();

    for (lanes, max) in [(4, 16), (8, 16), (16, 16)] {
        for len in patterns::random_lengths(200, max * lanes) {
            let values = patterns::random(len);
            let dispatch = Dispatch::for_len(len, lanes, max).unwrap();

            // The masked load of the last vector fills the missing lanes with the maximum.
            let mut padded = values.clone();
            padded.resize(dispatch.vectors * lanes, i64::MAX);
            let sorted = sort_with_network(&padded, lanes, Order::Ascending);

            assert_eq!(&sorted[..len], &expected_sorted(&values, Order::Ascending)[..]);
            assert!(sorted[len..].iter().all(|&v| v == i64::MAX));
        }
    }
}

// --- Emitted text ---

struct Definition {
    name: String,
    inline: bool,
}

/// Function definitions of a header in order, checking on the way that every call targets an
/// already defined function.
fn parse_definitions(header: &str) -> Vec<Definition> {
    let mut definitions: Vec<Definition> = Vec::new();

    for line in header.lines().map(str::trim) {
        if line.starts_with("static ") && line.contains(" void ") {
            let after_void = line.split(" void ").nth(1).unwrap();
            let name = after_void.split('(').next().unwrap().to_string();
            assert!(
                definitions.iter().all(|def| def.name != name),
                "{name} defined twice"
            );
            definitions.push(Definition {
                name,
                inline: line.contains(" INLINE "),
            });
        } else if line.starts_with("sort_") && line.ends_with(");") {
            let callee = line.split('(').next().unwrap();
            let caller = &definitions.last().unwrap().name;
            assert!(
                definitions[..definitions.len() - 1]
                    .iter()
                    .any(|def| def.name == callee),
                "{caller} calls {callee} before it is defined"
            );
        }
    }

    definitions
}

fn network_width(name: &str) -> usize {
    name["sort_".len().."sort_".len() + 2].parse().unwrap()
}

fn check_artifact(isa: VectorIsa, ty: ElementType) {
    let break_inline = 4;
    let artifact = GeneratedArtifact::generate(isa, ty, InlineBudget::new(break_inline)).unwrap();

    // Pure function of its inputs.
    let again = GeneratedArtifact::generate(isa, ty, InlineBudget::new(break_inline)).unwrap();
    assert_eq!(artifact, again);

    let backend = make_backend(isa, ty).unwrap();
    let max = backend.max_bitonic_sort_vectors();
    let largest_merger = backend.largest_merge_variant_needed();

    let definitions = parse_definitions(&artifact.header);
    assert_eq!(
        definitions.len(),
        4 + 2 * (max - 1) + 2 * (largest_merger - 1) + max + 1
    );

    for def in &definitions {
        let name = def.name.as_str();
        if name == "sort" || name.ends_with("_alt") {
            assert!(!def.inline, "{name} must stay out-of-line");
            continue;
        }

        let width = network_width(name);
        assert_eq!(
            def.inline,
            width == 1 || width % break_inline != 0,
            "{name}"
        );
        if name.contains("_merge_") {
            assert!(width <= largest_merger, "{name}");
        }
    }

    assert!(artifact
        .header
        .contains(&format!("typedef {} TV;", backend.vector_type())));
    assert!(artifact.header.trim_end().ends_with("#endif"));

    assert!(artifact
        .source
        .contains(&format!("#include \"{}.h\"", artifact.stem())));
    // Every length the dispatch model accepts has a `case` for its width, and no more.
    let lanes = backend.elements_per_vector();
    let mut cases = HashSet::new();
    for len in 1..=max * lanes + 1 {
        if let Some(dispatch) = Dispatch::for_len(len, lanes, max) {
            let width = dispatch.vectors;
            cases.insert(format!(
                "case {width}: sort_{width:02}v_alt(ptr, remainder); break;"
            ));
        }
    }
    let emitted_cases = artifact
        .source
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("case "))
        .map(str::to_string)
        .collect::<HashSet<_>>();
    assert_eq!(emitted_cases, cases);
}

macro_rules! instantiate_artifact_tests {
    ($isa:ident, [$($ty:ident),*]) => {
        paste::paste! {
            $(
                #[test]
                fn [<artifact_ $isa:snake _ $ty:snake>]() {
                    check_artifact(VectorIsa::$isa, ElementType::$ty);
                }
            )*
        }
    };
}

instantiate_artifact_tests!(Avx2, [I32, U32, F32, I64, U64, F64]);
instantiate_artifact_tests!(Avx512, [I32, U32, F32, I64, U64, F64]);

#[test]
fn break_inline_zero_inlines_every_network() {
    let artifact =
        GeneratedArtifact::generate(VectorIsa::Avx512, ElementType::F64, InlineBudget::new(0))
            .unwrap();

    for def in parse_definitions(&artifact.header) {
        if def.name != "sort" && !def.name.ends_with("_alt") {
            assert!(def.inline, "{}", def.name);
        }
    }
}

#[test]
fn budget_changes_only_inline_keywords() {
    let inlined =
        GeneratedArtifact::generate(VectorIsa::Avx2, ElementType::I32, InlineBudget::new(0))
            .unwrap();
    let broken =
        GeneratedArtifact::generate(VectorIsa::Avx2, ElementType::I32, InlineBudget::new(3))
            .unwrap();

    assert_ne!(inlined.header, broken.header);
    assert_eq!(
        inlined.header.replace("NOINLINE", "INLINE"),
        broken.header.replace("NOINLINE", "INLINE")
    );
    assert_eq!(inlined.source, broken.source);
}

// --- Configuration errors and files on disk ---

#[test]
fn unsupported_pair_fails_before_output() {
    for ty in ElementType::ALL {
        let err =
            GeneratedArtifact::generate(VectorIsa::Sve, ty, InlineBudget::new(4)).unwrap_err();
        assert!(err.is_configuration());
    }

    let dir = scratch_dir("unsupported");
    let mut config = GeneratorConfig::new(&dir);
    config.isas = vec![VectorIsa::Sve];

    let err = generate_all(&config).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedIsa {
            isa: VectorIsa::Sve
        }
    ));
    // No element type is singled out when the ISA has no backend at all.
    let message = err.to_string();
    assert!(message.contains("SVE"), "{message}");
    assert!(
        ElementType::ALL
            .iter()
            .all(|ty| !message.contains(ty.c_name())),
        "{message}"
    );
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failed_source_write_removes_header() {
    let dir = scratch_dir("failed_source");
    let artifact =
        GeneratedArtifact::generate(VectorIsa::Avx2, ElementType::I32, InlineBudget::new(0))
            .unwrap();

    // A directory in place of the source file makes its write fail after the header succeeded.
    fs::create_dir_all(artifact.source_path(&dir)).unwrap();

    let err = artifact.write_to(&dir).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!artifact.header_path(&dir).exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn end_to_end_one_pair_per_supported_combination() {
    let dir = scratch_dir("end_to_end");
    let mut config = GeneratorConfig::new(&dir);
    config.isas = vec![VectorIsa::Avx2, VectorIsa::Avx512];
    config.budget = InlineBudget::new(4);

    let written = generate_all(&config).unwrap();

    let mut expected = HashSet::new();
    for &isa in &config.isas {
        for ty in supported_types(isa).unwrap() {
            for ext in ["h", "cpp"] {
                expected.insert(format!("bitonic_sort.{isa}.{ty}.generated.{ext}"));
            }
        }
    }

    let on_disk = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<HashSet<_>>();
    assert_eq!(on_disk, expected);
    assert_eq!(written.len(), expected.len());
    assert!(on_disk.contains("bitonic_sort.AVX512.uint64_t.generated.h"));

    // Same inputs, same bytes.
    let before = fs::read(dir.join("bitonic_sort.AVX2.float.generated.h")).unwrap();
    generate_all(&config).unwrap();
    let after = fs::read(dir.join("bitonic_sort.AVX2.float.generated.h")).unwrap();
    assert_eq!(before, after);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn earlier_pairs_survive_a_later_failure() {
    let dir = scratch_dir("partial");
    let mut config = GeneratorConfig::new(&dir);
    config.isas = vec![VectorIsa::Avx2, VectorIsa::Sve];
    config.types = Some(vec![ElementType::I64]);

    assert!(generate_all(&config).unwrap_err().is_configuration());

    let on_disk = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<HashSet<_>>();
    assert_eq!(
        on_disk,
        HashSet::from([
            "bitonic_sort.AVX2.int64_t.generated.h".to_string(),
            "bitonic_sort.AVX2.int64_t.generated.cpp".to_string(),
        ])
    );

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn element_type_filter() {
    let mut config = GeneratorConfig::new("unused");
    config.types = Some(vec![ElementType::F32, ElementType::U32]);

    assert_eq!(
        config.pairs().unwrap(),
        vec![
            (VectorIsa::Avx2, ElementType::F32),
            (VectorIsa::Avx2, ElementType::U32),
            (VectorIsa::Avx512, ElementType::F32),
            (VectorIsa::Avx512, ElementType::U32),
        ]
    );
}

// --- Binary ---

fn run_binary(args: &[&str]) -> process::Output {
    process::Command::new(env!("CARGO_BIN_EXE_bitonic_gen"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn binary_exit_codes() {
    assert_eq!(run_binary(&["--help"]).status.code(), Some(0));
    assert_eq!(run_binary(&[]).status.code(), Some(2));
    assert_eq!(
        run_binary(&["--vector-isa", "NEON", "--output-dir", "x"]).status.code(),
        Some(2)
    );

    let dir = scratch_dir("binary");
    let dir_str = dir.to_str().unwrap();

    let sve = run_binary(&["--vector-isa", "SVE", "--output-dir", dir_str]);
    assert_eq!(sve.status.code(), Some(1));
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

    let ok = run_binary(&[
        "--vector-isa",
        "AVX2",
        "--element-type",
        "double",
        "--break-inline",
        "4",
        "--output-dir",
        dir_str,
    ]);
    assert_eq!(ok.status.code(), Some(0));
    assert!(dir.join("bitonic_sort.AVX2.double.generated.h").exists());
    assert!(dir.join("bitonic_sort.AVX2.double.generated.cpp").exists());

    fs::remove_dir_all(&dir).unwrap();
}
