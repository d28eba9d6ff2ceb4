//! ISA independent model of the bitonic networks.
//!
//! Everything here works in units of whole vectors, except the in-register base case which is
//! described as a schedule of lane permutations. Backends only turn these plans into text, they
//! never decide the shape of a network.

use std::fmt;

/// Direction a network sorts or merges in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub const BOTH: [Order; 2] = [Order::Ascending, Order::Descending];

    pub fn reverse(self) -> Order {
        match self {
            Order::Ascending => Order::Descending,
            Order::Descending => Order::Ascending,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Order::Ascending => "ascending",
            Order::Descending => "descending",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NetworkKind {
    Sorter,
    Merger,
}

/// Smallest power of two that is `>= v`. `next_power_of_2(0) == 1`.
pub const fn next_power_of_2(v: usize) -> usize {
    v.next_power_of_two()
}

/// Widest merger any sorter up to `max_vectors` calls into.
///
/// A sorter of width `w` merges its two parts with mergers no wider than
/// `next_power_of_2(w) / 2`, so no merger above that bound for `max_vectors` is ever referenced.
pub const fn largest_merge_variant_needed(max_vectors: usize) -> usize {
    next_power_of_2(max_vectors) / 2
}

/// Splits a compounded network of `width` vectors into its lower and upper part.
///
/// The lower part is always a power of two and at least as wide as the upper part.
pub fn split(width: usize) -> (usize, usize) {
    debug_assert!(width >= 2);

    let lower = next_power_of_2(width) / 2;
    (lower, width - lower)
}

/// Bounds how many levels of composition get textually inlined.
///
/// With a budget of `n > 0` every width divisible by `n` becomes a real call boundary, a budget of
/// zero inlines everything.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineBudget(usize);

impl InlineBudget {
    pub const fn new(break_inline: usize) -> Self {
        Self(break_inline)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub const fn is_inline(self, width: usize) -> bool {
        self.0 == 0 || width % self.0 != 0
    }
}

/// One step of a compounded network. Vector indices are zero based into the register window of
/// the network.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Run another network over `width` vectors starting at `first`.
    Call {
        kind: NetworkKind,
        width: usize,
        order: Order,
        first: usize,
    },
    /// Lane-wise compare-exchange. `low` keeps the minimum for ascending networks and the maximum
    /// for descending ones.
    Exchange { low: usize, high: usize },
}

/// Vector level composition of a sorter or merger with `width >= 2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompoundedNetwork {
    pub kind: NetworkKind,
    pub width: usize,
    pub order: Order,
    pub steps: Vec<Step>,
}

impl CompoundedNetwork {
    pub fn sorter(width: usize, order: Order) -> Self {
        let (lower, upper) = split(width);

        // Sorting the lower part in the opposite direction turns the whole window into a bitonic
        // sequence, with the shorter upper part padded by virtual extremes at its end.
        let mut steps = vec![
            Step::Call {
                kind: NetworkKind::Sorter,
                width: lower,
                order: order.reverse(),
                first: 0,
            },
            Step::Call {
                kind: NetworkKind::Sorter,
                width: upper,
                order,
                first: lower,
            },
        ];
        push_merge_steps(&mut steps, width, order);

        Self {
            kind: NetworkKind::Sorter,
            width,
            order,
            steps,
        }
    }

    pub fn merger(width: usize, order: Order) -> Self {
        let mut steps = Vec::new();
        push_merge_steps(&mut steps, width, order);

        Self {
            kind: NetworkKind::Merger,
            width,
            order,
            steps,
        }
    }

    /// The networks this one calls, in call order.
    pub fn callees(&self) -> impl Iterator<Item = (NetworkKind, usize, Order)> + '_ {
        self.steps.iter().filter_map(|step| match *step {
            Step::Call {
                kind, width, order, ..
            } => Some((kind, width, order)),
            Step::Exchange { .. } => None,
        })
    }

    pub fn exchanges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.steps.iter().filter_map(|step| match *step {
            Step::Exchange { low, high } => Some((low, high)),
            Step::Call { .. } => None,
        })
    }
}

fn push_merge_steps(steps: &mut Vec<Step>, width: usize, order: Order) {
    let (lower, upper) = split(width);

    // Only the first `upper` vectors of the lower part have a partner, the rest would be compared
    // against padding and stay where they are.
    steps.extend((0..upper).map(|x| Step::Exchange {
        low: x,
        high: x + lower,
    }));

    steps.push(Step::Call {
        kind: NetworkKind::Merger,
        width: lower,
        order,
        first: 0,
    });
    steps.push(Step::Call {
        kind: NetworkKind::Merger,
        width: upper,
        order,
        first: lower,
    });
}

/// One compare-exchange layer inside a single vector.
///
/// Lane `i` is paired with lane `i ^ distance`. Lanes whose bit is set in `max_lanes` keep the
/// larger value of their pair, the others keep the smaller one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LaneStage {
    pub distance: usize,
    pub max_lanes: u64,
}

impl LaneStage {
    pub fn partner(&self, lane: usize) -> usize {
        lane ^ self.distance
    }

    pub fn keeps_max(&self, lane: usize) -> bool {
        self.max_lanes & (1 << lane) != 0
    }
}

/// Full in-register bitonic sort of `lanes` elements.
pub fn lane_sort_stages(lanes: usize, order: Order) -> Vec<LaneStage> {
    let mut stages = Vec::new();
    let mut block = 2;
    while block <= lanes {
        push_lane_stages(&mut stages, lanes, block, order);
        block *= 2;
    }

    stages
}

/// In-register bitonic merge of `lanes` elements, the last pass of [`lane_sort_stages`].
pub fn lane_merge_stages(lanes: usize, order: Order) -> Vec<LaneStage> {
    let mut stages = Vec::new();
    push_lane_stages(&mut stages, lanes, lanes, order);

    stages
}

fn push_lane_stages(stages: &mut Vec<LaneStage>, lanes: usize, block: usize, order: Order) {
    assert!(lanes.is_power_of_two() && lanes <= 64);

    let mut distance = block / 2;
    while distance >= 1 {
        let mut max_lanes = 0u64;
        for lane in 0..lanes {
            let is_lower = lane & distance == 0;
            let block_ascending = (lane & block == 0) == (order == Order::Ascending);
            // The lower lane of an ascending pair keeps the min, the upper one the max.
            if is_lower != block_ascending {
                max_lanes |= 1 << lane;
            }
        }
        stages.push(LaneStage {
            distance,
            max_lanes,
        });
        distance /= 2;
    }
}

/// Which generated entry point serves an input of a given element count.
///
/// This is the reference model of the `switch` that `master_entry_point` writes into the source
/// file. The generated code computes the same split at run time, tests check every emitted `case`
/// against it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dispatch {
    /// Width of the network, in vectors.
    pub vectors: usize,
    /// Elements in the last, partially loaded vector. Zero means it is full.
    pub remainder: usize,
}

impl Dispatch {
    /// Mirrors the switch in the generated master entry point. Lengths the generated code leaves
    /// alone, zero and anything above `max_vectors` full vectors, map to `None`.
    pub fn for_len(len: usize, elements_per_vector: usize, max_vectors: usize) -> Option<Self> {
        let full_vectors = len / elements_per_vector;
        let remainder = len % elements_per_vector;
        let vectors = full_vectors + (remainder > 0) as usize;

        if vectors == 0 || vectors > max_vectors {
            return None;
        }

        Some(Self { vectors, remainder })
    }

    /// Number of real elements the network sees, the rest of the last vector is padding.
    pub fn len(&self, elements_per_vector: usize) -> usize {
        if self.remainder == 0 {
            self.vectors * elements_per_vector
        } else {
            (self.vectors - 1) * elements_per_vector + self.remainder
        }
    }
}
