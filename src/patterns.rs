//! Input patterns for exercising network plans and the dispatch model in tests and benchmarks.
//!
//! Values are `i64`, wide enough to stand in for every element type a network is generated for.
//! The seed is fixed per process, set `OVERRIDE_SEED` to replay a failure.

use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use rand::prelude::*;

// --- Public ---

pub fn random(len: usize) -> Vec<i64> {
    //     .
    // : . : :
    // :.:::.::

    let mut rng = new_rng();
    (0..len).map(|_| rng.gen::<i64>()).collect()
}

pub fn random_uniform(len: usize, range: std::ops::RangeInclusive<i64>) -> Vec<i64> {
    // :.:.:.::
    let mut rng = new_rng();
    let dist = rand::distributions::Uniform::from(range);

    (0..len).map(|_| dist.sample(&mut rng)).collect()
}

/// Zeros and ones only. A network that sorts every binary input sorts every input.
pub fn random_binary(len: usize) -> Vec<i64> {
    random_uniform(len, 0..=1)
}

pub fn all_equal(len: usize) -> Vec<i64> {
    // ......
    // ::::::

    vec![66; len]
}

pub fn ascending(len: usize) -> Vec<i64> {
    //     .:
    //   .:::
    // .:::::

    (0..len as i64).collect()
}

pub fn descending(len: usize) -> Vec<i64> {
    // :.
    // :::.
    // :::::.

    (0..len as i64).rev().collect()
}

pub fn pipe_organ(len: usize) -> Vec<i64> {
    //   .:.
    // .:::::.

    let mut vals = random(len);
    let (first_half, second_half) = vals.split_at_mut(len / 2);
    first_half.sort_unstable();
    second_half.sort_unstable_by_key(|&e| std::cmp::Reverse(e));

    vals
}

/// Element counts in `1..=max_len`, drawn uniformly.
pub fn random_lengths(count: usize, max_len: usize) -> Vec<usize> {
    let mut rng = new_rng();
    (0..count).map(|_| rng.gen_range(1..=max_len)).collect()
}

/// All named patterns, for tests that sweep over them.
pub fn all() -> [(&'static str, fn(usize) -> Vec<i64>); 6] {
    [
        ("random", random),
        ("random_binary", random_binary),
        ("all_equal", all_equal),
        ("ascending", ascending),
        ("descending", descending),
        ("pipe_organ", pipe_organ),
    ]
}

pub fn random_init_seed() -> u64 {
    static SEED: OnceCell<u64> = OnceCell::new();

    *SEED.get_or_init(|| {
        env::var("OVERRIDE_SEED")
            .ok()
            .and_then(|seed| u64::from_str(&seed).ok())
            .unwrap_or_else(|| thread_rng().gen())
    })
}

// --- Private ---

// Every call gets its own stream, derived from the process seed and the call count, so repeated
// calls with the same length still differ while a run stays replayable.
fn new_rng() -> StdRng {
    static CALLS: AtomicU64 = AtomicU64::new(0);

    let call = CALLS.fetch_add(1, Ordering::Relaxed);
    StdRng::seed_from_u64(random_init_seed().wrapping_add(call.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
}
