//! Splitting a flow into bounded population groups.

use transit_demand_models::PopulationChunkingConfig;

/// 31-multiplier string hash over UTF-16 code units with 32-bit signed
/// wrap-around, returned as its absolute value.
///
/// Remainder placement depends on this exact function, so its output is
/// part of the dataset format.
#[must_use]
pub fn hash_string(input: &str) -> u64 {
    let hash = input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(i32::from(unit))
    });
    u64::from(hash.unsigned_abs())
}

/// Cuts every size above `max` into `max`-sized pieces plus a remainder.
fn cut_to_max(sizes: Vec<u64>, max: u64) -> Vec<u64> {
    if max == 0 {
        return sizes;
    }
    let mut adjusted = Vec::with_capacity(sizes.len());
    for size in sizes {
        let mut left = size;
        while left > max {
            adjusted.push(max);
            left -= max;
        }
        if left > 0 {
            adjusted.push(left);
        }
    }
    adjusted
}

/// Folds each group under `min` into its left neighbour (the first group
/// folds into the second).
fn merge_undersized(mut sizes: Vec<u64>, min: u64) -> Vec<u64> {
    if min == 0 || sizes.len() <= 1 {
        return sizes;
    }
    let mut i = 0;
    while i < sizes.len() {
        if sizes[i] >= min {
            i += 1;
            continue;
        }
        let neighbour = if i == 0 { 1 } else { i - 1 };
        if neighbour < sizes.len() {
            sizes[neighbour] += sizes[i];
            sizes.remove(i);
        } else {
            i += 1;
        }
    }
    sizes
}

/// Accumulates groups under `minimum`, smallest first, until each
/// accumulated group reaches it. A trailing partial accumulation joins the
/// last group.
fn merge_to_finalize(sizes: Vec<u64>, minimum: u64) -> Vec<u64> {
    if minimum == 0 || sizes.len() <= 1 {
        return sizes;
    }
    let mut sorted = sizes;
    sorted.sort_unstable();

    let mut merged: Vec<u64> = Vec::with_capacity(sorted.len());
    let mut accumulator = 0u64;
    for size in sorted {
        if size >= minimum {
            if accumulator > 0 {
                merged.push(accumulator);
                accumulator = 0;
            }
            merged.push(size);
        } else {
            accumulator += size;
            if accumulator >= minimum {
                merged.push(accumulator);
                accumulator = 0;
            }
        }
    }
    if accumulator > 0 {
        match merged.last_mut() {
            Some(last) => *last += accumulator,
            None => merged.push(accumulator),
        }
    }
    merged
}

/// Applies the size-bound passes to an initial partition: max cut,
/// undersized merge, finalize merge, then max cut again.
#[must_use]
pub fn normalize(sizes: Vec<u64>, config: &PopulationChunkingConfig) -> Vec<u64> {
    let sizes = cut_to_max(sizes, config.max_size);
    let sizes = merge_undersized(sizes, config.min_size);
    let sizes = merge_to_finalize(sizes, config.minimum_finalize_size);
    cut_to_max(sizes, config.max_size)
}

/// Splits a flow of `size` into group sizes biased towards
/// `target_size` and bounded by `[min_size, max_size]`.
///
/// `seed` is the `"<originId>-<destId>"` string whose hash places the
/// remainder units, which makes the split reproducible.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn split_into_groups(size: u64, seed: &str, config: &PopulationChunkingConfig) -> Vec<u64> {
    if size == 0 {
        return Vec::new();
    }
    if config.max_size == 0 || size <= config.min_size {
        return vec![size];
    }

    let min_groups = size.div_ceil(config.max_size).max(1);
    let max_groups = if config.min_size > 0 {
        size / config.min_size
    } else {
        size
    }
    .max(min_groups);

    let targeted = if config.target_size > 0 {
        (size as f64 / config.target_size as f64).round() as u64
    } else {
        min_groups
    };
    let mut count = targeted.max(min_groups).min(max_groups).max(1);

    let mut base = size / count;
    while count > 1 && base < config.min_size {
        count -= 1;
        base = size / count;
    }

    let mut sizes = vec![base; usize::try_from(count).unwrap_or(1)];
    let remainder = size - base * count;
    let hash = hash_string(seed);
    for i in 0..remainder {
        let slot = (hash + i) % count;
        sizes[usize::try_from(slot).unwrap_or(0)] += 1;
    }

    normalize(sizes, config)
}
