//! Grouping and ranking helpers shared by the metrics calculator, the
//! snapshot builder, and the rollup/combine merge steps.

use std::collections::HashMap;

/// Count occurrences per key.
pub fn count_by<I>(keys: I) -> HashMap<String, u64>
where
    I: IntoIterator<Item = String>,
{
    let mut counts = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Rank a count map descending by count. Ties break on ascending key so the
/// order is reproducible regardless of map iteration order.
pub fn rank(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut rows: Vec<(String, u64)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

/// Rank and truncate to the `n` highest-count entries.
pub fn top_n(counts: HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut rows = rank(counts);
    rows.truncate(n);
    rows
}

/// Sum pre-counted rows into an accumulator by key. Used when merging
/// per-snapshot or per-site top-N lists before re-ranking.
pub fn merge_counts<I>(acc: &mut HashMap<String, u64>, rows: I)
where
    I: IntoIterator<Item = (String, u64)>,
{
    for (key, count) in rows {
        *acc.entry(key).or_insert(0) += count;
    }
}
