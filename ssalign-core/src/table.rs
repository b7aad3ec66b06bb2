//! Sparse probability tables and the per-iteration count accumulators.

use core::hash::Hash;

use hashbrown::HashMap;

use crate::types::*;

/// Sparse mapping from an integer tuple key to a probability or count.
///
/// Absent keys read as zero. `set` overwrites, `add` accumulates.
#[derive(Clone, Debug)]
pub struct ProbTable<K> {
    values: HashMap<K, Prob>,
}

impl<K> Default for ProbTable<K> {
    fn default() -> Self {
        ProbTable { values: HashMap::new() }
    }
}

impl<K: Eq + Hash + Copy> ProbTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, key: &K) -> Prob {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn set(&mut self, key: K, value: Prob) {
        self.values.insert(key, value);
    }

    #[inline]
    pub fn add(&mut self, key: K, value: Prob) {
        *self.values.entry(key).or_insert(0.0) += value;
    }

    pub fn contains(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    /// Key-wise sum of `other` into `self`.
    pub fn merge(&mut self, other: ProbTable<K>) {
        if self.values.is_empty() {
            self.values = other.values;
            return;
        }
        for (k, v) in other.values {
            self.add(k, v);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Prob)> {
        self.values.iter()
    }

    /// Entries sorted by key, for stable dumps.
    pub fn sorted_entries(&self) -> Vec<(K, Prob)>
    where
        K: Ord,
    {
        let mut v: Vec<(K, Prob)> = self.values.iter().map(|(k, p)| (*k, *p)).collect();
        v.sort_by(|a, b| a.0.cmp(&b.0));
        v
    }
}

impl<K: Eq + Hash + Copy> FromIterator<(K, Prob)> for ProbTable<K> {
    fn from_iter<I: IntoIterator<Item = (K, Prob)>>(iter: I) -> Self {
        ProbTable { values: iter.into_iter().collect() }
    }
}

pub type TranslationTable = ProbTable<WordPair>;
pub type DistortionTable = ProbTable<DistortionKey>;

/// Sufficient statistics gathered by one expectation pass.
#[derive(Clone, Debug, Default)]
pub struct Counts {
    /// (source, target) fractional counts
    pub pair: ProbTable<WordPair>,
    /// per-target-word totals
    pub target: ProbTable<Token>,
    /// (j, i, l, m) positional joint counts
    pub joint: ProbTable<DistortionKey>,
    /// (i, l, m) positional marginals
    pub marginal: ProbTable<PositionKey>,
}

impl Counts {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_translation(&mut self, s: Token, t: Token, v: Prob) {
        self.pair.add((s, t), v);
        self.target.add(t, v);
    }

    #[inline]
    pub fn add_position(&mut self, j: usize, i: usize, l: usize, m: usize, v: Prob) {
        self.joint.add((j, i, l, m), v);
        self.marginal.add((i, l, m), v);
    }

    pub fn merge(&mut self, other: Counts) {
        self.pair.merge(other.pair);
        self.target.merge(other.target);
        self.joint.merge(other.joint);
        self.marginal.merge(other.marginal);
    }
}
