//! Maximization step: turn accumulated counts into probabilities.
//!
//! Translation ratios with a zero denominator leave the table entry untouched (plain)
//! or contribute zero (interpolated). Distortion ratios with a zero marginal are set to zero.

use hashbrown::HashSet;

use crate::table::{DistortionTable, ProbTable, TranslationTable};
use crate::types::*;

/// `t'[s,t] = st[s,t] / t[t]` for every pair in `support`.
pub fn maximize_translation<I>(
    support: I,
    st_counts: &ProbTable<WordPair>,
    t_counts: &ProbTable<Token>,
    mut table: TranslationTable,
) -> TranslationTable
where
    I: IntoIterator<Item = WordPair>,
{
    for key in support {
        if let Some(p) = ratio(st_counts.get(&key), t_counts.get(&key.1)) {
            table.set(key, p);
        }
    }
    table
}

/// `t'[s,t] = λ·sup[s,t] + (1-λ)·(st[s,t] / t[t])`, with an undefined ratio read as zero.
pub fn maximize_interpolated_translation<I>(
    support: I,
    st_counts: &ProbTable<WordPair>,
    t_counts: &ProbTable<Token>,
    mut table: TranslationTable,
    supervised: &TranslationTable,
    lambda: Prob,
) -> TranslationTable
where
    I: IntoIterator<Item = WordPair>,
{
    for key in support {
        let estimate = ratio(st_counts.get(&key), t_counts.get(&key.1)).unwrap_or(0.0);
        table.set(key, blend(lambda, supervised.get(&key), estimate));
    }
    table
}

/// `q'[j,i,l,m] = joint[j,i,l,m] / marginal[i,l,m]` over the observed combinations only.
pub fn maximize_distortion(
    combinations: &HashSet<DistortionKey>,
    joint: &ProbTable<DistortionKey>,
    marginal: &ProbTable<PositionKey>,
    mut table: DistortionTable,
) -> DistortionTable {
    for &(j, i, l, m) in combinations {
        let q = ratio(joint.get(&(j, i, l, m)), marginal.get(&(i, l, m))).unwrap_or(0.0);
        table.set((j, i, l, m), q);
    }
    table
}

pub fn maximize_interpolated_distortion(
    combinations: &HashSet<DistortionKey>,
    joint: &ProbTable<DistortionKey>,
    marginal: &ProbTable<PositionKey>,
    mut table: DistortionTable,
    supervised: &DistortionTable,
    lambda: Prob,
) -> DistortionTable {
    for &key in combinations {
        let (j, i, l, m) = key;
        let estimate = ratio(joint.get(&(j, i, l, m)), marginal.get(&(i, l, m))).unwrap_or(0.0);
        table.set(key, blend(lambda, supervised.get(&key), estimate));
    }
    table
}
