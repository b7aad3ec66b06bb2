//! IBM Model 1: bag-of-words translation probabilities t(s, t).

use crate::em::{EmConfig, Supervision};
use crate::error::AlignResult;
use crate::maximize::{maximize_interpolated_translation, maximize_translation};
use crate::parallel::Workers;
use crate::table::{Counts, TranslationTable};
use crate::text::{Bitext, CoOccurrence, PartialAlignments, SentencePair};
use crate::types::*;

pub struct Ibm1<'a> {
    bitext: &'a Bitext,
    co: &'a CoOccurrence,
}

impl<'a> Ibm1<'a> {
    pub fn new(bitext: &'a Bitext, co: &'a CoOccurrence) -> Self {
        Ibm1 { bitext, co }
    }

    /// Translation table estimated from the annotated links alone.
    ///
    /// Every target word in a sentence containing an annotated source word gets a
    /// count of 1 when it is one of that word's annotated targets and 0 otherwise.
    /// Source words without annotations stay at zero.
    pub fn supervised(&self, partial: &PartialAlignments) -> TranslationTable {
        let mut counts = Counts::new();
        for pair in &self.bitext.pairs {
            for &s in &pair.source.tokens {
                let Some(targets) = partial.get(&s) else { continue };
                for &t in &pair.target.tokens {
                    let v = if targets.contains(&t) { 1.0 } else { 0.0 };
                    counts.add_translation(s, t, v);
                }
            }
        }
        maximize_translation(self.co.keys().copied(), &counts.pair, &counts.target, TranslationTable::new())
    }

    /// `1 / |source vocabulary|` on every co-occurring pair.
    pub fn uniform(&self) -> TranslationTable {
        let n = self.bitext.source_vocab.len().max(1);
        let p = 1.0 / n as Prob;
        self.co.keys().map(|&k| (k, p)).collect()
    }

    pub fn train(
        &self,
        cfg: &EmConfig,
        supervision: Supervision<'_, TranslationTable>,
    ) -> AlignResult<TranslationTable> {
        let mut table = self.uniform();
        let workers = Workers::new(cfg.workers)?;
        for it in 0..cfg.iterations {
            let counts = workers.expectation(&self.bitext.pairs, |chunk| expectation(chunk, &table))?;
            table = match supervision {
                Supervision::Unsupervised => {
                    maximize_translation(self.co.keys().copied(), &counts.pair, &counts.target, table)
                }
                Supervision::Interpolated { prior, lambda } => maximize_interpolated_translation(
                    self.co.keys().copied(),
                    &counts.pair,
                    &counts.target,
                    table,
                    prior,
                    lambda,
                ),
            };
            log::debug!("ibm1 iteration {}/{}: {} target words observed", it + 1, cfg.iterations, counts.target.len());
        }
        Ok(table)
    }
}

/// Fractional counts of one E-step over `pairs`.
///
/// For each source word the responsibility of target word `t` is
/// `t(s,t) / Σ_t' t(s,t')` over the target sentence. A source word whose
/// normalizer is zero contributes nothing.
pub fn expectation(pairs: &[SentencePair], table: &TranslationTable) -> Counts {
    let mut counts = Counts::new();
    for pair in pairs {
        let tgt = &pair.target.tokens;
        for &s in &pair.source.tokens {
            let normalizer: Prob = tgt.iter().map(|&t| table.get(&(s, t))).sum();
            if normalizer == 0.0 {
                continue;
            }
            for &t in tgt {
                counts.add_translation(s, t, table.get(&(s, t)) / normalizer);
            }
        }
    }
    counts
}
