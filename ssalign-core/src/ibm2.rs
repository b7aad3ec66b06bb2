//! IBM Model 2: translation probabilities plus a distortion table q(j | i, l, m).

use hashbrown::HashSet;

use crate::em::{EmConfig, Supervision};
use crate::error::AlignResult;
use crate::maximize::*;
use crate::parallel::Workers;
use crate::table::{Counts, DistortionTable, TranslationTable};
use crate::text::{Bitext, CoOccurrence, PartialAlignments, SentencePair};
use crate::types::*;

#[derive(Clone, Debug, Default)]
pub struct Ibm2Model {
    pub translation: TranslationTable,
    pub distortion: DistortionTable,
}

pub struct Ibm2<'a> {
    bitext: &'a Bitext,
    co: &'a CoOccurrence,
    // every (j, i, l, m) that occurs in the corpus
    combinations: HashSet<DistortionKey>,
    target_positions: usize,
}

impl<'a> Ibm2<'a> {
    pub fn new(bitext: &'a Bitext, co: &'a CoOccurrence) -> Self {
        let mut combinations = HashSet::new();
        for pair in &bitext.pairs {
            let (l, m) = (pair.target.len(), pair.source.len());
            for i in 0..m {
                for j in 0..l {
                    combinations.insert((j, i, l, m));
                }
            }
        }
        Ibm2 { bitext, co, combinations, target_positions: bitext.max_target_len() }
    }

    #[cfg(test)]
    pub(crate) fn combinations(&self) -> &HashSet<DistortionKey> {
        &self.combinations
    }

    /// Tables estimated from the annotated links alone.
    ///
    /// Positional counts are taken for annotated links only; the distortion table is
    /// defined over the positions of annotated source words.
    pub fn supervised(&self, partial: &PartialAlignments) -> Ibm2Model {
        let mut counts = Counts::new();
        let mut combinations = HashSet::new();
        for pair in &self.bitext.pairs {
            let (l, m) = (pair.target.len(), pair.source.len());
            for (i, &s) in pair.source.tokens.iter().enumerate() {
                let Some(targets) = partial.get(&s) else { continue };
                for (j, &t) in pair.target.tokens.iter().enumerate() {
                    combinations.insert((j, i, l, m));
                    if targets.contains(&t) {
                        counts.add_translation(s, t, 1.0);
                        counts.add_position(j, i, l, m, 1.0);
                    } else {
                        counts.add_translation(s, t, 0.0);
                    }
                }
            }
        }
        Ibm2Model {
            translation: maximize_translation(
                self.co.keys().copied(),
                &counts.pair,
                &counts.target,
                TranslationTable::new(),
            ),
            distortion: maximize_distortion(&combinations, &counts.joint, &counts.marginal, DistortionTable::new()),
        }
    }

    /// `1 / |distinct target positions|` on every combination seen in the corpus.
    ///
    /// This is only approximately uniform for sentences shorter than the longest one.
    pub fn uniform_distortion(&self) -> DistortionTable {
        let p = 1.0 / self.target_positions.max(1) as Prob;
        self.combinations.iter().map(|&k| (k, p)).collect()
    }

    /// Run EM starting from `seed` (normally Model 1's translation table).
    pub fn train(
        &self,
        seed: TranslationTable,
        cfg: &EmConfig,
        supervision: Supervision<'_, Ibm2Model>,
    ) -> AlignResult<Ibm2Model> {
        let mut model = Ibm2Model { translation: seed, distortion: self.uniform_distortion() };
        let workers = Workers::new(cfg.workers)?;
        for it in 0..cfg.iterations {
            let counts = workers.expectation(&self.bitext.pairs, |chunk| expectation(chunk, &model))?;
            let Ibm2Model { translation, distortion } = model;
            model = match supervision {
                Supervision::Unsupervised => Ibm2Model {
                    translation: maximize_translation(self.co.keys().copied(), &counts.pair, &counts.target, translation),
                    distortion: maximize_distortion(&self.combinations, &counts.joint, &counts.marginal, distortion),
                },
                Supervision::Interpolated { prior, lambda } => Ibm2Model {
                    translation: maximize_interpolated_translation(
                        self.co.keys().copied(),
                        &counts.pair,
                        &counts.target,
                        translation,
                        &prior.translation,
                        lambda,
                    ),
                    distortion: maximize_interpolated_distortion(
                        &self.combinations,
                        &counts.joint,
                        &counts.marginal,
                        distortion,
                        &prior.distortion,
                        lambda,
                    ),
                },
            };
            log::debug!("ibm2 iteration {}/{}", it + 1, cfg.iterations);
        }
        Ok(model)
    }
}

/// One E-step: for source position i the responsibility of target position j is
/// `q(j,i,l,m)·t(s_i,t_j) / Σ_j' q(j',i,l,m)·t(s_i,t_j')`.
pub fn expectation(pairs: &[SentencePair], model: &Ibm2Model) -> Counts {
    let mut counts = Counts::new();
    let mut scores = Vec::new();
    for pair in pairs {
        let (l, m) = (pair.target.len(), pair.source.len());
        for (i, &s) in pair.source.tokens.iter().enumerate() {
            scores.clear();
            scores.extend(
                pair.target
                    .tokens
                    .iter()
                    .enumerate()
                    .map(|(j, &t)| model.distortion.get(&(j, i, l, m)) * model.translation.get(&(s, t))),
            );
            let normalizer: Prob = scores.iter().sum();
            if normalizer == 0.0 {
                continue;
            }
            for (j, &t) in pair.target.tokens.iter().enumerate() {
                let v = scores[j] / normalizer;
                counts.add_translation(s, t, v);
                counts.add_position(j, i, l, m, v);
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibm1::Ibm1;
    use crate::text::co_occurrence;
    use approx::assert_relative_eq;
    use hashbrown::HashMap;

    fn corpus() -> Bitext {
        Bitext::from_words(&[
            (vec!["la", "maison"], vec!["the", "house"]),
            (vec!["la", "fleur"], vec!["the", "flower"]),
            (vec!["maison", "bleue"], vec!["house", "blue"]),
            (vec!["la", "maison", "bleue"], vec!["the", "house", "blue"]),
            (vec!["fleur"], vec!["flower"]),
        ])
    }

    #[test]
    fn uniform_distortion_uses_distinct_target_positions() {
        let b = corpus();
        let co = co_occurrence(&b);
        let engine = Ibm2::new(&b, &co);
        let q = engine.uniform_distortion();
        assert_eq!(q.len(), engine.combinations().len());
        // two-, three- and one-word targets: positions 0, 1, 2
        assert_relative_eq!(q.get(&(0, 0, 2, 2)), 1.0 / 3.0);
        assert_eq!(q.get(&(5, 0, 2, 2)), 0.0);
    }

    #[test]
    fn distortion_rows_are_normalized() {
        let b = corpus();
        let co = co_occurrence(&b);
        let seed = Ibm1::new(&b, &co).train(&EmConfig::default(), Supervision::Unsupervised).unwrap();
        let engine = Ibm2::new(&b, &co);
        let model = engine.train(seed, &EmConfig::default(), Supervision::Unsupervised).unwrap();

        let mut rows: HashMap<PositionKey, Prob> = HashMap::new();
        for &(j, i, l, m) in engine.combinations() {
            *rows.entry((i, l, m)).or_insert(0.0) += model.distortion.get(&(j, i, l, m));
        }
        for (_, sum) in rows {
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        }

        // monotone corpus: diagonal wins in the three-word sentence
        assert!(model.distortion.get(&(1, 1, 3, 3)) > model.distortion.get(&(0, 1, 3, 3)));
        assert!(model.distortion.get(&(1, 1, 3, 3)) > model.distortion.get(&(2, 1, 3, 3)));
    }

    #[test]
    fn supervised_counts_annotated_positions() {
        let b = Bitext::from_words(&[(vec!["a", "b"], vec!["x", "y"])]);
        let co = co_occurrence(&b);
        let a = b.source_vocab.get("a").unwrap();
        let x = b.target_vocab.get("x").unwrap();
        let y = b.target_vocab.get("y").unwrap();
        let mut partial = PartialAlignments::new();
        partial.insert(a, HashSet::from([y]));

        let model = Ibm2::new(&b, &co).supervised(&partial);
        assert_eq!(model.translation.get(&(a, y)), 1.0);
        assert_eq!(model.translation.get(&(a, x)), 0.0);
        assert_eq!(model.distortion.get(&(1, 0, 2, 2)), 1.0);
        assert_eq!(model.distortion.get(&(0, 0, 2, 2)), 0.0);
        assert!(model.distortion.contains(&(0, 0, 2, 2)));
        // source position 1 was never annotated
        assert!(!model.distortion.contains(&(0, 1, 2, 2)));
    }

    #[test]
    fn parallel_expectation_matches_sequential() {
        let b = corpus();
        let co = co_occurrence(&b);
        let engine = Ibm2::new(&b, &co);
        let model = Ibm2Model { translation: Ibm1::new(&b, &co).uniform(), distortion: engine.uniform_distortion() };
        let seq = expectation(&b.pairs, &model);
        let par = Workers::new(4).unwrap().expectation(&b.pairs, |chunk| expectation(chunk, &model)).unwrap();
        for (k, v) in seq.joint.iter() {
            assert_relative_eq!(par.joint.get(k), *v, epsilon = 1e-12);
        }
        for (k, v) in seq.marginal.iter() {
            assert_relative_eq!(par.marginal.get(k), *v, epsilon = 1e-12);
        }
        for (k, v) in seq.pair.iter() {
            assert_relative_eq!(par.pair.get(k), *v, epsilon = 1e-12);
        }
    }

    #[test]
    fn interpolated_at_one_returns_prior_on_support() {
        let b = corpus();
        let co = co_occurrence(&b);
        let engine = Ibm2::new(&b, &co);
        let la = b.source_vocab.get("la").unwrap();
        let the = b.target_vocab.get("the").unwrap();
        let mut partial = PartialAlignments::new();
        partial.insert(la, HashSet::from([the]));
        let prior = engine.supervised(&partial);
        let seed = Ibm1::new(&b, &co).uniform();

        let cfg = EmConfig { iterations: 2, workers: 1 };
        let model = engine.train(seed, &cfg, Supervision::Interpolated { prior: &prior, lambda: 1.0 }).unwrap();
        for k in co.keys() {
            assert_eq!(model.translation.get(k), prior.translation.get(k));
        }
        for k in engine.combinations() {
            assert_eq!(model.distortion.get(k), prior.distortion.get(k));
        }
    }
}
