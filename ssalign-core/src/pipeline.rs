use std::time::Instant;

use crate::decode;
use crate::em::{EmConfig, Supervision};
use crate::error::{AlignError, AlignResult};
use crate::hmm::{Hmm, HmmModel};
use crate::ibm1::Ibm1;
use crate::ibm2::{Ibm2, Ibm2Model};
use crate::table::TranslationTable;
use crate::text::{write_table, write_translation_table, Bitext, CoOccurrence, PartialAlignments};
use crate::types::*;

#[derive(Clone, Debug)]
pub struct TrainOptions {
    pub model: u8,                   // 1..3, last stage to train
    pub lambdas: [Option<Prob>; 3],  // per model; Some => interpolate with supervised tables
    pub iterations: [usize; 3],      // per model
    pub workers: usize,              // expectation workers for models 1 and 2
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            model: 1,
            lambdas: [None; 3],
            iterations: [EM_ITERATIONS; 3],
            workers: 1,
        }
    }
}

impl TrainOptions {
    pub fn validate(&self) -> AlignResult<()> {
        if !(1..=3).contains(&self.model) {
            return Err(AlignError::InvalidModel(self.model));
        }
        for lambda in self.lambdas.iter().flatten() {
            if !(0.0..=1.0).contains(lambda) {
                return Err(AlignError::InvalidLambda(*lambda as f64));
            }
        }
        Ok(())
    }

    fn em(&self, model: u8) -> EmConfig {
        EmConfig { iterations: self.iterations[(model as usize) - 1], workers: self.workers }
    }
}

#[derive(Clone, Debug)]
pub struct TrainedModels {
    pub ibm1: TranslationTable,
    pub ibm2: Option<Ibm2Model>,
    pub hmm: Option<HmmModel>,
}

impl TrainedModels {
    /// Decode with the most refined model that was trained.
    pub fn align(&self, bitext: &Bitext) -> Vec<Vec<Link>> {
        if let Some(hmm) = &self.hmm {
            decode::hmm(bitext, hmm)
        } else if let Some(ibm2) = &self.ibm2 {
            decode::ibm2(bitext, ibm2)
        } else {
            decode::ibm1(bitext, &self.ibm1)
        }
    }

    /// Flat text dumps of every trained table, named by stage.
    pub fn dumps(&self, bitext: &Bitext) -> Vec<(&'static str, String)> {
        let mut out = vec![("ibm1.tprob", write_translation_table(&self.ibm1, bitext))];
        if let Some(m) = &self.ibm2 {
            out.push(("ibm2.tprob", write_translation_table(&m.translation, bitext)));
            out.push(("ibm2.qprob", write_table(&m.distortion)));
        }
        if let Some(m) = &self.hmm {
            out.push(("hmm.emission", write_translation_table(&m.emission, bitext)));
            out.push(("hmm.transition", write_table(&m.transitions.to_table())));
            out.push(("hmm.state", write_table(&m.initial)));
        }
        out
    }
}

fn supervision_for<'p>(
    stage: &str,
    lambda: Option<Prob>,
    partial: Option<&'p PartialAlignments>,
) -> Option<(Prob, &'p PartialAlignments)> {
    match (lambda, partial) {
        (Some(l), Some(p)) => Some((l, p)),
        (Some(_), None) => {
            log::warn!("{stage}: interpolation requested without partial alignments, training unsupervised");
            None
        }
        _ => None,
    }
}

/// Train Model 1, then optionally Model 2 and the HMM, each seeded with the
/// previous stage's translation table.
pub fn train(
    bitext: &Bitext,
    co: &CoOccurrence,
    partial: Option<&PartialAlignments>,
    opts: &TrainOptions,
) -> AlignResult<TrainedModels> {
    opts.validate()?;
    log::info!(
        "training on {} sentence pairs, {} source / {} target words, {} co-occurring pairs",
        bitext.len(),
        bitext.source_vocab.len(),
        bitext.target_vocab.len(),
        co.len()
    );

    let start = Instant::now();
    let engine = Ibm1::new(bitext, co);
    let ibm1 = match supervision_for("ibm1", opts.lambdas[0], partial) {
        Some((lambda, partial)) => {
            let prior = engine.supervised(partial);
            engine.train(&opts.em(1), Supervision::Interpolated { prior: &prior, lambda })?
        }
        None => engine.train(&opts.em(1), Supervision::Unsupervised)?,
    };
    log::info!("ibm1 trained in {:.2?}", start.elapsed());

    let mut models = TrainedModels { ibm1, ibm2: None, hmm: None };

    if opts.model >= 2 {
        let start = Instant::now();
        let engine = Ibm2::new(bitext, co);
        let seed = models.ibm1.clone();
        let ibm2 = match supervision_for("ibm2", opts.lambdas[1], partial) {
            Some((lambda, partial)) => {
                let prior = engine.supervised(partial);
                engine.train(seed, &opts.em(2), Supervision::Interpolated { prior: &prior, lambda })?
            }
            None => engine.train(seed, &opts.em(2), Supervision::Unsupervised)?,
        };
        log::info!("ibm2 trained in {:.2?}", start.elapsed());
        models.ibm2 = Some(ibm2);
    }

    if opts.model >= 3 {
        let start = Instant::now();
        let engine = Hmm::new(bitext, co);
        let seed = models.ibm2.as_ref().map_or_else(|| models.ibm1.clone(), |m| m.translation.clone());
        let hmm = match supervision_for("hmm", opts.lambdas[2], partial) {
            Some((lambda, partial)) => {
                let prior = engine.supervised(partial);
                engine.train(seed, &opts.em(3), Supervision::Interpolated { prior: &prior, lambda })?
            }
            None => engine.train(seed, &opts.em(3), Supervision::Unsupervised)?,
        };
        log::info!("hmm trained in {:.2?}", start.elapsed());
        models.hmm = Some(hmm);
    }

    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_options() {
        let mut opts = TrainOptions::default();
        assert!(opts.validate().is_ok());
        opts.model = 4;
        assert!(matches!(opts.validate(), Err(AlignError::InvalidModel(4))));
        opts.model = 2;
        opts.lambdas[1] = Some(1.5);
        assert!(matches!(opts.validate(), Err(AlignError::InvalidLambda(_))));
    }

    #[test]
    fn missing_annotations_fall_back_to_unsupervised() {
        assert!(supervision_for("ibm1", Some(0.5), None).is_none());
        let partial = PartialAlignments::new();
        assert_eq!(supervision_for("ibm1", Some(0.3), Some(&partial)).map(|s| s.0), Some(0.3));
        assert!(supervision_for("ibm1", None, Some(&partial)).is_none());
    }
}
