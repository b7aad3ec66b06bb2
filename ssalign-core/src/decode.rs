//! Turn trained tables into one target link per source word.
//!
//! Argmax decoding keeps the first maximal candidate (strict `>`); a source word
//! with no positive candidate is left at `NULL_LINK`.

use crate::hmm::HmmModel;
use crate::ibm2::Ibm2Model;
use crate::table::TranslationTable;
use crate::text::{Bitext, SentencePair};
use crate::types::*;

#[inline]
fn argmax<F: Fn(usize) -> Prob>(n: usize, score: F) -> Link {
    let mut best = 0.0;
    let mut link = NULL_LINK;
    for j in 0..n {
        let p = score(j);
        if p > best {
            best = p;
            link = j as Link;
        }
    }
    link
}

pub fn ibm1_sentence(pair: &SentencePair, t: &TranslationTable) -> Vec<Link> {
    let tgt = &pair.target.tokens;
    pair.source
        .tokens
        .iter()
        .map(|&s| argmax(tgt.len(), |j| t.get(&(s, tgt[j]))))
        .collect()
}

pub fn ibm2_sentence(pair: &SentencePair, model: &Ibm2Model) -> Vec<Link> {
    let tgt = &pair.target.tokens;
    let (l, m) = (tgt.len(), pair.source.len());
    pair.source
        .tokens
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            argmax(l, |j| model.translation.get(&(s, tgt[j])) * model.distortion.get(&(j, i, l, m)))
        })
        .collect()
}

pub fn ibm1(bitext: &Bitext, t: &TranslationTable) -> Vec<Vec<Link>> {
    bitext.pairs.iter().map(|p| ibm1_sentence(p, t)).collect()
}

pub fn ibm2(bitext: &Bitext, model: &Ibm2Model) -> Vec<Vec<Link>> {
    bitext.pairs.iter().map(|p| ibm2_sentence(p, model)).collect()
}

pub fn hmm(bitext: &Bitext, model: &HmmModel) -> Vec<Vec<Link>> {
    bitext.pairs.iter().map(|p| model.viterbi(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DistortionTable;

    #[test]
    fn first_maximal_candidate_wins() {
        let pair = SentencePair::new(vec![1, 2], vec![10, 20, 30]);
        let mut t = TranslationTable::new();
        t.set((1, 20), 0.4);
        t.set((1, 30), 0.4);
        t.set((1, 10), 0.2);
        let links = ibm1_sentence(&pair, &t);
        assert_eq!(links, vec![1, NULL_LINK]);
        assert_eq!(links, ibm1_sentence(&pair, &t));
    }

    #[test]
    fn ibm2_weights_by_distortion() {
        let pair = SentencePair::new(vec![1], vec![10, 10]);
        let mut t = TranslationTable::new();
        t.set((1, 10), 0.5);
        let mut q = DistortionTable::new();
        q.set((0, 0, 2, 1), 0.2);
        q.set((1, 0, 2, 1), 0.8);
        let model = Ibm2Model { translation: t.clone(), distortion: q };
        assert_eq!(ibm2_sentence(&pair, &model), vec![1]);
        // without distortion the tie goes to the first target
        assert_eq!(ibm1_sentence(&pair, &t), vec![0]);
    }

    #[test]
    fn corpus_level_decoding_keeps_sentence_order() {
        let b = Bitext::from_words(&[(vec!["a"], vec!["x"]), (vec!["b", "a"], vec!["y", "x"])]);
        let a = b.source_vocab.get("a").unwrap();
        let x = b.target_vocab.get("x").unwrap();
        let mut t = TranslationTable::new();
        t.set((a, x), 1.0);
        assert_eq!(ibm1(&b, &t), vec![vec![0], vec![NULL_LINK, 1]]);
    }
}
