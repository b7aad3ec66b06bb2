//! HMM alignment model.
//!
//! The hidden state of source position k is the target position it aligns to.
//! State 0 is the null state and state `j + 1` is target position `j`, so a
//! sentence with target length `l` has `l + 1` states. Transitions
//! `A[prev][cur][l]` are conditioned on the target length; emissions are the
//! translation table `t(s, t)` with `t(s, NULL)` for the null state.

use hashbrown::{HashMap, HashSet};

use crate::em::{EmConfig, Supervision};
use crate::error::AlignResult;
use crate::maximize::{maximize_interpolated_translation, maximize_translation};
use crate::table::{Counts, ProbTable, TranslationTable};
use crate::text::{Bitext, CoOccurrence, PartialAlignments, SentencePair};
use crate::types::*;

/// Dense `(l+1)×(l+1)` transition matrix per target length `l`, row = previous state.
#[derive(Clone, Debug, Default)]
pub struct Transitions {
    by_len: HashMap<usize, Vec<Prob>>,
}

impl Transitions {
    pub fn uniform<I: IntoIterator<Item = usize>>(lengths: I) -> Self {
        let by_len = lengths
            .into_iter()
            .map(|l| {
                let n = l + 1;
                (l, vec![1.0 / n as Prob; n * n])
            })
            .collect();
        Transitions { by_len }
    }

    #[inline]
    pub fn get(&self, prev: usize, cur: usize, l: usize) -> Prob {
        let n = l + 1;
        if prev >= n || cur >= n {
            return 0.0;
        }
        self.by_len.get(&l).map_or(0.0, |m| m[prev * n + cur])
    }

    pub fn add(&mut self, prev: usize, cur: usize, l: usize, v: Prob) {
        let n = l + 1;
        let m = self.by_len.entry(l).or_insert_with(|| vec![0.0; n * n]);
        m[prev * n + cur] += v;
    }

    pub fn row(&self, prev: usize, l: usize) -> Option<&[Prob]> {
        let n = l + 1;
        if prev >= n {
            return None;
        }
        self.by_len.get(&l).map(|m| &m[prev * n..(prev + 1) * n])
    }

    pub fn has_length(&self, l: usize) -> bool {
        self.by_len.contains_key(&l)
    }

    /// Each row scaled to sum to 1; rows without mass stay zero.
    pub fn normalized(mut self) -> Self {
        for (&l, m) in self.by_len.iter_mut() {
            for row in m.chunks_mut(l + 1) {
                let sum: Prob = row.iter().sum();
                if sum > 0.0 {
                    row.iter_mut().for_each(|v| *v /= sum);
                }
            }
        }
        self
    }

    /// Replace each row by the normalized `counts` row, blended with the prior row
    /// when one is given and has mass. Rows with neither keep their value.
    fn reestimated(mut self, counts: &Transitions, prior: Option<(&Transitions, Prob)>) -> Self {
        for (&l, m) in self.by_len.iter_mut() {
            let n = l + 1;
            for (prev, row) in m.chunks_mut(n).enumerate() {
                let estimate = counts.row(prev, l).and_then(normalized_row);
                let supervised = prior.and_then(|(p, lambda)| {
                    p.row(prev, l).filter(|r| r.iter().sum::<Prob>() > 0.0).map(|r| (r, lambda))
                });
                match (supervised, estimate) {
                    (Some((sup, lambda)), est) => {
                        for c in 0..n {
                            let e = est.as_ref().map_or(0.0, |e| e[c]);
                            row[c] = blend(lambda, sup[c], e);
                        }
                    }
                    (None, Some(est)) => row.copy_from_slice(&est),
                    (None, None) => {}
                }
            }
        }
        self
    }

    /// Flat `(prev, cur, l) -> p` entries.
    pub fn to_table(&self) -> ProbTable<(usize, usize, usize)> {
        let mut t = ProbTable::new();
        for (&l, m) in &self.by_len {
            let n = l + 1;
            for (k, &p) in m.iter().enumerate() {
                if p != 0.0 {
                    t.set((k / n, k % n, l), p);
                }
            }
        }
        t
    }
}

fn normalized_row(row: &[Prob]) -> Option<Vec<Prob>> {
    let sum: Prob = row.iter().sum();
    if sum > 0.0 {
        Some(row.iter().map(|v| v / sum).collect())
    } else {
        None
    }
}

#[derive(Clone, Debug, Default)]
pub struct HmmModel {
    /// t(s, t) including `(s, NULL_TOKEN)` for the null state
    pub emission: TranslationTable,
    pub transitions: Transitions,
    /// π(state | l), keyed (state, l)
    pub initial: ProbTable<(usize, usize)>,
}

impl HmmModel {
    // Lengths never seen in training fall back to uniform.
    #[inline]
    fn transition(&self, prev: usize, cur: usize, l: usize) -> Prob {
        if self.transitions.has_length(l) {
            self.transitions.get(prev, cur, l)
        } else {
            1.0 / (l + 1) as Prob
        }
    }

    #[inline]
    fn start(&self, state: usize, l: usize) -> Prob {
        if self.transitions.has_length(l) {
            self.initial.get(&(state, l))
        } else {
            1.0 / (l + 1) as Prob
        }
    }

    #[inline]
    fn emit(&self, s: Token, pair: &SentencePair, state: usize) -> Prob {
        self.emission.get(&(s, state_token(pair, state)))
    }

    /// Most probable state path for `pair`, one link per source word.
    ///
    /// The null state and impossible sentences decode to `NULL_LINK`. Ties keep the
    /// lowest state.
    pub fn viterbi(&self, pair: &SentencePair) -> Vec<Link> {
        let m = pair.source.len();
        let l = pair.target.len();
        let n = l + 1;
        if m == 0 {
            return Vec::new();
        }
        let ln = |p: Prob| if p > 0.0 { p.ln() } else { Prob::NEG_INFINITY };

        let mut delta = vec![Prob::NEG_INFINITY; m * n];
        let mut back = vec![0usize; m * n];
        let src = &pair.source.tokens;
        for st in 0..n {
            delta[st] = ln(self.start(st, l)) + ln(self.emit(src[0], pair, st));
        }
        for k in 1..m {
            for cur in 0..n {
                let mut best = Prob::NEG_INFINITY;
                let mut best_prev = 0usize;
                for prev in 0..n {
                    let v = delta[(k - 1) * n + prev] + ln(self.transition(prev, cur, l));
                    if v > best {
                        best = v;
                        best_prev = prev;
                    }
                }
                delta[k * n + cur] = best + ln(self.emit(src[k], pair, cur));
                back[k * n + cur] = best_prev;
            }
        }

        let mut best = Prob::NEG_INFINITY;
        let mut state = 0usize;
        for st in 0..n {
            let v = delta[(m - 1) * n + st];
            if v > best {
                best = v;
                state = st;
            }
        }
        if best == Prob::NEG_INFINITY {
            return vec![NULL_LINK; m];
        }

        let mut links = vec![NULL_LINK; m];
        for k in (0..m).rev() {
            links[k] = if state == 0 { NULL_LINK } else { (state - 1) as Link };
            state = back[k * n + state];
        }
        links
    }
}

#[inline]
fn state_token(pair: &SentencePair, state: usize) -> Token {
    if state == 0 { NULL_TOKEN } else { pair.target.tokens[state - 1] }
}

/// Posterior statistics of one Baum-Welch pass.
#[derive(Default)]
struct HmmStats {
    emission: Counts,
    transitions: Transitions,
    initial: ProbTable<(usize, usize)>,
    log_likelihood: Prob,
    skipped: usize,
}

pub struct Hmm<'a> {
    bitext: &'a Bitext,
    // co-occurrence support plus (s, NULL) for every source word
    support: Vec<WordPair>,
    lengths: HashSet<usize>,
}

impl<'a> Hmm<'a> {
    pub fn new(bitext: &'a Bitext, co: &'a CoOccurrence) -> Self {
        let mut support: Vec<WordPair> = co.keys().copied().collect();
        support.extend((1..=bitext.source_vocab.len() as Token).map(|s| (s, NULL_TOKEN)));
        let lengths = bitext.pairs.iter().map(|p| p.target.len()).collect();
        Hmm { bitext, support, lengths }
    }

    /// Emission and transition tables from annotated links alone.
    ///
    /// A source word's link is its leftmost annotated target position in the
    /// sentence; consecutive linked source words add one transition count.
    pub fn supervised(&self, partial: &PartialAlignments) -> HmmModel {
        let mut emission = Counts::new();
        let mut transitions = Transitions::default();
        for pair in &self.bitext.pairs {
            let l = pair.target.len();
            let mut prev: Option<usize> = None;
            for &s in &pair.source.tokens {
                let mut cur = None;
                if let Some(targets) = partial.get(&s) {
                    for (j, &t) in pair.target.tokens.iter().enumerate() {
                        if targets.contains(&t) {
                            emission.add_translation(s, t, 1.0);
                            cur.get_or_insert(j + 1);
                        }
                    }
                }
                if let (Some(p), Some(c)) = (prev, cur) {
                    transitions.add(p, c, l, 1.0);
                }
                prev = cur;
            }
        }
        HmmModel {
            emission: maximize_translation(
                self.support.iter().copied(),
                &emission.pair,
                &emission.target,
                TranslationTable::new(),
            ),
            transitions: transitions.normalized(),
            initial: ProbTable::new(),
        }
    }

    /// Starting point for Baum-Welch: `seed` emissions, `1/|source vocabulary|` null
    /// emissions, uniform transitions and start states.
    pub fn initial_model(&self, seed: TranslationTable) -> HmmModel {
        let mut emission = seed;
        let p_null = 1.0 / self.bitext.source_vocab.len().max(1) as Prob;
        for &(s, t) in &self.support {
            if t == NULL_TOKEN && !emission.contains(&(s, t)) {
                emission.set((s, t), p_null);
            }
        }
        let mut initial = ProbTable::new();
        for &l in &self.lengths {
            for st in 0..=l {
                initial.set((st, l), 1.0 / (l + 1) as Prob);
            }
        }
        HmmModel { emission, transitions: Transitions::uniform(self.lengths.iter().copied()), initial }
    }

    /// Baum-Welch from `seed` (a Model 1 or Model 2 translation table).
    ///
    /// The HMM always runs its expectation step on the calling thread; `cfg.workers`
    /// is not used.
    pub fn train(
        &self,
        seed: TranslationTable,
        cfg: &EmConfig,
        supervision: Supervision<'_, HmmModel>,
    ) -> AlignResult<HmmModel> {
        let mut model = self.initial_model(seed);
        for it in 0..cfg.iterations {
            let mut stats = HmmStats::default();
            for pair in &self.bitext.pairs {
                forward_backward(pair, &model, &mut stats);
            }
            log::debug!(
                "hmm iteration {}/{}: log-likelihood {:.4}, {} sentences without support",
                it + 1,
                cfg.iterations,
                stats.log_likelihood,
                stats.skipped
            );
            model = self.maximize(model, &stats, supervision);
        }
        Ok(model)
    }

    fn maximize(&self, model: HmmModel, stats: &HmmStats, supervision: Supervision<'_, HmmModel>) -> HmmModel {
        let HmmModel { emission, transitions, mut initial } = model;
        let support = self.support.iter().copied();
        let (emission, transitions) = match supervision {
            Supervision::Unsupervised => (
                maximize_translation(support, &stats.emission.pair, &stats.emission.target, emission),
                transitions.reestimated(&stats.transitions, None),
            ),
            Supervision::Interpolated { prior, lambda } => (
                maximize_interpolated_translation(
                    support,
                    &stats.emission.pair,
                    &stats.emission.target,
                    emission,
                    &prior.emission,
                    lambda,
                ),
                transitions.reestimated(&stats.transitions, Some((&prior.transitions, lambda))),
            ),
        };

        for &l in &self.lengths {
            let sum: Prob = (0..=l).map(|st| stats.initial.get(&(st, l))).sum();
            if sum > 0.0 {
                for st in 0..=l {
                    initial.set((st, l), stats.initial.get(&(st, l)) / sum);
                }
            }
        }
        HmmModel { emission, transitions, initial }
    }
}

/// Scaled forward-backward over one sentence pair, accumulating state and
/// transition posteriors into `stats`. Sentences with zero probability under
/// the current model contribute nothing.
fn forward_backward(pair: &SentencePair, model: &HmmModel, stats: &mut HmmStats) {
    let m = pair.source.len();
    let l = pair.target.len();
    let n = l + 1;
    if m == 0 {
        return;
    }
    let src = &pair.source.tokens;

    let mut emit = vec![0.0 as Prob; m * n];
    for k in 0..m {
        for st in 0..n {
            emit[k * n + st] = model.emit(src[k], pair, st);
        }
    }

    let mut alpha = vec![0.0 as Prob; m * n];
    let mut scale = vec![0.0 as Prob; m];
    for st in 0..n {
        alpha[st] = model.start(st, l) * emit[st];
    }
    for k in 0..m {
        if k > 0 {
            for cur in 0..n {
                let mut acc: Prob = 0.0;
                for prev in 0..n {
                    acc += alpha[(k - 1) * n + prev] * model.transition(prev, cur, l);
                }
                alpha[k * n + cur] = acc * emit[k * n + cur];
            }
        }
        let c: Prob = alpha[k * n..(k + 1) * n].iter().sum();
        if c == 0.0 {
            stats.skipped += 1;
            return;
        }
        alpha[k * n..(k + 1) * n].iter_mut().for_each(|a| *a /= c);
        scale[k] = c;
    }

    let mut beta = vec![0.0 as Prob; m * n];
    beta[(m - 1) * n..].iter_mut().for_each(|b| *b = 1.0);
    for k in (0..m - 1).rev() {
        for prev in 0..n {
            let mut acc: Prob = 0.0;
            for cur in 0..n {
                acc += model.transition(prev, cur, l) * emit[(k + 1) * n + cur] * beta[(k + 1) * n + cur];
            }
            beta[k * n + prev] = acc / scale[k + 1];
        }
    }

    for k in 0..m {
        for st in 0..n {
            let gamma = alpha[k * n + st] * beta[k * n + st];
            if gamma > 0.0 {
                stats.emission.add_translation(src[k], state_token(pair, st), gamma);
                if k == 0 {
                    stats.initial.add((st, l), gamma);
                }
            }
        }
    }
    for k in 0..m - 1 {
        for prev in 0..n {
            let a = alpha[k * n + prev];
            if a == 0.0 {
                continue;
            }
            for cur in 0..n {
                let xi = a * model.transition(prev, cur, l) * emit[(k + 1) * n + cur] * beta[(k + 1) * n + cur]
                    / scale[k + 1];
                if xi > 0.0 {
                    stats.transitions.add(prev, cur, l, xi);
                }
            }
        }
    }
    stats.log_likelihood += scale.iter().map(|c| c.ln()).sum::<Prob>();
}
