//! Fan-out/fan-in execution of an expectation step over contiguous corpus chunks.

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{AlignError, AlignResult};
use crate::table::Counts;
use crate::text::SentencePair;

/// Expectation workers for one training run.
///
/// The rayon pool is built once and reused by every EM iteration. With
/// `workers <= 1` no pool is built and the step runs on the calling thread.
pub struct Workers {
    pool: Option<ThreadPool>,
    workers: usize,
}

impl Workers {
    pub fn new(workers: usize) -> AlignResult<Self> {
        let pool = if workers > 1 {
            Some(ThreadPoolBuilder::new().num_threads(workers).build()?)
        } else {
            None
        };
        Ok(Workers { pool, workers })
    }

    /// Run `estep` over `pairs`, split into `workers` contiguous chunks of
    /// `ceil(len / workers)` pairs, and sum the partial counts.
    ///
    /// Every chunk reads the same immutable inputs captured by `estep`. Partial
    /// counts are merged in chunk order so the floating-point sums do not depend
    /// on which worker finishes first. A panicking chunk is reported once all
    /// chunks have finished.
    pub fn expectation<F>(&self, pairs: &[SentencePair], estep: F) -> AlignResult<Counts>
    where
        F: Fn(&[SentencePair]) -> Counts + Sync,
    {
        let pool = match &self.pool {
            Some(pool) if pairs.len() > 1 => pool,
            _ => return Ok(estep(pairs)),
        };
        let chunk_len = pairs.len().div_ceil(self.workers);
        let partials: Vec<Result<Counts, usize>> = pool.install(|| {
            pairs
                .par_chunks(chunk_len)
                .enumerate()
                .map(|(idx, chunk)| catch_unwind(AssertUnwindSafe(|| estep(chunk))).map_err(|_| idx))
                .collect()
        });
        log::trace!("expectation fanned out to {} chunks of {} pairs", partials.len(), chunk_len);

        let mut merged = Counts::new();
        for partial in partials {
            match partial {
                Ok(counts) => merged.merge(counts),
                Err(chunk) => return Err(AlignError::WorkerPanicked { chunk }),
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Prob;

    fn corpus(n: u32) -> Vec<SentencePair> {
        (1..=n).map(|k| SentencePair::new(vec![k, k + 1], vec![k % 3 + 1])).collect()
    }

    fn tally(pairs: &[SentencePair]) -> Counts {
        let mut c = Counts::new();
        for p in pairs {
            for &s in &p.source.tokens {
                for &t in &p.target.tokens {
                    c.add_translation(s, t, 1.0 / p.source.len() as Prob);
                }
            }
            c.add_position(0, 0, p.target.len(), p.source.len(), 1.0);
        }
        c
    }

    #[test]
    fn chunked_matches_sequential() {
        let pairs = corpus(23);
        let seq = tally(&pairs);
        for workers in [2, 3, 4, 8, 64] {
            let par = Workers::new(workers).unwrap().expectation(&pairs, tally).unwrap();
            assert_eq!(par.pair.len(), seq.pair.len());
            for (k, v) in seq.pair.iter() {
                assert!((par.pair.get(k) - v).abs() < 1e-12, "workers={workers} key={k:?}");
            }
            for (k, v) in seq.target.iter() {
                assert!((par.target.get(k) - v).abs() < 1e-12);
            }
            assert_eq!(par.joint.get(&(0, 0, 1, 2)), 23.0);
            assert_eq!(par.marginal.get(&(0, 1, 2)), 23.0);
        }
    }

    #[test]
    fn empty_corpus_yields_empty_counts() {
        let c = Workers::new(4).unwrap().expectation(&[], tally).unwrap();
        assert!(c.pair.is_empty());
    }

    #[test]
    fn panicking_worker_is_reported() {
        let pairs = corpus(10);
        let err = Workers::new(5).unwrap().expectation(&pairs, |chunk| {
            if chunk.iter().any(|p| p.source.tokens[0] == 7) {
                panic!("bad chunk");
            }
            tally(chunk)
        })
        .unwrap_err();
        // 10 pairs / 5 workers: pair 7 sits in chunk 3
        assert!(matches!(err, AlignError::WorkerPanicked { chunk: 3 }));
    }

    #[test]
    fn pool_is_reused_across_iterations() {
        let pairs = corpus(9);
        let workers = Workers::new(3).unwrap();
        let first = workers.expectation(&pairs, tally).unwrap();
        let second = workers.expectation(&pairs, tally).unwrap();
        for (k, v) in first.pair.iter() {
            assert_eq!(second.pair.get(k), *v);
        }
    }

    #[test]
    fn single_worker_runs_inline() {
        let pairs = corpus(4);
        let workers = Workers::new(0).unwrap();
        let c = workers.expectation(&pairs, tally).unwrap();
        assert_eq!(c.joint.get(&(0, 0, 1, 2)), 4.0);
    }
}
