use crate::types::*;

/// Fixed-budget EM schedule shared by all engines.
#[derive(Clone, Copy, Debug)]
pub struct EmConfig {
    pub iterations: usize,
    /// Expectation workers; 0 or 1 runs on the calling thread.
    pub workers: usize,
}

impl Default for EmConfig {
    fn default() -> Self {
        EmConfig { iterations: EM_ITERATIONS, workers: 1 }
    }
}

/// How the maximization step treats a supervised prior `P`.
#[derive(Debug)]
pub enum Supervision<'p, P> {
    Unsupervised,
    /// Blend re-estimates with `prior` at weight `lambda` on the prior.
    Interpolated { prior: &'p P, lambda: Prob },
}

// Only a shared reference is held, so no bound on P.
impl<'p, P> Clone for Supervision<'p, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'p, P> Copy for Supervision<'p, P> {}
