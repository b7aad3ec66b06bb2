pub type Link = u16;
pub type Token = u32;

#[cfg(feature = "single-precision")]
pub type Prob = f32;
#[cfg(not(feature = "single-precision"))]
pub type Prob = f64;

/// Target index written for a source word that found no positive candidate.
pub const NULL_LINK: Link = 0xffff;

/// Token id reserved on both sides for the empty word.
pub const NULL_TOKEN: Token = 0;

/// Sentence pairs with more tokens than this on either side are dropped when reading a corpus.
pub const MAX_SENT_LEN: usize = 150;

pub const EM_ITERATIONS: usize = 10;
pub const DEFAULT_LAMBDA: Prob = 0.5;

/// (source token, target token)
pub type WordPair = (Token, Token);

/// (target position j, source position i, target length l, source length m)
pub type DistortionKey = (usize, usize, usize, usize);

/// (source position i, target length l, source length m)
pub type PositionKey = (usize, usize, usize);

#[inline]
pub fn ratio(num: Prob, den: Prob) -> Option<Prob> {
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

#[inline]
pub fn blend(lambda: Prob, supervised: Prob, estimate: Prob) -> Prob {
    lambda * supervised + (1.0 - lambda) * estimate
}
