use hashbrown::{HashMap, HashSet};

use crate::error::{AlignError, AlignResult};
use crate::table::{ProbTable, TranslationTable};
use crate::types::*;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<Token>, // never contains NULL_TOKEN
}
impl Sentence {
    #[inline] pub fn len(&self) -> usize { self.tokens.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.tokens.is_empty() }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentencePair {
    pub source: Sentence,
    pub target: Sentence,
}

impl SentencePair {
    pub fn new(source: Vec<Token>, target: Vec<Token>) -> Self {
        SentencePair { source: Sentence { tokens: source }, target: Sentence { tokens: target } }
    }
}

/// Word <-> token interning for one side of the corpus. Token 0 is NULL.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    ids: HashMap<String, Token>,
    words: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary { ids: HashMap::new(), words: vec!["NULL".to_string()] }
    }
}

impl Vocabulary {
    pub fn intern(&mut self, w: &str) -> Token {
        if let Some(&id) = self.ids.get(w) {
            return id;
        }
        let id = self.words.len() as Token;
        self.words.push(w.to_string());
        self.ids.insert(w.to_string(), id);
        id
    }

    pub fn get(&self, w: &str) -> Option<Token> {
        self.ids.get(w).copied()
    }

    pub fn word(&self, t: Token) -> &str {
        self.words.get(t as usize).map(|s| s.as_str()).unwrap_or("<unk>")
    }

    /// Number of real words, NULL excluded.
    pub fn len(&self) -> usize { self.words.len() - 1 }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Clone, Debug, Default)]
pub struct Bitext {
    pub pairs: Vec<SentencePair>,
    pub source_vocab: Vocabulary,
    pub target_vocab: Vocabulary,
}

impl Bitext {
    /// Intern already tokenized sentence pairs.
    pub fn from_words<S: AsRef<str>>(pairs: &[(Vec<S>, Vec<S>)]) -> Self {
        let mut b = Bitext::default();
        for (src, tgt) in pairs {
            let source = src.iter().map(|w| b.source_vocab.intern(w.as_ref())).collect();
            let target = tgt.iter().map(|w| b.target_vocab.intern(w.as_ref())).collect();
            b.pairs.push(SentencePair::new(source, target));
        }
        b
    }

    #[inline] pub fn len(&self) -> usize { self.pairs.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.pairs.is_empty() }

    pub fn max_target_len(&self) -> usize {
        self.pairs.iter().map(|p| p.target.len()).max().unwrap_or(0)
    }
}

/// Read a sentence-aligned corpus, one whitespace-tokenized sentence per line.
///
/// Pairs where either side exceeds `max_len` tokens are dropped; `limit` caps the
/// number of lines read (before dropping).
pub fn parse_plaintext(
    source: &str,
    target: &str,
    limit: Option<usize>,
    max_len: usize,
) -> AlignResult<Bitext> {
    // positions must stay below NULL_LINK
    if max_len > NULL_LINK as usize {
        return Err(AlignError::SentenceLimit { max_len, limit: NULL_LINK as usize });
    }
    let src_lines: Vec<&str> = source.lines().collect();
    let tgt_lines: Vec<&str> = target.lines().collect();
    if src_lines.len() != tgt_lines.len() {
        return Err(AlignError::LengthMismatch {
            source_len: src_lines.len(),
            target_len: tgt_lines.len(),
        });
    }

    let n = limit.map_or(src_lines.len(), |l| l.min(src_lines.len()));
    let mut bitext = Bitext::default();
    let mut skipped = 0usize;
    for (s, t) in src_lines.iter().zip(tgt_lines.iter()).take(n) {
        let sw: Vec<&str> = s.split_whitespace().collect();
        let tw: Vec<&str> = t.split_whitespace().collect();
        if sw.len() > max_len || tw.len() > max_len {
            skipped += 1;
            continue;
        }
        let source = sw.iter().map(|w| bitext.source_vocab.intern(w)).collect();
        let target = tw.iter().map(|w| bitext.target_vocab.intern(w)).collect();
        bitext.pairs.push(SentencePair::new(source, target));
    }
    if skipped > 0 {
        log::debug!("skipped {skipped} sentence pairs longer than {max_len} tokens");
    }
    Ok(bitext)
}

/// Number of sentence pairs in which a (source, target) pair co-occurs.
pub type CoOccurrence = HashMap<WordPair, u32>;

pub fn co_occurrence(bitext: &Bitext) -> CoOccurrence {
    let mut counts = CoOccurrence::new();
    for pair in &bitext.pairs {
        let src: HashSet<Token> = pair.source.tokens.iter().copied().collect();
        let tgt: HashSet<Token> = pair.target.tokens.iter().copied().collect();
        for &s in &src {
            for &t in &tgt {
                *counts.entry((s, t)).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Known links from weak supervision: source token -> aligned target tokens.
pub type PartialAlignments = HashMap<Token, HashSet<Token>>;

/// Read an annotation file with one `source target` link per line.
///
/// Words that do not occur in the corpus cannot influence training and are dropped.
pub fn parse_partial_alignments(
    s: &str,
    bitext: &Bitext,
    source_column: usize,
    target_column: usize,
) -> AlignResult<PartialAlignments> {
    let mut partial = PartialAlignments::new();
    let mut unknown = 0usize;
    for (n, line) in s.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let sw = fields
            .get(source_column)
            .ok_or(AlignError::InvalidColumn { line: n + 1, column: source_column })?;
        let tw = fields
            .get(target_column)
            .ok_or(AlignError::InvalidColumn { line: n + 1, column: target_column })?;
        match (bitext.source_vocab.get(sw), bitext.target_vocab.get(tw)) {
            (Some(s), Some(t)) => {
                partial.entry(s).or_default().insert(t);
            }
            _ => unknown += 1,
        }
    }
    if unknown > 0 {
        log::debug!("{unknown} annotated links mention words outside the corpus");
    }
    Ok(partial)
}

// Alignment writer: one line per sentence, 1-indexed `i-j`, unaligned source words as `i-0`
pub fn write_alignments(links: &[Vec<Link>]) -> String {
    let mut out = String::new();
    for ls in links {
        let mut first = true;
        for (i, &li) in ls.iter().enumerate() {
            let j = if li == NULL_LINK { 0 } else { li as usize + 1 };
            if !first { out.push(' '); }
            out.push_str(&format!("{}-{}", i + 1, j));
            first = false;
        }
        out.push('\n');
    }
    out
}

// Translation table dump: `source target probability`, sorted by token id
pub fn write_translation_table(table: &TranslationTable, bitext: &Bitext) -> String {
    let mut s = String::new();
    for ((src, tgt), p) in table.sorted_entries() {
        s.push_str(&format!(
            "{} {} {}\n",
            bitext.source_vocab.word(src),
            bitext.target_vocab.word(tgt),
            p
        ));
    }
    s
}

/// Integer tuple keys that can be written as whitespace-separated fields.
pub trait FlatKey: Ord + Copy + core::hash::Hash {
    fn write_fields(&self, out: &mut String);
}

impl FlatKey for (usize, usize) {
    fn write_fields(&self, out: &mut String) {
        out.push_str(&format!("{} {}", self.0, self.1));
    }
}

impl FlatKey for (usize, usize, usize) {
    fn write_fields(&self, out: &mut String) {
        out.push_str(&format!("{} {} {}", self.0, self.1, self.2));
    }
}

impl FlatKey for (usize, usize, usize, usize) {
    fn write_fields(&self, out: &mut String) {
        out.push_str(&format!("{} {} {} {}", self.0, self.1, self.2, self.3));
    }
}

pub fn write_table<K: FlatKey>(table: &ProbTable<K>) -> String {
    let mut s = String::new();
    for (k, p) in table.sorted_entries() {
        k.write_fields(&mut s);
        s.push_str(&format!(" {}\n", p));
    }
    s
}
