use approx::assert_relative_eq;
use ssalign_core::ibm1::Ibm1;
use ssalign_core::types::{Prob, NULL_LINK};
use ssalign_core::{
    co_occurrence, parse_partial_alignments, parse_plaintext, train, write_alignments, Bitext, EmConfig,
    Supervision, TrainOptions,
};

const SOURCE: &str = "\
la maison
la fleur
maison bleue
la maison bleue
fleur
";

const TARGET: &str = "\
the house
the flower
house blue
the house blue
flower
";

fn corpus() -> Bitext {
    parse_plaintext(SOURCE, TARGET, None, 150).unwrap()
}

#[test]
fn uninformative_corpus_stays_symmetric() {
    let b = parse_plaintext("a b\n", "x y\n", None, 150).unwrap();
    let co = co_occurrence(&b);
    assert_eq!(co.len(), 4);
    let models = train(&b, &co, None, &TrainOptions::default()).unwrap();
    for (_, p) in models.ibm1.iter() {
        assert_relative_eq!(*p, 0.5, epsilon = 1e-12);
    }
}

#[test]
fn supervised_model1_from_annotation_file() {
    let b = parse_plaintext("a b\n", "x y\n", None, 150).unwrap();
    let co = co_occurrence(&b);
    let partial = parse_partial_alignments("a x\n", &b, 0, 1).unwrap();
    let t = Ibm1::new(&b, &co).supervised(&partial);
    let id = |w| b.source_vocab.get(w).unwrap();
    let tid = |w| b.target_vocab.get(w).unwrap();
    assert_eq!(t.get(&(id("a"), tid("x"))), 1.0);
    assert_eq!(t.get(&(id("a"), tid("y"))), 0.0);
    assert_eq!(t.get(&(id("b"), tid("x"))), 0.0);
    assert_eq!(t.get(&(id("b"), tid("y"))), 0.0);
}

#[test]
fn full_pipeline_trains_every_stage() {
    let b = corpus();
    let co = co_occurrence(&b);
    let partial = parse_partial_alignments("maison house\n", &b, 0, 1).unwrap();
    let opts = TrainOptions { model: 3, lambdas: [Some(0.5), Some(0.5), Some(0.5)], workers: 2, ..Default::default() };
    let models = train(&b, &co, Some(&partial), &opts).unwrap();
    assert!(models.ibm2.is_some());
    assert!(models.hmm.is_some());

    let links = models.align(&b);
    assert_eq!(links.len(), b.len());
    for (pair, l) in b.pairs.iter().zip(&links) {
        assert_eq!(l.len(), pair.source.len());
        assert!(l.iter().all(|&j| j == NULL_LINK || (j as usize) < pair.target.len()));
    }
    let text = write_alignments(&links);
    assert_eq!(text.lines().count(), b.len());

    let names: Vec<&str> = models.dumps(&b).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["ibm1.tprob", "ibm2.tprob", "ibm2.qprob", "hmm.emission", "hmm.transition", "hmm.state"]);
}

#[test]
fn model1_decoding_finds_obvious_links() {
    let b = corpus();
    let co = co_occurrence(&b);
    let models = train(&b, &co, None, &TrainOptions::default()).unwrap();
    let links = models.align(&b);
    // "la maison" / "the house"
    assert_eq!(links[0], vec![0, 1]);
    // "fleur" / "flower"
    assert_eq!(links[4], vec![0]);
    assert_eq!(links, models.align(&b));
}

#[test]
fn worker_count_does_not_change_training() {
    let b = corpus();
    let co = co_occurrence(&b);
    let engine = Ibm1::new(&b, &co);
    let seq = engine.train(&EmConfig { iterations: 5, workers: 1 }, Supervision::Unsupervised).unwrap();
    let par = engine.train(&EmConfig { iterations: 5, workers: 3 }, Supervision::Unsupervised).unwrap();
    for (k, v) in seq.iter() {
        assert_relative_eq!(par.get(k), *v, epsilon = 1e-12);
    }
    let total: Prob = seq.iter().map(|(_, v)| *v).sum();
    assert_relative_eq!(total, b.target_vocab.len() as Prob, epsilon = 1e-9);
}
