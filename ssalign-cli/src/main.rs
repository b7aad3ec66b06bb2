use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};

use ssalign_core::types::{Prob, DEFAULT_LAMBDA, MAX_SENT_LEN};
use ssalign_core::{co_occurrence, parse_partial_alignments, parse_plaintext, train, write_alignments, TrainOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Semi-supervised IBM Model 1/2 and HMM word alignment")]
struct Args {
    /// Corpus prefix; reads PREFIX.F (source) and PREFIX.E (target)
    #[arg(short='p', long="data", default_value="data/hansards")]
    data: String,
    #[arg(short='f', long="french", default_value="f")]
    source_suffix: String,
    #[arg(short='e', long="english", default_value="e")]
    target_suffix: String,
    #[arg(short='n', long="num-sentences")]
    num_sentences: Option<usize>,
    #[arg(long, default_value_t=MAX_SENT_LEN)]
    max_len: usize,
    /// Partial alignments, one `source target` link per line
    #[arg(short='a', long="annotation")]
    annotation: Option<String>,
    #[arg(long="asc", default_value_t=0)]
    annotation_source_column: usize,
    #[arg(long="atc", default_value_t=1)]
    annotation_target_column: usize,
    #[arg(long="l1", default_value_t=DEFAULT_LAMBDA)]
    ibm1_lambda: Prob,
    #[arg(long="i1", default_value_t=false)]
    interpolate_ibm1: bool,
    #[arg(long="l2", default_value_t=DEFAULT_LAMBDA)]
    ibm2_lambda: Prob,
    #[arg(long="i2", default_value_t=false)]
    interpolate_ibm2: bool,
    #[arg(long="l3", default_value_t=DEFAULT_LAMBDA)]
    hmm_lambda: Prob,
    #[arg(long="i3", default_value_t=false)]
    interpolate_hmm: bool,
    #[arg(long, default_value_t=false)]
    ibm2: bool,
    #[arg(long, default_value_t=false)]
    hmm: bool,
    #[arg(long, default_value_t=ssalign_core::types::EM_ITERATIONS)]
    iterations: usize,
    #[arg(short='w', long, default_value_t=1)]
    workers: usize,
    /// Alignment output; stdout when absent
    #[arg(short='o', long="output")]
    output: Option<String>,
    /// Directory for flat text dumps of the trained tables
    #[arg(long="model-dir")]
    model_dir: Option<PathBuf>,
    #[arg(short='v', long, default_value_t=false)]
    verbose: bool,
}

fn read_all(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {path}"))
}

fn write_all(path: Option<&str>, data: &str) -> Result<()> {
    match path {
        None | Some("-") => print!("{data}"),
        Some(p) => fs::write(p, data).with_context(|| format!("writing {p}"))?,
    }
    Ok(())
}

fn lambda(enabled: bool, value: Prob) -> Option<Prob> {
    if enabled { Some(value) } else { None }
}

impl Args {
    fn train_options(&self) -> TrainOptions {
        let model = if self.hmm { 3 } else if self.ibm2 { 2 } else { 1 };
        TrainOptions {
            model,
            lambdas: [
                lambda(self.interpolate_ibm1, self.ibm1_lambda),
                lambda(self.interpolate_ibm2, self.ibm2_lambda),
                lambda(self.interpolate_hmm, self.hmm_lambda),
            ],
            iterations: [self.iterations; 3],
            workers: self.workers,
        }
    }
}

fn dump_models(dir: &Path, dumps: Vec<(&'static str, String)>) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (name, data) in dumps {
        let path = dir.join(name);
        fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        env_logger::builder().filter_level(LevelFilter::Info).init();
    } else {
        env_logger::init();
    }

    let src_path = format!("{}.{}", args.data, args.source_suffix);
    let tgt_path = format!("{}.{}", args.data, args.target_suffix);
    let bitext = parse_plaintext(&read_all(&src_path)?, &read_all(&tgt_path)?, args.num_sentences, args.max_len)
        .with_context(|| format!("parsing {src_path} / {tgt_path}"))?;
    let co = co_occurrence(&bitext);

    let partial = match &args.annotation {
        Some(p) => Some(
            parse_partial_alignments(&read_all(p)?, &bitext, args.annotation_source_column, args.annotation_target_column)
                .with_context(|| format!("parsing {p}"))?,
        ),
        None => None,
    };
    if let Some(pa) = &partial {
        info!("{} annotated source words", pa.len());
    }

    let opts = args.train_options();
    let models = train(&bitext, &co, partial.as_ref(), &opts)?;

    if let Some(dir) = &args.model_dir {
        dump_models(dir, models.dumps(&bitext))?;
    }

    let links = models.align(&bitext);
    write_all(args.output.as_deref(), &write_alignments(&links))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_select_models_and_lambdas() {
        let args = Args::parse_from(["ssalign", "--hmm", "--i2", "--l2", "0.3", "-w", "4"]);
        let opts = args.train_options();
        assert_eq!(opts.model, 3);
        assert_eq!(opts.lambdas, [None, Some(0.3), None]);
        assert_eq!(opts.workers, 4);
        assert_eq!(opts.iterations, [10; 3]);
    }

    #[test]
    fn defaults_train_model1_unsupervised() {
        let opts = Args::parse_from(["ssalign"]).train_options();
        assert_eq!(opts.model, 1);
        assert_eq!(opts.lambdas, [None; 3]);
    }
}
